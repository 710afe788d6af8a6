//! Context-scoped backoff overrides.
//!
//! Every call site listens to a namespace (`None` included). By default each
//! namespace resolves to the [`Standard`](crate::backoff::Standard) variant;
//! a scoped override remaps it for the current execution context only:
//!
//! ```rust
//! use rebound_core::overrides::{self, retry_immediately};
//!
//! {
//!     let _guard = retry_immediately(None);
//!     assert_eq!(overrides::resolve(None).name(), "zero-wait");
//! }
//! assert_eq!(overrides::resolve(None).name(), "standard");
//! ```
//!
//! # Execution contexts
//!
//! The active table is an immutable snapshot ([`Overrides`]) held in a
//! thread-local cell, so threads never see each other's overrides and a fresh
//! thread starts with none. [`OverrideGuard`] is tied to the thread that
//! created it: it is neither `Send` nor `Sync`, so it cannot be held across an
//! `.await` in a spawned task, where sibling tasks polled on the same worker
//! would see the override.
//!
//! Async code installs overrides with [`scoped_with`] instead. A [`Scoped`]
//! future captures a snapshot and swaps it in around every poll, so the
//! override is confined to that future and whatever it spawns through
//! [`spawn`]. Concurrent futures joined inside a single task share that task's
//! context unless each one is wrapped in [`scoped`] or [`scoped_with`]:
//!
//! ```rust
//! use rebound_core::backoff::ZeroWait;
//! use rebound_core::overrides::{self, scoped_with};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let task = tokio::spawn(scoped_with(None, Arc::new(ZeroWait), async {
//!     tokio::task::yield_now().await;
//!     overrides::resolve(None).name()
//! }));
//! assert_eq!(overrides::resolve(None).name(), "standard");
//! assert_eq!(task.await.unwrap(), "zero-wait");
//! # }
//! ```
//!
//! Spawned work inherits a snapshot taken at spawn time; overrides installed
//! later by either side are invisible to the other.

mod task;

pub use task::{Scoped, scoped, scoped_with, spawn, spawn_thread};

use crate::backoff::{Variant, ZeroAttempt, ZeroWait, standard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static ACTIVE: RefCell<Overrides> = RefCell::new(Overrides::default());
}

/// An immutable namespace-to-variant table.
///
/// Cloning is cheap; installing an override builds a new table and leaves
/// existing snapshots untouched.
#[derive(Clone, Default)]
pub struct Overrides {
    unnamed: Option<Variant>,
    named: Arc<HashMap<String, Variant>>,
}

impl Overrides {
    /// The override for `namespace`, if one is installed.
    pub fn get(&self, namespace: Option<&str>) -> Option<&Variant> {
        match namespace {
            None => self.unnamed.as_ref(),
            Some(name) => self.named.get(name),
        }
    }

    /// The variant `namespace` resolves to, falling back to the standard one.
    pub fn resolve(&self, namespace: Option<&str>) -> Variant {
        self.get(namespace).cloned().unwrap_or_else(standard)
    }

    /// Whether no namespace is overridden.
    pub fn is_empty(&self) -> bool {
        self.unnamed.is_none() && self.named.is_empty()
    }

    /// A copy of this table with `namespace` remapped to `variant`.
    pub fn with(&self, namespace: Option<&str>, variant: Variant) -> Self {
        let mut next = self.clone();
        match namespace {
            None => next.unnamed = Some(variant),
            Some(name) => {
                Arc::make_mut(&mut next.named).insert(name.to_owned(), variant);
            }
        }
        next
    }

    /// Make this table the active one on the current thread until the guard
    /// is dropped.
    pub fn enter(self) -> OverrideGuard {
        OverrideGuard {
            previous: Some(swap(self)),
            _thread_bound: PhantomData,
        }
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        if let Some(variant) = &self.unnamed {
            map.entry(&None::<&str>, &variant.name());
        }
        for (name, variant) in self.named.iter() {
            map.entry(&Some(name), &variant.name());
        }
        map.finish()
    }
}

/// Reverts an override when dropped.
///
/// Restores exactly the table that was active when the guard was created, so
/// nested overrides unwind innermost first. Guards must be dropped in reverse
/// order of creation, which ordinary scoping guarantees.
///
/// The guard cannot leave the thread it was created on. Use
/// [`scoped_with`] to override for the duration of a future.
#[must_use = "the override is reverted as soon as the guard is dropped"]
#[derive(Debug)]
pub struct OverrideGuard {
    previous: Option<Overrides>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // The cell is gone only during thread teardown, with nothing left to restore.
            let _ = ACTIVE.try_with(|active| active.replace(previous));
        }
    }
}

pub(crate) fn swap(next: Overrides) -> Overrides {
    ACTIVE.with(|active| active.replace(next))
}

/// Snapshot of the overrides active in the current context.
pub fn current() -> Overrides {
    ACTIVE.with(|active| active.borrow().clone())
}

/// The variant `namespace` resolves to in the current context.
pub fn resolve(namespace: Option<&str>) -> Variant {
    ACTIVE.with(|active| active.borrow().resolve(namespace))
}

/// Remap `namespace` to `variant` for the current context until the guard is
/// dropped.
pub fn replace_backoff(namespace: Option<&str>, variant: Variant) -> OverrideGuard {
    current().with(namespace, variant).enter()
}

/// Retry without waiting in `namespace`, still honouring the call budget.
///
/// Intended for tests of code that retries.
pub fn retry_immediately(namespace: Option<&str>) -> OverrideGuard {
    replace_backoff(namespace, Arc::new(ZeroWait))
}

/// Disable retries in `namespace`: every operation is called exactly once.
pub fn no_retries(namespace: Option<&str>) -> OverrideGuard {
    replace_backoff(namespace, Arc::new(ZeroAttempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn test_unseen_namespaces_resolve_to_standard() {
        assert_eq!(resolve(None).name(), "standard");
        assert_eq!(resolve(Some("never-configured")).name(), "standard");
        assert!(current().is_empty());
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let guard = no_retries(None);
        assert_eq!(resolve(None).name(), "zero-attempt");
        drop(guard);
        assert_eq!(resolve(None).name(), "standard");
    }

    #[test]
    fn test_namespaces_are_independent() {
        let _guard = retry_immediately(Some("bar_retry"));
        assert_eq!(resolve(Some("bar_retry")).name(), "zero-wait");
        assert_eq!(resolve(None).name(), "standard");
        assert_eq!(resolve(Some("other")).name(), "standard");
    }

    #[test]
    fn test_nesting_reveals_the_next_outer_override() {
        let _outer = no_retries(None);
        {
            let _inner = retry_immediately(None);
            assert_eq!(resolve(None).name(), "zero-wait");
            {
                let _innermost = no_retries(Some("x"));
                assert_eq!(resolve(None).name(), "zero-wait");
                assert_eq!(resolve(Some("x")).name(), "zero-attempt");
            }
            assert_eq!(resolve(Some("x")).name(), "standard");
        }
        assert_eq!(resolve(None).name(), "zero-attempt");
    }

    #[test]
    fn test_guard_restores_during_unwinding() {
        let result = std::panic::catch_unwind(|| {
            let _guard = retry_immediately(None);
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(resolve(None).name(), "standard");
    }

    #[test]
    fn test_snapshots_are_unaffected_by_later_overrides() {
        let before = current();
        let _guard = no_retries(None);
        assert!(before.get(None).is_none());
        assert_eq!(current().resolve(None).name(), "zero-attempt");
    }

    #[test]
    fn test_threads_do_not_share_overrides() {
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [false, true]
            .into_iter()
            .map(|immediate| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let _guard = if immediate {
                        retry_immediately(None)
                    } else {
                        no_retries(None)
                    };
                    // Both threads have installed their override before either reads.
                    barrier.wait();
                    let seen = resolve(None).name();
                    barrier.wait();
                    seen
                })
            })
            .collect();

        let seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(seen, vec!["zero-attempt", "zero-wait"]);
        assert_eq!(resolve(None).name(), "standard");
    }

    #[test]
    fn test_guard_is_not_send() {
        // Resolves only if `OverrideGuard` lacks `Send`: otherwise both impls
        // apply and the type parameter is ambiguous.
        trait AmbiguousIfSend<A> {
            fn check() {}
        }
        impl<T: ?Sized> AmbiguousIfSend<()> for T {}
        impl<T: ?Sized + Send> AmbiguousIfSend<u8> for T {}

        <OverrideGuard as AmbiguousIfSend<_>>::check();
    }

    #[test]
    fn test_debug_lists_overridden_namespaces() {
        let table = Overrides::default()
            .with(None, Arc::new(ZeroWait))
            .with(Some("jobs"), Arc::new(ZeroAttempt));
        let rendered = format!("{table:?}");
        assert!(rendered.contains("None: \"zero-wait\""), "{rendered}");
        assert!(rendered.contains("Some(\"jobs\"): \"zero-attempt\""), "{rendered}");
    }
}
