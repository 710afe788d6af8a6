//! Carrying overrides into spawned tasks and threads.

use super::{Overrides, current, swap};
use crate::backoff::Variant;
use pin_project::{pin_project, pinned_drop};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that runs in its own override context.
///
/// Created by [`scoped`] or [`Scoped::new`]. Around every poll the future's
/// snapshot is made active and, once the poll returns, whatever the future
/// left active is stored back into it. Guards created inside the future thus
/// survive across `.await` points without leaking to whoever polls it.
/// Dropping an unfinished `Scoped` also drops the inner future inside its own
/// context, so guards it still holds unwind into the right table.
#[pin_project(PinnedDrop)]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Scoped<F> {
    #[pin]
    inner: Option<F>,
    overrides: Option<Overrides>,
}

impl<F> Scoped<F> {
    /// Run `future` with `overrides` as its initial context.
    pub fn new(overrides: Overrides, future: F) -> Self {
        Self {
            inner: Some(future),
            overrides: Some(overrides),
        }
    }
}

/// Puts the task's snapshot back where it came from when a poll or drop ends,
/// including by panic.
struct Entered<'a> {
    slot: &'a mut Option<Overrides>,
    outer: Option<Overrides>,
}

impl<'a> Entered<'a> {
    fn enter(slot: &'a mut Option<Overrides>) -> Self {
        let task = slot.take().unwrap_or_default();
        let outer = Some(swap(task));
        Self { slot, outer }
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        if let Some(outer) = self.outer.take() {
            *self.slot = Some(swap(outer));
        }
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _entered = Entered::enter(this.overrides);
        match this.inner.as_pin_mut() {
            Some(inner) => inner.poll(cx),
            // only reachable while being dropped
            None => Poll::Pending,
        }
    }
}

#[pinned_drop]
impl<F> PinnedDrop for Scoped<F> {
    fn drop(self: Pin<&mut Self>) {
        let mut this = self.project();
        if this.inner.is_none() {
            return;
        }
        let _entered = Entered::enter(this.overrides);
        this.inner.set(None);
    }
}

/// Wrap `future` so it runs with a snapshot of the current overrides.
///
/// The snapshot is taken now, not when the future is first polled.
pub fn scoped<F: Future>(future: F) -> Scoped<F> {
    Scoped::new(current(), future)
}

/// Wrap `future` so it runs with the current overrides plus `namespace`
/// remapped to `variant`.
///
/// The async counterpart of [`replace_backoff`](super::replace_backoff): the
/// override holds for every poll of `future` and is never visible to the
/// code that polls it, or to sibling tasks.
pub fn scoped_with<F>(namespace: Option<&str>, variant: Variant, future: F) -> Scoped<F>
where
    F: Future,
{
    Scoped::new(current().with(namespace, variant), future)
}

/// `tokio::spawn` a task that inherits the current overrides.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(scoped(future))
}

/// `std::thread::spawn` a thread that inherits the current overrides.
pub fn spawn_thread<F, T>(f: F) -> std::thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let overrides = current();
    std::thread::spawn(move || {
        let _guard = overrides.enter();
        f()
    })
}
