use std::error::Error;
use std::fmt;

/// The failure surfaced by a retried call.
///
/// Wraps the operation's final error together with the failures of every
/// earlier attempt in the same logical call. The chain is exposed through
/// [`Error::source`], newest to oldest, so any standard error reporter shows
/// the retry history:
///
/// ```text
/// IndexError
///   caused by: ValueError
///   caused by: TypeError
/// ```
///
/// When the operation failed only once, `Failure` behaves like its inner error.
///
/// # Examples
///
/// ```rust
/// use rebound_core::error::Failure;
///
/// let first = Failure::new("timeout");
/// let last = Failure::caused_by("reset", first);
///
/// assert_eq!(*last.error(), "reset");
/// assert_eq!(last.history(), vec![&"timeout"]);
/// assert_eq!(last.chain_len(), 2);
/// ```
pub struct Failure<E> {
    error: E,
    cause: Cause<E>,
}

/// Link to the previous failure.
///
/// Unlinks the chain one node at a time when dropped, so arbitrarily long
/// histories are released without recursing.
struct Cause<E>(Option<Box<Failure<E>>>);

impl<E> Drop for Cause<E> {
    fn drop(&mut self) {
        let mut next = self.0.take();
        while let Some(mut link) = next {
            next = link.cause.0.take();
        }
    }
}

impl<E> Failure<E> {
    /// A failure with no earlier history.
    pub fn new(error: E) -> Self {
        Self {
            error,
            cause: Cause(None),
        }
    }

    /// A failure that follows `cause` in the same logical call.
    pub fn caused_by(error: E, cause: Failure<E>) -> Self {
        Self {
            error,
            cause: Cause(Some(Box::new(cause))),
        }
    }

    pub(crate) fn chained(error: E, cause: Option<Failure<E>>) -> Self {
        Self {
            error,
            cause: Cause(cause.map(Box::new)),
        }
    }

    /// The error of the final attempt.
    pub fn error(&self) -> &E {
        &self.error
    }

    /// Discard the history and return the final error.
    pub fn into_inner(self) -> E {
        self.error
    }

    /// The failure immediately before this one, if any.
    pub fn cause(&self) -> Option<&Failure<E>> {
        self.cause.0.as_deref()
    }

    /// Every earlier error, oldest first. Does not include [`Failure::error`].
    pub fn history(&self) -> Vec<&E> {
        let mut earlier: Vec<&E> = self.causes().map(|f| &f.error).collect();
        earlier.reverse();
        earlier
    }

    /// Every error of the call, oldest first, ending with the final one.
    pub fn errors(&self) -> Vec<&E> {
        let mut all = self.history();
        all.push(&self.error);
        all
    }

    /// Number of failures in the chain, including this one.
    pub fn chain_len(&self) -> usize {
        1 + self.causes().count()
    }

    fn causes(&self) -> impl Iterator<Item = &Failure<E>> {
        std::iter::successors(self.cause(), |f| f.cause())
    }

    /// This failure followed by every earlier one, newest first.
    fn links(&self) -> impl Iterator<Item = &Failure<E>> {
        std::iter::successors(Some(self), |f| f.cause())
    }
}

// Clone, PartialEq and Debug walk the chain iteratively.

impl<E: Clone> Clone for Failure<E> {
    fn clone(&self) -> Self {
        let cause = self
            .history()
            .into_iter()
            .fold(None, |cause, error| Some(Failure::chained(error.clone(), cause)));
        Failure::chained(self.error.clone(), cause)
    }
}

impl<E: PartialEq> PartialEq for Failure<E> {
    fn eq(&self, other: &Self) -> bool {
        self.links()
            .map(|f| &f.error)
            .eq(other.links().map(|f| &f.error))
    }
}

impl<E: fmt::Debug> fmt::Debug for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("error", &self.error)
            .field("history", &self.history())
            .finish()
    }
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<E> Error for Failure<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause().map(|cause| cause as &(dyn Error + 'static))
    }
}
