use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a [`Context`] is no longer usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The context was cancelled through a [`CancelHandle`].
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline and cancellation for a single blocking operation.
///
/// Clones share the same cancellation flag, so a context handed to a worker
/// can be cancelled from the thread that created it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

/// Cancels every clone of the [`Context`] it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Context {
    /// A context with no deadline that is never cancelled unless asked to.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context expiring at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The reason this context is done, if it is.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// `Err` once the context is cancelled or expired.
    pub fn check(&self) -> Result<(), ContextError> {
        self.err().map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_expires() {
        let ctx = Context::background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert_eq!(ctx.err(), None);
    }

    #[test]
    fn expired_deadline_reported() {
        let ctx = Context::with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn cancel_is_shared_by_clones() {
        let ctx = Context::with_timeout(Duration::from_secs(60));
        let clone = ctx.clone();
        let handle = ctx.cancel_handle();

        handle.cancel();

        assert_eq!(ctx.check(), Err(ContextError::Cancelled));
        assert!(clone.is_cancelled());
    }
}
