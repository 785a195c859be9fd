use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A panic caught at a call or connection boundary.
#[derive(Debug, thiserror::Error)]
#[error("panic: {message}")]
pub struct PanicError {
    message: String,
    backtrace: String,
}

impl PanicError {
    /// The panic payload rendered as text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stack captured where the panic was recovered.
    pub fn backtrace(&self) -> &str {
        &self.backtrace
    }
}

/// Convert a panic payload into an error with a captured stack trace.
pub fn recover_panic(payload: Box<dyn Any + Send>) -> PanicError {
    let message = match payload.downcast::<String>() {
        Ok(text) => *text,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(text) => (*text).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    };
    PanicError {
        message,
        backtrace: Backtrace::force_capture().to_string(),
    }
}

/// Run `f`, turning a panic into [`PanicError`].
pub fn catch<T>(f: impl FnOnce() -> T) -> Result<T, PanicError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(recover_panic)
}
