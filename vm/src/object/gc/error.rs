use thiserror::Error;

/// The error type user callbacks (finalizers, weakref callbacks, progress callbacks) return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GcError {
    #[error("invalid generation {0}")]
    InvalidGeneration(usize),
    #[error("expected 1 to 3 thresholds, got {0}")]
    InvalidThresholdCount(usize),
    #[error("out of memory while building the {what} list")]
    AllocFailed { what: &'static str },
}

/// An error raised by user code where nobody can catch it, handed to the collector's unraisable hook.
#[derive(Debug, Error)]
#[error("exception ignored in {context}: {source}")]
pub struct UnraisableError {
    pub context: String,
    #[source]
    pub source: CallbackError,
}
