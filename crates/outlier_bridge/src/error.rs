use std::path::PathBuf;
use thiserror::Error;

/// The runtime could not be brought up. Never retried: the first outcome of
/// initialization is kept for the life of the process.
#[derive(Debug, Clone, Error)]
pub enum InitializationFailure {
    #[error("failed to create the script runtime: {0}")]
    Runtime(String),

    #[error("failed to create the script context: {0}")]
    Context(String),

    #[error("typed array support is unavailable: {0}")]
    ArraySupport(String),

    #[error("failed to install host bindings: {0}")]
    Bindings(String),
}

/// Errors that can occur while resolving `module.function` to a callable.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("module '{module}' not found: {message}")]
    ModuleNotFound { module: String, message: String },

    #[error("module '{module}' failed to load: {message}")]
    ImportFailed { module: String, message: String },

    #[error("function '{function}' not found in module '{module}': {message}")]
    FunctionNotFound {
        module: String,
        function: String,
        message: String,
    },

    #[error("'{module}.{function}' is not callable: {message}")]
    NotCallable {
        module: String,
        function: String,
        message: String,
    },
}

/// Errors raised while calling a resolved detector.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to expose input array: {0}")]
    ArrayView(String),

    #[error("stale function handle: {0}")]
    Handle(String),

    #[error("detector raised: {message}")]
    RuntimeRaised { message: String },

    #[error("detector returned {found}, expected a BigInt64Array of indices")]
    UnexpectedReturnType { found: String },
}

/// The detector returned something that cannot be read as an index buffer.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("result is {found}, expected a BigInt64Array of indices")]
    NotIndexArray { found: String },

    #[error("result reports an invalid length {reported}")]
    InvalidLength { reported: f64 },

    #[error("result reports {reported} elements but its storage holds {actual}")]
    LengthMismatch { reported: usize, actual: usize },

    #[error("result storage is detached")]
    Detached,

    #[error("result storage is not a valid i64 buffer: {0}")]
    Layout(String),

    #[error("failed to query result size: {0}")]
    Size(String),

    #[error("the embedded runtime is not initialized")]
    Uninitialized,

    #[error("index {index} is outside the input of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
}

/// A single detection call failed, either in the detector or while reading its result.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Errors from building a [`crate::Detector`].
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    Init(#[from] InitializationFailure),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_runtime_is_not_a_size_error() {
        let err = ExtractError::Uninitialized;
        assert_eq!(err.to_string(), "the embedded runtime is not initialized");
        assert!(!matches!(err, ExtractError::Size(_)));
    }

    #[test]
    fn detect_error_is_transparent() {
        let err = DetectError::from(ExtractError::Detached);
        assert_eq!(err.to_string(), "result storage is detached");
    }
}
