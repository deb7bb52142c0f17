//! Outlier Detection Bridge
//!
//! Runs detector functions written in JavaScript inside an embedded QuickJS
//! runtime and hands their results back to Rust.
//!
//! ## Architecture
//!
//! - **Runtime:** one process-wide QuickJS runtime, created by [`initialize`]
//! - **Modules:** CommonJS-style sources from memory or the detector search path
//! - **FFI:** Zero-copy in both directions. Input is a `Float64Array` aliasing the
//!   caller's `&mut [f64]`; output is read straight out of a `BigInt64Array`
//! - **Lifetimes:** every runtime value that leaves a locked scope is a
//!   [`ForeignHandle`], released exactly once
//!
//! ```ignore
//! use outlier_bridge::{initialize, BridgeConfig};
//!
//! let state = initialize(BridgeConfig::from_env());
//! let zscore = state.resolve("detectors", "zscore")?;
//! let mut data = vec![1.0, 1.1, 0.9, 50.0, 1.05];
//! let result = state.detect(&zscore, &mut data)?;
//! assert_eq!(result.to_vec()?, vec![3]);
//! result.release();
//! ```

mod array;
pub mod config;
mod console;
pub mod detector;
pub mod error;
pub mod extract;
pub mod handle;
pub mod invoke;
pub mod loader;
pub mod report;
pub mod resolve;
pub mod runtime;

pub use config::{BridgeConfig, ModuleSettings, RuntimeLimits};
pub use detector::Detector;
pub use error::{
    ConfigError, DetectError, DetectorError, ExtractError, InitializationFailure, InvokeError,
    ResolveError,
};
pub use extract::DetectionResult;
pub use handle::ForeignHandle;
pub use report::last_error;
pub use resolve::ResolvedFunction;
pub use runtime::{initialize, runtime, try_initialize, RuntimeState};

pub use rquickjs;

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
