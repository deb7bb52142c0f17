//! High-level detector wrapper

use crate::config::BridgeConfig;
use crate::error::{DetectError, DetectorError, ExtractError, ResolveError};
use crate::resolve::ResolvedFunction;
use crate::runtime::{self, RuntimeState};

/// A resolved detector that returns owned indices.
///
/// ```ignore
/// let detector = Detector::new("outliers", "detect")?;
/// let indices = detector.detect(&mut data)?;
/// ```
#[derive(Debug)]
pub struct Detector {
    state: &'static RuntimeState,
    function: ResolvedFunction,
}

impl Detector {
    /// Resolve `module.function`, initializing the runtime from the
    /// environment first if nothing else has.
    pub fn new(module: &str, function: &str) -> Result<Self, DetectorError> {
        let state = runtime::try_initialize(BridgeConfig::from_env())?;
        Ok(Self::with_state(state, module, function)?)
    }

    pub fn with_state(
        state: &'static RuntimeState,
        module: &str,
        function: &str,
    ) -> Result<Self, ResolveError> {
        let function = state.resolve(module, function)?;
        Ok(Self { state, function })
    }

    pub fn function(&self) -> &ResolvedFunction {
        &self.function
    }

    /// Run the detector over `data` and return the flagged positions.
    ///
    /// Every index must fall inside `data`.
    pub fn detect(&self, data: &mut [f64]) -> Result<Vec<usize>, DetectError> {
        let len = data.len();
        let result = self.state.detect(&self.function, data)?;
        let indices = result.with_indices(|indices| {
            indices
                .iter()
                .map(|&index| {
                    usize::try_from(index)
                        .ok()
                        .filter(|&i| i < len)
                        .ok_or(ExtractError::IndexOutOfRange { index, len })
                })
                .collect::<Result<Vec<_>, _>>()
        });
        result.release();
        Ok(indices??)
    }
}
