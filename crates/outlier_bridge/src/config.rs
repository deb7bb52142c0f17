//! Bridge configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding extra detector search paths (path-list syntax).
pub const PATH_VAR: &str = "DETECTOR_PATH";

/// Runtime settings, fixed at initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub modules: ModuleSettings,
    pub limits: RuntimeLimits,
    /// Forward detector `console.*` calls to `tracing`.
    pub console: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Directories searched, in order, for `<name>.js`.
    pub search_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLimits {
    pub memory_limit: Option<usize>,
    pub gc_threshold: Option<usize>,
    /// QuickJS measures this from the thread that created the runtime, so it
    /// stays off unless every call comes from that thread.
    pub max_stack_size: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            modules: ModuleSettings::default(),
            limits: RuntimeLimits::default(),
            console: true,
        }
    }
}

impl BridgeConfig {
    /// Defaults plus any search paths listed in `DETECTOR_PATH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(paths) = std::env::var_os(PATH_VAR) {
            config
                .modules
                .search_paths
                .extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        config
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.modules.search_paths.push(path.into());
        self
    }
}
