//! Outlier detection host
//!
//! Boots the embedded runtime with the current directory on the detector
//! search path, runs `<module>.<function>` over the given samples and prints
//! the flagged indices.
//!
//! ```text
//! outlier [module] [function] [samples...]
//! ```
//!
//! Without samples it generates 1000 values in [0, 1) with outliers planted at
//! 7, 113 and 835. `OUTLIER_CONFIG` names a JSON config file.

use anyhow::{Context, Result};
use outlier_bridge::{BridgeConfig, Detector};
use std::path::Path;

const PLANTED: [(usize, f64); 3] = [(7, 97.3), (113, 92.1), (835, 93.2)];

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Outlier bridge v{}", outlier_bridge::VERSION);

    let mut args = std::env::args().skip(1);
    let module = args.next().unwrap_or_else(|| "outliers".to_string());
    let function = args.next().unwrap_or_else(|| "detect".to_string());
    let mut data = args
        .map(|arg| {
            arg.parse::<f64>()
                .with_context(|| format!("invalid sample '{arg}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    if data.is_empty() {
        data = sample_data(1000);
    }

    let config = match std::env::var_os("OUTLIER_CONFIG") {
        Some(path) => BridgeConfig::load(Path::new(&path))?,
        None => BridgeConfig::from_env(),
    };
    let config = config.with_search_path(std::env::current_dir()?);

    let state = outlier_bridge::initialize(config);
    let detector = Detector::with_state(state, &module, &function)
        .with_context(|| format!("can't load '{module}.{function}'"))?;

    let indices = detector
        .detect(&mut data)
        .with_context(|| format!("can't call '{module}.{function}'"))?;
    tracing::info!(samples = data.len(), flagged = indices.len(), "detection finished");

    println!("{indices:?}");
    Ok(())
}

/// Deterministic noise in [0, 1) with a few large values.
fn sample_data(len: usize) -> Vec<f64> {
    let mut data: Vec<f64> = (0..len)
        .map(|i| ((i * 7919 + 13) % 1000) as f64 / 1000.0)
        .collect();
    for (index, value) in PLANTED {
        if index < len {
            data[index] = value;
        }
    }
    data
}
