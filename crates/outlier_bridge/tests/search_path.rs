//! Loading detectors from directories on the search path

use once_cell::sync::Lazy;
use outlier_bridge::{initialize, BridgeConfig, ResolveError, RuntimeState};
use std::fs;
use tempfile::TempDir;

const OUTLIERS: &str = include_str!("../../../demos/outliers.js");

static ROOT: Lazy<TempDir> = Lazy::new(|| {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("outliers.js"), OUTLIERS).expect("write outliers.js");
    fs::create_dir(dir.path().join("pkg")).expect("mkdir pkg");
    fs::write(
        dir.path().join("pkg").join("nested.js"),
        "exports.first = () => BigInt64Array.of(0n);",
    )
    .expect("write nested.js");
    dir
});

fn state() -> &'static RuntimeState {
    initialize(BridgeConfig::default().with_search_path(ROOT.path()))
}

#[test]
fn demo_detector_loads_from_disk() {
    let state = state();
    let detect = state.resolve("outliers", "detect").expect("resolve");

    let mut data = vec![1.0, 1.1, 0.9, 1.05, 0.95, 1.0, 1.02, 0.98, 50.0];
    let result = state.detect(&detect, &mut data).expect("detect");
    assert_eq!(result.to_vec().expect("indices"), vec![8]);
}

#[test]
fn dotted_names_load_nested_files() {
    let state = state();
    let first = state.resolve("pkg.nested", "first").expect("resolve");

    let mut data = vec![3.0];
    assert_eq!(state.detect(&first, &mut data).expect("detect").to_vec().expect("indices"), vec![0]);
}

#[test]
fn paths_added_after_startup_are_searched() {
    let state = state();
    let extra = tempfile::tempdir().expect("tempdir");
    fs::write(extra.path().join("late.js"), "exports.none = () => new BigInt64Array(0);")
        .expect("write late.js");

    assert!(matches!(
        state.resolve("late", "none"),
        Err(ResolveError::ModuleNotFound { .. })
    ));

    state.add_search_path(extra.path());
    let none = state.resolve("late", "none").expect("resolve");
    let mut data = vec![1.0, 2.0];
    assert!(state.detect(&none, &mut data).expect("detect").is_empty());
}

#[test]
fn config_lists_the_startup_path() {
    let state = state();
    assert_eq!(state.config().modules.search_paths, vec![ROOT.path().to_path_buf()]);
}
