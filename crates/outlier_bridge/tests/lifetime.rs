//! Reference accounting across the runtime boundary
//!
//! These tests compare the runtime's live object count before and after a
//! sequence of calls, so they run one at a time.

use outlier_bridge::{initialize, BridgeConfig, DetectError, ResolveError, RuntimeState};
use serial_test::serial;

const PROBE: &str = r#"
exports.identity = (data) => {
  const out = new BigInt64Array(data.length);
  for (let i = 0; i < data.length; i++) out[i] = BigInt(i);
  return out;
};
exports.boom = () => { throw new TypeError("bad input"); };
exports.plain = () => [1, 2, 3];
exports.alias = (data) => new BigInt64Array(data.buffer);
"#;

fn state() -> &'static RuntimeState {
    let state = initialize(BridgeConfig::default());
    state.register_module("probe", PROBE).expect("register");
    state
}

#[test]
#[serial]
fn failed_resolve_leaves_nothing_behind() {
    let state = state();
    // first failure may warm internal caches
    let _ = state.resolve("nonexistent_mod", "detect");
    let _ = state.resolve("probe", "missing");

    let before = state.live_objects();
    for _ in 0..10 {
        let err = state.resolve("nonexistent_mod", "detect").unwrap_err();
        assert!(matches!(err, ResolveError::ModuleNotFound { .. }));
        let err = state.resolve("probe", "missing").unwrap_err();
        assert!(matches!(err, ResolveError::FunctionNotFound { .. }));
    }
    assert_eq!(state.live_objects(), before);
}

#[test]
#[serial]
fn release_restores_the_object_count() {
    let state = state();
    let identity = state.resolve("probe", "identity").expect("resolve");
    let mut data = vec![1.0; 32];
    state.detect(&identity, &mut data).expect("warm up").release();

    let before = state.live_objects();
    let result = state.detect(&identity, &mut data).expect("detect");
    assert!(state.live_objects() > before, "result must stay alive until released");

    assert_eq!(result.count(), 32);
    result.release();
    assert_eq!(state.live_objects(), before);
}

#[test]
#[serial]
fn dropping_a_result_releases_it() {
    let state = state();
    let identity = state.resolve("probe", "identity").expect("resolve");
    let mut data = vec![1.0; 4];
    state.detect(&identity, &mut data).expect("warm up").release();

    let before = state.live_objects();
    {
        let result = state.detect(&identity, &mut data).expect("detect");
        assert_eq!(result.to_vec().expect("indices"), vec![0, 1, 2, 3]);
    }
    assert_eq!(state.live_objects(), before);
}

#[test]
#[serial]
fn failed_calls_release_everything() {
    let state = state();
    let boom = state.resolve("probe", "boom").expect("resolve");
    let plain = state.resolve("probe", "plain").expect("resolve");
    let alias = state.resolve("probe", "alias").expect("resolve");
    let mut data = vec![1.0, 2.0];
    let _ = state.detect(&boom, &mut data);
    let _ = state.detect(&plain, &mut data);
    let _ = state.detect(&alias, &mut data);

    let before = state.live_objects();
    for _ in 0..5 {
        assert!(matches!(state.detect(&boom, &mut data), Err(DetectError::Invoke(_))));
        assert!(matches!(state.detect(&plain, &mut data), Err(DetectError::Invoke(_))));
        assert!(state.detect(&alias, &mut data).is_err());
    }
    assert_eq!(state.live_objects(), before);
}

#[test]
#[serial]
fn releasing_a_resolved_function_keeps_the_module() {
    let state = state();
    let identity = state.resolve("probe", "identity").expect("resolve");
    let before = state.live_objects();

    let again = state.resolve("probe", "identity").expect("resolve");
    again.release();
    assert_eq!(state.live_objects(), before);

    let mut data = vec![0.0; 2];
    let result = state.detect(&identity, &mut data).expect("detect");
    assert_eq!(result.to_vec().expect("indices"), vec![0, 1]);
}
