//! Detection from several threads through one shared function

use outlier_bridge::{initialize, last_error, BridgeConfig, ResolveError, RuntimeState};

const ZSCORE: &str = r#"
exports.zscore = (data) => {
  let m = 0;
  for (const v of data) m += v;
  m /= data.length;
  let acc = 0;
  for (const v of data) acc += (v - m) * (v - m);
  const s = Math.sqrt(acc / data.length);
  const out = [];
  for (let i = 0; i < data.length; i++) {
    if (Math.abs(data[i] - m) > 1.5 * s) out.push(BigInt(i));
  }
  return BigInt64Array.from(out);
};
"#;

const THREADS: usize = 8;
const CALLS: usize = 25;

fn state() -> &'static RuntimeState {
    let state = initialize(BridgeConfig::default());
    state.register_module("concurrent", ZSCORE).expect("register");
    state
}

fn sample(seed: usize) -> (Vec<f64>, Vec<i64>) {
    let mut data: Vec<f64> = (0..64)
        .map(|i| ((i * 37 + seed * 11) % 17) as f64 / 17.0)
        .collect();
    let mut spikes = vec![seed * 3 + 1, 40 + seed];
    spikes.sort_unstable();
    for &i in &spikes {
        data[i] = 100.0;
    }
    (data, spikes.into_iter().map(|i| i as i64).collect())
}

#[test]
fn concurrent_calls_match_sequential_calls() {
    let state = state();
    let zscore = state.resolve("concurrent", "zscore").expect("resolve");

    let cases: Vec<(Vec<f64>, Vec<i64>)> = (0..THREADS).map(sample).collect();
    for (data, planted) in &cases {
        let mut data = data.clone();
        let result = state.detect(&zscore, &mut data).expect("sequential detect");
        assert_eq!(&result.to_vec().expect("indices"), planted);
    }

    std::thread::scope(|scope| {
        for (data, planted) in &cases {
            let zscore = &zscore;
            scope.spawn(move || {
                for _ in 0..CALLS {
                    let mut input = data.clone();
                    let result = state.detect(zscore, &mut input).expect("detect");
                    assert_eq!(&result.to_vec().expect("indices"), planted);
                    result.release();
                }
            });
        }
    });
}

#[test]
fn errors_stay_on_their_own_thread() {
    let state = state();

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            scope.spawn(move || {
                let module = format!("missing_{t}");
                let err = state.resolve(&module, "detect").unwrap_err();
                assert!(matches!(err, ResolveError::ModuleNotFound { .. }));
                let message = last_error().expect("diagnostic");
                assert!(message.contains(&module), "{message}");
            });
        }
    });
}

#[test]
fn results_can_be_released_on_another_thread() {
    let state = state();
    let zscore = state.resolve("concurrent", "zscore").expect("resolve");
    let (mut data, planted) = sample(2);
    let result = state.detect(&zscore, &mut data).expect("detect");

    let read = std::thread::spawn(move || {
        let indices = result.to_vec().expect("indices");
        result.release();
        indices
    })
    .join()
    .expect("join");
    assert_eq!(read, planted);
}
