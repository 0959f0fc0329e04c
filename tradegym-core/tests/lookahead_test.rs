//! Look-ahead contamination tests for observations and rewards.
//!
//! Invariant: the observation handed to a policy before step t may not depend
//! on any row at or after t.
//!
//! Method: replay on a truncated series (rows 0..100) and on the full series
//! (rows 0..200) with the same actions. Every observation and reward produced
//! while both episodes are inside rows 0..100 must be identical.

use chrono::NaiveDate;
use tradegym_core::env::{EnvConfig, FeatureSpec, MarketEnvironment, Observation};
use tradegym_core::{Action, PriceSeries};

/// Deterministic pseudo-random walk using a simple LCG.
fn make_series(n: usize) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut price = 100.0;
    let mut closes = Vec::with_capacity(n);
    let mut volume = Vec::with_capacity(n);
    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        price += ((seed % 200) as f64 - 100.0) * 0.05;
        price = f64::max(price, 10.0);
        closes.push(price);
        volume.push(1000.0 + (i as f64 * 100.0));
    }
    let stamps = (0..n)
        .map(|i| base + chrono::Duration::days(i as i64))
        .collect();
    PriceSeries::from_closes(stamps, closes)
        .unwrap()
        .with_feature("volume", volume)
        .unwrap()
}

fn action_at(i: usize) -> Action {
    Action::ALL[(i * 7 + i / 3) % 3]
}

fn replay(series: &PriceSeries, config: &EnvConfig, steps: usize) -> Vec<(Observation, f64)> {
    let mut env = MarketEnvironment::new(series, config.clone()).unwrap();
    let mut obs = env.reset().unwrap();
    let mut out = Vec::new();
    for i in 0..steps {
        let outcome = env.step(action_at(i)).unwrap();
        out.push((obs, outcome.reward));
        obs = outcome.observation;
        if outcome.done {
            break;
        }
    }
    out
}

#[test]
fn observations_do_not_see_future_rows() {
    let full = make_series(200);
    let truncated = full.slice(0..100);
    let config = EnvConfig {
        look_back: 15,
        provision_rate: 0.001,
        features: vec![
            FeatureSpec::standardized("close"),
            FeatureSpec::normalized("volume"),
            FeatureSpec::identity("close"),
        ],
        ..EnvConfig::default()
    };

    let steps = 100 - config.look_back;
    let short = replay(&truncated, &config, steps);
    let long = replay(&full, &config, steps);

    assert_eq!(short.len(), steps);
    assert_eq!(short, long);
}

#[test]
fn identity_observation_is_exactly_the_preceding_rows() {
    let series = make_series(50);
    let config = EnvConfig {
        look_back: 5,
        features: vec![FeatureSpec::identity("close")],
        include_position: false,
        ..EnvConfig::default()
    };
    let mut env = MarketEnvironment::new(&series, config).unwrap();
    env.reset_at(10).unwrap();
    let t = env.current_step();
    assert_eq!(t, 15);
    let obs = env.observe().unwrap();
    assert_eq!(obs.values(), &series.closes()[t - 5..t]);
}
