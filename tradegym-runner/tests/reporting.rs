use chrono::{Duration, NaiveDate};
use tradegym_core::policy::FixedPolicy;
use tradegym_core::{PriceSeries, WindowSpan};
use tradegym_runner::report::{read_jsonl, write_csv, write_jsonl};
use tradegym_runner::{
    compare_with_benchmarks, BacktestOrchestrator, BacktestParams, SweepBatch, SweepConfig,
};

fn sweep(policy: &FixedPolicy, closes: &[f64]) -> SweepBatch {
    let base = NaiveDate::from_ymd_opt(2021, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let stamps = (0..closes.len())
        .map(|i| base + Duration::days(i as i64))
        .collect();
    let series = PriceSeries::from_closes(stamps, closes.to_vec()).unwrap();
    let config = SweepConfig {
        workers: 2,
        window_span: WindowSpan::Months(1),
        params: BacktestParams {
            look_back: 4,
            ..BacktestParams::default()
        },
        ..SweepConfig::default()
    };
    BacktestOrchestrator::new(&config)
        .unwrap()
        .run_series(policy, &series, "test")
        .unwrap()
}

#[test]
fn jsonl_round_trip_keeps_nan_metrics() {
    let batch = sweep(&FixedPolicy::stay_flat(), &[20.0; 70]);
    let rows = batch.results.rows();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.result.sharpe.is_nan()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.jsonl");
    write_jsonl(&path, &rows).unwrap();
    let back = read_jsonl(&path).unwrap();

    assert_eq!(back.len(), rows.len());
    for (a, b) in rows.iter().zip(&back) {
        assert_eq!(a.run, b.run);
        assert_eq!(a.result.label, b.result.label);
        assert_eq!(a.result.final_balance, b.result.final_balance);
        assert!(b.result.sharpe.is_nan());
        assert!(b.result.calmar.is_nan());
    }
}

#[test]
fn csv_file_has_one_line_per_row() {
    let closes: Vec<f64> = (0..90).map(|i| 30.0 + (i as f64 * 0.15).sin()).collect();
    let batch = sweep(&FixedPolicy::buy_and_hold(), &closes);
    let rows = batch.results.rows();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("results.csv");
    assert!(write_csv(&path, &rows).is_err());

    let path = dir.path().join("results.csv");
    write_csv(&path, &rows).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), rows.len() + 1);
    assert!(text.lines().skip(1).all(|l| l.contains("BuyAndHold")));
}

#[test]
fn missing_jsonl_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_jsonl(dir.path().join("absent.jsonl")).unwrap_err();
    assert!(err.to_string().contains("absent.jsonl"));
}

#[test]
fn agent_is_compared_against_both_benchmarks() {
    let closes: Vec<f64> = (0..70).map(|i| 10.0 + i as f64 * 0.05).collect();
    let agent = sweep(&FixedPolicy::buy_and_hold(), &closes);
    let long = sweep(&FixedPolicy::buy_and_hold(), &closes);
    let short = sweep(&FixedPolicy::sell_and_hold(), &closes);

    let cmp = compare_with_benchmarks(&agent.results, &[&long.results, &short.results]);
    assert_eq!(cmp.len(), agent.results.len() * 2);
    for row in cmp.iter().filter(|c| c.benchmark == "BuyAndHold") {
        assert_eq!(row.excess_balance, Some(0.0));
    }
    for row in cmp.iter().filter(|c| c.benchmark == "SellAndHold") {
        // Rising market: long beats short.
        assert!(row.excess_balance.unwrap() > 0.0);
    }
}
