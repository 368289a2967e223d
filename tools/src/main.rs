//! driver-runner: headless behavioral driver analysis.
//!
//! Usage:
//!   driver-runner --synthetic 5000 --seed 42
//!   driver-runner --users users.json --db analysis.db --out report.json
//!   driver-runner --data-dir ./data --run-id weekly-2026-10-16

use anyhow::{bail, Context, Result};
use driver_core::{
    analyzer::{AnalysisReport, DriverAnalyzer},
    config::AnalyzerConfig,
    persona::PersonaLabel,
    record::{ingest_rows, RawRow, UserRecord},
    store::{AnalysisRun, AnalysisStore},
    synthetic::SyntheticCohort,
    types::Outcome,
};
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let synthetic = parse_arg(&args, "--synthetic", 1000usize);
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let users_path = string_arg(&args, "--users");
    let out_path = string_arg(&args, "--out");
    let run_id = string_arg(&args, "--run-id");

    println!("Behavioral Driver Analyzer: driver-runner");
    println!("  data_dir:  {data_dir}");
    println!("  db:        {db}");
    match users_path {
        Some(path) => println!("  users:     {path}"),
        None => println!("  users:     synthetic x{synthetic} (seed {seed})"),
    }
    println!();

    let config = if Path::new(data_dir).is_dir() {
        AnalyzerConfig::load(data_dir)?
    } else {
        log::warn!("Data dir {data_dir} not found; using built-in config");
        AnalyzerConfig::builtin()
    };

    let users = match users_path {
        Some(path) => read_users(path, &config)?,
        None => SyntheticCohort::new(seed).generate(synthetic),
    };
    if users.is_empty() {
        bail!("no users to analyze");
    }

    let store = AnalysisStore::open(db)?;
    store.migrate()?;
    let (run, report) = analyze_batch(&store, config, &users, run_id)?;

    if let Some(path) = out_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("Cannot write {path}"))?;
        log::info!("Report written to {path}");
    }

    print_summary(&run, &report);
    Ok(())
}

/// Record one run: the batch is analyzed exactly as ingested, and the
/// stored users are a snapshot scoped to this run.
fn analyze_batch(
    store: &AnalysisStore,
    config: AnalyzerConfig,
    users: &[UserRecord],
    run_id: Option<&str>,
) -> Result<(AnalysisRun, AnalysisReport)> {
    let analyzer = DriverAnalyzer::new(config.clone())?;

    let run = match run_id {
        Some(id) => AnalysisRun::with_id(id, config, users.len()),
        None => AnalysisRun::new(config, users.len()),
    };
    store.insert_run(&run)?;
    store.insert_users(&run.run_id, users)?;

    let report = analyzer.analyze(users);
    store.save_report(&run.run_id, &report)?;
    Ok((run, report))
}

fn read_users(path: &str, config: &AnalyzerConfig) -> Result<Vec<UserRecord>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let rows: Vec<RawRow> =
        serde_json::from_str(&content).with_context(|| format!("{path} is not a JSON array of objects"))?;
    Ok(ingest_rows(&rows, &config.schema))
}

fn print_summary(run: &AnalysisRun, report: &AnalysisReport) {
    let summary = &report.summary;
    let top_n = run.config.regression.top_driver_count;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:      {}", run.run_id);
    println!("  created_at:  {}", run.created_at.to_rfc3339());
    println!("  users:       {}", summary.total_users);
    println!("  predictors:  {}", report.predictors.len());
    for outcome in Outcome::ALL {
        println!(
            "  {:<13} {:>6.1}% converted",
            outcome.label(),
            summary.conversion_rate(outcome) * 100.0
        );
    }

    println!();
    println!("=== PERSONAS ===");
    for label in PersonaLabel::ALL {
        println!(
            "  {:<18} {:>7}  ({:.1}%)",
            label.as_str(),
            summary.persona_counts.count(label),
            summary.persona_counts.share(label)
        );
    }

    println!();
    println!("=== TOP DRIVERS ===");
    for outcome in Outcome::ALL {
        let lines = driver_lines(report, outcome, top_n);
        if lines.is_empty() {
            println!("  {}: (no significant drivers)", outcome.label());
        }
        for line in lines {
            println!("  {line}");
        }
    }
}

fn driver_lines(report: &AnalysisReport, outcome: Outcome, top_n: usize) -> Vec<String> {
    report
        .top_drivers(outcome, top_n)
        .into_iter()
        .map(|row| {
            format!(
                "{} | {:<30} r={:+.3} t={:>6.2} tipping={}",
                outcome.label(),
                row.predictor,
                row.correlation,
                row.t_stat,
                report.tipping_points.get(outcome, &row.predictor)
            )
        })
        .collect()
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn store() -> AnalysisStore {
        let store = AnalysisStore::in_memory().expect("in-memory store");
        store.migrate().expect("migration");
        store
    }

    fn rows(values: Vec<serde_json::Value>) -> Vec<RawRow> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().expect("object row"))
            .collect()
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    /// Rows with no user id are each analyzed and stored on their own.
    #[test]
    fn rows_without_ids_are_all_analyzed() {
        let store = store();
        let config = AnalyzerConfig::builtin();
        let users = ingest_rows(
            &rows((0..5).map(|i| json!({"total_deposits": i * 10})).collect()),
            &config.schema,
        );

        let (run, report) = analyze_batch(&store, config.clone(), &users, Some("run-ids")).unwrap();

        assert_eq!(report.summary.total_users, 5);
        assert_eq!(run.user_count, 5);
        assert_eq!(store.user_count(&run.run_id).unwrap(), 5);
        assert_eq!(store.load_users(&run.run_id, &config.schema).unwrap(), users);
    }

    /// A second run against the same database sees only its own batch.
    #[test]
    fn batches_do_not_leak_between_runs() {
        let store = store();
        let config = AnalyzerConfig::builtin();
        let first = SyntheticCohort::new(1).generate(3);
        let second = SyntheticCohort::new(2).generate(2);

        analyze_batch(&store, config.clone(), &first, Some("run-a")).unwrap();
        let (run, report) = analyze_batch(&store, config.clone(), &second, Some("run-b")).unwrap();

        assert_eq!(report.user_count, 2);
        assert_eq!(report.summary.total_users, 2);
        assert_eq!(store.user_count("run-a").unwrap(), 3);
        assert_eq!(store.load_users(&run.run_id, &config.schema).unwrap(), second);
    }

    /// The configured driver count is honored above three.
    #[test]
    fn driver_listing_uses_configured_count() {
        let store = store();
        let mut config = AnalyzerConfig::builtin();
        config.regression.top_driver_count = 4;
        let drivers = [
            "app_sessions",
            "discover_tab_views",
            "leaderboard_tab_views",
            "premium_tab_views",
            "paywall_views",
        ];
        let users: Vec<UserRecord> = (0..40usize)
            .map(|i| {
                let mut user = UserRecord::new(format!("u{i}")).with_numeric("total_deposits", i as f64);
                for (k, field) in drivers.iter().enumerate() {
                    user = user.with_numeric(*field, (i + (i % 3) * (k + 1)) as f64);
                }
                user
            })
            .collect();

        let (run, report) = analyze_batch(&store, config, &users, None).unwrap();
        let top_n = run.config.regression.top_driver_count;
        assert_eq!(driver_lines(&report, Outcome::Deposits, top_n).len(), 4);
        assert!(driver_lines(&report, Outcome::Deposits, top_n)[0].contains("app_sessions"));
    }

    /// Repeated ids stay separate records.
    #[test]
    fn repeated_ids_are_not_merged() {
        let store = store();
        let config = AnalyzerConfig::builtin();
        let users = ingest_rows(
            &rows(vec![
                json!({"user_id": "dup", "total_deposits": 100}),
                json!({"user_id": "dup", "total_deposits": 0}),
            ]),
            &config.schema,
        );

        let (_, report) = analyze_batch(&store, config, &users, None).unwrap();
        assert_eq!(report.summary.total_users, 2);
        assert_eq!(report.summary.persona_counts.count(PersonaLabel::Core), 1);
    }
}
