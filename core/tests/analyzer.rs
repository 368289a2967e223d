use driver_core::{
    analyzer::DriverAnalyzer,
    config::AnalyzerConfig,
    persona::PersonaLabel,
    record::{ingest_rows, RawRow},
    synthetic::SyntheticCohort,
    tipping::{find_tipping_point, TippingPoint},
    types::Outcome,
};
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn analyzer() -> DriverAnalyzer {
    DriverAnalyzer::new(AnalyzerConfig::builtin()).expect("builtin config is valid")
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Every outcome × predictor cell is present and bounded.
#[test]
fn report_covers_every_pair() {
    init_logging();
    let users = SyntheticCohort::new(42).generate(2000);
    let analyzer = analyzer();
    let report = analyzer.analyze(&users);

    assert_eq!(report.user_count, 2000);
    assert_eq!(report.predictors, analyzer.predictors());
    for outcome in Outcome::ALL {
        let cells = &report.correlations[&outcome];
        assert_eq!(cells.len(), analyzer.predictors().len());
        for (predictor, cell) in cells {
            assert!(
                (-1.0..=1.0).contains(&cell.correlation),
                "{outcome}/{predictor}: r = {}",
                cell.correlation
            );
            assert_eq!(cell.significant, cell.t_stat.abs() > 1.96);
        }
        assert_eq!(report.ranking(outcome).len(), analyzer.predictors().len());
        assert_eq!(report.tipping_points.points[&outcome].len(), analyzer.predictors().len());
    }
}

/// Rankings and the cell map agree, and rankings are |r|-descending.
#[test]
fn rankings_agree_with_cells() {
    let users = SyntheticCohort::new(3).generate(1500);
    let report = analyzer().analyze(&users);

    for outcome in Outcome::ALL {
        let ranking = report.ranking(outcome);
        for pair in ranking.windows(2) {
            assert!(pair[0].correlation.abs() >= pair[1].correlation.abs());
        }
        for row in ranking {
            let cell = report.entry(outcome, &row.predictor).unwrap();
            assert_eq!(cell.correlation, row.correlation);
            assert_eq!(cell.t_stat, row.t_stat);
        }
    }
}

/// The synthetic cohort links banks before depositing, so linking is a driver.
#[test]
fn linked_bank_drives_deposits() {
    let users = SyntheticCohort::new(11).generate(3000);
    let report = analyzer().analyze(&users);

    let cell = report.entry(Outcome::Deposits, "has_linked_bank").unwrap();
    assert!(cell.correlation > 0.0, "r = {}", cell.correlation);
    assert!(cell.significant, "t = {}", cell.t_stat);

    let top = report.top_drivers(Outcome::Deposits, 5);
    assert!(!top.is_empty());
    assert!(top.len() <= 5);
    assert!(top.iter().all(|r| r.significant && r.correlation > 0.0));
}

/// The map's tipping points match direct per-pair detection.
#[test]
fn tipping_points_match_direct_detection() {
    let users = SyntheticCohort::new(5).generate(1000);
    let analyzer = analyzer();
    let report = analyzer.analyze(&users);
    let config = &analyzer.config().tipping_point;

    for outcome in Outcome::ALL {
        for predictor in analyzer.predictors() {
            assert_eq!(
                report.tipping_points.get(outcome, predictor),
                find_tipping_point(&users, predictor, outcome, config)
            );
        }
    }
}

/// Analysis is a pure function of its input.
#[test]
fn same_input_same_report() {
    let users = SyntheticCohort::new(0xD00D).generate(800);
    let analyzer = analyzer();
    assert_eq!(analyzer.analyze(&users), analyzer.analyze(&users));
}

/// Degenerate tables never panic; everything resolves to sentinels.
#[test]
fn empty_table_resolves_to_sentinels() {
    let report = analyzer().analyze(&[]);
    assert_eq!(report.summary.total_users, 0);
    for outcome in Outcome::ALL {
        for row in report.ranking(outcome) {
            assert_eq!(row.correlation, 0.0);
            assert_eq!(row.t_stat, 0.0);
            assert!(!row.significant);
            assert_eq!(report.tipping_points.get(outcome, &row.predictor), TippingPoint::NotApplicable);
        }
        assert!(report.top_drivers(outcome, 3).is_empty());
    }
}

/// Raw rows flow through ingestion; opted-in extensions become predictors.
#[test]
fn extension_columns_are_analyzed_when_opted_in() {
    init_logging();
    let rows: Vec<RawRow> = (0..40)
        .map(|i| {
            let referrals = if i % 2 == 0 { i } else { 0 };
            json!({
                "user_id": format!("u{i}"),
                "total_deposits": referrals * 10,
                "referral_count": referrals,
                "unlisted_column": "ignored"
            })
            .as_object()
            .cloned()
            .unwrap()
        })
        .collect();

    let mut config = AnalyzerConfig::builtin();
    config.schema = config.schema.with_extensions(["referral_count"]);
    let users = ingest_rows(&rows, &config.schema);
    let analyzer = DriverAnalyzer::new(config).unwrap();
    let report = analyzer.analyze(&users);

    assert!(report.predictors.iter().any(|p| p == "referral_count"));
    assert!(!report.predictors.iter().any(|p| p == "unlisted_column"));
    let cell = report.entry(Outcome::Deposits, "referral_count").unwrap();
    assert!(cell.correlation > 0.9, "r = {}", cell.correlation);
}

/// Invalid configs are rejected at construction.
#[test]
fn invalid_config_is_rejected() {
    let mut config = AnalyzerConfig::builtin();
    config.regression.significance_threshold = -1.0;
    assert!(DriverAnalyzer::new(config).is_err());
}

/// JSON report matches the rendering contract.
#[test]
fn report_json_shape() {
    let users = SyntheticCohort::new(8).generate(500);
    let report = analyzer().analyze(&users);
    let value = serde_json::to_value(&report).unwrap();

    let cell = &value["correlations"]["total_deposits"]["regular_pdp_views"];
    assert!(cell["correlation"].is_number());
    assert!(cell["tStat"].is_number());
    assert!(cell["significant"].is_boolean());

    let tip = &value["tipping_points"]["total_subscriptions"]["paywall_views"];
    assert!(tip.is_number() || tip == "N/A", "unexpected tipping point {tip}");

    assert!(value["summary"]["total_users"].is_number());
    assert!(value["summary"]["persona_counts"]["personas"]["activation-target"]["count"].is_number());
    assert!(value["summary"]["demographic_breakdowns"]["income"]["respondents"].is_number());
}

/// Unclassified users are counted, not dropped.
#[test]
fn unclassified_users_are_counted() {
    init_logging();
    let rows: Vec<RawRow> = (0..10)
        .map(|i| {
            json!({ "user_id": format!("c{i}"), "total_copies": 1 })
                .as_object()
                .cloned()
                .unwrap()
        })
        .collect();
    let config = AnalyzerConfig::builtin();
    let users = ingest_rows(&rows, &config.schema);
    let report = DriverAnalyzer::new(config).unwrap().analyze(&users);
    assert_eq!(report.summary.persona_counts.count(PersonaLabel::Unclassified), 10);
}
