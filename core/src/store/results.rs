use super::AnalysisStore;
use crate::{
    analyzer::AnalysisReport,
    error::{AnalysisError, AnalysisResult},
    persona::PersonaLabel,
    stats::RegressionRow,
    tipping::{TippingPoint, TippingPointMap},
    types::Outcome,
};
use rusqlite::params;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPersonaCount {
    pub persona: PersonaLabel,
    pub count: i64,
    pub percentage: f64,
}

impl AnalysisStore {
    // ── Analysis results ───────────────────────────────────────

    /// Persist a report against an existing run, replacing any earlier save.
    pub fn save_report(&self, run_id: &str, report: &AnalysisReport) -> AnalysisResult<()> {
        self.ensure_run(run_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM correlation_result WHERE run_id = ?1", params![run_id])?;
        tx.execute("DELETE FROM tipping_point WHERE run_id = ?1", params![run_id])?;
        tx.execute("DELETE FROM persona_count WHERE run_id = ?1", params![run_id])?;
        {
            let mut insert_corr = tx.prepare(
                "INSERT INTO correlation_result
                    (run_id, outcome, predictor, rank, correlation, t_stat, significant)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (outcome, rows) in &report.rankings {
                for (rank, row) in rows.iter().enumerate() {
                    insert_corr.execute(params![
                        run_id,
                        outcome.field(),
                        row.predictor,
                        rank as i64,
                        row.correlation,
                        row.t_stat,
                        row.significant,
                    ])?;
                }
            }

            let mut insert_tip = tx.prepare(
                "INSERT INTO tipping_point (run_id, outcome, predictor, threshold)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (outcome, points) in &report.tipping_points.points {
                for (predictor, point) in points {
                    insert_tip.execute(params![run_id, outcome.field(), predictor, point.threshold()])?;
                }
            }

            let mut insert_persona = tx.prepare(
                "INSERT INTO persona_count (run_id, persona, user_count, percentage)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (label, share) in &report.summary.persona_counts.personas {
                insert_persona.execute(params![run_id, label.as_str(), share.count as i64, share.percentage])?;
            }
        }
        tx.execute(
            "UPDATE analysis_run SET report_json = ?2 WHERE run_id = ?1",
            params![run_id, serde_json::to_string(report)?],
        )?;
        tx.commit()?;

        log::debug!("Saved report for run {run_id}");
        Ok(())
    }

    /// Regression rows for one outcome in rank order.
    pub fn regression_rows(&self, run_id: &str, outcome: Outcome) -> AnalysisResult<Vec<RegressionRow>> {
        self.ensure_run(run_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT predictor, correlation, t_stat, significant
             FROM correlation_result
             WHERE run_id = ?1 AND outcome = ?2
             ORDER BY rank",
        )?;
        let rows = stmt.query_map(params![run_id, outcome.field()], |row| {
            Ok(RegressionRow {
                outcome,
                predictor: row.get(0)?,
                correlation: row.get(1)?,
                t_stat: row.get(2)?,
                significant: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn tipping_points(&self, run_id: &str) -> AnalysisResult<TippingPointMap> {
        self.ensure_run(run_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT outcome, predictor, threshold FROM tipping_point WHERE run_id = ?1",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?;

        let mut points: BTreeMap<Outcome, BTreeMap<String, TippingPoint>> = BTreeMap::new();
        for row in rows {
            let (outcome, predictor, threshold) = row?;
            let outcome = Outcome::from_field(&outcome).ok_or(AnalysisError::CorruptRecord {
                table: "tipping_point",
                value: outcome,
            })?;
            let point = threshold.map_or(TippingPoint::NotApplicable, TippingPoint::Threshold);
            points.entry(outcome).or_default().insert(predictor, point);
        }
        Ok(TippingPointMap { points })
    }

    /// Persona counts in label order.
    pub fn persona_counts(&self, run_id: &str) -> AnalysisResult<Vec<StoredPersonaCount>> {
        self.ensure_run(run_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT persona, user_count, percentage FROM persona_count WHERE run_id = ?1",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, f64>(2)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (persona, count, percentage) = row?;
            let persona = PersonaLabel::parse(&persona).ok_or(AnalysisError::CorruptRecord {
                table: "persona_count",
                value: persona,
            })?;
            counts.push(StoredPersonaCount { persona, count, percentage });
        }
        counts.sort_by_key(|c| c.persona);
        Ok(counts)
    }

    /// The full report as saved, or None if the run has no report yet.
    pub fn load_report(&self, run_id: &str) -> AnalysisResult<Option<AnalysisReport>> {
        self.ensure_run(run_id)?;
        let json: Option<String> = self.conn.query_row(
            "SELECT report_json FROM analysis_run WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        json.map(|j| serde_json::from_str(&j).map_err(AnalysisError::from))
            .transpose()
    }
}
