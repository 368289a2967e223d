//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The analyzer never executes SQL. Callers analyze their in-memory
//! batch, then hand the run, its users and its report here for saving.
//! Stored users are always scoped to the run that analyzed them.

mod results;

use crate::{
    config::AnalyzerConfig,
    error::{AnalysisError, AnalysisResult},
    record::UserRecord,
    schema::FieldSchema,
    types::RunId,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

pub use results::StoredPersonaCount;

/// Metadata for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRun {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub user_count: usize,
    pub config: AnalyzerConfig,
}

impl AnalysisRun {
    /// A fresh run with a random id, stamped now.
    pub fn new(config: AnalyzerConfig, user_count: usize) -> Self {
        Self::with_id(format!("run-{}", uuid::Uuid::new_v4()), config, user_count)
    }

    pub fn with_id(run_id: impl Into<RunId>, config: AnalyzerConfig, user_count: usize) -> Self {
        Self {
            run_id: run_id.into(),
            created_at: Utc::now(),
            user_count,
            config,
        }
    }
}

pub struct AnalysisStore {
    conn: Connection,
}

impl AnalysisStore {
    pub fn open(path: &str) -> AnalysisResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only matters for real files; memory databases ignore it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AnalysisResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AnalysisResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_users.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_analysis.sql"))?;
        Ok(())
    }

    // ── Users ──────────────────────────────────────────────────

    /// Store the batch a run analyzed, in row order. Rows are keyed by
    /// position, so blank or repeated user ids never merge. Saving again
    /// for the same run replaces the earlier snapshot.
    pub fn insert_users(&self, run_id: &str, users: &[UserRecord]) -> AnalysisResult<()> {
        self.ensure_run(run_id)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM user_record WHERE run_id = ?1", params![run_id])?;
        {
            let mut insert_user =
                tx.prepare("INSERT INTO user_record (run_id, row_index, user_id) VALUES (?1, ?2, ?3)")?;
            let mut insert_numeric = tx.prepare(
                "INSERT INTO user_numeric (run_id, row_index, field, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut insert_categorical = tx.prepare(
                "INSERT INTO user_categorical (run_id, row_index, field, value) VALUES (?1, ?2, ?3, ?4)",
            )?;

            for (index, user) in users.iter().enumerate() {
                let index = index as i64;
                insert_user.execute(params![run_id, index, user.user_id])?;
                for (field, value) in user.numeric_fields() {
                    insert_numeric.execute(params![run_id, index, field, value])?;
                }
                for (field, value) in user.categorical_fields() {
                    insert_categorical.execute(params![run_id, index, field, value])?;
                }
            }
        }
        tx.commit()?;
        log::debug!("Stored {} user record(s) for run {run_id}", users.len());
        Ok(())
    }

    /// Load the batch stored for a run, in row order. Only fields the
    /// schema knows are read back; absent numeric fields read as 0.
    pub fn load_users(&self, run_id: &str, schema: &FieldSchema) -> AnalysisResult<Vec<UserRecord>> {
        self.ensure_run(run_id)?;
        let mut ids_stmt = self
            .conn
            .prepare("SELECT row_index, user_id FROM user_record WHERE run_id = ?1 ORDER BY row_index")?;
        let rows: Vec<(i64, String)> = ids_stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;

        let mut numeric: HashMap<i64, Vec<(String, f64)>> = HashMap::new();
        let mut num_stmt = self
            .conn
            .prepare("SELECT row_index, field, value FROM user_numeric WHERE run_id = ?1")?;
        let num_rows = num_stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
        })?;
        for row in num_rows {
            let (index, field, value) = row?;
            if schema.is_numeric(&field) {
                numeric.entry(index).or_default().push((field, value));
            }
        }

        let mut categorical: HashMap<i64, Vec<(String, String)>> = HashMap::new();
        let mut cat_stmt = self
            .conn
            .prepare("SELECT row_index, field, value FROM user_categorical WHERE run_id = ?1")?;
        let cat_rows = cat_stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        for row in cat_rows {
            let (index, field, value) = row?;
            if schema.is_categorical(&field) {
                categorical.entry(index).or_default().push((field, value));
            }
        }

        let users = rows
            .into_iter()
            .map(|(index, user_id)| {
                let mut record = UserRecord::new(user_id);
                for (field, value) in numeric.remove(&index).unwrap_or_default() {
                    record = record.with_numeric(field, value);
                }
                for (field, value) in categorical.remove(&index).unwrap_or_default() {
                    record = record.with_categorical(field, value);
                }
                record
            })
            .collect();
        Ok(users)
    }

    /// Number of user rows stored for a run.
    pub fn user_count(&self, run_id: &str) -> AnalysisResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM user_record WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?)
    }

    // ── Runs ───────────────────────────────────────────────────

    pub fn insert_run(&self, run: &AnalysisRun) -> AnalysisResult<()> {
        self.conn.execute(
            "INSERT INTO analysis_run (run_id, created_at, user_count, config_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run.run_id,
                run.created_at.to_rfc3339(),
                run.user_count as i64,
                serde_json::to_string(&run.config)?,
            ],
        )?;
        Ok(())
    }

    pub fn load_run(&self, run_id: &str) -> AnalysisResult<AnalysisRun> {
        let row: Option<(String, i64, String)> = self
            .conn
            .query_row(
                "SELECT created_at, user_count, config_json FROM analysis_run WHERE run_id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (created_at, user_count, config_json) = row.ok_or_else(|| AnalysisError::RunNotFound {
            run_id: run_id.to_string(),
        })?;

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| anyhow::anyhow!("Bad created_at for run {run_id}: {e}"))?
            .with_timezone(&Utc);

        Ok(AnalysisRun {
            run_id: run_id.to_string(),
            created_at,
            user_count: user_count as usize,
            config: serde_json::from_str(&config_json)?,
        })
    }

    pub fn run_count(&self) -> AnalysisResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM analysis_run", [], |row| row.get(0))?)
    }

    fn ensure_run(&self, run_id: &str) -> AnalysisResult<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM analysis_run WHERE run_id = ?1)",
            params![run_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(AnalysisError::RunNotFound {
                run_id: run_id.to_string(),
            })
        }
    }
}
