//! SQLite-backed store.
//!
//! Each collection is a table holding the indexed columns the summary query
//! needs plus the full record as `json_data`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};

use super::traits::{LoopStatsSummary, MetricRecord, PersistenceStore};
use crate::domain::{ActionRecord, Decision};
use crate::error::{AutoloopError, Result};

/// Store backed by a single SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteStore {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path.as_ref())?;
        Self::init_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        Self::init_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Initialize the SQLite schema.
    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                score REAL NOT NULL,
                acted INTEGER NOT NULL,
                reason TEXT NOT NULL,
                json_data TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS actions (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                success INTEGER NOT NULL,
                impact REAL NOT NULL,
                decision_id TEXT,
                json_data TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metrics (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                value REAL NOT NULL,
                context TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions(timestamp);
            CREATE INDEX IF NOT EXISTS idx_actions_kind ON actions(kind);
            CREATE INDEX IF NOT EXISTS idx_metrics_name ON metrics(name);
            "#,
        )?;
        Ok(())
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|e| AutoloopError::Persistence(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| AutoloopError::Persistence(e.to_string()))?
        .map_err(AutoloopError::into_persistence)
    }

    /// Metric samples with the given name, oldest first
    pub async fn metrics(&self, name: &str) -> Result<Vec<MetricRecord>> {
        let name = name.to_string();
        self.with_db(move |db| {
            let mut stmt =
                db.prepare("SELECT name, value, context, timestamp FROM metrics WHERE name = ?1 ORDER BY seq")?;
            let rows = stmt.query_map(params![name], |row| {
                let ts: String = row.get(3)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?, row.get::<_, String>(2)?, ts))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (name, value, context, ts) = row?;
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map_err(|e| AutoloopError::Persistence(e.to_string()))?
                    .with_timezone(&Utc);
                out.push(MetricRecord {
                    name,
                    value,
                    context,
                    timestamp,
                });
            }
            Ok(out)
        })
        .await
    }

    /// All persisted decisions, oldest first
    pub async fn decisions(&self) -> Result<Vec<Decision>> {
        self.with_db(|db| {
            let mut stmt = db.prepare("SELECT json_data FROM decisions ORDER BY timestamp, rowid")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(serde_json::from_str(&row?)?);
            }
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn append_decision(&self, decision: &Decision) -> Result<()> {
        let json = serde_json::to_string(decision)?;
        let id = decision.id.clone();
        let ts = timestamp(&decision.timestamp);
        let score = decision.score;
        let acted = decision.acted;
        let reason = decision.reason.clone();
        self.with_db(move |db| {
            db.execute(
                "INSERT INTO decisions (id, timestamp, score, acted, reason, json_data) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, ts, score, acted, reason, json],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_action(&self, record: &ActionRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let record = record.clone();
        self.with_db(move |db| {
            db.execute(
                "INSERT INTO actions (id, timestamp, kind, success, impact, decision_id, json_data) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    timestamp(&record.timestamp),
                    record.kind,
                    record.success,
                    record.impact,
                    record.decision_id,
                    json
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_metric(&self, name: &str, value: f64, context: &str) -> Result<()> {
        let metric = MetricRecord::new(name, value, context);
        self.with_db(move |db| {
            db.execute(
                "INSERT INTO metrics (name, value, context, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![metric.name, metric.value, metric.context, timestamp(&metric.timestamp)],
            )?;
            Ok(())
        })
        .await
    }

    async fn stats(&self) -> Result<LoopStatsSummary> {
        self.with_db(|db| {
            let (total_decisions, acted_decisions, average_score): (i64, Option<i64>, Option<f64>) = db.query_row(
                "SELECT COUNT(*), SUM(acted), AVG(score) FROM decisions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            let (total_actions, successful_actions, average_impact, last_action): (
                i64,
                Option<i64>,
                Option<f64>,
                Option<String>,
            ) = db.query_row(
                "SELECT COUNT(*), SUM(success), AVG(impact), MAX(timestamp) FROM actions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            let last_action_at = last_action
                .map(|ts| DateTime::parse_from_rfc3339(&ts).map(|t| t.with_timezone(&Utc)))
                .transpose()
                .map_err(|e| AutoloopError::Persistence(e.to_string()))?;

            Ok(LoopStatsSummary {
                total_decisions: total_decisions as u64,
                acted_decisions: acted_decisions.unwrap_or(0) as u64,
                total_actions: total_actions as u64,
                successful_actions: successful_actions.unwrap_or(0) as u64,
                average_score: average_score.unwrap_or(0.0),
                average_impact: average_impact.unwrap_or(0.0),
                last_action_at,
            })
        })
        .await
    }
}
