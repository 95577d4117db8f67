//! Persistent sink for per-cycle score and trend rows.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::debug;

use crate::score::CompositeScore;
use crate::trend::TrendReport;

mod schema;

/// Errors surfaced by a sink. Persist failures are logged by the caller and
/// never roll back the in-memory fleet state.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to encode score: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to prepare sink path: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for one scored node per poll cycle.
pub trait Sink: Send + Sync {
    fn persist(
        &self,
        node_id: &str,
        score: &CompositeScore,
        trend: &TrendReport,
    ) -> Result<(), PersistError>;
}

/// SQLite-backed sink. One row per node per cycle, plus a latest-row cache.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Open (or create) a file-backed score database.
    pub fn new(path: &Path) -> Result<Self, PersistError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let sink = Self {
            conn: Mutex::new(conn),
        };
        sink.run_migrations()?;
        Ok(sink)
    }

    /// Create an in-memory sink for tests.
    pub fn new_in_memory() -> Result<Self, PersistError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA journal_mode=MEMORY; PRAGMA synchronous=OFF;")?;

        let sink = Self {
            conn: Mutex::new(conn),
        };
        sink.run_migrations()?;
        Ok(sink)
    }

    /// Fetch the most recently persisted score for a node.
    pub fn latest_score(&self, node_id: &str) -> Result<Option<CompositeScore>, PersistError> {
        let conn = self.conn.lock().expect("score db lock");
        let mut stmt = conn.prepare_cached(
            "SELECT h.raw_score FROM score_latest l
             JOIN score_history h ON l.score_id = h.id
             WHERE l.node_id = ?1",
        )?;

        let raw: Option<String> = stmt
            .query_row(params![node_id], |row| row.get(0))
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn run_migrations(&self) -> Result<(), PersistError> {
        let conn = self.conn.lock().expect("score db lock");
        conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }
}

impl Sink for SqliteSink {
    fn persist(
        &self,
        node_id: &str,
        score: &CompositeScore,
        trend: &TrendReport,
    ) -> Result<(), PersistError> {
        let raw_json = serde_json::to_string(score)?;

        let mut conn = self.conn.lock().expect("score db lock");
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO score_history (
                node_id, sampled_at, total_score, cpu_score, load_score, memory_score,
                net_in_score, net_out_score,
                cpu_percent_trend, user_percent_trend, system_percent_trend,
                nice_percent_trend, idle_percent_trend, io_wait_percent_trend,
                irq_percent_trend, soft_irq_percent_trend,
                load_avg_1_trend, load_avg_5_trend, load_avg_15_trend,
                mem_used_percent_trend, mem_total_trend, mem_free_trend,
                mem_available_trend, mem_swap_used_trend, mem_swap_total_trend,
                mem_commit_trend, mem_commit_limit_trend,
                net_rcv_rate_trend, net_send_rate_trend,
                net_drop_in_rate_trend, net_drop_out_rate_trend,
                score_trend,
                raw_score, score_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                      ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                      ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34)",
            params![
                node_id,
                score.calculated_at.timestamp(),
                score.total,
                score.cpu_score,
                score.load_score,
                score.memory_score,
                score.net_in_score,
                score.net_out_score,
                trend.cpu_percent_trend,
                trend.user_percent_trend,
                trend.system_percent_trend,
                trend.nice_percent_trend,
                trend.idle_percent_trend,
                trend.io_wait_percent_trend,
                trend.irq_percent_trend,
                trend.soft_irq_percent_trend,
                trend.load_avg_1_trend,
                trend.load_avg_5_trend,
                trend.load_avg_15_trend,
                trend.mem_used_percent_trend,
                trend.mem_total_trend,
                trend.mem_free_trend,
                trend.mem_available_trend,
                trend.mem_swap_used_trend,
                trend.mem_swap_total_trend,
                trend.mem_commit_trend,
                trend.mem_commit_limit_trend,
                trend.net_rcv_rate_trend,
                trend.net_send_rate_trend,
                trend.net_drop_in_rate_trend,
                trend.net_drop_out_rate_trend,
                trend.score_trend,
                raw_json,
                score.version,
            ],
        )?;

        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT OR REPLACE INTO score_latest (node_id, score_id, total_score, sampled_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![node_id, id, score.total, score.calculated_at.timestamp()],
        )?;

        tx.commit()?;
        debug!(node_id, total = score.total, "Persisted score");
        Ok(())
    }
}

/// Sink that drops everything. Used when persistence is disabled.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn persist(
        &self,
        _node_id: &str,
        _score: &CompositeScore,
        _trend: &TrendReport,
    ) -> Result<(), PersistError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_score(total: f64) -> CompositeScore {
        CompositeScore {
            total,
            cpu_score: 0.9,
            load_score: 0.8,
            memory_score: 0.7,
            net_in_score: 1.0,
            net_out_score: 1.0,
            calculated_at: Utc::now(),
            ..CompositeScore::default()
        }
    }

    #[test]
    fn test_persist_and_latest_score() {
        let sink = SqliteSink::new_in_memory().expect("sink");
        let score = make_score(80.0);

        sink.persist("node-1", &score, &TrendReport::default())
            .expect("persist");

        let latest = sink
            .latest_score("node-1")
            .expect("latest score")
            .expect("score present");

        assert!((latest.total - 80.0).abs() < 0.01);
        assert_eq!(latest.version, score.version);
    }

    #[test]
    fn test_latest_score_tracks_newest_row() {
        let sink = SqliteSink::new_in_memory().expect("sink");

        sink.persist("node-1", &make_score(40.0), &TrendReport::default())
            .expect("persist first");
        sink.persist("node-1", &make_score(90.0), &TrendReport::default())
            .expect("persist second");

        let latest = sink
            .latest_score("node-1")
            .expect("latest score")
            .expect("score present");
        assert!((latest.total - 90.0).abs() < 0.01);

        let conn = sink.conn.lock().expect("score db lock");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM score_history WHERE node_id = 'node-1'",
                [],
                |row| row.get(0),
            )
            .expect("count query");
        assert_eq!(count, 2, "History keeps every cycle");
    }

    #[test]
    fn test_latest_score_unknown_node() {
        let sink = SqliteSink::new_in_memory().expect("sink");
        let latest = sink.latest_score("nobody").expect("latest score");
        assert!(latest.is_none());
    }

    #[test]
    fn test_persist_records_trend_fields() {
        let sink = SqliteSink::new_in_memory().expect("sink");
        let trend = TrendReport {
            cpu_percent_trend: 0.25,
            io_wait_percent_trend: -0.5,
            load_avg_1_trend: 2.0,
            mem_available_trend: -0.125,
            net_drop_in_rate_trend: 3.0,
            score_trend: -0.1,
            ..TrendReport::default()
        };

        sink.persist("node-1", &make_score(60.0), &trend)
            .expect("persist");

        let conn = sink.conn.lock().expect("score db lock");
        let row: (f64, f64, f64, f64, f64, f64) = conn
            .query_row(
                "SELECT cpu_percent_trend, io_wait_percent_trend, load_avg_1_trend,
                        mem_available_trend, net_drop_in_rate_trend, score_trend
                 FROM score_history WHERE node_id = 'node-1'",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .expect("trend query");

        assert!((row.0 - 0.25).abs() < 1e-9);
        assert!((row.1 + 0.5).abs() < 1e-9);
        assert!((row.2 - 2.0).abs() < 1e-9);
        assert!((row.3 + 0.125).abs() < 1e-9);
        assert!((row.4 - 3.0).abs() < 1e-9);
        assert!((row.5 + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = NullSink;
        sink.persist("node-1", &make_score(50.0), &TrendReport::default())
            .expect("null sink persist");
    }
}
