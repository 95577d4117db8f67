//! SQLite schema for score persistence.

/// Current schema version for migrations.
#[cfg(test)]
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS score_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id TEXT NOT NULL,
    sampled_at INTEGER NOT NULL,

    total_score REAL NOT NULL,
    cpu_score REAL NOT NULL,
    load_score REAL NOT NULL,
    memory_score REAL NOT NULL,
    net_in_score REAL NOT NULL,
    net_out_score REAL NOT NULL,

    cpu_percent_trend REAL,
    user_percent_trend REAL,
    system_percent_trend REAL,
    nice_percent_trend REAL,
    idle_percent_trend REAL,
    io_wait_percent_trend REAL,
    irq_percent_trend REAL,
    soft_irq_percent_trend REAL,

    load_avg_1_trend REAL,
    load_avg_5_trend REAL,
    load_avg_15_trend REAL,

    mem_used_percent_trend REAL,
    mem_total_trend REAL,
    mem_free_trend REAL,
    mem_available_trend REAL,
    mem_swap_used_trend REAL,
    mem_swap_total_trend REAL,
    mem_commit_trend REAL,
    mem_commit_limit_trend REAL,

    net_rcv_rate_trend REAL,
    net_send_rate_trend REAL,
    net_drop_in_rate_trend REAL,
    net_drop_out_rate_trend REAL,

    score_trend REAL,

    raw_score TEXT,
    score_version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_score_node_time
    ON score_history(node_id, sampled_at DESC);

CREATE INDEX IF NOT EXISTS idx_score_time
    ON score_history(sampled_at);

CREATE TABLE IF NOT EXISTS score_latest (
    node_id TEXT PRIMARY KEY,
    score_id INTEGER NOT NULL REFERENCES score_history(id),
    total_score REAL NOT NULL,
    sampled_at INTEGER NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{Connection, params};

    #[test]
    fn schema_version_is_one() {
        assert_eq!(SCHEMA_VERSION, 1);
    }

    #[test]
    fn schema_applies_to_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should apply cleanly: {:?}", result);
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Apply schema twice - should succeed both times (CREATE IF NOT EXISTS)
        conn.execute_batch(SCHEMA).unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be idempotent: {:?}", result);
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for table in ["score_history", "score_latest"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table '{}' should exist", table);
        }
    }

    #[test]
    fn schema_creates_all_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for idx in ["idx_score_node_time", "idx_score_time"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?1",
                    params![idx],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Index '{}' should exist", idx);
        }
    }

    #[test]
    fn score_history_enforces_not_null_node_id() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO score_history (node_id, sampled_at, total_score, cpu_score, load_score, memory_score, net_in_score, net_out_score) VALUES (NULL, 123, 80.0, 0.9, 0.8, 0.7, 1.0, 1.0)",
            [],
        );
        assert!(result.is_err(), "Should reject NULL node_id");
    }

    #[test]
    fn score_history_enforces_not_null_scores() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO score_history (node_id, sampled_at, total_score, cpu_score, load_score, memory_score, net_in_score, net_out_score) VALUES ('n1', 123, NULL, 0.9, 0.8, 0.7, 1.0, 1.0)",
            [],
        );
        assert!(result.is_err(), "Should reject NULL total_score");
    }

    #[test]
    fn score_history_allows_null_trends() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO score_history (node_id, sampled_at, total_score, cpu_score, load_score, memory_score, net_in_score, net_out_score) VALUES ('n1', 123, 80.0, 0.9, 0.8, 0.7, 1.0, 1.0)",
            [],
        );
        assert!(result.is_ok(), "Should allow NULL trend fields");
    }

    #[test]
    fn score_history_default_score_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO score_history (node_id, sampled_at, total_score, cpu_score, load_score, memory_score, net_in_score, net_out_score) VALUES ('n1', 123, 80.0, 0.9, 0.8, 0.7, 1.0, 1.0)",
            [],
        )
        .unwrap();

        let version: i32 = conn
            .query_row(
                "SELECT score_version FROM score_history WHERE node_id = 'n1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, 1, "Default score_version should be 1");
    }

    #[test]
    fn score_latest_enforces_primary_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO score_history (node_id, sampled_at, total_score, cpu_score, load_score, memory_score, net_in_score, net_out_score) VALUES ('n1', 123, 80.0, 0.9, 0.8, 0.7, 1.0, 1.0)",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO score_latest (node_id, score_id, total_score, sampled_at) VALUES ('n1', 1, 80.0, 123)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO score_latest (node_id, score_id, total_score, sampled_at) VALUES ('n1', 1, 85.0, 456)",
            [],
        );
        assert!(result.is_err(), "Should reject duplicate node_id");
    }

    #[test]
    fn score_node_time_index_covers_history_query() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for i in 0..10 {
            conn.execute(
                "INSERT INTO score_history (node_id, sampled_at, total_score, cpu_score, load_score, memory_score, net_in_score, net_out_score) VALUES (?1, ?2, ?3, 0.9, 0.8, 0.7, 1.0, 1.0)",
                params![format!("node-{}", i % 3), i * 100, 50.0 + i as f64],
            )
            .unwrap();
        }

        let rows: Vec<(String, i64)> = conn
            .prepare("SELECT node_id, sampled_at FROM score_history WHERE node_id = 'node-1' ORDER BY sampled_at DESC")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(!rows.is_empty());
        for (node_id, _) in &rows {
            assert_eq!(node_id, "node-1");
        }
    }
}
