//! QueryExecutor — a prepared-statement registry over a relational store
//! with per-query latency accounting (spec §4.4).

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use convoperf_errors::{PerfError, PerfResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

/// A single result row, column name → SQLite value. Deliberately untyped —
/// the core treats query results as opaque rows; typed projection is the
/// caller's job.
pub type Row = BTreeMap<String, SqlValue>;

/// Bounded ring of the most recent latency samples for one `queryId`.
const MAX_SAMPLES: usize = 1000;

#[derive(Debug, Default)]
struct LatencyRing {
    samples: VecDeque<u64>, // microseconds
}

impl LatencyRing {
    fn push(&mut self, micros: u64) {
        if self.samples.len() >= MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(micros);
    }

    fn summary(&self) -> Option<QueryStatSummary> {
        if self.samples.is_empty() {
            return None;
        }
        let count = self.samples.len() as u64;
        let sum: u64 = self.samples.iter().sum();
        let min = *self.samples.iter().min().unwrap();
        let max = *self.samples.iter().max().unwrap();
        Some(QueryStatSummary {
            count,
            avg_micros: sum as f64 / count as f64,
            min_micros: min,
            max_micros: max,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct QueryStatSummary {
    pub count: u64,
    pub avg_micros: f64,
    pub min_micros: u64,
    pub max_micros: u64,
}

/// Prepared-statement registry + latency accounting over a `rusqlite`
/// connection.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, and its own statement
/// cache (`prepare_cached`) already gives us prepared-statement reuse
/// keyed by SQL text; we layer the spec's `QueryStat` ring on top, keyed by
/// the caller-supplied `queryId` (which need not equal the SQL text).
/// Access is serialized behind a [`std::sync::Mutex`] and driven through
/// `spawn_blocking`, since SQLite I/O is synchronous.
pub struct QueryExecutor {
    conn: Arc<std::sync::Mutex<Connection>>,
    stats: dashmap::DashMap<String, LatencyRing>,
}

impl QueryExecutor {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(std::sync::Mutex::new(conn)),
            stats: dashmap::DashMap::new(),
        }
    }

    /// Execute a parameterized, row-returning query. Obtains (and caches
    /// on first use) a prepared statement for `sql`, executes with
    /// `params`, and records the wall-clock latency under `query_id`.
    pub async fn execute(
        &self,
        query_id: &str,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> PerfResult<Vec<Row>> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let query_id_owned = query_id.to_string();

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || -> PerfResult<Vec<Row>> {
            let conn = conn.lock().expect("sqlite connection mutex poisoned");
            let mut stmt = conn
                .prepare_cached(&sql)
                .map_err(|e| PerfError::query(&query_id_owned, e))?;

            let column_names: Vec<String> =
                stmt.column_names().iter().map(|s| s.to_string()).collect();

            let param_refs: Vec<&dyn rusqlite::ToSql> =
                params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

            let rows = stmt
                .query_map(param_refs.as_slice(), |row| {
                    let mut map = Row::new();
                    for (i, name) in column_names.iter().enumerate() {
                        let value: SqlValue = row.get(i)?;
                        map.insert(name.clone(), value);
                    }
                    Ok(map)
                })
                .map_err(|e| PerfError::query(&query_id_owned, e))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| PerfError::query(&query_id_owned, e))
        })
        .await
        .map_err(|e| PerfError::query(query_id, format!("executor task panicked: {e}")))?;

        let elapsed_micros = started.elapsed().as_micros() as u64;
        self.stats
            .entry(query_id.to_string())
            .or_default()
            .push(elapsed_micros);

        result
    }

    /// Execute DDL / maintenance statements that return no rows (the
    /// action surface `PerformanceManager` drives — REINDEX, ANALYZE,
    /// VACUUM, PRAGMA optimize, DROP/CREATE INDEX).
    pub async fn exec(&self, query_id: &str, sql: &str) -> PerfResult<()> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let query_id_owned = query_id.to_string();

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || -> PerfResult<()> {
            let conn = conn.lock().expect("sqlite connection mutex poisoned");
            conn.execute_batch(&sql)
                .map_err(|e| PerfError::query(&query_id_owned, e))
        })
        .await
        .map_err(|e| PerfError::query(query_id, format!("executor task panicked: {e}")))?;

        let elapsed_micros = started.elapsed().as_micros() as u64;
        self.stats
            .entry(query_id.to_string())
            .or_default()
            .push(elapsed_micros);

        result
    }

    /// Per-`queryId` {avg, min, max, count} over the last ≤1000 samples.
    pub fn stats(&self) -> BTreeMap<String, QueryStatSummary> {
        self.stats
            .iter()
            .filter_map(|e| e.value().summary().map(|s| (e.key().clone(), s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_executor() -> QueryExecutor {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE conversations(id TEXT PRIMARY KEY, title TEXT, created_at TEXT, updated_at TEXT, metadata TEXT);
             INSERT INTO conversations VALUES ('c1', 'first', '2026-01-01', '2026-01-01', '{}');",
        )
        .unwrap();
        QueryExecutor::new(conn)
    }

    #[tokio::test]
    async fn execute_returns_rows_and_records_latency() {
        let executor = test_executor();
        let rows = executor
            .execute("qA", "SELECT id, title FROM conversations WHERE id = ?1", vec![SqlValue::Text("c1".into())])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], SqlValue::Text("c1".to_string()));

        let stats = executor.stats();
        let summary = stats.get("qA").unwrap();
        assert_eq!(summary.count, 1);
        assert!(summary.min_micros <= summary.avg_micros as u64 + 1);
        assert!((summary.avg_micros as u64) <= summary.max_micros);
    }

    #[tokio::test]
    async fn stats_are_bounded_to_1000_samples() {
        let executor = test_executor();
        for _ in 0..1005 {
            executor
                .execute("qA", "SELECT 1", vec![])
                .await
                .unwrap();
        }
        let stats = executor.stats();
        assert_eq!(stats["qA"].count, 1000);
    }

    #[tokio::test]
    async fn query_error_carries_query_id() {
        let executor = test_executor();
        let err = executor
            .execute("badQuery", "SELECT * FROM no_such_table", vec![])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("badQuery"));
    }
}
