// ABOUTME: SQLite-backed marketing history: one row per plan, annotated once evaluated.
// ABOUTME: Provides insert, evaluation updates, lookups, product history, and the query builder entry point.

use std::path::Path;
use std::time::{Duration, Instant};

use adloop_core::{HistoryRecord, MarketingInput, MarketingPlan, PlanEvaluation, Score};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::error::StoreError;
use crate::query::{Field, HistoryQuery, SortOrder, format_timestamp};

/// How many past plans the plan agent sees by default.
pub const DEFAULT_HISTORY_LIMIT: u32 = 5;

const AVAILABILITY_TTL: Duration = Duration::from_secs(60);

const SELECT_COLUMNS: &str = "SELECT id, product_name, product_url, plan_uuid, plan_name, \
     plan_description, plan_details, budget, actual_cost, plan_evaluation, plan_score, \
     created_at, evaluated_at FROM history";

/// The history database. Owns a single connection; callers share it behind a mutex.
pub struct HistoryStore {
    conn: Connection,
    last_checked: Option<Instant>,
}

impl HistoryStore {
    /// Open or create the history database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// An in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_name TEXT NOT NULL,
                product_url TEXT NOT NULL,
                plan_uuid TEXT NOT NULL UNIQUE,
                plan_name TEXT NOT NULL,
                plan_description TEXT NOT NULL,
                plan_details TEXT NOT NULL,
                budget REAL NOT NULL,
                actual_cost REAL,
                plan_evaluation TEXT,
                plan_score INTEGER CHECK (plan_score BETWEEN 1 AND 10),
                created_at TEXT NOT NULL,
                evaluated_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_history_product
                ON history (product_name, product_url);",
        )?;

        Ok(Self {
            conn,
            last_checked: None,
        })
    }

    /// Insert freshly produced plans for a product, all or nothing.
    pub fn insert_plans(
        &mut self,
        input: &MarketingInput,
        plans: &[MarketingPlan],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for plan in plans {
            plan.validate()?;
            tx.execute(
                "INSERT INTO history (product_name, product_url, plan_uuid, plan_name,
                    plan_description, plan_details, budget, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    input.product_name,
                    input.product_url,
                    plan.plan_uuid,
                    plan.plan_name,
                    plan.plan_description,
                    plan.plan_details,
                    plan.budget,
                    format_timestamp(&plan.created_at),
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(count = plans.len(), product = %input.product_name, "saved plans to history");
        Ok(())
    }

    /// Annotate an existing plan with its evaluation. The plan must already be in history.
    pub fn record_evaluation(&self, evaluation: &PlanEvaluation) -> Result<(), StoreError> {
        evaluation.validate()?;
        let updated = self.conn.execute(
            "UPDATE history
             SET actual_cost = ?1, plan_evaluation = ?2, plan_score = ?3, evaluated_at = ?4
             WHERE plan_uuid = ?5",
            params![
                evaluation.actual_cost,
                evaluation.evaluation,
                evaluation.score.get(),
                format_timestamp(&Utc::now()),
                evaluation.plan_uuid,
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::PlanNotFound(evaluation.plan_uuid.clone()));
        }
        Ok(())
    }

    pub fn get_plan(&self, plan_uuid: &str) -> Result<Option<HistoryRecord>, StoreError> {
        let sql = format!("{} WHERE plan_uuid = ?1", SELECT_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![plan_uuid], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// The most recent plans for a product, newest first.
    pub fn latest_for_product(
        &self,
        product_name: &str,
        product_url: &str,
        limit: u32,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        self.query(
            &HistoryQuery::new()
                .product(product_name, product_url)
                .order_by(Field::CreatedAt, SortOrder::Desc)
                .limit(limit),
        )
    }

    /// Remove a plan. Returns whether a row was deleted.
    pub fn delete_plan(&self, plan_uuid: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM history WHERE plan_uuid = ?1", params![plan_uuid])?;
        Ok(deleted > 0)
    }

    pub fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, StoreError> {
        let (tail, values) = query.to_sql(Utc::now());
        let sql = format!("{}{}", SELECT_COLUMNS, tail);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Check the database with a query against the history table. A
    /// successful check is trusted for a minute unless `force` is set; a
    /// failed one is never cached.
    pub fn is_available(&mut self, force: bool) -> bool {
        if !force
            && let Some(at) = self.last_checked
            && at.elapsed() < AVAILABILITY_TTL
        {
            return true;
        }

        let check = self
            .conn
            .query_row("SELECT EXISTS (SELECT 1 FROM history)", [], |row| row.get::<_, i64>(0));
        match check {
            Ok(_) => {
                self.last_checked = Some(Instant::now());
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "history database is not available");
                self.last_checked = None;
                false
            }
        }
    }
}

fn parse_timestamp(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let plan_score = match row.get::<_, Option<i64>>(10)? {
        Some(raw) => Some(
            Score::new(raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Integer, Box::new(e)))?,
        ),
        None => None,
    };
    let evaluated_at = match row.get::<_, Option<String>>(12)? {
        Some(raw) => Some(parse_timestamp(12, raw)?),
        None => None,
    };

    Ok(HistoryRecord {
        id: row.get(0)?,
        product_name: row.get(1)?,
        product_url: row.get(2)?,
        plan_uuid: row.get(3)?,
        plan_name: row.get(4)?,
        plan_description: row.get(5)?,
        plan_details: row.get(6)?,
        budget: row.get(7)?,
        actual_cost: row.get(8)?,
        plan_evaluation: row.get(9)?,
        plan_score,
        created_at: parse_timestamp(11, row.get(11)?)?,
        evaluated_at,
    })
}
