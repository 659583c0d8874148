//! SQLite entry store (rusqlite)
//!
//! Every call runs on the blocking pool with a connection checked out of a
//! small idle pool; the connection goes back before the call resolves, so no
//! connection is ever held across an unrelated await.
//!
//! Multi-step reads run in one deferred transaction on one connection. Under
//! WAL the transaction pins the snapshot taken by its first SELECT, so a batch
//! committed mid-read stays invisible until the next read.
//!
//! Deadlines are enforced inside SQLite: the busy timeout bounds lock waits,
//! a progress handler interrupts long statements, and writes re-check the
//! deadline right before COMMIT. Any of these rolls the transaction back.

use super::schema::run_schema_migrations;
use super::{EntrySnapshot, EntryStore, ReadJob, WriteBatch, WriteMode, WriteSummary};
use crate::error::StoreError;
use crate::sqlite_pragma::apply_optimized_pragmas;
use crate::types::{
    canonical_cmp, Entry, EntryKey, Leaderboard, LeaderboardId, NewLeaderboard, ScoreRange,
};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// VM instructions between deadline checks
const PROGRESS_HANDLER_OPS: i32 = 1_000;

/// Upper bound on a single lock wait
const MAX_BUSY_WAIT: Duration = Duration::from_secs(3_600);

/// Addresses per `IN (...)` lookup, well under SQLite's variable limit
const ADDRESS_CHUNK: usize = 500;

const ENTRY_COLUMNS: &str = "address, score, points_data, created_at, updated_at";

#[derive(Debug, Clone, Copy)]
struct Deadline(Option<Instant>);

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    fn expired(&self) -> bool {
        self.0.map_or(false, |at| Instant::now() >= at)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.expired() {
            Err(StoreError::Timeout)
        } else {
            Ok(())
        }
    }

    fn arm(&self, conn: &Connection) -> Result<(), StoreError> {
        self.check()?;

        let wait = self.0.map_or(MAX_BUSY_WAIT, |at| {
            at.saturating_duration_since(Instant::now()).min(MAX_BUSY_WAIT)
        });
        conn.busy_timeout(wait)?;

        if let Some(at) = self.0 {
            conn.progress_handler(PROGRESS_HANDLER_OPS, Some(move || Instant::now() >= at));
        }
        Ok(())
    }

    fn disarm(conn: &Connection) {
        conn.progress_handler(0, None::<fn() -> bool>);
    }
}

struct ConnectionPool {
    db_path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
}

impl ConnectionPool {
    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        apply_optimized_pragmas(&conn)?;
        Ok(conn)
    }

    fn checkout(&self) -> Result<Connection, StoreError> {
        let pooled = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        match pooled {
            Some(conn) => Ok(conn),
            None => self.open(),
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

pub struct SqliteEntryStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteEntryStore {
    /// Open (or create) the database and run schema migrations
    pub fn open(db_path: impl AsRef<Path>, max_idle: usize) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let pool = ConnectionPool {
            db_path,
            idle: Mutex::new(Vec::new()),
            max_idle: max_idle.max(1),
        };

        let conn = pool.open()?;
        run_schema_migrations(&conn)?;
        pool.checkin(conn);

        log::info!(
            "✅ SQLite entry store initialized: {}",
            pool.db_path.display()
        );

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.pool.db_path
    }

    /// Run `op` on a pooled connection under the caller's deadline
    async fn run<T, F>(&self, timeout: Duration, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, Deadline) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);

        tokio::task::spawn_blocking(move || {
            let deadline = Deadline::after(timeout);
            let mut conn = pool.checkout()?;

            let result = deadline
                .arm(&conn)
                .and_then(|_| op(&mut conn, deadline));

            Deadline::disarm(&conn);
            pool.checkin(conn);
            result
        })
        .await
        .map_err(|e| StoreError::Database(format!("store task failed: {}", e)))?
    }
}

type RawEntry = (String, i64, Option<String>, i64, i64);

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_entry(id: &LeaderboardId, raw: RawEntry) -> Result<Entry, StoreError> {
    let (address, score, points_json, created_at, updated_at) = raw;
    let points_data = points_json
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()?;

    Ok(Entry {
        leaderboard_id: id.clone(),
        address,
        score,
        points_data,
        created_at,
        updated_at,
    })
}

fn read_leaderboard(row: &rusqlite::Row<'_>) -> rusqlite::Result<Leaderboard> {
    Ok(Leaderboard {
        id: LeaderboardId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// WHERE clause (without the keyword) and its positional arguments
fn range_filter(id: &LeaderboardId, range: ScoreRange) -> (String, Vec<Value>) {
    let mut clause = String::from("leaderboard_id = ?1");
    let mut args = vec![Value::Text(id.as_str().to_string())];

    if let Some(min) = range.min {
        args.push(Value::Integer(min));
        clause.push_str(&format!(" AND score >= ?{}", args.len()));
    }
    if let Some(max) = range.max_exclusive {
        args.push(Value::Integer(max));
        clause.push_str(&format!(" AND score < ?{}", args.len()));
    }

    (clause, args)
}

fn encode_points(points: &Option<serde_json::Value>) -> Result<Option<String>, StoreError> {
    Ok(points.as_ref().map(serde_json::to_string).transpose()?)
}

/// Delete-all failures other than a deadline hit are reported distinctly
fn delete_failed(err: rusqlite::Error) -> StoreError {
    match StoreError::from(err) {
        StoreError::Database(msg) => StoreError::DeleteFailed(msg),
        other => other,
    }
}

/// Read view over one open transaction
struct SqliteSnapshot<'c> {
    conn: &'c Connection,
    id: &'c LeaderboardId,
}

impl EntrySnapshot for SqliteSnapshot<'_> {
    fn leaderboard_id(&self) -> &LeaderboardId {
        self.id
    }

    fn leaderboard(&self) -> Result<Option<Leaderboard>, StoreError> {
        let leaderboard = self
            .conn
            .query_row(
                "SELECT id, title, description, created_at, updated_at
                 FROM leaderboards WHERE id = ?1",
                [self.id.as_str()],
                read_leaderboard,
            )
            .optional()?;
        Ok(leaderboard)
    }

    fn count_in_range(&self, range: ScoreRange) -> Result<u64, StoreError> {
        let (clause, args) = range_filter(self.id, range);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM leaderboard_scores WHERE {}", clause),
            params_from_iter(args),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn get_entry(&self, address: &str) -> Result<Option<Entry>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM leaderboard_scores
                     WHERE leaderboard_id = ?1 AND address = ?2",
                    ENTRY_COLUMNS
                ),
                params![self.id.as_str(), address],
                read_raw,
            )
            .optional()?;
        raw.map(|raw| into_entry(self.id, raw)).transpose()
    }

    fn entries_for(&self, addresses: &[String]) -> Result<Vec<Entry>, StoreError> {
        let mut entries = Vec::with_capacity(addresses.len());

        for chunk in addresses.chunks(ADDRESS_CHUNK) {
            let placeholders = (0..chunk.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {} FROM leaderboard_scores
                 WHERE leaderboard_id = ?1 AND address IN ({})",
                ENTRY_COLUMNS, placeholders
            );

            let args = std::iter::once(Value::Text(self.id.as_str().to_string()))
                .chain(chunk.iter().map(|a| Value::Text(a.clone())));

            let mut stmt = self.conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args), read_raw)?
                .collect::<Result<Vec<_>, _>>()?;
            for raw in rows {
                entries.push(into_entry(self.id, raw)?);
            }
        }

        entries.sort_by(canonical_cmp);
        entries.dedup_by(|a, b| a.address == b.address);
        Ok(entries)
    }

    fn scan(
        &self,
        range: ScoreRange,
        after: Option<&EntryKey>,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Entry>, StoreError> {
        let (mut clause, mut args) = range_filter(self.id, range);

        // Keyset continuation, served by idx_leaderboard_scores_rank
        if let Some(key) = after {
            args.push(Value::Integer(key.score));
            let score_idx = args.len();
            args.push(Value::Text(key.address.clone()));
            clause.push_str(&format!(
                " AND score <= ?{0} AND (score < ?{0} OR address > ?{1})",
                score_idx,
                score_idx + 1
            ));
        }

        // LIMIT -1 is unbounded in SQLite
        args.push(Value::Integer(limit.map_or(-1, to_sql_int)));
        let limit_idx = args.len();
        args.push(Value::Integer(to_sql_int(offset)));

        let sql = format!(
            "SELECT {} FROM leaderboard_scores WHERE {}
             ORDER BY score DESC, address ASC
             LIMIT ?{} OFFSET ?{}",
            ENTRY_COLUMNS,
            clause,
            limit_idx,
            limit_idx + 1
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), read_raw)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|raw| into_entry(self.id, raw)).collect()
    }

    fn score_groups(&self) -> Result<Vec<(i64, u64)>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT score, COUNT(*) FROM leaderboard_scores
             WHERE leaderboard_id = ?1
             GROUP BY score
             ORDER BY score DESC",
        )?;
        let groups = stmt
            .query_map([self.id.as_str()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn create_leaderboard(
        &self,
        new: NewLeaderboard,
        timeout: Duration,
    ) -> Result<Leaderboard, StoreError> {
        self.run(timeout, move |conn, _| {
            let now = chrono::Utc::now().timestamp();
            let leaderboard = Leaderboard {
                id: new.id.unwrap_or_else(LeaderboardId::generate),
                title: new.title,
                description: new.description,
                created_at: now,
                updated_at: now,
            };

            conn.execute(
                "INSERT INTO leaderboards (id, title, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    leaderboard.id.as_str(),
                    leaderboard.title,
                    leaderboard.description,
                    leaderboard.created_at,
                    leaderboard.updated_at,
                ],
            )?;

            Ok(leaderboard)
        })
        .await
    }

    async fn get_leaderboard(
        &self,
        id: &LeaderboardId,
        timeout: Duration,
    ) -> Result<Option<Leaderboard>, StoreError> {
        let id = id.clone();
        self.run(timeout, move |conn, _| {
            SqliteSnapshot { conn: &*conn, id: &id }.leaderboard()
        })
        .await
    }

    async fn read(
        &self,
        id: &LeaderboardId,
        timeout: Duration,
        job: ReadJob,
    ) -> Result<(), StoreError> {
        let id = id.clone();
        self.run(timeout, move |conn, _| {
            // DEFERRED: the snapshot is fixed by the first SELECT inside the job
            let tx = conn.transaction()?;
            job(&SqliteSnapshot { conn: &*tx, id: &id })?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn apply(
        &self,
        id: &LeaderboardId,
        batch: WriteBatch,
        timeout: Duration,
    ) -> Result<WriteSummary, StoreError> {
        let id = id.clone();
        self.run(timeout, move |conn, deadline| {
            let now = chrono::Utc::now().timestamp();
            let mut summary = WriteSummary::default();

            // IMMEDIATE takes the write lock up front: concurrent batches serialize
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            match batch.mode {
                WriteMode::Overwrite => {
                    let deleted = tx
                        .execute(
                            "DELETE FROM leaderboard_scores WHERE leaderboard_id = ?1",
                            [id.as_str()],
                        )
                        .map_err(delete_failed)?;
                    summary.deleted = deleted as u64;
                }
                WriteMode::Merge => {
                    let mut delete = tx.prepare(
                        "DELETE FROM leaderboard_scores
                         WHERE leaderboard_id = ?1 AND address = ?2",
                    )?;
                    for entry in &batch.entries {
                        let removed = delete.execute(params![id.as_str(), entry.address])?;
                        summary.deleted += removed as u64;
                    }
                }
            }

            {
                let mut insert = tx.prepare(
                    "INSERT INTO leaderboard_scores
                     (leaderboard_id, address, score, points_data, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for entry in &batch.entries {
                    insert.execute(params![
                        id.as_str(),
                        entry.address,
                        entry.score,
                        encode_points(&entry.points_data)?,
                        now,
                        now,
                    ])?;
                    summary.inserted += 1;
                }
            }

            tx.execute(
                "UPDATE leaderboards SET updated_at = ?2 WHERE id = ?1",
                params![id.as_str(), now],
            )?;

            // Past the deadline: drop the transaction (rollback) instead of committing
            deadline.check()?;
            tx.commit()?;

            log::debug!(
                "✅ Applied {:?} batch to {}: deleted={} inserted={}",
                batch.mode,
                id,
                summary.deleted,
                summary.inserted
            );
            Ok(summary)
        })
        .await
    }
}
