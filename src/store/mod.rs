//! Entry store adapter
//!
//! The ranking engine never sorts a whole leaderboard in memory. It asks the
//! store for ordered range scans and range counts, and hands bulk writes to
//! the store as one transactional batch.
//!
//! ```text
//! LeaderboardEngine → ranking::* / ingest
//!     ↓
//! EntryStore::read  → EntrySnapshot (ordered scans, range counts)
//! EntryStore::apply → one write transaction
//!     ↓
//! SqliteEntryStore | MemoryEntryStore
//! ```
//!
//! A query that needs several reads runs them all inside one `read` call, so
//! every read sees the same committed state: either before or after any
//! concurrent batch, never a mix of the two.
//!
//! Every call takes the caller's timeout. On expiry the call fails with
//! `StoreError::Timeout` and no mutation is visible.

pub mod memory;
pub mod schema;
pub mod sqlite;

use crate::error::StoreError;
use crate::types::{
    Entry, EntryKey, Leaderboard, LeaderboardId, NewLeaderboard, ScoreRange, ScoreSubmission,
};
use async_trait::async_trait;
use std::time::Duration;

pub use memory::MemoryEntryStore;
pub use sqlite::SqliteEntryStore;

/// How a batch treats rows already in the leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Delete every existing entry, then insert the batch
    Overwrite,
    /// Replace entries of submitted addresses, leave the rest untouched
    Merge,
}

#[derive(Debug, Clone)]
pub struct WriteBatch {
    pub mode: WriteMode,
    pub entries: Vec<ScoreSubmission>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub deleted: u64,
    pub inserted: u64,
}

/// Consistent read view of one leaderboard
///
/// Every method sees the same committed state for the lifetime of the view.
pub trait EntrySnapshot {
    fn leaderboard_id(&self) -> &LeaderboardId;

    /// `None` when the leaderboard does not exist
    fn leaderboard(&self) -> Result<Option<Leaderboard>, StoreError>;

    /// Number of entries whose score lies in `range`
    fn count_in_range(&self, range: ScoreRange) -> Result<u64, StoreError>;

    fn get_entry(&self, address: &str) -> Result<Option<Entry>, StoreError>;

    /// Entries of the given addresses in canonical order (missing ones skipped)
    fn entries_for(&self, addresses: &[String]) -> Result<Vec<Entry>, StoreError>;

    /// Ordered range scan: score DESC, address ASC
    ///
    /// With `after`, only entries sorting strictly after that key are visited;
    /// `offset` then skips within what remains.
    fn scan(
        &self,
        range: ScoreRange,
        after: Option<&EntryKey>,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Entry>, StoreError>;

    /// Distinct scores, highest first, with the number of entries holding each
    fn score_groups(&self) -> Result<Vec<(i64, u64)>, StoreError>;
}

/// Multi-step read run against one snapshot
pub type ReadJob = Box<dyn FnOnce(&dyn EntrySnapshot) -> Result<(), StoreError> + Send>;

#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn create_leaderboard(
        &self,
        new: NewLeaderboard,
        timeout: Duration,
    ) -> Result<Leaderboard, StoreError>;

    async fn get_leaderboard(
        &self,
        id: &LeaderboardId,
        timeout: Duration,
    ) -> Result<Option<Leaderboard>, StoreError>;

    /// Run `job` against one snapshot of leaderboard `id`
    ///
    /// The snapshot exists even when the leaderboard does not; it then reads
    /// as empty and `leaderboard()` returns `None`.
    async fn read(
        &self,
        id: &LeaderboardId,
        timeout: Duration,
        job: ReadJob,
    ) -> Result<(), StoreError>;

    /// Apply a batch atomically
    ///
    /// A failure of the delete-all step in `WriteMode::Overwrite` must be
    /// reported as `StoreError::DeleteFailed`.
    async fn apply(
        &self,
        id: &LeaderboardId,
        batch: WriteBatch,
        timeout: Duration,
    ) -> Result<WriteSummary, StoreError>;
}

/// Typed wrapper over `EntryStore::read`: run `f` in one snapshot, return its value
pub async fn read_snapshot<T, F>(
    store: &dyn EntryStore,
    id: &LeaderboardId,
    timeout: Duration,
    f: F,
) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn EntrySnapshot) -> Result<T, StoreError> + Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();

    store
        .read(
            id,
            timeout,
            Box::new(move |snapshot: &dyn EntrySnapshot| {
                let value = f(snapshot)?;
                // Receiver outlives the job; a failed send only means the caller gave up
                let _ = tx.send(value);
                Ok(())
            }),
        )
        .await?;

    rx.await
        .map_err(|_| StoreError::Database("snapshot read finished without a result".to_string()))
}
