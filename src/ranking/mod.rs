//! Ranking engine
//!
//! Rank is never stored. For any entry it is `1 + number of entries with a
//! strictly higher score`, so ties share a rank and the next lower score skips
//! over the tie group: scores `[40, 30, 30, 10]` rank `[1, 2, 2, 4]`.
//!
//! Every query here reads through `RankReader`, which turns that definition
//! into range counts and ordered scans over one store snapshot. A query runs
//! entirely inside a single `EntryStore::read`, so its counts and scans agree
//! even while batches commit concurrently:
//!
//! ```text
//! rank_of(score)   = 1 + count(score' > score)
//! score_at(index)  = score of the entry at 0-based canonical index
//! RankCursor       = ranks along a contiguous slice of canonical order
//! ```
//!
//! ## Module Organization
//!
//! - `calculator` - full ranking and paged listing
//! - `position` - participant neighborhood

pub mod buckets;
pub mod calculator;
pub mod filter;
pub mod position;
pub mod quartiles;

use crate::error::StoreError;
use crate::store::EntrySnapshot;
use crate::types::{Entry, EntryKey, LeaderboardId, RankedPosition, ScoreRange};

pub use buckets::rank_buckets;
pub use calculator::{leaderboard_page, rank_all};
pub use filter::entries_with_rank;
pub use position::window_around;
pub use quartiles::quartiles;

/// Rank arithmetic over one leaderboard snapshot
#[derive(Clone, Copy)]
pub struct RankReader<'a> {
    snapshot: &'a dyn EntrySnapshot,
}

impl<'a> RankReader<'a> {
    pub fn new(snapshot: &'a dyn EntrySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn leaderboard_id(&self) -> &LeaderboardId {
        self.snapshot.leaderboard_id()
    }

    pub fn snapshot(&self) -> &'a dyn EntrySnapshot {
        self.snapshot
    }

    pub fn total(&self) -> Result<u64, StoreError> {
        self.count(ScoreRange::all())
    }

    pub fn count(&self, range: ScoreRange) -> Result<u64, StoreError> {
        self.snapshot.count_in_range(range)
    }

    /// Entries with a strictly higher score
    pub fn count_above(&self, score: i64) -> Result<u64, StoreError> {
        match score.checked_add(1) {
            Some(min) => self.count(ScoreRange {
                min: Some(min),
                max_exclusive: None,
            }),
            None => Ok(0),
        }
    }

    pub fn rank_of(&self, score: i64) -> Result<u64, StoreError> {
        Ok(self.count_above(score)? + 1)
    }

    pub fn get_entry(&self, address: &str) -> Result<Option<Entry>, StoreError> {
        self.snapshot.get_entry(address)
    }

    pub fn scan(
        &self,
        range: ScoreRange,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Entry>, StoreError> {
        self.snapshot.scan(range, None, limit, offset)
    }

    /// Up to `limit` entries sorting strictly after `key`
    pub fn scan_after(
        &self,
        key: Option<&EntryKey>,
        limit: u64,
    ) -> Result<Vec<Entry>, StoreError> {
        self.snapshot.scan(ScoreRange::all(), key, Some(limit), 0)
    }

    /// Entry at a 0-based index of canonical order
    pub fn entry_at(&self, index: u64) -> Result<Option<Entry>, StoreError> {
        Ok(self.scan(ScoreRange::all(), Some(1), index)?.pop())
    }

    pub fn score_at(&self, index: u64) -> Result<Option<i64>, StoreError> {
        Ok(self.entry_at(index)?.map(|e| e.score))
    }

    /// Rank a contiguous slice of canonical order
    ///
    /// `start_index` is the global index of `entries[0]`; only the first entry
    /// needs a range count, the rest follow from their ordinal.
    pub fn rank_slice(
        &self,
        entries: Vec<Entry>,
        start_index: u64,
    ) -> Result<Vec<RankedPosition>, StoreError> {
        let Some(first) = entries.first() else {
            return Ok(Vec::new());
        };
        let first_rank = self.rank_of(first.score)?;
        let mut cursor = RankCursor::resume(start_index, first.score, first_rank);
        Ok(entries.into_iter().map(|entry| cursor.next(entry)).collect())
    }
}

/// Assigns ranks while walking canonical order
#[derive(Debug, Clone, Copy)]
pub struct RankCursor {
    index: u64,
    last: Option<(i64, u64)>,
}

impl RankCursor {
    /// Cursor positioned before the first entry of the leaderboard
    pub fn at_start() -> Self {
        Self {
            index: 0,
            last: None,
        }
    }

    /// Cursor positioned before global `index`, whose entry has `score` and `rank`
    pub fn resume(index: u64, score: i64, rank: u64) -> Self {
        Self {
            index,
            last: Some((score, rank)),
        }
    }

    pub fn next(&mut self, entry: Entry) -> RankedPosition {
        let rank = match self.last {
            Some((score, rank)) if score == entry.score => rank,
            _ => self.index + 1,
        };
        self.last = Some((entry.score, rank));
        self.index += 1;
        RankedPosition::from_entry(entry, rank)
    }
}
