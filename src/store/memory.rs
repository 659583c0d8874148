//! In-memory entry store
//!
//! Keeps each leaderboard's entries in a `BTreeMap` keyed by canonical rank
//! order, so scans are ordered walks. Used by tests and embedded hosts that do
//! not need durability. A read job runs under one read lock, so batches wait
//! for it to finish. Calls never suspend, so the timeout argument is only
//! honored when it is already zero.

use super::{EntrySnapshot, EntryStore, ReadJob, WriteBatch, WriteMode, WriteSummary};
use crate::error::StoreError;
use crate::types::{Entry, EntryKey, Leaderboard, LeaderboardId, NewLeaderboard, ScoreRange};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;
use std::time::Duration;

type RankKey = (Reverse<i64>, String);

#[derive(Debug, Clone)]
struct Board {
    leaderboard: Leaderboard,
    ordered: BTreeMap<RankKey, Entry>,
    scores: HashMap<String, i64>,
}

impl Board {
    fn remove(&mut self, address: &str) -> bool {
        match self.scores.remove(address) {
            Some(score) => self
                .ordered
                .remove(&(Reverse(score), address.to_string()))
                .is_some(),
            None => false,
        }
    }

    fn insert(&mut self, entry: Entry) {
        self.scores.insert(entry.address.clone(), entry.score);
        self.ordered
            .insert((Reverse(entry.score), entry.address.clone()), entry);
    }

    /// Ordered walk over `range`, starting strictly after `after` when given
    fn in_range<'a>(
        &'a self,
        range: ScoreRange,
        after: Option<&EntryKey>,
    ) -> Box<dyn Iterator<Item = &'a Entry> + 'a> {
        let mut lower: Bound<RankKey> = Bound::Unbounded;
        if let Some(max) = range.max_exclusive {
            match max.checked_sub(1) {
                Some(top) => lower = Bound::Included((Reverse(top), String::new())),
                None => return Box::new(std::iter::empty()),
            }
        }
        if let Some(key) = after {
            let key = (Reverse(key.score), key.address.clone());
            let tighter = match &lower {
                Bound::Included(bound) => key >= *bound,
                _ => true,
            };
            if tighter {
                lower = Bound::Excluded(key);
            }
        }

        Box::new(
            self.ordered
                .range((lower, Bound::Unbounded))
                .map(|(_, entry)| entry)
                .take_while(move |e| range.min.map_or(true, |min| e.score >= min)),
        )
    }
}

/// Read view under the store's read lock
struct MemorySnapshot<'a> {
    id: &'a LeaderboardId,
    board: Option<&'a Board>,
}

impl EntrySnapshot for MemorySnapshot<'_> {
    fn leaderboard_id(&self) -> &LeaderboardId {
        self.id
    }

    fn leaderboard(&self) -> Result<Option<Leaderboard>, StoreError> {
        Ok(self.board.map(|b| b.leaderboard.clone()))
    }

    fn count_in_range(&self, range: ScoreRange) -> Result<u64, StoreError> {
        Ok(self
            .board
            .map_or(0, |b| b.in_range(range, None).count() as u64))
    }

    fn get_entry(&self, address: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self.board.and_then(|b| {
            b.scores.get(address).and_then(|score| {
                b.ordered
                    .get(&(Reverse(*score), address.to_string()))
                    .cloned()
            })
        }))
    }

    fn entries_for(&self, addresses: &[String]) -> Result<Vec<Entry>, StoreError> {
        let Some(board) = self.board else {
            return Ok(Vec::new());
        };
        let mut keys: Vec<RankKey> = addresses
            .iter()
            .filter_map(|a| board.scores.get(a).map(|s| (Reverse(*s), a.clone())))
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys
            .iter()
            .filter_map(|key| board.ordered.get(key).cloned())
            .collect())
    }

    fn scan(
        &self,
        range: ScoreRange,
        after: Option<&EntryKey>,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Entry>, StoreError> {
        Ok(self.board.map_or_else(Vec::new, |b| {
            let take = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
            b.in_range(range, after)
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(take)
                .cloned()
                .collect()
        }))
    }

    fn score_groups(&self) -> Result<Vec<(i64, u64)>, StoreError> {
        let mut groups: Vec<(i64, u64)> = Vec::new();
        if let Some(board) = self.board {
            for entry in board.ordered.values() {
                match groups.last_mut() {
                    Some((score, size)) if *score == entry.score => *size += 1,
                    _ => groups.push((entry.score, 1)),
                }
            }
        }
        Ok(groups)
    }
}

#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    boards: RwLock<HashMap<LeaderboardId, Board>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(timeout: Duration) -> Result<(), StoreError> {
        if timeout.is_zero() {
            return Err(StoreError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn create_leaderboard(
        &self,
        new: NewLeaderboard,
        timeout: Duration,
    ) -> Result<Leaderboard, StoreError> {
        Self::check(timeout)?;
        let now = chrono::Utc::now().timestamp();
        let leaderboard = Leaderboard {
            id: new.id.unwrap_or_else(LeaderboardId::generate),
            title: new.title,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        let mut boards = self
            .boards
            .write()
            .map_err(|_| StoreError::Database("memory store poisoned".to_string()))?;
        if boards.contains_key(&leaderboard.id) {
            return Err(StoreError::Database(format!(
                "leaderboard {} already exists",
                leaderboard.id
            )));
        }
        boards.insert(
            leaderboard.id.clone(),
            Board {
                leaderboard: leaderboard.clone(),
                ordered: BTreeMap::new(),
                scores: HashMap::new(),
            },
        );
        Ok(leaderboard)
    }

    async fn get_leaderboard(
        &self,
        id: &LeaderboardId,
        timeout: Duration,
    ) -> Result<Option<Leaderboard>, StoreError> {
        Self::check(timeout)?;
        let boards = self
            .boards
            .read()
            .map_err(|_| StoreError::Database("memory store poisoned".to_string()))?;
        Ok(boards.get(id).map(|b| b.leaderboard.clone()))
    }

    async fn read(
        &self,
        id: &LeaderboardId,
        timeout: Duration,
        job: ReadJob,
    ) -> Result<(), StoreError> {
        Self::check(timeout)?;
        let boards = self
            .boards
            .read()
            .map_err(|_| StoreError::Database("memory store poisoned".to_string()))?;
        job(&MemorySnapshot {
            id,
            board: boards.get(id),
        })
    }

    async fn apply(
        &self,
        id: &LeaderboardId,
        batch: WriteBatch,
        timeout: Duration,
    ) -> Result<WriteSummary, StoreError> {
        Self::check(timeout)?;
        let mut boards = self
            .boards
            .write()
            .map_err(|_| StoreError::Database("memory store poisoned".to_string()))?;
        let board = boards.get_mut(id).ok_or_else(|| {
            StoreError::Database(format!("leaderboard {} does not exist", id))
        })?;

        // Work on a copy and swap it in: all-or-nothing under the write lock
        let mut next = board.clone();
        let now = chrono::Utc::now().timestamp();
        let mut summary = WriteSummary::default();

        match batch.mode {
            WriteMode::Overwrite => {
                summary.deleted = next.ordered.len() as u64;
                next.ordered.clear();
                next.scores.clear();
            }
            WriteMode::Merge => {
                for entry in &batch.entries {
                    if next.remove(&entry.address) {
                        summary.deleted += 1;
                    }
                }
            }
        }

        for submission in batch.entries {
            if next.scores.contains_key(&submission.address) {
                return Err(StoreError::Database(format!(
                    "duplicate address {} in batch",
                    submission.address
                )));
            }
            next.insert(Entry {
                leaderboard_id: id.clone(),
                address: submission.address,
                score: submission.score,
                points_data: submission.points_data,
                created_at: now,
                updated_at: now,
            });
            summary.inserted += 1;
        }

        next.leaderboard.updated_at = now;
        *board = next;
        Ok(summary)
    }
}
