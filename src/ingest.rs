//! Score ingestor - validated, transactional bulk score pushes
//!
//! Flow per push:
//! 1. Normalize every address (when requested); any failure rejects the batch
//! 2. Reject the batch if an address appears more than once
//! 3. Hand the batch to the store as ONE transaction (overwrite or merge)
//! 4. Read back the submitted participants ranked against the committed board,
//!    in one snapshot with one range count per distinct submitted score

use crate::error::{EngineError, EngineResult, StoreError};
use crate::normalizer::AddressNormalizer;
use crate::query::IngestOptions;
use crate::ranking::RankReader;
use crate::store::{read_snapshot, EntryStore, WriteBatch, WriteMode};
use crate::types::{LeaderboardId, RankedPosition, ScoreSubmission};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

/// Normalize addresses in place, reporting the first failure with its position
pub fn normalize_batch(
    scores: Vec<ScoreSubmission>,
    normalizer: &dyn AddressNormalizer,
) -> EngineResult<Vec<ScoreSubmission>> {
    scores
        .into_iter()
        .enumerate()
        .map(|(i, mut submission)| {
            submission.address = normalizer.normalize(&submission.address).map_err(|e| {
                EngineError::Validation(format!("scores[{}]: {}", i, e))
            })?;
            Ok(submission)
        })
        .collect()
}

/// Every address submitted more than once
pub fn find_duplicates(scores: &[ScoreSubmission]) -> BTreeSet<String> {
    let mut seen = HashSet::with_capacity(scores.len());
    scores
        .iter()
        .filter(|s| !seen.insert(s.address.as_str()))
        .map(|s| s.address.clone())
        .collect()
}

/// Steps 1 and 2: everything that must pass before the store is touched
pub fn prepare_batch(
    scores: Vec<ScoreSubmission>,
    normalizer: Option<&dyn AddressNormalizer>,
) -> EngineResult<Vec<ScoreSubmission>> {
    let scores = match normalizer {
        Some(normalizer) => normalize_batch(scores, normalizer)?,
        None => scores,
    };

    let duplicates = find_duplicates(&scores);
    if !duplicates.is_empty() {
        log::warn!(
            "⚠️  Rejected score push with {} duplicated addresses",
            duplicates.len()
        );
        return Err(EngineError::DuplicateParticipants(duplicates));
    }

    Ok(scores)
}

/// Push a batch into an existing leaderboard and return the submitted
/// participants ranked against the post-commit board
pub async fn add_scores(
    store: &dyn EntryStore,
    leaderboard_id: &LeaderboardId,
    scores: Vec<ScoreSubmission>,
    options: IngestOptions,
    normalizer: &dyn AddressNormalizer,
    timeout: Duration,
) -> EngineResult<Vec<RankedPosition>> {
    let batch = prepare_batch(scores, options.normalize_addresses.then_some(normalizer))?;
    commit_batch(store, leaderboard_id, batch, options.overwrite, timeout).await
}

/// Steps 3 and 4 for a batch that already passed `prepare_batch`
pub async fn commit_batch(
    store: &dyn EntryStore,
    leaderboard_id: &LeaderboardId,
    batch: Vec<ScoreSubmission>,
    overwrite: bool,
    timeout: Duration,
) -> EngineResult<Vec<RankedPosition>> {
    let addresses: Vec<String> = batch.iter().map(|s| s.address.clone()).collect();

    let mode = if overwrite {
        WriteMode::Overwrite
    } else {
        WriteMode::Merge
    };

    let summary = store
        .apply(
            leaderboard_id,
            WriteBatch {
                mode,
                entries: batch,
            },
            timeout,
        )
        .await
        .map_err(|e| match e {
            StoreError::DeleteFailed(reason) => {
                log::error!(
                    "❌ Delete scores failed for leaderboard {}: {}",
                    leaderboard_id,
                    reason
                );
                EngineError::ReplaceFailed {
                    leaderboard_id: leaderboard_id.clone(),
                    reason,
                }
            }
            other => {
                log::error!(
                    "❌ Score update failed for leaderboard {}: {}",
                    leaderboard_id,
                    other
                );
                EngineError::from(other)
            }
        })?;

    log::info!(
        "📥 Scores pushed to {} ({:?}): deleted={} inserted={}",
        leaderboard_id,
        mode,
        summary.deleted,
        summary.inserted
    );

    if addresses.is_empty() {
        return Ok(Vec::new());
    }

    let view = read_snapshot(store, leaderboard_id, timeout, move |snapshot| {
        ranked_view(RankReader::new(snapshot), &addresses)
    })
    .await?;
    Ok(view)
}

/// Submitted participants in canonical order, one range count per distinct score
fn ranked_view(
    reader: RankReader<'_>,
    addresses: &[String],
) -> Result<Vec<RankedPosition>, StoreError> {
    let entries = reader.snapshot().entries_for(addresses)?;
    let mut rank_by_score: HashMap<i64, u64> = HashMap::new();

    entries
        .into_iter()
        .map(|entry| {
            let rank = match rank_by_score.get(&entry.score) {
                Some(rank) => *rank,
                None => {
                    let rank = reader.rank_of(entry.score)?;
                    rank_by_score.insert(entry.score, rank);
                    rank
                }
            };
            Ok(RankedPosition::from_entry(entry, rank))
        })
        .collect()
}
