//! Rank filter: every entry holding exactly one rank
//!
//! Rank `r` exists iff the entry at canonical index `r - 1` has rank `r`.
//! When it does, the holders are exactly the entries sharing its score.

use super::RankReader;
use crate::error::StoreError;
use crate::query::Page;
use crate::types::{RankedPosition, ScoreRange};

pub fn entries_with_rank(
    reader: &RankReader<'_>,
    rank: u64,
    page: Page,
) -> Result<Vec<RankedPosition>, StoreError> {
    if rank == 0 {
        return Ok(Vec::new());
    }

    let Some(anchor) = reader.entry_at(rank - 1)? else {
        return Ok(Vec::new());
    };
    if reader.rank_of(anchor.score)? != rank {
        // Swallowed by a tie above
        return Ok(Vec::new());
    }

    let entries = reader.scan(ScoreRange::exact(anchor.score), page.limit, page.offset)?;
    Ok(entries
        .into_iter()
        .map(|entry| RankedPosition::from_entry(entry, rank))
        .collect())
}
