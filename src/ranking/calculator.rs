//! Rank calculator: full ordering and paged listing
//!
//! The full ordering is streamed in pages of the ordered scan. Each page
//! resumes strictly after the last key of the previous one, so a page costs
//! the same wherever it starts; the cursor carries rank state across pages so
//! rank values stay global.

use super::{RankCursor, RankReader};
use crate::error::StoreError;
use crate::query::Page;
use crate::types::{EntryKey, RankedPosition, ScoreRange};

/// Every entry of the leaderboard, ranked, in canonical order
pub fn rank_all(
    reader: &RankReader<'_>,
    page_size: usize,
) -> Result<Vec<RankedPosition>, StoreError> {
    let page_size = page_size.max(1) as u64;
    let mut cursor = RankCursor::at_start();
    let mut ranked = Vec::new();
    let mut last: Option<EntryKey> = None;

    loop {
        let page = reader.scan_after(last.as_ref(), page_size)?;
        let fetched = page.len() as u64;
        last = page.last().map(|entry| entry.key());

        ranked.extend(page.into_iter().map(|entry| cursor.next(entry)));

        if fetched < page_size {
            break;
        }
    }

    log::debug!(
        "Ranked {} entries of {} ({} per page)",
        ranked.len(),
        reader.leaderboard_id(),
        page_size
    );
    Ok(ranked)
}

/// One page of the ranked leaderboard
pub fn leaderboard_page(
    reader: &RankReader<'_>,
    page: Page,
) -> Result<Vec<RankedPosition>, StoreError> {
    let entries = reader.scan(ScoreRange::all(), page.limit, page.offset)?;
    reader.rank_slice(entries, page.offset)
}
