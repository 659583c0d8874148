//! Position & window query
//!
//! Rank is non-decreasing along canonical order, so the entries with a rank
//! in `[lo, hi]` form one contiguous score range:
//!
//! - `rank(e) <= hi` iff `score(e) >= score_at(hi - 1)` (everything when fewer
//!   than `hi` entries exist)
//! - `rank(e) >= lo` iff `score(e) < score_at(lo - 2)` (no bound when `lo == 1`)

use super::RankReader;
use crate::error::{EngineError, EngineResult};
use crate::query::Page;
use crate::types::{RankedPosition, ScoreRange};

/// Inclusive rank bounds of a window around `rank`
pub fn window_bounds(rank: u64, window_size: u64) -> (u64, u64) {
    (
        rank.saturating_sub(window_size).max(1),
        rank.saturating_add(window_size),
    )
}

/// Score range holding exactly the entries ranked `lo..=hi`
fn rank_range_scores(reader: &RankReader<'_>, lo: u64, hi: u64) -> EngineResult<ScoreRange> {
    let min = reader.score_at(hi - 1)?;
    let max_exclusive = if lo >= 2 {
        reader.score_at(lo - 2)?
    } else {
        None
    };
    Ok(ScoreRange { min, max_exclusive })
}

/// Entries ranked within `window_size` of `address`, paginated
///
/// `address` must already be normalized.
pub fn window_around(
    reader: &RankReader<'_>,
    address: &str,
    window_size: u64,
    page: Page,
) -> EngineResult<Vec<RankedPosition>> {
    let entry = reader
        .get_entry(address)?
        .ok_or_else(|| EngineError::participant_not_found(reader.leaderboard_id(), address))?;

    let rank = reader.rank_of(entry.score)?;
    let (lo, hi) = window_bounds(rank, window_size);
    let range = rank_range_scores(reader, lo, hi)?;

    let entries = reader.scan(range, page.limit, page.offset)?;

    // Global index of the first scanned entry: everything above the range, plus offset
    let above = match range.max_exclusive {
        Some(max) => reader.count(ScoreRange {
            min: Some(max),
            max_exclusive: None,
        })?,
        None => 0,
    };

    log::debug!(
        "Position of {} in {}: rank={} window=[{}, {}] returned={}",
        address,
        reader.leaderboard_id(),
        rank,
        lo,
        hi,
        entries.len()
    );

    Ok(reader.rank_slice(entries, above + page.offset)?)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_window_bounds_clamp() {
        assert_eq!(window_bounds(2, 1), (1, 3));
        assert_eq!(window_bounds(1, 5), (1, 6));
        assert_eq!(window_bounds(7, 0), (7, 7));
        assert_eq!(window_bounds(u64::MAX, 2), (u64::MAX - 2, u64::MAX));
    }

    #[tokio::test]
    async fn test_window_across_tie_skip() {
        // Ranks [1, 2, 2, 4]: rank 3 does not exist
        let (store, id) = board(&[("a", 40), ("b", 30), ("c", 30), ("d", 10)]).await;

        let window = query(&store, &id, |reader| {
            window_around(&reader, "b", 1, Page::default()).unwrap()
        })
        .await;
        assert_eq!(
            ranks_of(&window),
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 2),
                ("c".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_window_lower_bound_excludes_higher_ranks() {
        let (store, id) = board(&[
            ("a", 90),
            ("b", 80),
            ("c", 70),
            ("d", 70),
            ("e", 60),
            ("f", 50),
        ])
        .await;

        let (narrow, wide) = query(&store, &id, |reader| {
            (
                window_around(&reader, "e", 1, Page::default()).unwrap(),
                window_around(&reader, "e", 2, Page::default()).unwrap(),
            )
        })
        .await;

        // e is rank 5; window 1 -> ranks 4..=6 -> e (5), f (6); rank 4 is swallowed by the tie at 3
        assert_eq!(
            ranks_of(&narrow),
            vec![("e".to_string(), 5), ("f".to_string(), 6)]
        );

        // window 2 -> ranks 3..=7
        assert_eq!(
            ranks_of(&wide),
            vec![
                ("c".to_string(), 3),
                ("d".to_string(), 3),
                ("e".to_string(), 5),
                ("f".to_string(), 6),
            ]
        );
    }

    #[tokio::test]
    async fn test_window_paginates_with_global_ranks() {
        let (store, id) = board(&[("a", 40), ("b", 30), ("c", 30), ("d", 10)]).await;

        let (page, zero_window) = query(&store, &id, |reader| {
            (
                window_around(&reader, "d", 10, Page::new(2, 1)).unwrap(),
                window_around(&reader, "c", 0, Page::default()).unwrap(),
            )
        })
        .await;
        assert_eq!(
            ranks_of(&page),
            vec![("b".to_string(), 2), ("c".to_string(), 2)]
        );
        assert_eq!(
            ranks_of(&zero_window),
            vec![("b".to_string(), 2), ("c".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_unknown_participant_is_not_found() {
        let (store, id) = board(&[("a", 1)]).await;

        let kind = query(&store, &id, |reader| {
            window_around(&reader, "zed", 1, Page::default())
                .unwrap_err()
                .kind()
        })
        .await;
        assert_eq!(kind, ErrorKind::NotFound);
    }
}
