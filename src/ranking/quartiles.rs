//! Quartile estimator
//!
//! For `N` entries the percentile `p` picks the entry at canonical index
//! `floor(p * (N - 1))`. Integer arithmetic keeps the boundaries exact.

use super::RankReader;
use crate::error::{EngineError, EngineResult};
use crate::types::{Quartiles, RankedPosition};

/// 0-based canonical index of `percent` over `total` entries (`total > 0`)
pub fn percentile_index(total: u64, percent: u64) -> u64 {
    let last = u128::from(total.saturating_sub(1));
    (last * u128::from(percent) / 100) as u64
}

fn entry_at_percentile(
    reader: &RankReader<'_>,
    total: u64,
    percent: u64,
) -> EngineResult<RankedPosition> {
    let index = percentile_index(total, percent);
    // Count and scan share one snapshot; a gap here is a store fault
    let entry = reader.entry_at(index)?.ok_or_else(|| {
        EngineError::Store(format!(
            "leaderboard {} has {} entries but none at index {}",
            reader.leaderboard_id(),
            total,
            index
        ))
    })?;
    let rank = reader.rank_of(entry.score)?;
    Ok(RankedPosition::from_entry(entry, rank))
}

pub fn quartiles(reader: &RankReader<'_>) -> EngineResult<Quartiles> {
    let total = reader.total()?;
    if total == 0 {
        return Err(EngineError::EmptyLeaderboard(reader.leaderboard_id().clone()));
    }

    Ok(Quartiles {
        percentile_25: entry_at_percentile(reader, total, 25)?,
        percentile_50: entry_at_percentile(reader, total, 50)?,
        percentile_75: entry_at_percentile(reader, total, 75)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::ErrorKind;
    use crate::error::StoreError;
    use crate::store::EntrySnapshot;
    use crate::types::{Entry, EntryKey, Leaderboard, LeaderboardId, ScoreRange};

    /// Reports more entries than its scans return
    struct Overcounting<'a>(&'a dyn EntrySnapshot);

    impl EntrySnapshot for Overcounting<'_> {
        fn leaderboard_id(&self) -> &LeaderboardId {
            self.0.leaderboard_id()
        }
        fn leaderboard(&self) -> Result<Option<Leaderboard>, StoreError> {
            self.0.leaderboard()
        }
        fn count_in_range(&self, range: ScoreRange) -> Result<u64, StoreError> {
            Ok(self.0.count_in_range(range)? * 10)
        }
        fn get_entry(&self, address: &str) -> Result<Option<Entry>, StoreError> {
            self.0.get_entry(address)
        }
        fn entries_for(&self, addresses: &[String]) -> Result<Vec<Entry>, StoreError> {
            self.0.entries_for(addresses)
        }
        fn scan(
            &self,
            range: ScoreRange,
            after: Option<&EntryKey>,
            limit: Option<u64>,
            offset: u64,
        ) -> Result<Vec<Entry>, StoreError> {
            self.0.scan(range, after, limit, offset)
        }
        fn score_groups(&self) -> Result<Vec<(i64, u64)>, StoreError> {
            self.0.score_groups()
        }
    }

    #[test]
    fn test_percentile_index_floor() {
        assert_eq!(percentile_index(1, 25), 0);
        assert_eq!(percentile_index(1, 75), 0);
        assert_eq!(percentile_index(4, 25), 0);
        assert_eq!(percentile_index(4, 50), 1);
        assert_eq!(percentile_index(4, 75), 2);
        assert_eq!(percentile_index(5, 50), 2);
        assert_eq!(percentile_index(101, 75), 75);
        assert_eq!(percentile_index(u64::MAX, 75), ((u64::MAX - 1) as u128 * 75 / 100) as u64);
    }

    #[tokio::test]
    async fn test_median_of_odd_strictly_decreasing() {
        let (store, id) = board(&[("a", 50), ("b", 40), ("c", 30), ("d", 20), ("e", 10)]).await;

        let q = query(&store, &id, |reader| quartiles(&reader).unwrap()).await;
        assert_eq!(q.percentile_25.address, "b");
        assert_eq!(q.percentile_25.rank, 2);
        assert_eq!(q.percentile_50.address, "c");
        assert_eq!(q.percentile_50.rank, 3);
        assert_eq!(q.percentile_75.address, "d");
    }

    #[tokio::test]
    async fn test_quartile_inside_tie_reports_shared_rank() {
        let (store, id) = board(&[("a", 9), ("b", 5), ("c", 5), ("d", 5), ("e", 1)]).await;

        let q = query(&store, &id, |reader| quartiles(&reader).unwrap()).await;
        assert_eq!(q.percentile_50.address, "c");
        assert_eq!(q.percentile_50.rank, 2);
        assert_eq!(q.percentile_75.address, "d");
        assert_eq!(q.percentile_75.rank, 2);
    }

    #[tokio::test]
    async fn test_empty_leaderboard() {
        let (store, id) = board(&[]).await;

        let kind = query(&store, &id, |reader| quartiles(&reader).unwrap_err().kind()).await;
        assert_eq!(kind, ErrorKind::EmptyLeaderboard);
    }

    #[tokio::test]
    async fn test_count_scan_mismatch_is_retryable_store_error() {
        let (store, id) = board(&[("a", 3), ("b", 2)]).await;

        let err = query(&store, &id, |reader| {
            let overcounting = Overcounting(reader.snapshot());
            quartiles(&RankReader::new(&overcounting)).unwrap_err()
        })
        .await;
        assert_eq!(err.kind(), ErrorKind::Store);
        assert!(err.is_retryable());
    }
}
