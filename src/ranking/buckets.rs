//! Rank bucket aggregator

use super::RankReader;
use crate::error::StoreError;
use crate::types::RankBucket;

/// Turn `(score, size)` groups, highest score first, into ranked buckets
pub fn buckets_from_groups(groups: Vec<(i64, u64)>) -> Vec<RankBucket> {
    let mut above = 0u64;
    groups
        .into_iter()
        .map(|(score, size)| {
            let bucket = RankBucket {
                score,
                rank: above + 1,
                size,
            };
            above += size;
            bucket
        })
        .collect()
}

pub fn rank_buckets(reader: &RankReader<'_>) -> Result<Vec<RankBucket>, StoreError> {
    let groups = reader.snapshot().score_groups()?;
    Ok(buckets_from_groups(groups))
}
