//! Core leaderboard data types
//!
//! Persisted rows (`Leaderboard`, `Entry`) and the derived views the ranking
//! queries return (`RankedPosition`, `RankBucket`, `Quartiles`).
//!
//! Canonical order everywhere: score DESC, then participant address ASC.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque leaderboard identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaderboardId(String);

impl LeaderboardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaderboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LeaderboardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for LeaderboardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub id: LeaderboardId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a leaderboard
#[derive(Debug, Clone, Default)]
pub struct NewLeaderboard {
    /// Explicit id; the store generates one when `None`
    pub id: Option<LeaderboardId>,
    pub title: String,
    pub description: Option<String>,
}

/// One participant's current score within one leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub leaderboard_id: LeaderboardId,
    pub address: String,
    pub score: i64,
    pub points_data: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Canonical rank order: score DESC, address ASC
pub fn canonical_cmp(a: &Entry, b: &Entry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.address.cmp(&b.address))
}

impl Entry {
    pub fn key(&self) -> EntryKey {
        EntryKey {
            score: self.score,
            address: self.address.clone(),
        }
    }
}

/// Position of an entry in canonical order, used to resume ordered scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub score: i64,
    pub address: String,
}

impl EntryKey {
    /// Whether `entry` sorts strictly after this key
    pub fn precedes(&self, entry: &Entry) -> bool {
        entry.score < self.score || (entry.score == self.score && entry.address > self.address)
    }
}

/// A submitted (participant, score, payload) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub address: String,
    pub score: i64,
    #[serde(default)]
    pub points_data: Option<serde_json::Value>,
}

impl ScoreSubmission {
    pub fn new(address: impl Into<String>, score: i64) -> Self {
        Self {
            address: address.into(),
            score,
            points_data: None,
        }
    }

    pub fn with_points(mut self, points_data: serde_json::Value) -> Self {
        self.points_data = Some(points_data);
        self
    }
}

/// Entry with its computed rank (never persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPosition {
    pub address: String,
    pub score: i64,
    pub rank: u64,
    pub points_data: Option<serde_json::Value>,
}

impl RankedPosition {
    pub fn from_entry(entry: Entry, rank: u64) -> Self {
        Self {
            address: entry.address,
            score: entry.score,
            rank,
            points_data: entry.points_data,
        }
    }
}

/// All participants sharing one score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankBucket {
    pub score: i64,
    pub rank: u64,
    pub size: u64,
}

/// 25th/50th/75th percentile entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub percentile_25: RankedPosition,
    pub percentile_50: RankedPosition,
    pub percentile_75: RankedPosition,
}

/// Count response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantCount {
    pub count: u64,
}

/// Score interval for ordered range scans: `min` inclusive, `max` exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreRange {
    pub min: Option<i64>,
    pub max_exclusive: Option<i64>,
}

impl ScoreRange {
    pub fn all() -> Self {
        Self::default()
    }

    /// Exactly one score value
    pub fn exact(score: i64) -> Self {
        Self {
            min: Some(score),
            max_exclusive: score.checked_add(1),
        }
    }

    pub fn contains(&self, score: i64) -> bool {
        self.min.map_or(true, |min| score >= min)
            && self.max_exclusive.map_or(true, |max| score < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_position_serializes_original_field_names() {
        let position = RankedPosition {
            address: "0xabc".to_string(),
            score: 42,
            rank: 3,
            points_data: Some(serde_json::json!({"wins": 7})),
        };

        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["address"], "0xabc");
        assert_eq!(json["score"], 42);
        assert_eq!(json["rank"], 3);
        assert_eq!(json["points_data"]["wins"], 7);
    }

    #[test]
    fn test_score_range_bounds() {
        let range = ScoreRange {
            min: Some(10),
            max_exclusive: Some(20),
        };
        assert!(range.contains(10));
        assert!(range.contains(19));
        assert!(!range.contains(20));
        assert!(!range.contains(9));

        assert!(ScoreRange::exact(5).contains(5));
        assert!(!ScoreRange::exact(5).contains(6));
        assert!(ScoreRange::exact(i64::MAX).contains(i64::MAX));
        assert!(ScoreRange::all().contains(i64::MIN));
    }

    #[test]
    fn test_entry_key_orders_like_canonical_order() {
        let entry = |address: &str, score| Entry {
            leaderboard_id: "lb".into(),
            address: address.to_string(),
            score,
            points_data: None,
            created_at: 0,
            updated_at: 0,
        };
        let key = entry("b", 30).key();

        assert!(key.precedes(&entry("c", 30)));
        assert!(key.precedes(&entry("a", 10)));
        assert!(!key.precedes(&entry("b", 30)));
        assert!(!key.precedes(&entry("a", 30)));
        assert!(!key.precedes(&entry("z", 40)));
    }

    #[test]
    fn test_submission_payload_defaults_to_none() {
        let submission: ScoreSubmission =
            serde_json::from_str(r#"{"address": "0x1", "score": 9}"#).unwrap();
        assert_eq!(submission, ScoreSubmission::new("0x1", 9));
    }
}
