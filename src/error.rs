//! Error taxonomy for store access and ranking operations
//!
//! `StoreError` is what an `EntryStore` reports. `EngineError` is what callers
//! of the engine see; store failures are folded into it with enough context to
//! decide between retrying and showing a message.

use crate::normalizer::NormalizeError;
use crate::types::LeaderboardId;
use std::collections::BTreeSet;

#[derive(Debug)]
pub enum StoreError {
    /// Caller deadline passed; the store rolled back any open transaction
    Timeout,
    /// Delete-all step of an overwrite failed; transaction rolled back
    DeleteFailed(String),
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::OperationInterrupted)
            | Some(rusqlite::ErrorCode::DatabaseBusy)
            | Some(rusqlite::ErrorCode::DatabaseLocked) => StoreError::Timeout,
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Database(format!("points_data codec: {}", err))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "Store operation timed out"),
            StoreError::DeleteFailed(e) => write!(f, "Delete scores failed: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// What was missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Leaderboard(LeaderboardId),
    Participant {
        leaderboard_id: LeaderboardId,
        address: String,
    },
}

/// Flat error kind for host transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    EmptyLeaderboard,
    DuplicateParticipants,
    ReplaceFailed,
    Validation,
    Forbidden,
    StoreTimeout,
    Store,
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(NotFound),
    /// Leaderboard exists but holds no scores
    EmptyLeaderboard(LeaderboardId),
    DuplicateParticipants(BTreeSet<String>),
    ReplaceFailed {
        leaderboard_id: LeaderboardId,
        reason: String,
    },
    Validation(String),
    Forbidden(LeaderboardId),
    StoreTimeout,
    Store(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::EmptyLeaderboard(_) => ErrorKind::EmptyLeaderboard,
            EngineError::DuplicateParticipants(_) => ErrorKind::DuplicateParticipants,
            EngineError::ReplaceFailed { .. } => ErrorKind::ReplaceFailed,
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::StoreTimeout => ErrorKind::StoreTimeout,
            EngineError::Store(_) => ErrorKind::Store,
        }
    }

    /// Safe to resubmit unchanged: no partial mutation happened
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::StoreTimeout | EngineError::Store(_))
    }

    pub(crate) fn leaderboard_not_found(id: &LeaderboardId) -> Self {
        EngineError::NotFound(NotFound::Leaderboard(id.clone()))
    }

    pub(crate) fn participant_not_found(id: &LeaderboardId, address: &str) -> Self {
        EngineError::NotFound(NotFound::Participant {
            leaderboard_id: id.clone(),
            address: address.to_string(),
        })
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout => EngineError::StoreTimeout,
            StoreError::DeleteFailed(e) => EngineError::Store(format!("delete failed: {}", e)),
            StoreError::Database(e) => EngineError::Store(e),
        }
    }
}

impl From<NormalizeError> for EngineError {
    fn from(err: NormalizeError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(NotFound::Leaderboard(id)) => {
                write!(f, "Leaderboard not found: {}", id)
            }
            EngineError::NotFound(NotFound::Participant {
                leaderboard_id,
                address,
            }) => write!(
                f,
                "Address {} not found in leaderboard {}",
                address, leaderboard_id
            ),
            EngineError::EmptyLeaderboard(id) => write!(f, "Leaderboard {} is empty", id),
            EngineError::DuplicateParticipants(duplicates) => write!(
                f,
                "Duplicates in push to database are disallowed: {:?}",
                duplicates
            ),
            EngineError::ReplaceFailed {
                leaderboard_id,
                reason,
            } => write!(
                f,
                "Replacing scores of leaderboard {} failed: {}",
                leaderboard_id, reason
            ),
            EngineError::Validation(msg) => write!(f, "Validation error: {}", msg),
            EngineError::Forbidden(id) => write!(f, "No write access to leaderboard {}", id),
            EngineError::StoreTimeout => write!(f, "Store operation timed out"),
            EngineError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;
