//! Leaderboard ranking engine
//!
//! Ranks participants of many independent leaderboards by score. Ranks are
//! derived on read from ordered store scans and range counts, never stored.
//!
//! ## Module Organization
//!
//! - `store` - entry store adapter (SQLite and in-memory backends)
//! - `ranking` - rank calculator, position window, quartiles, buckets, rank filter
//! - `ingest` - validated transactional score pushes
//! - `engine` - `LeaderboardEngine` facade tying the above together
//! - `normalizer` - participant address canonicalization
//! - `config` - environment configuration


pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod normalizer;
pub mod query;
pub mod ranking;
pub mod sqlite_pragma;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use engine::{LeaderboardAccess, LeaderboardEngine};
pub use error::{EngineError, EngineResult, ErrorKind, NotFound, StoreError};
pub use normalizer::{AddressNormalizer, HexAddressNormalizer, IdentityNormalizer, NormalizeError};
pub use query::{IngestOptions, Page, PositionQuery};
pub use store::{read_snapshot, EntrySnapshot, EntryStore, MemoryEntryStore, SqliteEntryStore};
pub use types::{
    Entry, EntryKey, Leaderboard, LeaderboardId, NewLeaderboard, ParticipantCount, Quartiles,
    RankBucket, RankedPosition, ScoreSubmission,
};
