//! Leaderboard engine facade
//!
//! Stateless apart from its injected collaborators: clone it freely and call
//! it from any number of tasks. Each query runs inside one store snapshot:
//! the existence check and every count and scan behind the answer see the
//! same committed state, under the engine's store timeout.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ingest;
use crate::normalizer::{AddressNormalizer, HexAddressNormalizer};
use crate::query::{IngestOptions, Page, PositionQuery};
use crate::ranking::{self, RankReader};
use crate::store::{read_snapshot, EntryStore, SqliteEntryStore};
use crate::types::{
    Leaderboard, LeaderboardId, NewLeaderboard, ParticipantCount, Quartiles, RankBucket,
    RankedPosition, ScoreSubmission,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Host-supplied write permission check, evaluated before any ingestion work
#[async_trait]
pub trait LeaderboardAccess: Send + Sync {
    async fn can_write(&self, leaderboard_id: &LeaderboardId) -> bool;
}

#[derive(Clone)]
pub struct LeaderboardEngine {
    store: Arc<dyn EntryStore>,
    normalizer: Arc<dyn AddressNormalizer>,
    timeout: Duration,
    rank_page_size: usize,
}

impl LeaderboardEngine {
    pub fn new(
        store: Arc<dyn EntryStore>,
        normalizer: Arc<dyn AddressNormalizer>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            normalizer,
            timeout: config.store_timeout,
            rank_page_size: config.rank_page_size.max(1),
        }
    }

    /// SQLite store at `config.db_path` with hex address normalization
    pub fn open_sqlite(config: &EngineConfig) -> EngineResult<Self> {
        let store = SqliteEntryStore::open(&config.db_path, config.pool_max_idle)?;
        Ok(Self::new(
            Arc::new(store),
            Arc::new(HexAddressNormalizer),
            config,
        ))
    }

    /// Same engine with a different deadline for every store call
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `f` over one snapshot of an existing leaderboard
    async fn read<T, F>(&self, leaderboard_id: &LeaderboardId, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&RankReader<'a>) -> EngineResult<T> + Send + 'static,
    {
        let id = leaderboard_id.clone();
        read_snapshot(self.store.as_ref(), leaderboard_id, self.timeout, move |snapshot| {
            if snapshot.leaderboard()?.is_none() {
                return Ok(Err(EngineError::leaderboard_not_found(&id)));
            }
            Ok(f(&RankReader::new(snapshot)))
        })
        .await?
    }

    fn normalize(&self, address: &str, normalize: bool) -> EngineResult<String> {
        if normalize {
            Ok(self.normalizer.normalize(address)?)
        } else {
            Ok(address.to_string())
        }
    }

    pub async fn create_leaderboard(&self, new: NewLeaderboard) -> EngineResult<Leaderboard> {
        let leaderboard = self.store.create_leaderboard(new, self.timeout).await?;
        log::info!(
            "🆕 Created leaderboard {} ({})",
            leaderboard.id,
            leaderboard.title
        );
        Ok(leaderboard)
    }

    pub async fn get_leaderboard(
        &self,
        leaderboard_id: &LeaderboardId,
    ) -> EngineResult<Leaderboard> {
        self.store
            .get_leaderboard(leaderboard_id, self.timeout)
            .await?
            .ok_or_else(|| EngineError::leaderboard_not_found(leaderboard_id))
    }

    pub async fn count_participants(
        &self,
        leaderboard_id: &LeaderboardId,
    ) -> EngineResult<ParticipantCount> {
        let count = self.read(leaderboard_id, |reader| Ok(reader.total()?)).await?;
        Ok(ParticipantCount { count })
    }

    /// Whole leaderboard, ranked, in canonical order
    pub async fn rank(&self, leaderboard_id: &LeaderboardId) -> EngineResult<Vec<RankedPosition>> {
        let page_size = self.rank_page_size;
        self.read(leaderboard_id, move |reader| {
            Ok(ranking::rank_all(reader, page_size)?)
        })
        .await
    }

    /// One page of the ranked leaderboard
    pub async fn leaderboard(
        &self,
        leaderboard_id: &LeaderboardId,
        page: Page,
    ) -> EngineResult<Vec<RankedPosition>> {
        self.read(leaderboard_id, move |reader| {
            Ok(ranking::leaderboard_page(reader, page)?)
        })
        .await
    }

    pub async fn position(
        &self,
        leaderboard_id: &LeaderboardId,
        query: &PositionQuery,
    ) -> EngineResult<Vec<RankedPosition>> {
        let address = self.normalize(&query.address, query.normalize_addresses)?;
        let (window_size, page) = (query.window_size, query.page);
        self.read(leaderboard_id, move |reader| {
            ranking::window_around(reader, &address, window_size, page)
        })
        .await
    }

    /// Fails with `EmptyLeaderboard` when the board exists but has no scores
    pub async fn quartiles(&self, leaderboard_id: &LeaderboardId) -> EngineResult<Quartiles> {
        self.read(leaderboard_id, ranking::quartiles).await
    }

    pub async fn ranks(&self, leaderboard_id: &LeaderboardId) -> EngineResult<Vec<RankBucket>> {
        self.read(leaderboard_id, |reader| Ok(ranking::rank_buckets(reader)?))
            .await
    }

    pub async fn by_rank(
        &self,
        leaderboard_id: &LeaderboardId,
        rank: u64,
        page: Page,
    ) -> EngineResult<Vec<RankedPosition>> {
        self.read(leaderboard_id, move |reader| {
            Ok(ranking::entries_with_rank(reader, rank, page)?)
        })
        .await
    }

    pub async fn add_scores(
        &self,
        leaderboard_id: &LeaderboardId,
        scores: Vec<ScoreSubmission>,
        options: IngestOptions,
    ) -> EngineResult<Vec<RankedPosition>> {
        // Validation first: a rejected batch never reaches the store
        let batch = ingest::prepare_batch(
            scores,
            options.normalize_addresses.then_some(self.normalizer.as_ref()),
        )?;
        self.get_leaderboard(leaderboard_id).await?;

        ingest::commit_batch(
            self.store.as_ref(),
            leaderboard_id,
            batch,
            options.overwrite,
            self.timeout,
        )
        .await
    }

    /// `add_scores` gated by the host's permission check
    pub async fn add_scores_authorized(
        &self,
        access: &dyn LeaderboardAccess,
        leaderboard_id: &LeaderboardId,
        scores: Vec<ScoreSubmission>,
        options: IngestOptions,
    ) -> EngineResult<Vec<RankedPosition>> {
        if !access.can_write(leaderboard_id).await {
            log::warn!("🚫 Write to leaderboard {} denied", leaderboard_id);
            return Err(EngineError::Forbidden(leaderboard_id.clone()));
        }
        self.add_scores(leaderboard_id, scores, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::normalizer::IdentityNormalizer;
    use crate::store::MemoryEntryStore;

    struct DenyAll;

    #[async_trait]
    impl LeaderboardAccess for DenyAll {
        async fn can_write(&self, _leaderboard_id: &LeaderboardId) -> bool {
            false
        }
    }

    fn engine() -> LeaderboardEngine {
        LeaderboardEngine::new(
            Arc::new(MemoryEntryStore::new()),
            Arc::new(IdentityNormalizer),
            &EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_unknown_leaderboard_is_not_found_everywhere() {
        let engine = engine();
        let id = LeaderboardId::new("missing");

        assert_eq!(engine.rank(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.quartiles(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.ranks(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            engine.by_rank(&id, 1, Page::unbounded()).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            engine
                .position(&id, &PositionQuery::new("a"))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            engine
                .add_scores(&id, vec![ScoreSubmission::new("a", 1)], IngestOptions::merge())
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_forbidden_push_never_touches_store() {
        let engine = engine();
        let board = engine
            .create_leaderboard(NewLeaderboard {
                title: "gated".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = engine
            .add_scores_authorized(
                &DenyAll,
                &board.id,
                vec![ScoreSubmission::new("a", 1)],
                IngestOptions::merge(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(engine.count_participants(&board.id).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_validation_precedes_store_access() {
        // Zero timeout: any store call would fail with StoreTimeout
        let engine = engine().with_timeout(Duration::ZERO);
        let id = LeaderboardId::new("whatever");

        let err = engine
            .add_scores(
                &id,
                vec![ScoreSubmission::new("a", 1), ScoreSubmission::new("a", 2)],
                IngestOptions::merge(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateParticipants);

        let err = engine
            .position(&id, &PositionQuery::new(" "))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = engine.rank(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreTimeout);
        assert!(err.is_retryable());
    }
}
