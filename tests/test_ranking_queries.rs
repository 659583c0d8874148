//! Integration tests for ranking queries against the SQLite store
//!
//! Every test opens a fresh database in a temp directory and drives the
//! public `LeaderboardEngine` API end to end:
//! - full ranking and paged listing
//! - participant position windows
//! - quartiles, rank buckets and the rank filter
//! - empty and unknown leaderboards

#[cfg(test)]
mod ranking_query_tests {
    use leaderboard_engine::{
        EngineConfig, ErrorKind, IdentityNormalizer, IngestOptions, LeaderboardEngine,
        LeaderboardId, NewLeaderboard, Page, PositionQuery, RankBucket, RankedPosition,
        ScoreSubmission, SqliteEntryStore,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup_engine() -> (TempDir, LeaderboardEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteEntryStore::open(dir.path().join("ranking.db"), 4).unwrap();
        let config = EngineConfig {
            rank_page_size: 2,
            ..EngineConfig::default()
        };
        let engine = LeaderboardEngine::new(Arc::new(store), Arc::new(IdentityNormalizer), &config);
        (dir, engine)
    }

    async fn seeded(engine: &LeaderboardEngine, scores: &[(&str, i64)]) -> LeaderboardId {
        let board = engine
            .create_leaderboard(NewLeaderboard {
                title: "integration".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let batch = scores
            .iter()
            .map(|(a, s)| ScoreSubmission::new(*a, *s))
            .collect();
        engine
            .add_scores(&board.id, batch, IngestOptions::overwrite())
            .await
            .unwrap();
        board.id
    }

    fn ranks(positions: &[RankedPosition]) -> Vec<(&str, u64)> {
        positions.iter().map(|p| (p.address.as_str(), p.rank)).collect()
    }

    #[tokio::test]
    async fn test_full_ranking_with_ties() {
        let (_dir, engine) = setup_engine();
        let id = seeded(&engine, &[("d", 10), ("c", 30), ("a", 40), ("b", 30), ("e", 10)]).await;

        // Page size 2 splits both tie groups across scan pages
        let ranked = engine.rank(&id).await.unwrap();
        assert_eq!(
            ranks(&ranked),
            vec![("a", 1), ("b", 2), ("c", 2), ("d", 4), ("e", 4)]
        );
    }

    #[tokio::test]
    async fn test_leaderboard_page_keeps_global_ranks() {
        let (_dir, engine) = setup_engine();
        let id = seeded(&engine, &[("a", 40), ("b", 30), ("c", 30), ("d", 10)]).await;

        let page = engine.leaderboard(&id, Page::new(2, 2)).await.unwrap();
        assert_eq!(ranks(&page), vec![("c", 2), ("d", 4)]);

        let default_page = engine.leaderboard(&id, Page::default()).await.unwrap();
        assert_eq!(default_page.len(), 4);

        assert_eq!(engine.count_participants(&id).await.unwrap().count, 4);
    }

    #[tokio::test]
    async fn test_position_window_spans_tie_group() {
        let (_dir, engine) = setup_engine();
        let id = seeded(&engine, &[("a", 40), ("b", 30), ("c", 30), ("d", 10)]).await;

        // rank(c) = 2, window 1 covers ranks 1..=3
        let window = engine
            .position(&id, &PositionQuery::new("c").normalize(false))
            .await
            .unwrap();
        assert_eq!(ranks(&window), vec![("a", 1), ("b", 2), ("c", 2)]);

        // rank(d) = 4, window 1 covers ranks 3..=5: nobody holds 3
        let window = engine
            .position(&id, &PositionQuery::new("d").normalize(false))
            .await
            .unwrap();
        assert_eq!(ranks(&window), vec![("d", 4)]);

        let window = engine
            .position(&id, &PositionQuery::new("a").window(0).normalize(false))
            .await
            .unwrap();
        assert_eq!(ranks(&window), vec![("a", 1)]);

        let paged = engine
            .position(
                &id,
                &PositionQuery::new("c").window(5).page(Page::new(2, 1)).normalize(false),
            )
            .await
            .unwrap();
        assert_eq!(ranks(&paged), vec![("b", 2), ("c", 2)]);
    }

    #[tokio::test]
    async fn test_position_of_unknown_participant() {
        let (_dir, engine) = setup_engine();
        let id = seeded(&engine, &[("a", 40)]).await;

        let err = engine
            .position(&id, &PositionQuery::new("ghost").normalize(false))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_quartiles_buckets_and_rank_filter() {
        let (_dir, engine) = setup_engine();
        let id = seeded(
            &engine,
            &[("a", 90), ("b", 70), ("c", 70), ("d", 50), ("e", 30)],
        )
        .await;

        let quartiles = engine.quartiles(&id).await.unwrap();
        assert_eq!(quartiles.percentile_25.address, "b");
        assert_eq!(quartiles.percentile_25.rank, 2);
        assert_eq!(quartiles.percentile_50.address, "c");
        assert_eq!(quartiles.percentile_50.rank, 2);
        assert_eq!(quartiles.percentile_75.address, "d");
        assert_eq!(quartiles.percentile_75.rank, 4);

        let buckets = engine.ranks(&id).await.unwrap();
        assert_eq!(
            buckets,
            vec![
                RankBucket { score: 90, rank: 1, size: 1 },
                RankBucket { score: 70, rank: 2, size: 2 },
                RankBucket { score: 50, rank: 4, size: 1 },
                RankBucket { score: 30, rank: 5, size: 1 },
            ]
        );

        let tied = engine.by_rank(&id, 2, Page::default()).await.unwrap();
        assert_eq!(ranks(&tied), vec![("b", 2), ("c", 2)]);
        assert!(engine.by_rank(&id, 3, Page::default()).await.unwrap().is_empty());
        assert!(engine.by_rank(&id, 0, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_leaderboard_queries() {
        let (_dir, engine) = setup_engine();
        let id = seeded(&engine, &[]).await;

        let err = engine.quartiles(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyLeaderboard);

        assert!(engine.rank(&id).await.unwrap().is_empty());
        assert!(engine.ranks(&id).await.unwrap().is_empty());
        assert!(engine.by_rank(&id, 1, Page::default()).await.unwrap().is_empty());
        assert_eq!(engine.count_participants(&id).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_unknown_leaderboard() {
        let (_dir, engine) = setup_engine();
        let id = LeaderboardId::new("does-not-exist");

        assert_eq!(engine.get_leaderboard(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.ranks(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            engine.count_participants(&id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
