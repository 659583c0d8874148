//! Leaderboard CLI - create boards, push scores and query rankings
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin leaderboard -- create "Season 1" "optional description"
//! cargo run --release --bin leaderboard -- push <id> scores.json [--overwrite] [--no-normalize]
//! cargo run --release --bin leaderboard -- count <id>
//! cargo run --release --bin leaderboard -- rank <id>
//! cargo run --release --bin leaderboard -- board <id> [--limit N] [--offset N]
//! cargo run --release --bin leaderboard -- position <id> <address> [--window N] [--limit N] [--offset N] [--no-normalize]
//! cargo run --release --bin leaderboard -- quartiles <id>
//! cargo run --release --bin leaderboard -- ranks <id>
//! cargo run --release --bin leaderboard -- by-rank <id> <rank> [--limit N] [--offset N]
//! ```
//!
//! `scores.json` holds an array of `{"address": ..., "score": ..., "points_data": ...}`.
//! Results are printed to stdout as JSON.
//!
//! ## Environment Variables
//!
//! - LEADERBOARD_DB_PATH - SQLite database path (default: data/leaderboard.db)
//! - STORE_TIMEOUT_MS - Deadline for every store call (default: 5000)
//! - RANK_PAGE_SIZE - Scan page size for full rankings (default: 1000)
//! - POOL_MAX_IDLE - Idle SQLite connections kept open (default: 4)
//! - NORMALIZE_ADDRESSES - Default address normalization (default: true)
//! - RUST_LOG - Logging level (optional, default: info)

use leaderboard_engine::{
    EngineConfig, EngineError, IngestOptions, LeaderboardEngine, LeaderboardId, NewLeaderboard,
    Page, PositionQuery, ScoreSubmission,
};
use serde::Serialize;
use std::env;
use std::process::ExitCode;

const VALUE_FLAGS: [&str; 3] = ["--limit", "--offset", "--window"];

struct Args {
    positional: Vec<String>,
    raw: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let raw: Vec<String> = env::args().skip(1).collect();
        let mut positional = Vec::new();
        let mut iter = raw.iter();
        while let Some(arg) = iter.next() {
            if VALUE_FLAGS.contains(&arg.as_str()) {
                iter.next();
            } else if !arg.starts_with("--") {
                positional.push(arg.clone());
            }
        }
        Self { positional, raw }
    }

    fn has(&self, flag: &str) -> bool {
        self.raw.iter().any(|a| a == flag)
    }

    fn value(&self, flag: &str) -> Result<Option<i64>, String> {
        match self.raw.iter().position(|a| a == flag) {
            Some(idx) => {
                let value = self
                    .raw
                    .get(idx + 1)
                    .ok_or_else(|| format!("{} needs a value", flag))?;
                value
                    .parse()
                    .map(Some)
                    .map_err(|_| format!("{} expects an integer, got {}", flag, value))
            }
            None => Ok(None),
        }
    }

    fn arg(&self, idx: usize, name: &str) -> Result<&str, String> {
        self.positional
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| format!("missing <{}>", name))
    }

    fn leaderboard_id(&self) -> Result<LeaderboardId, String> {
        Ok(LeaderboardId::new(self.arg(1, "leaderboard_id")?))
    }

    fn page(&self) -> Result<Page, Box<dyn std::error::Error>> {
        Ok(Page::from_signed(self.value("--limit")?, self.value("--offset")?)?)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: &Args, config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = LeaderboardEngine::open_sqlite(config)?;
    let command = args.arg(0, "command")?;

    match command {
        "create" => {
            let board = engine
                .create_leaderboard(NewLeaderboard {
                    id: None,
                    title: args.arg(1, "title")?.to_string(),
                    description: args.positional.get(2).cloned(),
                })
                .await?;
            print_json(&board)
        }
        "push" => {
            let id = args.leaderboard_id()?;
            let path = args.arg(2, "scores.json")?;
            let scores: Vec<ScoreSubmission> =
                serde_json::from_str(&std::fs::read_to_string(path)?)?;
            let options = if args.has("--overwrite") {
                IngestOptions::overwrite()
            } else {
                IngestOptions::merge()
            };
            let normalize = config.normalize_addresses && !args.has("--no-normalize");
            let options = options.normalize(normalize);

            log::info!("📤 Pushing {} scores from {}", scores.len(), path);
            print_json(&engine.add_scores(&id, scores, options).await?)
        }
        "count" => print_json(&engine.count_participants(&args.leaderboard_id()?).await?),
        "rank" => print_json(&engine.rank(&args.leaderboard_id()?).await?),
        "board" => print_json(&engine.leaderboard(&args.leaderboard_id()?, args.page()?).await?),
        "position" => {
            let id = args.leaderboard_id()?;
            let query = PositionQuery::from_signed(
                args.arg(2, "address")?,
                args.value("--window")?.unwrap_or(1),
                args.value("--limit")?.unwrap_or(10),
                args.value("--offset")?.unwrap_or(0),
                config.normalize_addresses && !args.has("--no-normalize"),
            )?;
            print_json(&engine.position(&id, &query).await?)
        }
        "quartiles" => match engine.quartiles(&args.leaderboard_id()?).await {
            Ok(quartiles) => print_json(&quartiles),
            Err(EngineError::EmptyLeaderboard(id)) => {
                log::info!("ℹ️  Leaderboard {} has no scores yet", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        "ranks" => print_json(&engine.ranks(&args.leaderboard_id()?).await?),
        "by-rank" => {
            let id = args.leaderboard_id()?;
            let rank = args.arg(2, "rank")?;
            let rank: i64 = rank
                .parse()
                .map_err(|_| format!("<rank> expects an integer, got {}", rank))?;
            let rank = leaderboard_engine::query::non_negative("rank", rank)?;
            // Unlike listings, rank holders are unbounded unless --limit is given
            let page = match args.value("--limit")? {
                Some(_) => args.page()?,
                None => Page {
                    offset: args.page()?.offset,
                    ..Page::unbounded()
                },
            };
            print_json(&engine.by_rank(&id, rank, page).await?)
        }
        other => Err(format!("unknown command: {}", other).into()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = EngineConfig::from_env();
    log::debug!("   Database: {}", config.db_path);
    log::debug!("   Store timeout: {:?}", config.store_timeout);

    let args = Args::parse();
    match run(&args, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
