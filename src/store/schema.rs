//! Schema migrations
//!
//! SQL files under `/sql/` are embedded at build time and executed in file
//! name order (00_, 01_, ...). Every statement uses `IF NOT EXISTS`, so running
//! the set against an existing database is a no-op.

use rusqlite::Connection;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "00_leaderboards.sql",
        include_str!("../../sql/00_leaderboards.sql"),
    ),
    (
        "01_leaderboard_scores.sql",
        include_str!("../../sql/01_leaderboard_scores.sql"),
    ),
];

/// Run all embedded migrations against `conn`
pub fn run_schema_migrations(conn: &Connection) -> rusqlite::Result<()> {
    log::info!("🔧 Running leaderboard schema migrations");

    for (filename, sql) in MIGRATIONS {
        log::debug!("   ├─ Executing: {}", filename);
        conn.execute_batch(sql)?;
    }

    log::info!("✅ Schema ready ({} migrations)", MIGRATIONS.len());
    Ok(())
}
