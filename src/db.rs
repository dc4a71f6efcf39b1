//! Schema for the skin catalog.
//!
//! - `skins`: one row per distinct archive, keyed by md5
//! - `files`: every filename a skin was uploaded under, oldest first
//! - `search_index`: the last record pushed for each skin

use sqlx::SqlitePool;

// Tuning only; a connection that refuses one of these still works
const OPTIONAL_PRAGMAS: [&str; 4] = [
    "PRAGMA journal_mode=WAL;",
    "PRAGMA synchronous=NORMAL;",
    "PRAGMA busy_timeout=10000;",
    "PRAGMA cache_size=-16384;",
];

const TABLES: [(&str, &str); 3] = [
    (
        "skins",
        r#"CREATE TABLE IF NOT EXISTS skins (
            md5 TEXT PRIMARY KEY,
            skin_type TEXT NOT NULL,
            tweet_status TEXT NOT NULL DEFAULT 'UNREVIEWED',
            nsfw INTEGER NOT NULL DEFAULT 0,
            average_color TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "files",
        r#"CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            skin_md5 TEXT NOT NULL REFERENCES skins(md5) ON DELETE CASCADE,
            file_name TEXT NOT NULL,
            source TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            UNIQUE(skin_md5, file_name)
        )"#,
    ),
    (
        "search_index",
        r#"CREATE TABLE IF NOT EXISTS search_index (
            md5 TEXT PRIMARY KEY REFERENCES skins(md5) ON DELETE CASCADE,
            file_name TEXT NOT NULL,
            nsfw INTEGER NOT NULL,
            indexed_at TEXT NOT NULL
        )"#,
    ),
];

// The museum query filters on type and sorts on status; filenames are read per skin in id order
const INDEXES: [(&str, &str); 2] = [
    (
        "idx_skins_type_status",
        "CREATE INDEX IF NOT EXISTS idx_skins_type_status ON skins(skin_type, tweet_status, md5)",
    ),
    ("idx_files_skin", "CREATE INDEX IF NOT EXISTS idx_files_skin ON files(skin_md5, id)"),
];

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    for pragma in OPTIONAL_PRAGMAS {
        if let Err(e) = sqlx::query(pragma).execute(pool).await {
            tracing::warn!("Ignoring failed {}: {}", pragma.trim_end_matches(';'), e);
        }
    }
    // Filenames and index records cascade with their skin
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    for (name, ddl) in TABLES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create table {}: {}", name, e))?;
    }

    // A missing index only costs speed
    for (name, ddl) in INDEXES {
        if let Err(e) = sqlx::query(ddl).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    tracing::debug!("Database schema ready");
    Ok(())
}
