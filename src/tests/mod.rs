//! Integration and unit tests for the skin database.
//!
//! ## Test Modules
//!
//! - **api_tests**: End-to-end requests through the full router
//! - **config_tests**: Configuration loading and validation tests
//! - **db_tests**: Schema initialization tests
//! - **skins_tests**: Catalog queries against a seeded database
//! - **upload_tests**: Skin type detection and adding archives
//! - **discord_tests**: Discord client against a mock server
//! - **error_tests**: Error to HTTP response mapping
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! cargo test api_tests
//! ```

pub mod db_tests;

pub mod support {
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
    use tempfile::TempDir;

    use crate::config::AppConfig;
    use crate::skins;
    use crate::types::{SkinType, TweetStatus};

    /// One connection that never idles out, so the in-memory database lives
    /// as long as the pool.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_db(&pool).await.unwrap();
        pool
    }

    /// Embedded defaults with storage redirected into a temp dir.
    pub fn test_config(storage: &TempDir) -> AppConfig {
        let mut config = AppConfig::from_defaults().unwrap();
        config.database.url = "sqlite::memory:".to_string();
        config.uploads.storage_dir = storage.path().join("skins");
        config.discord.enabled = false;
        config
    }

    pub async fn seed_skin(
        pool: &SqlitePool,
        md5: &str,
        skin_type: SkinType,
        status: TweetStatus,
        file_names: &[&str],
    ) {
        skins::insert_skin(pool, md5, skin_type).await.unwrap();
        sqlx::query("UPDATE skins SET tweet_status = ?1 WHERE md5 = ?2")
            .bind(status.as_str())
            .bind(md5)
            .execute(pool)
            .await
            .unwrap();
        for name in file_names {
            skins::record_filename(pool, md5, name, "test").await.unwrap();
        }
    }

    /// Bytes that look like a zip archive with the given member name.
    pub fn fake_archive(member: &str, salt: &str) -> Vec<u8> {
        let mut bytes = b"PK\x03\x04\x14\x00\x00\x00".to_vec();
        bytes.extend_from_slice(member.as_bytes());
        bytes.extend_from_slice(salt.as_bytes());
        bytes.extend_from_slice(b"PK\x05\x06");
        bytes
    }
}
