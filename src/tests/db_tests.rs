#[cfg(test)]
mod tests {
    use crate::tests::support::{memory_pool, seed_skin};
    use crate::types::{SkinType, TweetStatus};
    use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Row, Sqlite};

    const MD5: &str = "0123456789abcdef0123456789abcdef";

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let pool = memory_pool().await;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        for expected in ["files", "search_index", "skins"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }

        let indexes: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'index'")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(indexes.iter().any(|i| i == "idx_skins_type_status"));
        assert!(indexes.iter().any(|i| i == "idx_files_skin"));
    }

    #[tokio::test]
    async fn test_init_db_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_url = format!("sqlite://{}", dir.path().join("skins.db").display());
        Sqlite::create_database(&db_url).await.unwrap();
        let pool = SqlitePoolOptions::new().max_connections(1).connect(&db_url).await.unwrap();

        crate::db::init_db(&pool).await.unwrap();
        seed_skin(&pool, MD5, SkinType::Classic, TweetStatus::Approved, &["a.wsz"]).await;
        crate::db::init_db(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM skins").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_skin_defaults() {
        let pool = memory_pool().await;
        crate::skins::insert_skin(&pool, MD5, SkinType::Classic).await.unwrap();

        let row = sqlx::query("SELECT tweet_status, nsfw, average_color, created_at FROM skins WHERE md5 = ?1")
            .bind(MD5)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("tweet_status"), "UNREVIEWED");
        assert_eq!(row.get::<i64, _>("nsfw"), 0);
        assert!(row.get::<Option<String>, _>("average_color").is_none());
        assert!(!row.get::<String, _>("created_at").is_empty());
    }

    #[tokio::test]
    async fn test_files_cascade_with_skin() {
        let pool = memory_pool().await;
        seed_skin(&pool, MD5, SkinType::Classic, TweetStatus::Unreviewed, &["a.wsz", "b.wsz"]).await;
        crate::skins::update_search_index(&pool, MD5).await.unwrap();

        sqlx::query("DELETE FROM skins WHERE md5 = ?1").bind(MD5).execute(&pool).await.unwrap();

        let files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files").fetch_one(&pool).await.unwrap();
        let indexed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM search_index").fetch_one(&pool).await.unwrap();
        assert_eq!(files, 0);
        assert_eq!(indexed, 0);
    }

    #[tokio::test]
    async fn test_filename_requires_known_skin() {
        let pool = memory_pool().await;
        let result = crate::skins::record_filename(&pool, MD5, "orphan.wsz", "test").await;
        assert!(result.is_err());
    }
}
