//! Data access for the skin catalog.
//!
//! Handlers never issue SQL themselves; everything they need from the `skins`,
//! `files` and `search_index` tables goes through the functions in this module.

use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::{
    config::LinksConfig,
    error::{AppError, AppResult},
    types::{MuseumItem, SearchRecord, SkinDetails, SkinType, TweetStatus},
};

const MUSEUM_ORDER: &str = "CASE s.tweet_status \
    WHEN 'TWEETED' THEN 0 \
    WHEN 'APPROVED' THEN 1 \
    WHEN 'UNREVIEWED' THEN 2 \
    WHEN 'REJECTED' THEN 3 \
    ELSE 4 END, s.md5";

/// Public links derived from a skin's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinLinks {
    pub screenshot_url: Option<String>,
    pub skin_url: String,
    pub museum_url: String,
}

/// Builds the public links for a skin. Only classic skins have screenshots.
pub fn skin_links(md5: &str, skin_type: SkinType, links: &LinksConfig) -> SkinLinks {
    let screenshot_url = match skin_type {
        SkinType::Classic => {
            Some(format!("{}/{}.png", links.screenshot_base_url.trim_end_matches('/'), md5))
        }
        SkinType::Modern => None,
    };
    SkinLinks {
        screenshot_url,
        skin_url: format!(
            "{}/{}.{}",
            links.skin_base_url.trim_end_matches('/'),
            md5,
            skin_type.extension()
        ),
        museum_url: format!("{}/{}/", links.museum_base_url.trim_end_matches('/'), md5),
    }
}

fn fallback_file_name(md5: &str, skin_type: SkinType) -> String {
    format!("{}.{}", md5, skin_type.extension())
}

fn parse_skin_type(raw: &str) -> AppResult<SkinType> {
    raw.parse().map_err(AppError::Database)
}

fn parse_tweet_status(raw: &str) -> AppResult<TweetStatus> {
    raw.parse().map_err(AppError::Database)
}

pub async fn classic_skin_count(pool: &SqlitePool) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM skins WHERE skin_type = 'CLASSIC'")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// One page of the public listing: classic skins, best reviewed first.
pub async fn museum_page(pool: &SqlitePool, offset: i64, first: i64) -> AppResult<Vec<MuseumItem>> {
    let sql = format!(
        r#"SELECT s.md5 AS md5,
                  s.nsfw AS nsfw,
                  s.tweet_status AS tweet_status,
                  s.average_color AS average_color,
                  (SELECT f.file_name FROM files f WHERE f.skin_md5 = s.md5 ORDER BY f.id LIMIT 1) AS file_name
           FROM skins s
           WHERE s.skin_type = 'CLASSIC'
           ORDER BY {}
           LIMIT ?1 OFFSET ?2"#,
        MUSEUM_ORDER
    );
    let rows = sqlx::query(&sql).bind(first).bind(offset).fetch_all(pool).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let md5: String = row.try_get("md5")?;
        let nsfw_flag: i64 = row.try_get("nsfw")?;
        let status: String = row.try_get("tweet_status")?;
        let file_name: Option<String> = row.try_get("file_name")?;
        items.push(MuseumItem {
            file_name: file_name.unwrap_or_else(|| fallback_file_name(&md5, SkinType::Classic)),
            nsfw: nsfw_flag != 0 || status == TweetStatus::Nsfw.as_str(),
            color: row.try_get("average_color")?,
            md5,
        });
    }
    Ok(items)
}

pub async fn skin_exists(pool: &SqlitePool, md5: &str) -> AppResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM skins WHERE md5 = ?1")
        .bind(md5)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Type of a stored skin, if the md5 is known.
pub async fn skin_type(pool: &SqlitePool, md5: &str) -> Result<Option<SkinType>, sqlx::Error> {
    let raw: Option<String> = sqlx::query_scalar("SELECT skin_type FROM skins WHERE md5 = ?1")
        .bind(md5)
        .fetch_optional(pool)
        .await?;
    raw.map(|r| r.parse::<SkinType>().map_err(|e| sqlx::Error::Decode(e.into()))).transpose()
}

pub async fn skin_by_md5(
    pool: &SqlitePool,
    md5: &str,
    links: &LinksConfig,
) -> AppResult<Option<SkinDetails>> {
    let Some(row) = sqlx::query(
        "SELECT md5, skin_type, tweet_status, nsfw, average_color FROM skins WHERE md5 = ?1",
    )
    .bind(md5)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let skin_type = parse_skin_type(&row.try_get::<String, _>("skin_type")?)?;
    let tweet_status = parse_tweet_status(&row.try_get::<String, _>("tweet_status")?)?;
    let nsfw_flag: i64 = row.try_get("nsfw")?;
    let md5: String = row.try_get("md5")?;

    let file_names: Vec<String> =
        sqlx::query_scalar("SELECT file_name FROM files WHERE skin_md5 = ?1 ORDER BY id")
            .bind(&md5)
            .fetch_all(pool)
            .await?;
    let file_name =
        file_names.first().cloned().unwrap_or_else(|| fallback_file_name(&md5, skin_type));
    let SkinLinks { screenshot_url, skin_url, museum_url } = skin_links(&md5, skin_type, links);

    Ok(Some(SkinDetails {
        skin_type,
        file_name,
        file_names,
        nsfw: nsfw_flag != 0 || tweet_status == TweetStatus::Nsfw,
        tweet_status,
        average_color: row.try_get("average_color")?,
        screenshot_url,
        skin_url,
        museum_url,
        md5,
    }))
}

/// Refreshes the searchable record of a skin and returns what was indexed.
pub async fn update_search_index(pool: &SqlitePool, md5: &str) -> AppResult<Option<SearchRecord>> {
    let Some(row) = sqlx::query(
        r#"SELECT s.md5 AS md5,
                  s.skin_type AS skin_type,
                  s.nsfw AS nsfw,
                  s.tweet_status AS tweet_status,
                  (SELECT f.file_name FROM files f WHERE f.skin_md5 = s.md5 ORDER BY f.id LIMIT 1) AS file_name
           FROM skins s WHERE s.md5 = ?1"#,
    )
    .bind(md5)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let md5: String = row.try_get("md5")?;
    let skin_type = parse_skin_type(&row.try_get::<String, _>("skin_type")?)?;
    let nsfw_flag: i64 = row.try_get("nsfw")?;
    let status: String = row.try_get("tweet_status")?;
    let file_name: Option<String> = row.try_get("file_name")?;

    let record = SearchRecord {
        object_id: md5.clone(),
        file_name: file_name.unwrap_or_else(|| fallback_file_name(&md5, skin_type)),
        nsfw: nsfw_flag != 0 || status == TweetStatus::Nsfw.as_str(),
        indexed_at: chrono::Utc::now().to_rfc3339(),
        md5,
    };

    sqlx::query(
        r#"INSERT INTO search_index (md5, file_name, nsfw, indexed_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(md5) DO UPDATE SET
               file_name = excluded.file_name,
               nsfw = excluded.nsfw,
               indexed_at = excluded.indexed_at"#,
    )
    .bind(&record.md5)
    .bind(&record.file_name)
    .bind(record.nsfw as i64)
    .bind(&record.indexed_at)
    .execute(pool)
    .await?;

    Ok(Some(record))
}

/// Creates the skin row. Returns `false` when the md5 is already catalogued.
pub async fn insert_skin<'e, E>(executor: E, md5: &str, skin_type: SkinType) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query("INSERT INTO skins (md5, skin_type) VALUES (?1, ?2) ON CONFLICT(md5) DO NOTHING")
        .bind(md5)
        .bind(skin_type.as_str())
        .execute(executor)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Remembers a filename for a skin. Returns `false` when it was already known.
pub async fn record_filename<'e, E>(
    executor: E,
    md5: &str,
    file_name: &str,
    source: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(
        "INSERT OR IGNORE INTO files (skin_md5, file_name, source) VALUES (?1, ?2, ?3)",
    )
    .bind(md5)
    .bind(file_name)
    .bind(source)
    .execute(executor)
    .await?;
    Ok(res.rows_affected() > 0)
}
