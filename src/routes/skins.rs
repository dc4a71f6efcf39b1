use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Multipart, OriginalUri, Path, Query, State,
    },
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult, OptionExt},
    middleware::{
        ip::MaybeRemoteAddr,
        validation::{sanitize_for_logging, validate_md5},
    },
    notify::{self, Channel},
    routes::PrettyJson,
    skins,
    state::AppState,
    types::{
        AddSkinStatus, MissingRequest, MissingResponse, SkinDetails, SkinType, SkinsPage, TweetStatus,
        UploadResponse,
    },
    upload,
};

const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_PAGE_SIZE: i64 = 1000;
const MAX_MISSING_HASHES: usize = 10_000;
const REPORT_RECEIVED: &str = "The skin has been reported and will be reviewed shortly.";
const NO_FILE_MESSAGE: &str = "Someone hit the upload endpoint with no files attached.";

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_first")]
    pub first: i64,
}

fn default_first() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Sends a text message without holding up the response.
fn spawn_send(state: &AppState, channel: Channel, content: String) {
    let notifier = state.notifier.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        match notifier.send(channel, &content).await {
            Ok(()) => metrics.inc_notifications_sent(),
            Err(e) => {
                metrics.inc_notifications_failed();
                tracing::warn!(?channel, "Failed to send notification: {}", e);
            }
        }
    });
}

/// Posts a skin summary without holding up the response.
fn spawn_post_skin(state: &AppState, channel: Channel, skin: SkinDetails, title: String) {
    let notifier = state.notifier.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        match notifier.post_skin(channel, &skin, &title).await {
            Ok(()) => metrics.inc_notifications_sent(),
            Err(e) => {
                metrics.inc_notifications_failed();
                tracing::warn!(?channel, md5 = %skin.md5, "Failed to post skin: {}", e);
            }
        }
    });
}

fn permanent_redirect(url: &str) -> AppResult<Response> {
    let location = HeaderValue::from_str(url)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid redirect target {:?}: {}", url, e)))?;
    Ok((StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response())
}

async fn cached_skin_count(state: &AppState) -> AppResult<i64> {
    if let Some(count) = *state.skin_count.read().await {
        return Ok(count);
    }
    let mut slot = state.skin_count.write().await;
    if let Some(count) = *slot {
        return Ok(count);
    }
    let count = skins::classic_skin_count(&state.db).await?;
    *slot = Some(count);
    Ok(count)
}

/// `GET /skins`: one museum page plus the total classic skin count.
pub async fn list_skins(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(page) = page?;
    let skin_count = cached_skin_count(&state).await?;
    state.metrics.inc_pages_served();

    let key = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path()).to_string();
    if let Some(skins) = state.cache.get(&key) {
        tracing::debug!("Cache hit for {}", key);
        state.metrics.inc_cache_hits();
        return Ok(PrettyJson(SkinsPage { skin_count, skins: skins.as_ref().clone() }).into_response());
    }
    state.metrics.inc_cache_misses();

    let offset = page.offset.max(0);
    let first = page.first.clamp(1, MAX_PAGE_SIZE);
    tracing::info!("Getting offset: {}, first: {}", offset, first);

    let start = Instant::now();
    let skins = skins::museum_page(&state.db, offset, first).await?;
    tracing::info!("Query took {:.3}s", start.elapsed().as_secs_f64());

    let skins = state.cache.insert(key, skins);
    tracing::debug!("Cache set for {}", uri);
    Ok(PrettyJson(SkinsPage { skin_count, skins: skins.as_ref().clone() }).into_response())
}

/// `POST /skins/missing`: which of the given hashes the catalog lacks.
pub async fn missing_skins(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    req: Result<Json<MissingRequest>, JsonRejection>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("/skins/missing", remote.client_ip(&headers)).await?;
    let Json(req) = req?;
    if req.hashes.len() > MAX_MISSING_HASHES {
        return Err(AppError::ValidationError {
            field: "hashes".to_string(),
            message: format!("At most {} hashes per request", MAX_MISSING_HASHES),
        });
    }

    tracing::info!("Checking for missing skins.");
    let mut out = MissingResponse::default();
    for md5 in req.hashes {
        if skins::skin_exists(&state.db, &md5.trim().to_ascii_lowercase()).await? {
            out.found.push(md5);
        } else {
            out.missing.push(md5);
        }
    }
    tracing::info!("{} skins are found and {} are missing.", out.found.len(), out.missing.len());
    Ok(PrettyJson(out).into_response())
}

async fn read_skin_field(multipart: &mut Multipart, limit: u64) -> AppResult<Option<(String, Bytes)>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("skin") {
            continue;
        }
        let filename = field.file_name().unwrap_or("untitled.wsz").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge { limit }
            } else {
                AppError::from(e)
            }
        })?;
        return Ok(Some((filename, bytes)));
    }
    Ok(None)
}

/// `POST /skins`: multipart upload with the archive in the `skin` field.
pub async fn upload_skin(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("/skins:upload", remote.client_ip(&headers)).await?;
    let limit = state.config.uploads.max_file_size;

    // A body that is not multipart at all carries no file either
    let upload = match multipart {
        Ok(mut multipart) => read_skin_field(&mut multipart, limit).await?,
        Err(rejection) => {
            tracing::debug!("Upload without a multipart body: {}", rejection.body_text());
            None
        }
    };

    let Some((filename, bytes)) = upload else {
        spawn_send(&state, Channel::SkinUploads, NO_FILE_MESSAGE.to_string());
        return Err(AppError::BadRequest("No file supplied".to_string()));
    };
    if bytes.len() as u64 > limit {
        state.metrics.inc_uploads_failed();
        return Err(AppError::PayloadTooLarge { limit });
    }

    let source = state.config.uploads.source.as_str();
    let result = match upload::add_skin_from_buffer(&state.db, &state.storage, &bytes, &filename, source).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Failed to add skin {}: {}", sanitize_for_logging(&filename), e);
            state.metrics.inc_uploads_failed();
            spawn_send(&state, Channel::SkinUploads, format!("Encountered an error uploading a skin: {}", e));
            return Err(e.into());
        }
    };

    match result.status {
        AddSkinStatus::Added => {
            state.metrics.inc_skins_added();
            match result.skin_type {
                SkinType::Classic => {
                    *state.skin_count.write().await = None;
                    tracing::info!("Going to post new skin to discord: {}", result.md5);
                    match skins::skin_by_md5(&state.db, &result.md5, &state.config.links).await {
                        Ok(Some(skin)) => spawn_post_skin(
                            &state,
                            Channel::SkinUploads,
                            skin,
                            format!("New skin uploaded: {}", filename),
                        ),
                        Ok(None) => tracing::warn!("Skin {} vanished right after upload", result.md5),
                        Err(e) => tracing::warn!("Could not load new skin {}: {}", result.md5, e),
                    }
                }
                SkinType::Modern => spawn_send(
                    &state,
                    Channel::SkinUploads,
                    format!("Someone uploaded a new modern skin: {} ({})", filename, result.md5),
                ),
            }
        }
        AddSkinStatus::Found => state.metrics.inc_skins_found(),
    }

    Ok(PrettyJson(UploadResponse { result, filename }).into_response())
}

/// `GET /skins/{md5}`
pub async fn get_skin(State(state): State<AppState>, Path(md5): Path<String>) -> AppResult<Response> {
    let md5 = validate_md5(&md5)?;
    tracing::info!("Details for hash \"{}\"", md5);
    let skin = skins::skin_by_md5(&state.db, &md5, &state.config.links).await?.ok_or_not_found("Skin")?;
    Ok(PrettyJson(skin).into_response())
}

/// `POST /skins/{md5}/index`
pub async fn index_skin(State(state): State<AppState>, Path(md5): Path<String>) -> AppResult<Response> {
    let md5 = validate_md5(&md5)?;
    tracing::info!("Going to index hash \"{}\"", md5);
    let record = skins::update_search_index(&state.db, &md5).await?.ok_or_not_found("Skin")?;
    state.metrics.inc_index_updates();
    Ok(PrettyJson(record).into_response())
}

/// `POST /skins/{md5}/report`: flag a skin for moderator review.
pub async fn report_skin(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Path(md5): Path<String>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("/skins/{md5}/report", remote.client_ip(&headers)).await?;
    let md5 = validate_md5(&md5)?;
    tracing::info!("Reporting skin with hash \"{}\"", md5);

    let skin = skins::skin_by_md5(&state.db, &md5, &state.config.links).await?.ok_or_not_found("Skin")?;
    state.metrics.inc_reports();

    if skin.tweet_status == TweetStatus::Unreviewed {
        let title = format!("Review: {}", skin.file_name);
        spawn_post_skin(&state, Channel::NsfwReview, skin, title);
    } else {
        let notifier = state.notifier.clone();
        let metrics = state.metrics.clone();
        tokio::spawn(async move {
            match notify::send_already_reviewed(notifier.as_ref(), Channel::NsfwReview, &skin).await {
                Ok(()) => metrics.inc_notifications_sent(),
                Err(e) => {
                    metrics.inc_notifications_failed();
                    tracing::warn!(md5 = %skin.md5, "Failed to send already-reviewed notice: {}", e);
                }
            }
        });
    }

    Ok((StatusCode::OK, REPORT_RECEIVED).into_response())
}

/// `GET /skins/{md5}/screenshot.png`: redirect to the screenshot.
pub async fn screenshot(State(state): State<AppState>, Path(md5): Path<String>) -> AppResult<Response> {
    let md5 = validate_md5(&md5)?;
    tracing::info!("Getting screenshot for hash \"{}\"", md5);
    let skin = skins::skin_by_md5(&state.db, &md5, &state.config.links).await?.ok_or_not_found("Skin")?;
    let url = skin.screenshot_url.ok_or_not_found("Screenshot")?;
    permanent_redirect(&url)
}

/// `GET /skins/{md5}/download`: redirect to the archive.
pub async fn download(State(state): State<AppState>, Path(md5): Path<String>) -> AppResult<Response> {
    let md5 = validate_md5(&md5)?;
    tracing::info!("Downloading for hash \"{}\"", md5);
    let skin = skins::skin_by_md5(&state.db, &md5, &state.config.links).await?.ok_or_not_found("Skin")?;
    permanent_redirect(&skin.skin_url)
}
