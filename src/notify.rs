//! Moderation notifications.
//!
//! Uploads and reports are announced in chat channels so moderators can review
//! new skins. [`DiscordNotifier`] talks to the Discord REST API; [`NoopNotifier`]
//! stands in when no bot is configured.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::DiscordConfig, types::SkinDetails};

const USER_AGENT_VALUE: &str = concat!("skin-database/", env!("CARGO_PKG_VERSION"));
// Discord rejects message content above this length
const MAX_CONTENT_CHARS: usize = 2000;
const EMBED_COLOR: u32 = 0x00_99_ff;

/// Where a notification goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    SkinUploads,
    NsfwReview,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("chat service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rate limited by chat service, retry after {retry_after:.1}s")]
    RateLimited { retry_after: f64 },
    #[error("invalid notifier configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Posts a plain text message.
    async fn send(&self, channel: Channel, content: &str) -> Result<(), NotifyError>;

    /// Posts a rich summary of a skin, with its screenshot when it has one.
    async fn post_skin(&self, channel: Channel, skin: &SkinDetails, title: &str) -> Result<(), NotifyError>;
}

/// Tells moderators that a reported skin has already been through review.
pub async fn send_already_reviewed(
    notifier: &dyn Notifier,
    channel: Channel,
    skin: &SkinDetails,
) -> Result<(), NotifyError> {
    let content = format!(
        "{} was reported, but it has already been reviewed (status: {}). {}",
        skin.file_name, skin.tweet_status, skin.museum_url
    );
    notifier.send(channel, &content).await
}

fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let mut out: String = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
    out.push('…');
    out
}

#[derive(Debug, Serialize)]
struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    url: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage>,
    fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
struct EmbedImage {
    url: String,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

fn skin_embed(skin: &SkinDetails, title: &str) -> Embed {
    let mut fields = vec![
        EmbedField { name: "md5".to_string(), value: skin.md5.clone(), inline: false },
        EmbedField { name: "Type".to_string(), value: skin.skin_type.to_string(), inline: true },
        EmbedField { name: "Status".to_string(), value: skin.tweet_status.to_string(), inline: true },
    ];
    if skin.file_names.len() > 1 {
        fields.push(EmbedField {
            name: "Also uploaded as".to_string(),
            value: truncate_content(&skin.file_names[1..].join(", ")),
            inline: false,
        });
    }
    Embed {
        title: truncate_content(title),
        url: skin.museum_url.clone(),
        color: EMBED_COLOR,
        image: skin.screenshot_url.clone().map(|url| EmbedImage { url }),
        fields,
    }
}

/// Discord bot client, built once at startup.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    base_url: String,
    skin_uploads_channel_id: String,
    nsfw_skin_channel_id: String,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Result<Self, NotifyError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let mut auth = HeaderValue::from_str(&format!("Bot {}", config.token.trim()))
            .map_err(|e| NotifyError::Config(format!("invalid token: {}", e)))?;
        auth.set_sensitive(true);
        default_headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            skin_uploads_channel_id: config.skin_uploads_channel_id.clone(),
            nsfw_skin_channel_id: config.nsfw_skin_channel_id.clone(),
        })
    }

    fn channel_id(&self, channel: Channel) -> &str {
        match channel {
            Channel::SkinUploads => &self.skin_uploads_channel_id,
            Channel::NsfwReview => &self.nsfw_skin_channel_id,
        }
    }

    async fn create_message(&self, channel: Channel, body: &MessageBody) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{}/messages", self.base_url, self.channel_id(channel));
        tracing::debug!(url = %url, ?channel, "posting chat message");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .json::<RateLimitBody>()
                .await
                .map(|b| b.retry_after)
                .unwrap_or(1.0);
            return Err(NotifyError::RateLimited { retry_after });
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, channel: Channel, content: &str) -> Result<(), NotifyError> {
        let body = MessageBody { content: Some(truncate_content(content)), embeds: Vec::new() };
        self.create_message(channel, &body).await
    }

    async fn post_skin(&self, channel: Channel, skin: &SkinDetails, title: &str) -> Result<(), NotifyError> {
        let body = MessageBody { content: None, embeds: vec![skin_embed(skin, title)] };
        self.create_message(channel, &body).await
    }
}

/// Picks the notifier for the `[discord]` section: a live bot client when enabled,
/// otherwise messages are dropped.
pub fn from_config(config: &DiscordConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    if !config.enabled {
        tracing::info!("Discord notifications disabled");
        return Ok(Arc::new(NoopNotifier));
    }
    Ok(Arc::new(DiscordNotifier::new(config)?))
}

/// Used when no chat bot is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, channel: Channel, content: &str) -> Result<(), NotifyError> {
        tracing::debug!(?channel, content = %content, "notifications disabled, dropping message");
        Ok(())
    }

    async fn post_skin(&self, channel: Channel, skin: &SkinDetails, title: &str) -> Result<(), NotifyError> {
        tracing::debug!(?channel, md5 = %skin.md5, title = %title, "notifications disabled, dropping skin post");
        Ok(())
    }
}
