use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");
const MAX_UPLOAD_LIMIT: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    pub max_file_size: u64,
    pub storage_dir: PathBuf,
    /// Recorded next to every filename so later tooling knows where a skin came from.
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Unanchored regular expressions matched against the `Origin` header.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    pub screenshot_base_url: String,
    pub skin_base_url: String,
    pub museum_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub token: String,
    pub api_base_url: String,
    pub skin_uploads_channel_id: String,
    pub nsfw_skin_channel_id: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub uploads: UploadsConfig,
    pub cors: CorsConfig,
    pub links: LinksConfig,
    pub discord: DiscordConfig,
    pub security: Option<SecurityConfig>,
}

fn embedded() -> ::config::ConfigBuilder<::config::builder::DefaultState> {
    ::config::Config::builder().add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
}

impl AppConfig {
    /// The compiled-in `config/default.toml`, without files or environment.
    pub fn from_defaults() -> anyhow::Result<Self> {
        Ok(embedded().build()?.try_deserialize()?)
    }
}

/// Layers, lowest first: embedded defaults, `./skin-database.toml`, the file
/// named by `SKIN_DATABASE_CONFIG`, then `SKIN_DATABASE__SECTION__KEY`
/// variables (a `.env` file is read into the environment first).
pub fn load() -> anyhow::Result<AppConfig> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("Ignoring unreadable .env: {}", e);
        }
    }

    let mut builder = embedded().add_source(::config::File::with_name("skin-database").required(false));
    if let Ok(path) = std::env::var("SKIN_DATABASE_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&path).required(false));
    }
    let app_cfg: AppConfig = builder
        .add_source(
            ::config::Environment::with_prefix("SKIN_DATABASE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Cache
    if cfg.cache.max_entries == 0 {
        return Err(anyhow::anyhow!("cache.max_entries must be > 0"));
    }
    if cfg.cache.max_age_secs == 0 {
        return Err(anyhow::anyhow!("cache.max_age_secs must be > 0"));
    }

    // Uploads
    if cfg.uploads.max_file_size == 0 || cfg.uploads.max_file_size > MAX_UPLOAD_LIMIT {
        return Err(anyhow::anyhow!("uploads.max_file_size must be in 1..={}", MAX_UPLOAD_LIMIT));
    }

    // CORS
    for pattern in &cfg.cors.allowed_origins {
        if let Err(e) = Regex::new(pattern) {
            return Err(anyhow::anyhow!("invalid cors.allowed_origins pattern {:?}: {}", pattern, e));
        }
    }

    // Discord
    if cfg.discord.enabled {
        if cfg.discord.token.trim().is_empty() {
            return Err(anyhow::anyhow!("discord.token must be set when discord.enabled"));
        }
        if cfg.discord.skin_uploads_channel_id.trim().is_empty()
            || cfg.discord.nsfw_skin_channel_id.trim().is_empty()
        {
            return Err(anyhow::anyhow!("discord channel ids must be set when discord.enabled"));
        }
        if cfg.discord.timeout_secs == 0 {
            return Err(anyhow::anyhow!("discord.timeout_secs must be > 0"));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            // sqlite:///C:/... -> C:/...
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
