//! Adding uploaded archives to the catalog.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    skins,
    types::{AddSkinResult, AddSkinStatus, SkinType},
};

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("the uploaded file is not a zip archive")]
    NotAnArchive,
    #[error("could not tell what kind of skin {filename:?} is")]
    UnrecognizedSkin { filename: String },
    #[error("failed to store skin: {0}")]
    Storage(#[from] std::io::Error),
    #[error("failed to record skin: {0}")]
    Database(#[from] sqlx::Error),
}

/// On-disk home of uploaded archives, one file per md5.
#[derive(Debug, Clone)]
pub struct SkinStorage {
    root: PathBuf,
}

impl SkinStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, md5: &str, skin_type: SkinType) -> PathBuf {
        self.root.join(format!("{}.{}", md5, skin_type.extension()))
    }

    pub async fn write(&self, md5: &str, skin_type: SkinType, bytes: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(md5, skin_type);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Lowercase hex md5 of an archive, the skin's identifier.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w.eq_ignore_ascii_case(needle))
}

/// Works out whether an archive is a classic or a modern skin.
///
/// Zip archives keep member names uncompressed in their headers, so the
/// marker files can be found without extracting anything. The filename
/// extension is only consulted when neither marker is present.
pub fn detect_skin_type(bytes: &[u8], filename: &str) -> Result<SkinType, UploadError> {
    if !(bytes.starts_with(ZIP_LOCAL_HEADER) || bytes.starts_with(ZIP_EMPTY_ARCHIVE)) {
        return Err(UploadError::NotAnArchive);
    }
    if contains_ignore_case(bytes, b"skin.xml") {
        return Ok(SkinType::Modern);
    }
    if contains_ignore_case(bytes, b"main.bmp") {
        return Ok(SkinType::Classic);
    }
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("wal") => Ok(SkinType::Modern),
        Some("wsz") | Some("zip") => Ok(SkinType::Classic),
        _ => Err(UploadError::UnrecognizedSkin { filename: filename.to_string() }),
    }
}

/// Catalogs an uploaded archive.
///
/// A known md5 only gains the new filename and comes back as `FOUND`. That
/// includes a concurrent upload of the same bytes winning the insert first.
pub async fn add_skin_from_buffer(
    pool: &SqlitePool,
    storage: &SkinStorage,
    bytes: &[u8],
    filename: &str,
    source: &str,
) -> Result<AddSkinResult, UploadError> {
    let md5 = md5_hex(bytes);

    if let Some(existing) = skins::skin_type(pool, &md5).await? {
        return record_found(pool, md5, existing, filename, source).await;
    }

    let skin_type = detect_skin_type(bytes, filename)?;
    let path = storage.write(&md5, skin_type, bytes).await?;

    let mut tx = pool.begin().await?;
    if !skins::insert_skin(&mut *tx, &md5, skin_type).await? {
        tx.rollback().await?;
        let existing = skins::skin_type(pool, &md5).await?.unwrap_or(skin_type);
        return record_found(pool, md5, existing, filename, source).await;
    }
    skins::record_filename(&mut *tx, &md5, filename, source).await?;
    tx.commit().await?;

    tracing::info!(
        md5 = %md5,
        skin_type = %skin_type,
        path = %path.display(),
        "Added skin"
    );
    Ok(AddSkinResult { status: AddSkinStatus::Added, md5, skin_type })
}

async fn record_found(
    pool: &SqlitePool,
    md5: String,
    skin_type: SkinType,
    filename: &str,
    source: &str,
) -> Result<AddSkinResult, UploadError> {
    if skins::record_filename(pool, &md5, filename, source).await? {
        tracing::info!(md5 = %md5, filename = %filename, "Recorded new filename for known skin");
    }
    Ok(AddSkinResult { status: AddSkinStatus::Found, md5, skin_type })
}
