use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkinType {
    Classic,
    Modern,
}

impl SkinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkinType::Classic => "CLASSIC",
            SkinType::Modern => "MODERN",
        }
    }

    /// Extension used for stored archives and download links.
    pub fn extension(&self) -> &'static str {
        match self {
            SkinType::Classic => "wsz",
            SkinType::Modern => "wal",
        }
    }
}

impl fmt::Display for SkinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLASSIC" => Ok(SkinType::Classic),
            "MODERN" => Ok(SkinType::Modern),
            other => Err(format!("unknown skin type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TweetStatus {
    Unreviewed,
    Approved,
    Rejected,
    Nsfw,
    Tweeted,
}

impl TweetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TweetStatus::Unreviewed => "UNREVIEWED",
            TweetStatus::Approved => "APPROVED",
            TweetStatus::Rejected => "REJECTED",
            TweetStatus::Nsfw => "NSFW",
            TweetStatus::Tweeted => "TWEETED",
        }
    }
}

impl fmt::Display for TweetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TweetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNREVIEWED" => Ok(TweetStatus::Unreviewed),
            "APPROVED" => Ok(TweetStatus::Approved),
            "REJECTED" => Ok(TweetStatus::Rejected),
            "NSFW" => Ok(TweetStatus::Nsfw),
            "TWEETED" => Ok(TweetStatus::Tweeted),
            other => Err(format!("unknown tweet status: {}", other)),
        }
    }
}

// One entry of a museum page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuseumItem {
    pub md5: String,
    pub file_name: String,
    pub nsfw: bool,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkinsPage {
    pub skin_count: i64,
    pub skins: Vec<MuseumItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkinDetails {
    pub md5: String,
    pub skin_type: SkinType,
    pub file_name: String,
    pub file_names: Vec<String>,
    pub tweet_status: TweetStatus,
    pub nsfw: bool,
    pub average_color: Option<String>,
    pub screenshot_url: Option<String>,
    pub skin_url: String,
    pub museum_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub md5: String,
    pub file_name: String,
    pub nsfw: bool,
    pub indexed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddSkinStatus {
    Added,
    Found,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSkinResult {
    pub status: AddSkinStatus,
    pub md5: String,
    pub skin_type: SkinType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(flatten)]
    pub result: AddSkinResult,
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MissingRequest {
    pub hashes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissingResponse {
    pub missing: Vec<String>,
    pub found: Vec<String>,
}
