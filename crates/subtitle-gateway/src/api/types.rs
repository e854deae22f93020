//! OpenSubtitles API v1 response types.
//!
//! Only the fields the gateway reads are modelled; everything is optional
//! because the upstream schema is loose and varies between endpoints.

use serde::{Deserialize, Serialize};

/// Generic `{ "data": [...] }` wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// A feature (movie, episode, tvshow) from `/features`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: FeatureAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureAttributes {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub feature_type: Option<String>,
}

impl Feature {
    /// Whether this record describes a movie
    pub fn is_movie(&self) -> bool {
        self.attributes
            .feature_type
            .as_deref()
            .or(self.kind.as_deref())
            .map(|kind| kind.eq_ignore_ascii_case("movie"))
            .unwrap_or(false)
    }
}

/// A subtitle entry from `/subtitles`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: SubtitleAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtitleAttributes {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub download_count: Option<u64>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub files: Vec<SubtitleFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleFile {
    #[serde(default)]
    pub file_id: Option<u64>,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl SubtitleEntry {
    /// First attached file id, falling back to the entry's own numeric id
    pub fn file_id(&self) -> Option<u64> {
        self.attributes
            .files
            .iter()
            .find_map(|file| file.file_id)
            .or_else(|| self.id.as_deref().and_then(|id| id.trim().parse().ok()))
    }
}

/// Body of `POST /download`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub file_id: u64,
}

/// Response of `POST /download`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub remaining: Option<i64>,
}

/// Body of `POST /login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl LoginResponse {
    pub fn into_token(self) -> Option<String> {
        self.token
            .or(self.access_token)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}
