//! Data models shared by the gateway, the tool server, the planner and the
//! web front end.

use crate::error::ToolError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A movie lookup by title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieQuery {
    pub title: String,
}

impl MovieQuery {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into().trim().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.is_empty()
    }
}

/// Why a subtitle lookup came back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// The search returned no subtitle entries
    NoMatch,
    /// An entry was found but it carries no downloadable file
    NoFile,
    /// The download endpoint did not hand out a link
    NoDownloadLink,
    /// Some upstream call failed
    FetchFailed,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::NoMatch => write!(f, "no matching subtitles"),
            MissReason::NoFile => write!(f, "no downloadable subtitle file"),
            MissReason::NoDownloadLink => write!(f, "no download link issued"),
            MissReason::FetchFailed => write!(f, "subtitle fetch failed"),
        }
    }
}

/// Outcome of a subtitle download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleResult {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miss: Option<MissReason>,
}

impl SubtitleResult {
    pub fn found(text: impl Into<String>) -> Self {
        Self {
            found: true,
            text: Some(text.into()),
            miss: None,
        }
    }

    pub fn missing(reason: MissReason) -> Self {
        Self {
            found: false,
            text: None,
            miss: Some(reason),
        }
    }
}

/// The tools exposed by the tool server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    VerifyMovie,
    DownloadSubtitles,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::VerifyMovie, ToolName::DownloadSubtitles];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::VerifyMovie => "verify_movie",
            ToolName::DownloadSubtitles => "download_subtitles",
        }
    }

    /// Name of the required title argument
    pub fn title_argument(&self) -> &'static str {
        match self {
            ToolName::VerifyMovie => "name",
            ToolName::DownloadSubtitles => "movie_name",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify_movie" => Ok(ToolName::VerifyMovie),
            "download_subtitles" => Ok(ToolName::DownloadSubtitles),
            _ => Err(ToolError::UnknownTool(s.to_string())),
        }
    }
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: ToolName,
    pub arguments: BTreeMap<String, String>,
}

impl ToolCall {
    /// Validate a wire-level invocation: a known tool name and a JSON object
    /// of string arguments that includes the tool's non-blank title argument.
    pub fn from_wire(name: &str, arguments: &serde_json::Value) -> Result<Self, ToolError> {
        let name: ToolName = name.parse()?;

        let object = match arguments {
            serde_json::Value::Object(object) => object.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(ToolError::BadArgument(format!(
                    "arguments must be an object, got {}",
                    other
                )))
            }
        };

        let mut parsed = BTreeMap::new();
        for (key, value) in object {
            match value {
                serde_json::Value::String(s) => {
                    parsed.insert(key, s);
                }
                serde_json::Value::Null => {}
                other => {
                    return Err(ToolError::BadArgument(format!(
                        "argument '{}' must be a string, got {}",
                        key, other
                    )))
                }
            }
        }

        let required = name.title_argument();
        match parsed.get(required) {
            Some(value) if !value.trim().is_empty() => {}
            Some(_) => {
                return Err(ToolError::BadArgument(format!(
                    "argument '{}' must not be blank",
                    required
                )))
            }
            None => {
                return Err(ToolError::BadArgument(format!(
                    "missing required argument '{}'",
                    required
                )))
            }
        }

        Ok(Self {
            name,
            arguments: parsed,
        })
    }

    /// The trimmed title argument
    pub fn title(&self) -> &str {
        self.arguments
            .get(self.name.title_argument())
            .map(|s| s.trim())
            .unwrap_or_default()
    }

    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Payload returned by a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Flag(bool),
    Text(String),
}

impl fmt::Display for ToolPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolPayload::Flag(flag) => write!(f, "{}", flag),
            ToolPayload::Text(text) => f.write_str(text),
        }
    }
}

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub payload: ToolPayload,
}

/// How the user wants the movie split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodePreference {
    Episodes(u32),
    MinutesPerEpisode(u32),
    Unspecified,
}

impl EpisodePreference {
    /// Build a preference from raw form fields.
    ///
    /// Blank or unparsable numbers are ignored; an episode count wins over a
    /// per-episode length when both are given.
    pub fn from_form(episodes: Option<&str>, episode_length: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| {
            raw.map(str::trim)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0)
        };

        if let Some(count) = parse(episodes) {
            EpisodePreference::Episodes(count)
        } else if let Some(minutes) = parse(episode_length) {
            EpisodePreference::MinutesPerEpisode(minutes)
        } else {
            EpisodePreference::Unspecified
        }
    }
}

impl fmt::Display for EpisodePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodePreference::Episodes(n) => write!(f, "{} episodes", n),
            EpisodePreference::MinutesPerEpisode(m) => write!(f, "~{} minutes per episode", m),
            EpisodePreference::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// A point in the movie's runtime, second precision when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    millis: u64,
}

impl Timestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self { millis: secs * 1000 }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_secs(&self) -> u64 {
        self.millis / 1000
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.as_secs();
        write!(f, "{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

impl std::str::FromStr for Timestamp {
    type Err = String;

    /// Accepts `H:MM:SS`, `MM:SS`, and SRT-style fractions (`HH:MM:SS,mmm`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid timestamp '{}'", s);
        let s = s.trim();

        let (clock, fraction) = match s.find([',', '.']) {
            Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
            None => (s, None),
        };

        let parts: Vec<&str> = clock.split(':').collect();
        let numbers = parts
            .iter()
            .map(|p| {
                if p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()) {
                    None
                } else {
                    p.parse::<u64>().ok()
                }
            })
            .collect::<Option<Vec<u64>>>()
            .ok_or_else(invalid)?;

        let (hours, minutes, seconds) = match numbers.as_slice() {
            [h, m, s] => (*h, *m, *s),
            [m, s] => (0, *m, *s),
            _ => return Err(invalid()),
        };
        if minutes >= 60 || seconds >= 60 {
            return Err(invalid());
        }

        let millis = match fraction {
            None => 0,
            Some(f) if !f.is_empty() && f.len() <= 3 && f.chars().all(|c| c.is_ascii_digit()) => {
                // "5" means 500ms, "05" means 50ms
                format!("{:0<3}", f).parse::<u64>().map_err(|_| invalid())?
            }
            Some(_) => return Err(invalid()),
        };

        let total = hours
            .checked_mul(3600)
            .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
            .and_then(|secs| secs.checked_mul(1000))
            .and_then(|ms| ms.checked_add(millis))
            .ok_or_else(invalid)?;

        Ok(Self { millis: total })
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Summary of the source movie as described by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub title: String,
    #[serde(default)]
    pub runtime: Option<Timestamp>,
    #[serde(default)]
    pub original_synopsis: Option<String>,
}

/// One entry of an episode plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(alias = "index")]
    pub episode_number: u32,
    pub title: String,
    #[serde(alias = "start")]
    pub start_time: Timestamp,
    #[serde(alias = "end")]
    pub end_time: Timestamp,
    pub synopsis: String,
}

/// The final structured output of the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodePlan {
    #[serde(default)]
    pub movie: Option<MovieSummary>,
    pub episodes: Vec<Episode>,
}

/// Where the gateway's bearer token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Configured,
    UsernamePassword,
}

/// Bearer token for the subtitle database
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub obtained_via: TokenSource,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("obtained_via", &self.obtained_via)
            .finish()
    }
}
