//! Tool registry and dispatch onto the subtitle service.

use serde_json::json;
use shared::protocol::ToolDescriptor;
use shared::{MissReason, ToolCall, ToolError, ToolName, ToolPayload, ToolResult};
use std::sync::Arc;
use subtitle_gateway::SubtitleService;
use tracing::{debug, info};

/// Maps named tool invocations 1:1 onto [`SubtitleService`] calls
#[derive(Clone)]
pub struct ToolDispatcher {
    service: Arc<dyn SubtitleService>,
    default_language: String,
}

impl ToolDispatcher {
    pub fn new(service: Arc<dyn SubtitleService>, default_language: impl Into<String>) -> Self {
        Self {
            service,
            default_language: default_language.into(),
        }
    }

    /// Descriptors for `tools/list`, in a stable order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        ToolName::ALL.iter().map(|name| describe(*name)).collect()
    }

    /// Validate and run a single invocation.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let call = ToolCall::from_wire(name, arguments)?;
        debug!(tool = %call.name, title = %call.title(), "Dispatching tool call");

        let payload = match call.name {
            ToolName::VerifyMovie => {
                let found = self.service.verify_movie(call.title()).await;
                info!(title = %call.title(), found, "verify_movie");
                ToolPayload::Flag(found)
            }
            ToolName::DownloadSubtitles => {
                let language = call.argument("language");
                let result = self.service.download_subtitles(call.title(), language).await;
                info!(
                    title = %call.title(),
                    found = result.found,
                    miss = ?result.miss,
                    "download_subtitles"
                );

                match result.text {
                    Some(text) if result.found => ToolPayload::Text(text),
                    _ => ToolPayload::Text(miss_message(
                        call.title(),
                        language.unwrap_or(&self.default_language),
                        result.miss.unwrap_or(MissReason::FetchFailed),
                    )),
                }
            }
        };

        Ok(ToolResult {
            name: call.name.to_string(),
            payload,
        })
    }
}

/// Explanation handed back to the model when no subtitle text is available.
fn miss_message(title: &str, language: &str, reason: MissReason) -> String {
    match reason {
        MissReason::NoMatch => format!("No subtitles found for '{}' in '{}'.", title, language),
        MissReason::NoFile => "Subtitle file id not found in API response.".to_string(),
        MissReason::NoDownloadLink => "Failed to obtain download link for subtitles.".to_string(),
        MissReason::FetchFailed => format!("Subtitles for '{}' could not be retrieved.", title),
    }
}

fn describe(name: ToolName) -> ToolDescriptor {
    let (description, input_schema) = match name {
        ToolName::VerifyMovie => (
            "Given a name, verify whether it is a movie known to OpenSubtitles. \
             Returns true if at least one matching feature is a movie.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Movie title to look up"}
                },
                "required": ["name"]
            }),
        ),
        ToolName::DownloadSubtitles => (
            "Given a movie name, search for subtitles and return the subtitle text \
             (SRT if available).",
            json!({
                "type": "object",
                "properties": {
                    "movie_name": {"type": "string", "description": "Title to search"},
                    "language": {
                        "type": "string",
                        "description": "ISO 639-1 code, default \"en\""
                    }
                },
                "required": ["movie_name"]
            }),
        ),
    };

    ToolDescriptor {
        name: name.as_str().to_string(),
        description: description.to_string(),
        input_schema,
    }
}
