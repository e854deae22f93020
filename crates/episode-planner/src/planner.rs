//! Bounded tool-calling loop that turns a title into an episode plan.
//!
//! Each round is a pure function of the conversation so far
//! ([`build_request`]); the only state carried between rounds is the
//! conversation itself.

use crate::chat::{ChatMessage, ChatModel, ChatRequest, FunctionTool, OpenAiChatClient, ToolCallRequest};
use crate::prompts::{user_prompt, SYSTEM_PROMPT};
use crate::tools::{McpToolClient, ToolInvoker};
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::config::PlannerConfig;
use shared::protocol::ToolDescriptor;
use shared::{EpisodePlan, EpisodePreference, PlanError, ToolError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces an episode plan for a movie
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate_plan(
        &self,
        title: &str,
        preference: EpisodePreference,
    ) -> Result<EpisodePlan, PlanError>;
}

/// Fixed inputs of every round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerSettings {
    pub model: String,
    pub max_rounds: usize,
}

impl PlannerSettings {
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_rounds: config.max_rounds.max(1),
        }
    }
}

/// The opening system and user turns for a request
pub fn initial_conversation(title: &str, preference: EpisodePreference) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(title, preference)),
    ]
}

/// Convert tool server descriptors into chat-completion function tools.
pub fn function_tools(descriptors: &[ToolDescriptor]) -> Vec<FunctionTool> {
    descriptors
        .iter()
        .map(|d| FunctionTool::new(&d.name, &d.description, d.input_schema.clone()))
        .collect()
}

/// Build the next chat-completion request.
///
/// Equal inputs always produce equal requests.
pub fn build_request(
    settings: &PlannerSettings,
    tools: &[FunctionTool],
    conversation: &[ChatMessage],
) -> ChatRequest {
    ChatRequest {
        model: settings.model.clone(),
        messages: conversation.to_vec(),
        tools: tools.to_vec(),
    }
}

/// Extract the first JSON value from a model response.
///
/// Tries a fenced ```json block first, then the outermost `{...}` span.
pub fn extract_json_output<T: DeserializeOwned>(response: &str) -> Option<T> {
    if let Some(fence_start) = response.find("```json") {
        let after_fence = &response[fence_start + "```json".len()..];
        if let Some(fence_end) = after_fence.find("```") {
            if let Ok(value) = serde_json::from_str(after_fence[..fence_end].trim()) {
                return Some(value);
            }
        }
    }

    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Parse the model's final answer into an [`EpisodePlan`].
pub fn parse_plan(content: &str) -> Result<EpisodePlan, PlanError> {
    extract_json_output(content).ok_or_else(|| {
        let preview: String = content.chars().take(200).collect();
        PlanError::MalformedPlan(format!("final answer is not an episode plan: {:?}", preview))
    })
}

/// Drives the chat model and the tool server until a plan comes back
pub struct EpisodePlanner {
    chat: Option<Arc<dyn ChatModel>>,
    tools: Arc<dyn ToolInvoker>,
    settings: PlannerSettings,
}

impl EpisodePlanner {
    /// `chat` is `None` when no API key is configured; every request then
    /// fails with [`PlanError::MissingApiKey`].
    pub fn new(
        chat: Option<Arc<dyn ChatModel>>,
        tools: Arc<dyn ToolInvoker>,
        settings: PlannerSettings,
    ) -> Self {
        Self {
            chat,
            tools,
            settings,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> anyhow::Result<Self> {
        let chat: Option<Arc<dyn ChatModel>> = match OpenAiChatClient::new(config) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn ChatModel>),
            Err(PlanError::MissingApiKey) => {
                warn!("OPENAI_API_KEY is not set; plan generation will be refused");
                None
            }
            Err(e) => return Err(e).context("Failed to create chat-completion client"),
        };

        let tools = McpToolClient::new(
            config.tool_server_url.clone(),
            Duration::from_secs(config.tool_timeout_secs),
        )
        .context("Failed to create tool server client")?;

        info!(
            model = %config.model,
            tool_server = %config.tool_server_url,
            max_rounds = config.max_rounds,
            "Episode planner ready"
        );

        Ok(Self::new(chat, Arc::new(tools), PlannerSettings::from_config(config)))
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    /// Run one tool call and render its outcome as tool message content.
    async fn run_tool_call(&self, call: &ToolCallRequest) -> Result<String, PlanError> {
        let raw = call.function.arguments.trim();
        let arguments = match serde_json::from_str::<Value>(raw) {
            Ok(object @ Value::Object(_)) => object,
            _ if raw.is_empty() => Value::Object(Default::default()),
            _ => {
                let err = ToolError::BadArgument(format!(
                    "arguments for {} must be a JSON object",
                    call.function.name
                ));
                warn!(tool = %call.function.name, error = %err, "Rejected model tool call");
                return Ok(err.to_string());
            }
        };

        let result = self.tools.call_tool(&call.function.name, arguments).await?;
        info!(
            tool = %call.function.name,
            is_error = result.is_error,
            "Tool call completed"
        );
        Ok(result.joined_text())
    }
}

#[async_trait]
impl PlanGenerator for EpisodePlanner {
    async fn generate_plan(
        &self,
        title: &str,
        preference: EpisodePreference,
    ) -> Result<EpisodePlan, PlanError> {
        let chat = self.chat.as_ref().ok_or(PlanError::MissingApiKey)?;

        let tools = function_tools(&self.tools.list_tools().await?);
        let mut conversation = initial_conversation(title, preference);
        info!(title = %title, preference = %preference, tools = tools.len(), "Generating episode plan");

        for round in 1..=self.settings.max_rounds {
            let request = build_request(&self.settings, &tools, &conversation);
            let reply = chat.complete(&request).await?;

            if reply.tool_calls.is_empty() {
                let content = reply.content.unwrap_or_default();
                debug!(round, chars = content.len(), "Model produced final answer");
                let plan = parse_plan(&content)?;
                info!(title = %title, round, episodes = plan.episodes.len(), "Episode plan generated");
                return Ok(plan);
            }

            if round == self.settings.max_rounds {
                debug!(round, count = reply.tool_calls.len(), "Skipping tool calls on final round");
                break;
            }

            info!(round, count = reply.tool_calls.len(), "Model requested tool calls");
            let calls = reply.tool_calls.clone();
            conversation.push(reply);

            for call in &calls {
                let output = self.run_tool_call(call).await?;
                conversation.push(ChatMessage::tool_result(&call.id, output));
            }
        }

        warn!(title = %title, rounds = self.settings.max_rounds, "Planning did not converge");
        Err(PlanError::PlanningNonConvergence {
            rounds: self.settings.max_rounds,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use shared::protocol::CallToolResult;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies and records every request it was sent
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<ChatMessage>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<ChatMessage>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, PlanError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| PlanError::ExternalCall("script exhausted".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingTools {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl ToolInvoker for RecordingTools {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, PlanError> {
            Ok(vec![ToolDescriptor {
                name: "verify_movie".to_string(),
                description: "Verify a movie".to_string(),
                input_schema: json!({"type": "object", "required": ["name"]}),
            }])
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, PlanError> {
            self.calls.lock().unwrap().push((name.to_string(), arguments));
            Ok(CallToolResult::text("true", Some(json!({"result": true}))))
        }
    }

    fn clock(minutes: usize) -> String {
        format!("{:02}:{:02}:00", minutes / 60, minutes % 60)
    }

    fn plan_json(episodes: usize) -> String {
        let episodes: Vec<Value> = (0..episodes)
            .map(|i| {
                json!({
                    "episode_number": i + 1,
                    "title": format!("Part {}", i + 1),
                    "start_time": clock(i * 25),
                    "end_time": clock((i + 1) * 25),
                    "synopsis": "Things happen."
                })
            })
            .collect();
        json!({"movie": {"title": "Inception", "runtime": "02:28:00"}, "episodes": episodes}).to_string()
    }

    fn planner(model: Arc<ScriptedModel>, tools: Arc<RecordingTools>, max_rounds: usize) -> EpisodePlanner {
        EpisodePlanner::new(
            Some(model as Arc<dyn ChatModel>),
            tools,
            PlannerSettings {
                model: "test-model".to_string(),
                max_rounds,
            },
        )
    }

    fn tool_call(id: &str, arguments: &str) -> ChatMessage {
        ChatMessage::assistant_tool_calls(vec![ToolCallRequest::function(id, "verify_movie", arguments)])
    }

    #[test]
    fn test_build_request_is_pure() {
        let settings = PlannerSettings {
            model: "m".to_string(),
            max_rounds: 5,
        };
        let tools = function_tools(&[ToolDescriptor {
            name: "verify_movie".to_string(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
        }]);
        let mut conversation = initial_conversation("Inception", EpisodePreference::Episodes(6));
        conversation.push(tool_call("c1", "{\"name\":\"Inception\"}"));
        conversation.push(ChatMessage::tool_result("c1", "true"));

        let first = build_request(&settings, &tools, &conversation);
        let second = build_request(&settings, &tools, &conversation);
        assert_eq!(first, second);
        assert_eq!(first.messages.len(), 4);
        assert_eq!(first.tools[0].function.name, "verify_movie");
    }

    #[test]
    fn test_extract_json_output() {
        let fenced = "Here you go:\n```json\n{\"episodes\": []}\n```\nEnjoy";
        assert_eq!(extract_json_output::<Value>(fenced), Some(json!({"episodes": []})));

        let bare = "Sure! {\"episodes\": []} Hope that helps.";
        assert_eq!(extract_json_output::<Value>(bare), Some(json!({"episodes": []})));

        assert_eq!(extract_json_output::<Value>("no json here"), None);
        assert_eq!(extract_json_output::<Value>("} backwards {"), None);
    }

    #[test]
    fn test_parse_plan() {
        let plan = parse_plan(&plan_json(3)).unwrap();
        assert_eq!(plan.episodes.len(), 3);
        assert_eq!(plan.episodes[2].end_time.to_string(), "01:15:00");

        let err = parse_plan("I could not find that movie.").unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan(_)));

        let err = parse_plan("{\"episodes\": \"many\"}").unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan(_)));

        let overflowing = plan_json(1).replacen("00:00:00", "9999999999999:00:00", 1);
        let err = parse_plan(&overflowing).unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan(_)));
    }

    #[tokio::test]
    async fn test_tool_round_then_plan() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("c1", "{\"name\":\"Inception\"}"),
            ChatMessage::assistant(plan_json(6)),
        ]));
        let tools = Arc::new(RecordingTools::default());
        let planner = planner(model.clone(), tools.clone(), 5);

        let plan = planner
            .generate_plan("Inception", EpisodePreference::Episodes(6))
            .await
            .unwrap();
        assert_eq!(plan.episodes.len(), 6);

        let calls = tools.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), [("verify_movie".to_string(), json!({"name": "Inception"}))]);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(last.content.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_multiple_calls_run_in_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant_tool_calls(vec![
                ToolCallRequest::function("a", "verify_movie", "{\"name\":\"First\"}"),
                ToolCallRequest::function("b", "verify_movie", "{\"name\":\"Second\"}"),
            ]),
            ChatMessage::assistant(plan_json(1)),
        ]));
        let tools = Arc::new(RecordingTools::default());
        planner(model.clone(), tools.clone(), 5)
            .generate_plan("First", EpisodePreference::Unspecified)
            .await
            .unwrap();

        let names: Vec<Value> = tools.calls.lock().unwrap().iter().map(|(_, a)| a["name"].clone()).collect();
        assert_eq!(names, vec![json!("First"), json!("Second")]);

        let requests = model.requests.lock().unwrap();
        let ids: Vec<Option<&str>> = requests[1].messages[3..]
            .iter()
            .map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec![Some("a"), Some("b")]);
    }

    #[tokio::test]
    async fn test_rounds_are_replayable() {
        let script = || {
            vec![
                tool_call("c1", "{\"name\":\"Inception\"}"),
                ChatMessage::assistant(plan_json(2)),
            ]
        };

        let first = Arc::new(ScriptedModel::new(script()));
        let second = Arc::new(ScriptedModel::new(script()));
        for model in [&first, &second] {
            planner(model.clone(), Arc::new(RecordingTools::default()), 5)
                .generate_plan("Inception", EpisodePreference::MinutesPerEpisode(30))
                .await
                .unwrap();
        }

        assert_eq!(
            *first.requests.lock().unwrap(),
            *second.requests.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn test_non_object_arguments_are_rejected_locally() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("c1", "[\"Inception\"]"),
            ChatMessage::assistant(plan_json(1)),
        ]));
        let tools = Arc::new(RecordingTools::default());
        planner(model.clone(), tools.clone(), 5)
            .generate_plan("Inception", EpisodePreference::Unspecified)
            .await
            .unwrap();

        assert!(tools.calls.lock().unwrap().is_empty());
        let requests = model.requests.lock().unwrap();
        let reply = requests[1].messages.last().unwrap().content.clone().unwrap();
        assert!(reply.starts_with("bad argument"));
    }

    #[tokio::test]
    async fn test_non_convergence() {
        let replies = (0..3).map(|i| tool_call(&format!("c{}", i), "{\"name\":\"x\"}")).collect();
        let model = Arc::new(ScriptedModel::new(replies));
        let tools = Arc::new(RecordingTools::default());
        let err = planner(model.clone(), tools.clone(), 3)
            .generate_plan("x", EpisodePreference::Unspecified)
            .await
            .unwrap_err();

        assert!(matches!(err, PlanError::PlanningNonConvergence { rounds: 3 }));
        assert_eq!(model.requests.lock().unwrap().len(), 3);
        // calls requested in the last round have nowhere to go
        assert_eq!(tools.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_final_answer() {
        let model = Arc::new(ScriptedModel::new(vec![ChatMessage::assistant(
            "Sorry, I cannot split that movie.",
        )]));
        let err = planner(model, Arc::new(RecordingTools::default()), 5)
            .generate_plan("x", EpisodePreference::Unspecified)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_contacts_nothing() {
        let tools = Arc::new(RecordingTools::default());
        let planner = EpisodePlanner::new(
            None,
            tools.clone(),
            PlannerSettings {
                model: "m".to_string(),
                max_rounds: 5,
            },
        );

        let err = planner
            .generate_plan("Inception", EpisodePreference::Episodes(6))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::MissingApiKey));
        assert!(tools.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_from_config_without_key() {
        let planner = EpisodePlanner::from_config(&PlannerConfig::default()).unwrap();
        assert!(planner.chat.is_none());
        assert_eq!(planner.settings().max_rounds, 5);
    }
}
