//! Episode planner: asks a chat-completion model for an episode plan,
//! letting it call the subtitle tools along the way.

pub mod chat;
pub mod planner;
pub mod prompts;
pub mod tools;

pub use chat::{ChatModel, OpenAiChatClient};
pub use planner::{EpisodePlanner, PlanGenerator, PlannerSettings};
pub use tools::{McpToolClient, ToolInvoker};
