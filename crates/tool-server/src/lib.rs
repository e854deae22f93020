//! Tool server exposing the subtitle gateway to chat-completion agents.
//!
//! Two tools, `verify_movie` and `download_subtitles`, are served over the
//! Model Context Protocol's Streamable HTTP transport.

pub mod dispatch;
pub mod server;

pub use dispatch::ToolDispatcher;
pub use server::build_router;
