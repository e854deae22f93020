//! Contract-level error kinds.
//!
//! Plumbing code uses `anyhow`; these are the failures that cross a
//! component boundary and have to be told apart by the caller.

use thiserror::Error;

/// Rejections raised by the tool server before a gateway call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("bad argument: {0}")]
    BadArgument(String),
}

/// Failures of a single plan generation request.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("chat-completion API key is not configured")]
    MissingApiKey,

    #[error("external call failed: {0}")]
    ExternalCall(String),

    #[error("planning did not converge after {rounds} rounds")]
    PlanningNonConvergence { rounds: usize },

    #[error("malformed plan: {0}")]
    MalformedPlan(String),
}

impl PlanError {
    /// Wrap any transport-level failure, keeping the full cause chain.
    pub fn external(err: impl Into<anyhow::Error>) -> Self {
        PlanError::ExternalCall(format!("{:#}", err.into()))
    }
}
