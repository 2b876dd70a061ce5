use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// A single composed prompt sent to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub prompt: String,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Text completion returned by a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub content: String,
}

/// Recoverable answering failures. Callers turn these into a displayable
/// message instead of ending the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerError {
    #[error("no response from the model within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("model provider error: {reason}")]
    Provider { reason: String },
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl AnswerError {
    pub fn provider(reason: impl ToString) -> Self {
        Self::Provider {
            reason: reason.to_string(),
        }
    }
}

/// Contract for any completion backend (hosted model, echo stub, test doubles).
#[async_trait]
pub trait Agent: Send + Sync {
    /// Short name used for logging.
    fn name(&self) -> &'static str;

    async fn ask(&self, request: AgentRequest) -> Result<AgentResponse, AnswerError>;
}

/// Returns the prompt unchanged. Backs `--dry-run` so the composed prompt can
/// be inspected without a network call.
pub struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn ask(&self, request: AgentRequest) -> Result<AgentResponse, AnswerError> {
        Ok(AgentResponse {
            content: request.prompt,
        })
    }
}
