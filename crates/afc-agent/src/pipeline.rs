use std::{sync::Arc, time::Duration};

use afc_core::agent::{Agent, AgentRequest, AnswerError};
use tracing::{info, instrument, warn};

use crate::prompt::PromptTemplate;

/// Marker at the start of every answer that reports a failure instead of
/// model output.
pub const ANSWER_ERROR_PREFIX: &str = "Sorry, an error occurred:";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Question + knowledge in, displayable answer out.
pub struct AnsweringPipeline {
    agent: Arc<dyn Agent + Send + Sync>,
    template: PromptTemplate,
    timeout: Duration,
}

impl AnsweringPipeline {
    pub fn new(agent: Arc<dyn Agent + Send + Sync>) -> Self {
        Self {
            agent,
            template: PromptTemplate::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn agent_name(&self) -> &'static str {
        self.agent.name()
    }

    /// Ask the model, bounded by the configured timeout.
    #[instrument(skip_all, fields(agent = self.agent.name()))]
    pub async fn try_answer(
        &self,
        question: &str,
        knowledge: &str,
    ) -> Result<String, AnswerError> {
        let request = AgentRequest::new(self.template.render(question, knowledge));

        let response = tokio::time::timeout(self.timeout, self.agent.ask(request))
            .await
            .map_err(|_| AnswerError::Timeout(self.timeout))??;

        let content = response.content.trim();
        if content.is_empty() {
            return Err(AnswerError::EmptyResponse);
        }
        info!(answer_bytes = content.len(), "answer received");
        Ok(content.to_string())
    }

    /// Like [`try_answer`](Self::try_answer), but failures come back as a
    /// marked message so an interactive loop can keep going.
    pub async fn answer(&self, question: &str, knowledge: &str) -> String {
        match self.try_answer(question, knowledge).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "answering failed");
                format_answer_error(&err)
            }
        }
    }
}

pub fn format_answer_error(err: &AnswerError) -> String {
    format!("{ANSWER_ERROR_PREFIX} {err}")
}

pub fn is_error_answer(answer: &str) -> bool {
    answer.starts_with(ANSWER_ERROR_PREFIX)
}
