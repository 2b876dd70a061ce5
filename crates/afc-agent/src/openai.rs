use afc_core::agent::{Agent, AgentRequest, AgentResponse, AnswerError};
use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

/// Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";

/// Connection settings for an OpenAI-compatible chat completions API.
#[derive(Debug)]
pub struct OpenAiSettings {
    pub api_key: SecretString,
    pub model: String,
    pub api_base: String,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

/// Hosted-model agent that sends the composed prompt as one user message.
pub struct OpenAiAgent {
    client: Client<OpenAIConfig>,
    settings: OpenAiSettings,
}

impl OpenAiAgent {
    pub fn new(settings: OpenAiSettings) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(settings.api_key.expose_secret())
            .with_api_base(&settings.api_base);
        let client = Client::with_config(config);
        Self { client, settings }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let user = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Text(prompt))
                .build()
                .context("building user message")?,
        );

        let req = CreateChatCompletionRequestArgs::default()
            .model(self.settings.model.clone())
            .messages(vec![user])
            .build()
            .context("building chat completion request")?;

        let resp = self
            .client
            .chat()
            .create(req)
            .await
            .context("chat completion failed")?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .context("model returned no choices")?;
        Ok(choice
            .message
            .content
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

#[async_trait]
impl Agent for OpenAiAgent {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    #[instrument(skip_all, fields(model = %self.settings.model))]
    async fn ask(&self, request: AgentRequest) -> Result<AgentResponse, AnswerError> {
        debug!(prompt_bytes = request.prompt.len(), "sending completion request");
        let content = self
            .complete(request.prompt)
            .await
            .map_err(|err| AnswerError::provider(format!("{err:#}")))?;

        if content.is_empty() {
            return Err(AnswerError::EmptyResponse);
        }
        Ok(AgentResponse { content })
    }
}
