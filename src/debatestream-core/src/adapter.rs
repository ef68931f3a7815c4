//! Turn sources: the language-model endpoints debaters and the judge speak through.
//!
//! A [`TurnSource`] offers a one-shot completion and a pull-based stream of text
//! fragments. [`OpenAiTurnSource`] talks to any OpenAI-compatible endpoint.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::AdapterError;

/// Lazy, finite, non-restartable sequence of text fragments.
pub type FragmentStream = BoxStream<'static, Result<String, AdapterError>>;

/// Who a prompt message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One message of an instruction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// A language-model endpoint a speaker is bound to.
#[async_trait]
pub trait TurnSource: Send + Sync {
    /// Full response in one call. Used for the judge evaluation.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AdapterError>;

    /// Incremental response. An `Err` item ends the turn's output.
    async fn stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream, AdapterError>;

    /// Model identifier, for display.
    fn model_name(&self) -> &str;
}

/// Turn source backed by an OpenAI-compatible chat completions API.
pub struct OpenAiTurnSource {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    retries: u32,
}

impl OpenAiTurnSource {
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::Client(e.to_string()))?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            retries: 0,
        })
    }

    /// Build from a `[providers.<name>]` entry, reading the key from its env var.
    pub fn from_provider(provider: &ProviderConfig) -> Result<Self, AdapterError> {
        let api_key = std::env::var(&provider.api_key_env).unwrap_or_else(|_| {
            warn!(
                env = %provider.api_key_env,
                model = %provider.model,
                "API key variable not set; calls will likely be rejected"
            );
            String::new()
        });

        let source = Self::new(
            &provider.base_url,
            &api_key,
            provider.model.clone(),
            Duration::from_secs(provider.timeout_secs),
        )?
        .with_temperature(provider.temperature)
        .with_retries(provider.retries);
        Ok(match provider.max_tokens {
            Some(max_tokens) => source.with_max_tokens(max_tokens),
            None => source,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Extra attempts for [`TurnSource::complete`]; streams are never retried.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn request(&self, messages: &[PromptMessage]) -> Result<CreateChatCompletionRequest, AdapterError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .temperature(self.temperature)
            .messages(messages.iter().map(to_openai_message).collect::<Vec<_>>());
        if let Some(max_tokens) = self.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        Ok(args.build()?)
    }
}

#[async_trait]
impl TurnSource for OpenAiTurnSource {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AdapterError> {
        let request = self.request(messages)?;

        let attempts = self.retries + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // Exponential backoff: 2s, 4s, 8s...
                let delay = Duration::from_secs(1 << attempt.min(5));
                tokio::time::sleep(delay).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.message.content)
                        .unwrap_or_default();
                    return Ok(content);
                }
                Err(e) => {
                    warn!(model = %self.model, attempt = attempt + 1, attempts, error = %e, "completion failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(AdapterError::from)
            .unwrap_or_else(|| AdapterError::Other("no completion attempt was made".to_string())))
    }

    async fn stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream, AdapterError> {
        let request = self.request(messages)?;
        debug!(model = %self.model, messages = messages.len(), "opening completion stream");

        let stream = self.client.chat().create_stream(request).await?;

        Ok(stream
            .filter_map(|chunk| async move {
                match chunk {
                    Ok(response) => response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                        .filter(|fragment| !fragment.is_empty())
                        .map(Ok),
                    Err(e) => Some(Err(AdapterError::Stream(e.to_string()))),
                }
            })
            .boxed())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn to_openai_message(message: &PromptMessage) -> ChatCompletionRequestMessage {
    match message.role {
        PromptRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: message.content.clone().into(),
                name: None,
            })
        }
        PromptRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: message.content.clone().into(),
            name: None,
        }),
        PromptRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(message.content.clone().into()),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
                function_call: None,
            })
        }
    }
}
