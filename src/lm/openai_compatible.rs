use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use log::{debug, warn};

use crate::config::LmConfig;
use crate::lm::{ChatMessage, LanguageModel, LmError, Role};
use crate::utils::token::{Cl100kCounter, CountToken};

const TOKENS_PER_MESSAGE: usize = 3;

/// Chat model behind an OpenAI-compatible `/chat/completions` endpoint.
///
/// Every call goes to the server; replies are never cached.
pub struct OpenAiCompatibleLm {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u16,
    context_window: Option<usize>,
    counter: Option<Cl100kCounter>,
}

impl OpenAiCompatibleLm {
    pub fn new(config: &LmConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_base(config.api_base.trim_end_matches('/'))
            .with_api_key(config.api_key.as_str());
        let counter = match config.context_window {
            Some(_) => Cl100kCounter::new()
                .map_err(|e| warn!("token counting disabled, failed to load tokenizer: {}", e))
                .ok(),
            None => None,
        };
        Self {
            client: Client::with_config(openai_config).with_backoff(no_retries()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            context_window: config.context_window,
            counter,
        }
    }

    /// Estimated prompt size, counted the way chat templates frame each message.
    pub fn prompt_tokens(&self, messages: &[ChatMessage]) -> Option<usize> {
        let counter = self.counter.as_ref()?;
        Some(
            messages
                .iter()
                .map(|m| TOKENS_PER_MESSAGE + counter.count_token(&m.content))
                .sum(),
        )
    }

    fn warn_on_overflow(&self, messages: &[ChatMessage]) {
        if let (Some(window), Some(tokens)) = (self.context_window, self.prompt_tokens(messages)) {
            if tokens > window {
                warn!(
                    "prompt for {} is about {} tokens, over the {} token context window; the server may truncate it",
                    self.model, tokens, window
                );
            }
        }
    }
}

/// Rate-limited replies fail at once instead of being retried by the client.
fn no_retries() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new().with_max_elapsed_time(Some(Duration::ZERO)).build()
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.clone();
    Ok(match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default().content(content).build()?.into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default().content(content).build()?.into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default().content(content).build()?.into(),
    })
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleLm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LmError> {
        self.warn_on_overflow(messages);
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(request_messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()?;
        let response = self.client.chat().create(request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                "{} used {} prompt + {} completion tokens",
                self.model, usage.prompt_tokens, usage.completion_tokens
            );
        }
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LmError::EmptyReply)
    }
}
