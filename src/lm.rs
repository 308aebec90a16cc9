//! # Language model
//! The endpoint of the `PromptTemplate -> PartialPrompt -> prompt` pipeline: something that consumes chat messages and
//! produces a reply.
//!
//! [LanguageModel] is the only seam between the prediction programs and the model server. The production
//! implementation is [OpenAiCompatibleLm], which talks to any server exposing the OpenAI chat completions API
//! (a local Ollama by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod openai_compatible;

pub use openai_compatible::OpenAiCompatibleLm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Debug, Error)]
pub enum LmError {
    #[error("request to the prediction backend failed: {0}")]
    Request(#[from] async_openai::error::OpenAIError),
    #[error("prediction backend returned an empty reply")]
    EmptyReply,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send one conversation and return the text of the first choice.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LmError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_openai::error::{ApiError, OpenAIError};
    use async_trait::async_trait;

    use super::{ChatMessage, LanguageModel, LmError};

    type Responder = dyn Fn(&[ChatMessage]) -> Result<String, LmError> + Send + Sync;

    /// In-memory model that answers through a closure and counts calls.
    pub(crate) struct ScriptedLm {
        responder: Box<Responder>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedLm {
        pub(crate) fn with(
            responder: impl Fn(&[ChatMessage]) -> Result<String, LmError> + Send + Sync + 'static,
        ) -> Self {
            Self { responder: Box::new(responder), delay: None, calls: AtomicUsize::new(0) }
        }

        pub(crate) fn replying(reply: impl Into<String>) -> Self {
            let reply = reply.into();
            Self::with(move |_| Ok(reply.clone()))
        }

        pub(crate) fn unreachable() -> Self {
            Self::with(|_| {
                Err(LmError::Request(OpenAIError::ApiError(ApiError {
                    message: "model server unavailable".to_string(),
                    r#type: Some("server_error".to_string()),
                    param: None,
                    code: None,
                })))
            })
        }

        pub(crate) fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.responder)(messages)
        }
    }

    /// Text of the `[[ ## name ## ]]` block in `content`, up to the next blank line.
    pub(crate) fn block<'a>(content: &'a str, name: &str) -> Option<&'a str> {
        let marker = format!("[[ ## {} ## ]]\n", name);
        let start = content.find(&marker)? + marker.len();
        let rest = &content[start..];
        let end = rest.find("\n\n").unwrap_or(rest.len());
        Some(rest[..end].trim())
    }
}
