use std::{
    borrow::Cow,
    time::{Duration, Instant},
};

use async_openai::{
    Client,
    config::{Config, OpenAIConfig},
    error::OpenAIError,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{configs::LlmConfig, prompts::build_prompt};

/// Why a provider call produced no translation. `Display` yields the inline
/// bracketed form that lands in the rendered outputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationFailure {
    /// Connection error, non-success status or timeout.
    #[error("[API请求失败: {0}]")]
    Transport(String),
    /// The response body did not have `choices[0].message.content`.
    #[error("[解析响应失败: {0}]")]
    Shape(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(String),
    Failed(TranslationFailure),
}

impl TranslationOutcome {
    /// The text downstream renderers operate on.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            TranslationOutcome::Translated(text) => Cow::Borrowed(text),
            TranslationOutcome::Failed(failure) => Cow::Owned(failure.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TranslationOutcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&TranslationFailure> {
        match self {
            TranslationOutcome::Failed(failure) => Some(failure),
            TranslationOutcome::Translated(_) => None,
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates a whole cleaned file in one attempt. Never errors: failures
    /// come back as [`TranslationOutcome::Failed`].
    async fn translate(&self, cleaned_content: &str) -> TranslationOutcome;
}

/// Produces the bilingual layout locally without calling the provider.
pub struct DryRunTranslator;

#[async_trait]
impl Translator for DryRunTranslator {
    async fn translate(&self, cleaned_content: &str) -> TranslationOutcome {
        let pairs: Vec<String> = cleaned_content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(':') {
                Some((speaker, text)) => {
                    format!("{line}\n{}: [DRY:zh] {}", speaker.trim(), text.trim())
                }
                None => format!("{line}\n[DRY:zh] {line}"),
            })
            .collect();

        TranslationOutcome::Translated(pairs.join("\n\n"))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

pub struct LlmTranslator<T: Config> {
    pub client: Client<T>,
    pub config: LlmConfig,
}

impl LlmTranslator<OpenAIConfig> {
    /// Builds a client for `config.api_base` that makes exactly one attempt
    /// per request.
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_base(&config.api_base)
                .with_api_key(&config.api_key),
        )
        .with_backoff(single_attempt());
        Self::with_client(client, config)
    }
}

impl<T: Config> LlmTranslator<T> {
    pub fn with_client(client: Client<T>, config: LlmConfig) -> Self {
        Self { client, config }
    }

    async fn send(&self, request: ChatRequest<'_>) -> Result<Value, OpenAIError> {
        self.client.chat().create_byot(request).await
    }
}

#[async_trait]
impl<M> Translator for LlmTranslator<M>
where
    M: Config + Send + Sync,
{
    async fn translate(&self, cleaned_content: &str) -> TranslationOutcome {
        if self.config.api_key.trim().is_empty() {
            return TranslationOutcome::Failed(TranslationFailure::Transport(
                "API key is empty".to_string(),
            ));
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(cleaned_content),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        info!(
            model = %self.config.model,
            content_len = cleaned_content.len(),
            prompt_len = request.messages[0].content.len(),
            "completion request prepared"
        );

        let start = Instant::now();
        let call = self.send(request);
        let response = match tokio::time::timeout(self.config.timeout(), call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis(),
                    "completion request failed"
                );
                return TranslationOutcome::Failed(TranslationFailure::Transport(e.to_string()));
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.timeout_secs,
                    "completion request timed out"
                );
                return TranslationOutcome::Failed(TranslationFailure::Transport(format!(
                    "request timed out after {}s",
                    self.config.timeout_secs
                )));
            }
        };

        info!(
            elapsed_ms = start.elapsed().as_millis(),
            "completion response received"
        );

        match extract_content(&response) {
            Ok(text) => {
                debug!(translated_len = text.len(), "completion content extracted");
                TranslationOutcome::Translated(text)
            }
            Err(failure) => {
                error!(error = %failure, "completion response has unexpected shape");
                TranslationOutcome::Failed(failure)
            }
        }
    }
}

/// Gives up on the first transient error (5xx, 429) instead of retrying.
fn single_attempt() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// Reads `choices[0].message.content` and trims it.
pub fn extract_content(response: &Value) -> Result<String, TranslationFailure> {
    let choices = response
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationFailure::Shape("missing field 'choices'".to_string()))?;
    let first = choices
        .first()
        .ok_or_else(|| TranslationFailure::Shape("'choices' is empty".to_string()))?;
    let content = first
        .pointer("/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            TranslationFailure::Shape("missing field 'choices[0].message.content'".to_string())
        })?;

    Ok(content.trim().to_string())
}
