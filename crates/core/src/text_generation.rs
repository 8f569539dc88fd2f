//! Text-generation seam.
//!
//! The pipeline only ever asks for "render this template with these
//! variables". Model choice, endpoint and retry policy live behind the
//! `TextGenerator` trait so the orchestrator carries no ambient model state.

use crate::prompts::PromptTemplates;
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Variables substituted into a template, keyed by placeholder name.
pub type TemplateVars = HashMap<String, String>;

/// The prompts the pipeline issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    CourseDescription,
    ModuleBody,
    ModuleBodyNoCode,
    ModuleCodeExamples,
}

impl TemplateId {
    pub const ALL: [TemplateId; 4] = [
        TemplateId::CourseDescription,
        TemplateId::ModuleBody,
        TemplateId::ModuleBodyNoCode,
        TemplateId::ModuleCodeExamples,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::CourseDescription => "course_description",
            TemplateId::ModuleBody => "module_body",
            TemplateId::ModuleBodyNoCode => "module_body_no_code",
            TemplateId::ModuleCodeExamples => "module_code_examples",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed `render` call.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Worth retrying: network trouble, timeouts, rate limits, server errors.
    #[error("transient generation failure: {0}")]
    Transient(String),
    /// Retrying the same call will not help.
    #[error("permanent generation failure: {0}")]
    Permanent(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

impl From<OpenAIError> for GenerationError {
    fn from(err: OpenAIError) -> Self {
        match &err {
            OpenAIError::Reqwest(_) | OpenAIError::StreamError(_) => {
                GenerationError::Transient(err.to_string())
            }
            OpenAIError::ApiError(api) => {
                let kind = api
                    .code
                    .as_deref()
                    .or(api.r#type.as_deref())
                    .unwrap_or_default();
                if kind.contains("rate_limit") || kind.contains("server_error") || kind.contains("overloaded") {
                    GenerationError::Transient(err.to_string())
                } else {
                    GenerationError::Permanent(err.to_string())
                }
            }
            _ => GenerationError::Permanent(err.to_string()),
        }
    }
}

/// Anything that can turn a template and its variables into text.
///
/// Implementations must make repeated identical calls safe: callers may
/// re-issue a call after a transient failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn render(&self, template: TemplateId, vars: TemplateVars)
    -> Result<String, GenerationError>;
}

const SYSTEM_PROMPT: &str =
    "You are an expert instructional designer who writes clear, accurate course material in markdown.";

/// A `TextGenerator` backed by any OpenAI-compatible chat completion API.
pub struct OpenAICompatibleGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    timeout: Duration,
    prompts: PromptTemplates,
}

impl OpenAICompatibleGenerator {
    /// Creates a generator for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL.
    /// * `model` - Chat model identifier (e.g., "gpt-4").
    /// * `prompts` - Templates for every `TemplateId`.
    pub fn new(config: OpenAIConfig, model: String, prompts: PromptTemplates) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
            prompts,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Upper bound on a single completion request, after which the call is
    /// reported as a transient failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn complete(&self, prompt: String) -> Result<String, GenerationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GenerationError::Permanent("LLM response had no content".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAICompatibleGenerator {
    async fn render(
        &self,
        template: TemplateId,
        vars: TemplateVars,
    ) -> Result<String, GenerationError> {
        let prompt = self.prompts.render(template, &vars)?;
        debug!(%template, model = %self.model, "Requesting completion");
        match tokio::time::timeout(self.timeout, self.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Transient(format!(
                "request timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

/// Wraps a generator and retries transient failures with exponential backoff.
///
/// Permanent failures are returned immediately. The last transient failure is
/// returned once `max_attempts` calls have been made.
pub struct RetryingGenerator<G> {
    inner: G,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn render(
        &self,
        template: TemplateId,
        vars: TemplateVars,
    ) -> Result<String, GenerationError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.inner.render(template, vars.clone()).await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        %template,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient generation failure, will retry"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
