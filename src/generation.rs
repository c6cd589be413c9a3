//! Summarization backend boundary.
//!
//! The pipeline does not generate text itself; it owns the prompt contract
//! and hands the assembled context to an external backend through the
//! [`Summarizer`] trait. Implementations:
//!
//! - **[`DisabledSummarizer`]** — reports itself unconfigured; the query
//!   service degrades to a fixed placeholder without calling it.
//! - **[`OpenAISummarizer`]** — `POST /v1/chat/completions`.
//! - **[`OllamaSummarizer`]** — `POST /api/generate` on a local Ollama.
//!
//! The prompt template carries two required slots, `{context}` and
//! `{question}`, plus `{max_words}` for the length bound. The wording is
//! configurable (`generation.prompt_template`); the slot interface and
//! the ground-only-in-context constraint are not.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::http::post_json_with_retry;

/// Default prompt. Concise, grounded in the supplied context only, no
/// preamble — the output constraints the pipeline relies on.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are a concise assistant for urban greening questions.
Answer the question using only the context below. If the context does not \
contain the answer, say so. Do not add a preamble. Keep the answer under \
{max_words} words.

Context:
{context}

Question: {question}

Answer:";

/// Fill the template slots. Unknown slots are left untouched.
pub fn render_prompt(template: &str, context: &str, question: &str, max_words: usize) -> String {
    template
        .replace("{max_words}", &max_words.to_string())
        .replace("{context}", context)
        .replace("{question}", question)
}

/// An external text-generation backend.
///
/// `summarize` is fallible: the caller converts failures into an inline
/// textual placeholder rather than letting them propagate.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &str;

    /// Whether a generation backend is actually configured. The query
    /// service short-circuits to degraded mode when this is false.
    fn is_configured(&self) -> bool {
        true
    }

    /// Produce a short synthesis of `context` answering `question`.
    async fn summarize(&self, context: &str, question: &str) -> Result<String>;
}

/// Create the appropriate [`Summarizer`] based on configuration.
pub fn create_summarizer(config: &GenerationConfig) -> Result<Arc<dyn Summarizer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledSummarizer)),
        "openai" => Ok(Arc::new(OpenAISummarizer::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaSummarizer::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ Disabled ============

/// Placeholder backend used when no generation provider is configured.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn summarize(&self, _context: &str, _question: &str) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

// ============ OpenAI ============

/// Summarizer backed by the OpenAI chat completions API. Requires the
/// `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAISummarizer {
    model: String,
    template: String,
    max_words: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAISummarizer {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            template: config
                .prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
            max_words: config.max_words,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Summarizer for OpenAISummarizer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, context: &str, question: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let prompt = render_prompt(&self.template, context, question, self.max_words);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let json = post_json_with_retry(
            &client,
            "https://api.openai.com/v1/chat/completions",
            Some(&api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

        Ok(text.trim().to_string())
    }
}

// ============ Ollama ============

/// Summarizer backed by a local Ollama instance (`POST /api/generate`,
/// non-streaming).
pub struct OllamaSummarizer {
    model: String,
    url: String,
    template: String,
    max_words: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OllamaSummarizer {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;

        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            template: config
                .prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
            max_words: config.max_words,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, context: &str, question: &str) -> Result<String> {
        let prompt = render_prompt(&self.template, context, question, self.max_words);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let json = post_json_with_retry(
            &client,
            &format!("{}/api/generate", self.url),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;

        let text = json
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))?;

        Ok(text.trim().to_string())
    }
}
