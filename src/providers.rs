//! HTTP reasoning backends.
//!
//! - [`ChatCompletionsProvider`]: any OpenAI-compatible
//!   `/chat/completions` endpoint. Defaults target Groq
//!   (`llama-3.3-70b-versatile`, key in `GROQ_API_KEY`).
//! - [`GeminiProvider`]: Google `generateContent`. Defaults to
//!   `gemini-1.5-flash`, key in `GOOGLE_API_KEY`.
//!
//! Both render the shared request text from the core `reasoning` module
//! and parse the reply with [`parse_draft`] or, for the framework stage,
//! [`parse_framework`]. Neither retries: a failed call is reported and
//! the orchestrator degrades.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use scopeforge_core::framework::{parse_framework, ContentFramework};
use scopeforge_core::models::{Draft, RetrievalResult};
use scopeforge_core::reasoning::{compose_request, parse_draft, ReasoningProvider};

use crate::config::ProviderConfig;

const SYSTEM_PROMPT: &str = "You are an expert project manager. You turn raw project \
discussion notes into structured scope documentation and content plans, and reply with a \
single JSON object.";

const DEFAULT_TEMPERATURE: f32 = 0.2;

fn api_key(config: &ProviderConfig, default_env: &str) -> Result<String> {
    let var = config.api_key_env.as_deref().unwrap_or(default_env);
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

fn http_client(timeout_ms: u64) -> Result<reqwest::Client> {
    // The orchestrator enforces the real deadline; this only stops leaked sockets.
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms.saturating_mul(2).max(1000)))
        .build()?)
}

async fn post_json(request: reqwest::RequestBuilder, label: &str) -> Result<Value> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{} request failed", label))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", label, status, body);
    }
    Ok(response.json().await?)
}

// ============ Chat Completions ============

pub struct ChatCompletionsProvider {
    name: String,
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub const DEFAULT_URL: &'static str = "https://api.groq.com/openai/v1/chat/completions";
    pub const DEFAULT_MODEL: &'static str = "llama-3.3-70b-versatile";

    pub fn new(config: &ProviderConfig, timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            name: config.display_name().to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_URL.to_string()),
            api_key: api_key(config, "GROQ_API_KEY")?,
            temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            client: http_client(timeout_ms)?,
        })
    }

    async fn complete(&self, request_text: String) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request_text },
            ],
        });
        let request = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = post_json(request, &self.name).await?;
        Ok(chat_response_text(&json)?.to_string())
    }
}

/// Pull `choices[0].message.content` out of a chat completion.
fn chat_response_text(json: &Value) -> Result<&str> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow!("chat completion has no choices[0].message.content"))
}

#[async_trait]
impl ReasoningProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, context: &RetrievalResult) -> Result<Draft> {
        parse_draft(&self.complete(compose_request(prompt, context)).await?)
    }

    async fn frame(&self, prompt: &str, context: &RetrievalResult) -> Result<ContentFramework> {
        parse_framework(&self.complete(compose_request(prompt, context)).await?)
    }
}

// ============ Gemini ============

pub struct GeminiProvider {
    name: String,
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub const DEFAULT_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";
    pub const DEFAULT_MODEL: &'static str = "gemini-1.5-flash";

    pub fn new(config: &ProviderConfig, timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            name: config.display_name().to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_URL.to_string()),
            api_key: api_key(config, "GOOGLE_API_KEY")?,
            temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            client: http_client(timeout_ms)?,
        })
    }

    async fn complete(&self, request_text: String) -> Result<String> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [
                { "role": "user", "parts": [{ "text": request_text }] }
            ],
            "generationConfig": { "temperature": self.temperature },
        });
        let url = format!(
            "{}/models/{}:generateContent",
            self.url.trim_end_matches('/'),
            self.model
        );
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let json = post_json(request, &self.name).await?;
        gemini_response_text(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn gemini_response_text(json: &Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Gemini response has no candidates[0].content.parts"))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text)
}

#[async_trait]
impl ReasoningProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, context: &RetrievalResult) -> Result<Draft> {
        parse_draft(&self.complete(compose_request(prompt, context)).await?)
    }

    async fn frame(&self, prompt: &str, context: &RetrievalResult) -> Result<ContentFramework> {
        parse_framework(&self.complete(compose_request(prompt, context)).await?)
    }
}

/// Build the backend named by `config.kind`.
pub fn create_reasoning_provider(
    config: &ProviderConfig,
    timeout_ms: u64,
) -> Result<Arc<dyn ReasoningProvider>> {
    match config.kind.as_str() {
        "chat" => Ok(Arc::new(ChatCompletionsProvider::new(config, timeout_ms)?)),
        "gemini" => Ok(Arc::new(GeminiProvider::new(config, timeout_ms)?)),
        other => bail!("Unknown reasoning provider kind: {}", other),
    }
}
