//! TOML configuration parsing and validation.
//!
//! The whole configuration is loaded once at startup and shared as an
//! immutable `Arc<Config>` for the life of the process.
//!
//! ```toml
//! [db]
//! path = "./data/sfg.sqlite"
//!
//! [embedding]
//! provider = "hashed"
//! dims = 384
//!
//! [chunking]
//! max_chars = 2000
//!
//! [retrieval]
//! top_k = 3
//! similarity_threshold = 0.5
//!
//! [scoring]
//! no_precedent_penalty = 20
//!
//! [reasoning]
//! timeout_ms = 60000
//!
//! [reasoning.provider_a]
//! kind = "chat"
//! model = "llama-3.3-70b-versatile"
//!
//! [reasoning.provider_b]
//! kind = "gemini"
//! model = "gemini-1.5-flash"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use scopeforge_core::scoring::ScoringParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_similarity_threshold() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_high")]
    pub high_deduction: u32,
    #[serde(default = "default_medium")]
    pub medium_deduction: u32,
    #[serde(default = "default_low")]
    pub low_deduction: u32,
    #[serde(default = "default_no_precedent_penalty")]
    pub no_precedent_penalty: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            high_deduction: default_high(),
            medium_deduction: default_medium(),
            low_deduction: default_low(),
            no_precedent_penalty: default_no_precedent_penalty(),
        }
    }
}

fn default_high() -> u32 {
    15
}
fn default_medium() -> u32 {
    8
}
fn default_low() -> u32 {
    3
}
fn default_no_precedent_penalty() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: Some(DEFAULT_DIMS),
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

/// Dimension used by the hashed and local providers when `dims` is omitted.
pub const DEFAULT_DIMS: usize = 384;

fn default_provider() -> String {
    "hashed".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReasoningConfig {
    #[serde(default = "default_reasoning_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub provider_a: Option<ProviderConfig>,
    #[serde(default)]
    pub provider_b: Option<ProviderConfig>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_reasoning_timeout_ms(),
            provider_a: None,
            provider_b: None,
        }
    }
}

fn default_reasoning_timeout_ms() -> u64 {
    60_000
}

/// One reasoning backend slot.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// `"chat"` (OpenAI-compatible chat completions) or `"gemini"`.
    pub kind: String,
    /// Label recorded in assessments; defaults to the kind's usual vendor.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    /// `name`, or the kind's usual vendor: `groq` for chat, `gemini` for gemini.
    pub fn display_name(&self) -> &str {
        match (&self.name, self.kind.as_str()) {
            (Some(name), _) => name.as_str(),
            (None, "gemini") => "gemini",
            (None, _) => "groq",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.md".to_string()]
}

impl Config {
    /// Index dimension D. Zero only when embeddings are disabled.
    pub fn dims(&self) -> usize {
        if !self.embedding.is_enabled() {
            return 0;
        }
        self.embedding.dims.unwrap_or(DEFAULT_DIMS)
    }

    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            high_deduction: self.scoring.high_deduction,
            medium_deduction: self.scoring.medium_deduction,
            low_deduction: self.scoring.low_deduction,
            no_precedent_penalty: self.scoring.no_precedent_penalty,
            similarity_threshold: self.retrieval.similarity_threshold,
        }
    }

    /// Minimal in-memory-friendly configuration, used by tests and embedders.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            scoring: ScoringConfig::default(),
            reasoning: ReasoningConfig::default(),
            server: ServerConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        bail!("retrieval.similarity_threshold must be in [0.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hashed" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hashed, openai, ollama, or local.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        let remote = matches!(config.embedding.provider.as_str(), "openai" | "ollama");
        if config.embedding.dims == Some(0) || (remote && config.embedding.dims.is_none()) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if remote && config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.reasoning.timeout_ms == 0 {
        bail!("reasoning.timeout_ms must be > 0");
    }

    for (slot, provider) in [
        ("provider_a", &config.reasoning.provider_a),
        ("provider_b", &config.reasoning.provider_b),
    ] {
        if let Some(p) = provider {
            match p.kind.as_str() {
                "chat" | "gemini" => {}
                other => bail!(
                    "reasoning.{}.kind: unknown kind '{}'. Must be chat or gemini.",
                    slot,
                    other
                ),
            }
        }
    }

    if let (Some(a), Some(b)) = (&config.reasoning.provider_a, &config.reasoning.provider_b) {
        // Assessments attribute drafts by name, so the two slots must differ.
        if a.display_name() == b.display_name() {
            bail!(
                "reasoning.provider_a and reasoning.provider_b are both named '{}'; \
                 set a distinct `name` on one of them",
                a.display_name()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/sfg.sqlite"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let c = parse_config(MINIMAL).unwrap();
        assert_eq!(c.embedding.provider, "hashed");
        assert_eq!(c.dims(), 384);
        assert_eq!(c.retrieval.top_k, 3);
        assert_eq!(c.chunking.max_chars, 2000);
        let p = c.scoring_params();
        assert_eq!(p.high_deduction, 15);
        assert_eq!(p.medium_deduction, 8);
        assert_eq!(p.low_deduction, 3);
        assert!((p.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert!(c.reasoning.provider_a.is_none());
    }

    #[test]
    fn provider_slots_parse() {
        let c = parse_config(
            r#"
[db]
path = "x.sqlite"

[reasoning]
timeout_ms = 500

[reasoning.provider_a]
kind = "chat"
model = "llama-3.3-70b-versatile"
api_key_env = "GROQ_API_KEY"

[reasoning.provider_b]
kind = "gemini"
"#,
        )
        .unwrap();
        assert_eq!(c.reasoning.timeout_ms, 500);
        assert_eq!(c.reasoning.provider_a.unwrap().kind, "chat");
        assert_eq!(c.reasoning.provider_b.unwrap().kind, "gemini");
    }

    #[test]
    fn rejects_invalid_values() {
        let bad = [
            "[db]\npath='x'\n[chunking]\nmax_chars = 0\n",
            "[db]\npath='x'\n[retrieval]\ntop_k = 0\n",
            "[db]\npath='x'\n[retrieval]\nsimilarity_threshold = 1.5\n",
            "[db]\npath='x'\n[embedding]\nprovider = 'word2vec'\n",
            "[db]\npath='x'\n[embedding]\nprovider = 'openai'\ndims = 1536\n",
            "[db]\npath='x'\n[reasoning.provider_a]\nkind = 'carrier-pigeon'\n",
        ];
        for text in bad {
            assert!(parse_config(text).is_err(), "accepted: {}", text);
        }
    }

    #[test]
    fn slots_of_one_kind_need_distinct_names() {
        let same = "[db]\npath='x'\n\
                    [reasoning.provider_a]\nkind = 'chat'\n\
                    [reasoning.provider_b]\nkind = 'chat'\n";
        let err = parse_config(same).unwrap_err();
        assert!(format!("{:#}", err).contains("both named 'groq'"), "{:#}", err);

        let explicit_clash = "[db]\npath='x'\n\
                              [reasoning.provider_a]\nkind = 'chat'\nname = 'gemini'\n\
                              [reasoning.provider_b]\nkind = 'gemini'\n";
        assert!(parse_config(explicit_clash).is_err());

        let named = "[db]\npath='x'\n\
                     [reasoning.provider_a]\nkind = 'chat'\n\
                     [reasoning.provider_b]\nkind = 'chat'\nname = 'openrouter'\n";
        let c = parse_config(named).unwrap();
        assert_eq!(c.reasoning.provider_a.unwrap().display_name(), "groq");
        assert_eq!(c.reasoning.provider_b.unwrap().display_name(), "openrouter");
    }
}
