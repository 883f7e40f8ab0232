//! Lightweight configuration loader and typed settings sections.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env
//! vars (the environment is selected by `RUST_ENV`). Sections deserialize
//! into serde structs; out-of-range retrieval values are clamped at
//! construction with a logged warning, values with no sensible clamp are
//! rejected.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LecternError;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract a section, falling back to its defaults when the key is
    /// absent. A present-but-malformed section is still an error.
    pub fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_ok() {
            self.get(key)
        } else {
            Ok(T::default())
        }
    }

    pub fn data(&self) -> anyhow::Result<DataSettings> {
        self.section("data")
    }

    pub fn retrieval(&self) -> anyhow::Result<RetrievalSettings> {
        self.section("retrieval")
    }

    pub fn embedding(&self) -> anyhow::Result<EmbeddingSettings> {
        self.section("embedding")
    }

    pub fn generation(&self) -> anyhow::Result<GenerationSettings> {
        self.section("generation")
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after
/// expansion. If `p` is absolute, it's returned as-is.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub data_dir: String,
    pub store_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            store_dir: "./lectern_db".to_string(),
            table: "segments".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub score_threshold: f32,
    pub use_mmr: bool,
    pub mmr_diversity: f32,
    pub use_lexical_fusion: bool,
    pub provider_timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            score_threshold: 0.3,
            use_mmr: true,
            mmr_diversity: 0.3,
            use_lexical_fusion: false,
            provider_timeout_secs: 30,
        }
    }
}

impl RetrievalSettings {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }

    /// Clamp out-of-range values with a warning; reject values that have no
    /// sensible clamp.
    pub fn validated(mut self) -> Result<Self, LecternError> {
        if self.top_k == 0 {
            return Err(LecternError::InvalidConfig(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if self.top_k > 50 {
            tracing::warn!(top_k = self.top_k, "retrieval.top_k above 50, clamping");
            self.top_k = 50;
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            tracing::warn!(
                score_threshold = self.score_threshold,
                "retrieval.score_threshold outside [0, 1], clamping"
            );
            self.score_threshold = self.score_threshold.clamp(0.0, 1.0);
        }
        if !(0.0..=1.0).contains(&self.mmr_diversity) {
            tracing::warn!(
                mmr_diversity = self.mmr_diversity,
                "retrieval.mmr_diversity outside [0, 1], clamping"
            );
            self.mmr_diversity = self.mmr_diversity.clamp(0.0, 1.0);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dim: usize,
    pub use_hash: bool,
    pub max_len: usize,
    pub model_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { dim: 1024, use_hash: false, max_len: 256, model_dir: None }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub backend: GenerationBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            api_key: None,
            temperature: 0.2,
            max_tokens: 800,
            timeout_secs: 60,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
