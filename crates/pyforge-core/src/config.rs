//! Configuration for generation, model access, and checkers.
//!
//! Load order: `.pyforge/config.toml` → environment variables → defaults.

use crate::issue::CheckerKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level pyforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub generation: GenerationConfig,
    pub llm: LlmConfig,
    pub checkers: CheckersConfig,
}

/// Retry loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Upper bound on model calls per run.
    pub max_attempts: usize,
    /// Maximum number of attached context files.
    pub max_files: usize,
}

/// Model provider configuration. API keys are read from the environment only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: openai, anthropic, gemini. Inferred from `model` when unset.
    pub provider: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Override for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

/// Checker selection and tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckersConfig {
    /// Checkers to run, in order: style, security, type, dynamic.
    pub enabled: Vec<String>,
    /// Run checkers of one aggregation on the rayon pool.
    pub parallel: bool,
    pub pylint: String,
    pub bandit: String,
    pub mypy: String,
    pub python: String,
    /// Timeout for each static analysis tool invocation.
    pub tool_timeout_secs: u64,
    /// Timeout for executing the generated script.
    pub dynamic_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_files: 4,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 2000,
            base_url: None,
            timeout_secs: 120,
        }
    }
}

impl Default for CheckersConfig {
    fn default() -> Self {
        Self {
            enabled: ["style", "security", "type", "dynamic"]
                .into_iter()
                .map(String::from)
                .collect(),
            parallel: true,
            pylint: "pylint".to_string(),
            bandit: "bandit".to_string(),
            mypy: "mypy".to_string(),
            python: "python3".to_string(),
            tool_timeout_secs: 60,
            dynamic_timeout_secs: 10,
        }
    }
}

impl CheckersConfig {
    /// Resolve `enabled` into checker kinds, preserving order and dropping duplicates.
    pub fn enabled_kinds(&self) -> Result<Vec<CheckerKind>> {
        let mut kinds = Vec::with_capacity(self.enabled.len());
        for name in &self.enabled {
            let Some(kind) = CheckerKind::parse(name) else {
                anyhow::bail!(
                    "unknown checker '{}' (expected one of: style, security, type, dynamic)",
                    name
                );
            };
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl ForgeConfig {
    /// Load config from `.pyforge/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".pyforge").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override(
            "PYFORGE_MAX_ATTEMPTS",
            &mut config.generation.max_attempts,
        );
        env_override("PYFORGE_MAX_FILES", &mut config.generation.max_files);
        env_override("PYFORGE_MODEL", &mut config.llm.model);
        env_override("PYFORGE_TEMPERATURE", &mut config.llm.temperature);
        env_override("PYFORGE_MAX_TOKENS", &mut config.llm.max_tokens);
        env_override("PYFORGE_PARALLEL_CHECKERS", &mut config.checkers.parallel);
        if let Ok(provider) = std::env::var("PYFORGE_PROVIDER")
            && !provider.trim().is_empty()
        {
            config.llm.provider = Some(provider.trim().to_lowercase());
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the retry loop cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_attempts == 0 {
            anyhow::bail!("generation.max_attempts must be at least 1");
        }
        if self.generation.max_files == 0 {
            anyhow::bail!("generation.max_files must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!(
                "llm.temperature ({}) must be between 0.0 and 2.0",
                self.llm.temperature
            );
        }
        self.checkers.enabled_kinds()?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
