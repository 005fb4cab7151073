//! LLM provider abstraction for code generation.
//!
//! Supports OpenAI-compatible chat completions (GPT-4o-mini, GPT-3.5-turbo),
//! Google Gemini, and Anthropic Messages. Uses blocking HTTP via `ureq`, the
//! retry loop is strictly sequential and has no async runtime.

use pyforge_core::TokenUsage;
use pyforge_core::config::LlmConfig;
use serde_json::Value;
use std::time::Duration;

/// Errors from LLM provider calls. Every variant is fatal for a generation run.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} API key not provided (set {env_var})")]
    MissingCredential {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("unknown provider: '{0}'")]
    UnknownProvider(String),
    #[error("unsupported model '{0}': pass --provider explicitly")]
    UnsupportedModel(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("malformed response from LLM: no reply content")]
    EmptyResponse,
}

/// A completed LLM response.
pub struct LlmResponse {
    /// The text content of the response.
    pub text: String,
    /// Input tokens used (from API response, if reported).
    pub input_tokens: Option<u64>,
    /// Output tokens used (from API response, if reported).
    pub output_tokens: Option<u64>,
}

impl LlmResponse {
    /// Plain text response without usage data.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_tokens: None,
            output_tokens: None,
        }
    }

    /// Usage if the provider reported at least one counter.
    pub fn usage(&self) -> Option<TokenUsage> {
        if self.input_tokens.is_none() && self.output_tokens.is_none() {
            return None;
        }
        Some(TokenUsage {
            input_tokens: self.input_tokens.unwrap_or(0),
            output_tokens: self.output_tokens.unwrap_or(0),
        })
    }
}

/// Abstraction over LLM API providers.
pub trait LlmProvider: Send + Sync {
    /// Send a completion request with system and user messages.
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError>;

    /// The model name (for display/logging).
    fn model_name(&self) -> &str;

    /// Cost per million input tokens (USD).
    fn cost_per_mtok_input(&self) -> f64;

    /// Cost per million output tokens (USD).
    fn cost_per_mtok_output(&self) -> f64;
}

/// Sampling settings shared by every provider.
#[derive(Debug, Clone, Copy)]
struct Sampling {
    temperature: f32,
    max_tokens: u32,
}

fn build_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::Agent::new_with_config(
        ureq::config::Config::builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs)))
            .http_status_as_error(false)
            .build(),
    )
}

/// POST a JSON body and return the decoded JSON, mapping API error payloads.
fn post_json(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
) -> Result<Value, ProviderError> {
    let mut request = agent.post(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let mut response = request
        .send_json(body)
        .map_err(|e| ProviderError::Http(e.to_string()))?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ProviderError::Http(e.to_string()))?;

    let json: Value = match serde_json::from_str(&text) {
        Ok(json) => json,
        Err(_) if !(200..300).contains(&status) => {
            return Err(ProviderError::Api {
                status,
                message: text.chars().take(300).collect(),
            });
        }
        Err(e) => return Err(ProviderError::Parse(e.to_string())),
    };

    // Check for API error
    if let Some(err) = json.get("error") {
        return Err(ProviderError::Api {
            status,
            message: err
                .get("message")
                .and_then(|m| m.as_str())
                .map_or_else(|| err.to_string(), String::from),
        });
    }
    if !(200..300).contains(&status) {
        return Err(ProviderError::Api {
            status,
            message: "unexpected non-success response".to_string(),
        });
    }

    Ok(json)
}

fn usage_field(json: &Value, section: &str, field: &str) -> Option<u64> {
    json.get(section)
        .and_then(|u| u.get(field))
        .and_then(|t| t.as_u64())
}

// A well-formed reply with no text (null content, a candidate stopped for
// safety or max tokens) yields an empty string so the caller can treat it as
// a reply without code. Only a body missing the reply structure altogether
// is an `EmptyResponse` error.

/// Text of the first choice of a chat completion.
fn openai_text(json: &Value) -> Result<String, ProviderError> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .ok_or(ProviderError::EmptyResponse)?;
    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

/// Concatenated text parts of the first Gemini candidate.
fn gemini_text(json: &Value) -> Result<String, ProviderError> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .ok_or(ProviderError::EmptyResponse)?;
    Ok(candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default())
}

/// First text block of an Anthropic message.
fn anthropic_text(json: &Value) -> Result<String, ProviderError> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or(ProviderError::EmptyResponse)?;
    Ok(blocks
        .iter()
        .find_map(|block| block.get("text").and_then(|t| t.as_str()))
        .unwrap_or_default()
        .to_string())
}

// ---------------------------------------------------------------------------
// OpenAI Chat Completions API
// ---------------------------------------------------------------------------

/// OpenAI-compatible provider (works with OpenAI, Azure, local proxies).
#[cfg(feature = "openai")]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    sampling: Sampling,
    agent: ureq::Agent,
}

#[cfg(feature = "openai")]
impl OpenAiProvider {
    /// Default model: GPT-4o-mini, fast and cheap.
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const ENV_VAR: &str = "OPENAI_API_KEY";
    const DEFAULT_BASE_URL: &str = "https://api.openai.com";

    pub fn new(api_key: String, config: &LlmConfig) -> Self {
        Self {
            api_key,
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            sampling: Sampling {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            agent: build_agent(config.timeout_secs),
        }
    }
}

#[cfg(feature = "openai")]
impl LlmProvider for OpenAiProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });

        let auth = format!("Bearer {}", self.api_key);
        let json = post_json(
            &self.agent,
            &url,
            &[
                ("Authorization", auth.as_str()),
                ("content-type", "application/json"),
            ],
            &body,
        )?;

        Ok(LlmResponse {
            text: openai_text(&json)?,
            input_tokens: usage_field(&json, "usage", "prompt_tokens"),
            output_tokens: usage_field(&json, "usage", "completion_tokens"),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_mtok_input(&self) -> f64 {
        if self.model.contains("4o-mini") {
            0.15
        } else if self.model.contains("3.5") {
            0.50
        } else if self.model.contains("4o") {
            2.50
        } else {
            0.50
        }
    }

    fn cost_per_mtok_output(&self) -> f64 {
        if self.model.contains("4o-mini") {
            0.60
        } else if self.model.contains("3.5") {
            1.50
        } else if self.model.contains("4o") {
            10.00
        } else {
            1.50
        }
    }
}

// ---------------------------------------------------------------------------
// Google Gemini generateContent API
// ---------------------------------------------------------------------------

/// Google Gemini provider.
#[cfg(feature = "gemini")]
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    sampling: Sampling,
    agent: ureq::Agent,
}

#[cfg(feature = "gemini")]
impl GeminiProvider {
    pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
    pub const ENV_VAR: &str = "GOOGLE_API_KEY";
    const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

    pub fn new(api_key: String, config: &LlmConfig) -> Self {
        Self {
            api_key,
            model: config
                .model
                .trim_start_matches("models/")
                .to_string(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            sampling: Sampling {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            agent: build_agent(config.timeout_secs),
        }
    }
}

#[cfg(feature = "gemini")]
impl LlmProvider for GeminiProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let body = serde_json::json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": [
                {"role": "user", "parts": [{"text": user}]}
            ],
            "generationConfig": {
                "temperature": self.sampling.temperature,
                "maxOutputTokens": self.sampling.max_tokens
            }
        });

        let json = post_json(
            &self.agent,
            &url,
            &[
                ("x-goog-api-key", self.api_key.as_str()),
                ("content-type", "application/json"),
            ],
            &body,
        )?;

        Ok(LlmResponse {
            text: gemini_text(&json)?,
            input_tokens: usage_field(&json, "usageMetadata", "promptTokenCount"),
            output_tokens: usage_field(&json, "usageMetadata", "candidatesTokenCount"),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_mtok_input(&self) -> f64 {
        if self.model.contains("1.5-flash") {
            0.075
        } else {
            0.10
        }
    }

    fn cost_per_mtok_output(&self) -> f64 {
        if self.model.contains("1.5-flash") {
            0.30
        } else {
            0.40
        }
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages API
// ---------------------------------------------------------------------------

/// Anthropic provider using the Messages API.
#[cfg(feature = "anthropic")]
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    sampling: Sampling,
    agent: ureq::Agent,
}

#[cfg(feature = "anthropic")]
impl AnthropicProvider {
    /// Default model for Claude, fast and cheap.
    pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
    pub const ENV_VAR: &str = "ANTHROPIC_API_KEY";
    const API_URL: &str = "https://api.anthropic.com/v1/messages";

    pub fn new(api_key: String, config: &LlmConfig) -> Self {
        Self {
            api_key,
            model: config.model.clone(),
            sampling: Sampling {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            agent: build_agent(config.timeout_secs),
        }
    }
}

#[cfg(feature = "anthropic")]
impl LlmProvider for AnthropicProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "system": system,
            "messages": [
                {"role": "user", "content": user}
            ]
        });

        let json = post_json(
            &self.agent,
            Self::API_URL,
            &[
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", "2023-06-01"),
                ("content-type", "application/json"),
            ],
            &body,
        )?;

        Ok(LlmResponse {
            text: anthropic_text(&json)?,
            input_tokens: usage_field(&json, "usage", "input_tokens"),
            output_tokens: usage_field(&json, "usage", "output_tokens"),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_mtok_input(&self) -> f64 {
        if self.model.contains("haiku") {
            0.80
        } else if self.model.contains("sonnet") {
            3.00
        } else {
            1.00 // conservative default
        }
    }

    fn cost_per_mtok_output(&self) -> f64 {
        if self.model.contains("haiku") {
            4.00
        } else if self.model.contains("sonnet") {
            15.00
        } else {
            5.00
        }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Pick a provider name: the configured one, else inferred from the model name.
pub fn resolve_provider_name(config: &LlmConfig) -> Result<String, ProviderError> {
    if let Some(name) = config.provider.as_deref() {
        let name = name.trim().to_lowercase();
        if !available_providers().contains(&name.as_str()) {
            return Err(ProviderError::UnknownProvider(name));
        }
        return Ok(name);
    }

    let model = config.model.trim_start_matches("models/");
    let inferred = if model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3")
    {
        "openai"
    } else if model.starts_with("gemini-") {
        "gemini"
    } else if model.starts_with("claude-") {
        "anthropic"
    } else {
        return Err(ProviderError::UnsupportedModel(config.model.clone()));
    };
    if !available_providers().contains(&inferred) {
        return Err(ProviderError::UnknownProvider(inferred.to_string()));
    }
    Ok(inferred.to_string())
}

/// Environment variable holding the API key for a provider.
pub fn api_key_env_var(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("OPENAI_API_KEY"),
        "gemini" => Some("GOOGLE_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        _ => None,
    }
}

/// Create a provider from config, reading the API key from the environment.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let name = resolve_provider_name(config)?;
    let env_var =
        api_key_env_var(&name).ok_or_else(|| ProviderError::UnknownProvider(name.clone()))?;
    let api_key = std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(ProviderError::MissingCredential {
            provider: display_name(&name),
            env_var,
        })?;
    create_provider_with_key(&name, api_key, config)
}

/// Create a named provider with an explicit API key.
pub fn create_provider_with_key(
    provider_name: &str,
    api_key: String,
    config: &LlmConfig,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    tracing::debug!(provider = provider_name, model = %config.model, "creating LLM provider");
    match provider_name {
        #[cfg(feature = "openai")]
        "openai" => Ok(Box::new(OpenAiProvider::new(api_key, config))),
        #[cfg(feature = "gemini")]
        "gemini" => Ok(Box::new(GeminiProvider::new(api_key, config))),
        #[cfg(feature = "anthropic")]
        "anthropic" => Ok(Box::new(AnthropicProvider::new(api_key, config))),
        other => Err(ProviderError::UnknownProvider(format!(
            "{}. Available: {}",
            other,
            available_providers().join(", ")
        ))),
    }
}

fn display_name(provider_name: &str) -> &'static str {
    match provider_name {
        "openai" => "OpenAI",
        "gemini" => "Google",
        "anthropic" => "Anthropic",
        _ => "LLM",
    }
}

/// List compiled-in provider names.
pub fn available_providers() -> Vec<&'static str> {
    vec![
        #[cfg(feature = "openai")]
        "openai",
        #[cfg(feature = "gemini")]
        "gemini",
        #[cfg(feature = "anthropic")]
        "anthropic",
    ]
}
