//! LLM access for pyforge code generation.
//!
//! A thin, blocking client layer over hosted chat models (OpenAI GPT-4o-mini and
//! GPT-3.5-turbo, Google Gemini, Anthropic). The retry controller only ever sees
//! the [`LlmProvider`] trait.
//!
//! # Architecture
//!
//! - **provider**: `LlmProvider` trait with OpenAI, Gemini and Anthropic implementations
//! - **cost**: Worst-case cost estimation and runtime tracking

pub mod cost;
pub mod provider;

pub use cost::{CostEstimate, CostTracker, estimate_cost};
pub use provider::{
    LlmProvider, LlmResponse, ProviderError, available_providers, create_provider,
    resolve_provider_name,
};
