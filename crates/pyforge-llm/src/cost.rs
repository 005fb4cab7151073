//! Cost estimation for generation runs.

use crate::provider::LlmProvider;
use pyforge_core::TokenUsage;

/// Worst-case cost estimate for a run, computed before any model call.
#[derive(Debug, Clone)]
pub struct CostEstimate {
    /// Model calls if every attempt is used.
    pub max_calls: usize,
    /// Estimated input tokens across all calls.
    pub estimated_input_tokens: u64,
    /// Output token ceiling across all calls.
    pub estimated_output_tokens: u64,
    /// Estimated total cost in USD.
    pub estimated_cost_usd: f64,
    /// Model name.
    pub model: String,
}

impl std::fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cost Estimate (worst case):")?;
        writeln!(f, "  Model calls: up to {}", self.max_calls)?;
        writeln!(
            f,
            "  Estimated tokens: ~{} input, <={} output",
            self.estimated_input_tokens, self.estimated_output_tokens
        )?;
        writeln!(f, "  Model: {}", self.model)?;
        write!(f, "  Estimated cost: ${:.4}", self.estimated_cost_usd)
    }
}

/// Running cost tracker across attempts.
#[derive(Debug, Default)]
pub struct CostTracker {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    input_rate: f64,
    output_rate: f64,
}

impl CostTracker {
    pub fn new(provider: &dyn LlmProvider) -> Self {
        Self {
            total_input_tokens: 0,
            total_output_tokens: 0,
            input_rate: provider.cost_per_mtok_input(),
            output_rate: provider.cost_per_mtok_output(),
        }
    }

    /// Record token usage from a response.
    pub fn record(&mut self, input_tokens: Option<u64>, output_tokens: Option<u64>) {
        if let Some(t) = input_tokens {
            self.total_input_tokens += t;
        }
        if let Some(t) = output_tokens {
            self.total_output_tokens += t;
        }
    }

    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.record(Some(usage.input_tokens), Some(usage.output_tokens));
    }

    /// Current total cost in USD.
    pub fn total_cost_usd(&self) -> f64 {
        (self.total_input_tokens as f64 / 1_000_000.0) * self.input_rate
            + (self.total_output_tokens as f64 / 1_000_000.0) * self.output_rate
    }
}

/// Rough token count using the 4-chars-per-token heuristic.
pub fn approx_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Estimate the worst-case cost of a run without making API calls.
///
/// Retry prompts repeat the query and file context and add the failed code,
/// so each retry is charged the initial prompt plus a full completion.
pub fn estimate_cost(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    initial_prompt: &str,
    max_attempts: usize,
    max_tokens: u32,
) -> CostEstimate {
    let attempts = max_attempts as u64;
    let base_input = approx_tokens(system_prompt) + approx_tokens(initial_prompt);
    let retries = attempts.saturating_sub(1);

    let total_input = base_input * attempts + u64::from(max_tokens) * retries;
    let total_output = u64::from(max_tokens) * attempts;

    let cost = (total_input as f64 / 1_000_000.0) * provider.cost_per_mtok_input()
        + (total_output as f64 / 1_000_000.0) * provider.cost_per_mtok_output();

    CostEstimate {
        max_calls: max_attempts,
        estimated_input_tokens: total_input,
        estimated_output_tokens: total_output,
        estimated_cost_usd: cost,
        model: provider.model_name().to_string(),
    }
}
