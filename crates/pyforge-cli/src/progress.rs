//! Terminal progress display for generation runs.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pyforge_core::{Attempt, AttemptOutcome};
use pyforge_engine::RunObserver;
use pyforge_llm::{CostTracker, LlmProvider};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Attempt spinner plus a running cost line.
pub struct GenerateProgress {
    multi: Arc<MultiProgress>,
    attempt_bar: ProgressBar,
    cost_bar: ProgressBar,
    cost: Mutex<CostTracker>,
}

impl GenerateProgress {
    pub fn new(provider: &dyn LlmProvider) -> Self {
        let multi = Arc::new(MultiProgress::new());

        let attempt_bar = multi.add(ProgressBar::new_spinner());
        attempt_bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {prefix:.bold} {msg}")
                .expect("valid template"),
        );
        attempt_bar.enable_steady_tick(Duration::from_millis(120));

        let cost_bar = multi.add(ProgressBar::new_spinner());
        cost_bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .expect("valid template"),
        );

        Self {
            multi,
            attempt_bar,
            cost_bar,
            cost: Mutex::new(CostTracker::new(provider)),
        }
    }

    /// Update the cost display.
    fn update_cost(&self, tracker: &CostTracker) {
        self.cost_bar.set_message(format!(
            "${:.4} spent ({} in / {} out tokens)",
            tracker.total_cost_usd(),
            tracker.total_input_tokens,
            tracker.total_output_tokens
        ));
        self.cost_bar.tick();
    }

    /// Total spend so far, in USD.
    pub fn spent_usd(&self) -> f64 {
        self.cost
            .lock()
            .map(|t| t.total_cost_usd())
            .unwrap_or_default()
    }

    /// Finish all bars.
    pub fn finish(&self) {
        self.attempt_bar.finish_and_clear();
        self.cost_bar.finish_and_clear();
    }

    /// Suspend progress bars for clean eprintln output, then resume.
    pub fn suspend<F: FnOnce()>(&self, f: F) {
        self.multi.suspend(f);
    }
}

impl RunObserver for GenerateProgress {
    fn attempt_started(&self, index: usize, max_attempts: usize) {
        self.attempt_bar
            .set_prefix(format!("Attempt {}/{}", index, max_attempts));
        self.attempt_bar.set_message("waiting for model...");
    }

    fn attempt_finished(&self, attempt: &Attempt) {
        if let Some(usage) = attempt.usage
            && let Ok(mut tracker) = self.cost.lock()
        {
            tracker.record_usage(usage);
            self.update_cost(&tracker);
        }

        let summary = match attempt.outcome {
            AttemptOutcome::Accepted => "accepted".to_string(),
            AttemptOutcome::Aborted => "model call failed".to_string(),
            AttemptOutcome::Retried | AttemptOutcome::Exhausted if attempt.code.is_none() => {
                "no code in response".to_string()
            }
            AttemptOutcome::Retried | AttemptOutcome::Exhausted => {
                format!("{} issue(s)", attempt.issues.len())
            }
        };
        let line = format!("  Attempt {}: {}", attempt.index, summary);
        self.suspend(|| eprintln!("{}", line));
    }
}
