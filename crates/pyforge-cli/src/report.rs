//! Human-readable rendering of a finished run.

use pyforge_core::{RunState, RunStatus};
use std::fmt::Write as _;

/// Process exit code for a terminal status.
pub fn exit_code(status: &RunStatus) -> u8 {
    match status {
        RunStatus::Accepted => 0,
        RunStatus::Exhausted => 1,
        RunStatus::Aborted { .. } | RunStatus::Pending => 2,
    }
}

/// Final code (clean or best attempt with outstanding issues) or the abort reason.
pub fn render(state: &RunState) -> String {
    let mut out = String::new();
    let calls = state.model_calls();
    match state.status() {
        RunStatus::Accepted => {
            let _ = writeln!(
                out,
                "# Code accepted after {} attempt{}",
                calls,
                plural(calls)
            );
            if let Some(code) = state.final_code() {
                let _ = writeln!(out, "```python\n{}\n```", code);
            }
        }
        RunStatus::Exhausted => {
            let _ = writeln!(
                out,
                "# Best attempt after {} attempt{} (issues remain)",
                calls,
                plural(calls)
            );
            match state.final_code() {
                Some(code) => {
                    let _ = writeln!(out, "```python\n{}\n```", code);
                }
                None => {
                    let _ = writeln!(out, "(the final response contained no code)");
                }
            }
            let _ = writeln!(out, "\nOutstanding issues:");
            for issue in state.final_issues() {
                let _ = writeln!(out, "- {}", issue);
            }
        }
        RunStatus::Aborted { reason } => {
            let _ = writeln!(out, "# Generation aborted");
            let _ = writeln!(out, "{}", reason);
        }
        RunStatus::Pending => {
            let _ = writeln!(out, "# Run did not finish");
        }
    }
    out
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
