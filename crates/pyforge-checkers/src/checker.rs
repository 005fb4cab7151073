//! The checker contract.

use pyforge_core::{CheckerKind, Issue};

/// Failures inside a checker itself, as opposed to findings about the code.
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("{tool} not found. Please ensure it's installed and in your system's PATH.")]
    ToolMissing { tool: String },
    #[error("{tool} crashed: {reason}")]
    Crashed { tool: String, reason: String },
    #[error("{tool} timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },
}

/// One analysis pass over a Python script.
///
/// Implementations must be usable from several threads at once; the
/// aggregator may invoke all registered checkers concurrently.
pub trait Checker: Send + Sync {
    /// Display name used in synthetic issues and logs.
    fn name(&self) -> &str;

    /// Category attached to every issue this checker reports.
    fn kind(&self) -> CheckerKind;

    /// Analyze `code`. An empty list means the checker is satisfied.
    fn check(&self, code: &str) -> Result<Vec<Issue>, CheckerError>;
}

/// Cut `text` to at most `max` characters for inclusion in an issue message.
pub(crate) fn snippet(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max).collect();
    format!("{}...", cut)
}
