//! The generate → extract → analyze → decide loop.
//!
//! One [`RetryController`] drives one [`RunState`] at a time, strictly
//! sequentially. Every attempt costs exactly one model call, so a run makes
//! at most `max_attempts` calls. A reply with no code and a reply whose code
//! has issues both consume one attempt from the same budget; a provider
//! error ends the run immediately.

use crate::extract::extract_code;
use crate::prompt::{
    NO_CODE_FAILED_CODE, NO_CODE_FEEDBACK, SYSTEM_PROMPT, build_feedback, build_initial,
    issue_lines,
};
use pyforge_checkers::DiagnosticAggregator;
use pyforge_core::{Attempt, AttemptOutcome, CheckerKind, Issue, RunState, RunStatus, Severity};
use pyforge_llm::LlmProvider;
use std::time::Instant;

/// Issue recorded when a reply contains nothing that looks like code.
pub const NO_CODE_ISSUE: &str = "no recognizable code block";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,
    #[error("run state was already used by another run")]
    StateAlreadyUsed,
}

/// What to do after an attempt has been analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Retry,
    Exhaust,
}

/// Pure decision rule. Only the presence of issues matters, never their severity.
pub fn decide(attempt: usize, max_attempts: usize, has_issues: bool) -> Decision {
    if !has_issues {
        Decision::Accept
    } else if attempt < max_attempts {
        Decision::Retry
    } else {
        Decision::Exhaust
    }
}

/// Progress callbacks. Implementations cannot influence the run.
pub trait RunObserver {
    fn attempt_started(&self, _index: usize, _max_attempts: usize) {}
    fn attempt_finished(&self, _attempt: &Attempt) {}
}

pub struct RetryController<'a> {
    provider: &'a dyn LlmProvider,
    aggregator: &'a DiagnosticAggregator,
    max_attempts: usize,
    observer: Option<&'a dyn RunObserver>,
}

impl<'a> RetryController<'a> {
    pub fn new(
        provider: &'a dyn LlmProvider,
        aggregator: &'a DiagnosticAggregator,
        max_attempts: usize,
    ) -> Result<Self, ControllerError> {
        if max_attempts == 0 {
            return Err(ControllerError::InvalidMaxAttempts);
        }
        Ok(Self {
            provider,
            aggregator,
            max_attempts,
            observer: None,
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn RunObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Drive `state` to a terminal status.
    ///
    /// `state` must be fresh. Model and checker failures are recorded in the
    /// state rather than returned; the only errors are misuse errors.
    pub fn run(&self, state: &mut RunState) -> Result<(), ControllerError> {
        if !state.is_fresh() {
            return Err(ControllerError::StateAlreadyUsed);
        }

        let initial = build_initial(state.query(), state.file_context());
        state.set_prompt(initial);

        // Exits only by returning: `decide` exhausts on the last attempt.
        let mut index = 0;
        loop {
            index += 1;
            if let Some(observer) = self.observer {
                observer.attempt_started(index, self.max_attempts);
            }
            tracing::info!(
                attempt = index,
                max_attempts = self.max_attempts,
                model = self.provider.model_name(),
                "requesting code generation"
            );

            let started = Instant::now();
            let prompt = state.current_prompt().to_string();
            tracing::debug!(attempt = index, %prompt, "prompt");

            let response = match self.provider.complete(SYSTEM_PROMPT, &prompt) {
                Ok(response) => response,
                Err(e) => {
                    let reason = e.to_string();
                    tracing::error!(attempt = index, error = %reason, "model call failed, aborting run");
                    self.record(
                        state,
                        Attempt {
                            index,
                            prompt,
                            response: None,
                            code: None,
                            issues: Vec::new(),
                            outcome: AttemptOutcome::Aborted,
                            usage: None,
                            elapsed_ms: elapsed_ms(started),
                        },
                    );
                    state.finish(RunStatus::Aborted { reason });
                    return Ok(());
                }
            };
            tracing::debug!(attempt = index, response = %response.text, "model response");
            let usage = response.usage();

            let (code, issues) = match extract_code(&response.text) {
                Some(extracted) => {
                    tracing::debug!(attempt = index, method = ?extracted.method, "code extracted");
                    let issues = self.aggregator.evaluate(&extracted.code);
                    (Some(extracted.code), issues)
                }
                None => {
                    tracing::warn!(attempt = index, "response contained no recognizable code");
                    let issue =
                        Issue::new(CheckerKind::Extraction, NO_CODE_ISSUE).with_severity(Severity::Error);
                    (None, vec![issue])
                }
            };

            let decision = decide(index, self.max_attempts, !issues.is_empty());
            let outcome = match decision {
                Decision::Accept => AttemptOutcome::Accepted,
                Decision::Retry => AttemptOutcome::Retried,
                Decision::Exhaust => AttemptOutcome::Exhausted,
            };

            let next_prompt = (decision == Decision::Retry).then(|| match &code {
                Some(code) => build_feedback(
                    state.query(),
                    state.file_context(),
                    code,
                    &issue_lines(&issues),
                ),
                None => build_feedback(
                    state.query(),
                    state.file_context(),
                    NO_CODE_FAILED_CODE,
                    &[NO_CODE_FEEDBACK.to_string()],
                ),
            });

            let issue_count = issues.len();
            self.record(
                state,
                Attempt {
                    index,
                    prompt,
                    response: Some(response.text),
                    code,
                    issues,
                    outcome,
                    usage,
                    elapsed_ms: elapsed_ms(started),
                },
            );

            match decision {
                Decision::Accept => {
                    tracing::info!(attempt = index, "code accepted");
                    state.finish(RunStatus::Accepted);
                    return Ok(());
                }
                Decision::Exhaust => {
                    tracing::warn!(
                        attempt = index,
                        issues = issue_count,
                        "attempts exhausted, keeping best effort"
                    );
                    state.finish(RunStatus::Exhausted);
                    return Ok(());
                }
                Decision::Retry => {
                    tracing::warn!(attempt = index, issues = issue_count, "issues found, retrying");
                    if let Some(prompt) = next_prompt {
                        state.set_prompt(prompt);
                    }
                }
            }
        }
    }

    fn record(&self, state: &mut RunState, attempt: Attempt) {
        if let Some(observer) = self.observer {
            observer.attempt_finished(&attempt);
        }
        state.record_attempt(attempt);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
