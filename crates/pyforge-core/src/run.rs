//! Run state for one end-to-end generation request.
//!
//! A [`RunState`] is created by the caller, handed to the retry controller by
//! mutable reference, and read back afterwards. Query and file context never
//! change during a run; the attempt history is append-only.

use crate::issue::Issue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token counts reported by the model provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Code extracted and no checker reported anything.
    Accepted,
    /// Code missing or flawed; a feedback prompt was prepared for the next attempt.
    Retried,
    /// Code missing or flawed on the last permitted attempt.
    Exhausted,
    /// The model call failed fatally.
    Aborted,
}

/// One iteration of generate → extract → analyze.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number.
    pub index: usize,
    pub prompt: String,
    /// Raw model output. `None` when the call itself failed.
    pub response: Option<String>,
    pub code: Option<String>,
    pub issues: Vec<Issue>,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub elapsed_ms: u64,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    /// The last attempt produced code with no issues.
    Accepted,
    /// Attempts ran out; the last attempt's code and issues are the best result.
    Exhausted,
    /// A fatal model-call error stopped the run. The reason is shown verbatim.
    Aborted { reason: String },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Aborted { .. } => write!(f, "aborted"),
        }
    }
}

/// Accumulated state of one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    query: String,
    file_context: String,
    current_prompt: String,
    attempts: Vec<Attempt>,
    status: RunStatus,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(query: impl Into<String>, file_context: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            file_context: file_context.into(),
            current_prompt: String::new(),
            attempts: Vec::new(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn file_context(&self) -> &str {
        &self.file_context
    }

    /// Prompt that will be (or last was) sent to the model.
    pub fn current_prompt(&self) -> &str {
        &self.current_prompt
    }

    pub fn set_prompt(&mut self, prompt: String) {
        self.current_prompt = prompt;
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn record_attempt(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    /// Mark the run terminal. Later calls are ignored.
    pub fn finish(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// True when nothing has happened to this state yet.
    pub fn is_fresh(&self) -> bool {
        self.attempts.is_empty() && self.status == RunStatus::Pending
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// Every attempt corresponds to exactly one model call, including an aborted one.
    pub fn model_calls(&self) -> usize {
        self.attempts.len()
    }

    /// Final code: clean on `Accepted`, best effort on `Exhausted`, none otherwise.
    pub fn final_code(&self) -> Option<&str> {
        match self.status {
            RunStatus::Accepted | RunStatus::Exhausted => {
                self.last_attempt().and_then(|a| a.code.as_deref())
            }
            RunStatus::Pending | RunStatus::Aborted { .. } => None,
        }
    }

    /// Issues still outstanding on the final attempt.
    pub fn final_issues(&self) -> &[Issue] {
        match self.status {
            RunStatus::Exhausted => self
                .last_attempt()
                .map(|a| a.issues.as_slice())
                .unwrap_or_default(),
            _ => &[],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.status == RunStatus::Accepted
    }

    /// Sum of provider-reported token usage across attempts.
    pub fn token_usage(&self) -> TokenUsage {
        self.attempts
            .iter()
            .filter_map(|a| a.usage)
            .fold(TokenUsage::default(), |acc, u| TokenUsage {
                input_tokens: acc.input_tokens + u.input_tokens,
                output_tokens: acc.output_tokens + u.output_tokens,
            })
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
