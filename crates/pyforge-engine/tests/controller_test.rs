//! Retry controller behavior against scripted providers and checkers.
//!
//! No network and no external binaries: the provider replays canned replies
//! and the checkers report whatever the test tells them to.

use pyforge_checkers::{Checker, CheckerError, DiagnosticAggregator};
use pyforge_core::{Attempt, AttemptOutcome, CheckerKind, Issue, RunState, RunStatus};
use pyforge_engine::controller::NO_CODE_ISSUE;
use pyforge_engine::prompt::{NO_CODE_FAILED_CODE, SYSTEM_PROMPT};
use pyforge_engine::{ControllerError, RetryController, RunObserver};
use pyforge_llm::{LlmProvider, LlmResponse, ProviderError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

enum Reply {
    Text(&'static str),
    Owned(String),
    Fail,
}

/// Replays `replies` in order, repeating the last one once exhausted.
struct ScriptedProvider {
    replies: Vec<Reply>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        assert_eq!(system, SYSTEM_PROMPT);
        let mut prompts = self.prompts.lock().unwrap();
        let n = prompts.len();
        prompts.push(user.to_string());
        let reply = &self.replies[n.min(self.replies.len() - 1)];
        match reply {
            Reply::Text(text) => Ok(LlmResponse {
                text: (*text).to_string(),
                input_tokens: Some(50),
                output_tokens: Some(10),
            }),
            Reply::Owned(text) => Ok(LlmResponse::text(text.clone())),
            Reply::Fail => Err(ProviderError::Api {
                status: 401,
                message: "Incorrect API key provided".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn cost_per_mtok_input(&self) -> f64 {
        0.0
    }

    fn cost_per_mtok_output(&self) -> f64 {
        0.0
    }
}

/// Reports one style issue on each of the first `dirty_calls` invocations.
struct StyleUntil {
    dirty_calls: usize,
    calls: AtomicUsize,
}

impl StyleUntil {
    fn new(dirty_calls: usize) -> Self {
        Self {
            dirty_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Checker for StyleUntil {
    fn name(&self) -> &str {
        "style"
    }
    fn kind(&self) -> CheckerKind {
        CheckerKind::Style
    }
    fn check(&self, _code: &str) -> Result<Vec<Issue>, CheckerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.dirty_calls {
            Ok(vec![Issue::new(
                CheckerKind::Style,
                format!("C{}: missing docstring", n + 1),
            )])
        } else {
            Ok(Vec::new())
        }
    }
}

struct AlwaysBroken;

impl Checker for AlwaysBroken {
    fn name(&self) -> &str {
        "bandit"
    }
    fn kind(&self) -> CheckerKind {
        CheckerKind::Security
    }
    fn check(&self, _code: &str) -> Result<Vec<Issue>, CheckerError> {
        Err(CheckerError::Crashed {
            tool: "bandit".to_string(),
            reason: "segfault".to_string(),
        })
    }
}

fn aggregator(checkers: Vec<Box<dyn Checker>>) -> DiagnosticAggregator {
    DiagnosticAggregator::new(checkers)
}

fn run(provider: &ScriptedProvider, aggregator: &DiagnosticAggregator, max: usize) -> RunState {
    let mut state = RunState::new("print hello world", "No files were provided as context.");
    RetryController::new(provider, aggregator, max)
        .unwrap()
        .run(&mut state)
        .unwrap();
    state
}

#[test]
fn test_clean_first_reply_accepted_after_one_call() {
    let provider = ScriptedProvider::new(vec![Reply::Text("```python\nprint('hi')\n```")]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(0))]);
    let state = run(&provider, &agg, 5);

    assert_eq!(state.status(), &RunStatus::Accepted);
    assert_eq!(provider.calls(), 1);
    assert_eq!(state.attempts().len(), 1);
    assert_eq!(state.attempts()[0].outcome, AttemptOutcome::Accepted);
    assert_eq!(state.final_code(), Some("print('hi')"));
    assert_eq!(state.token_usage().input_tokens, 50);
}

#[test]
fn test_hello_world_accepted_on_second_attempt() {
    let provider = ScriptedProvider::new(vec![Reply::Text("```python\nprint('hi')\n```")]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(1))]);
    let state = run(&provider, &agg, 5);

    assert_eq!(state.status(), &RunStatus::Accepted);
    assert_eq!(provider.calls(), 2);
    assert_eq!(state.attempts().len(), 2);
    assert_eq!(state.attempts()[0].outcome, AttemptOutcome::Retried);
    assert_eq!(state.attempts()[0].issues.len(), 1);
    assert_eq!(state.attempts()[1].outcome, AttemptOutcome::Accepted);
    assert_eq!(state.final_code(), Some("print('hi')"));
    assert!(state.final_issues().is_empty());
}

#[test]
fn test_always_issues_exhausts_with_last_code() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("```python\nx = 1\n```"),
        Reply::Text("```python\nx = 2\n```"),
        Reply::Text("```python\nx = 3\n```"),
    ]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(usize::MAX))]);
    let state = run(&provider, &agg, 3);

    assert_eq!(state.status(), &RunStatus::Exhausted);
    assert_eq!(provider.calls(), 3);
    assert_eq!(state.final_code(), Some("x = 3"));
    assert_eq!(state.final_issues().len(), 1);
    assert_eq!(state.final_issues()[0].message, "C3: missing docstring");
    let outcomes: Vec<AttemptOutcome> = state.attempts().iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::Retried,
            AttemptOutcome::Retried,
            AttemptOutcome::Exhausted
        ]
    );
}

#[test]
fn test_model_calls_never_exceed_max_attempts() {
    for max in 1..=6 {
        let provider = ScriptedProvider::new(vec![Reply::Text("```python\npass\n```")]);
        let agg = aggregator(vec![Box::new(StyleUntil::new(usize::MAX))]);
        let state = run(&provider, &agg, max);
        assert_eq!(provider.calls(), max);
        assert_eq!(state.model_calls(), max);
        assert!(state.attempts().iter().all(|a| a.index <= max));
        assert_eq!(state.status(), &RunStatus::Exhausted);
        assert_eq!(
            state.attempts().last().map(|a| a.outcome),
            Some(AttemptOutcome::Exhausted)
        );
    }
}

#[test]
fn test_feedback_carries_query_and_previous_code() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("```python\nfirst_version()\n```"),
        Reply::Text("```python\nsecond_version()\n```"),
        Reply::Text("```python\nthird_version()\n```"),
    ]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(usize::MAX))]);
    let state = run(&provider, &agg, 3);

    let second = provider.prompt(1);
    assert!(second.contains("**ORIGINAL USER'S REQUEST:**\nprint hello world\n"));
    assert!(second.contains("```python\nfirst_version()\n```"));
    assert!(second.contains("- [style] C1: missing docstring"));

    let third = provider.prompt(2);
    assert!(third.contains("print hello world"));
    assert!(third.contains("```python\nsecond_version()\n```"));
    assert!(!third.contains("first_version()"));

    // the recorded prompt is the one that was sent
    assert_eq!(state.attempts()[2].prompt, third);
    assert_eq!(state.current_prompt(), third);
}

#[test]
fn test_prose_only_exhausts_with_no_code_issue() {
    let provider = ScriptedProvider::new(vec![Reply::Text(
        "I'm sorry, but I cannot help with that request.",
    )]);
    let checker = StyleUntil::new(0);
    let agg = aggregator(vec![Box::new(checker)]);
    let state = run(&provider, &agg, 4);

    assert_eq!(state.status(), &RunStatus::Exhausted);
    assert_eq!(provider.calls(), 4);
    assert!(state.final_code().is_none());
    let messages: Vec<&str> = state
        .final_issues()
        .iter()
        .map(|i| i.message.as_str())
        .collect();
    assert_eq!(messages, vec![NO_CODE_ISSUE]);
    assert_eq!(state.final_issues()[0].source, CheckerKind::Extraction);

    let retry = provider.prompt(1);
    assert!(retry.contains(NO_CODE_FAILED_CODE));
    assert!(retry.contains("did not contain a valid Python code block"));
}

#[test]
fn test_no_code_then_clean_code_shares_budget() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("Here is an explanation of the approach."),
        Reply::Text("```python\nprint('ok')\n```"),
    ]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(0))]);
    let state = run(&provider, &agg, 2);

    assert_eq!(state.status(), &RunStatus::Accepted);
    assert_eq!(provider.calls(), 2);
    assert!(state.attempts()[0].code.is_none());
    assert_eq!(state.attempts()[0].issues[0].message, NO_CODE_ISSUE);
}

#[test]
fn test_empty_reply_retried_like_missing_code() {
    let provider = ScriptedProvider::new(vec![
        Reply::Owned(String::new()),
        Reply::Text("```python\nprint('ok')\n```"),
    ]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(0))]);
    let state = run(&provider, &agg, 3);

    assert_eq!(state.status(), &RunStatus::Accepted);
    assert_eq!(provider.calls(), 2);
    assert_eq!(state.attempts()[0].outcome, AttemptOutcome::Retried);
    assert!(state.attempts()[0].code.is_none());
    assert_eq!(state.attempts()[0].issues[0].message, NO_CODE_ISSUE);
    assert!(provider.prompt(1).contains(NO_CODE_FAILED_CODE));
}

#[test]
fn test_broken_checker_never_aborts() {
    let provider = ScriptedProvider::new(vec![Reply::Text("```python\nprint(1)\n```")]);
    let agg = aggregator(vec![Box::new(AlwaysBroken)]);
    let state = run(&provider, &agg, 3);

    assert_eq!(state.status(), &RunStatus::Exhausted);
    assert_eq!(provider.calls(), 3);
    for attempt in state.attempts() {
        assert_eq!(attempt.issues.len(), 1);
        assert_eq!(attempt.issues[0].message, "bandit crashed: segfault");
    }
}

#[test]
fn test_provider_error_aborts_without_retry() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text("```python\nx = 1\n```"),
        Reply::Fail,
        Reply::Text("```python\nx = 2\n```"),
    ]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(usize::MAX))]);
    let state = run(&provider, &agg, 5);

    assert_eq!(
        state.status(),
        &RunStatus::Aborted {
            reason: "API error (401): Incorrect API key provided".to_string()
        }
    );
    assert_eq!(provider.calls(), 2);
    let last = state.last_attempt().unwrap();
    assert_eq!(last.outcome, AttemptOutcome::Aborted);
    assert!(last.response.is_none());
    assert!(last.code.is_none());
    assert!(state.final_code().is_none());
}

#[test]
fn test_zero_max_attempts_rejected() {
    let provider = ScriptedProvider::new(vec![Reply::Fail]);
    let agg = aggregator(Vec::new());
    let err = RetryController::new(&provider, &agg, 0).err().unwrap();
    assert!(matches!(err, ControllerError::InvalidMaxAttempts));
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_used_state_rejected() {
    let provider = ScriptedProvider::new(vec![Reply::Text("```python\npass\n```")]);
    let agg = aggregator(Vec::new());
    let controller = RetryController::new(&provider, &agg, 2).unwrap();
    let mut state = RunState::new("q", "ctx");
    controller.run(&mut state).unwrap();
    let err = controller.run(&mut state).unwrap_err();
    assert!(matches!(err, ControllerError::StateAlreadyUsed));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn test_heuristic_code_is_analyzed() {
    let long = "import os\n".repeat(3);
    let provider = ScriptedProvider::new(vec![Reply::Owned(long)]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(0))]);
    let state = run(&provider, &agg, 1);
    assert_eq!(state.status(), &RunStatus::Accepted);
    assert_eq!(state.final_code(), Some("import os\nimport os\nimport os"));
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl RunObserver for Recorder {
    fn attempt_started(&self, index: usize, max_attempts: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {}/{}", index, max_attempts));
    }

    fn attempt_finished(&self, attempt: &Attempt) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finish {} {:?}", attempt.index, attempt.outcome));
    }
}

#[test]
fn test_observer_sees_every_attempt() {
    let provider = ScriptedProvider::new(vec![Reply::Text("```python\nprint('hi')\n```")]);
    let agg = aggregator(vec![Box::new(StyleUntil::new(1))]);
    let recorder = Recorder::default();
    let mut state = RunState::new("q", "ctx");
    RetryController::new(&provider, &agg, 3)
        .unwrap()
        .with_observer(&recorder)
        .run(&mut state)
        .unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start 1/3",
            "finish 1 Retried",
            "start 2/3",
            "finish 2 Accepted"
        ]
    );
}
