use pyforge_core::*;

fn make_attempt(
    index: usize,
    code: Option<&str>,
    issues: Vec<Issue>,
    outcome: AttemptOutcome,
) -> Attempt {
    Attempt {
        index,
        prompt: format!("prompt {}", index),
        response: Some(format!("response {}", index)),
        code: code.map(String::from),
        issues,
        outcome,
        usage: Some(TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
        }),
        elapsed_ms: 5,
    }
}

#[test]
fn test_new_state_is_fresh() {
    let state = RunState::new("print hello world", "No files were provided as context.");
    assert!(state.is_fresh());
    assert_eq!(state.status(), &RunStatus::Pending);
    assert_eq!(state.query(), "print hello world");
    assert_eq!(state.model_calls(), 0);
    assert!(state.final_code().is_none());
}

#[test]
fn test_accepted_exposes_last_code() {
    let mut state = RunState::new("q", "ctx");
    state.record_attempt(make_attempt(
        1,
        Some("print('a')"),
        vec![Issue::new(CheckerKind::Style, "bad")],
        AttemptOutcome::Retried,
    ));
    state.record_attempt(make_attempt(
        2,
        Some("print('b')"),
        vec![],
        AttemptOutcome::Accepted,
    ));
    state.finish(RunStatus::Accepted);

    assert!(state.is_clean());
    assert_eq!(state.final_code(), Some("print('b')"));
    assert!(state.final_issues().is_empty());
    assert_eq!(state.model_calls(), 2);
    assert!(state.finished_at().is_some());
}

#[test]
fn test_exhausted_keeps_last_issues() {
    let mut state = RunState::new("q", "ctx");
    state.record_attempt(make_attempt(
        1,
        Some("x = 1"),
        vec![Issue::new(CheckerKind::Type, "incompatible types")],
        AttemptOutcome::Exhausted,
    ));
    state.finish(RunStatus::Exhausted);

    assert!(!state.is_clean());
    assert_eq!(state.final_code(), Some("x = 1"));
    assert_eq!(state.final_issues().len(), 1);
    assert_eq!(state.final_issues()[0].message, "incompatible types");
}

#[test]
fn test_aborted_hides_code() {
    let mut state = RunState::new("q", "ctx");
    let mut attempt = make_attempt(1, None, vec![], AttemptOutcome::Aborted);
    attempt.response = None;
    state.record_attempt(attempt);
    state.finish(RunStatus::Aborted {
        reason: "missing API key".to_string(),
    });

    assert!(state.final_code().is_none());
    assert!(state.final_issues().is_empty());
    assert_eq!(state.status().to_string(), "aborted");
}

#[test]
fn test_finish_is_sticky() {
    let mut state = RunState::new("q", "ctx");
    state.finish(RunStatus::Exhausted);
    state.finish(RunStatus::Accepted);
    assert_eq!(state.status(), &RunStatus::Exhausted);
}

#[test]
fn test_token_usage_sums_attempts() {
    let mut state = RunState::new("q", "ctx");
    state.record_attempt(make_attempt(1, None, vec![], AttemptOutcome::Retried));
    state.record_attempt(make_attempt(2, Some("pass"), vec![], AttemptOutcome::Accepted));
    let usage = state.token_usage();
    assert_eq!(usage.input_tokens, 200);
    assert_eq!(usage.output_tokens, 40);
}

#[test]
fn test_json_report_contains_status_tag() {
    let mut state = RunState::new("q", "ctx");
    state.finish(RunStatus::Aborted {
        reason: "API error (401): bad key".to_string(),
    });
    let json = state.to_json_pretty().unwrap();
    assert!(json.contains("\"status\": \"aborted\""));
    assert!(json.contains("bad key"));
}
