//! Integration tests for pyforge-cli functionality.
//! Tests the library flows that the CLI commands wire together.

use pyforge_checkers::build_aggregator;
use pyforge_core::config::ForgeConfig;
use pyforge_core::{CheckerKind, RunState, RunStatus};
use pyforge_engine::{Attachment, RetryController, extract_code, render_attachments};
use pyforge_llm::{LlmProvider, LlmResponse, ProviderError};
use std::sync::atomic::{AtomicUsize, Ordering};

struct FixedReply {
    text: &'static str,
    calls: AtomicUsize,
}

impl LlmProvider for FixedReply {
    fn complete(&self, _system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(user.contains("--- START OF FILE: data.csv ---"));
        Ok(LlmResponse::text(self.text))
    }
    fn model_name(&self) -> &str {
        "fixed"
    }
    fn cost_per_mtok_input(&self) -> f64 {
        0.0
    }
    fn cost_per_mtok_output(&self) -> f64 {
        0.0
    }
}

fn write_config(root: &std::path::Path, body: &str) {
    let dir = root.join(".pyforge");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), body).unwrap();
}

#[test]
fn test_config_file_selects_checkers() {
    let tmp = tempfile::tempdir().unwrap();
    write_config(
        tmp.path(),
        r#"
[generation]
max_attempts = 2

[checkers]
enabled = ["security", "style"]
parallel = false
"#,
    );
    let config = ForgeConfig::load(tmp.path()).unwrap();
    let kinds = config.checkers.enabled_kinds().unwrap();
    assert_eq!(kinds, vec![CheckerKind::Security, CheckerKind::Style]);
    let aggregator = build_aggregator(&config.checkers, &kinds, &[]);
    assert_eq!(aggregator.names(), vec!["bandit", "pylint"]);
}

#[test]
fn test_invalid_config_rejected_before_any_call() {
    let tmp = tempfile::tempdir().unwrap();
    write_config(
        tmp.path(),
        r#"
[checkers]
enabled = ["style", "lint-everything"]
"#,
    );
    let err = ForgeConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("lint-everything"));
}

#[test]
fn test_missing_tool_surfaces_as_issue_until_exhausted() {
    let tmp = tempfile::tempdir().unwrap();
    write_config(
        tmp.path(),
        r#"
[generation]
max_attempts = 2

[checkers]
enabled = ["style"]
pylint = "pyforge-test-no-such-pylint"
"#,
    );
    let csv = tmp.path().join("data.csv");
    std::fs::write(&csv, "a,b\n1,2\n").unwrap();

    let config = ForgeConfig::load(tmp.path()).unwrap();
    let kinds = config.checkers.enabled_kinds().unwrap();
    let aggregator = build_aggregator(&config.checkers, &kinds, &[csv.clone()]);
    let provider = FixedReply {
        text: "```python\nimport csv\nprint(list(csv.reader(open('data.csv'))))\n```",
        calls: AtomicUsize::new(0),
    };

    let context = render_attachments(&[Attachment::from_path(&csv)]);
    let mut state = RunState::new("print the csv rows", context);
    RetryController::new(&provider, &aggregator, config.generation.max_attempts)
        .unwrap()
        .run(&mut state)
        .unwrap();

    assert_eq!(state.status(), &RunStatus::Exhausted);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.final_issues().len(), 1);
    assert_eq!(
        state.final_issues()[0].message,
        "pylint not found. Please ensure it's installed and in your system's PATH."
    );
    assert!(state.final_code().unwrap().starts_with("import csv"));

    let json = state.to_json_pretty().unwrap();
    assert!(json.contains("\"status\": \"exhausted\""));
}

#[test]
fn test_extract_command_flow() {
    let reply = "Sure:\n```python\nprint('hello world')\n```\nEnjoy!";
    let extracted = extract_code(reply).unwrap();
    assert_eq!(extracted.code, "print('hello world')");
    let json = serde_json::to_string(&extracted).unwrap();
    assert_eq!(
        json,
        r#"{"code":"print('hello world')","method":"tagged_fence"}"#
    );
}
