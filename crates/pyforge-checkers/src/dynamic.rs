//! Dynamic-behavior checker: executes the script and scans for risky calls.
//!
//! The script runs under `python -I` (isolated mode: no user site-packages,
//! no `PYTHON*` env vars) with its working directory set to a throwaway
//! directory. Fixture files (the user's attachments) can be copied in so
//! scripts that open them by name behave as they would for the user.

use crate::checker::{Checker, CheckerError};
use crate::process::{ScriptDir, run_with_timeout, spawn_error};
use pyforge_core::{CheckerKind, Issue, Severity};
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

pub struct DynamicChecker {
    python: String,
    timeout: Duration,
    fixtures: Vec<PathBuf>,
}

impl DynamicChecker {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
            fixtures: Vec::new(),
        }
    }

    /// Files copied next to the script before each run.
    pub fn with_fixtures(mut self, fixtures: Vec<PathBuf>) -> Self {
        self.fixtures = fixtures;
        self
    }

    fn stage(&self, code: &str) -> Result<ScriptDir, CheckerError> {
        let staged = ScriptDir::new(self.name(), code)?;
        for fixture in &self.fixtures {
            let Some(file_name) = fixture.file_name() else {
                continue;
            };
            if let Err(e) = std::fs::copy(fixture, staged.path().join(file_name)) {
                tracing::warn!(fixture = %fixture.display(), error = %e, "skipping fixture");
            }
        }
        Ok(staged)
    }
}

impl Checker for DynamicChecker {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn kind(&self) -> CheckerKind {
        CheckerKind::DynamicBehavior
    }

    fn check(&self, code: &str) -> Result<Vec<Issue>, CheckerError> {
        let mut issues = scan_patterns(code);

        let staged = self.stage(code)?;
        let mut cmd = Command::new(&self.python);
        cmd.arg("-I")
            .arg(staged.script())
            .current_dir(staged.path());

        let output = run_with_timeout(&mut cmd, self.timeout)
            .map_err(|e| spawn_error(&self.python, &e))?;

        if output.timed_out {
            issues.push(
                Issue::new(
                    CheckerKind::DynamicBehavior,
                    format!(
                        "script did not finish within {}s (possible infinite loop or blocking call)",
                        self.timeout.as_secs()
                    ),
                )
                .with_severity(Severity::Error),
            );
        } else if !output.success() {
            issues.push(runtime_failure(&output.stderr, output.code()));
        }
        Ok(issues)
    }
}

/// Build one issue from a failed run: the final traceback line, located at
/// the deepest frame inside the generated script.
fn runtime_failure(stderr: &str, code: Option<i32>) -> Issue {
    static FRAME_RE: OnceLock<Regex> = OnceLock::new();
    let frame_re = FRAME_RE
        .get_or_init(|| Regex::new(r#"File ".*generated_script\.py", line (\d+)"#).unwrap());

    let last_line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty());
    let message = match last_line {
        Some(line) => format!("runtime error: {}", line),
        None => format!(
            "script exited with status {}",
            code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
        ),
    };

    let mut issue = Issue::new(CheckerKind::DynamicBehavior, message).with_severity(Severity::Error);
    if let Some(line) = frame_re
        .captures_iter(stderr)
        .last()
        .and_then(|caps| caps[1].parse().ok())
    {
        issue = issue.at(line, None);
    }
    issue
}

/// Report calls that are risky in generated code.
pub fn scan_patterns(code: &str) -> Vec<Issue> {
    static PATTERNS: OnceLock<Vec<(Regex, String)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        let mut patterns = Vec::new();
        for func in ["eval", "exec", "compile", "__import__"] {
            patterns.push((
                Regex::new(&format!(r"\b{}\s*\(", func)).unwrap(),
                format!("Dangerous function '{}' detected", func),
            ));
        }
        for call in ["os.system", "subprocess.call", "subprocess.run"] {
            patterns.push((
                Regex::new(&format!(r"\b{}\s*\(", regex::escape(call))).unwrap(),
                format!("Potentially dangerous module usage '{}' detected", call),
            ));
        }
        patterns.push((
            Regex::new(r"\binput\s*\(").unwrap(),
            "User input detected - ensure proper validation".to_string(),
        ));
        patterns
    });

    patterns
        .iter()
        .filter_map(|(re, message)| {
            let offset = re.find(code)?.start();
            let line = code[..offset].matches('\n').count() + 1;
            Some(
                Issue::new(CheckerKind::DynamicBehavior, message.clone())
                    .at(u32::try_from(line).unwrap_or(u32::MAX), None)
                    .with_severity(Severity::Warning),
            )
        })
        .collect()
}
