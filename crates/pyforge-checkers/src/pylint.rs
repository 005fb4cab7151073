//! Style checker backed by pylint (errors, warnings, fatals only).

use crate::checker::{Checker, CheckerError, snippet};
use crate::process::{ScriptDir, run_tool};
use pyforge_core::{CheckerKind, Issue, Severity};
use regex::Regex;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

const MSG_TEMPLATE: &str = "{path}:{line}:{column}: [{msg_id}({symbol})] {msg}";

pub struct PylintChecker {
    program: String,
    timeout: Duration,
}

impl PylintChecker {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Checker for PylintChecker {
    fn name(&self) -> &str {
        "pylint"
    }

    fn kind(&self) -> CheckerKind {
        CheckerKind::Style
    }

    fn check(&self, code: &str) -> Result<Vec<Issue>, CheckerError> {
        let staged = ScriptDir::new(self.name(), code)?;
        let mut cmd = Command::new(&self.program);
        cmd.arg(staged.script())
            .arg("--output-format=text")
            .arg(format!("--msg-template={}", MSG_TEMPLATE))
            .args(["--disable=all", "--enable=E,W,F", "--score=n"])
            .current_dir(staged.path());

        let output = run_tool(self.name(), &mut cmd, self.timeout)?;
        let issues = parse_output(&output.stdout);

        // Exit status is a bitmask of message categories; non-zero with
        // nothing parseable means pylint itself failed.
        if issues.is_empty() && !output.success() {
            let raw = if output.stderr.trim().is_empty() {
                &output.stdout
            } else {
                &output.stderr
            };
            return Ok(vec![
                Issue::new(
                    CheckerKind::Style,
                    format!(
                        "pylint exited with status {}: {}",
                        output.code().map_or_else(|| "unknown".into(), |c| c.to_string()),
                        snippet(raw, 200)
                    ),
                )
                .with_severity(Severity::Error),
            ]);
        }
        Ok(issues)
    }
}

/// Parse pylint text output produced with [`MSG_TEMPLATE`].
pub fn parse_output(stdout: &str) -> Vec<Issue> {
    static MESSAGE_RE: OnceLock<Regex> = OnceLock::new();
    let message_re = MESSAGE_RE.get_or_init(|| {
        Regex::new(r"^.+?:(\d+):(\d+): \[([A-Z]\d+)\(([^)]+)\)\] (.*)$").unwrap()
    });

    stdout
        .lines()
        .filter_map(|line| {
            let caps = message_re.captures(line.trim_end())?;
            let line_no: u32 = caps[1].parse().ok()?;
            // pylint columns are 0-based
            let column: Option<u32> = caps[2].parse::<u32>().ok().map(|c| c + 1);
            let msg_id = &caps[3];
            let severity = match msg_id.as_bytes().first() {
                Some(b'W') => Severity::Warning,
                _ => Severity::Error,
            };
            Some(
                Issue::new(
                    CheckerKind::Style,
                    format!("{}({}): {}", msg_id, &caps[4], &caps[5]),
                )
                .at(line_no, column)
                .with_severity(severity),
            )
        })
        .collect()
}
