//! Type checker backed by mypy.

use crate::checker::{Checker, CheckerError, snippet};
use crate::process::{ScriptDir, run_tool};
use pyforge_core::{CheckerKind, Issue, Severity};
use regex::Regex;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

pub struct MypyChecker {
    program: String,
    timeout: Duration,
}

impl MypyChecker {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Checker for MypyChecker {
    fn name(&self) -> &str {
        "mypy"
    }

    fn kind(&self) -> CheckerKind {
        CheckerKind::Type
    }

    fn check(&self, code: &str) -> Result<Vec<Issue>, CheckerError> {
        let staged = ScriptDir::new(self.name(), code)?;
        let mut cmd = Command::new(&self.program);
        cmd.arg(staged.script())
            .args([
                "--show-error-codes",
                "--show-column-numbers",
                "--no-color-output",
                "--no-error-summary",
            ])
            // keeps .mypy_cache inside the throwaway directory
            .current_dir(staged.path());

        let output = run_tool(self.name(), &mut cmd, self.timeout)?;
        let issues = parse_output(&output.stdout);

        // 0 = clean, 1 = type errors, 2 = mypy could not run
        if issues.is_empty() && output.code() == Some(2) {
            return Err(CheckerError::Crashed {
                tool: self.name().to_string(),
                reason: snippet(&format!("{}{}", output.stderr, output.stdout), 200),
            });
        }
        Ok(issues)
    }
}

/// Keep only `error:` lines from mypy output.
pub fn parse_output(stdout: &str) -> Vec<Issue> {
    static ERROR_RE: OnceLock<Regex> = OnceLock::new();
    let error_re = ERROR_RE
        .get_or_init(|| Regex::new(r"^.+?:(\d+):(?:(\d+):)? error: (.*)$").unwrap());

    stdout
        .lines()
        .filter(|line| line.contains("error:"))
        .map(|line| {
            let line = line.trim_end();
            let issue = match error_re.captures(line) {
                Some(caps) => {
                    let issue = Issue::new(CheckerKind::Type, &caps[3]);
                    match caps[1].parse::<u32>() {
                        Ok(n) => issue.at(n, caps.get(2).and_then(|c| c.as_str().parse().ok())),
                        Err(_) => issue,
                    }
                }
                None => Issue::new(CheckerKind::Type, line),
            };
            issue.with_severity(Severity::Error)
        })
        .collect()
}
