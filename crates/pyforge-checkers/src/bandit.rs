//! Security checker backed by bandit's JSON report.

use crate::checker::{Checker, CheckerError, snippet};
use crate::process::{ScriptDir, run_tool};
use pyforge_core::{CheckerKind, Issue, Severity};
use serde::Deserialize;
use std::process::Command;
use std::time::Duration;

pub struct BanditChecker {
    program: String,
    timeout: Duration,
}

impl BanditChecker {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditResult>,
}

#[derive(Debug, Deserialize)]
struct BanditResult {
    #[serde(default)]
    issue_severity: String,
    #[serde(default)]
    issue_confidence: String,
    #[serde(default)]
    issue_text: String,
    #[serde(default)]
    test_id: String,
    #[serde(default)]
    line_number: Option<u32>,
}

impl Checker for BanditChecker {
    fn name(&self) -> &str {
        "bandit"
    }

    fn kind(&self) -> CheckerKind {
        CheckerKind::Security
    }

    fn check(&self, code: &str) -> Result<Vec<Issue>, CheckerError> {
        let staged = ScriptDir::new(self.name(), code)?;
        let mut cmd = Command::new(&self.program);
        cmd.arg("-r")
            .arg(staged.script())
            .args(["-f", "json", "-q"])
            .current_dir(staged.path());

        let output = run_tool(self.name(), &mut cmd, self.timeout)?;

        // 0 = nothing found, 1 = findings; anything else is a scan failure.
        match output.code() {
            Some(0 | 1) => parse_report(&output.stdout).map_err(|e| CheckerError::Crashed {
                tool: self.name().to_string(),
                reason: format!("unreadable JSON report: {}", e),
            }),
            code => Ok(vec![
                Issue::new(
                    CheckerKind::Security,
                    format!(
                        "bandit scan error (exit {}): {}",
                        code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                        snippet(&output.stderr, 200)
                    ),
                )
                .with_severity(Severity::Error),
            ]),
        }
    }
}

/// Convert a bandit JSON report into issues.
pub fn parse_report(json: &str) -> Result<Vec<Issue>, serde_json::Error> {
    let report: BanditReport = serde_json::from_str(json)?;
    Ok(report
        .results
        .into_iter()
        .map(|r| {
            let mut issue = Issue::new(
                CheckerKind::Security,
                format!(
                    "{}: {} (severity: {}, confidence: {})",
                    r.test_id, r.issue_text, r.issue_severity, r.issue_confidence
                ),
            )
            .with_severity(map_severity(&r.issue_severity));
            if let Some(line) = r.line_number {
                issue = issue.at(line, None);
            }
            issue
        })
        .collect())
}

fn map_severity(level: &str) -> Severity {
    match level.to_ascii_uppercase().as_str() {
        "HIGH" => Severity::Error,
        "MEDIUM" => Severity::Warning,
        _ => Severity::Info,
    }
}
