//! Diagnostic findings reported by checkers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of analysis produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckerKind {
    /// Structural/style linting (pylint).
    Style,
    /// Security pattern scanning (bandit).
    Security,
    /// Type consistency (mypy).
    Type,
    /// Executing the script and observing its behavior.
    DynamicBehavior,
    /// Synthetic finding raised when no code could be extracted from a response.
    Extraction,
}

impl CheckerKind {
    /// Stable symbolic name, also accepted in config and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Security => "security",
            Self::Type => "type",
            Self::DynamicBehavior => "dynamic-behavior",
            Self::Extraction => "extraction",
        }
    }

    /// Parse a user-supplied checker name. `dynamic` is accepted as a short alias.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "style" => Some(Self::Style),
            "security" => Some(Self::Security),
            "type" => Some(Self::Type),
            "dynamic" | "dynamic-behavior" => Some(Self::DynamicBehavior),
            _ => None,
        }
    }
}

impl fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity as reported by the underlying tool. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Position of a finding inside the analyzed script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// A single diagnostic finding.
///
/// The retry loop treats issues as opaque: only whether the list is empty matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub source: CheckerKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl Issue {
    pub fn new(source: CheckerKind, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
            location: None,
            severity: None,
        }
    }

    #[must_use]
    pub fn at(mut self, line: u32, column: Option<u32>) -> Self {
        self.location = Some(Location { line, column });
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.source)?;
        match self.location {
            Some(Location {
                line,
                column: Some(col),
            }) => write!(f, "line {}:{}: ", line, col)?,
            Some(Location { line, column: None }) => write!(f, "line {}: ", line)?,
            None => {}
        }
        f.write_str(&self.message)
    }
}
