//! Runs the registered checkers and merges their findings.

use crate::checker::Checker;
use pyforge_core::{Issue, Severity};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Ordered set of checkers applied to every candidate script.
///
/// `evaluate` never fails: a checker that errors or panics contributes
/// exactly one synthetic issue describing the failure.
pub struct DiagnosticAggregator {
    checkers: Vec<Box<dyn Checker>>,
    parallel: bool,
}

impl DiagnosticAggregator {
    pub fn new(checkers: Vec<Box<dyn Checker>>) -> Self {
        Self {
            checkers,
            parallel: false,
        }
    }

    /// Run checkers concurrently on the rayon pool. Output order is unchanged.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.checkers.iter().map(|c| c.name()).collect()
    }

    /// All findings for `code`, grouped by checker in registration order.
    pub fn evaluate(&self, code: &str) -> Vec<Issue> {
        let start = Instant::now();
        let per_checker: Vec<Vec<Issue>> = if self.parallel && self.checkers.len() > 1 {
            self.checkers
                .par_iter()
                .map(|c| run_checker(c.as_ref(), code))
                .collect()
        } else {
            self.checkers
                .iter()
                .map(|c| run_checker(c.as_ref(), code))
                .collect()
        };

        let issues: Vec<Issue> = per_checker.into_iter().flatten().collect();
        tracing::debug!(
            checkers = self.checkers.len(),
            issues = issues.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "aggregation complete"
        );
        issues
    }
}

fn run_checker(checker: &dyn Checker, code: &str) -> Vec<Issue> {
    match panic::catch_unwind(AssertUnwindSafe(|| checker.check(code))) {
        Ok(Ok(issues)) => issues,
        Ok(Err(err)) => {
            tracing::warn!(checker = checker.name(), error = %err, "checker failed, reporting as issue");
            vec![Issue::new(checker.kind(), err.to_string()).with_severity(Severity::Error)]
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::warn!(checker = checker.name(), %reason, "checker panicked, reporting as issue");
            vec![
                Issue::new(
                    checker.kind(),
                    format!("{} crashed: {}", checker.name(), reason),
                )
                .with_severity(Severity::Error),
            ]
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
