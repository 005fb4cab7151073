//! Builds the checker list from configuration.

use crate::aggregate::DiagnosticAggregator;
use crate::bandit::BanditChecker;
use crate::checker::Checker;
use crate::dynamic::DynamicChecker;
use crate::mypy::MypyChecker;
use crate::pylint::PylintChecker;
use pyforge_core::CheckerKind;
use pyforge_core::config::CheckersConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Instantiate one checker per kind, in the given order.
///
/// `fixtures` are handed to the dynamic checker so the script can open the
/// user's attachments by file name.
pub fn build_checkers(
    config: &CheckersConfig,
    kinds: &[CheckerKind],
    fixtures: &[PathBuf],
) -> Vec<Box<dyn Checker>> {
    let tool_timeout = Duration::from_secs(config.tool_timeout_secs);
    kinds
        .iter()
        .filter_map(|kind| -> Option<Box<dyn Checker>> {
            match kind {
                CheckerKind::Style => {
                    Some(Box::new(PylintChecker::new(&config.pylint, tool_timeout)))
                }
                CheckerKind::Security => {
                    Some(Box::new(BanditChecker::new(&config.bandit, tool_timeout)))
                }
                CheckerKind::Type => Some(Box::new(MypyChecker::new(&config.mypy, tool_timeout))),
                CheckerKind::DynamicBehavior => Some(Box::new(
                    DynamicChecker::new(
                        &config.python,
                        Duration::from_secs(config.dynamic_timeout_secs),
                    )
                    .with_fixtures(fixtures.to_vec()),
                )),
                // produced by the controller, never by a checker
                CheckerKind::Extraction => None,
            }
        })
        .collect()
}

/// Aggregator over `kinds`, honoring the configured parallelism.
pub fn build_aggregator(
    config: &CheckersConfig,
    kinds: &[CheckerKind],
    fixtures: &[PathBuf],
) -> DiagnosticAggregator {
    DiagnosticAggregator::new(build_checkers(config, kinds, fixtures)).parallel(config.parallel)
}
