//! Python analysis checkers for pyforge.
//!
//! Each checker wraps one external tool (pylint, bandit, mypy, the Python
//! interpreter itself) behind the [`Checker`] trait. The
//! [`DiagnosticAggregator`] runs an ordered list of them and turns checker
//! failures into ordinary issues, so analysis never aborts a run.

pub mod aggregate;
pub mod bandit;
pub mod checker;
pub mod dynamic;
pub mod mypy;
pub mod process;
pub mod pylint;
pub mod registry;

pub use aggregate::DiagnosticAggregator;
pub use checker::{Checker, CheckerError};
pub use registry::{build_aggregator, build_checkers};
