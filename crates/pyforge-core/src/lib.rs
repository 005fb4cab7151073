//! Core types and configuration for pyforge.
//!
//! Provides the run data model ([`run::RunState`], [`run::Attempt`]), the
//! diagnostic finding type ([`issue::Issue`]), and TOML/env configuration.

pub mod config;
pub mod issue;
pub mod run;

pub use issue::{CheckerKind, Issue, Location, Severity};
pub use run::{Attempt, AttemptOutcome, RunState, RunStatus, TokenUsage};
