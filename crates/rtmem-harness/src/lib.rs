//! Verification tooling for rtmem.
//!
//! This crate provides:
//! - Fixture verify: run JSON fixture sets against the renderer and the
//!   growable buffer engine
//! - Growth traces: capacity sequences for a list of growth targets
//! - Report generation: markdown and JSON verification reports

#![forbid(unsafe_code)]

pub mod args;
pub mod diff;
pub mod error;
pub mod fixtures;
pub mod grow_trace;
pub mod report;
pub mod runner;
pub mod verify;

pub use args::ArgValue;
pub use error::HarnessError;
pub use fixtures::{FixtureCase, FixtureSet};
pub use report::VerifyReport;
pub use runner::TestRunner;
pub use verify::{CaseOutcome, RunSummary, Tally};
