//! Core domain types
//!
//! These types describe a single run-script pipeline invocation and what the
//! run tool observes while driving it. Behaviour lives in the runner; this
//! module only holds the state and its invariants.

pub mod log;
pub mod run;
pub mod stage;
