//! Scenario-based tests for ci-orchestrator

mod helpers;

mod cancellation;
mod rust_ci;
mod scheduling;
