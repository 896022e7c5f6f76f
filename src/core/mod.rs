//! Core domain models for the orchestrator
//!
//! This module defines the pipeline definition, job and step descriptors,
//! environment resolution and the results a run produces.

pub mod config;
pub mod environment;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod result;
pub mod trigger;

pub use environment::*;
pub use error::*;
pub use job::*;
pub use pipeline::*;
pub use result::*;
pub use trigger::*;
