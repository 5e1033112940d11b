//! Pipeline building and execution.
//!
//! This module provides:
//! - A typed, fluent pipeline builder
//! - Compiled pipelines that run as a single stage

mod builder;
mod compiled;
mod integration_tests;

pub use builder::{pipe, PipelineBuilder, Unset};
pub use compiled::Pipeline;
