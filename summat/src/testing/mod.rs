//! Testing utilities for summat stages.
//!
//! This module provides:
//! - Recording stages that capture what they observed
//! - Assertions over run results

mod assertions;
mod mocks;

pub use assertions::{assert_current, assert_no_value, run_stage};
pub use mocks::{FailingStage, RecordingStage};
