//! Test assertions for stage results.

use crate::environment::Environment;
use crate::stages::Stage;

/// Runs a stage and applies its signal to the input environment.
///
/// Panics if the stage fails.
pub fn run_stage(stage: &dyn Stage, env: &Environment) -> Environment {
    match stage.call(env) {
        Ok(signal) => signal.apply(env.clone()),
        Err(e) => panic!("Stage '{}' failed: {e}", stage.name()),
    }
}

/// Asserts that the environment's current value equals `expected`.
pub fn assert_current(env: &Environment, expected: &serde_json::Value) {
    assert_eq!(
        env.try_current(),
        Some(expected),
        "Expected current value {:?}, got {:?}",
        expected,
        env.try_current()
    );
}

/// Asserts that the environment holds no current value.
pub fn assert_no_value(env: &Environment) {
    assert!(
        !env.has_current(),
        "Expected no current value, got {:?}",
        env.try_current()
    );
}
