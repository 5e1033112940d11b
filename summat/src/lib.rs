//! # Summat
//!
//! Small composable stages threaded through a shared call environment.
//!
//! Summat provides:
//!
//! - **Call environments**: named bindings plus a distinguished current value
//! - **Signals**: the instruction a stage returns for updating the environment
//! - **Combinators**: constant, lift, exec, cond, fork, map/fold/index, reseed
//! - **Typed pipelines**: a fluent builder that composes stages into one
//!
//! ## Quick Start
//!
//! ```rust
//! use summat::prelude::*;
//!
//! let pipeline = PipelineBuilder::<Bindings>::new("add-one")
//!     .constant(5_i64)
//!     .lift(|x: i64| x + 1)
//!     .build()
//!     .unwrap();
//!
//! let value = pipeline.run(Environment::new()).unwrap();
//! assert_eq!(value, serde_json::json!(6));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod combinators;
pub mod environment;
pub mod errors;
pub mod pipeline;
pub mod signal;
pub mod stages;
pub mod testing;

pub use environment::{is_no_value, no_value, Bindings, Environment, CURRENT_KEY, NO_VALUE_KEY};
pub use errors::SummatError;
pub use signal::Signal;
pub use stages::{compose, evaluate, Compose, FnStage, Stage};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::combinators::{
        is_truthy, Bind, Cond, Const, Defaults, Exec, Foldl, Foldl1, Fork, Get, Identity,
        Index, Json, Lift, LiftMode, Map, PathSegments, Query, Reseed, Reset,
    };
    pub use crate::environment::{
        is_no_value, no_value, Bindings, Environment, CURRENT_KEY, NO_VALUE_KEY,
    };
    pub use crate::errors::SummatError;
    pub use crate::pipeline::{Pipeline, PipelineBuilder, Unset};
    pub use crate::signal::Signal;
    pub use crate::stages::{compose, evaluate, Compose, FnStage, Stage};
}
