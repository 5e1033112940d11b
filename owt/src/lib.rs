//! # Owt
//!
//! Dispatches calls to summat handler stages, with an optional per-endpoint
//! response cache in front.
//!
//! Owt provides:
//!
//! - **Request adapting**: decoding a call's payload into an environment
//! - **Code loading**: resolving handler code to pre-built stages
//! - **Response coercion**: text, bytes, explicit status, chunked or JSON
//! - **Caching**: first-writer-wins responses keyed by endpoint and arguments
//! - **Dispatching**: the async state machine tying these together
//!
//! Serving HTTP is left to the host: it turns each request into an
//! [`InboundCall`] and writes back the [`Response`].
//!
//! ## Quick Start
//!
//! ```rust
//! use owt::prelude::*;
//! use std::sync::Arc;
//! use summat::prelude::*;
//!
//! # block_on(async {
//! let hello = PipelineBuilder::<Bindings>::new("hello")
//!     .lift_kw(|kwargs: Bindings| {
//!         let name = kwargs.get("name").and_then(|v| v.as_str()).unwrap_or("World");
//!         format!("Hello, {name}!")
//!     })
//!     .build()
//!     .unwrap();
//!
//! let loader = RegistryLoader::new().with_entry_point("run", Arc::new(hello));
//! let dispatcher = Dispatcher::new(RuntimeContext::new(Arc::new(loader)));
//!
//! let request = UnsafeRequest::new("handler source");
//! let call = InboundCall::new("/hello").with_body(request.to_json().unwrap());
//!
//! let response = dispatcher.dispatch(&call).await;
//! assert_eq!(response, Response::text("Hello, World!"));
//! # });
//! # fn block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
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

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod loader;
pub mod observability;
pub mod request;
pub mod response;
pub mod runner;

pub use auth::BasicAuth;
pub use cache::{CacheKey, CachePolicy, CachedResponse, ResponseCache};
pub use config::OwtConfig;
pub use context::RuntimeContext;
pub use dispatch::Dispatcher;
pub use errors::OwtError;
pub use loader::{CodeLoader, RegistryLoader};
pub use request::{Credentials, DecodedCall, InboundCall, UnsafeRequest};
pub use response::{Body, Response};
pub use runner::{BlockingRunner, HandlerRunner, InlineRunner, TimeoutRunner};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::BasicAuth;
    pub use crate::cache::{CacheKey, CachePolicy, ResponseCache};
    pub use crate::config::OwtConfig;
    pub use crate::context::RuntimeContext;
    pub use crate::dispatch::Dispatcher;
    pub use crate::errors::OwtError;
    pub use crate::loader::{CodeLoader, RegistryLoader};
    pub use crate::request::{Credentials, InboundCall, UnsafeRequest};
    pub use crate::response::{Body, Response};
    pub use crate::runner::{BlockingRunner, HandlerRunner, InlineRunner};
}
