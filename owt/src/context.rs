//! Process-wide state shared by every dispatched call.

use crate::auth::BasicAuth;
use crate::cache::ResponseCache;
use crate::config::OwtConfig;
use crate::errors::OwtError;
use crate::loader::CodeLoader;
use crate::request::Credentials;
use crate::runner::{BlockingRunner, HandlerRunner};
use std::sync::Arc;

/// Everything a dispatcher needs, built once at startup.
///
/// Cloning shares the cache, so clones see each other's entries.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    config: OwtConfig,
    cache: Arc<ResponseCache>,
    loader: Arc<dyn CodeLoader>,
    runner: Arc<dyn HandlerRunner>,
    auth: Option<BasicAuth>,
}

impl RuntimeContext {
    /// Creates a context with default configuration, an empty cache, no
    /// authentication and a [`BlockingRunner`].
    #[must_use]
    pub fn new(loader: Arc<dyn CodeLoader>) -> Self {
        Self {
            config: OwtConfig::default(),
            cache: Arc::new(ResponseCache::new()),
            loader,
            runner: Arc::new(BlockingRunner),
            auth: None,
        }
    }

    /// Creates a context from configuration, including its auth setting.
    pub fn from_config(config: OwtConfig, loader: Arc<dyn CodeLoader>) -> Result<Self, OwtError> {
        let auth = config.basic_auth()?;
        Ok(Self {
            config,
            auth,
            ..Self::new(loader)
        })
    }

    /// Replaces the cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn HandlerRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Requires basic auth on every call.
    #[must_use]
    pub fn with_auth(mut self, auth: BasicAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OwtConfig {
        &self.config
    }

    /// Returns the response cache.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Returns the code loader.
    #[must_use]
    pub fn loader(&self) -> &dyn CodeLoader {
        &*self.loader
    }

    /// Returns the handler runner.
    #[must_use]
    pub fn runner(&self) -> &dyn HandlerRunner {
        &*self.runner
    }

    /// Checks credentials when authentication is configured.
    pub fn authorize(&self, credentials: Option<&Credentials>) -> Result<(), OwtError> {
        let Some(auth) = &self.auth else {
            return Ok(());
        };
        match credentials {
            Some(c) if auth.authenticate(&c.username, &c.password) => Ok(()),
            _ => Err(OwtError::Unauthorized),
        }
    }
}
