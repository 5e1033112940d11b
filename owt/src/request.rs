//! Adapting inbound calls into handler requests and environments.
//!
//! A call carries an [`UnsafeRequest`] either as a JSON body or, failing
//! that, as query parameters. Its `kwargs_b64` field is base64 of a JSON
//! object; the decoded object becomes the call's bindings together with the
//! `path` and `query` of the call.

use crate::cache::CacheKey;
use crate::errors::OwtError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use summat::combinators::{PATH_KEY, QUERY_KEY};
use summat::{Bindings, Environment};

/// Entry point used when a request names none.
pub const DEFAULT_ENTRY_POINT: &str = "run";

fn default_fn_name() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

/// A request to run caller-supplied handler code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsafeRequest {
    /// Base64 of the handler program text.
    pub code_b64: String,
    /// Entry point to resolve in the program.
    #[serde(default = "default_fn_name")]
    pub fn_name: String,
    /// Base64 of a JSON object of keyword arguments.
    #[serde(default)]
    pub kwargs_b64: Option<String>,
    /// Whether to cache the response.
    #[serde(default)]
    pub use_cache: bool,
    /// Whether the cache key includes the arguments.
    #[serde(default)]
    pub cache_kwargs: bool,
    /// Explicit cache key, used whenever caching is on.
    #[serde(default)]
    pub cache_key_override: Option<CacheKey>,
}

impl UnsafeRequest {
    /// Creates a request for `code` with default settings.
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self {
            code_b64: STANDARD.encode(code),
            fn_name: default_fn_name(),
            kwargs_b64: None,
            use_cache: false,
            cache_kwargs: false,
            cache_key_override: None,
        }
    }

    /// Sets the entry point.
    #[must_use]
    pub fn with_fn_name(mut self, fn_name: impl Into<String>) -> Self {
        self.fn_name = fn_name.into();
        self
    }

    /// Encodes keyword arguments into `kwargs_b64`.
    #[must_use]
    pub fn with_kwargs(mut self, kwargs: &serde_json::Map<String, serde_json::Value>) -> Self {
        let json = serde_json::Value::Object(kwargs.clone()).to_string();
        self.kwargs_b64 = Some(STANDARD.encode(json));
        self
    }

    /// Enables or disables caching.
    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Includes the arguments in the cache key.
    #[must_use]
    pub fn with_cache_kwargs(mut self, cache_kwargs: bool) -> Self {
        self.cache_kwargs = cache_kwargs;
        self
    }

    /// Sets an explicit cache key.
    #[must_use]
    pub fn with_cache_key_override(mut self, key: CacheKey) -> Self {
        self.cache_key_override = Some(key);
        self
    }

    /// Parses a request from a JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self, OwtError> {
        serde_json::from_slice(body)
            .map_err(|e| OwtError::decode(format!("failed to parse request from JSON: {e}")))
    }

    /// Parses a request from query parameters.
    ///
    /// Flags accept `true`/`false`/`1`/`0`; `cache_key_override` is JSON.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, OwtError> {
        let code_b64 = params
            .get("code_b64")
            .cloned()
            .ok_or_else(|| OwtError::decode("missing 'code_b64' parameter"))?;
        let cache_key_override = params
            .get("cache_key_override")
            .map(|raw| {
                serde_json::from_str(raw)
                    .map_err(|e| OwtError::decode(format!("invalid 'cache_key_override': {e}")))
            })
            .transpose()?;

        Ok(Self {
            code_b64,
            fn_name: params.get("fn_name").cloned().unwrap_or_else(default_fn_name),
            kwargs_b64: params.get("kwargs_b64").cloned(),
            use_cache: parse_flag(params, "use_cache")?,
            cache_kwargs: parse_flag(params, "cache_kwargs")?,
            cache_key_override,
        })
    }

    /// Parses a request from a call, preferring the body over the query.
    ///
    /// When a non-empty body and the query both fail, the error names both
    /// causes.
    pub fn from_call(call: &InboundCall) -> Result<Self, OwtError> {
        if call.body.is_empty() {
            return Self::from_query(&call.query);
        }
        let body_err = match Self::from_json(&call.body) {
            Ok(request) => return Ok(request),
            Err(e) => e,
        };
        tracing::debug!(path = %call.path, error = %body_err, "Body is not a request, trying query");
        Self::from_query(&call.query).map_err(|query_err| {
            OwtError::decode(format!(
                "body: {}; query: {}",
                decode_message(body_err),
                decode_message(query_err)
            ))
        })
    }

    /// Serializes the request as a JSON body.
    pub fn to_json(&self) -> Result<Vec<u8>, OwtError> {
        serde_json::to_vec(self).map_err(OwtError::decode)
    }

    /// Decodes the program text.
    pub fn code(&self) -> Result<String, OwtError> {
        let bytes = STANDARD
            .decode(self.code_b64.trim())
            .map_err(|e| OwtError::decode(format!("invalid base64 in 'code_b64': {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| OwtError::decode(format!("'code_b64' is not UTF-8: {e}")))
    }

    /// Decodes the keyword arguments; absent arguments decode to none.
    pub fn kwargs(&self) -> Result<Bindings, OwtError> {
        let Some(encoded) = self.kwargs_b64.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(Bindings::new());
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| OwtError::decode(format!("invalid base64 in 'kwargs_b64': {e}")))?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| OwtError::decode(format!("failed to decode kwargs: {e}")))?;

        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(OwtError::decode(format!(
                "kwargs must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn parse_flag(params: &HashMap<String, String>, name: &str) -> Result<bool, OwtError> {
    match params.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v.is_empty() || v == "false" || v == "0" => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) => Err(OwtError::decode(format!("invalid '{name}' flag: {v}"))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Basic auth credentials presented with a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A call as handed over by the hosting transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundCall {
    /// Endpoint path; empty means `/`.
    pub path: String,
    /// Raw request body.
    pub body: Vec<u8>,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Credentials, if the caller sent any.
    pub credentials: Option<Credentials>,
}

impl InboundCall {
    /// Creates a call to `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: if path.is_empty() { "/".to_string() } else { path },
            ..Self::default()
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The query parameters as a JSON object.
    #[must_use]
    pub fn query_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.query
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

/// A fully decoded call, ready to dispatch.
#[derive(Debug, Clone)]
pub struct DecodedCall {
    /// The parsed request.
    pub request: UnsafeRequest,
    /// Decoded program text.
    pub code: String,
    /// Initial environment for the handler.
    pub environment: Environment,
}

impl DecodedCall {
    /// Decodes everything a call needs before any stage runs.
    ///
    /// The environment binds `path` and `query`, then the keyword arguments,
    /// which win on a name clash. An argument named `__last__` seeds the
    /// current value.
    pub fn decode(call: &InboundCall) -> Result<Self, OwtError> {
        let request = UnsafeRequest::from_call(call)?;
        let code = request.code()?;
        let kwargs = request.kwargs()?;

        let mut bindings = Bindings::new();
        bindings.insert(PATH_KEY.to_string(), serde_json::Value::String(call.path.clone()));
        bindings.insert(QUERY_KEY.to_string(), call.query_value());
        bindings.extend(kwargs);

        Ok(Self {
            request,
            code,
            environment: Environment::from_bindings(bindings),
        })
    }
}

fn decode_message(error: OwtError) -> String {
    match error {
        OwtError::Decode(message) => message,
        other => other.to_string(),
    }
}
