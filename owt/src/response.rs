//! Turning a handler's final value into a wire response.
//!
//! Coercion rules, checked in order:
//!
//! | Final value | Response |
//! |---|---|
//! | `"text"` | text body, status 200 |
//! | `{"$status": n, "$body": body}` | `body` coerced (`null` if absent), status `n` |
//! | `{"$bytes": "<base64>"}` | raw bytes |
//! | `{"$chunks": [..]}` | chunked body, one chunk per element |
//! | anything else | JSON body |

use crate::errors::OwtError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::stream::{self, Stream};
use serde_json::Value;

/// Key marking a base64 byte payload.
pub const BYTES_KEY: &str = "$bytes";

/// Key marking a chunked payload.
pub const CHUNKS_KEY: &str = "$chunks";

/// Key carrying an explicit status. Must be in 100..=599.
pub const STATUS_KEY: &str = "$status";

/// Key carrying the body next to [`STATUS_KEY`].
pub const BODY_KEY: &str = "$body";

/// Response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A sequence of chunks to stream in order.
    Chunks(Vec<Vec<u8>>),
    /// A JSON document.
    Json(Value),
}

impl Body {
    /// Content type a transport should advertise.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text/plain; charset=utf-8",
            Self::Bytes(_) | Self::Chunks(_) => "application/octet-stream",
            Self::Json(_) => "application/json",
        }
    }

    /// The full body as bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Bytes(bytes) => bytes.clone(),
            Self::Chunks(chunks) => chunks.concat(),
            Self::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// A status and body ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    body: Body,
    failed: bool,
}

impl Response {
    /// Creates a successful response.
    #[must_use]
    pub fn new(status: u16, body: Body) -> Self {
        Self {
            status,
            body,
            failed: false,
        }
    }

    /// Creates a 200 text response.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(200, Body::Text(text.into()))
    }

    /// Creates a failure response carrying the error as a JSON body.
    #[must_use]
    pub fn failure(error: &OwtError) -> Self {
        let body = serde_json::to_value(error.to_dict()).unwrap_or(Value::Null);
        Self {
            status: error.status(),
            body: Body::Json(body),
            failed: true,
        }
    }

    /// Coerces a handler's final value.
    ///
    /// Only an object tagged with [`STATUS_KEY`] sets the status; arrays
    /// of any shape are JSON bodies.
    pub fn from_value(value: Value) -> Result<Self, OwtError> {
        match value {
            Value::Object(mut map) if is_status_marker(&map) => {
                let status = map.remove(STATUS_KEY).unwrap_or(Value::Null);
                let status = status_code(&status).ok_or_else(|| {
                    OwtError::Coerce(format!(
                        "'{STATUS_KEY}' must be an integer in 100..=599, got {status}"
                    ))
                })?;
                let body = map.remove(BODY_KEY).unwrap_or(Value::Null);
                Ok(Self::new(status, coerce_body(body)?))
            }
            other => Ok(Self::new(200, coerce_body(other)?)),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Returns true if the dispatcher produced this response for an error.
    ///
    /// A handler that returns an explicit error status is not a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.failed
    }

    /// Streams the body, one item per chunk.
    ///
    /// Non-chunked bodies stream as a single item.
    pub fn into_stream(self) -> impl Stream<Item = Vec<u8>> {
        let chunks = match self.body {
            Body::Chunks(chunks) => chunks,
            other => vec![other.to_bytes()],
        };
        stream::iter(chunks)
    }
}

fn is_status_marker(map: &serde_json::Map<String, Value>) -> bool {
    map.contains_key(STATUS_KEY) && map.keys().all(|k| k == STATUS_KEY || k == BODY_KEY)
}

fn status_code(value: &Value) -> Option<u16> {
    value
        .as_u64()
        .and_then(|n| u16::try_from(n).ok())
        .filter(|n| (100..=599).contains(n))
}

fn marker<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.get(key))
}

fn decode_bytes(encoded: &Value) -> Result<Vec<u8>, OwtError> {
    let encoded = encoded
        .as_str()
        .ok_or_else(|| OwtError::Coerce(format!("'{BYTES_KEY}' must be a base64 string")))?;
    STANDARD
        .decode(encoded)
        .map_err(|e| OwtError::Coerce(format!("invalid base64 in '{BYTES_KEY}': {e}")))
}

fn chunk_bytes(value: Value) -> Result<Vec<u8>, OwtError> {
    if let Some(encoded) = marker(&value, BYTES_KEY) {
        return decode_bytes(encoded);
    }
    Ok(match value {
        Value::String(text) => text.into_bytes(),
        other => other.to_string().into_bytes(),
    })
}

fn coerce_body(value: Value) -> Result<Body, OwtError> {
    if let Some(encoded) = marker(&value, BYTES_KEY) {
        return decode_bytes(encoded).map(Body::Bytes);
    }
    if let Some(chunks) = marker(&value, CHUNKS_KEY) {
        let Value::Array(items) = chunks else {
            return Err(OwtError::Coerce(format!("'{CHUNKS_KEY}' must be an array")));
        };
        let chunks = items
            .iter()
            .cloned()
            .map(chunk_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Body::Chunks(chunks));
    }
    Ok(match value {
        Value::String(text) => Body::Text(text),
        other => Body::Json(other),
    })
}
