//! Cache keys and the per-process response cache.
//!
//! The cache grows for the lifetime of the process. There is no eviction and
//! no freshness check: a stored response is returned unchanged on every hit.

use crate::request::UnsafeRequest;
use crate::response::Response;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of a cached response: an endpoint path plus optional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Endpoint path.
    pub path: String,
    /// Encoded arguments, when the key distinguishes calls by arguments.
    #[serde(default)]
    pub kwargs_b64: Option<String>,
}

impl CacheKey {
    /// Creates a key for an endpoint regardless of arguments.
    #[must_use]
    pub fn endpoint(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kwargs_b64: None,
        }
    }

    /// Creates a key for an endpoint and encoded arguments.
    #[must_use]
    pub fn with_arguments(path: impl Into<String>, kwargs_b64: Option<String>) -> Self {
        Self {
            path: path.into(),
            kwargs_b64: kwargs_b64.filter(|k| !k.is_empty()),
        }
    }

    /// Short digest of the encoded arguments, for logging.
    #[must_use]
    pub fn fingerprint(&self) -> Option<String> {
        self.kwargs_b64.as_ref().map(|kwargs| {
            let digest = hex::encode(Sha256::digest(kwargs.as_bytes()));
            digest[..12].to_string()
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fingerprint() {
            Some(fingerprint) => write!(f, "CacheKey({}, {fingerprint})", self.path),
            None => write!(f, "CacheKey({})", self.path),
        }
    }
}

/// How a call's cache key is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    /// Never read or write the cache.
    Bypass,
    /// Key on the endpoint path only.
    Endpoint,
    /// Key on the endpoint path and the encoded arguments.
    EndpointWithArguments,
    /// Use a caller-supplied key.
    Override(CacheKey),
}

impl CachePolicy {
    /// Derives the policy from a request's cache-control flags.
    ///
    /// An override key wins over `cache_kwargs` whenever caching is enabled.
    #[must_use]
    pub fn from_request(request: &UnsafeRequest) -> Self {
        if !request.use_cache {
            return Self::Bypass;
        }
        match (&request.cache_key_override, request.cache_kwargs) {
            (Some(key), _) => Self::Override(key.clone()),
            (None, false) => Self::Endpoint,
            (None, true) => Self::EndpointWithArguments,
        }
    }

    /// Derives the key for a call, or `None` when bypassing.
    #[must_use]
    pub fn key(&self, path: &str, kwargs_b64: Option<&str>) -> Option<CacheKey> {
        match self {
            Self::Bypass => None,
            Self::Endpoint => Some(CacheKey::endpoint(path)),
            Self::EndpointWithArguments => Some(CacheKey::with_arguments(
                path,
                kwargs_b64.map(str::to_string),
            )),
            Self::Override(key) => Some(key.clone()),
        }
    }
}

/// A stored response and when it was stored.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// The response returned on every hit.
    pub response: Response,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

/// Concurrent map from cache key to response.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, CachedResponse>,
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the response stored under `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Response> {
        self.entries.get(key).map(|entry| entry.response.clone())
    }

    /// Returns the full entry stored under `key`.
    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Stores `response` unless the key is already present.
    ///
    /// Returns whichever response ends up stored. When two calls miss on the
    /// same key concurrently, the first to store wins and the second gets the
    /// winner back.
    pub fn store(&self, key: CacheKey, response: Response) -> Response {
        self.entries
            .entry(key)
            .or_insert_with(|| CachedResponse {
                response,
                stored_at: Utc::now(),
            })
            .response
            .clone()
    }

    /// Returns true if `key` has an entry.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the stored keys.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(use_cache: bool, cache_kwargs: bool, key: Option<CacheKey>) -> UnsafeRequest {
        let mut request = UnsafeRequest::new("code")
            .with_cache(use_cache)
            .with_cache_kwargs(cache_kwargs);
        request.cache_key_override = key;
        request
    }

    #[test]
    fn test_policy_from_request() {
        assert_eq!(CachePolicy::from_request(&request(false, true, None)), CachePolicy::Bypass);
        assert_eq!(CachePolicy::from_request(&request(true, false, None)), CachePolicy::Endpoint);
        assert_eq!(
            CachePolicy::from_request(&request(true, true, None)),
            CachePolicy::EndpointWithArguments
        );

        let key = CacheKey::endpoint("/shared");
        assert_eq!(
            CachePolicy::from_request(&request(true, true, Some(key.clone()))),
            CachePolicy::Override(key)
        );
    }

    #[test]
    fn test_override_ignored_without_cache() {
        let policy = CachePolicy::from_request(&request(false, false, Some(CacheKey::endpoint("/k"))));
        assert_eq!(policy, CachePolicy::Bypass);
        assert_eq!(policy.key("/x", Some("abc")), None);
    }

    #[test]
    fn test_policy_keys() {
        assert_eq!(CachePolicy::Endpoint.key("/x", Some("abc")), Some(CacheKey::endpoint("/x")));
        assert_eq!(
            CachePolicy::EndpointWithArguments.key("/x", Some("abc")),
            Some(CacheKey::with_arguments("/x", Some("abc".to_string())))
        );
        assert_eq!(
            CachePolicy::EndpointWithArguments.key("/x", None),
            Some(CacheKey::endpoint("/x"))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(CacheKey::endpoint("/x").to_string(), "CacheKey(/x)");

        let key = CacheKey::with_arguments("/x", Some("e30=".to_string()));
        let shown = key.to_string();
        assert!(shown.starts_with("CacheKey(/x, "));
        assert_eq!(key.fingerprint().unwrap().len(), 12);
    }

    #[test]
    fn test_key_deserializes_without_arguments() {
        let key: CacheKey = serde_json::from_str(r#"{"path": "/x"}"#).unwrap();
        assert_eq!(key, CacheKey::endpoint("/x"));
    }

    #[test]
    fn test_first_store_wins() {
        let cache = ResponseCache::new();
        let key = CacheKey::endpoint("/x");

        let first = cache.store(key.clone(), Response::text("R1"));
        let second = cache.store(key.clone(), Response::text("R2"));

        assert_eq!(first, Response::text("R1"));
        assert_eq!(second, Response::text("R1"));
        assert_eq!(cache.get(&key), Some(Response::text("R1")));
        assert_eq!(cache.len(), 1);
        assert!(cache.entry(&key).unwrap().stored_at <= Utc::now());
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::new();
        cache.store(CacheKey::endpoint("/a"), Response::text("a"));
        assert!(cache.contains(&CacheKey::endpoint("/a")));

        cache.clear();
        assert!(cache.is_empty());
    }
}
