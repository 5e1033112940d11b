//! Basic authentication against SHA-256 password digests.

use crate::errors::OwtError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Username and password of the built-in default user.
pub const DEFAULT_USER: &str = "owt";

/// A raw SHA-256 digest.
pub type PasswordDigest = [u8; 32];

/// Returns the lowercase hex SHA-256 digest of `text`.
#[must_use]
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Parses a hex SHA-256 digest. Exactly 64 hex digits, either case.
pub fn parse_digest(hex_digest: &str) -> Result<PasswordDigest, OwtError> {
    let mut digest = [0_u8; 32];
    hex::decode_to_slice(hex_digest, &mut digest).map_err(|e| {
        OwtError::Config(format!("password digest must be 64 hex digits: {e}"))
    })?;
    Ok(digest)
}

/// Compares two digests without short-circuiting on the first difference.
fn digests_match(a: &PasswordDigest, b: &PasswordDigest) -> bool {
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// A table of usernames and their password digests.
///
/// Plaintext passwords are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicAuth {
    users: HashMap<String, PasswordDigest>,
}

impl BasicAuth {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an optional `username:password_sha256` credential.
    ///
    /// `None` or an empty string means authentication is disabled.
    pub fn maybe_single_user(credential: Option<&str>) -> Result<Option<Self>, OwtError> {
        let Some(credential) = credential.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match credential.split_once(':') {
            Some((user, digest)) if !user.is_empty() => {
                Self::new().with_user(user, digest).map(Some)
            }
            _ => Err(OwtError::Config(
                "expected auth as username:password_sha256".to_string(),
            )),
        }
    }

    /// Adds a user with a hex SHA-256 password digest.
    pub fn with_user(
        self,
        username: impl Into<String>,
        password_sha256: &str,
    ) -> Result<Self, OwtError> {
        Ok(self.with_digest(username, parse_digest(password_sha256)?))
    }

    /// Adds a user with a raw SHA-256 password digest.
    #[must_use]
    pub fn with_digest(mut self, username: impl Into<String>, digest: PasswordDigest) -> Self {
        self.users.insert(username.into(), digest);
        self
    }

    /// Adds the `owt:owt` user.
    #[must_use]
    pub fn with_default_user(self) -> Self {
        self.with_digest(DEFAULT_USER, Sha256::digest(DEFAULT_USER.as_bytes()).into())
    }

    /// Checks a plaintext password against the stored digest.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        let Some(expected) = self.users.get(username) else {
            tracing::warn!(username, "User not known to auth");
            return false;
        };
        let actual: PasswordDigest = Sha256::digest(password.as_bytes()).into();
        let matched = digests_match(expected, &actual);
        if !matched {
            tracing::warn!(username, "Password digest mismatch");
        }
        matched
    }

    /// Returns the number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if no users are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
