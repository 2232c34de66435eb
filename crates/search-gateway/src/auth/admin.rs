//! Static administrative credential checked against `Authorization: Basic`
//!
//! The stored secret is `<salt>$<hex sha256(salt || password)>`. A request
//! presenting the right username and password skips token verification and
//! tenant scoping entirely.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use super::error::{AuthError, Result};

const SHA256_LEN: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredential {
    username: String,
    salt: String,
    digest: [u8; SHA256_LEN],
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential")
            .field("username", &self.username)
            .field("digest", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl AdminCredential {
    /// Build from a username and a stored `salt$hexdigest` string
    pub fn new(username: impl Into<String>, password_hash: &str) -> Result<Self> {
        let username = username.into();
        if username.is_empty() {
            return Err(AuthError::Config("admin username must not be empty".into()));
        }

        let (salt, hex_digest) = password_hash
            .split_once('$')
            .ok_or_else(|| AuthError::Config("admin password hash must be salt$hex".into()))?;
        let bytes = hex::decode(hex_digest.trim())
            .map_err(|e| AuthError::Config(format!("admin password hash is not hex: {e}")))?;
        let digest: [u8; SHA256_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            AuthError::Config(format!(
                "admin password hash must be {SHA256_LEN} bytes, got {}",
                b.len()
            ))
        })?;

        Ok(Self {
            username,
            salt: salt.to_string(),
            digest,
        })
    }

    /// Build from a plaintext password, hashing it with `salt`
    #[must_use]
    pub fn from_password(username: impl Into<String>, salt: &str, password: &str) -> Self {
        Self {
            username: username.into(),
            salt: salt.to_string(),
            digest: digest(salt, password),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(&digest(&self.salt, password), &self.digest);
        user_ok & pass_ok
    }

    /// Check a raw `Authorization` header value. Anything that is not a
    /// well-formed Basic credential matching this admin is `false`.
    #[must_use]
    pub fn verify_basic_header(&self, header: &str) -> bool {
        parse_basic(header).is_some_and(|(user, pass)| self.verify(&user, &pass))
    }
}

/// Whether a raw `Authorization` value uses the Basic scheme
#[must_use]
pub fn is_basic(header: &str) -> bool {
    header
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic "))
}

/// Decode `Basic base64(user:password)`
#[must_use]
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    if !is_basic(header) {
        return None;
    }
    let decoded = STANDARD.decode(header[6..].trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Produce a `salt$hexdigest` string suitable for `admin_password_hash`
#[must_use]
pub fn hash_password(salt: &str, password: &str) -> String {
    format!("{salt}${}", hex::encode(digest(salt, password)))
}

fn digest(salt: &str, password: &str) -> [u8; SHA256_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (left, right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}
