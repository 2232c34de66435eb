//! Verified token claims

use serde_json::{Map, Value};

use super::error::{AuthError, Result};

/// Claims of a token whose signature has been checked.
///
/// `iss`, `email` and `exp` are required; every other claim is kept in
/// [`VerifiedClaims::claims`] untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    pub issuer: String,
    /// Principal identity used for tenant resolution
    pub email: String,
    pub subject: Option<String>,
    pub expires_at: i64,
    pub not_before: Option<i64>,
    pub claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// Extract the required claims from a payload whose signature has
    /// already been verified.
    pub fn from_payload(claims: Map<String, Value>) -> Result<Self> {
        let issuer = string_claim(&claims, "iss")?;
        let email = string_claim(&claims, "email")?;
        let expires_at = numeric_claim(&claims, "exp")?.ok_or(AuthError::MissingClaim("exp"))?;
        let not_before = numeric_claim(&claims, "nbf")?;
        let subject = claims.get("sub").and_then(Value::as_str).map(str::to_owned);

        Ok(Self {
            issuer,
            email,
            subject,
            expires_at,
            not_before,
            claims,
        })
    }

    /// Check `exp` and `nbf` against `now` (seconds since epoch).
    pub const fn validate_times(&self, now: i64, leeway: i64) -> Result<()> {
        if self.expires_at.saturating_add(leeway) < now {
            return Err(AuthError::TokenExpired);
        }
        if let Some(nbf) = self.not_before
            && nbf.saturating_sub(leeway) > now
        {
            return Err(AuthError::TokenNotYetValid);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

/// Read `iss` from a payload that has not been verified yet. Only used to
/// pick the verification key.
pub fn unverified_issuer(payload: &Map<String, Value>) -> Result<&str> {
    payload
        .get("iss")
        .and_then(Value::as_str)
        .ok_or(AuthError::MissingClaim("iss"))
}

fn string_claim(claims: &Map<String, Value>, name: &'static str) -> Result<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(AuthError::MissingClaim(name))
}

fn numeric_claim(claims: &Map<String, Value>, name: &'static str) -> Result<Option<i64>> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            // fractional timestamps are truncated
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or(AuthError::MalformedToken("time claim is not a number")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_from_payload() {
        let claims = VerifiedClaims::from_payload(payload(json!({
            "iss": "https://grafana.example.com",
            "email": "alice@acme.test",
            "sub": "user:1",
            "exp": 2_000_000_000,
            "namespace": "default"
        })))
        .unwrap();

        assert_eq!(claims.issuer, "https://grafana.example.com");
        assert_eq!(claims.email, "alice@acme.test");
        assert_eq!(claims.subject.as_deref(), Some("user:1"));
        assert_eq!(claims.expires_at, 2_000_000_000);
        assert_eq!(claims.get("namespace"), Some(&json!("default")));
    }

    #[test]
    fn test_missing_email() {
        let result = VerifiedClaims::from_payload(payload(json!({
            "iss": "https://grafana.example.com",
            "exp": 2_000_000_000
        })));
        assert!(matches!(result, Err(AuthError::MissingClaim("email"))));
    }

    #[test]
    fn test_non_string_email() {
        let result = VerifiedClaims::from_payload(payload(json!({
            "iss": "https://grafana.example.com",
            "email": 42,
            "exp": 2_000_000_000
        })));
        assert!(matches!(result, Err(AuthError::MissingClaim("email"))));
    }

    #[test]
    fn test_missing_exp() {
        let result = VerifiedClaims::from_payload(payload(json!({
            "iss": "https://grafana.example.com",
            "email": "alice@acme.test"
        })));
        assert!(matches!(result, Err(AuthError::MissingClaim("exp"))));
    }

    #[test]
    fn test_string_exp_is_malformed() {
        let result = VerifiedClaims::from_payload(payload(json!({
            "iss": "i",
            "email": "e",
            "exp": "tomorrow"
        })));
        assert!(matches!(result, Err(AuthError::MalformedToken(_))));
    }

    #[test]
    fn test_validate_times() {
        let claims = VerifiedClaims::from_payload(payload(json!({
            "iss": "i",
            "email": "e",
            "exp": 1000,
            "nbf": 900
        })))
        .unwrap();

        assert!(claims.validate_times(950, 0).is_ok());
        assert!(claims.validate_times(1000, 0).is_ok());
        assert!(matches!(
            claims.validate_times(1001, 0),
            Err(AuthError::TokenExpired)
        ));
        assert!(claims.validate_times(1001, 5).is_ok());
        assert!(matches!(
            claims.validate_times(899, 0),
            Err(AuthError::TokenNotYetValid)
        ));
        assert!(claims.validate_times(899, 1).is_ok());
    }

    #[test]
    fn test_unverified_issuer() {
        let p = payload(json!({"iss": "https://idp"}));
        assert_eq!(unverified_issuer(&p).unwrap(), "https://idp");
        assert!(unverified_issuer(&payload(json!({}))).is_err());
    }
}
