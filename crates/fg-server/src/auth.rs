// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bearer-token verification.
//!
//! The reference verifier checks HS256 signatures with `jsonwebtoken`.
//! JWKS-backed deployments implement [`TokenVerifier`] over their key
//! cache; the middleware only sees the trait.

use fg_error::GatewayError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Claims the gateway consumes.  Everything else lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id.
    pub sub: String,
    /// Tenant id.  MUST come from the verified token, never a header.
    #[serde(default)]
    pub tenant_id: String,
    /// Subject email.
    #[serde(default)]
    pub email: Option<String>,
    /// Ordered roles.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Remaining claims, verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Verifies a bearer token into [`Claims`].
pub trait TokenVerifier: Send + Sync {
    /// Verify the raw (non-prefixed) token.
    fn verify(&self, token: &str) -> Result<Claims, GatewayError>;
}

/// HS256 reference verifier.
pub struct Hs256Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Verifier {
    /// Create a verifier for the given shared secret.
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match issuer {
            Some(iss) => validation.set_issuer(&[iss]),
            None => {}
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => {
                validation.validate_aud = false;
            }
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for Hs256Verifier {
    fn verify(&self, token: &str) -> Result<Claims, GatewayError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|_| GatewayError::unauthorized("invalid or expired token"))?;
        if data.claims.sub.trim().is_empty() {
            return Err(GatewayError::unauthorized("token has no subject"));
        }
        if data.claims.tenant_id.trim().is_empty() {
            return Err(GatewayError::unauthorized("token has no tenant"));
        }
        Ok(data.claims)
    }
}
