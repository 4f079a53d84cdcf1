use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind};
use thiserror::Error;

use super::claims::{AuthenticatedUser, SessionClaims};
use super::jwks::{JwksCache, JwksFetcher};

/// Why a session token was rejected.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("token expired")]
    Expired,

    #[error("no matching key found in JWKS for kid {0}")]
    UnknownKey(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("JWKS unavailable: {0}")]
    Jwks(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Verifies RS256 session tokens against the issuer's JWKS.
#[derive(Debug)]
pub struct SessionVerifier {
    issuer: String,
    audience: Option<String>,
    leeway_secs: u64,
    jwks: JwksCache,
}

impl SessionVerifier {
    pub fn new(
        issuer: impl Into<String>,
        audience: Option<String>,
        leeway_secs: u64,
        fetcher: Arc<dyn JwksFetcher>,
    ) -> Self {
        let issuer = issuer.into();
        Self {
            jwks: JwksCache::new(issuer.clone(), fetcher),
            issuer,
            audience,
            leeway_secs,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway_secs;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud.as_str()]),
            None => validation.validate_aud = false,
        }
        validation
    }

    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Malformed(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Malformed("token header has no kid".to_string()))?;

        let jwk = self.jwks.key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::Jwks(format!("unusable key {kid}: {e}")))?;

        let data = decode::<SessionClaims>(token, &key, &self.validation())?;
        Ok(data.claims.into())
    }
}
