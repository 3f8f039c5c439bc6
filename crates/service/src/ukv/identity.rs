//! Who is calling. Resolvers are built once at startup and shared as
//! `Arc<dyn IdentityResolver>`.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, error};

use super::domain::InboundRequest;

/// Failure already shaped for the caller; the worker passes it through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRejection {
    pub status: u16,
    pub message: String,
}

impl IdentityRejection {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self { status: 401, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: 500, message: message.into() }
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, req: &InboundRequest) -> Result<String, IdentityRejection>;
}

/// Same identity for every request. Local development and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentityResolver {
    identity: String,
}

impl StaticIdentityResolver {
    pub fn new(identity: impl Into<String>) -> Self {
        Self { identity: identity.into() }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, _req: &InboundRequest) -> Result<String, IdentityRejection> {
        Ok(self.identity.clone())
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
}

/// HS256 bearer tokens; the identity is the `sub` claim.
pub struct JwtIdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, req: &InboundRequest) -> Result<String, IdentityRejection> {
        let token = req
            .bearer_token()
            .ok_or_else(|| IdentityRejection::unauthorized("A valid bearer token is required."))?;
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            IdentityRejection::unauthorized("A valid bearer token is required.")
        })?;
        match data.claims.sub {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => {
                error!("token carries no 'sub' claim");
                Err(IdentityRejection::internal("Unable to retrieve identity for user."))
            }
        }
    }
}
