//! Bearer token authentication and token revocation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use common::UserId;
use domain::{Identity, Role};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use market_store::MarketStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::state::AppState;

/// Authentication failures. All of them surface as 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    MalformedHeader,

    #[error("Invalid token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token claims")]
    InvalidClaims,

    #[error("Token has been revoked")]
    Revoked,
}

/// Token claims issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Account role, e.g. `P_LARGE`.
    pub role: String,
    /// Expiry as seconds since the epoch.
    pub exp: usize,
}

impl Claims {
    /// Claims for an identity, valid for `ttl_secs` from now.
    pub fn for_identity(identity: &Identity, ttl_secs: i64) -> Self {
        Self {
            sub: identity.user_id.to_string(),
            role: identity.role.to_string(),
            exp: (Utc::now().timestamp() + ttl_secs).max(0) as usize,
        }
    }

    /// Resolves the claims to a caller identity. Unknown roles are rejected.
    pub fn identity(&self) -> Result<Identity, AuthError> {
        let user_id = self
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidClaims)?;
        let role = self
            .role
            .parse::<Role>()
            .map_err(|_| AuthError::InvalidClaims)?;
        Ok(Identity::new(user_id, role))
    }
}

/// HS256 signing and verification keys.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Signs a token for the claims.
    pub fn issue(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    /// Verifies a token's signature and expiry and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

/// Bookkeeping of tokens revoked before they expire.
#[async_trait]
pub trait TokenRevocation: Send + Sync {
    async fn is_revoked(&self, token: &str) -> bool;

    /// Revokes a token until `expires_at` (seconds since the epoch), after
    /// which signature validation rejects it anyway.
    async fn revoke(&self, token: &str, expires_at: usize);
}

/// Revocation list kept in process memory. Entries are dropped once their
/// token has expired.
#[derive(Default)]
pub struct InMemoryRevocationList {
    tokens: RwLock<HashMap<String, usize>>,
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revoked tokens still tracked.
    pub async fn revoked_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

fn now_secs() -> usize {
    Utc::now().timestamp().max(0) as usize
}

#[async_trait]
impl TokenRevocation for InMemoryRevocationList {
    async fn is_revoked(&self, token: &str) -> bool {
        self.tokens
            .read()
            .await
            .get(token)
            .is_some_and(|&expires_at| expires_at > now_secs())
    }

    async fn revoke(&self, token: &str, expires_at: usize) {
        let now = now_secs();
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, &mut exp| exp > now);
        if expires_at > now {
            tokens.insert(token.to_string(), expires_at);
        }
    }
}

/// Verifies bearer tokens against the keys and the revocation list.
#[derive(Clone)]
pub struct Authenticator {
    keys: JwtKeys,
    revocations: Arc<dyn TokenRevocation>,
}

impl Authenticator {
    pub fn new(keys: JwtKeys, revocations: Arc<dyn TokenRevocation>) -> Self {
        Self { keys, revocations }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Authenticates the value of an `Authorization` header.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AuthUser, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let token = match header.split_once(' ') {
            Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => token,
            _ => return Err(AuthError::MalformedHeader),
        };

        if self.revocations.is_revoked(token).await {
            return Err(AuthError::Revoked);
        }

        let claims = self.keys.verify(token)?;
        Ok(AuthUser {
            identity: claims.identity()?,
            token: token.to_string(),
            expires_at: claims.exp,
        })
    }

    /// Revokes the caller's token for the rest of its lifetime.
    pub async fn revoke(&self, user: &AuthUser) {
        self.revocations.revoke(&user.token, user.expires_at).await;
    }
}

/// An authenticated caller, extracted from the `Authorization` header.
pub struct AuthUser {
    pub identity: Identity,
    pub token: String,
    /// Token expiry as seconds since the epoch.
    pub expires_at: usize,
}

impl AuthUser {
    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// Rejects callers whose role is not in `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.identity.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to access this resource".to_string(),
            ))
        }
    }
}

impl<S: MarketStore + 'static> FromRequestParts<Arc<AppState<S>>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::MalformedHeader)?),
            None => None,
        };

        match state.auth.authenticate(header).await {
            Ok(user) => Ok(user),
            Err(err) => {
                metrics::counter!("api_auth_rejections_total").increment(1);
                tracing::debug!(error = %err, "request rejected");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(
            JwtKeys::new(b"test-secret"),
            Arc::new(InMemoryRevocationList::new()),
        )
    }

    fn bearer(auth: &Authenticator, identity: &Identity) -> String {
        let token = auth
            .keys()
            .issue(&Claims::for_identity(identity, 3600))
            .unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let auth = authenticator();
        let identity = Identity::new(UserId::new(), Role::ConsumerLarge);

        let header = bearer(&auth, &identity);
        let user = auth.authenticate(Some(header.as_str())).await.unwrap();
        assert_eq!(user.identity, identity);
    }

    #[tokio::test]
    async fn malformed_headers_are_rejected() {
        let auth = authenticator();
        assert!(matches!(
            auth.authenticate(None).await,
            Err(AuthError::MissingHeader)
        ));
        for header in ["Token abc", "Bearer", "Bearer ", "Bearer a b"] {
            assert!(matches!(
                auth.authenticate(Some(header)).await,
                Err(AuthError::MalformedHeader)
            ));
        }
        assert!(matches!(
            auth.authenticate(Some("Bearer not.a.jwt")).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn expired_and_foreign_tokens_are_rejected() {
        let auth = authenticator();
        let identity = Identity::new(UserId::new(), Role::ProducerSmall);

        let expired = auth
            .keys()
            .issue(&Claims::for_identity(&identity, -3600))
            .unwrap();
        assert!(
            auth.authenticate(Some(format!("Bearer {expired}").as_str()))
                .await
                .is_err()
        );

        let foreign = JwtKeys::new(b"other-secret")
            .issue(&Claims::for_identity(&identity, 3600))
            .unwrap();
        assert!(
            auth.authenticate(Some(format!("Bearer {foreign}").as_str()))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let auth = authenticator();
        let claims = Claims {
            sub: UserId::new().to_string(),
            role: "SUPERUSER".to_string(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        let token = auth.keys().issue(&claims).unwrap();
        assert!(matches!(
            auth.authenticate(Some(format!("Bearer {token}").as_str()))
                .await,
            Err(AuthError::InvalidClaims)
        ));
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let revocations = Arc::new(InMemoryRevocationList::new());
        let auth = Authenticator::new(JwtKeys::new(b"test-secret"), revocations.clone());
        let header = bearer(&auth, &Identity::new(UserId::new(), Role::Admin));

        let user = auth.authenticate(Some(header.as_str())).await.unwrap();
        auth.revoke(&user).await;

        assert_eq!(revocations.revoked_count().await, 1);
        assert!(matches!(
            auth.authenticate(Some(header.as_str())).await,
            Err(AuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn expired_revocations_are_dropped() {
        let revocations = InMemoryRevocationList::new();
        let now = Utc::now().timestamp() as usize;

        revocations.revoke("stale", now - 60).await;
        assert!(!revocations.is_revoked("stale").await);
        assert_eq!(revocations.revoked_count().await, 0);

        revocations.revoke("live", now + 3600).await;
        assert!(revocations.is_revoked("live").await);
        assert_eq!(revocations.revoked_count().await, 1);
    }

    #[tokio::test]
    async fn revocation_lapses_with_token_expiry() {
        let revocations = InMemoryRevocationList::new();
        let now = Utc::now().timestamp() as usize;
        revocations.revoke("short", now + 1).await;
        revocations.revoke("long", now + 3600).await;

        // Purge on the next revoke once "short" has expired.
        {
            let mut tokens = revocations.tokens.write().await;
            tokens.insert("short".to_string(), now - 1);
        }
        assert!(!revocations.is_revoked("short").await);
        revocations.revoke("other", now + 3600).await;
        assert_eq!(revocations.revoked_count().await, 2);
        assert!(revocations.is_revoked("long").await);
    }
}
