//! Session service
//!
//! Bridges the external identity provider to per-request session contexts:
//! - Sign-in from a provider-signed identity assertion
//! - Bearer token resolution (expired sessions are removed on sight)
//! - Sign-out and periodic cleanup
//!
//! Tokens are random and returned once; only their SHA-256 hash is stored.

use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, SessionContext, User, UserRole};
use anyhow::Context;
use chrono::{Duration, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Allowed clock skew for assertions issued "in the future"
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    /// No provider secret configured
    #[error("Sign-in is not configured")]
    SignInDisabled,

    #[error("Invalid identity assertion: {0}")]
    InvalidAssertion(String),

    #[error("Identity assertion expired")]
    AssertionExpired,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Signed statement from the identity provider that `email` authenticated
/// at `issued_at` (unix seconds).
///
/// `signature` is the lowercase hex HMAC-SHA256 of `"{email}:{issued_at}"`
/// under the shared provider secret.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityAssertion {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub issued_at: i64,
    pub signature: String,
}

/// Result of a successful sign-in. The raw token is only ever available here.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub context: SessionContext,
}

pub struct SessionService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    provider_secret: Option<String>,
    session_ttl: Duration,
    assertion_max_age: Duration,
}

impl SessionService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            provider_secret: config.provider_secret.clone().filter(|s| !s.is_empty()),
            session_ttl: Duration::hours(config.session_ttl_hours),
            assertion_max_age: Duration::seconds(config.assertion_max_age_secs),
        }
    }

    /// Start a session for an existing user.
    pub async fn sign_in(&self, user_id: &str) -> Result<SignedIn, SessionServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| SessionServiceError::UserNotFound(user_id.to_string()))?;
        self.open_session(user).await
    }

    /// Exchange a provider assertion for a session.
    ///
    /// Unknown emails get a new account with role `user`, except that the
    /// very first account becomes admin when no admin exists yet.
    ///
    /// # Errors
    ///
    /// - `SignInDisabled` if no provider secret is configured
    /// - `InvalidAssertion` for a malformed or mismatched signature
    /// - `AssertionExpired` if older than `assertion_max_age_secs`
    pub async fn sign_in_with_assertion(
        &self,
        assertion: &IdentityAssertion,
    ) -> Result<SignedIn, SessionServiceError> {
        let secret = self
            .provider_secret
            .as_deref()
            .ok_or(SessionServiceError::SignInDisabled)?;

        let email = assertion.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(SessionServiceError::ValidationError(
                "A valid email is required".to_string(),
            ));
        }

        verify_assertion(secret, &assertion.email, assertion.issued_at, &assertion.signature)?;

        let now = Utc::now().timestamp();
        if assertion.issued_at > now + MAX_CLOCK_SKEW_SECS {
            return Err(SessionServiceError::InvalidAssertion(
                "issued in the future".to_string(),
            ));
        }
        let age = now
            .checked_sub(assertion.issued_at)
            .ok_or(SessionServiceError::AssertionExpired)?;
        if age > self.assertion_max_age.num_seconds() {
            return Err(SessionServiceError::AssertionExpired);
        }

        let user = match self.user_repo.get_by_email(&email).await? {
            Some(user) => user,
            None => self.register(&email, assertion.display_name.as_deref()).await?,
        };

        self.open_session(user).await
    }

    async fn register(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User, SessionServiceError> {
        let no_admin_yet = self.user_repo.list_by_role(UserRole::Admin).await?.is_empty();
        let role = if no_admin_yet {
            UserRole::Admin
        } else {
            UserRole::User
        };
        let display_name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        let user = self
            .user_repo
            .create(&User::new(email.to_string(), display_name, role))
            .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "Registered user from identity provider");
        Ok(user)
    }

    async fn open_session(&self, user: User) -> Result<SignedIn, SessionServiceError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let session = Session {
            token_hash: hash_token(&token),
            user_id: user.id.clone(),
            expires_at: now + self.session_ttl,
            created_at: now,
        };
        self.session_repo
            .create(&session)
            .await
            .context("Failed to persist session")?;

        Ok(SignedIn {
            token,
            context: SessionContext {
                user,
                token_hash: session.token_hash,
                expires_at: session.expires_at,
            },
        })
    }

    /// Resolve a bearer token to its session context.
    ///
    /// Returns `None` for unknown or expired tokens; expired sessions are
    /// deleted.
    pub async fn resolve(&self, token: &str) -> Result<Option<SessionContext>, SessionServiceError> {
        let token_hash = hash_token(token);
        let session = match self.session_repo.get(&token_hash).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo.delete(&token_hash).await?;
            return Ok(None);
        }

        let user = match self.user_repo.get_by_id(&session.user_id).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        Ok(Some(SessionContext {
            user,
            token_hash,
            expires_at: session.expires_at,
        }))
    }

    /// End the session for `token`. Unknown tokens are ignored.
    pub async fn sign_out(&self, token: &str) -> Result<(), SessionServiceError> {
        self.session_repo.delete(&hash_token(token)).await?;
        Ok(())
    }

    pub async fn cleanup_expired(&self) -> Result<u64, SessionServiceError> {
        Ok(self.session_repo.delete_expired(Utc::now()).await?)
    }

    /// Change a user's role (admin operation).
    pub async fn update_role(&self, user_id: &str, role: UserRole) -> Result<User, SessionServiceError> {
        let user = self
            .user_repo
            .update_role(user_id, role)
            .await?
            .ok_or_else(|| SessionServiceError::UserNotFound(user_id.to_string()))?;
        tracing::info!(user_id = %user.id, role = %user.role, "User role changed");
        Ok(user)
    }
}

/// Lowercase hex SHA-256 of a bearer token
pub fn hash_token(token: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
}

/// Sign `"{email}:{issued_at}"` with the provider secret.
pub fn sign_assertion(secret: &str, email: &str, issued_at: i64) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("HMAC key: {}", e))?;
    mac.update(format!("{}:{}", email, issued_at).as_bytes());
    Ok(HEXLOWER.encode(&mac.finalize().into_bytes()))
}

fn verify_assertion(
    secret: &str,
    email: &str,
    issued_at: i64,
    signature: &str,
) -> Result<(), SessionServiceError> {
    let expected = data_encoding::HEXLOWER_PERMISSIVE
        .decode(signature.trim().as_bytes())
        .map_err(|_| SessionServiceError::InvalidAssertion("signature is not hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SessionServiceError::InternalError(anyhow::anyhow!("HMAC key: {}", e)))?;
    mac.update(format!("{}:{}", email, issued_at).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| SessionServiceError::InvalidAssertion("signature mismatch".to_string()))
}
