//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Stored session. Only the SHA-256 hash of the bearer token is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Per-request view of who is acting.
///
/// Resolved from the bearer token by the auth middleware and handed to
/// handlers; nothing about the caller is kept in global state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub user: User,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_guru(&self) -> bool {
        self.user.can_review()
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_expiry() {
        let mut session = Session {
            token_hash: "h".into(),
            user_id: "u".into(),
            expires_at: Utc::now() + Duration::hours(1),
            created_at: Utc::now(),
        };
        assert!(!session.is_expired());
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
    }

    #[test]
    fn test_context_hides_token_hash() {
        let user = User::new("g@x.io".into(), "G".into(), super::super::UserRole::Guru);
        let ctx = SessionContext {
            user,
            token_hash: "secret-hash".into(),
            expires_at: Utc::now(),
        };
        assert!(ctx.is_guru());
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
