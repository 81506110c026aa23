use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Who a refresh session was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Admin,
    Store,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Store => "store",
        }
    }

    /// Name of the cookie carrying this subject's refresh token.
    pub fn cookie_name(&self) -> &'static str {
        match self {
            Self::Admin => "refresh_token_admin",
            Self::Store => "refresh_token_store",
        }
    }
}

/// Server-side record of an issued refresh token. The id doubles as the
/// token's `jti` claim; only the SHA-256 of the token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub subject_kind: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshSession {
    /// Hash a token using SHA-256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.revoked
    }

    pub fn matches(&self, token: &str) -> bool {
        self.token_hash == Self::hash_token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(token: &str, expires_in: Duration, revoked: bool) -> RefreshSession {
        let now = Utc::now();
        RefreshSession {
            id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            subject_kind: SubjectKind::Store.as_str().to_string(),
            token_hash: RefreshSession::hash_token(token),
            expires_at: now + expires_in,
            revoked,
            created_at: now,
        }
    }

    #[test]
    fn stores_only_the_hash() {
        let s = session("token_abc", Duration::days(1), false);
        assert_ne!(s.token_hash, "token_abc");
        assert_eq!(s.token_hash.len(), 64);
        assert!(s.matches("token_abc"));
        assert!(!s.matches("token_xyz"));
    }

    #[test]
    fn revoked_or_expired_sessions_are_invalid() {
        assert!(session("t", Duration::days(1), false).is_valid());
        assert!(!session("t", Duration::days(1), true).is_valid());
        assert!(!session("t", Duration::seconds(-1), false).is_valid());
    }
}
