use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Role carried in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Store,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (admin or store ID)
    pub sub: Uuid,
    pub role: Role,
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Token ID; for refresh tokens this is the refresh session id
    pub jti: Uuid,
}

/// HS256 tokens with separate secrets for access and refresh tokens.
#[derive(Clone)]
pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let access = config.access_secret.expose_secret().as_bytes();
        let refresh = config.refresh_secret.expose_secret().as_bytes();

        tracing::info!("JWT service initialized with HS256 secrets");

        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(refresh),
            refresh_decoding: DecodingKey::from_secret(refresh),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    pub fn generate_access_token(&self, subject: Uuid, role: Role) -> Result<String, anyhow::Error> {
        let claims = self.claims(
            subject,
            role,
            TokenKind::Access,
            Uuid::new_v4(),
            Duration::minutes(self.access_token_expiry_minutes),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// `session_id` becomes the `jti` so the token can be matched to its
    /// server-side session.
    pub fn generate_refresh_token(
        &self,
        subject: Uuid,
        role: Role,
        session_id: Uuid,
    ) -> Result<String, anyhow::Error> {
        let claims = self.claims(
            subject,
            role,
            TokenKind::Refresh,
            session_id,
            Duration::days(self.refresh_token_expiry_days),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, anyhow::Error> {
        Self::validate(token, &self.access_decoding, TokenKind::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, anyhow::Error> {
        Self::validate(token, &self.refresh_decoding, TokenKind::Refresh)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    pub fn refresh_token_expiry_days(&self) -> i64 {
        self.refresh_token_expiry_days
    }

    fn claims(&self, subject: Uuid, role: Role, kind: TokenKind, jti: Uuid, ttl: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub: subject,
            role,
            kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti,
        }
    }

    fn validate(token: &str, key: &DecodingKey, expected: TokenKind) -> Result<Claims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<Claims>(token, key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid token: {}", e))?
            .claims;

        if claims.kind != expected {
            return Err(anyhow::anyhow!("Unexpected token kind: {:?}", claims.kind));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            access_secret: Secret::new("access-secret".to_string()),
            refresh_secret: Secret::new("refresh-secret".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 15,
        })
    }

    #[test]
    fn access_token_round_trip() {
        let jwt = service();
        let subject = Uuid::new_v4();

        let token = jwt.generate_access_token(subject, Role::Store).unwrap();
        let claims = jwt.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, subject);
        assert_eq!(claims.role, Role::Store);
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_carries_session_id() {
        let jwt = service();
        let session = Uuid::new_v4();

        let token = jwt
            .generate_refresh_token(Uuid::new_v4(), Role::Admin, session)
            .unwrap();
        let claims = jwt.validate_refresh_token(&token).unwrap();

        assert_eq!(claims.jti, session);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let jwt = service();
        let access = jwt.generate_access_token(Uuid::new_v4(), Role::Admin).unwrap();
        let refresh = jwt
            .generate_refresh_token(Uuid::new_v4(), Role::Admin, Uuid::new_v4())
            .unwrap();

        assert!(jwt.validate_refresh_token(&access).is_err());
        assert!(jwt.validate_access_token(&refresh).is_err());
    }

    #[test]
    fn rejects_tampered_and_expired_tokens() {
        let jwt = service();
        let token = jwt.generate_access_token(Uuid::new_v4(), Role::Store).unwrap();
        assert!(jwt.validate_access_token(&format!("{}x", token)).is_err());

        let expired = Claims {
            sub: Uuid::new_v4(),
            role: Role::Store,
            kind: TokenKind::Access,
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
            iat: (Utc::now() - Duration::hours(2)).timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &expired, &jwt.access_encoding).unwrap();
        assert!(jwt.validate_access_token(&token).is_err());
    }

    #[test]
    fn roles_serialize_snake_case() {
        assert_eq!(serde_json::to_value(Role::SuperAdmin).unwrap(), "super_admin");
        assert!(Role::Admin.is_admin());
        assert!(!Role::Store.is_admin());
    }
}
