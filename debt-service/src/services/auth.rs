use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::BootstrapAdmin,
    dtos::admin::{AdminSignInRequest, TokenResponse},
    dtos::store::StoreSignInRequest,
    models::{AdminRole, RefreshSession, SubjectKind},
    services::{Database, JwtService, Role, ServiceError},
    utils::{hash_password, verify_password, Password, PasswordHashString},
};

/// Access token for the response body plus the refresh token that goes into
/// the HttpOnly cookie.
#[derive(Debug)]
pub struct IssuedTokens {
    pub response: TokenResponse,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(db: Database, jwt: JwtService) -> Self {
        Self { db, jwt }
    }

    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn admin_signin(&self, req: AdminSignInRequest) -> Result<IssuedTokens, AppError> {
        let admin = self
            .db
            .find_admin_by_username(&req.username)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        check_password(&req.password, &admin.hashed_password)?;

        let role = match admin.parsed_role() {
            AdminRole::SuperAdmin => Role::SuperAdmin,
            AdminRole::Admin => Role::Admin,
        };

        info!(admin_id = %admin.id, "Admin signed in");
        self.issue(admin.id, role, SubjectKind::Admin).await
    }

    #[instrument(skip(self, req), fields(login = %req.login))]
    pub async fn store_signin(&self, req: StoreSignInRequest) -> Result<IssuedTokens, AppError> {
        let store = self
            .db
            .find_store_by_login(&req.login)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        check_password(&req.password, &store.hashed_password)?;

        if !store.is_active {
            warn!(store_id = %store.id, "Sign-in attempt on disabled store");
            return Err(ServiceError::AccountDisabled.into());
        }

        info!(store_id = %store.id, "Store signed in");
        self.issue(store.id, Role::Store, SubjectKind::Store).await
    }

    /// Rotates a refresh token: the presented session is revoked and a new
    /// access/refresh pair is issued. A token for the other subject kind is
    /// treated as invalid.
    #[instrument(skip(self, token))]
    pub async fn refresh(&self, kind: SubjectKind, token: &str) -> Result<IssuedTokens, AppError> {
        let claims = self
            .jwt
            .validate_refresh_token(token)
            .map_err(|_| ServiceError::InvalidToken)?;

        let session = self
            .db
            .get_refresh_session(claims.jti)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if !session.is_valid()
            || !session.matches(token)
            || session.subject_kind != kind.as_str()
            || session.subject_id != claims.sub
        {
            warn!(session_id = %session.id, "Rejected refresh token");
            return Err(ServiceError::InvalidToken.into());
        }

        // Role is re-read so demotions and disabled stores take effect.
        let role = match kind {
            SubjectKind::Admin => {
                let admin = self
                    .db
                    .get_admin(claims.sub)
                    .await?
                    .ok_or(ServiceError::InvalidToken)?;
                match admin.parsed_role() {
                    AdminRole::SuperAdmin => Role::SuperAdmin,
                    AdminRole::Admin => Role::Admin,
                }
            }
            SubjectKind::Store => {
                let store = self
                    .db
                    .get_store(claims.sub)
                    .await?
                    .ok_or(ServiceError::InvalidToken)?;
                if !store.is_active {
                    return Err(ServiceError::AccountDisabled.into());
                }
                Role::Store
            }
        };

        self.db.revoke_refresh_session(session.id).await?;
        self.issue(claims.sub, role, kind).await
    }

    /// Revokes the session behind `token`. Unknown or malformed tokens are
    /// ignored so logout always succeeds.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        if let Ok(claims) = self.jwt.validate_refresh_token(token) {
            if self.db.revoke_refresh_session(claims.jti).await? {
                info!(subject = %claims.sub, "Refresh session revoked");
            }
        }
        Ok(())
    }

    /// Seeds the configured super admin if the username is free.
    #[instrument(skip(self, bootstrap), fields(username = %bootstrap.username))]
    pub async fn bootstrap_super_admin(&self, bootstrap: &BootstrapAdmin) -> Result<(), AppError> {
        if self
            .db
            .find_admin_by_username(&bootstrap.username)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let hashed = hash_password(&Password::new(bootstrap.password.expose_secret().clone()))
            .map_err(ServiceError::Internal)?;

        self.db
            .create_admin(
                &bootstrap.username,
                hashed.as_str(),
                &bootstrap.phone_number,
                None,
                AdminRole::SuperAdmin,
            )
            .await?;

        info!("Super admin created");
        Ok(())
    }

    async fn issue(&self, subject: Uuid, role: Role, kind: SubjectKind) -> Result<IssuedTokens, AppError> {
        let session_id = Uuid::new_v4();

        let access_token = self
            .jwt
            .generate_access_token(subject, role)
            .map_err(ServiceError::Internal)?;
        let refresh_token = self
            .jwt
            .generate_refresh_token(subject, role, session_id)
            .map_err(ServiceError::Internal)?;

        self.db
            .create_refresh_session(
                session_id,
                subject,
                kind,
                &RefreshSession::hash_token(&refresh_token),
                Utc::now() + Duration::days(self.jwt.refresh_token_expiry_days()),
            )
            .await?;

        Ok(IssuedTokens {
            response: TokenResponse {
                access_token,
                token_type: "Bearer".to_string(),
                expires_in: self.jwt.access_token_expiry_seconds(),
            },
            refresh_token,
        })
    }
}

fn check_password(password: &str, hash: &str) -> Result<(), ServiceError> {
    verify_password(
        &Password::new(password),
        &PasswordHashString::new(hash.to_string()),
    )
    .map_err(|_| ServiceError::InvalidCredentials)
}
