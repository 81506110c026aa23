use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    services::{Role, Scope},
    AppState,
};

/// Authenticated subject decoded from the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    /// Stores only see their own tree; admins see every store.
    pub fn scope(&self) -> Scope {
        match self.role {
            Role::Store => Scope::Store(self.id),
            Role::SuperAdmin | Role::Admin => Scope::All,
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(forbidden("Admin access required"))
        }
    }

    pub fn require_super_admin(&self) -> Result<(), AppError> {
        if self.role == Role::SuperAdmin {
            Ok(())
        } else {
            Err(forbidden("Super admin access required"))
        }
    }

    /// The subject itself or any admin.
    pub fn require_self(&self, id: Uuid) -> Result<(), AppError> {
        if self.role.is_admin() || self.id == id {
            Ok(())
        } else {
            Err(forbidden("Access to another account is not allowed"))
        }
    }

    /// Returns the store id for store-only operations such as likes.
    pub fn require_store(&self) -> Result<Uuid, AppError> {
        match self.role {
            Role::Store => Ok(self.id),
            _ => Err(forbidden("Store access required")),
        }
    }
}

fn forbidden(message: &str) -> AppError {
    AppError::Forbidden(anyhow::anyhow!(message.to_string()))
}

/// Middleware to require a valid access token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.jwt.validate_access_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    })?;

    req.extensions_mut().insert(Principal {
        id: claims.sub,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Extractor to easily get the principal in handlers
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

        Ok(AuthUser(principal))
    }
}
