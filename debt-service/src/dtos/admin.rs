use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AdminSignInRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdminRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: String,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAdminRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Access token body; the refresh token travels in an HttpOnly cookie.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}
