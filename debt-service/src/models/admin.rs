use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    Admin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid admin role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Admin {
    pub id: Uuid,
    pub username: String,
    pub phone_number: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Admin {
    /// Unknown role strings fall back to the least privileged role.
    pub fn parsed_role(&self) -> AdminRole {
        self.role.parse().unwrap_or(AdminRole::Admin)
    }
}
