use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Common,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub mail: String,
    pub password_hash: String,
    pub role: UserRole,
    pub password_reset_token: Option<Uuid>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub mail: String,
    pub password_hash: String,
    pub role: UserRole,
}
