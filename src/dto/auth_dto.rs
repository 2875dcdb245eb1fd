use serde::Deserialize;
use validator::Validate;

use crate::models::user::UserRole;

// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

// Registro de cuenta nueva
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 100))]
    pub password: String,

    #[validate(must_match = "password")]
    pub confirm_password: String,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    pub role: UserRole,
}
