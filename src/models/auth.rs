use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cuenta del proveedor de identidad
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    /// Rol de producto declarado al registrarse (metadatos de la cuenta)
    pub fn declared_role(&self) -> Option<&str> {
        self.user_metadata.get("role").and_then(|v| v.as_str())
    }

    pub fn declared_name(&self) -> Option<&str> {
        self.user_metadata.get("name").and_then(|v| v.as_str())
    }
}

/// Sesión autenticada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| Utc::now() >= at)
    }
}

/// Datos de registro enviados al proveedor de identidad
#[derive(Debug, Clone, Serialize)]
pub struct SignUpData {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
}

/// Eventos del proveedor de identidad
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}
