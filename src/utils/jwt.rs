//! Lectura de claims del access token
//!
//! El backend firma los tokens; el cliente solo necesita leer `exp` y `sub`
//! para saber cuándo refrescar la sesión, así que no se verifica la firma.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AppError, AppResult};

/// Claims relevantes del access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Decodificar los claims sin validar firma ni expiración
pub fn read_claims(token: &str) -> AppResult<AccessClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Unreadable access token: {}", e)))
}

/// Indica si el token expira dentro del margen dado (o ya expiró)
pub fn expires_within(token: &str, margin: chrono::Duration) -> bool {
    match read_claims(token).ok().and_then(|c| c.expires_at()) {
        Some(expires_at) => expires_at - margin <= Utc::now(),
        None => true,
    }
}
