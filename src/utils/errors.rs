//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del cliente. Cada operación
//! pública devuelve `AppResult<T>`; el `Err` ya fue logueado y notificado
//! en el borde de la operación.

use thiserror::Error;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Another update is already in flight")]
    Busy,

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Mensaje corto y genérico para mostrar al usuario final.
    /// El detalle del backend nunca se muestra, solo se loguea.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(e) => format!("Please check the form: {}", summarize_validation(e)),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Unauthorized(_) => "Invalid email or password".to_string(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(_) => "The item could not be found".to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Busy => "Please wait for the current update to finish".to_string(),
            AppError::IllegalTransition { .. } => "This action is not allowed for the current status".to_string(),
            _ => "Something went wrong. Please try again".to_string(),
        }
    }

    /// Indica si el error viene del backend remoto (red o rechazo)
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AppError::ExternalApi(_) | AppError::Http(_) | AppError::Timeout(_)
        )
    }
}

fn summarize_validation(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
    fields.sort_unstable();
    fields.join(", ")
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de acceso prohibido
pub fn forbidden_error(operation: &str, reason: &str) -> AppError {
    AppError::Forbidden(format!("Cannot {}: {}", operation, reason))
}

/// Función helper para crear errores de entrada inválida
pub fn invalid_input_error(message: &str) -> AppError {
    AppError::InvalidInput(message.to_string())
}

/// Función helper para crear errores del API externo
pub fn external_api_error(operation: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::ExternalApi(format!("{}: {}", operation, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_backend_detail() {
        let err = external_api_error("insert wash_requests", "duplicate key value violates constraint");
        assert!(!err.user_message().contains("duplicate"));
        assert!(err.is_remote());
    }

    #[test]
    fn test_unauthorized_message_is_generic() {
        let err = AppError::Unauthorized("Email not confirmed".to_string());
        assert_eq!(err.user_message(), "Invalid email or password");
    }
}
