//! Backend remoto
//!
//! Abstracción sobre el backend-as-a-service: tablas (CRUD por filas JSON),
//! storage de archivos y proveedor de identidad. El cliente HTTP real vive en
//! `crate::client`; `memory` es la implementación en proceso.

pub mod memory;
pub mod query;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::models::auth::{AuthSession, AuthUser, SignUpData};
use crate::utils::errors::{AppError, AppResult};

pub use memory::{MemoryBackend, Operation};
pub use query::{Filter, Query};

/// Operaciones de tabla del backend (filas en forma wire)
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> AppResult<Vec<Value>>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> AppResult<Vec<Value>>;

    /// Inserción por el camino REST directo (fallback del camino normal)
    async fn insert_direct(&self, table: &str, rows: Vec<Value>) -> AppResult<Vec<Value>> {
        self.insert(table, rows).await
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> AppResult<Vec<Value>>;

    /// Devuelve la cantidad de filas borradas
    async fn delete(&self, table: &str, filter: &Filter) -> AppResult<usize>;

    async fn count(&self, table: &str, filter: &Filter) -> AppResult<u64>;

    /// Sube un archivo y devuelve su ruta dentro del bucket
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String>;
}

/// Proveedor de identidad (cuentas y sesión)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession>;

    async fn sign_up(&self, data: &SignUpData) -> AppResult<AuthUser>;

    async fn sign_out(&self) -> AppResult<()>;

    /// Sesión persistida, si sigue siendo válida
    async fn current_session(&self) -> AppResult<Option<AuthSession>>;

    async fn refresh_session(&self) -> AppResult<Option<AuthSession>>;
}

/// Serializar una fila tipada a JSON
pub fn to_row<T: Serialize>(value: &T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Deserializar filas JSON a un tipo
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Value>) -> AppResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(AppError::from))
        .collect()
}

/// Primera fila devuelta por una escritura
pub fn first_row<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> AppResult<T> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| AppError::ExternalApi(format!("{}: write returned no rows", table)))?;
    Ok(serde_json::from_value(row)?)
}

/// SELECT tipado
pub async fn select_as<T: DeserializeOwned>(store: &dyn TableStore, table: &str, query: &Query) -> AppResult<Vec<T>> {
    from_rows(store.select(table, query).await?)
}
