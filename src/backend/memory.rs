//! Backend en memoria
//!
//! Implementa `TableStore` e `IdentityProvider` en proceso. Permite inyectar
//! fallos por (operación, tabla), agregar latencia a cada llamada y colgar el
//! chequeo de sesión para probar timeouts.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::query::{Filter, Query};
use super::{IdentityProvider, TableStore};
use crate::models::auth::{AuthSession, AuthUser, SignUpData};
use crate::utils::errors::{AppError, AppResult};

/// Operaciones observables del backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    InsertDirect,
    Update,
    Delete,
    Count,
    Upload,
    SignIn,
    SignUp,
    SignOut,
    Session,
}

#[derive(Debug, Clone)]
struct FailRule {
    operation: Operation,
    table: Option<String>,
    skip: usize,
    remaining: usize,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: AuthUser,
}

/// Backend en memoria con inyección de fallos
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<Vec<FailRule>>,
    calls: Mutex<Vec<(Operation, String)>>,
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<AuthSession>>,
    latency: Mutex<Option<Duration>>,
    hang_session_check: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cargar filas iniciales en una tabla
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Copia de las filas actuales de una tabla
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(&format!("{}/{}", bucket, path)).cloned()
    }

    /// Hacer fallar las próximas `times` llamadas de `operation` sobre `table`
    pub fn fail_next(&self, operation: Operation, table: Option<&str>, times: usize) {
        self.fail_after(operation, table, 0, times);
    }

    /// Como `fail_next`, pero dejando pasar primero `skip` llamadas
    pub fn fail_after(&self, operation: Operation, table: Option<&str>, skip: usize, times: usize) {
        self.failures.lock().push(FailRule {
            operation,
            table: table.map(|t| t.to_string()),
            skip,
            remaining: times,
        });
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// El chequeo de sesión nunca resuelve mientras esté activo
    pub fn hang_session_check(&self, hang: bool) {
        self.hang_session_check.store(hang, Ordering::SeqCst);
    }

    /// Registrar una cuenta directamente (sin pasar por sign_up)
    pub fn add_account(&self, email: &str, password: &str, metadata: Value) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        self.accounts.lock().insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Dejar una sesión persistida como si viniera de un arranque anterior
    pub fn set_session(&self, session: Option<AuthSession>) {
        *self.session.lock() = session;
    }

    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, operation: Operation, table: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(op, t)| *op == operation && t == table)
            .count()
    }

    async fn enter(&self, operation: Operation, table: &str) -> AppResult<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.calls.lock().push((operation, table.to_string()));

        let mut failures = self.failures.lock();
        for rule in failures.iter_mut() {
            let table_matches = rule.table.as_deref().map_or(true, |t| t == table);
            if rule.operation != operation || !table_matches || rule.remaining == 0 {
                continue;
            }
            if rule.skip > 0 {
                rule.skip -= 1;
                continue;
            }
            rule.remaining -= 1;
            debug!("💥 Fallo inyectado: {:?} {}", operation, table);
            return Err(AppError::ExternalApi(format!("injected failure on {:?} {}", operation, table)));
        }
        Ok(())
    }

    fn new_session(user: AuthUser) -> AuthSession {
        AuthSession {
            access_token: format!("memory-access-{}", Uuid::new_v4()),
            refresh_token: format!("memory-refresh-{}", Uuid::new_v4()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            user,
        }
    }
}

fn merge_patch(row: &mut Value, patch: &Value) {
    if let (Some(target), Some(source)) = (row.as_object_mut(), patch.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn compare_cells(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl TableStore for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> AppResult<Vec<Value>> {
        self.enter(Operation::Select, table).await?;
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| query.filter.matches(row))
            .collect();
        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_cells(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> AppResult<Vec<Value>> {
        self.enter(Operation::Insert, table).await?;
        Ok(self.store_rows(table, rows))
    }

    async fn insert_direct(&self, table: &str, rows: Vec<Value>) -> AppResult<Vec<Value>> {
        self.enter(Operation::InsertDirect, table).await?;
        Ok(self.store_rows(table, rows))
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> AppResult<Vec<Value>> {
        self.enter(Operation::Update, table).await?;
        let mut tables = self.tables.lock();
        let rows = tables.entry(table.to_string()).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            merge_patch(row, &patch);
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> AppResult<usize> {
        self.enter(Operation::Delete, table).await?;
        let mut tables = self.tables.lock();
        let rows = tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok(before - rows.len())
    }

    async fn count(&self, table: &str, filter: &Filter) -> AppResult<u64> {
        self.enter(Operation::Count, table).await?;
        Ok(self.rows(table).iter().filter(|row| filter.matches(row)).count() as u64)
    }

    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, _content_type: &str) -> AppResult<String> {
        self.enter(Operation::Upload, bucket).await?;
        self.objects.lock().insert(format!("{}/{}", bucket, path), bytes);
        Ok(path.to_string())
    }
}

impl MemoryBackend {
    fn store_rows(&self, table: &str, rows: Vec<Value>) -> Vec<Value> {
        let now = Utc::now().to_rfc3339();
        let mut tables = self.tables.lock();
        let stored = tables.entry(table.to_string()).or_default();
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            if let Some(obj) = row.as_object_mut() {
                obj.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
                obj.entry("created_at").or_insert_with(|| json!(now));
            }
            stored.push(row.clone());
            inserted.push(row);
        }
        inserted
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        self.enter(Operation::SignIn, "auth").await?;
        let account = self.accounts.lock().get(&email.to_lowercase()).cloned();
        match account {
            Some(account) if account.password == password => {
                let session = Self::new_session(account.user);
                *self.session.lock() = Some(session.clone());
                Ok(session)
            }
            _ => Err(AppError::Unauthorized("Invalid login credentials".to_string())),
        }
    }

    async fn sign_up(&self, data: &SignUpData) -> AppResult<AuthUser> {
        self.enter(Operation::SignUp, "auth").await?;
        if self.accounts.lock().contains_key(&data.email.to_lowercase()) {
            return Err(AppError::Conflict("User already registered".to_string()));
        }
        Ok(self.add_account(
            &data.email,
            &data.password,
            json!({ "name": data.name, "role": data.role }),
        ))
    }

    async fn sign_out(&self) -> AppResult<()> {
        self.enter(Operation::SignOut, "auth").await?;
        *self.session.lock() = None;
        Ok(())
    }

    async fn current_session(&self) -> AppResult<Option<AuthSession>> {
        if self.hang_session_check.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.enter(Operation::Session, "auth").await?;
        Ok(self.session.lock().clone())
    }

    async fn refresh_session(&self) -> AppResult<Option<AuthSession>> {
        self.enter(Operation::Session, "auth").await?;
        let mut session = self.session.lock();
        if let Some(current) = session.as_ref() {
            *session = Some(Self::new_session(current.user.clone()));
        }
        Ok(session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crud_and_filters() {
        let backend = MemoryBackend::new();
        let inserted = backend
            .insert("vehicles", vec![json!({"make": "Ford", "year": 2019})])
            .await
            .unwrap();
        let id = inserted[0]["id"].as_str().unwrap().to_string();

        let updated = backend
            .update("vehicles", &Filter::new().eq("id", &id), json!({"year": 2020}))
            .await
            .unwrap();
        assert_eq!(updated[0]["year"], 2020);
        assert_eq!(backend.count("vehicles", &Filter::new().eq("year", 2020)).await.unwrap(), 1);

        let deleted = backend.delete("vehicles", &Filter::new().eq("id", &id)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(backend.rows("vehicles").is_empty());
    }

    #[tokio::test]
    async fn test_fail_after_skips_then_fails() {
        let backend = MemoryBackend::new();
        backend.fail_after(Operation::Update, Some("wash_requests"), 1, 1);
        let filter = Filter::new();
        assert!(backend.update("wash_requests", &filter, json!({})).await.is_ok());
        assert!(backend.update("wash_requests", &filter, json!({})).await.is_err());
        assert!(backend.update("wash_requests", &filter, json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in() {
        let backend = MemoryBackend::new();
        backend.add_account("tech@wash.io", "secret1", json!({}));
        assert!(backend.sign_in("tech@wash.io", "nope").await.is_err());
        let session = backend.sign_in("TECH@wash.io", "secret1").await.unwrap();
        assert_eq!(backend.current_session().await.unwrap(), Some(session));
    }
}
