//! Cliente HTTP del backend hospedado
//!
//! Implementa `TableStore` e `IdentityProvider` contra los endpoints REST
//! (`/rest/v1`), de autenticación (`/auth/v1`) y de storage (`/storage/v1`).
//! La sesión se persiste en el directorio de caché y se refresca con el
//! refresh token cuando el access token está por expirar.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backend::query::{encode_pairs, Filter, Query};
use crate::backend::{IdentityProvider, TableStore};
use crate::cache::JsonFileStore;
use crate::config::EnvironmentConfig;
use crate::models::auth::{AuthSession, AuthUser, SignUpData};
use crate::utils::errors::{external_api_error, AppError, AppResult};
use crate::utils::jwt;

/// Margen antes de la expiración en el que se refresca el token
const REFRESH_MARGIN_SECS: i64 = 60;

/// Respuesta de `/auth/v1/token`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .or_else(|| self.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)))
            .or_else(|| jwt::read_claims(&self.access_token).ok().and_then(|c| c.expires_at()));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Cliente del backend-as-a-service
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
    session_store: JsonFileStore<AuthSession>,
}

impl SupabaseClient {
    /// Crear cliente. Sin timeout propio: las llamadas dependen del default de reqwest.
    pub fn new(config: &EnvironmentConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("washflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let session_store = JsonFileStore::<AuthSession>::new(config.cache_file("session.json"));
        let session = session_store.load();

        info!("🔗 Cliente del backend configurado para {}", config.supabase_url);
        Ok(Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            session: RwLock::new(session),
            session_store,
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn storage_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    fn bearer(&self) -> String {
        self.session
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// Headers comunes: `apikey` y bearer (sesión, si no la anon key)
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    fn store_session(&self, session: Option<AuthSession>) {
        let result = match &session {
            Some(s) => self.session_store.save(s),
            None => self.session_store.clear(),
        };
        if let Err(e) = result {
            warn!("⚠️ No se pudo persistir la sesión: {}", e);
        }
        *self.session.write() = session;
    }

    async fn check(operation: &str, response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!("❌ {} respondió {}: {}", operation, status, body);
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(format!("{}: {}", operation, body)));
        }
        Err(external_api_error(operation, format!("{} {}", status, body)))
    }

    async fn request_session(&self, grant_type: &str, body: Value) -> AppResult<AuthSession> {
        let url = format!("{}?grant_type={}", self.auth_url("token"), grant_type);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(grant_type, response).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.into_session())
    }
}

fn with_query(url: String, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        url
    } else {
        format!("{}?{}", url, encode_pairs(pairs))
    }
}

/// Total de un header `Content-Range` (`0-0/42` o `*/0`)
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl TableStore for SupabaseClient {
    async fn select(&self, table: &str, query: &Query) -> AppResult<Vec<Value>> {
        let url = with_query(self.rest_url(table), &query.to_query_pairs());
        let response = self.authorized(self.http.get(url)).send().await?;
        let response = Self::check(&format!("select {}", table), response).await?;
        Ok(response.json().await?)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> AppResult<Vec<Value>> {
        let response = self
            .authorized(self.http.post(self.rest_url(table)))
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        let response = Self::check(&format!("insert {}", table), response).await?;
        Ok(response.json().await?)
    }

    /// Request REST armado a mano con el token de la sesión actual
    async fn insert_direct(&self, table: &str, rows: Vec<Value>) -> AppResult<Vec<Value>> {
        let token = self
            .session
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or_else(|| AppError::Unauthorized("direct insert requires a session".to_string()))?;
        let body = serde_json::to_vec(&rows)?;

        debug!("📤 Inserción directa en {} ({} filas)", table, rows.len());
        let response = self
            .http
            .post(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .body(body)
            .send()
            .await?;
        let response = Self::check(&format!("direct insert {}", table), response).await?;
        Ok(response.json().await?)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> AppResult<Vec<Value>> {
        let url = with_query(self.rest_url(table), &filter.to_query_pairs());
        let response = self
            .authorized(self.http.patch(url))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let response = Self::check(&format!("update {}", table), response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> AppResult<usize> {
        let url = with_query(self.rest_url(table), &filter.to_query_pairs());
        let response = self
            .authorized(self.http.delete(url))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = Self::check(&format!("delete {}", table), response).await?;
        let rows: Vec<Value> = response.json().await?;
        Ok(rows.len())
    }

    async fn count(&self, table: &str, filter: &Filter) -> AppResult<u64> {
        let mut pairs = vec![("select".to_string(), "id".to_string())];
        pairs.extend(filter.to_query_pairs());
        let url = with_query(self.rest_url(table), &pairs);
        let response = self
            .authorized(self.http.get(url))
            .header("Prefer", "count=exact")
            .header(header::RANGE, "0-0")
            .send()
            .await?;
        let response = Self::check(&format!("count {}", table), response).await?;
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| external_api_error(&format!("count {}", table), "missing Content-Range"))
    }

    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        let response = self
            .authorized(self.http.post(self.storage_url(bucket, path)))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(&format!("upload {}", bucket), response).await?;
        Ok(path.to_string())
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let session = self
            .request_session("password", json!({ "email": email, "password": password }))
            .await
            .map_err(|e| match e {
                AppError::ExternalApi(detail) => AppError::Unauthorized(detail),
                other => other,
            })?;
        self.store_session(Some(session.clone()));
        info!("✅ Sesión iniciada para {}", session.user.id);
        Ok(session)
    }

    async fn sign_up(&self, data: &SignUpData) -> AppResult<AuthUser> {
        let body = json!({
            "email": data.email,
            "password": data.password,
            "data": { "name": data.name, "role": data.role },
        });
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check("signup", response).await?;
        let mut value: Value = response.json().await?;
        // con confirmación de email la cuenta viene anidada en `user`
        if let Some(user) = value.get_mut("user").map(Value::take) {
            value = user;
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let had_session = self.session.read().is_some();
        let result = if had_session {
            let response = self.authorized(self.http.post(self.auth_url("logout"))).send().await;
            match response {
                Ok(response) => Self::check("logout", response).await.map(|_| ()),
                Err(e) => Err(e.into()),
            }
        } else {
            Ok(())
        };
        // la sesión local se borra aunque falle el logout remoto
        self.store_session(None);
        result
    }

    async fn current_session(&self) -> AppResult<Option<AuthSession>> {
        let session = self.session.read().clone();
        let Some(session) = session else {
            return Ok(None);
        };
        let expiring = jwt::expires_within(&session.access_token, chrono::Duration::seconds(REFRESH_MARGIN_SECS))
            && session
                .expires_at
                .map_or(true, |at: DateTime<Utc>| at - chrono::Duration::seconds(REFRESH_MARGIN_SECS) <= Utc::now());
        if expiring {
            debug!("⏰ Sesión por expirar, refrescando");
            return self.refresh_session().await;
        }
        Ok(Some(session))
    }

    async fn refresh_session(&self) -> AppResult<Option<AuthSession>> {
        let refresh_token = match self.session.read().as_ref() {
            Some(s) => s.refresh_token.clone(),
            None => return Ok(None),
        };
        match self
            .request_session("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(session) => {
                self.store_session(Some(session.clone()));
                Ok(Some(session))
            }
            Err(AppError::Unauthorized(detail)) | Err(AppError::ExternalApi(detail)) => {
                warn!("⚠️ Refresh token rechazado: {}", detail);
                self.store_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
