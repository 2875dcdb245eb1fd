//! Gestor de sesión e identidad
//!
//! Resuelve quién es el usuario actual al arrancar y lo mantiene al día ante
//! eventos del proveedor de identidad y al volver a primer plano. El estado se
//! publica en un canal `watch`.
//!
//! Cada bootstrap/login/logout incrementa una época; un chequeo de sesión que
//! resuelve tarde solo aplica su resultado si la época sigue siendo la suya.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use validator::Validate;

use crate::backend::IdentityProvider;
use crate::cache::ProfileCache;
use crate::config::EnvironmentConfig;
use crate::dto::{LoginRequest, RegisterRequest};
use crate::models::auth::{AuthEvent, AuthUser, SignUpData};
use crate::models::user::{ProfileRow, User};
use crate::repositories::{OrganizationRepository, ProfileRepository};
use crate::services::notification_service::Notifier;
use crate::utils::errors::{AppError, AppResult};

/// Estado observable de la sesión
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl SessionState {
    fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
        }
    }

    fn signed_out() -> Self {
        Self::default()
    }
}

struct SessionInner {
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileRepository,
    organizations: OrganizationRepository,
    cache: ProfileCache,
    notifier: Notifier,
    config: EnvironmentConfig,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
}

/// Gestor de sesión (clonable, comparte el estado interno)
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: ProfileRepository,
        organizations: OrganizationRepository,
        cache: ProfileCache,
        notifier: Notifier,
        config: EnvironmentConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState {
            is_loading: true,
            ..SessionState::default()
        });
        Self {
            inner: Arc::new(SessionInner {
                identity,
                profiles,
                organizations,
                cache,
                notifier,
                config,
                state,
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        let state = self.inner.state.borrow();
        if state.is_authenticated {
            state.user.clone()
        } else {
            None
        }
    }

    /// Usuario autenticado o `Unauthorized`
    pub fn require_user(&self) -> AppResult<User> {
        self.current_user()
            .ok_or_else(|| AppError::Unauthorized("no authenticated user".to_string()))
    }

    fn next_epoch(&self) -> u64 {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.epoch.load(Ordering::SeqCst) == epoch
    }

    fn publish(&self, state: SessionState) {
        if let Some(user) = state.user.as_ref().filter(|_| state.is_authenticated) {
            self.inner.cache.store(user);
        }
        self.inner.state.send_replace(state);
    }

    fn publish_if_current(&self, epoch: u64, state: SessionState) -> bool {
        if !self.is_current(epoch) {
            log::debug!("⏭️ Resultado de sesión descartado (época {} obsoleta)", epoch);
            return false;
        }
        self.publish(state);
        true
    }

    /// Iniciar sesión. El error del proveedor se loguea; el usuario ve un mensaje genérico.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<User> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if let Err(e) = request.validate() {
            let error = AppError::from(e);
            self.inner.notifier.error("Sign in failed", &error);
            return Err(error);
        }

        let epoch = self.next_epoch();
        let session = match self.inner.identity.sign_in(&request.email, &request.password).await {
            Ok(session) => session,
            Err(e) => {
                log::error!("❌ Login fallido para {}: {}", request.email, e);
                let error = AppError::Unauthorized("invalid credentials".to_string());
                self.inner.notifier.error("Sign in failed", &error);
                return Err(error);
            }
        };

        let user = self.load_profile(&session.user).await;
        if !self.publish_if_current(epoch, SessionState::authenticated(user.clone())) {
            // un logout/login posterior ganó; este resultado ya no aplica
            log::warn!("⚠️ Login de {} descartado por un cambio de sesión posterior", request.email);
            let error = AppError::Unauthorized("sign in superseded by a newer session change".to_string());
            self.inner.notifier.error("Sign in failed", &error);
            return Err(error);
        }
        self.inner.notifier.success("Welcome back", user.name.clone());
        Ok(user)
    }

    /// Crear cuenta y fila de perfil. No inicia sesión.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<()> {
        if let Err(e) = request.validate() {
            let error = if e.field_errors().contains_key("confirm_password") {
                AppError::InvalidInput("Passwords do not match".to_string())
            } else {
                AppError::from(e)
            };
            self.inner.notifier.error("Registration failed", &error);
            return Err(error);
        }

        let sign_up = SignUpData {
            email: request.email.trim().to_string(),
            password: request.password.clone(),
            name: request.name.trim().to_string(),
            // el rol de producto queda en los metadatos de la cuenta
            role: request.role.as_str().to_string(),
        };
        let account = match self.inner.identity.sign_up(&sign_up).await {
            Ok(account) => account,
            Err(e) => {
                log::error!("❌ Registro fallido para {}: {}", sign_up.email, e);
                self.inner.notifier.error("Registration failed", &e);
                return Err(e);
            }
        };

        let profile = ProfileRow {
            id: account.id,
            email: Some(sign_up.email.clone()),
            name: Some(sign_up.name.clone()),
            role: request.role.stored_value().to_string(),
            organization_id: None,
            avatar_url: None,
        };
        if let Err(e) = self.inner.profiles.insert(&profile).await {
            // un trigger del backend puede haber creado la fila; el login degrada a perfil mínimo
            log::warn!("⚠️ No se pudo crear el perfil {}: {}", account.id, e);
        }

        log::info!("✅ Cuenta creada: {} ({})", sign_up.email, request.role);
        self.inner
            .notifier
            .success("Account created", "Please sign in with your new account");
        Ok(())
    }

    /// Cerrar sesión. El estado local se limpia aunque falle el logout remoto.
    pub async fn logout(&self) -> AppResult<()> {
        self.next_epoch();
        if let Err(e) = self.inner.identity.sign_out().await {
            log::warn!("⚠️ Logout remoto falló, se limpia el estado local igual: {}", e);
        }
        self.inner.cache.clear();
        self.publish(SessionState::signed_out());
        self.inner.notifier.info("Signed out", "See you soon");
        Ok(())
    }

    /// Bootstrap de sesión al arrancar.
    ///
    /// En modo instalado, con un perfil cacheado se marca al usuario como
    /// autenticado mientras el chequeo remoto está en vuelo. Si el chequeo no
    /// resuelve dentro del timeout, `is_loading` se apaga igual con el perfil
    /// cacheado (si hay) o sin sesión. Un chequeo tardío sigue aplicando su resultado.
    pub async fn bootstrap(&self) -> SessionState {
        let epoch = self.next_epoch();
        let cached = if self.inner.config.installed_mode {
            self.inner.cache.load()
        } else {
            None
        };

        let current = self.state();
        self.inner.state.send_replace(SessionState {
            is_loading: true,
            ..match &cached {
                Some(user) => SessionState::authenticated(user.clone()),
                None => current,
            }
        });
        if cached.is_some() {
            log::info!("📱 Perfil cacheado en modo instalado, sesión optimista");
        }

        let this = self.clone();
        let fallback = cached.clone();
        let check = tokio::spawn(async move {
            let resolved = match this.inner.identity.current_session().await {
                Ok(Some(session)) => {
                    let user = this.load_profile(&session.user).await;
                    SessionState::authenticated(user)
                }
                Ok(None) => SessionState::signed_out(),
                Err(e) => {
                    log::warn!("⚠️ Chequeo de sesión falló: {}", e);
                    fallback_state(fallback)
                }
            };
            this.publish_if_current(epoch, resolved);
        });

        let timeout = self.inner.config.session_bootstrap_timeout();
        match tokio::time::timeout(timeout, check).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("❌ Tarea de bootstrap abortada: {}", e);
                self.publish_if_current(epoch, fallback_state(cached));
            }
            Err(_) => {
                log::warn!("⏰ Chequeo de sesión sin respuesta tras {:?}", timeout);
                self.publish_if_current(epoch, fallback_state(cached));
            }
        }
        self.state()
    }

    /// Revalidar al volver a primer plano (solo en modo instalado)
    pub async fn on_foreground(&self) -> Option<SessionState> {
        if !self.inner.config.installed_mode {
            return None;
        }
        log::debug!("🔄 App en primer plano, revalidando sesión");
        Some(self.bootstrap().await)
    }

    /// Reaccionar a eventos del proveedor de identidad
    pub async fn handle_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                let same_user = self.current_user().map_or(false, |u| u.id == session.user.id);
                if same_user {
                    log::debug!("🔑 Token refrescado para {}", session.user.id);
                    return;
                }
                let epoch = self.next_epoch();
                let user = self.load_profile(&session.user).await;
                self.publish_if_current(epoch, SessionState::authenticated(user));
            }
            AuthEvent::SignedOut => {
                self.next_epoch();
                self.inner.cache.clear();
                self.publish(SessionState::signed_out());
            }
        }
    }

    /// Cargar el perfil con reintentos acotados; nunca falla.
    /// Si la fila falta o sigue fallando se sintetiza un perfil mínimo.
    async fn load_profile(&self, account: &AuthUser) -> User {
        let attempts = self.inner.config.profile_retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self.inner.profiles.find(account.id).await {
                Ok(Some(row)) => {
                    let mut user = row.into_user(account.declared_role());
                    if let Some(org_id) = user.organization_id {
                        match self.inner.organizations.find(org_id).await {
                            Ok(org) => user.organization_name = org.map(|o| o.name),
                            Err(e) => log::warn!("⚠️ No se pudo cargar la organización {}: {}", org_id, e),
                        }
                    }
                    return user;
                }
                Ok(None) => log::warn!("⚠️ Perfil {} no encontrado (intento {}/{})", account.id, attempt, attempts),
                Err(e) => log::warn!("⚠️ Error cargando perfil {} (intento {}/{}): {}", account.id, attempt, attempts, e),
            }
            if attempt < attempts {
                tokio::time::sleep(self.inner.config.profile_retry_delay()).await;
            }
        }
        log::warn!("⚠️ Usando perfil mínimo para {}", account.id);
        User::minimal(account.id, account.email.clone())
    }
}

fn fallback_state(cached: Option<User>) -> SessionState {
    match cached {
        Some(user) => SessionState::authenticated(user),
        None => SessionState::signed_out(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Operation, TableStore};
    use crate::models::user::UserRole;
    use serde_json::json;

    fn manager(backend: Arc<MemoryBackend>, config: EnvironmentConfig) -> SessionManager {
        let store: Arc<dyn TableStore> = backend.clone();
        SessionManager::new(
            backend,
            ProfileRepository::new(store.clone()),
            OrganizationRepository::new(store),
            ProfileCache::new(None),
            Notifier::new(),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_failures_degrade_to_minimal_user() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("tech@wash.io", "secret1", json!({ "role": "technician" }));
        backend.fail_next(Operation::Select, Some("profiles"), 10);

        let session = manager(backend.clone(), EnvironmentConfig::default());
        let user = session.login("tech@wash.io", "secret1").await.unwrap();
        assert_eq!(user.name, "User");
        assert_eq!(user.role, UserRole::Customer);
        assert!(session.state().is_authenticated);
        assert_eq!(backend.count_calls(Operation::Select, "profiles"), 3);
    }

    #[tokio::test]
    async fn test_login_error_is_generic() {
        let backend = Arc::new(MemoryBackend::new());
        let session = manager(backend, EnvironmentConfig::default());
        let err = session.login("nobody@wash.io", "whatever").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid email or password");
        assert!(!session.state().is_authenticated);
    }
}
