//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del cliente: backend remoto, caché local,
//! tiempos de bootstrap/refresh y precio por vehículo.

use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::errors::{AppError, AppResult};

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Directorio del caché local (perfil, sesión, outbox). `None` = solo memoria
    pub cache_dir: Option<PathBuf>,
    /// App instalada (PWA/offline): habilita el bootstrap con perfil cacheado
    pub installed_mode: bool,
    pub session_bootstrap_timeout_ms: u64,
    pub profile_retry_attempts: u32,
    pub profile_retry_delay_ms: u64,
    pub refresh_throttle_ms: u64,
    pub post_update_refresh_delay_ms: u64,
    pub accept_step_delay_ms: u64,
    pub accept_job_split_updates: bool,
    pub price_per_vehicle: Decimal,
    pub photo_bucket: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: String::new(),
            cache_dir: None,
            installed_mode: false,
            session_bootstrap_timeout_ms: 3000,
            profile_retry_attempts: 3,
            profile_retry_delay_ms: 500,
            refresh_throttle_ms: 2000,
            post_update_refresh_delay_ms: 1000,
            accept_step_delay_ms: 500,
            accept_job_split_updates: true,
            price_per_vehicle: Decimal::new(2500, 2),
            photo_bucket: "wash-photos".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Cargar configuración desde variables de entorno.
    /// Las variables ausentes toman el valor por defecto; las mal formadas son error.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let supabase_url = env::var("SUPABASE_URL")
            .map_err(|_| AppError::Config("SUPABASE_URL must be set".to_string()))?;
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| AppError::Config("SUPABASE_ANON_KEY must be set".to_string()))?;

        Ok(Self {
            environment: env::var("WASHFLOW_ENV").unwrap_or(defaults.environment),
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key,
            cache_dir: env::var("WASHFLOW_CACHE_DIR").ok().map(PathBuf::from),
            installed_mode: parse_var("WASHFLOW_INSTALLED_MODE", defaults.installed_mode)?,
            session_bootstrap_timeout_ms: parse_var(
                "SESSION_BOOTSTRAP_TIMEOUT_MS",
                defaults.session_bootstrap_timeout_ms,
            )?,
            profile_retry_attempts: parse_var("PROFILE_RETRY_ATTEMPTS", defaults.profile_retry_attempts)?,
            profile_retry_delay_ms: parse_var("PROFILE_RETRY_DELAY_MS", defaults.profile_retry_delay_ms)?,
            refresh_throttle_ms: parse_var("REFRESH_THROTTLE_MS", defaults.refresh_throttle_ms)?,
            post_update_refresh_delay_ms: parse_var(
                "POST_UPDATE_REFRESH_DELAY_MS",
                defaults.post_update_refresh_delay_ms,
            )?,
            accept_step_delay_ms: parse_var("ACCEPT_STEP_DELAY_MS", defaults.accept_step_delay_ms)?,
            accept_job_split_updates: parse_var("ACCEPT_JOB_SPLIT_UPDATES", defaults.accept_job_split_updates)?,
            price_per_vehicle: parse_var("PRICE_PER_VEHICLE", defaults.price_per_vehicle)?,
            photo_bucket: env::var("PHOTO_BUCKET").unwrap_or(defaults.photo_bucket),
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn session_bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.session_bootstrap_timeout_ms)
    }

    pub fn profile_retry_delay(&self) -> Duration {
        Duration::from_millis(self.profile_retry_delay_ms)
    }

    pub fn refresh_throttle(&self) -> Duration {
        Duration::from_millis(self.refresh_throttle_ms)
    }

    pub fn post_update_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.post_update_refresh_delay_ms)
    }

    pub fn accept_step_delay(&self) -> Duration {
        Duration::from_millis(self.accept_step_delay_ms)
    }

    /// Ruta de un archivo dentro del directorio de caché
    pub fn cache_file(&self, name: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(name))
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{} must be valid: {}", name, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert!(config.is_development());
        assert_eq!(config.session_bootstrap_timeout(), Duration::from_secs(3));
        assert_eq!(config.price_per_vehicle.to_string(), "25.00");
        assert!(config.accept_job_split_updates);
        assert!(config.cache_file("profile.json").is_none());
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("WASHFLOW_TEST_BAD_NUMBER", "abc");
        let parsed: AppResult<u64> = parse_var("WASHFLOW_TEST_BAD_NUMBER", 10);
        assert!(matches!(parsed, Err(AppError::Config(_))));
        env::remove_var("WASHFLOW_TEST_BAD_NUMBER");

        let missing: u64 = parse_var("WASHFLOW_TEST_MISSING_NUMBER", 10).unwrap();
        assert_eq!(missing, 10);
    }
}
