use std::path::PathBuf;
use tracing::warn;

use super::local_store::JsonFileStore;
use crate::models::user::User;

/// Perfil cacheado para el bootstrap offline
pub struct ProfileCache {
    store: JsonFileStore<User>,
}

impl ProfileCache {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            store: JsonFileStore::new(path),
        }
    }

    pub fn load(&self) -> Option<User> {
        self.store.load()
    }

    /// Guardar el perfil; un fallo de escritura solo se loguea
    pub fn store(&self, user: &User) {
        if let Err(e) = self.store.save(user) {
            warn!("⚠️ No se pudo cachear el perfil {}: {}", user.id, e);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.clear() {
            warn!("⚠️ No se pudo borrar el perfil cacheado: {}", e);
        }
    }
}
