use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::utils::errors::AppResult;

/// Envoltorio guardado en disco
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    checksum: String,
    saved_at: DateTime<Utc>,
    payload: Value,
}

fn checksum(payload: &Value) -> String {
    format!("{:x}", md5::compute(payload.to_string().as_bytes()))
}

/// Archivo JSON tipado con checksum md5.
/// Sin ruta configurada, el valor vive solo en memoria.
pub struct JsonFileStore<T> {
    path: Option<PathBuf>,
    memory: Mutex<Option<Value>>,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonFileStore<T> {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            memory: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Leer el valor guardado. Un archivo corrupto se trata como ausente.
    pub fn load(&self) -> Option<T> {
        let payload = match &self.path {
            None => self.memory.lock().clone()?,
            Some(path) => {
                let raw = match std::fs::read_to_string(path) {
                    Ok(raw) => raw,
                    Err(e) => {
                        debug!("❌ Cache MISS {}: {}", path.display(), e);
                        return None;
                    }
                };
                let envelope: Envelope = match serde_json::from_str(&raw) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("⚠️ Cache ilegible {}: {}", path.display(), e);
                        return None;
                    }
                };
                if envelope.checksum != checksum(&envelope.payload) {
                    warn!("⚠️ Checksum inválido en {}, se ignora", path.display());
                    return None;
                }
                debug!("📥 Cache HIT {} (guardado {})", path.display(), envelope.saved_at);
                envelope.payload
            }
        };

        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("⚠️ Cache con formato inesperado: {}", e);
                None
            }
        }
    }

    pub fn save(&self, value: &T) -> AppResult<()> {
        let payload = serde_json::to_value(value)?;
        match &self.path {
            None => {
                *self.memory.lock() = Some(payload);
            }
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let envelope = Envelope {
                    checksum: checksum(&payload),
                    saved_at: Utc::now(),
                    payload,
                };
                // escribir a un temporal y renombrar para no dejar archivos a medias
                let tmp = path.with_extension("tmp");
                std::fs::write(&tmp, serde_json::to_vec_pretty(&envelope)?)?;
                std::fs::rename(&tmp, path)?;
                debug!("💾 Cache guardado en {}", path.display());
            }
        }
        Ok(())
    }

    pub fn clear(&self) -> AppResult<()> {
        *self.memory.lock() = None;
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => info!("🗑️ Cache eliminado: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<Vec<String>> = JsonFileStore::new(Some(dir.path().join("items.json")));
        assert!(store.load().is_none());

        store.save(&vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(store.load().unwrap(), vec!["a", "b"]);

        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_tampered_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profile.json");
        let store: JsonFileStore<u32> = JsonFileStore::new(Some(path.clone()));
        store.save(&7).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap().replace("7", "8");
        std::fs::write(&path, raw).unwrap();
        assert!(store.load().is_none());

        std::fs::write(&path, "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_in_memory_store() {
        let store: JsonFileStore<String> = JsonFileStore::in_memory();
        store.save(&"x".to_string()).unwrap();
        assert_eq!(store.load().as_deref(), Some("x"));
        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
