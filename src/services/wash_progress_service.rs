//! Flujo de progreso del técnico
//!
//! Las entradas por vehículo viven en memoria mientras el técnico trabaja y
//! solo se escriben en `vehicle_wash_statuses` con "guardar y salir" o al
//! completar el pedido.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::TableStore;
use crate::config::EnvironmentConfig;
use crate::models::wash_request::{WashRequest, WashStatus};
use crate::models::wash_status::VehicleWashStatus;
use crate::repositories::VehicleWashStatusRepository;
use crate::services::notification_service::Notifier;
use crate::services::session_service::SessionManager;
use crate::services::wash_request_service::WashRequestService;
use crate::utils::errors::{forbidden_error, invalid_input_error, not_found_error, AppError, AppResult};
use crate::utils::validation::{decode_data_url, is_data_url};

struct ProgressInner {
    repo: VehicleWashStatusRepository,
    storage: Arc<dyn TableStore>,
    wash_requests: WashRequestService,
    session: SessionManager,
    notifier: Notifier,
    config: EnvironmentConfig,
    entries: Mutex<HashMap<Uuid, Vec<VehicleWashStatus>>>,
}

#[derive(Clone)]
pub struct WashProgressService {
    inner: Arc<ProgressInner>,
}

impl WashProgressService {
    pub fn new(
        repo: VehicleWashStatusRepository,
        storage: Arc<dyn TableStore>,
        wash_requests: WashRequestService,
        session: SessionManager,
        notifier: Notifier,
        config: EnvironmentConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                repo,
                storage,
                wash_requests,
                session,
                notifier,
                config,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn fail<T>(&self, title: &str, error: AppError) -> AppResult<T> {
        self.inner.notifier.error(title, &error);
        Err(error)
    }

    /// Abrir el flujo: carga lo ya persistido y crea entradas locales para los
    /// vehículos que todavía no tienen fila.
    pub async fn open(&self, request_id: Uuid) -> AppResult<Vec<VehicleWashStatus>> {
        const TITLE: &str = "Could not open wash progress";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        if !user.role.can_work_jobs() {
            return self.fail(TITLE, forbidden_error("wash progress", "role cannot work jobs"));
        }
        if let Some(entries) = self.inner.entries.lock().get(&request_id) {
            return Ok(entries.clone());
        }

        let request = match self.inner.wash_requests.fetch(request_id).await {
            Ok(request) => request,
            Err(e) => return self.fail(TITLE, e),
        };
        let persisted = match self.inner.repo.list_for_request(request_id).await {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("❌ list vehicle_wash_statuses falló para {}: {}", request_id, e);
                return self.fail(TITLE, e);
            }
        };

        let entries = merge_entries(&request, persisted, request.technician_id.or(Some(user.id)));
        log::info!("🧽 Progreso abierto para {} ({} vehículos)", request_id, entries.len());
        self.inner.entries.lock().insert(request_id, entries.clone());
        Ok(entries)
    }

    pub fn entries(&self, request_id: Uuid) -> Vec<VehicleWashStatus> {
        self.inner
            .entries
            .lock()
            .get(&request_id)
            .cloned()
            .unwrap_or_default()
    }

    fn edit(&self, request_id: Uuid, vehicle_id: Uuid, f: impl FnOnce(&mut VehicleWashStatus)) -> AppResult<()> {
        let mut entries = self.inner.entries.lock();
        let entry = entries
            .get_mut(&request_id)
            .and_then(|list| list.iter_mut().find(|e| e.vehicle_id == vehicle_id))
            .ok_or_else(|| not_found_error("Wash progress entry", &vehicle_id.to_string()))?;
        f(entry);
        Ok(())
    }

    pub fn set_completed(&self, request_id: Uuid, vehicle_id: Uuid, completed: bool) -> AppResult<()> {
        self.edit(request_id, vehicle_id, |e| e.completed = completed)
    }

    pub fn set_notes(&self, request_id: Uuid, vehicle_id: Uuid, notes: Option<String>) -> AppResult<()> {
        let notes = notes.filter(|n| !n.trim().is_empty());
        self.edit(request_id, vehicle_id, |e| e.notes = notes)
    }

    /// Adjuntar la foto post-lavado como data URL (se sube al guardar)
    pub fn attach_photo(&self, request_id: Uuid, vehicle_id: Uuid, data_url: String) -> AppResult<()> {
        if !is_data_url(&data_url) || decode_data_url(&data_url).is_none() {
            return Err(invalid_input_error("Photo must be a base64 image data URL"));
        }
        self.edit(request_id, vehicle_id, |e| e.post_wash_photo = Some(data_url))
    }

    /// Persistir todas las entradas del pedido y cerrar el flujo
    pub async fn save_and_exit(&self, request_id: Uuid) -> AppResult<Vec<VehicleWashStatus>> {
        const TITLE: &str = "Could not save wash progress";
        let saved = match self.persist(request_id).await {
            Ok(saved) => saved,
            Err(e) => return self.fail(TITLE, e),
        };
        self.inner.entries.lock().remove(&request_id);
        self.inner.notifier.success("Progress saved", format!("{} vehicles", saved.len()));
        Ok(saved)
    }

    /// Completar el pedido: todos los vehículos deben estar marcados
    pub async fn complete(&self, request_id: Uuid) -> AppResult<WashRequest> {
        const TITLE: &str = "Could not complete wash";
        let entries = self.entries(request_id);
        if entries.is_empty() {
            return self.fail(TITLE, not_found_error("Wash progress", &request_id.to_string()));
        }
        let pending = entries.iter().filter(|e| !e.completed).count();
        if pending > 0 {
            return self.fail(
                TITLE,
                invalid_input_error(&format!("{} vehicles are not marked completed", pending)),
            );
        }

        match self.inner.wash_requests.fetch(request_id).await {
            Ok(request) if request.status == WashStatus::InProgress => {}
            Ok(request) => {
                return self.fail(
                    TITLE,
                    AppError::IllegalTransition {
                        from: request.status.to_string(),
                        to: WashStatus::Completed.to_string(),
                    },
                )
            }
            Err(e) => return self.fail(TITLE, e),
        }

        if let Err(e) = self.persist(request_id).await {
            return self.fail(TITLE, e);
        }
        // el flujo local se conserva hasta que la transición se confirme
        let completed = self.inner.wash_requests.complete_wash(request_id).await?;
        self.inner.entries.lock().remove(&request_id);
        Ok(completed)
    }

    async fn persist(&self, request_id: Uuid) -> AppResult<Vec<VehicleWashStatus>> {
        let entries = self.entries(request_id);
        if entries.is_empty() {
            return Err(not_found_error("Wash progress", &request_id.to_string()));
        }

        let mut saved = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.post_wash_photo = match entry.post_wash_photo.take() {
                Some(photo) if is_data_url(&photo) => Some(self.upload_photo(&entry, photo).await),
                other => other,
            };
            entry.updated_at = Some(Utc::now());

            let result = if entry.is_persisted() {
                self.inner.repo.update(&entry).await
            } else {
                self.inner.repo.insert(&entry).await
            };
            let row = result.map_err(|e| {
                log::error!(
                    "❌ Guardar progreso {}/{} falló: {}",
                    entry.wash_request_id,
                    entry.vehicle_id,
                    e
                );
                e
            })?;

            // las filas guardadas quedan con id para no duplicarse si falla la siguiente
            if let Err(e) = self.edit(request_id, row.vehicle_id, |e| {
                e.id = row.id;
                e.post_wash_photo = row.post_wash_photo.clone();
            }) {
                log::warn!("⚠️ Entrada {}/{} no encontrada tras guardar: {}", request_id, row.vehicle_id, e);
            }
            saved.push(row);
        }
        Ok(saved)
    }

    /// Subir la foto; si falla se conserva el data URL en la fila
    async fn upload_photo(&self, entry: &VehicleWashStatus, data_url: String) -> String {
        let Some(image) = decode_data_url(&data_url) else {
            log::warn!("⚠️ Foto ilegible para {}, se guarda tal cual", entry.vehicle_id);
            return data_url;
        };
        let path = format!(
            "{}/{}-{}.{}",
            entry.wash_request_id,
            entry.vehicle_id,
            Utc::now().timestamp_millis(),
            image.extension()
        );
        match self
            .inner
            .storage
            .upload(&self.inner.config.photo_bucket, &path, image.bytes, &image.content_type)
            .await
        {
            Ok(stored) => {
                log::debug!("📸 Foto subida: {}", stored);
                stored
            }
            Err(e) => {
                log::warn!("⚠️ Upload de foto falló ({}), se guarda inline: {}", path, e);
                data_url
            }
        }
    }
}

/// Una entrada por vehículo del pedido, reutilizando las filas persistidas
fn merge_entries(
    request: &WashRequest,
    persisted: Vec<VehicleWashStatus>,
    technician_id: Option<Uuid>,
) -> Vec<VehicleWashStatus> {
    let mut by_vehicle: HashMap<Uuid, VehicleWashStatus> =
        persisted.into_iter().map(|s| (s.vehicle_id, s)).collect();
    request
        .vehicle_ids
        .iter()
        .map(|vehicle_id| {
            by_vehicle
                .remove(vehicle_id)
                .unwrap_or_else(|| VehicleWashStatus::new_local(request.id, *vehicle_id, technician_id))
        })
        .collect()
}
