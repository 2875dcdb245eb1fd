//! Registro de acciones compensatorias
//!
//! Las escrituras de varios pasos (aceptar trabajo, reescribir vehículos de un
//! pedido, cambiar la ubicación por defecto) se anotan antes del primer paso y
//! se resuelven después del último. Lo que quede pendiente se persiste y se
//! reejecuta con `reconcile_pending` en la próxima carga.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::cache::JsonFileStore;
use crate::dto::AcceptJobRequest;
use crate::services::location_service::LocationService;
use crate::services::wash_request_service::WashRequestService;
use crate::utils::errors::AppError;

/// Secuencia de escrituras que puede quedar a medias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    AcceptJob {
        request_id: Uuid,
        technician_id: Uuid,
        scheduled_start: Option<DateTime<Utc>>,
        scheduled_end: Option<DateTime<Utc>>,
    },
    ReplaceVehicles {
        request_id: Uuid,
        vehicle_ids: Vec<Uuid>,
    },
    SetDefaultLocation {
        location_id: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub action: PendingAction,
    pub recorded_at: DateTime<Utc>,
}

/// Resultado de una pasada de reconciliación
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub replayed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Outbox {
    entries: Mutex<Vec<OutboxEntry>>,
    store: JsonFileStore<Vec<OutboxEntry>>,
}

impl Outbox {
    pub fn new(path: Option<PathBuf>) -> Self {
        let store = JsonFileStore::<Vec<OutboxEntry>>::new(path);
        let entries = store.load().unwrap_or_default();
        if !entries.is_empty() {
            log::info!("📋 Outbox con {} acciones pendientes", entries.len());
        }
        Self {
            entries: Mutex::new(entries),
            store,
        }
    }

    pub fn record(&self, action: PendingAction) -> Uuid {
        let entry = OutboxEntry {
            id: Uuid::new_v4(),
            action,
            recorded_at: Utc::now(),
        };
        let id = entry.id;
        log::debug!("📝 Outbox: registrando {:?}", entry.action);
        let mut entries = self.entries.lock();
        entries.push(entry);
        self.persist(&entries);
        id
    }

    pub fn resolve(&self, id: Uuid) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() != before {
            self.persist(&entries);
        }
    }

    pub fn pending(&self) -> Vec<OutboxEntry> {
        self.entries.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn persist(&self, entries: &[OutboxEntry]) {
        if let Err(e) = self.store.save(&entries.to_vec()) {
            log::warn!("⚠️ No se pudo persistir el outbox: {}", e);
        }
    }

    /// Reejecutar las secuencias pendientes. Cada una se resuelve antes de
    /// reejecutarse; la operación vuelve a registrarse si falla otra vez.
    pub async fn reconcile_pending(
        &self,
        wash_requests: &WashRequestService,
        locations: &LocationService,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for entry in self.pending() {
            log::info!("🔁 Reconciliando {:?}", entry.action);
            self.resolve(entry.id);

            let result = match entry.action.clone() {
                PendingAction::AcceptJob {
                    request_id,
                    technician_id,
                    scheduled_start,
                    scheduled_end,
                } => {
                    let mut request = AcceptJobRequest::new(request_id, technician_id);
                    request.scheduled_start = scheduled_start;
                    request.scheduled_end = scheduled_end;
                    wash_requests.accept_job(request).await.map(|_| ())
                }
                PendingAction::ReplaceVehicles { request_id, vehicle_ids } => {
                    wash_requests.replace_vehicles(request_id, vehicle_ids).await
                }
                PendingAction::SetDefaultLocation { location_id } => {
                    locations.set_default(location_id).await.map(|_| ())
                }
            };

            match result {
                Ok(()) => report.replayed += 1,
                // el pedido ya no admite la acción (otro técnico, cancelado, borrado)
                Err(AppError::Conflict(_))
                | Err(AppError::NotFound(_))
                | Err(AppError::IllegalTransition { .. })
                | Err(AppError::Forbidden(_)) => {
                    log::warn!("⏭️ Acción pendiente descartada: {:?}", entry.action);
                    report.skipped += 1;
                }
                Err(AppError::Unauthorized(_)) => {
                    // sin sesión no se puede reejecutar: vuelve a quedar pendiente
                    self.restore(entry);
                    report.skipped += 1;
                }
                Err(e) => {
                    log::error!("❌ Reconciliación fallida: {}", e);
                    let re_recorded = self.pending().iter().any(|p| p.action == entry.action);
                    if !re_recorded {
                        self.restore(entry);
                    }
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn restore(&self, entry: OutboxEntry) {
        let mut entries = self.entries.lock();
        if !entries.iter().any(|e| e.id == entry.id) {
            entries.push(entry);
            self.persist(&entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pending_entries_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outbox.json");

        let outbox = Outbox::new(Some(path.clone()));
        let done = outbox.record(PendingAction::SetDefaultLocation { location_id: Uuid::new_v4() });
        let request_id = Uuid::new_v4();
        outbox.record(PendingAction::ReplaceVehicles {
            request_id,
            vehicle_ids: vec![Uuid::new_v4()],
        });
        outbox.resolve(done);

        let reloaded = Outbox::new(Some(path));
        let pending = reloaded.pending();
        assert_eq!(pending.len(), 1);
        assert!(matches!(
            pending[0].action,
            PendingAction::ReplaceVehicles { request_id: id, .. } if id == request_id
        ));
    }
}
