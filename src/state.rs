//! Shared application state
//!
//! Este módulo arma el grafo de servicios del cliente sobre un backend
//! (`SupabaseClient` en producción, `MemoryBackend` en tests).

use std::sync::Arc;

use crate::backend::{IdentityProvider, TableStore};
use crate::cache::ProfileCache;
use crate::config::environment::EnvironmentConfig;
use crate::repositories::{
    LocationRepository, OrganizationRepository, ProfileRepository, VehicleRepository,
    VehicleWashStatusRepository, WashRequestRepository,
};
use crate::services::{
    LocationService, Notifier, Outbox, ReconcileReport, SessionManager, VehicleService,
    WashProgressService, WashRequestService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub notifier: Notifier,
    pub session: SessionManager,
    pub vehicles: VehicleService,
    pub locations: LocationService,
    pub wash_requests: WashRequestService,
    pub progress: WashProgressService,
    pub outbox: Arc<Outbox>,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        store: Arc<dyn TableStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let notifier = Notifier::new();
        let outbox = Arc::new(Outbox::new(config.cache_file("outbox.json")));

        let session = SessionManager::new(
            identity,
            ProfileRepository::new(store.clone()),
            OrganizationRepository::new(store.clone()),
            ProfileCache::new(config.cache_file("profile.json")),
            notifier.clone(),
            config.clone(),
        );

        let vehicles = VehicleService::new(
            VehicleRepository::new(store.clone()),
            LocationRepository::new(store.clone()),
            session.clone(),
            notifier.clone(),
        );
        let locations = LocationService::new(
            LocationRepository::new(store.clone()),
            WashRequestRepository::new(store.clone()),
            session.clone(),
            notifier.clone(),
            outbox.clone(),
        );
        let wash_requests = WashRequestService::new(
            WashRequestRepository::new(store.clone()),
            VehicleRepository::new(store.clone()),
            LocationRepository::new(store.clone()),
            session.clone(),
            notifier.clone(),
            outbox.clone(),
            config.clone(),
        );
        let progress = WashProgressService::new(
            VehicleWashStatusRepository::new(store.clone()),
            store,
            wash_requests.clone(),
            session.clone(),
            notifier.clone(),
            config.clone(),
        );

        log::info!("🧩 AppState listo (entorno: {})", config.environment);
        Self {
            config,
            notifier,
            session,
            vehicles,
            locations,
            wash_requests,
            progress,
            outbox,
        }
    }

    /// Reejecutar las escrituras de varios pasos que quedaron a medias
    pub async fn reconcile_pending(&self) -> ReconcileReport {
        if self.outbox.is_empty() {
            return ReconcileReport::default();
        }
        let report = self
            .outbox
            .reconcile_pending(&self.wash_requests, &self.locations)
            .await;
        log::info!(
            "🔁 Outbox: {} reejecutadas, {} descartadas, {} fallidas",
            report.replayed,
            report.skipped,
            report.failed
        );
        report
    }
}
