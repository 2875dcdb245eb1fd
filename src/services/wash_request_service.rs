//! Controlador del ciclo de vida de pedidos de lavado
//!
//! Mueve los pedidos por la tabla de transiciones, aplica los cambios en la
//! lista local antes de escribir en el backend (rollback si falla) y limita
//! la frecuencia de los refresh de la lista completa.
//!
//! Solo una actualización puede estar en vuelo por instancia; una segunda
//! llamada concurrente devuelve `AppError::Busy` sin tocar el estado.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

use crate::cache::OptimisticStore;
use crate::config::EnvironmentConfig;
use crate::dto::AcceptJobRequest;
use crate::models::user::{User, UserRole};
use crate::models::wash_request::{
    price_for, LocationSummary, NewWashRequest, NewWashRequestRow, RecurringFrequency, WashAction,
    WashRequest, WashRequestPatch, WashStatus,
};
use crate::backend::Filter;
use crate::repositories::{InsertPath, LocationRepository, VehicleRepository, WashRequestRepository};
use crate::services::notification_service::Notifier;
use crate::services::outbox::{Outbox, PendingAction};
use crate::services::refresh_throttle::{RefreshOutcome, RefreshThrottle};
use crate::services::session_service::SessionManager;
use crate::utils::errors::{forbidden_error, invalid_input_error, not_found_error, AppError, AppResult};

struct WashRequestInner {
    repo: WashRequestRepository,
    vehicles: VehicleRepository,
    locations: LocationRepository,
    session: SessionManager,
    notifier: Notifier,
    outbox: Arc<Outbox>,
    config: EnvironmentConfig,
    store: OptimisticStore<WashRequest>,
    update_guard: Mutex<()>,
    throttle: RefreshThrottle,
}

#[derive(Clone)]
pub struct WashRequestService {
    inner: Arc<WashRequestInner>,
}

impl WashRequestService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: WashRequestRepository,
        vehicles: VehicleRepository,
        locations: LocationRepository,
        session: SessionManager,
        notifier: Notifier,
        outbox: Arc<Outbox>,
        config: EnvironmentConfig,
    ) -> Self {
        let throttle = RefreshThrottle::new(config.refresh_throttle());
        Self {
            inner: Arc::new(WashRequestInner {
                repo,
                vehicles,
                locations,
                session,
                notifier,
                outbox,
                config,
                store: OptimisticStore::new(),
                update_guard: Mutex::new(()),
                throttle,
            }),
        }
    }

    /// Lista local (último fetch más cambios tentativos)
    pub fn list(&self) -> Vec<WashRequest> {
        self.inner.store.all()
    }

    /// Búsqueda sincrónica en la lista local
    pub fn get_by_id(&self, id: Uuid) -> Option<WashRequest> {
        self.inner.store.get(id)
    }

    fn fail<T>(&self, title: &str, error: AppError) -> AppResult<T> {
        self.inner.notifier.error(title, &error);
        Err(error)
    }

    // ------------------------------------------------------------------
    // Lecturas
    // ------------------------------------------------------------------

    /// Pedido fresco del backend, con vehículos y ubicación expandidos
    pub async fn fetch(&self, id: Uuid) -> AppResult<WashRequest> {
        let request = self
            .inner
            .repo
            .find(id)
            .await?
            .ok_or_else(|| not_found_error("WashRequest", &id.to_string()))?;
        Ok(self.expand(vec![request]).await.remove(0))
    }

    pub async fn requests_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<WashRequest>> {
        let requests = self.inner.repo.list(Filter::new().eq("user_id", customer_id)).await?;
        Ok(self.expand(requests).await)
    }

    /// Trabajos disponibles: pendientes y sin técnico
    pub async fn available_jobs(&self) -> AppResult<Vec<WashRequest>> {
        let filter = Filter::new()
            .eq("status", WashStatus::Pending)
            .is_null("technician_id");
        let requests = self.inner.repo.list(filter).await?;
        Ok(self.expand(requests).await)
    }

    pub async fn jobs_for_technician(&self, technician_id: Uuid) -> AppResult<Vec<WashRequest>> {
        let requests = self
            .inner
            .repo
            .list(Filter::new().eq("technician_id", technician_id))
            .await?;
        Ok(self.expand(requests).await)
    }

    /// Pedidos visibles para el usuario según su rol
    async fn fetch_visible(&self, user: &User) -> AppResult<Vec<WashRequest>> {
        let requests = match user.role {
            UserRole::Admin => self.inner.repo.list(Filter::new()).await?,
            UserRole::Technician => {
                let mut jobs = self.inner.repo.list(Filter::new().eq("technician_id", user.id)).await?;
                let open = self
                    .inner
                    .repo
                    .list(Filter::new().eq("status", WashStatus::Pending).is_null("technician_id"))
                    .await?;
                for job in open {
                    if !jobs.iter().any(|j| j.id == job.id) {
                        jobs.push(job);
                    }
                }
                jobs
            }
            UserRole::Customer | UserRole::FleetManager => {
                let filter = match user.organization_id {
                    Some(org) if user.role.has_organization_visibility() => Filter::new().eq("organization_id", org),
                    _ => Filter::new().eq("user_id", user.id),
                };
                self.inner.repo.list(filter).await?
            }
        };
        Ok(self.expand(requests).await)
    }

    /// Completar vehículos y ubicación. Una ubicación que no existe (o no es
    /// visible) se reemplaza por un resumen placeholder.
    async fn expand(&self, mut requests: Vec<WashRequest>) -> Vec<WashRequest> {
        let mut vehicle_ids: Vec<Uuid> = requests.iter().flat_map(|r| r.vehicle_ids.iter().copied()).collect();
        vehicle_ids.sort_unstable();
        vehicle_ids.dedup();
        let mut location_ids: Vec<Uuid> = requests.iter().filter_map(|r| r.location_id).collect();
        location_ids.sort_unstable();
        location_ids.dedup();

        let (vehicles, locations) = futures::join!(
            self.inner.vehicles.find_many(&vehicle_ids),
            self.inner.locations.find_many(&location_ids)
        );
        let vehicles: HashMap<Uuid, _> = match vehicles {
            Ok(list) => list.into_iter().map(|v| (v.id, v)).collect(),
            Err(e) => {
                log::warn!("⚠️ No se pudieron expandir vehículos: {}", e);
                HashMap::new()
            }
        };
        let locations: HashMap<Uuid, _> = match locations {
            Ok(list) => list.into_iter().map(|l| (l.id, l)).collect(),
            Err(e) => {
                log::warn!("⚠️ No se pudieron expandir ubicaciones: {}", e);
                HashMap::new()
            }
        };

        for request in requests.iter_mut() {
            request.vehicles = request
                .vehicle_ids
                .iter()
                .filter_map(|id| vehicles.get(id).cloned())
                .collect();
            request.location = request.location_id.map(|id| match locations.get(&id) {
                Some(location) => LocationSummary {
                    id,
                    name: location.name.clone(),
                    address: location.full_address(),
                    placeholder: false,
                },
                None => LocationSummary::placeholder(id),
            });
        }
        requests
    }

    // ------------------------------------------------------------------
    // Refresh con throttle
    // ------------------------------------------------------------------

    /// Refrescar la lista local. Dentro de la ventana de throttle la llamada se
    /// difiere (no se descarta) y se reejecuta al cerrarse la ventana, salvo `force`.
    pub async fn refresh(&self, force: bool) -> AppResult<RefreshOutcome> {
        if !force {
            if let Some(wait) = self.inner.throttle.remaining() {
                if self.inner.throttle.defer() {
                    log::debug!("⏳ Refresh diferido {:?}", wait);
                    let this = self.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(wait).await;
                        this.inner.throttle.clear_deferred();
                        if let Err(e) = this.load(true).await {
                            log::warn!("⚠️ Refresh diferido falló: {}", e);
                        }
                    });
                }
                return Ok(RefreshOutcome::Deferred);
            }
        }
        let count = self.load(true).await?;
        Ok(RefreshOutcome::Refreshed(count))
    }

    /// Con `notify = false` el fallo solo se loguea.
    async fn load(&self, notify: bool) -> AppResult<usize> {
        self.inner.throttle.mark();
        let user = self.inner.session.require_user()?;
        match self.fetch_visible(&user).await {
            Ok(requests) => {
                let count = requests.len();
                self.inner.store.replace_all(requests);
                log::debug!("🔄 {} pedidos cargados", count);
                Ok(count)
            }
            Err(e) => {
                log::error!("❌ Error cargando pedidos para {}: {}", user.id, e);
                if notify {
                    self.fail("Could not load wash requests", e)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Refresh posterior a una escritura exitosa
    async fn schedule_refresh(&self, immediate: bool) {
        if immediate {
            if let Err(e) = self.refresh(true).await {
                log::warn!("⚠️ Refresh inmediato falló: {}", e);
            }
            return;
        }
        let this = self.clone();
        let delay = self.inner.config.post_update_refresh_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = this.refresh(false).await {
                log::warn!("⚠️ Refresh programado falló: {}", e);
            }
        });
    }

    async fn force_resync(&self) {
        if let Err(e) = self.load(false).await {
            log::warn!("⚠️ Re-sincronización falló: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Escrituras
    // ------------------------------------------------------------------

    /// Crear un pedido. Si el insert normal falla se intenta el camino REST
    /// directo y, como último recurso, el insert sin ubicación.
    pub async fn create(&self, data: NewWashRequest) -> AppResult<WashRequest> {
        const TITLE: &str = "Could not create wash request";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        if !user.role.can_request_washes() {
            return self.fail(TITLE, forbidden_error("create wash request", "role cannot request washes"));
        }
        if let Err(e) = data.validate() {
            return self.fail(TITLE, e.into());
        }
        let (Some(preferred_date_start), Some(location_id)) = (data.preferred_date_start, data.location_id) else {
            return self.fail(TITLE, invalid_input_error("A start date and a location are required"));
        };
        if data.preferred_date_end.map_or(false, |end| end < preferred_date_start) {
            return self.fail(TITLE, invalid_input_error("The end date must be after the start date"));
        }

        let mut vehicle_ids: Vec<Uuid> = Vec::with_capacity(data.vehicle_ids.len());
        for id in &data.vehicle_ids {
            if !vehicle_ids.contains(id) {
                vehicle_ids.push(*id);
            }
        }

        let row = NewWashRequestRow {
            user_id: user.id,
            organization_id: user.organization_id,
            location_id: Some(location_id),
            preferred_date_start,
            preferred_date_end: data.preferred_date_end,
            status: WashStatus::Pending,
            price: price_for(vehicle_ids.len(), self.inner.config.price_per_vehicle),
            notes: data.notes.clone().filter(|n| !n.trim().is_empty()),
            recurring_frequency: match data.recurring_frequency {
                RecurringFrequency::None => None,
                other => Some(other),
            },
            recurring_count: data.recurring_count.map(i64::from),
            vehicle_services: if data.vehicle_services.is_empty() {
                None
            } else {
                Some(data.vehicle_services.clone())
            },
        };

        let inserted = match self.inner.repo.insert(&row, InsertPath::Client).await {
            Ok(inserted) => inserted,
            Err(first) => {
                log::warn!("⚠️ Insert de pedido falló ({}), probando camino directo. Payload: {:?}", first, row);
                match self.inner.repo.insert(&row, InsertPath::Direct).await {
                    Ok(inserted) => inserted,
                    Err(second) => {
                        log::warn!("⚠️ Insert directo falló ({}), reintentando sin ubicación", second);
                        match self.inner.repo.insert(&row.without_location(), InsertPath::Client).await {
                            Ok(inserted) => inserted,
                            Err(e) => {
                                log::error!("❌ create wash request falló. Payload: {:?}", row);
                                return self.fail(TITLE, e);
                            }
                        }
                    }
                }
            }
        };

        let mut linked = Vec::with_capacity(vehicle_ids.len());
        for vehicle_id in &vehicle_ids {
            match self.inner.repo.link_vehicle(inserted.id, *vehicle_id).await {
                Ok(()) => linked.push(*vehicle_id),
                Err(e) => log::error!("❌ No se pudo asociar vehículo {} al pedido {}: {}", vehicle_id, inserted.id, e),
            }
        }

        let request = self
            .expand(vec![WashRequest::from_row(inserted, linked)])
            .await
            .remove(0);
        self.inner.store.upsert(request.clone());
        self.inner.notifier.success(
            "Wash request created",
            format!("{} vehicle(s), ${}", vehicle_ids.len(), request.price),
        );
        Ok(request)
    }

    /// Aceptar un trabajo pendiente.
    ///
    /// Por defecto en dos PATCH: primero el técnico, después (tras una pausa)
    /// el estado `confirmed` con las fechas programadas. Ambos exigen que el
    /// pedido siga `pending`; si otro técnico lo tomó antes se devuelve `Conflict`.
    /// Si falla el segundo paso el pedido queda con técnico y `pending`; reintentar
    /// la aceptación converge a `confirmed`.
    pub async fn accept_job(&self, request: AcceptJobRequest) -> AppResult<WashRequest> {
        const TITLE: &str = "Could not accept job";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        if !user.role.can_work_jobs() || (request.technician_id != user.id && !user.role.is_admin()) {
            return self.fail(TITLE, forbidden_error("accept job", "only the technician can accept a job"));
        }
        let Ok(_guard) = self.inner.update_guard.try_lock() else {
            log::warn!("⏳ accept_job rechazado: hay una actualización en vuelo");
            return Err(AppError::Busy);
        };

        let fresh = match self.fetch(request.request_id).await {
            Ok(fresh) => fresh,
            Err(e) => return self.fail(TITLE, e),
        };
        if fresh.status == WashStatus::Confirmed && fresh.technician_id == Some(request.technician_id) {
            log::info!("✅ Pedido {} ya estaba aceptado por {}", fresh.id, request.technician_id);
            self.inner.store.upsert(fresh.clone());
            return Ok(fresh);
        }
        let Some(next_status) = fresh.status.apply(WashAction::Accept) else {
            return self.fail(
                TITLE,
                AppError::IllegalTransition {
                    from: fresh.status.to_string(),
                    to: WashStatus::Confirmed.to_string(),
                },
            );
        };
        if fresh.technician_id.map_or(false, |t| t != request.technician_id) {
            return self.fail(TITLE, AppError::Conflict("This job was already taken".to_string()));
        }

        let patch = WashRequestPatch {
            status: Some(next_status),
            technician_id: Some(Some(request.technician_id)),
            preferred_date_start: request.scheduled_start,
            preferred_date_end: request.scheduled_end.map(Some),
            ..Default::default()
        };
        let outbox_id = self.inner.outbox.record(PendingAction::AcceptJob {
            request_id: request.request_id,
            technician_id: request.technician_id,
            scheduled_start: request.scheduled_start,
            scheduled_end: request.scheduled_end,
        });
        if self.inner.store.get(fresh.id).is_none() {
            self.inner.store.upsert(fresh.clone());
        }
        let tentative = self.inner.store.apply_update(fresh.id, |r| patch.apply_to(r));

        let mut partial = false;
        let result = if self.inner.config.accept_job_split_updates {
            self.accept_in_two_steps(&request, &patch, &mut partial).await
        } else {
            self.write_accept(&request, &patch).await
        };

        match result {
            Ok(()) => {
                self.inner.outbox.resolve(outbox_id);
                if let Some(tentative) = tentative {
                    self.inner.store.commit(tentative, None);
                }
                self.schedule_refresh(true).await;
                self.inner.notifier.success("Job accepted", "The customer will be notified");
                let mut accepted = fresh;
                patch.apply_to(&mut accepted);
                Ok(self.inner.store.get(accepted.id).unwrap_or(accepted))
            }
            Err(e) => {
                if !partial {
                    self.inner.outbox.resolve(outbox_id);
                }
                if let Some(tentative) = tentative {
                    self.inner.store.rollback(tentative);
                }
                log::error!("❌ accept_job {} falló (parcial: {}): {}", request.request_id, partial, e);
                self.force_resync().await;
                self.fail(TITLE, e)
            }
        }
    }

    async fn accept_in_two_steps(
        &self,
        request: &AcceptJobRequest,
        patch: &WashRequestPatch,
        partial: &mut bool,
    ) -> AppResult<()> {
        let assign = WashRequestPatch {
            technician_id: patch.technician_id,
            ..Default::default()
        };
        let rows = self
            .inner
            .repo
            .update(request.request_id, Some(WashStatus::Pending), &assign.to_row())
            .await?;
        if rows.is_empty() {
            return Err(AppError::Conflict("This job is no longer available".to_string()));
        }
        *partial = true;

        tokio::time::sleep(self.inner.config.accept_step_delay()).await;

        let confirm = WashRequestPatch {
            technician_id: None,
            ..patch.clone()
        };
        self.write_accept(request, &confirm).await
    }

    /// PATCH condicionado a `pending` y, si el técnico ya está escrito, a que sea el mismo
    async fn write_accept(&self, request: &AcceptJobRequest, patch: &WashRequestPatch) -> AppResult<()> {
        let mut filter = Filter::new()
            .eq("id", request.request_id)
            .eq("status", WashStatus::Pending);
        if patch.technician_id.is_none() {
            filter = filter.eq("technician_id", request.technician_id);
        }
        let rows = self.inner.repo.update_where(&filter, &patch.to_row()).await?;
        if rows.is_empty() {
            return Err(AppError::Conflict("This job is no longer available".to_string()));
        }
        Ok(())
    }

    /// Punto de entrada genérico de actualización (estado, agenda, notas,
    /// ubicación, vehículos). Aplica el cambio en la lista local, escribe en el
    /// backend y confirma, o revierte y fuerza un refresh.
    pub async fn update_request(&self, id: Uuid, mut patch: WashRequestPatch) -> AppResult<WashRequest> {
        const TITLE: &str = "Could not update wash request";
        let Ok(_guard) = self.inner.update_guard.try_lock() else {
            log::warn!("⏳ update_request {} rechazado: hay una actualización en vuelo", id);
            return Err(AppError::Busy);
        };
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        if patch.is_empty() {
            return self.fail(TITLE, invalid_input_error("Nothing to update"));
        }

        let current = match self.inner.store.get(id) {
            Some(current) => current,
            None => match self.fetch(id).await {
                Ok(fresh) => {
                    self.inner.store.upsert(fresh.clone());
                    fresh
                }
                Err(e) => return self.fail(TITLE, e),
            },
        };

        if let Some(vehicle_ids) = patch.vehicle_ids.take() {
            let mut unique: Vec<Uuid> = Vec::with_capacity(vehicle_ids.len());
            for id in vehicle_ids {
                if !unique.contains(&id) {
                    unique.push(id);
                }
            }
            if unique.is_empty() {
                return self.fail(TITLE, invalid_input_error("A wash request needs at least one vehicle"));
            }
            if patch.price.is_none() {
                patch.price = Some(price_for(unique.len(), self.inner.config.price_per_vehicle));
            }
            patch.vehicle_ids = Some(unique);
        }

        if let Err(e) = check_patch(&user, &current, &patch) {
            return self.fail(TITLE, e);
        }
        let mut next = current.clone();
        patch.apply_to(&mut next);

        let tentative = self.inner.store.apply_update(id, |r| patch.apply_to(r));
        match self.write_update(&current, &patch).await {
            Ok(()) => {
                if let Some(tentative) = tentative {
                    self.inner.store.commit(tentative, None);
                }
                self.schedule_refresh(patch.assigns_technician()).await;
                if let Some(status) = patch.status.filter(|s| *s != current.status) {
                    self.inner
                        .notifier
                        .success("Wash request updated", format!("Status is now {}", status));
                } else {
                    self.inner.notifier.success("Wash request updated", "Changes saved");
                }
                Ok(self.inner.store.get(id).unwrap_or(next))
            }
            Err(e) => {
                if let Some(tentative) = tentative {
                    self.inner.store.rollback(tentative);
                }
                log::error!("❌ update_request {} falló. Patch: {:?}. Error: {}", id, patch, e);
                self.force_resync().await;
                self.fail(TITLE, e)
            }
        }
    }

    async fn write_update(&self, current: &WashRequest, patch: &WashRequestPatch) -> AppResult<()> {
        let row = patch.to_row();
        if !row.is_empty() {
            // una transición de estado solo aplica si el estado remoto no cambió
            let expected = patch
                .status
                .filter(|s| *s != current.status)
                .map(|_| current.status);
            let rows = self.inner.repo.update(current.id, expected, &row).await?;
            if rows.is_empty() {
                return Err(AppError::Conflict(
                    "The wash request changed on the server. Refreshing".to_string(),
                ));
            }
        }
        if let Some(vehicle_ids) = &patch.vehicle_ids {
            self.replace_vehicles(current.id, vehicle_ids.clone()).await?;
        }
        Ok(())
    }

    /// Reescribir la membresía de vehículos (borrar todo, insertar el set nuevo)
    pub async fn replace_vehicles(&self, request_id: Uuid, vehicle_ids: Vec<Uuid>) -> AppResult<()> {
        let outbox_id = self.inner.outbox.record(PendingAction::ReplaceVehicles {
            request_id,
            vehicle_ids: vehicle_ids.clone(),
        });
        self.inner.repo.replace_vehicles(request_id, &vehicle_ids).await?;
        self.inner.outbox.resolve(outbox_id);
        log::info!("🚗 Pedido {} con {} vehículos", request_id, vehicle_ids.len());
        Ok(())
    }

    pub async fn update_vehicles(&self, id: Uuid, vehicle_ids: Vec<Uuid>) -> AppResult<WashRequest> {
        self.update_request(id, WashRequestPatch::vehicles(vehicle_ids)).await
    }

    pub async fn start_wash(&self, id: Uuid) -> AppResult<WashRequest> {
        self.update_request(id, WashRequestPatch::status(WashStatus::InProgress)).await
    }

    pub async fn complete_wash(&self, id: Uuid) -> AppResult<WashRequest> {
        self.update_request(id, WashRequestPatch::status(WashStatus::Completed)).await
    }

    /// Cancelar; siempre seguido de un refresh forzado
    pub async fn cancel(&self, id: Uuid) -> AppResult<WashRequest> {
        let result = self.update_request(id, WashRequestPatch::status(WashStatus::Cancelled)).await;
        if result.is_ok() {
            self.force_resync().await;
        }
        result
    }

    /// Precio de un pedido con `count` vehículos
    pub fn quote(&self, count: usize) -> Decimal {
        price_for(count, self.inner.config.price_per_vehicle)
    }
}

/// Validar un patch contra el estado actual: tabla de transiciones, técnico
/// obligatorio en `confirmed` y permisos por rol.
///
/// Aceptar un trabajo solo pasa por `accept_job`; acá se rechaza.
fn check_patch(user: &User, current: &WashRequest, patch: &WashRequestPatch) -> AppResult<()> {
    if let Some(target) = patch.status.filter(|s| *s != current.status) {
        let action = current.status.action_to(target).ok_or_else(|| AppError::IllegalTransition {
            from: current.status.to_string(),
            to: target.to_string(),
        })?;
        let allowed = match action {
            WashAction::Accept => {
                return Err(forbidden_error("accept job", "jobs are accepted with accept_job"));
            }
            WashAction::Start | WashAction::Complete => user.role.can_work_jobs(),
            WashAction::Cancel => {
                user.role.is_admin()
                    || current.customer_id == user.id
                    || (user.role.has_organization_visibility()
                        && user.organization_id.is_some()
                        && current.organization_id == user.organization_id)
                    || current.technician_id == Some(user.id)
            }
        };
        if !allowed {
            return Err(forbidden_error(&format!("{} wash request", action), "not allowed for this role"));
        }
    }

    if let Some(assigned) = patch.technician_id.filter(|t| *t != current.technician_id) {
        if !user.role.is_admin() {
            if current.technician_id.map_or(false, |t| t != user.id) {
                return Err(AppError::Conflict("This job was already taken".to_string()));
            }
            if assigned.map_or(false, |t| t != user.id || !user.role.can_work_jobs()) {
                return Err(forbidden_error("assign technician", "only admins can assign another technician"));
            }
        }
    }

    let mut next = current.clone();
    patch.apply_to(&mut next);
    if next.status == WashStatus::Confirmed && next.technician_id.is_none() {
        return Err(invalid_input_error("A confirmed wash request needs a technician"));
    }
    if current.status.is_terminal() && (patch.vehicle_ids.is_some() || patch.location_id.is_some()) {
        return Err(invalid_input_error("Finished wash requests cannot be edited"));
    }
    Ok(())
}
