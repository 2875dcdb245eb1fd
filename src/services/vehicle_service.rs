//! Servicio de vehículos
//!
//! CRUD de vehículos con la lista en memoria espejada del último fetch y la
//! ubicación actual derivada de `location_vehicles` (a lo sumo una por vehículo).

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::backend::Filter;
use crate::cache::OptimisticStore;
use crate::models::user::{User, UserRole};
use crate::models::vehicle::{NewVehicle, NewVehicleRow, Vehicle, VehiclePatchRow, VehicleUpdate};
use crate::repositories::{LocationRepository, VehicleRepository};
use crate::services::notification_service::Notifier;
use crate::services::session_service::SessionManager;
use crate::utils::errors::{forbidden_error, not_found_error, AppError, AppResult};

struct VehicleInner {
    repo: VehicleRepository,
    locations: LocationRepository,
    session: SessionManager,
    notifier: Notifier,
    store: OptimisticStore<Vehicle>,
}

#[derive(Clone)]
pub struct VehicleService {
    inner: Arc<VehicleInner>,
}

/// Filtro de visibilidad para listar vehículos
fn visibility_filter(user: &User) -> Filter {
    match (user.role, user.organization_id) {
        (UserRole::Admin | UserRole::Technician, _) => Filter::new(),
        (role, Some(org)) if role.has_organization_visibility() => Filter::new().eq("organization_id", org),
        _ => Filter::new().eq("user_id", user.id),
    }
}

impl VehicleService {
    pub fn new(
        repo: VehicleRepository,
        locations: LocationRepository,
        session: SessionManager,
        notifier: Notifier,
    ) -> Self {
        Self {
            inner: Arc::new(VehicleInner {
                repo,
                locations,
                session,
                notifier,
                store: OptimisticStore::new(),
            }),
        }
    }

    fn fail<T>(&self, title: &str, error: AppError) -> AppResult<T> {
        self.inner.notifier.error(title, &error);
        Err(error)
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<Vehicle> {
        self.inner.store.get(id)
    }

    pub fn cached(&self) -> Vec<Vehicle> {
        self.inner.store.all()
    }

    /// Cargar los vehículos visibles y su ubicación actual
    pub async fn list(&self) -> AppResult<Vec<Vehicle>> {
        const TITLE: &str = "Could not load vehicles";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        let mut vehicles = match self.inner.repo.list(visibility_filter(&user)).await {
            Ok(vehicles) => vehicles,
            Err(e) => {
                log::error!("❌ list vehicles falló para {}: {}", user.id, e);
                return self.fail(TITLE, e);
            }
        };

        let ids: Vec<Uuid> = vehicles.iter().map(|v| v.id).collect();
        match self.inner.locations.links_for_vehicles(&ids).await {
            Ok(links) => {
                let mut current: HashMap<Uuid, Uuid> = HashMap::new();
                for link in links {
                    if let Some(previous) = current.insert(link.vehicle_id, link.location_id) {
                        log::warn!("⚠️ Vehículo {} con más de una ubicación ({} y {})", link.vehicle_id, previous, link.location_id);
                    }
                }
                for vehicle in vehicles.iter_mut() {
                    vehicle.location_id = current.get(&vehicle.id).copied();
                }
            }
            Err(e) => log::warn!("⚠️ No se pudieron cargar ubicaciones de vehículos: {}", e),
        }

        self.inner.store.replace_all(vehicles.clone());
        Ok(vehicles)
    }

    pub async fn create(&self, data: NewVehicle) -> AppResult<Vehicle> {
        const TITLE: &str = "Could not add vehicle";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        if !user.role.can_request_washes() {
            return self.fail(TITLE, forbidden_error("add vehicle", "role cannot own vehicles"));
        }
        if let Err(e) = data.validate() {
            return self.fail(TITLE, e.into());
        }

        let row = NewVehicleRow::new(&data, user.id, user.organization_id);
        let mut vehicle = match self.inner.repo.insert(&row).await {
            Ok(vehicle) => vehicle,
            Err(e) => {
                log::error!("❌ create vehicle falló. Payload: {:?}. Error: {}", row, e);
                return self.fail(TITLE, e);
            }
        };

        if let Some(location_id) = data.location_id {
            match self.write_location(vehicle.id, Some(location_id)).await {
                Ok(()) => vehicle.location_id = Some(location_id),
                Err(e) => log::warn!("⚠️ Vehículo {} creado sin ubicación: {}", vehicle.id, e),
            }
        }

        self.inner.store.upsert(vehicle.clone());
        self.inner.notifier.success("Vehicle added", vehicle.display_name());
        Ok(vehicle)
    }

    /// Actualización parcial: solo se envían los campos presentes
    pub async fn update(&self, id: Uuid, update: VehicleUpdate) -> AppResult<Vehicle> {
        const TITLE: &str = "Could not update vehicle";
        if let Err(e) = update.check() {
            return self.fail(TITLE, e);
        }
        if update.is_empty() {
            return match self.get_by_id(id) {
                Some(vehicle) => Ok(vehicle),
                None => self.fail(TITLE, not_found_error("Vehicle", &id.to_string())),
            };
        }

        let tentative = self.inner.store.apply_update(id, |v| update.apply_to(v));
        let patch = VehiclePatchRow::from(&update);
        match self.inner.repo.update(id, &patch).await {
            Ok(mut saved) => {
                saved.location_id = self.get_by_id(id).and_then(|v| v.location_id);
                match tentative {
                    Some(tentative) => self.inner.store.commit(tentative, Some(saved.clone())),
                    None => self.inner.store.upsert(saved.clone()),
                }
                self.inner.notifier.success("Vehicle updated", saved.display_name());
                Ok(saved)
            }
            Err(e) => {
                if let Some(tentative) = tentative {
                    self.inner.store.rollback(tentative);
                }
                log::error!("❌ update vehicle {} falló. Patch: {:?}. Error: {}", id, patch, e);
                self.fail(TITLE, e)
            }
        }
    }

    /// Borrar un vehículo. Las asociaciones de ubicación se borran antes y su
    /// fallo se ignora: una fila huérfana del join no molesta.
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        const TITLE: &str = "Could not delete vehicle";
        if let Err(e) = self.inner.locations.unlink_vehicle(id).await {
            log::warn!("⚠️ No se pudieron borrar ubicaciones del vehículo {}: {}", id, e);
        }

        let tentative = self.inner.store.apply_remove(id);
        match self.inner.repo.delete(id).await {
            Ok(_) => {
                if let Some(tentative) = tentative {
                    self.inner.store.commit(tentative, None);
                }
                self.inner.notifier.success("Vehicle deleted", id.to_string());
                Ok(())
            }
            Err(e) => {
                if let Some(tentative) = tentative {
                    self.inner.store.rollback(tentative);
                }
                log::error!("❌ delete vehicle {} falló: {}", id, e);
                self.fail(TITLE, e)
            }
        }
    }

    /// Mover el vehículo a una ubicación (o quitarla con `None`)
    pub async fn assign_location(&self, vehicle_id: Uuid, location_id: Option<Uuid>) -> AppResult<()> {
        const TITLE: &str = "Could not change vehicle location";
        if let Err(e) = self.write_location(vehicle_id, location_id).await {
            log::error!("❌ assign_location {} -> {:?} falló: {}", vehicle_id, location_id, e);
            return self.fail(TITLE, e);
        }
        if let Some(tentative) = self.inner.store.apply_update(vehicle_id, |v| v.location_id = location_id) {
            self.inner.store.commit(tentative, None);
        }
        self.inner.notifier.success("Vehicle location updated", vehicle_id.to_string());
        Ok(())
    }

    /// Borrar las asociaciones previas antes de insertar la nueva
    async fn write_location(&self, vehicle_id: Uuid, location_id: Option<Uuid>) -> AppResult<()> {
        self.inner.locations.unlink_vehicle(vehicle_id).await?;
        if let Some(location_id) = location_id {
            self.inner.locations.link_vehicle(location_id, vehicle_id).await?;
        }
        Ok(())
    }

    /// Ubicación actual leída del join
    pub async fn current_location(&self, vehicle_id: Uuid) -> AppResult<Option<Uuid>> {
        let links = self.inner.locations.links_for_vehicles(&[vehicle_id]).await?;
        Ok(links.first().map(|l| l.location_id))
    }
}
