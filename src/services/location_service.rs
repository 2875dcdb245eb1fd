//! Servicio de ubicaciones
//!
//! Mantiene a lo sumo una ubicación por defecto por organización (o por
//! creador, sin organización): al marcar una, se limpia el flag en las demás.

use futures::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::Filter;
use crate::cache::OptimisticStore;
use crate::models::location::{Location, LocationPatchRow, LocationUpdate, NewLocation, NewLocationRow};
use crate::models::user::{User, UserRole};
use crate::repositories::{LocationRepository, WashRequestRepository};
use crate::services::notification_service::Notifier;
use crate::services::outbox::{Outbox, PendingAction};
use crate::services::session_service::SessionManager;
use crate::utils::errors::{forbidden_error, not_found_error, AppError, AppResult};

struct LocationInner {
    repo: LocationRepository,
    wash_requests: WashRequestRepository,
    session: SessionManager,
    notifier: Notifier,
    outbox: Arc<Outbox>,
    store: OptimisticStore<Location>,
}

#[derive(Clone)]
pub struct LocationService {
    inner: Arc<LocationInner>,
}

/// Alcance de las ubicaciones del usuario (organización o propias)
fn scope_filter(user: &User) -> Filter {
    match (user.role, user.organization_id) {
        (UserRole::Admin | UserRole::Technician, None) => Filter::new(),
        (_, Some(org)) => Filter::new().eq("organization_id", org),
        (_, None) => Filter::new().eq("created_by", user.id),
    }
}

/// Filas que comparten el flag default: misma organización o, sin
/// organización, mismo creador. Remoto y local usan el mismo criterio.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DefaultScope {
    Organization(Uuid),
    Creator(Uuid),
}

impl DefaultScope {
    fn of(location: &Location, fallback_creator: Uuid) -> Self {
        match location.organization_id {
            Some(org) => DefaultScope::Organization(org),
            None => DefaultScope::Creator(location.created_by.unwrap_or(fallback_creator)),
        }
    }

    fn filter(&self) -> Filter {
        match self {
            DefaultScope::Organization(org) => Filter::new().eq("organization_id", org),
            DefaultScope::Creator(creator) => Filter::new().eq("created_by", creator),
        }
    }

    fn contains(&self, location: &Location) -> bool {
        match self {
            DefaultScope::Organization(org) => location.organization_id == Some(*org),
            DefaultScope::Creator(creator) => location.created_by == Some(*creator),
        }
    }
}

impl LocationService {
    pub fn new(
        repo: LocationRepository,
        wash_requests: WashRequestRepository,
        session: SessionManager,
        notifier: Notifier,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            inner: Arc::new(LocationInner {
                repo,
                wash_requests,
                session,
                notifier,
                outbox,
                store: OptimisticStore::new(),
            }),
        }
    }

    fn fail<T>(&self, title: &str, error: AppError) -> AppResult<T> {
        self.inner.notifier.error(title, &error);
        Err(error)
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<Location> {
        self.inner.store.get(id)
    }

    pub fn cached(&self) -> Vec<Location> {
        self.inner.store.all()
    }

    /// Cargar ubicaciones con su cantidad de vehículos (una consulta de conteo por fila)
    pub async fn list(&self) -> AppResult<Vec<Location>> {
        const TITLE: &str = "Could not load locations";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        let mut locations = match self.inner.repo.list(scope_filter(&user)).await {
            Ok(locations) => locations,
            Err(e) => {
                log::error!("❌ list locations falló para {}: {}", user.id, e);
                return self.fail(TITLE, e);
            }
        };

        let counts = join_all(locations.iter().map(|l| self.inner.repo.count_vehicles(l.id))).await;
        for (location, count) in locations.iter_mut().zip(counts) {
            location.vehicle_count = count.unwrap_or_else(|e| {
                log::warn!("⚠️ No se pudo contar vehículos de {}: {}", location.id, e);
                0
            });
        }

        self.inner.store.replace_all(locations.clone());
        Ok(locations)
    }

    pub async fn create(&self, data: NewLocation) -> AppResult<Location> {
        const TITLE: &str = "Could not add location";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        if let Err(e) = data.check() {
            return self.fail(TITLE, e);
        }

        let row = NewLocationRow::new(&data, user.id, user.organization_id);
        let location = match self.inner.repo.insert(&row).await {
            Ok(location) => location,
            Err(e) => {
                log::error!("❌ create location falló. Payload: {:?}. Error: {}", row, e);
                return self.fail(TITLE, e);
            }
        };
        self.inner.store.upsert(location.clone());
        self.inner.notifier.success("Location added", location.name.clone());

        if data.is_default {
            return self.set_default(location.id).await;
        }
        Ok(location)
    }

    pub async fn update(&self, id: Uuid, update: LocationUpdate) -> AppResult<Location> {
        const TITLE: &str = "Could not update location";
        if let Err(e) = update.check() {
            return self.fail(TITLE, e);
        }

        let tentative = self.inner.store.apply_update(id, |l| update.apply_to(l));
        let patch = LocationPatchRow::from(&update);
        match self.inner.repo.update(id, &patch).await {
            Ok(mut saved) => {
                saved.vehicle_count = self.get_by_id(id).map_or(0, |l| l.vehicle_count);
                match tentative {
                    Some(tentative) => self.inner.store.commit(tentative, Some(saved.clone())),
                    None => self.inner.store.upsert(saved.clone()),
                }
                self.inner.notifier.success("Location updated", saved.name.clone());
                Ok(saved)
            }
            Err(e) => {
                if let Some(tentative) = tentative {
                    self.inner.store.rollback(tentative);
                }
                log::error!("❌ update location {} falló. Patch: {:?}. Error: {}", id, patch, e);
                self.fail(TITLE, e)
            }
        }
    }

    /// Borrar una ubicación. Se rechaza si es la ubicación por defecto o si
    /// algún pedido no terminado la referencia. El flag se lee del backend,
    /// no de la copia local.
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        const TITLE: &str = "Could not delete location";
        let location = match self.inner.repo.find(id).await {
            Ok(Some(location)) => location,
            Ok(None) => return self.fail(TITLE, not_found_error("Location", &id.to_string())),
            Err(e) => return self.fail(TITLE, e),
        };
        if location.is_default {
            return self.fail(
                TITLE,
                forbidden_error("delete location", "it is the default location"),
            );
        }
        match self.inner.wash_requests.count_active_for_location(id).await {
            Ok(0) => {}
            Ok(active) => {
                log::warn!("🚫 Ubicación {} con {} pedidos activos", id, active);
                return self.fail(
                    TITLE,
                    forbidden_error("delete location", "it has active wash requests"),
                );
            }
            Err(e) => return self.fail(TITLE, e),
        }

        let tentative = self.inner.store.apply_remove(id);
        match self.inner.repo.delete(id).await {
            Ok(_) => {
                if let Some(tentative) = tentative {
                    self.inner.store.commit(tentative, None);
                }
                self.inner.notifier.success("Location deleted", location.name);
                Ok(())
            }
            Err(e) => {
                if let Some(tentative) = tentative {
                    self.inner.store.rollback(tentative);
                }
                log::error!("❌ delete location {} falló: {}", id, e);
                self.fail(TITLE, e)
            }
        }
    }

    /// Marcar como ubicación por defecto: limpiar el flag en las demás filas
    /// del alcance y después escribirlo en la elegida.
    pub async fn set_default(&self, id: Uuid) -> AppResult<Location> {
        const TITLE: &str = "Could not set default location";
        let user = match self.inner.session.require_user() {
            Ok(user) => user,
            Err(e) => return self.fail(TITLE, e),
        };
        let location = match self.get_by_id(id) {
            Some(location) => location,
            None => match self.inner.repo.find(id).await {
                Ok(Some(location)) => location,
                Ok(None) => return self.fail(TITLE, not_found_error("Location", &id.to_string())),
                Err(e) => return self.fail(TITLE, e),
            },
        };

        let scope = DefaultScope::of(&location, user.id);
        let others = scope.filter().neq("id", id);

        let outbox_id = self.inner.outbox.record(PendingAction::SetDefaultLocation { location_id: id });
        let result = async {
            let cleared = self.inner.repo.set_default_flag(&others, false).await?;
            log::debug!("📍 {} ubicaciones sin flag default", cleared.len());
            let set = self
                .inner
                .repo
                .set_default_flag(&Filter::new().eq("id", id), true)
                .await?;
            if set.is_empty() {
                return Err(not_found_error("Location", &id.to_string()));
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.inner.outbox.resolve(outbox_id);
                self.inner.store.modify_all(|l| {
                    if l.id == id {
                        l.is_default = true;
                    } else if scope.contains(l) {
                        l.is_default = false;
                    }
                });
                self.inner.notifier.success("Default location updated", location.name.clone());
                Ok(self.get_by_id(id).unwrap_or(Location {
                    is_default: true,
                    ..location
                }))
            }
            Err(e) => {
                log::error!("❌ set_default {} falló: {}", id, e);
                if let Err(refresh) = self.list().await {
                    log::warn!("⚠️ No se pudo re-sincronizar ubicaciones: {}", refresh);
                }
                self.fail(TITLE, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_filter() {
        let mut user = User::minimal(Uuid::new_v4(), None);
        assert_eq!(scope_filter(&user), Filter::new().eq("created_by", user.id));
        let org = Uuid::new_v4();
        user.organization_id = Some(org);
        assert_eq!(scope_filter(&user), Filter::new().eq("organization_id", org));
        user.role = UserRole::Admin;
        user.organization_id = None;
        assert!(scope_filter(&user).is_empty());
    }

    fn location(organization_id: Option<Uuid>, created_by: Option<Uuid>) -> Location {
        Location {
            id: Uuid::new_v4(),
            organization_id,
            name: "Depot".to_string(),
            address: "12 Main St".to_string(),
            city: None,
            state: None,
            zip_code: None,
            latitude: None,
            longitude: None,
            is_default: true,
            created_by,
            created_at: None,
            vehicle_count: 0,
        }
    }

    #[test]
    fn test_default_scope_without_organization_is_per_creator() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let target = location(None, Some(alice));
        let scope = DefaultScope::of(&target, bob);
        assert_eq!(scope, DefaultScope::Creator(alice));
        assert_eq!(scope.filter(), Filter::new().eq("created_by", alice));

        assert!(scope.contains(&location(None, Some(alice))));
        assert!(!scope.contains(&location(None, Some(bob))));
        assert!(!scope.contains(&location(None, None)));
    }

    #[test]
    fn test_default_scope_with_organization() {
        let org = Uuid::new_v4();
        let scope = DefaultScope::of(&location(Some(org), Some(Uuid::new_v4())), Uuid::new_v4());
        assert!(scope.contains(&location(Some(org), Some(Uuid::new_v4()))));
        assert!(!scope.contains(&location(None, None)));
        assert!(!scope.contains(&location(Some(Uuid::new_v4()), None)));
    }
}
