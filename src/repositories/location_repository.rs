use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{first_row, from_rows, select_as, to_row, Filter, Query, TableStore};
use crate::models::location::{
    Location, LocationPatchRow, LocationRow, LocationVehicleRow, NewLocationRow,
};
use crate::utils::errors::{not_found_error, AppResult};

pub const LOCATIONS: &str = "locations";
pub const LOCATION_VEHICLES: &str = "location_vehicles";

pub struct LocationRepository {
    store: Arc<dyn TableStore>,
}

impl LocationRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filter: Filter) -> AppResult<Vec<Location>> {
        let query = Query::filtered(filter).order_by("name", true);
        let rows: Vec<LocationRow> = select_as(self.store.as_ref(), LOCATIONS, &query).await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    pub async fn find(&self, id: Uuid) -> AppResult<Option<Location>> {
        Ok(self.find_many(&[id]).await?.into_iter().next())
    }

    pub async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Location>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::filtered(Filter::new().in_list("id", ids));
        let rows: Vec<LocationRow> = select_as(self.store.as_ref(), LOCATIONS, &query).await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    pub async fn insert(&self, row: &NewLocationRow) -> AppResult<Location> {
        let rows = self.store.insert(LOCATIONS, vec![to_row(row)?]).await?;
        Ok(first_row::<LocationRow>(LOCATIONS, rows)?.into())
    }

    pub async fn update(&self, id: Uuid, patch: &LocationPatchRow) -> AppResult<Location> {
        let rows = self
            .store
            .update(LOCATIONS, &Filter::new().eq("id", id), to_row(patch)?)
            .await?;
        from_rows::<LocationRow>(rows)?
            .into_iter()
            .next()
            .map(Location::from)
            .ok_or_else(|| not_found_error("Location", &id.to_string()))
    }

    /// Escribir el flag `is_default` en las filas del filtro; devuelve las filas tocadas
    pub async fn set_default_flag(&self, filter: &Filter, is_default: bool) -> AppResult<Vec<Uuid>> {
        let rows = self
            .store
            .update(LOCATIONS, filter, serde_json::json!({ "is_default": is_default }))
            .await?;
        Ok(from_rows::<LocationRow>(rows)?.into_iter().map(|r| r.id).collect())
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<usize> {
        self.store.delete(LOCATIONS, &Filter::new().eq("id", id)).await
    }

    /// Cantidad de vehículos asociados (una consulta por ubicación)
    pub async fn count_vehicles(&self, location_id: Uuid) -> AppResult<u64> {
        self.store
            .count(LOCATION_VEHICLES, &Filter::new().eq("location_id", location_id))
            .await
    }

    pub async fn links_for_vehicles(&self, vehicle_ids: &[Uuid]) -> AppResult<Vec<LocationVehicleRow>> {
        if vehicle_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::filtered(Filter::new().in_list("vehicle_id", vehicle_ids));
        select_as(self.store.as_ref(), LOCATION_VEHICLES, &query).await
    }

    pub async fn unlink_vehicle(&self, vehicle_id: Uuid) -> AppResult<usize> {
        self.store
            .delete(LOCATION_VEHICLES, &Filter::new().eq("vehicle_id", vehicle_id))
            .await
    }

    pub async fn link_vehicle(&self, location_id: Uuid, vehicle_id: Uuid) -> AppResult<()> {
        let link = LocationVehicleRow { location_id, vehicle_id };
        self.store.insert(LOCATION_VEHICLES, vec![to_row(&link)?]).await?;
        Ok(())
    }
}
