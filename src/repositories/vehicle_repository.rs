use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{first_row, select_as, to_row, Filter, Query, TableStore};
use crate::models::vehicle::{NewVehicleRow, Vehicle, VehiclePatchRow, VehicleRow};
use crate::utils::errors::{not_found_error, AppResult};

pub const VEHICLES: &str = "vehicles";

pub struct VehicleRepository {
    store: Arc<dyn TableStore>,
}

impl VehicleRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Vehículos que cumplen el filtro, más nuevos primero
    pub async fn list(&self, filter: Filter) -> AppResult<Vec<Vehicle>> {
        let query = Query::filtered(filter).order_by("created_at", false);
        let rows: Vec<VehicleRow> = select_as(self.store.as_ref(), VEHICLES, &query).await?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    pub async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Vehicle>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::filtered(Filter::new().in_list("id", ids));
        let rows: Vec<VehicleRow> = select_as(self.store.as_ref(), VEHICLES, &query).await?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    pub async fn insert(&self, row: &NewVehicleRow) -> AppResult<Vehicle> {
        let rows = self.store.insert(VEHICLES, vec![to_row(row)?]).await?;
        Ok(first_row::<VehicleRow>(VEHICLES, rows)?.into())
    }

    pub async fn update(&self, id: Uuid, patch: &VehiclePatchRow) -> AppResult<Vehicle> {
        let rows = self
            .store
            .update(VEHICLES, &Filter::new().eq("id", id), to_row(patch)?)
            .await?;
        let row: VehicleRow = rows
            .into_iter()
            .next()
            .map(serde_json::from_value::<VehicleRow>)
            .transpose()?
            .ok_or_else(|| not_found_error("Vehicle", &id.to_string()))?;
        Ok(row.into())
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<usize> {
        self.store.delete(VEHICLES, &Filter::new().eq("id", id)).await
    }
}
