use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{first_row, from_rows, select_as, to_row, Filter, Query, TableStore};
use crate::models::wash_request::{
    NewWashRequestRow, WashRequest, WashRequestPatchRow, WashRequestRow, WashRequestVehicleRow,
    WashStatus,
};
use crate::utils::errors::AppResult;

pub const WASH_REQUESTS: &str = "wash_requests";
pub const WASH_REQUEST_VEHICLES: &str = "wash_request_vehicles";

/// Camino de inserción de un pedido
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPath {
    Client,
    Direct,
}

pub struct WashRequestRepository {
    store: Arc<dyn TableStore>,
}

impl WashRequestRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Pedidos del filtro con sus vehículos (join `wash_request_vehicles`)
    pub async fn list(&self, filter: Filter) -> AppResult<Vec<WashRequest>> {
        let query = Query::filtered(filter).order_by("preferred_date_start", true);
        let rows: Vec<WashRequestRow> = select_as(self.store.as_ref(), WASH_REQUESTS, &query).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut by_request: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for link in self.vehicle_links(&ids).await? {
            let vehicles = by_request.entry(link.wash_request_id).or_default();
            if !vehicles.contains(&link.vehicle_id) {
                vehicles.push(link.vehicle_id);
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let vehicle_ids = by_request.remove(&row.id).unwrap_or_default();
                WashRequest::from_row(row, vehicle_ids)
            })
            .collect())
    }

    pub async fn find(&self, id: Uuid) -> AppResult<Option<WashRequest>> {
        Ok(self.list(Filter::new().eq("id", id)).await?.into_iter().next())
    }

    pub async fn insert(&self, row: &NewWashRequestRow, path: InsertPath) -> AppResult<WashRequestRow> {
        let rows = vec![to_row(row)?];
        let inserted = match path {
            InsertPath::Client => self.store.insert(WASH_REQUESTS, rows).await?,
            InsertPath::Direct => self.store.insert_direct(WASH_REQUESTS, rows).await?,
        };
        first_row(WASH_REQUESTS, inserted)
    }

    /// PATCH por id. Con `expected` la escritura solo aplica si el estado
    /// remoto sigue siendo ese; devuelve las filas actualizadas (0 o 1).
    pub async fn update(
        &self,
        id: Uuid,
        expected: Option<WashStatus>,
        patch: &WashRequestPatchRow,
    ) -> AppResult<Vec<WashRequestRow>> {
        let mut filter = Filter::new().eq("id", id);
        if let Some(status) = expected {
            filter = filter.eq("status", status);
        }
        self.update_where(&filter, patch).await
    }

    pub async fn update_where(&self, filter: &Filter, patch: &WashRequestPatchRow) -> AppResult<Vec<WashRequestRow>> {
        let rows = self.store.update(WASH_REQUESTS, filter, to_row(patch)?).await?;
        from_rows(rows)
    }

    /// Pedidos no terminales que referencian la ubicación
    pub async fn count_active_for_location(&self, location_id: Uuid) -> AppResult<u64> {
        let filter = Filter::new()
            .eq("location_id", location_id)
            .in_list("status", WashStatus::active_values());
        self.store.count(WASH_REQUESTS, &filter).await
    }

    pub async fn vehicle_links(&self, request_ids: &[Uuid]) -> AppResult<Vec<WashRequestVehicleRow>> {
        if request_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::filtered(Filter::new().in_list("wash_request_id", request_ids));
        select_as(self.store.as_ref(), WASH_REQUEST_VEHICLES, &query).await
    }

    pub async fn link_vehicle(&self, request_id: Uuid, vehicle_id: Uuid) -> AppResult<()> {
        self.insert_vehicle_links(request_id, &[vehicle_id]).await
    }

    pub async fn delete_vehicle_links(&self, request_id: Uuid) -> AppResult<usize> {
        self.store
            .delete(WASH_REQUEST_VEHICLES, &Filter::new().eq("wash_request_id", request_id))
            .await
    }

    pub async fn insert_vehicle_links(&self, request_id: Uuid, vehicle_ids: &[Uuid]) -> AppResult<()> {
        if vehicle_ids.is_empty() {
            return Ok(());
        }
        let rows = vehicle_ids
            .iter()
            .map(|vehicle_id| {
                to_row(&WashRequestVehicleRow {
                    wash_request_id: request_id,
                    vehicle_id: *vehicle_id,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        self.store.insert(WASH_REQUEST_VEHICLES, rows).await?;
        Ok(())
    }

    /// Reescribir la membresía: borrar todas las asociaciones, insertar el set nuevo
    pub async fn replace_vehicles(&self, request_id: Uuid, vehicle_ids: &[Uuid]) -> AppResult<()> {
        self.delete_vehicle_links(request_id).await?;
        let mut unique: Vec<Uuid> = Vec::with_capacity(vehicle_ids.len());
        for id in vehicle_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        self.insert_vehicle_links(request_id, &unique).await
    }
}
