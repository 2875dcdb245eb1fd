use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{first_row, select_as, to_row, Filter, Query, TableStore};
use crate::models::wash_status::{VehicleWashStatus, VehicleWashStatusRow};
use crate::utils::errors::{not_found_error, AppResult};

pub const VEHICLE_WASH_STATUSES: &str = "vehicle_wash_statuses";

pub struct VehicleWashStatusRepository {
    store: Arc<dyn TableStore>,
}

impl VehicleWashStatusRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<VehicleWashStatus>> {
        let query = Query::filtered(Filter::new().eq("wash_request_id", request_id));
        let rows: Vec<VehicleWashStatusRow> =
            select_as(self.store.as_ref(), VEHICLE_WASH_STATUSES, &query).await?;
        Ok(rows.into_iter().map(VehicleWashStatus::from).collect())
    }

    pub async fn insert(&self, status: &VehicleWashStatus) -> AppResult<VehicleWashStatus> {
        let mut row = VehicleWashStatusRow::from(status);
        row.id = None;
        row.updated_at = None;
        let rows = self
            .store
            .insert(VEHICLE_WASH_STATUSES, vec![to_row(&row)?])
            .await?;
        Ok(first_row::<VehicleWashStatusRow>(VEHICLE_WASH_STATUSES, rows)?.into())
    }

    pub async fn update(&self, status: &VehicleWashStatus) -> AppResult<VehicleWashStatus> {
        let id = status
            .id
            .ok_or_else(|| not_found_error("VehicleWashStatus", "unsaved"))?;
        let patch = serde_json::json!({
            "technician_id": status.technician_id,
            "completed": status.completed,
            "notes": status.notes,
            "post_wash_photo": status.post_wash_photo,
            "updated_at": chrono::Utc::now(),
        });
        let rows = self
            .store
            .update(VEHICLE_WASH_STATUSES, &Filter::new().eq("id", id), patch)
            .await?;
        if rows.is_empty() {
            return Err(not_found_error("VehicleWashStatus", &id.to_string()));
        }
        Ok(first_row::<VehicleWashStatusRow>(VEHICLE_WASH_STATUSES, rows)?.into())
    }
}
