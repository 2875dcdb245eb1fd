use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progreso de lavado por (pedido, vehículo)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleWashStatus {
    /// `None` mientras no se haya persistido
    pub id: Option<Uuid>,
    pub wash_request_id: Uuid,
    pub vehicle_id: Uuid,
    pub technician_id: Option<Uuid>,
    pub completed: bool,
    pub notes: Option<String>,
    /// Data URL (aún sin subir) o ruta en el bucket de fotos
    pub post_wash_photo: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl VehicleWashStatus {
    /// Entrada local creada al abrir el flujo de progreso
    pub fn new_local(wash_request_id: Uuid, vehicle_id: Uuid, technician_id: Option<Uuid>) -> Self {
        Self {
            id: None,
            wash_request_id,
            vehicle_id,
            technician_id,
            completed: false,
            notes: None,
            post_wash_photo: None,
            updated_at: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Fila de la tabla `vehicle_wash_statuses`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleWashStatusRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub wash_request_id: Uuid,
    pub vehicle_id: Uuid,
    #[serde(default)]
    pub technician_id: Option<Uuid>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub post_wash_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<VehicleWashStatusRow> for VehicleWashStatus {
    fn from(row: VehicleWashStatusRow) -> Self {
        Self {
            id: row.id,
            wash_request_id: row.wash_request_id,
            vehicle_id: row.vehicle_id,
            technician_id: row.technician_id,
            completed: row.completed,
            notes: row.notes,
            post_wash_photo: row.post_wash_photo,
            updated_at: row.updated_at,
        }
    }
}

impl From<&VehicleWashStatus> for VehicleWashStatusRow {
    fn from(status: &VehicleWashStatus) -> Self {
        Self {
            id: status.id,
            wash_request_id: status.wash_request_id,
            vehicle_id: status.vehicle_id,
            technician_id: status.technician_id,
            completed: status.completed,
            notes: status.notes.clone(),
            post_wash_photo: status.post_wash_photo.clone(),
            updated_at: status.updated_at,
        }
    }
}
