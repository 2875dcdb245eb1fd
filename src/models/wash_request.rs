//! Modelo de WashRequest
//!
//! Contiene la máquina de estados del pedido de lavado. Todas las transiciones
//! pasan por `TRANSITIONS`; cualquier par (estado, acción) que no esté en la
//! tabla se rechaza.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::vehicle::Vehicle;

/// Estado del pedido de lavado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WashStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

/// Acciones que mueven un pedido entre estados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WashAction {
    Accept,
    Start,
    Complete,
    Cancel,
}

/// (estado actual, acción) -> estado nuevo
pub const TRANSITIONS: &[(WashStatus, WashAction, WashStatus)] = &[
    (WashStatus::Pending, WashAction::Accept, WashStatus::Confirmed),
    (WashStatus::Pending, WashAction::Cancel, WashStatus::Cancelled),
    (WashStatus::Confirmed, WashAction::Start, WashStatus::InProgress),
    (WashStatus::Confirmed, WashAction::Cancel, WashStatus::Cancelled),
    (WashStatus::InProgress, WashAction::Complete, WashStatus::Completed),
];

impl WashStatus {
    pub const ALL: [WashStatus; 5] = [
        WashStatus::Pending,
        WashStatus::Confirmed,
        WashStatus::InProgress,
        WashStatus::Completed,
        WashStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WashStatus::Pending => "pending",
            WashStatus::Confirmed => "confirmed",
            WashStatus::InProgress => "in_progress",
            WashStatus::Completed => "completed",
            WashStatus::Cancelled => "cancelled",
        }
    }

    /// Estado resultante de aplicar `action`, si la tabla lo permite
    pub fn apply(self, action: WashAction) -> Option<WashStatus> {
        TRANSITIONS
            .iter()
            .find(|(from, act, _)| *from == self && *act == action)
            .map(|(_, _, to)| *to)
    }

    /// Acción que lleva de `self` a `target`, si existe
    pub fn action_to(self, target: WashStatus) -> Option<WashAction> {
        TRANSITIONS
            .iter()
            .find(|(from, _, to)| *from == self && *to == target)
            .map(|(_, act, _)| *act)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WashStatus::Completed | WashStatus::Cancelled)
    }

    /// Estados que bloquean el borrado de la ubicación referenciada
    pub fn active_values() -> Vec<&'static str> {
        WashStatus::ALL
            .iter()
            .filter(|s| !s.is_terminal())
            .map(|s| s.as_str())
            .collect()
    }
}

impl std::fmt::Display for WashStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for WashAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WashAction::Accept => "accept",
            WashAction::Start => "start",
            WashAction::Complete => "complete",
            WashAction::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Frecuencia de repetición del lavado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringFrequency {
    #[default]
    None,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
}

impl RecurringFrequency {
    /// Días aproximados entre repeticiones
    pub fn interval_days(&self) -> Option<i64> {
        match self {
            RecurringFrequency::None => None,
            RecurringFrequency::Weekly => Some(7),
            RecurringFrequency::Biweekly => Some(14),
            RecurringFrequency::Monthly => Some(30),
            RecurringFrequency::Quarterly => Some(91),
        }
    }
}

/// Resumen de ubicación expandido en el pedido
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    /// La fila no existe (o no es visible); se sintetizó un resumen mínimo
    #[serde(default)]
    pub placeholder: bool,
}

impl LocationSummary {
    pub fn placeholder(id: Uuid) -> Self {
        Self {
            id,
            name: "Unknown location".to_string(),
            address: String::new(),
            placeholder: true,
        }
    }
}

/// Servicios seleccionados por vehículo
pub type VehicleServices = BTreeMap<Uuid, Vec<String>>;

/// WashRequest de dominio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WashRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub vehicle_ids: Vec<Uuid>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub location: Option<LocationSummary>,
    pub preferred_date_start: DateTime<Utc>,
    pub preferred_date_end: Option<DateTime<Utc>>,
    pub status: WashStatus,
    pub technician_id: Option<Uuid>,
    pub price: Decimal,
    pub notes: Option<String>,
    #[serde(default)]
    pub recurring_frequency: RecurringFrequency,
    pub recurring_count: Option<u32>,
    #[serde(default)]
    pub vehicle_services: VehicleServices,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WashRequest {
    /// Construir desde la fila y las asociaciones del join
    pub fn from_row(row: WashRequestRow, vehicle_ids: Vec<Uuid>) -> Self {
        Self {
            id: row.id,
            customer_id: row.user_id,
            organization_id: row.organization_id,
            vehicle_ids,
            vehicles: Vec::new(),
            location_id: row.location_id,
            location: None,
            preferred_date_start: row.preferred_date_start,
            preferred_date_end: row.preferred_date_end,
            status: row.status,
            technician_id: row.technician_id,
            price: row.price,
            notes: row.notes,
            recurring_frequency: row.recurring_frequency.unwrap_or_default(),
            recurring_count: row.recurring_count.and_then(|c| u32::try_from(c).ok()),
            vehicle_services: row.vehicle_services.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// Un trabajo disponible: pendiente y sin técnico asignado
    pub fn is_open_job(&self) -> bool {
        self.status == WashStatus::Pending && self.technician_id.is_none()
    }
}

impl From<&WashRequest> for WashRequestRow {
    fn from(request: &WashRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.customer_id,
            organization_id: request.organization_id,
            location_id: request.location_id,
            technician_id: request.technician_id,
            preferred_date_start: request.preferred_date_start,
            preferred_date_end: request.preferred_date_end,
            status: request.status,
            price: request.price,
            notes: request.notes.clone(),
            recurring_frequency: match request.recurring_frequency {
                RecurringFrequency::None => None,
                other => Some(other),
            },
            recurring_count: request.recurring_count.map(i64::from),
            vehicle_services: if request.vehicle_services.is_empty() {
                None
            } else {
                Some(request.vehicle_services.clone())
            },
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Fila de la tabla `wash_requests`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashRequestRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub technician_id: Option<Uuid>,
    pub preferred_date_start: DateTime<Utc>,
    #[serde(default)]
    pub preferred_date_end: Option<DateTime<Utc>>,
    pub status: WashStatus,
    pub price: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub recurring_frequency: Option<RecurringFrequency>,
    #[serde(default)]
    pub recurring_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_services: Option<VehicleServices>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request para crear un pedido de lavado
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewWashRequest {
    #[validate(length(min = 1))]
    pub vehicle_ids: Vec<Uuid>,
    #[validate(required)]
    pub preferred_date_start: Option<DateTime<Utc>>,
    pub preferred_date_end: Option<DateTime<Utc>>,
    #[validate(required)]
    pub location_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(default)]
    pub recurring_frequency: RecurringFrequency,
    pub recurring_count: Option<u32>,
    #[serde(default)]
    pub vehicle_services: VehicleServices,
}

/// Fila para insertar en `wash_requests`
#[derive(Debug, Clone, Serialize)]
pub struct NewWashRequestRow {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    pub preferred_date_start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_date_end: Option<DateTime<Utc>>,
    pub status: WashStatus,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_frequency: Option<RecurringFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_services: Option<VehicleServices>,
}

impl NewWashRequestRow {
    /// Copia sin ubicación, para el último intento de inserción
    pub fn without_location(&self) -> Self {
        Self {
            location_id: None,
            ..self.clone()
        }
    }
}

/// Precio plano por vehículo (sin descuentos)
pub fn price_for(vehicle_count: usize, rate: Decimal) -> Decimal {
    rate * Decimal::from(vehicle_count as u64)
}

/// Actualización parcial de un pedido.
/// `None` = no tocar; `Some(None)` = borrar el valor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WashRequestPatch {
    pub status: Option<WashStatus>,
    pub technician_id: Option<Option<Uuid>>,
    pub preferred_date_start: Option<DateTime<Utc>>,
    pub preferred_date_end: Option<Option<DateTime<Utc>>>,
    pub location_id: Option<Option<Uuid>>,
    pub notes: Option<Option<String>>,
    pub vehicle_ids: Option<Vec<Uuid>>,
    pub recurring_frequency: Option<RecurringFrequency>,
    pub recurring_count: Option<Option<u32>>,
    pub price: Option<Decimal>,
}

impl WashRequestPatch {
    pub fn status(status: WashStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn vehicles(vehicle_ids: Vec<Uuid>) -> Self {
        Self {
            vehicle_ids: Some(vehicle_ids),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Incluye asignación de técnico (el refresh posterior es inmediato)
    pub fn assigns_technician(&self) -> bool {
        matches!(self.technician_id, Some(Some(_)))
    }

    /// Aplicar el cambio sobre la copia local
    pub fn apply_to(&self, request: &mut WashRequest) {
        if let Some(status) = self.status {
            request.status = status;
        }
        if let Some(technician_id) = self.technician_id {
            request.technician_id = technician_id;
        }
        if let Some(start) = self.preferred_date_start {
            request.preferred_date_start = start;
        }
        if let Some(end) = self.preferred_date_end {
            request.preferred_date_end = end;
        }
        if let Some(location_id) = self.location_id {
            if request.location_id != location_id {
                request.location = None;
            }
            request.location_id = location_id;
        }
        if let Some(notes) = &self.notes {
            request.notes = notes.clone();
        }
        if let Some(vehicle_ids) = &self.vehicle_ids {
            request.vehicles.retain(|v| vehicle_ids.contains(&v.id));
            request.vehicle_ids = vehicle_ids.clone();
        }
        if let Some(frequency) = self.recurring_frequency {
            request.recurring_frequency = frequency;
        }
        if let Some(count) = self.recurring_count {
            request.recurring_count = count;
        }
        if let Some(price) = self.price {
            request.price = price;
        }
    }

    /// Columnas de `wash_requests` afectadas por el patch
    pub fn to_row(&self) -> WashRequestPatchRow {
        WashRequestPatchRow {
            status: self.status,
            technician_id: self.technician_id,
            preferred_date_start: self.preferred_date_start,
            preferred_date_end: self.preferred_date_end,
            location_id: self.location_id,
            notes: self.notes.clone(),
            recurring_frequency: self.recurring_frequency.map(|f| match f {
                RecurringFrequency::None => None,
                other => Some(other),
            }),
            recurring_count: self.recurring_count.map(|c| c.map(i64::from)),
            price: self.price,
        }
    }
}

/// Patch parcial para `wash_requests`: los campos `None` se omiten
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WashRequestPatchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WashStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_date_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_date_end: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_frequency: Option<Option<RecurringFrequency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_count: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl WashRequestPatchRow {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fila del join `wash_request_vehicles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashRequestVehicleRow {
    pub wash_request_id: Uuid,
    pub vehicle_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_legal_edges() {
        let legal = [
            (WashStatus::Pending, WashStatus::Confirmed),
            (WashStatus::Pending, WashStatus::Cancelled),
            (WashStatus::Confirmed, WashStatus::InProgress),
            (WashStatus::Confirmed, WashStatus::Cancelled),
            (WashStatus::InProgress, WashStatus::Completed),
        ];
        for from in WashStatus::ALL {
            for to in WashStatus::ALL {
                let allowed = from.action_to(to).is_some();
                assert_eq!(allowed, legal.contains(&(from, to)), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exit() {
        for action in [WashAction::Accept, WashAction::Start, WashAction::Complete, WashAction::Cancel] {
            assert_eq!(WashStatus::Completed.apply(action), None);
            assert_eq!(WashStatus::Cancelled.apply(action), None);
        }
        assert_eq!(WashStatus::Pending.apply(WashAction::Start), None);
        assert_eq!(WashStatus::InProgress.apply(WashAction::Cancel), None);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(WashStatus::InProgress).unwrap(), "in_progress");
        assert_eq!(WashStatus::active_values(), vec!["pending", "confirmed", "in_progress"]);
    }

    #[test]
    fn test_price_is_flat_per_vehicle() {
        let rate = Decimal::new(2500, 2);
        assert_eq!(price_for(3, rate), Decimal::new(7500, 2));
        assert_eq!(price_for(0, rate), Decimal::ZERO);
    }

    #[test]
    fn test_wire_round_trip() {
        let vehicle_id = Uuid::new_v4();
        let mut services = VehicleServices::new();
        services.insert(vehicle_id, vec!["exterior".to_string(), "interior".to_string()]);
        let request = WashRequest {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            organization_id: Some(Uuid::new_v4()),
            vehicle_ids: vec![vehicle_id],
            vehicles: Vec::new(),
            location_id: Some(Uuid::new_v4()),
            location: None,
            preferred_date_start: Utc::now(),
            preferred_date_end: None,
            status: WashStatus::Confirmed,
            technician_id: Some(Uuid::new_v4()),
            price: Decimal::new(2500, 2),
            notes: Some("gate code 1234".to_string()),
            recurring_frequency: RecurringFrequency::Biweekly,
            recurring_count: Some(4),
            vehicle_services: services,
            created_at: None,
            updated_at: None,
        };
        let json = serde_json::to_value(WashRequestRow::from(&request)).unwrap();
        assert_eq!(json["status"], "confirmed");
        assert_eq!(json["recurring_frequency"], "biweekly");
        let row: WashRequestRow = serde_json::from_value(json).unwrap();
        assert_eq!(WashRequest::from_row(row, vec![vehicle_id]), request);
    }

    #[test]
    fn test_patch_row_only_carries_present_fields() {
        let patch = WashRequestPatch {
            status: Some(WashStatus::Cancelled),
            notes: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(patch.to_row()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj["notes"].is_null());
        assert!(WashRequestPatch::vehicles(vec![]).to_row().is_empty());
    }
}
