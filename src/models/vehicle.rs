//! Modelo de Vehicle
//!
//! `Vehicle` es la forma de dominio (camelCase); `VehicleRow` mapea exactamente
//! la tabla `vehicles`. Las actualizaciones parciales solo envían los campos presentes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::{validate_license_plate, validate_not_blank, validate_vin};

/// Vehicle de dominio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
    pub license_plate: Option<String>,
    pub vin: Option<String>,
    pub image: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Ubicación actual, derivada de `location_vehicles` (no es columna)
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

impl Vehicle {
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// Fila de la tabla `vehicles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(rename = "type", default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub vin_number: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.user_id,
            organization_id: row.organization_id,
            make: row.make,
            model: row.model,
            year: row.year,
            color: row.color,
            vehicle_type: row.vehicle_type,
            license_plate: row.license_plate,
            vin: row.vin_number,
            image: row.image_url,
            created_at: row.created_at,
            location_id: None,
        }
    }
}

impl From<&Vehicle> for VehicleRow {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id,
            user_id: vehicle.customer_id,
            organization_id: vehicle.organization_id,
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
            year: vehicle.year,
            color: vehicle.color.clone(),
            vehicle_type: vehicle.vehicle_type.clone(),
            license_plate: vehicle.license_plate.clone(),
            vin_number: vehicle.vin.clone(),
            image_url: vehicle.image.clone(),
            created_at: vehicle.created_at,
        }
    }
}

/// Request para crear un nuevo vehículo
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub make: String,

    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub model: String,

    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,

    #[validate(length(max = 50))]
    pub color: Option<String>,

    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,

    #[validate(custom = "validate_license_plate")]
    pub license_plate: Option<String>,

    #[validate(custom = "validate_vin")]
    pub vin: Option<String>,

    pub image: Option<String>,

    /// Ubicación inicial opcional
    pub location_id: Option<Uuid>,
}

/// Fila para insertar en `vehicles` (el id lo genera el backend)
#[derive(Debug, Clone, Serialize)]
pub struct NewVehicleRow {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewVehicleRow {
    pub fn new(data: &NewVehicle, customer_id: Uuid, organization_id: Option<Uuid>) -> Self {
        Self {
            user_id: customer_id,
            organization_id,
            make: data.make.trim().to_string(),
            model: data.model.trim().to_string(),
            year: data.year,
            color: data.color.clone(),
            vehicle_type: data.vehicle_type.clone(),
            license_plate: data.license_plate.as_ref().map(|p| p.trim().to_uppercase()),
            vin_number: data.vin.as_ref().map(|v| v.trim().to_uppercase()),
            image_url: data.image.clone(),
        }
    }
}

/// Request para actualizar un vehículo existente.
/// `None` = no tocar; `Some(None)` = borrar el valor.
#[derive(Debug, Clone, Default, Validate)]
pub struct VehicleUpdate {
    #[validate(length(min = 1, max = 100))]
    pub make: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    pub color: Option<Option<String>>,
    pub vehicle_type: Option<Option<String>>,
    pub license_plate: Option<Option<String>>,
    pub vin: Option<Option<String>>,
    pub image: Option<Option<String>>,
}

impl VehicleUpdate {
    /// Validar campos presentes (incluye formato de matrícula y VIN)
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        let mut errors = validator::ValidationErrors::new();
        if let Some(Some(plate)) = &self.license_plate {
            if let Err(e) = validate_license_plate(plate) {
                errors.add("license_plate", e);
            }
        }
        if let Some(Some(vin)) = &self.vin {
            if let Err(e) = validate_vin(vin) {
                errors.add("vin", e);
            }
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.make.is_none()
            && self.model.is_none()
            && self.year.is_none()
            && self.color.is_none()
            && self.vehicle_type.is_none()
            && self.license_plate.is_none()
            && self.vin.is_none()
            && self.image.is_none()
    }

    /// Aplicar el cambio sobre la copia local
    pub fn apply_to(&self, vehicle: &mut Vehicle) {
        if let Some(make) = &self.make {
            vehicle.make = make.clone();
        }
        if let Some(model) = &self.model {
            vehicle.model = model.clone();
        }
        if let Some(year) = self.year {
            vehicle.year = year;
        }
        if let Some(color) = &self.color {
            vehicle.color = color.clone();
        }
        if let Some(vehicle_type) = &self.vehicle_type {
            vehicle.vehicle_type = vehicle_type.clone();
        }
        if let Some(plate) = &self.license_plate {
            vehicle.license_plate = plate.clone();
        }
        if let Some(vin) = &self.vin {
            vehicle.vin = vin.clone();
        }
        if let Some(image) = &self.image {
            vehicle.image = image.clone();
        }
    }
}

/// Patch parcial para `vehicles`: los campos `None` se omiten
#[derive(Debug, Clone, Default, Serialize)]
pub struct VehiclePatchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin_number: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
}

impl From<&VehicleUpdate> for VehiclePatchRow {
    fn from(update: &VehicleUpdate) -> Self {
        Self {
            make: update.make.clone(),
            model: update.model.clone(),
            year: update.year,
            color: update.color.clone(),
            vehicle_type: update.vehicle_type.clone(),
            license_plate: update.license_plate.clone(),
            vin_number: update.vin.clone(),
            image_url: update.image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vehicle() -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            organization_id: Some(Uuid::new_v4()),
            make: "Toyota".to_string(),
            model: "Hilux".to_string(),
            year: 2021,
            color: Some("white".to_string()),
            vehicle_type: Some("truck".to_string()),
            license_plate: Some("ABC-123".to_string()),
            vin: Some("1HGCM82633A004352".to_string()),
            image: None,
            created_at: Some(Utc::now()),
            location_id: None,
        }
    }

    #[test]
    fn test_wire_round_trip() {
        let vehicle = sample_vehicle();
        let json = serde_json::to_value(VehicleRow::from(&vehicle)).unwrap();
        assert_eq!(json["vin_number"], "1HGCM82633A004352");
        assert_eq!(json["type"], "truck");
        let back: VehicleRow = serde_json::from_value(json).unwrap();
        assert_eq!(Vehicle::from(back), vehicle);
    }

    #[test]
    fn test_new_vehicle_requires_make_model_year() {
        let missing = NewVehicle {
            make: " ".to_string(),
            model: String::new(),
            year: 1800,
            ..Default::default()
        };
        let errors = missing.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("make"));
        assert!(fields.contains_key("model"));
        assert!(fields.contains_key("year"));
    }

    #[test]
    fn test_patch_omits_untouched_fields() {
        let update = VehicleUpdate {
            color: Some(None),
            year: Some(2022),
            ..Default::default()
        };
        let json = serde_json::to_value(VehiclePatchRow::from(&update)).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj["color"].is_null());
        assert_eq!(obj["year"], 2022);
    }

    #[test]
    fn test_update_rejects_bad_vin() {
        let update = VehicleUpdate {
            vin: Some(Some("short".to_string())),
            ..Default::default()
        };
        assert!(matches!(update.check(), Err(AppError::Validation(_))));
    }
}
