//! Modelo de Location
//!
//! Mapea la tabla `locations`. `vehicle_count` se calcula contando filas de
//! `location_vehicles` y nunca se envía al backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::validate_not_blank;

/// Location de dominio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_default: bool,
    pub created_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vehicle_count: u64,
}

impl Location {
    /// Dirección en una línea para listados
    pub fn full_address(&self) -> String {
        let mut parts = vec![self.address.clone()];
        for part in [&self.city, &self.state, &self.zip_code].into_iter().flatten() {
            if !part.trim().is_empty() {
                parts.push(part.clone());
            }
        }
        parts.join(", ")
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Fila de la tabla `locations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRow {
    pub id: Uuid,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            address: row.address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            latitude: row.latitude,
            longitude: row.longitude,
            is_default: row.is_default,
            created_by: row.created_by,
            created_at: row.created_at,
            vehicle_count: 0,
        }
    }
}

impl From<&Location> for LocationRow {
    fn from(location: &Location) -> Self {
        Self {
            id: location.id,
            organization_id: location.organization_id,
            name: location.name.clone(),
            address: location.address.clone(),
            city: location.city.clone(),
            state: location.state.clone(),
            zip_code: location.zip_code.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            is_default: location.is_default,
            created_by: location.created_by,
            created_at: location.created_at,
        }
    }
}

/// Request para crear una ubicación
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    #[validate(length(min = 1, max = 120), custom = "validate_not_blank")]
    pub name: String,
    #[validate(length(min = 3, max = 250), custom = "validate_not_blank")]
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_default: bool,
}

impl NewLocation {
    /// Validar campos y rango de coordenadas
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        check_coordinates(self.latitude, self.longitude)
    }
}

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> AppResult<()> {
    let mut errors = validator::ValidationErrors::new();
    if latitude.map_or(false, |lat| !(-90.0..=90.0).contains(&lat)) {
        errors.add("latitude", validator::ValidationError::new("range"));
    }
    if longitude.map_or(false, |lng| !(-180.0..=180.0).contains(&lng)) {
        errors.add("longitude", validator::ValidationError::new("range"));
    }
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Fila para insertar en `locations`
#[derive(Debug, Clone, Serialize)]
pub struct NewLocationRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub is_default: bool,
    pub created_by: Uuid,
}

impl NewLocationRow {
    pub fn new(data: &NewLocation, created_by: Uuid, organization_id: Option<Uuid>) -> Self {
        Self {
            organization_id,
            name: data.name.trim().to_string(),
            address: data.address.trim().to_string(),
            city: data.city.clone(),
            state: data.state.clone(),
            zip_code: data.zip_code.clone(),
            latitude: data.latitude,
            longitude: data.longitude,
            // el flag default se escribe aparte para limpiar las demás filas
            is_default: false,
            created_by,
        }
    }
}

/// Request de actualización parcial de una ubicación
#[derive(Debug, Clone, Default, Validate)]
pub struct LocationUpdate {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 250))]
    pub address: Option<String>,
    pub city: Option<Option<String>>,
    pub state: Option<Option<String>>,
    pub zip_code: Option<Option<String>>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
}

impl LocationUpdate {
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        check_coordinates(self.latitude.flatten(), self.longitude.flatten())
    }

    pub fn apply_to(&self, location: &mut Location) {
        if let Some(name) = &self.name {
            location.name = name.clone();
        }
        if let Some(address) = &self.address {
            location.address = address.clone();
        }
        if let Some(city) = &self.city {
            location.city = city.clone();
        }
        if let Some(state) = &self.state {
            location.state = state.clone();
        }
        if let Some(zip_code) = &self.zip_code {
            location.zip_code = zip_code.clone();
        }
        if let Some(latitude) = self.latitude {
            location.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            location.longitude = longitude;
        }
    }
}

/// Patch parcial para `locations`
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationPatchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Option<f64>>,
}

impl From<&LocationUpdate> for LocationPatchRow {
    fn from(update: &LocationUpdate) -> Self {
        Self {
            name: update.name.clone(),
            address: update.address.clone(),
            city: update.city.clone(),
            state: update.state.clone(),
            zip_code: update.zip_code.clone(),
            latitude: update.latitude,
            longitude: update.longitude,
        }
    }
}

/// Fila del join `location_vehicles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationVehicleRow {
    pub location_id: Uuid,
    pub vehicle_id: Uuid,
}
