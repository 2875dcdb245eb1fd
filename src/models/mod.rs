//! Modelos del sistema
//!
//! Formas de dominio (camelCase) y filas del backend (snake_case, nombres de
//! columna exactos), con el mapeo entre ambas.

pub mod auth;
pub mod location;
pub mod organization;
pub mod user;
pub mod vehicle;
pub mod wash_request;
pub mod wash_status;

pub use auth::{AuthEvent, AuthSession, AuthUser, SignUpData};
pub use location::{Location, LocationUpdate, NewLocation};
pub use organization::Organization;
pub use user::{User, UserRole};
pub use vehicle::{NewVehicle, Vehicle, VehicleUpdate};
pub use wash_request::{
    NewWashRequest, RecurringFrequency, WashAction, WashRequest, WashRequestPatch, WashStatus,
};
pub use wash_status::VehicleWashStatus;
