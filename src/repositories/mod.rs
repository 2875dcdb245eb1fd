//! Repositorios
//!
//! Acceso a tablas del backend, uno por tabla (más sus tablas de join).
//! Son stateless: conocen nombres de tabla y columnas y el mapeo wire <-> dominio.

pub mod location_repository;
pub mod profile_repository;
pub mod vehicle_repository;
pub mod vehicle_wash_status_repository;
pub mod wash_request_repository;

pub use location_repository::LocationRepository;
pub use profile_repository::{OrganizationRepository, ProfileRepository};
pub use vehicle_repository::VehicleRepository;
pub use vehicle_wash_status_repository::VehicleWashStatusRepository;
pub use wash_request_repository::{InsertPath, WashRequestRepository};
