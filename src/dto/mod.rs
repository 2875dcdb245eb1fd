//! DTOs de entrada de las operaciones de servicio

pub mod auth_dto;
pub mod wash_request_dto;

pub use auth_dto::{LoginRequest, RegisterRequest};
pub use wash_request_dto::AcceptJobRequest;
