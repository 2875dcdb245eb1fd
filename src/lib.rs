//! washflow
//!
//! Cliente de agenda de lavado de vehículos sobre un backend hospedado:
//! sesión, vehículos, ubicaciones y el ciclo de vida de los pedidos.

pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod dto;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;

pub use state::AppState;
pub use utils::errors::{AppError, AppResult};
