//! Cache
//!
//! Este módulo contiene la persistencia local (perfil, sesión, outbox) y el
//! estado en memoria con cambios tentativos.

pub mod local_store;
pub mod optimistic;
pub mod profile_cache;

pub use local_store::JsonFileStore;
pub use optimistic::{Keyed, OptimisticStore, Tentative};
pub use profile_cache::ProfileCache;
