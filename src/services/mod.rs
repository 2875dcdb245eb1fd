//! Services module
//!
//! Este módulo contiene la lógica de negocio del cliente: sesión, repositorios
//! con estado en memoria, el ciclo de vida de los pedidos de lavado y el
//! registro de acciones pendientes.

pub mod location_service;
pub mod notification_service;
pub mod outbox;
pub mod refresh_throttle;
pub mod session_service;
pub mod vehicle_service;
pub mod wash_progress_service;
pub mod wash_request_service;

pub use location_service::LocationService;
pub use notification_service::{Notification, NotificationKind, Notifier};
pub use outbox::{Outbox, OutboxEntry, PendingAction, ReconcileReport};
pub use refresh_throttle::RefreshOutcome;
pub use session_service::{SessionManager, SessionState};
pub use vehicle_service::VehicleService;
pub use wash_progress_service::WashProgressService;
pub use wash_request_service::WashRequestService;
