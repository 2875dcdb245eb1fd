use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fila de la tabla `organizations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
}
