use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

// Aceptación de un trabajo por un técnico
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptJobRequest {
    pub request_id: Uuid,
    pub technician_id: Uuid,
    /// Fecha programada por el técnico (reemplaza la preferida)
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
}

impl AcceptJobRequest {
    pub fn new(request_id: Uuid, technician_id: Uuid) -> Self {
        Self {
            request_id,
            technician_id,
            scheduled_start: None,
            scheduled_end: None,
        }
    }

    pub fn scheduled(mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        self.scheduled_start = Some(start);
        self.scheduled_end = end;
        self
    }
}
