#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use washflow::backend::MemoryBackend;
use washflow::config::EnvironmentConfig;
use washflow::models::{User, UserRole};
use washflow::AppState;

pub const PASSWORD: &str = "secret123";

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub state: AppState,
}

/// Config de tests: tiempos cortos, sin caché en disco
pub fn test_config() -> EnvironmentConfig {
    EnvironmentConfig {
        profile_retry_delay_ms: 10,
        post_update_refresh_delay_ms: 10,
        accept_step_delay_ms: 10,
        ..EnvironmentConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config(), Arc::new(MemoryBackend::new()))
}

pub fn harness_with(config: EnvironmentConfig, backend: Arc<MemoryBackend>) -> Harness {
    let state = AppState::new(config, backend.clone(), backend.clone());
    Harness { backend, state }
}

impl Harness {
    /// Crear cuenta + perfil y abrir sesión con ese rol
    pub async fn sign_in_as(&self, role: UserRole, organization_id: Option<Uuid>) -> User {
        let email = format!("{}-{}@wash.test", role, Uuid::new_v4().simple());
        let account = self
            .backend
            .add_account(&email, PASSWORD, json!({ "name": "Tester", "role": role.as_str() }));
        self.backend.seed(
            "profiles",
            vec![json!({
                "id": account.id,
                "email": email,
                "name": format!("{} tester", role),
                "role": role.stored_value(),
                "organization_id": organization_id,
            })],
        );
        self.state
            .session
            .login(&email, PASSWORD)
            .await
            .expect("login should succeed")
    }

    /// Pedido sembrado directamente en el backend, con sus vehículos
    pub fn seed_request(
        &self,
        customer_id: Uuid,
        status: &str,
        technician_id: Option<Uuid>,
        vehicle_ids: &[Uuid],
    ) -> Uuid {
        self.seed_request_at(customer_id, status, technician_id, vehicle_ids, None)
    }

    pub fn seed_request_at(
        &self,
        customer_id: Uuid,
        status: &str,
        technician_id: Option<Uuid>,
        vehicle_ids: &[Uuid],
        location_id: Option<Uuid>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.backend.seed(
            "wash_requests",
            vec![json!({
                "id": id,
                "user_id": customer_id,
                "organization_id": null,
                "location_id": location_id,
                "technician_id": technician_id,
                "preferred_date_start": tomorrow(),
                "preferred_date_end": null,
                "status": status,
                "price": format!("{}.00", 25 * vehicle_ids.len()),
                "notes": null,
            })],
        );
        self.backend.seed(
            "wash_request_vehicles",
            vehicle_ids
                .iter()
                .map(|vehicle_id| json!({ "wash_request_id": id, "vehicle_id": vehicle_id }))
                .collect(),
        );
        id
    }

    pub fn seed_location(&self, organization_id: Option<Uuid>, created_by: Uuid, name: &str, is_default: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.backend.seed(
            "locations",
            vec![json!({
                "id": id,
                "organization_id": organization_id,
                "name": name,
                "address": "12 Main St",
                "is_default": is_default,
                "created_by": created_by,
            })],
        );
        id
    }

    pub fn request_row(&self, id: Uuid) -> Value {
        self.backend
            .rows("wash_requests")
            .into_iter()
            .find(|row| row["id"] == json!(id))
            .expect("wash request row")
    }

    /// Vehículos asociados al pedido en el join
    pub fn linked_vehicles(&self, request_id: Uuid) -> Vec<Uuid> {
        self.backend
            .rows("wash_request_vehicles")
            .into_iter()
            .filter(|row| row["wash_request_id"] == json!(request_id))
            .filter_map(|row| row["vehicle_id"].as_str().and_then(|v| Uuid::parse_str(v).ok()))
            .collect()
    }
}

pub fn tomorrow() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}
