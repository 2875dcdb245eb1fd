//! Modelo de usuario y roles
//!
//! `UserRole` es el único enum de roles del cliente. La base guarda
//! `fleet_manager` como `customer`; la tabla `ROLE_STORAGE` documenta
//! ese mapeo y las capacidades se expresan con predicados, no comparando strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles del sistema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    FleetManager,
    Technician,
    Admin,
}

/// Rol de producto -> valor guardado en `profiles.role`
pub const ROLE_STORAGE: &[(UserRole, &str)] = &[
    (UserRole::Customer, "customer"),
    (UserRole::FleetManager, "customer"),
    (UserRole::Technician, "technician"),
    (UserRole::Admin, "admin"),
];

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::FleetManager => "fleet_manager",
            UserRole::Technician => "technician",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(UserRole::Customer),
            "fleet_manager" => Some(UserRole::FleetManager),
            "technician" => Some(UserRole::Technician),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// Valor que se persiste en la columna `profiles.role`
    pub fn stored_value(&self) -> &'static str {
        ROLE_STORAGE
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, stored)| *stored)
            .unwrap_or("customer")
    }

    /// Reconstruye el rol de producto a partir del valor guardado y del rol
    /// declarado en los metadatos de la cuenta (si existe).
    pub fn from_stored(stored: &str, declared: Option<&str>) -> Self {
        let declared = declared.and_then(UserRole::parse);
        match (stored, declared) {
            (_, Some(role)) if role.stored_value() == stored => role,
            _ => ROLE_STORAGE
                .iter()
                .find(|(_, value)| *value == stored)
                .map(|(role, _)| *role)
                .unwrap_or(UserRole::Customer),
        }
    }

    /// Puede registrar vehículos y pedir lavados
    pub fn can_request_washes(&self) -> bool {
        matches!(self, UserRole::Customer | UserRole::FleetManager | UserRole::Admin)
    }

    /// Ve las filas de toda su organización (no solo las propias)
    pub fn has_organization_visibility(&self) -> bool {
        matches!(self, UserRole::Customer | UserRole::FleetManager | UserRole::Admin)
    }

    /// Puede aceptar y ejecutar trabajos de lavado
    pub fn can_work_jobs(&self) -> bool {
        matches!(self, UserRole::Technician | UserRole::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usuario autenticado (forma de dominio)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: String,
    pub role: UserRole,
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub organization_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl User {
    /// Perfil mínimo sintetizado cuando la fila de `profiles` falta o falla
    pub fn minimal(id: Uuid, email: Option<String>) -> Self {
        Self {
            id,
            email,
            name: "User".to_string(),
            role: UserRole::Customer,
            organization_id: None,
            organization_name: None,
            avatar_url: None,
        }
    }
}

/// Fila de la tabla `profiles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileRow {
    pub fn into_user(self, declared_role: Option<&str>) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| "User".to_string()),
            role: UserRole::from_stored(&self.role, declared_role),
            organization_id: self.organization_id,
            organization_name: None,
            avatar_url: self.avatar_url,
        }
    }
}

impl From<&User> for ProfileRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: Some(user.name.clone()),
            role: user.role.stored_value().to_string(),
            organization_id: user.organization_id,
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_manager_is_stored_as_customer() {
        assert_eq!(UserRole::FleetManager.stored_value(), "customer");
        assert_eq!(UserRole::Technician.stored_value(), "technician");
    }

    #[test]
    fn test_from_stored_uses_declared_role() {
        assert_eq!(UserRole::from_stored("customer", Some("fleet_manager")), UserRole::FleetManager);
        assert_eq!(UserRole::from_stored("customer", None), UserRole::Customer);
        // un rol declarado que no corresponde al guardado se ignora
        assert_eq!(UserRole::from_stored("technician", Some("admin")), UserRole::Technician);
        assert_eq!(UserRole::from_stored("garbage", None), UserRole::Customer);
    }

    #[test]
    fn test_capabilities() {
        assert!(UserRole::FleetManager.can_request_washes());
        assert!(UserRole::FleetManager.has_organization_visibility());
        assert!(!UserRole::Technician.can_request_washes());
        assert!(UserRole::Technician.can_work_jobs());
        assert!(!UserRole::Customer.can_work_jobs());
    }

    #[test]
    fn test_profile_round_trip() {
        let user = User {
            id: Uuid::new_v4(),
            email: Some("fm@fleet.io".to_string()),
            name: "Fleet Boss".to_string(),
            role: UserRole::FleetManager,
            organization_id: Some(Uuid::new_v4()),
            organization_name: None,
            avatar_url: None,
        };
        let row = ProfileRow::from(&user);
        assert_eq!(row.role, "customer");
        assert_eq!(row.into_user(Some("fleet_manager")), user);
    }
}
