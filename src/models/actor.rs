use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Driver,
    Admin,
    HubManager,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Role::Customer),
            "DRIVER" => Ok(Role::Driver),
            "ADMIN" => Ok(Role::Admin),
            "HUB_MANAGER" => Ok(Role::HubManager),
            other => Err(format!(
                "unknown role: {other}, expected CUSTOMER/DRIVER/ADMIN/HUB_MANAGER"
            )),
        }
    }
}

/// Whoever produced a request or an event. For `Role::Driver` the id is the driver id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self.role, Role::Admin | Role::HubManager)
    }

    pub fn is_driver(&self, driver_id: Uuid) -> bool {
        self.role == Role::Driver && self.id == driver_id
    }
}
