use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Capability reported by the auth boundary. The engine never computes
/// this, only consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Per-request caller identity, supplied by the external auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub caller_id: Ulid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(caller_id: Ulid, role: Role) -> Self {
        Self { caller_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
