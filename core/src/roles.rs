use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Canonical user role. Stored as text in the users table; this is the
/// single source of truth. Admin/volunteer capabilities are derived by
/// the predicates below and never persisted alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    /// Protected role: manages other users' roles, cannot be demoted or
    /// deleted by any actor, including itself.
    UltimateAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::UltimateAdmin => "ultimate_admin",
        }
    }

    /// Parse the text stored in the users.role column. Unknown values map
    /// to the least-privileged role rather than failing the request.
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "ultimate_admin" => Role::UltimateAdmin,
            _ => Role::User,
        }
    }

    /// Strict variant for role assignment, where a typo must be an error
    /// instead of a silent demotion to `user`.
    pub fn parse_strict(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "ultimate_admin" => Some(Role::UltimateAdmin),
            _ => None,
        }
    }
}

/// An authenticated identity, as produced by the token-verification
/// boundary. Loaded fresh from the users table on every request so a role
/// change takes effect on the next call; nothing here is cached.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_volunteer: bool,
}

impl Identity {
    /// Admin capability: view the flagged queue, delete letters.
    pub fn has_admin_access(&self) -> bool {
        matches!(self.role, Role::Admin | Role::UltimateAdmin)
    }

    /// User-management capability: list users, change roles, delete users.
    pub fn can_manage_users(&self) -> bool {
        self.role == Role::UltimateAdmin
    }

    /// Volunteer capability: view the unprocessed queue, answer letters.
    /// Admins always qualify.
    pub fn has_volunteer_access(&self) -> bool {
        self.is_volunteer || self.has_admin_access()
    }
}
