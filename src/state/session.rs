//! Session snapshot for the current user.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;

/// Backend role names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    SuperAdmin,
    Admin,
    AiUser,
    User,
    Other(String),
}

impl Role {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "SUPERADMIN" => Self::SuperAdmin,
            "ADMIN" => Self::Admin,
            "AI_USER" => Self::AiUser,
            "USER" => Self::User,
            other => Self::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SuperAdmin => "SUPERADMIN",
            Self::Admin => "ADMIN",
            Self::AiUser => "AI_USER",
            Self::User => "USER",
            Self::Other(name) => name,
        }
    }

    /// May open admin-only routes.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication/role state as last confirmed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub active: bool,
    pub user_name: String,
    pub email: String,
    pub role: Option<Role>,
}

impl Session {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_ref().is_some_and(Role::is_admin)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
