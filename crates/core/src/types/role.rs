//! Access tiers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a role string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0} (expected guest, admin or owner)")]
pub struct RoleParseError(pub String);

/// A user's access tier.
///
/// Ordered by privilege: `Guest < Admin < Owner`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper; no administrative features.
    #[default]
    Guest,
    /// Store staff: products, orders and analytics.
    Admin,
    /// Store owner: everything an admin can do plus managing admins.
    Owner,
}

impl Role {
    /// Classify an admin-table lookup.
    ///
    /// `None` means no admin record exists for the user.
    #[must_use]
    pub const fn from_admin_record(is_owner: Option<bool>) -> Self {
        match is_owner {
            Some(true) => Self::Owner,
            Some(false) => Self::Admin,
            None => Self::Guest,
        }
    }

    /// Whether the role may use store administration features.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }

    /// Whether the role may grant and revoke admin access.
    #[must_use]
    pub const fn can_manage_admins(self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Lowercase name, as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_admin_record() {
        assert_eq!(Role::from_admin_record(None), Role::Guest);
        assert_eq!(Role::from_admin_record(Some(false)), Role::Admin);
        assert_eq!(Role::from_admin_record(Some(true)), Role::Owner);
    }

    #[test]
    fn test_privileges() {
        assert!(!Role::Guest.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(Role::Owner.is_staff());
        assert!(!Role::Admin.can_manage_admins());
        assert!(Role::Owner.can_manage_admins());
        assert!(Role::Guest < Role::Admin && Role::Admin < Role::Owner);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(" Owner ".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_is_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
        let role: Role = serde_json::from_str("\"guest\"").unwrap();
        assert_eq!(role, Role::Guest);
    }
}
