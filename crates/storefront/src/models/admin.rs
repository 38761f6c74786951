//! Store administrator records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marigold_core::{Email, Role};

/// A row of the admin table.
///
/// Records are keyed by email, so access can be granted before the person
/// has an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRecord {
    /// Email the grant applies to.
    pub email: Email,
    /// Owners may manage other admins.
    pub is_owner: bool,
    /// When access was granted.
    pub created_at: DateTime<Utc>,
}

impl AdminRecord {
    /// The role this record confers.
    #[must_use]
    pub const fn role(&self) -> Role {
        Role::from_admin_record(Some(self.is_owner))
    }
}
