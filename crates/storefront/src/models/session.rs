//! Session-related types.
//!
//! Types stored in the per-client session.

use serde::{Deserialize, Serialize};

use marigold_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the cached role of the current user.
    pub const ROLE_CACHE: &str = "role_cache";

    /// Key for the cart of a shopper who has not signed in.
    pub const ANONYMOUS_CART: &str = "anonymous_cart";
}
