//! Core types for Marigold.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod quantity;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Discount, DiscountError, Price};
pub use quantity::{Quantity, QuantityError};
pub use role::{Role, RoleParseError};
pub use status::{OrderStatus, StatusParseError};
