//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `roles` - Session role cache (guest / admin / owner)
//! - `cart` - Anonymous and server carts, sign-in reconciliation
//! - `catalog` - Cached product reads and admin product writes
//! - `auth` - Email and password accounts
//! - `checkout` - Orders from server carts
//! - `admin` - Order management, analytics and staff grants

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod roles;
