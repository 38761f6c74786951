//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the database row types
//! that live next to each repository.

pub mod admin;
pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;
