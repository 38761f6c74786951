//! Admin access management commands.
//!
//! These write the admin table directly and skip the API's guard against
//! owners revoking themselves, so they can bootstrap the first owner or
//! recover from a lockout. Signed-in users see the change once their cached
//! role expires.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use marigold_core::{Email, EmailError};
use marigold_storefront::db::{AdminRepository, AdminStore, RepositoryError};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("No admin record for {0}")]
    NotFound(Email),
}

async fn repository() -> Result<AdminRepository, AdminError> {
    Ok(AdminRepository::new(connect().await?))
}

/// Grant admin access, or change an existing admin's owner flag.
pub async fn grant(email: &str, owner: bool) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let record = repository().await?.upsert_admin(&email, owner).await?;
    tracing::info!(email = %record.email, role = %record.role(), "Admin access granted");
    Ok(())
}

/// Revoke admin access.
pub async fn revoke(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    if !repository().await?.delete_admin(&email).await? {
        return Err(AdminError::NotFound(email));
    }
    tracing::info!(%email, "Admin access revoked");
    Ok(())
}

/// Print every admin record.
pub async fn list() -> Result<(), AdminError> {
    let admins = repository().await?.list_admins().await?;

    #[allow(clippy::print_stdout)]
    {
        if admins.is_empty() {
            println!("No admins.");
        }
        for admin in &admins {
            println!(
                "{:<40} {:<6} since {}",
                admin.email.as_str(),
                admin.role().as_str(),
                admin.created_at.format("%Y-%m-%d")
            );
        }
    }
    Ok(())
}
