//! Admin record repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use marigold_core::Email;

use super::{AdminStore, RepositoryError};
use crate::models::admin::AdminRecord;

#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    email: String,
    is_owner: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdminRow> for AdminRecord {
    type Error = RepositoryError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| RepositoryError::corrupt("email", e))?;
        Ok(Self {
            email,
            is_owner: row.is_owner,
            created_at: row.created_at,
        })
    }
}

/// `PostgreSQL` admin storage.
#[derive(Debug, Clone)]
pub struct AdminRepository {
    pool: PgPool,
}

impl AdminRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminStore for AdminRepository {
    async fn find_admin(&self, email: &Email) -> Result<Option<AdminRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminRow>(
            "SELECT email, is_owner, created_at FROM storefront.admins WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AdminRecord::try_from).transpose()
    }

    async fn list_admins(&self) -> Result<Vec<AdminRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdminRow>(
            "SELECT email, is_owner, created_at FROM storefront.admins
             ORDER BY is_owner DESC, email",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AdminRecord::try_from).collect()
    }

    async fn upsert_admin(
        &self,
        email: &Email,
        is_owner: bool,
    ) -> Result<AdminRecord, RepositoryError> {
        let row = sqlx::query_as::<_, AdminRow>(
            "INSERT INTO storefront.admins (email, is_owner) VALUES ($1, $2)
             ON CONFLICT (email) DO UPDATE SET is_owner = EXCLUDED.is_owner
             RETURNING email, is_owner, created_at",
        )
        .bind(email)
        .bind(is_owner)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn delete_admin(&self, email: &Email) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.admins WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
