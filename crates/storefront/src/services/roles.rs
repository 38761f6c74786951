//! Session role cache.
//!
//! A shopper's access tier is looked up in the admin table and cached in
//! their session so privilege checks don't hit the database on every
//! request. A cached entry is trusted only while it is younger than the TTL
//! and was written for the email now signed in; anything else forces a fresh
//! lookup.
//!
//! Lookup failures never escape: the caller gets [`Role::Guest`] and the
//! failure is logged. Guest is not cached in that case, so the next check
//! retries the lookup.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use marigold_core::{Email, Role};

use crate::clock::Clock;
use crate::db::AdminStore;
use crate::models::session::keys;
use crate::storage::{KeyValueStore, load_json, save_json};

/// The cached role of one session's user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCacheEntry {
    pub email: Email,
    pub role: Role,
    pub cached_at: DateTime<Utc>,
}

impl RoleCacheEntry {
    /// Whether the entry may answer a check for `email` at `now`.
    ///
    /// Entries stamped in the future are rejected.
    #[must_use]
    pub fn is_valid_for(&self, email: &Email, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        let age = now - self.cached_at;
        self.email == *email && age >= TimeDelta::zero() && age < ttl
    }
}

/// Role resolution backed by per-client storage.
pub struct RoleCache<'a> {
    storage: &'a dyn KeyValueStore,
    admins: &'a dyn AdminStore,
    clock: &'a dyn Clock,
    ttl: TimeDelta,
}

impl<'a> RoleCache<'a> {
    /// Create a role cache over one client's storage.
    #[must_use]
    pub fn new(
        storage: &'a dyn KeyValueStore,
        admins: &'a dyn AdminStore,
        clock: &'a dyn Clock,
        ttl: Duration,
    ) -> Self {
        Self {
            storage,
            admins,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Resolve the role for `email`.
    ///
    /// With `force_remote` false a valid cached entry is returned as is.
    /// Otherwise the admin table is consulted and the result cached.
    #[instrument(skip(self, email), fields(email = %email))]
    pub async fn resolve_role(&self, email: &Email, force_remote: bool) -> Role {
        if !force_remote && let Some(role) = self.cached_role(email).await {
            return role;
        }

        match self.admins.find_admin(email).await {
            Ok(record) => {
                let role = Role::from_admin_record(record.map(|r| r.is_owner));
                self.write(email, role).await;
                tracing::debug!(%role, "role resolved from admin table");
                role
            }
            Err(e) => {
                tracing::warn!(error = %e, "role lookup failed, treating as guest");
                self.invalidate().await;
                Role::Guest
            }
        }
    }

    /// The cached role for `email`, if a valid entry exists.
    ///
    /// Stale and undecodable entries are removed.
    pub async fn cached_role(&self, email: &Email) -> Option<Role> {
        let entry = match load_json::<RoleCacheEntry>(self.storage, keys::ROLE_CACHE).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable role cache entry");
                self.invalidate().await;
                return None;
            }
        };

        if entry.is_valid_for(email, self.clock.now(), self.ttl) {
            return Some(entry.role);
        }
        if entry.email == *email {
            tracing::debug!(cached_at = %entry.cached_at, "role cache entry expired");
            self.invalidate().await;
        }
        None
    }

    /// Drop the cached entry.
    pub async fn invalidate(&self) {
        if let Err(e) = self.storage.delete(keys::ROLE_CACHE).await {
            tracing::warn!(error = %e, "failed to clear role cache");
        }
    }

    async fn write(&self, email: &Email, role: Role) {
        let entry = RoleCacheEntry {
            email: email.clone(),
            role,
            cached_at: self.clock.now(),
        };
        if let Err(e) = save_json(self.storage, keys::ROLE_CACHE, &entry).await {
            tracing::warn!(error = %e, "failed to write role cache");
        }
    }
}
