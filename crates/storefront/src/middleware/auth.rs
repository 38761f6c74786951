//! Authentication middleware and extractors.
//!
//! `RequireAuth` and `OptionalAuth` read the signed-in user from the session.
//! `RequireStaff` and `RequireOwner` additionally resolve the user's role
//! through the session role cache, so most privilege checks never reach the
//! admin table.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use marigold_core::Role;

use crate::models::session::{CurrentUser, keys};
use crate::services::roles::RoleCache;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in admin or owner.
pub struct RequireStaff {
    pub user: CurrentUser,
    pub role: Role,
}

/// Extractor that requires a signed-in owner.
pub struct RequireOwner(pub CurrentUser);

/// Rejection from the auth extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Nobody is signed in.
    Unauthorized,
    /// Signed in, but the role is too low.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Sign in required"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Insufficient role"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn session_user(parts: &Parts) -> Option<(Session, CurrentUser)> {
    // Set by SessionManagerLayer
    let session = parts.extensions.get::<Session>()?.clone();
    let user = session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .ok()
        .flatten()?;
    Some((session, user))
}

async fn resolve_role(state: &AppState, session: &Session, user: &CurrentUser) -> Role {
    RoleCache::new(
        session,
        state.stores().admins.as_ref(),
        state.clock(),
        state.config().cache.role_ttl,
    )
    .resolve_role(&user.email, false)
    .await
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (_, user) = session_user(parts)
            .await
            .ok_or(AuthRejection::Unauthorized)?;
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (session, user) = session_user(parts)
            .await
            .ok_or(AuthRejection::Unauthorized)?;
        let role = resolve_role(state, &session, &user).await;
        if !role.is_staff() {
            tracing::debug!(user_id = %user.id, %role, "staff route refused");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self { user, role })
    }
}

impl FromRequestParts<AppState> for RequireOwner {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (session, user) = session_user(parts)
            .await
            .ok_or(AuthRejection::Unauthorized)?;
        let role = resolve_role(state, &session, &user).await;
        if !role.can_manage_admins() {
            tracing::debug!(user_id = %user.id, %role, "owner route refused");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await.map(|(_, user)| user)))
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
    Ok(())
}
