//! Authentication route handlers.
//!
//! Signing in does three things to the session, in order: rotates its ID and
//! stores the user, resolves the user's role straight from the admin table,
//! and merges the anonymous cart into the user's server cart.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use marigold_core::{Email, ProductId, Role, UserId};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::cart::CartView;
use crate::models::session::CurrentUser;
use crate::models::user::User;
use crate::services::auth::AuthService;
use crate::services::cart::{CartService, ReconcileOutcome};
use crate::services::roles::RoleCache;
use crate::state::AppState;
use crate::storage::StorageError;

/// Login and registration request body.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// What the client learns about its session.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
}

/// How the anonymous cart fared when it was merged at sign-in.
#[derive(Debug, Serialize)]
pub struct MergeReport {
    pub merged: usize,
    pub skipped: usize,
    pub dropped: Vec<ProductId>,
    /// Lines kept in the session for the next attempt.
    pub pending: usize,
}

impl From<&ReconcileOutcome> for MergeReport {
    fn from(outcome: &ReconcileOutcome) -> Self {
        Self {
            merged: outcome.merged,
            skipped: outcome.skipped,
            dropped: outcome.dropped.clone(),
            pending: outcome.unmerged.len(),
        }
    }
}

/// Response to a successful sign-in.
#[derive(Debug, Serialize)]
pub struct SignedIn {
    pub user: SessionInfo,
    pub cart: CartView,
    pub merge: MergeReport,
}

fn role_cache<'a>(state: &'a AppState, session: &'a Session) -> RoleCache<'a> {
    RoleCache::new(
        session,
        state.stores().admins.as_ref(),
        state.clock(),
        state.config().cache.role_ttl,
    )
}

/// Attach `user` to the session and bring their cart across.
async fn sign_in(state: &AppState, session: &Session, user: User) -> Result<SignedIn> {
    // New ID on privilege change; session data is kept.
    session.cycle_id().await.map_err(StorageError::from)?;

    let current = CurrentUser {
        id: user.id,
        email: user.email,
    };
    set_current_user(session, &current)
        .await
        .map_err(StorageError::from)?;

    let role = role_cache(state, session)
        .resolve_role(&current.email, true)
        .await;

    let outcome = CartService::new(state.stores(), state.catalog())
        .reconcile_session(session, current.id)
        .await?;
    if !outcome.is_complete() {
        tracing::warn!(
            user_id = %current.id,
            pending = outcome.unmerged.len(),
            failure = outcome.failure.as_deref().unwrap_or_default(),
            "anonymous cart only partly merged"
        );
    }

    set_sentry_user(&current.id, Some(current.email.as_str()));
    tracing::info!(user_id = %current.id, %role, "signed in");

    Ok(SignedIn {
        merge: MergeReport::from(&outcome),
        cart: outcome.cart,
        user: SessionInfo {
            id: current.id,
            email: current.email,
            role,
        },
    })
}

/// Create an account and sign it in.
#[instrument(skip(state, session, req))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<Credentials>,
) -> Result<(StatusCode, Json<SignedIn>)> {
    let user = AuthService::new(state.stores().users.as_ref())
        .register(&req.email, &req.password)
        .await?;
    let signed_in = sign_in(&state, &session, user).await?;
    Ok((StatusCode::CREATED, Json(signed_in)))
}

/// Check credentials and sign in.
#[instrument(skip(state, session, req))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<Credentials>,
) -> Result<Json<SignedIn>> {
    let user = AuthService::new(state.stores().users.as_ref())
        .login(&req.email, &req.password)
        .await?;
    Ok(Json(sign_in(&state, &session, user).await?))
}

/// Sign out and discard the session.
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    role_cache(&state, &session).invalidate().await;
    clear_current_user(&session)
        .await
        .map_err(StorageError::from)?;
    session.flush().await.map_err(StorageError::from)?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in user and their role.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Json<SessionInfo> {
    let role = role_cache(&state, &session)
        .resolve_role(&user.email, false)
        .await;
    Json(SessionInfo {
        id: user.id,
        email: user.email,
        role,
    })
}
