//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database reachable)
//!
//! # Catalog
//! GET  /products               - Active products
//! GET  /products/{id}          - Product detail
//!
//! # Cart (anonymous or signed in)
//! GET  /cart                   - Current cart
//! POST /cart/add               - Add a product
//! POST /cart/update            - Set a line's quantity
//! POST /cart/remove            - Remove a line
//!
//! # Auth (rate limited)
//! POST /auth/register          - Create account and sign in
//! POST /auth/login             - Sign in, merging the anonymous cart
//! POST /auth/logout            - Sign out
//! GET  /auth/me                - Current user and role
//!
//! # Orders (requires auth)
//! POST /checkout               - Place an order from the cart
//! GET  /account/orders         - Order history
//!
//! # Admin (admin or owner)
//! POST   /admin/products              - Create product
//! PUT    /admin/products/{id}         - Update product
//! DELETE /admin/products/{id}         - Delete product
//! GET    /admin/orders                - Orders, `?status=` filter
//! GET    /admin/orders/{id}           - Order detail
//! POST   /admin/orders/{id}/status    - Move order to a new status
//! GET    /admin/analytics             - Sales summary, `?since=`
//!
//! # Admin (owner)
//! GET    /admin/admins                - Admin list
//! POST   /admin/admins                - Grant access
//! DELETE /admin/admins/{email}        - Revoke access
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::config::RateLimitConfig;
use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(admin::create_product))
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}", get(admin::show_order))
        .route("/orders/{id}/status", post(admin::update_order_status))
        .route("/analytics", get(admin::analytics))
        .route(
            "/admins",
            get(admin::list_admins).post(admin::grant_admin),
        )
        .route("/admins/{email}", delete(admin::revoke_admin))
}

/// Create all routes for the storefront.
///
/// `/auth` is rate limited per client IP using `auth_limits`.
pub fn routes(auth_limits: RateLimitConfig) -> Router<AppState> {
    let auth = match auth_rate_limiter(auth_limits) {
        Some(limiter) => auth_routes().layer(limiter),
        None => {
            tracing::warn!("auth rate limiting disabled by zero limits");
            auth_routes()
        }
    };

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::checkout))
        .route("/account/orders", get(checkout::orders))
        .nest("/auth", auth)
        .nest("/admin", admin_routes())
}
