//! Role-gated routes and the session role cache over HTTP.

#![allow(clippy::unwrap_used)]

use chrono::TimeDelta;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use marigold_integration_tests::{TestApp, amount, body};

#[tokio::test]
async fn test_admin_routes_by_role() {
    let app = TestApp::spawn().await;
    app.register("guest@example.com").await;
    app.register("staff@example.com").await;
    app.grant("staff@example.com", false).await;

    let anonymous = app.client();
    let resp = app.get(&anonymous, "/admin/orders").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let guest = app.client();
    app.login(&guest, "guest@example.com").await;
    let resp = app.get(&guest, "/admin/orders").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let staff = app.client();
    let signed_in = app.login(&staff, "staff@example.com").await;
    assert_eq!(signed_in["user"]["role"], "admin");
    let resp = app.get(&staff, "/admin/orders").await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Managing admins is for owners.
    let resp = app.get(&staff, "/admin/admins").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_manage_products_and_orders() {
    let app = TestApp::spawn().await;
    app.register("staff@example.com").await;
    app.grant("staff@example.com", false).await;
    let staff = app.client();
    app.login(&staff, "staff@example.com").await;

    let resp = app
        .post(
            &staff,
            "/admin/products",
            &json!({ "name": "Matcha", "price": "12.50", "discount_percent": "20" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product = body(resp).await;
    assert_eq!(amount(&product["unit_price"]["amount"]), Decimal::new(1000, 2));

    let listed = body(app.get(&staff, "/products").await).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    // Place an order as the staff member, then walk it through the lifecycle.
    app.post(&staff, "/cart/add", &json!({ "product_id": product["id"] }))
        .await;
    let order = body(app.post(&staff, "/checkout", &json!({})).await).await;
    let status_url = format!("/admin/orders/{}/status", order["id"]);

    let resp = app
        .post(&staff, &status_url, &json!({ "status": "shipped" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app
        .post(&staff, &status_url, &json!({ "status": "paid" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let summary = body(app.get(&staff, "/admin/analytics").await).await;
    assert_eq!(summary["order_count"], 1);
    assert_eq!(summary["items_sold"], 1);

    let paid = body(app.get(&staff, "/admin/orders?status=paid").await).await;
    assert_eq!(paid.as_array().map(Vec::len), Some(1));
    let pending = body(app.get(&staff, "/admin/orders?status=pending").await).await;
    assert_eq!(pending.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_revocation_waits_for_cached_role_to_expire() {
    let app = TestApp::spawn().await;
    app.register("staff@example.com").await;
    app.grant("staff@example.com", false).await;
    let staff = app.client();
    app.login(&staff, "staff@example.com").await;

    app.revoke("staff@example.com").await;

    app.advance(TimeDelta::minutes(59));
    let resp = app.get(&staff, "/admin/orders").await;
    assert_eq!(resp.status(), StatusCode::OK);

    app.advance(TimeDelta::minutes(1) + TimeDelta::seconds(1));
    let resp = app.get(&staff, "/admin/orders").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let me = body(app.get(&staff, "/auth/me").await).await;
    assert_eq!(me["role"], "guest");
}

#[tokio::test]
async fn test_sign_in_refreshes_role_immediately() {
    let app = TestApp::spawn().await;
    app.register("promoted@example.com").await;
    let browser = app.client();

    let signed_in = app.login(&browser, "promoted@example.com").await;
    assert_eq!(signed_in["user"]["role"], "guest");

    app.grant("promoted@example.com", true).await;
    let me = body(app.get(&browser, "/auth/me").await).await;
    assert_eq!(me["role"], "guest");

    let signed_in = app.login(&browser, "promoted@example.com").await;
    assert_eq!(signed_in["user"]["role"], "owner");
}

#[tokio::test]
async fn test_owner_manages_admins_but_not_themselves() {
    let app = TestApp::spawn().await;
    app.register("owner@example.com").await;
    app.grant("owner@example.com", true).await;
    let owner = app.client();
    app.login(&owner, "owner@example.com").await;

    let resp = app
        .post(
            &owner,
            "/admin/admins",
            &json!({ "email": "New.Staff@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body(resp).await["email"], "new.staff@example.com");

    let admins = body(app.get(&owner, "/admin/admins").await).await;
    assert_eq!(admins.as_array().map(Vec::len), Some(2));

    let resp = owner
        .delete(app.url("/admin/admins/owner@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = owner
        .delete(app.url("/admin/admins/new.staff@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let mut config = marigold_storefront::config::StorefrontConfig::local("postgres://unused");
    config.auth_rate_limit.burst = 2;
    config.auth_rate_limit.replenish_secs = 60;
    let app = TestApp::spawn_with(config).await;
    let browser = app.client();

    let wrong = json!({ "email": "nobody@example.com", "password": "not the password" });
    for _ in 0..2 {
        let resp = app.post(&browser, "/auth/login", &wrong).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let resp = app.post(&browser, "/auth/login", &wrong).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other routes are not limited.
    let resp = app.get(&browser, "/products").await;
    assert_eq!(resp.status(), StatusCode::OK);
}
