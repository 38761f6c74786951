//! Anonymous carts, sign-in reconciliation and checkout over HTTP.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use marigold_integration_tests::{TestApp, amount, body};

#[tokio::test]
async fn test_anonymous_cart_lives_in_the_session() {
    let app = TestApp::spawn().await;
    let tea = app.product("Tea", Decimal::new(500, 2)).await;
    let browser = app.client();

    let resp = app
        .post(
            &browser,
            "/cart/add",
            &json!({ "product_id": tea.id, "quantity": 2 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cart = body(app.get(&browser, "/cart").await).await;
    assert_eq!(cart["item_count"], 2);
    assert_eq!(amount(&cart["subtotal"]["amount"]), Decimal::new(1000, 2));

    // A different browser has its own cart.
    let other = body(app.get(&app.client(), "/cart").await).await;
    assert_eq!(other["item_count"], 0);

    let cart = body(
        app.post(
            &browser,
            "/cart/update",
            &json!({ "product_id": tea.id, "quantity": 0 }),
        )
        .await,
    )
    .await;
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn test_cart_rejects_unknown_products_and_negative_quantities() {
    let app = TestApp::spawn().await;
    let tea = app.product("Tea", Decimal::new(500, 2)).await;
    let browser = app.client();

    let resp = app
        .post(&browser, "/cart/add", &json!({ "product_id": 9999 }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .post(
            &browser,
            "/cart/update",
            &json!({ "product_id": tea.id, "quantity": -1 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Beyond what an INTEGER column holds.
    for path in ["/cart/add", "/cart/update"] {
        let resp = app
            .post(
                &browser,
                path,
                &json!({ "product_id": tea.id, "quantity": 3_000_000_000_i64 }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{path}");
    }
}

#[tokio::test]
async fn test_sign_in_merges_anonymous_cart_once() {
    let app = TestApp::spawn().await;
    let tea = app.product("Tea", Decimal::new(500, 2)).await;
    let pot = app.product("Teapot", Decimal::new(3000, 2)).await;
    app.register("shopper@example.com").await;

    // One tea already in the server cart from an earlier visit.
    let laptop = app.client();
    app.login(&laptop, "shopper@example.com").await;
    app.post(&laptop, "/cart/add", &json!({ "product_id": tea.id }))
        .await;

    // Shopping anonymously on another device.
    let phone = app.client();
    app.post(
        &phone,
        "/cart/add",
        &json!({ "product_id": tea.id, "quantity": 2 }),
    )
    .await;
    app.post(&phone, "/cart/add", &json!({ "product_id": pot.id }))
        .await;

    let signed_in = app.login(&phone, "shopper@example.com").await;
    assert_eq!(signed_in["merge"]["merged"], 2);
    assert_eq!(signed_in["merge"]["pending"], 0);
    assert_eq!(signed_in["cart"]["item_count"], 4);
    assert_eq!(
        amount(&signed_in["cart"]["subtotal"]["amount"]),
        Decimal::new(4500, 2)
    );

    // Signing in again has nothing left to merge.
    let again = app.login(&phone, "shopper@example.com").await;
    assert_eq!(again["merge"]["merged"], 0);
    assert_eq!(again["cart"]["item_count"], 4);

    // Both devices see the same server cart.
    let cart = body(app.get(&laptop, "/cart").await).await;
    assert_eq!(cart["item_count"], 4);
}

#[tokio::test]
async fn test_merge_drops_deleted_products() {
    let app = TestApp::spawn().await;
    let tea = app.product("Tea", Decimal::new(500, 2)).await;
    let gone = app.product("Seasonal", Decimal::new(900, 2)).await;
    app.register("picky@example.com").await;

    let browser = app.client();
    app.post(&browser, "/cart/add", &json!({ "product_id": tea.id }))
        .await;
    app.post(&browser, "/cart/add", &json!({ "product_id": gone.id }))
        .await;
    app.stores.products.delete_product(gone.id).await.unwrap();

    let signed_in = app.login(&browser, "picky@example.com").await;
    assert_eq!(signed_in["merge"]["merged"], 1);
    assert_eq!(signed_in["merge"]["dropped"], json!([gone.id]));
    assert_eq!(signed_in["cart"]["item_count"], 1);
}

#[tokio::test]
async fn test_checkout_places_order_and_empties_cart() {
    let app = TestApp::spawn().await;
    let tea = app.product("Tea", Decimal::new(500, 2)).await;
    app.register("buyer@example.com").await;

    let browser = app.client();
    let resp = app.post(&browser, "/checkout", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    app.post(
        &browser,
        "/cart/add",
        &json!({ "product_id": tea.id, "quantity": 3 }),
    )
    .await;
    app.login(&browser, "buyer@example.com").await;

    let resp = app.post(&browser, "/checkout", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = body(resp).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(amount(&order["total"]["amount"]), Decimal::new(1500, 2));

    let cart = body(app.get(&browser, "/cart").await).await;
    assert_eq!(cart["item_count"], 0);

    let resp = app.post(&browser, "/checkout", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let orders = body(app.get(&browser, "/account/orders").await).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_double_submitted_checkout_places_one_order() {
    let app = TestApp::spawn().await;
    let tea = app.product("Tea", Decimal::new(500, 2)).await;
    app.register("eager@example.com").await;

    let browser = app.client();
    app.login(&browser, "eager@example.com").await;
    app.post(
        &browser,
        "/cart/add",
        &json!({ "product_id": tea.id, "quantity": 2 }),
    )
    .await;

    let empty_body = json!({});
    let (first, second) = tokio::join!(
        app.post(&browser, "/checkout", &empty_body),
        app.post(&browser, "/checkout", &empty_body),
    );
    let mut statuses = [first.status(), second.status()];
    statuses.sort_by_key(|s| s.as_u16());
    assert_eq!(statuses[0], StatusCode::CREATED);
    assert!(
        [StatusCode::CONFLICT, StatusCode::UNPROCESSABLE_ENTITY].contains(&statuses[1]),
        "{statuses:?}"
    );

    let orders = body(app.get(&browser, "/account/orders").await).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_logout_starts_a_fresh_anonymous_session() {
    let app = TestApp::spawn().await;
    let tea = app.product("Tea", Decimal::new(500, 2)).await;
    app.register("leaver@example.com").await;

    let browser = app.client();
    app.login(&browser, "leaver@example.com").await;
    app.post(&browser, "/cart/add", &json!({ "product_id": tea.id }))
        .await;

    let resp = app.post(&browser, "/auth/logout", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.get(&browser, "/auth/me").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let cart = body(app.get(&browser, "/cart").await).await;
    assert_eq!(cart["item_count"], 0);
}
