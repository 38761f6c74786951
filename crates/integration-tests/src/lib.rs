//! Integration test harness for the Marigold storefront.
//!
//! [`TestApp::spawn`] serves the real router on an ephemeral local port over
//! the in-memory backend, with a manual clock and in-memory sessions. Each
//! [`TestApp::client`] is a separate browser: it has its own cookie jar and
//! its own client IP for rate limiting.
//!
//! ```bash
//! cargo test -p marigold-integration-tests
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{TimeDelta, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower_sessions::MemoryStore;

use marigold_core::Email;
use marigold_storefront::clock::{Clock, ManualClock};
use marigold_storefront::config::{RateLimitConfig, StorefrontConfig};
use marigold_storefront::db::{MemoryBackend, Stores};
use marigold_storefront::middleware::session_layer;
use marigold_storefront::models::product::{Product, ProductInput};
use marigold_storefront::state::AppState;

/// Password used for every test account.
pub const PASSWORD: &str = "correct horse battery";

static NEXT_CLIENT: AtomicU32 = AtomicU32::new(1);

/// A running storefront.
pub struct TestApp {
    pub addr: SocketAddr,
    pub stores: Stores,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    /// Start a storefront with local defaults and a lenient `/auth` limit.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind.
    pub async fn spawn() -> Self {
        let mut config = StorefrontConfig::local("postgres://unused/marigold");
        config.auth_rate_limit = RateLimitConfig {
            replenish_secs: 1,
            burst: 100,
        };
        Self::spawn_with(config).await
    }

    /// Start a storefront with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind.
    pub async fn spawn_with(config: StorefrontConfig) -> Self {
        let stores = Stores::from_backend(&Arc::new(MemoryBackend::new()));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let shared_clock: Arc<dyn Clock> = clock.clone();

        let sessions = session_layer(MemoryStore::default(), &config);
        let state = AppState::with_stores(config, stores.clone(), shared_clock);
        let app = marigold_storefront::app(state, sessions);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });

        Self {
            addr,
            stores,
            clock,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// A new browser with an empty cookie jar and its own client IP.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client(&self) -> Client {
        let n = NEXT_CLIENT.fetch_add(1, Ordering::Relaxed);
        let [_, a, b, c] = n.to_be_bytes();
        let ip = format!("10.{a}.{b}.{c}");

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_str(&ip).expect("valid header value"),
        );
        Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Move the server's clock forward.
    pub fn advance(&self, delta: TimeDelta) {
        self.clock.advance(delta);
    }

    /// Create an active product at `price` dollars.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects the product.
    pub async fn product(&self, name: &str, price: Decimal) -> Product {
        self.stores
            .products
            .create_product(&ProductInput {
                name: name.to_owned(),
                description: String::new(),
                price,
                discount_percent: None,
                image_url: None,
                active: true,
            })
            .await
            .expect("create product")
    }

    /// Give `email` admin (or owner) access.
    ///
    /// # Panics
    ///
    /// Panics if the email is invalid or the store fails.
    pub async fn grant(&self, email: &str, owner: bool) {
        let email = Email::parse(email).expect("valid email");
        self.stores
            .admins
            .upsert_admin(&email, owner)
            .await
            .expect("grant admin");
    }

    /// Remove `email`'s admin record.
    ///
    /// # Panics
    ///
    /// Panics if the email is invalid or the store fails.
    pub async fn revoke(&self, email: &str) {
        let email = Email::parse(email).expect("valid email");
        self.stores
            .admins
            .delete_admin(&email)
            .await
            .expect("revoke admin");
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, client: &Client, path: &str) -> Response {
        client.get(self.url(path)).send().await.expect("GET")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post(&self, client: &Client, path: &str, body: &Value) -> Response {
        client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST")
    }

    /// Register `email` in a throwaway browser.
    ///
    /// # Panics
    ///
    /// Panics unless registration succeeds.
    pub async fn register(&self, email: &str) {
        let client = self.client();
        let resp = self
            .post(
                &client,
                "/auth/register",
                &json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    /// Sign `client` in as `email`, returning the response body.
    ///
    /// # Panics
    ///
    /// Panics unless sign-in succeeds.
    pub async fn login(&self, client: &Client, email: &str) -> Value {
        let resp = self
            .post(
                client,
                "/auth/login",
                &json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.expect("login body")
    }
}

/// Read a response body as JSON.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn body(resp: Response) -> Value {
    resp.json().await.expect("JSON body")
}

/// Parse a serialized decimal amount.
///
/// # Panics
///
/// Panics if `value` is not a decimal string.
#[must_use]
pub fn amount(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("decimal amount")
}
