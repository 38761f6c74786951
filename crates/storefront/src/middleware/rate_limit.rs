//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Sign-in and registration are limited per client IP. Behind a proxy the
//! client IP comes from the forwarding headers; a request without any of them
//! cannot be keyed and is refused.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::RateLimitConfig;

/// Headers consulted for the client IP, most trusted first.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Key extractor that reads the client IP from proxy headers.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers()).ok_or(GovernorError::UnableToExtractKey)
    }
}

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            // X-Forwarded-For lists the client first
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the rate limiter for auth endpoints.
///
/// With the defaults a client gets a burst of 5 attempts, then one more
/// every 6 seconds.
///
/// Returns `None` if either limit is zero.
#[must_use]
pub fn auth_rate_limiter(limits: RateLimitConfig) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(limits.replenish_secs)
        .burst_size(limits.burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_client_ip_prefers_cloudflare_header() {
        let map = headers(&[
            ("x-forwarded-for", "198.51.100.7"),
            ("cf-connecting-ip", "203.0.113.9"),
        ]);
        assert_eq!(client_ip(&map), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_address() {
        let map = headers(&[("x-forwarded-for", " 198.51.100.7 , 10.0.0.1")]);
        assert_eq!(client_ip(&map), Some("198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_skips_garbage() {
        let map = headers(&[("cf-connecting-ip", "unknown"), ("x-real-ip", "::1")]);
        assert_eq!(client_ip(&map), Some("::1".parse().unwrap()));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(auth_rate_limiter(RateLimitConfig::default()).is_some());
        let zero = RateLimitConfig {
            replenish_secs: 6,
            burst: 0,
        };
        assert!(auth_rate_limiter(zero).is_none());
    }
}
