//! Application state
//!
//! Shared by every request handler. Holds no per-user data; each request is
//! authorized on its own.

use crate::middleware::rate_limit::{RateLimitConfig, RateLimitMiddleware};
use crate::services::ServiceFactory;

#[derive(Clone)]
pub struct AppState {
    pub services: ServiceFactory,
    pub rate_limiter: RateLimitMiddleware,
}

impl AppState {
    pub fn new(services: ServiceFactory) -> Self {
        let rate_limiter = RateLimitMiddleware::new(RateLimitConfig::from(&services.settings.rate_limit));
        Self { services, rate_limiter }
    }
}
