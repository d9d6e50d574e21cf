//! Middleware module
//!
//! Request extractors and layers shared by the HTTP handlers

pub mod auth;
pub mod logging;
pub mod rate_limit;

// Re-export commonly used middleware
pub use auth::{AdminContext, AuthContext, BearerToken, IdentityContext};
pub use rate_limit::RateLimitMiddleware;
