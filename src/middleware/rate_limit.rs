//! Rate limiting middleware
//!
//! In-process sliding window with a small burst allowance, keyed by client
//! address and route. Guards the unauthenticated endpoints that reach paid
//! providers (assistant, contact mail).

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::config::settings::RateLimitSettings;
use crate::state::AppState;
use crate::utils::errors::{VisaPilotError, Result};

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Time window duration
    pub window_duration: Duration,
    /// Extra requests allowed in short bursts
    pub burst_allowance: u32,
    /// Peers allowed to name the client through forwarding headers
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_duration: Duration::from_secs(60),
            burst_allowance: 5,
            trusted_proxies: Vec::new(),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        let trusted_proxies = settings.trusted_proxies
            .iter()
            .filter_map(|proxy| match proxy.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    warn!(proxy = %proxy, "Ignoring trusted proxy that is not an IP address");
                    None
                }
            })
            .collect();

        Self {
            max_requests: settings.max_requests,
            window_duration: Duration::from_secs(settings.window_seconds),
            burst_allowance: settings.burst_allowance,
            trusted_proxies,
        }
    }
}

/// Requests seen for one key
#[derive(Debug, Clone)]
struct RateLimitEntry {
    requests: Vec<Instant>,
    burst_used: u32,
    last_reset: Instant,
}

impl RateLimitEntry {
    fn new() -> Self {
        Self {
            requests: Vec::new(),
            burst_used: 0,
            last_reset: Instant::now(),
        }
    }

    /// Drop requests outside the window
    fn cleanup(&mut self, window_duration: Duration) {
        let now = Instant::now();
        self.requests.retain(|&time| now.duration_since(time) < window_duration);

        if self.last_reset.elapsed() > window_duration {
            self.burst_used = 0;
            self.last_reset = now;
        }
    }

    fn is_allowed(&mut self, config: &RateLimitConfig) -> bool {
        self.cleanup(config.window_duration);

        if (self.requests.len() as u32) < config.max_requests {
            return true;
        }

        if self.burst_used < config.burst_allowance {
            self.burst_used += 1;
            return true;
        }

        false
    }

    fn record_request(&mut self) {
        self.requests.push(Instant::now());
    }
}

/// Shared limiter; clones see the same counters
#[derive(Clone, Debug)]
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

impl RateLimitMiddleware {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        // Counters stay usable even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a request for `key`, failing once the window and burst are used up
    pub fn check_rate_limit(&self, key: &str) -> Result<()> {
        let mut entries = self.entries();
        let entry = entries.entry(key.to_string()).or_insert_with(RateLimitEntry::new);

        if entry.is_allowed(&self.config) {
            entry.record_request();
            debug!(key, "Rate limit check passed");
            Ok(())
        } else {
            warn!(key, "Rate limit exceeded");
            Err(VisaPilotError::RateLimitExceeded)
        }
    }

    /// Forget keys with no requests in the last two windows, returning how many were dropped
    pub fn cleanup_old_entries(&self) -> usize {
        let mut entries = self.entries();
        let keep_for = self.config.window_duration * 2;
        let now = Instant::now();
        let before = entries.len();

        entries.retain(|_, entry| entry.requests.iter().any(|&time| now.duration_since(time) < keep_for));
        debug!(remaining_entries = entries.len(), "Cleaned up old rate limit entries");
        before - entries.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries().len()
    }

    /// Sweep stale keys once per window until the runtime shuts down
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let limiter = self.clone();
        let every = self.config.window_duration;

        let handle = tokio::spawn(async move {
            let mut cleanup_interval = tokio::time::interval(every);

            loop {
                cleanup_interval.tick().await;

                let removed = limiter.cleanup_old_entries();
                if removed > 0 {
                    info!(removed, tracked = limiter.tracked_keys(), "Rate limit sweep dropped idle clients");
                }
            }
        });

        info!("Started rate limit cleanup task with interval {:?}", every);
        handle
    }

    /// Address the limit is charged to.
    ///
    /// The socket peer, unless that peer is a configured proxy, in which case
    /// the first `x-forwarded-for` hop or `x-real-ip` it reports.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let Some(peer_ip) = peer.map(|addr| addr.ip()) else {
            return "unknown".to_string();
        };

        if !self.config.trusted_proxies.contains(&peer_ip) {
            return peer_ip.to_string();
        }

        forwarded_client(headers).unwrap_or_else(|| peer_ip.to_string())
    }
}

impl Default for RateLimitMiddleware {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    forwarded.or(real_ip).map(str::to_string)
}

/// Per-client, per-route limit for routes this layer wraps
pub async fn limit_by_client(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let client = state.rate_limiter.client_key(request.headers(), peer);
    let key = format!("{}|{}", request.uri().path(), client);

    if let Err(e) = state.rate_limiter.check_rate_limit(&key) {
        return e.into_response();
    }

    next.run(request).await
}
