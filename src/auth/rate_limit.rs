//! Sliding-window rate limiter keyed by (client IP, endpoint class)

use crate::{config::RateLimitConfig, error::AppError};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Endpoint classes with independent thresholds and windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Login,
    Registration,
    CredentialUpdate,
    General,
}

impl EndpointClass {
    fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Login => "login",
            EndpointClass::Registration => "registration",
            EndpointClass::CredentialUpdate => "credential_update",
            EndpointClass::General => "general",
        }
    }
}

/// Window policy for one endpoint class
#[derive(Debug, Clone, Copy)]
struct WindowPolicy {
    max_requests: usize,
    window: Duration,
}

/// One key's sliding window. The mutex serializes concurrent increments for
/// the same key so no update is lost.
struct WindowState {
    requests: Mutex<VecDeque<Instant>>,
}

/// Keyed sliding-window limiter
pub struct RateLimiter {
    windows: DashMap<(IpAddr, EndpointClass), Arc<WindowState>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    fn policy(&self, class: EndpointClass) -> WindowPolicy {
        let (max_requests, window_secs) = match class {
            EndpointClass::Login => {
                (self.config.login_max_requests, self.config.login_window_secs)
            }
            EndpointClass::Registration => (
                self.config.registration_max_requests,
                self.config.registration_window_secs,
            ),
            EndpointClass::CredentialUpdate => (
                self.config.credential_update_max_requests,
                self.config.credential_update_window_secs,
            ),
            EndpointClass::General => {
                (self.config.general_max_requests, self.config.general_window_secs)
            }
        };
        WindowPolicy {
            max_requests: max_requests as usize,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Record one request for the key and decide allow/deny. Deny carries a
    /// retry-after hint derived from when the oldest request in the window
    /// falls out.
    pub fn check(&self, ip: IpAddr, class: EndpointClass) -> Result<(), AppError> {
        let policy = self.policy(class);
        let state = self
            .windows
            .entry((ip, class))
            .or_insert_with(|| {
                Arc::new(WindowState {
                    requests: Mutex::new(VecDeque::new()),
                })
            })
            .clone();

        let now = Instant::now();
        let mut requests = state.requests.lock().unwrap();

        // Slide the window
        while let Some(&front) = requests.front() {
            if now.duration_since(front) < policy.window {
                break;
            }
            requests.pop_front();
        }

        if requests.len() < policy.max_requests {
            requests.push_back(now);
            return Ok(());
        }

        let retry_after = requests
            .front()
            .map(|&front| policy.window.saturating_sub(now.duration_since(front)))
            .unwrap_or(policy.window);
        let retry_after_secs = retry_after.as_secs().max(1);

        tracing::warn!(
            client_ip = %ip,
            class = class.as_str(),
            retry_after_secs,
            "Rate limit exceeded"
        );

        Err(AppError::RateLimitExceeded { retry_after_secs })
    }

    /// Drop windows whose whole span has elapsed since the last request.
    /// Purely an optimization; correctness does not depend on it.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        self.windows.retain(|(_, class), state| {
            let window = self.policy(*class).window;
            let requests = state.requests.lock().unwrap();
            requests
                .back()
                .is_some_and(|&last| now.duration_since(last) < window)
        });
    }

    /// Number of live windows (for diagnostics)
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
