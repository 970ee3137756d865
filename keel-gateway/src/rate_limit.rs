//! Per-client throttling for the `/api` routes.
//!
//! Two keyed `governor` limiters share the client IP as key: a hard limiter
//! that rejects with a rate-limit fault, and a soft one that only delays.

use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use keel_core::Fault;

use crate::{
    config::{ConfigError, GatewayConfig, RateLimitConfig, SlowDownConfig},
    error::ApiFault,
    request_context::client_ip,
};

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Checks between sweeps of idle client keys.
const PRUNE_EVERY: u64 = 1024;

fn keyed_limiter(
    var: &'static str,
    limit: NonZeroU32,
    window: Duration,
) -> Result<KeyedLimiter, ConfigError> {
    let period = window / limit.get();
    let quota = Quota::with_period(period)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            value: format!("{}ms", window.as_millis()),
            reason: format!("window too short for {limit} requests"),
        })?
        .allow_burst(limit);
    Ok(RateLimiter::keyed(quota))
}

/// Rejects clients that exceed `max_requests` per window.
pub struct ClientLimiter {
    limiter: KeyedLimiter,
    clock: DefaultClock,
}

impl ClientLimiter {
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the window cannot be split across
    /// the request budget.
    pub fn new(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            limiter: keyed_limiter("RATE_LIMIT_WINDOW_MS", config.max_requests, config.window)?,
            clock: DefaultClock::default(),
        })
    }

    /// # Errors
    /// Returns a rate-limit fault with the whole seconds (at least 1) until
    /// the next request from `key` would be allowed.
    pub fn check(&self, key: &str) -> Result<(), Fault> {
        self.limiter.check_key(&key.to_owned()).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            Fault::rate_limited_retry_after(wait.as_secs().max(1))
        })
    }

    /// Number of client keys currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

/// Delays clients that exceed `delay_after` requests per window.
pub struct SlowDown {
    limiter: KeyedLimiter,
    delay: Duration,
}

impl SlowDown {
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the window cannot be split across
    /// the request budget.
    pub fn new(config: &SlowDownConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            limiter: keyed_limiter("SLOW_DOWN_WINDOW_MS", config.delay_after, config.window)?,
            delay: config.delay,
        })
    }

    /// Delay to apply before serving `key`, if it is over budget.
    #[must_use]
    pub fn delay_for(&self, key: &str) -> Option<Duration> {
        self.limiter.check_key(&key.to_owned()).err().map(|_| self.delay)
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

/// Both limiters, shared by every request.
///
/// Keys whose budget has fully replenished are swept every
/// [`PRUNE_EVERY`] checks so one-off clients do not accumulate.
pub struct Throttle {
    pub limiter: ClientLimiter,
    pub slow_down: SlowDown,
    trust_proxy: bool,
    checks: AtomicU64,
}

impl Throttle {
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if either limiter cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            limiter: ClientLimiter::new(&config.security.rate_limit)?,
            slow_down: SlowDown::new(&config.security.slow_down)?,
            trust_proxy: config.server.trust_proxy,
            checks: AtomicU64::new(0),
        })
    }

    /// Drop idle client keys from both limiters.
    pub fn prune(&self) {
        self.limiter.prune();
        self.slow_down.prune();
    }

    fn tick(&self) {
        let seen = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % PRUNE_EVERY == 0 {
            self.prune();
            tracing::debug!(
                clients = self.limiter.tracked_clients(),
                "pruned idle rate-limit keys"
            );
        }
    }
}

/// Middleware applying the hard limit, then the soft delay.
pub async fn throttle(State(throttle): State<Arc<Throttle>>, request: Request, next: Next) -> Response {
    let key = client_ip(&request, throttle.trust_proxy);
    throttle.tick();

    if let Err(fault) = throttle.limiter.check(&key) {
        tracing::debug!(client = %key, "rate limit exceeded");
        return ApiFault(fault).into_response();
    }

    if let Some(delay) = throttle.slow_down.delay_for(&key) {
        tracing::debug!(client = %key, delay_ms = delay.as_millis(), "slowing down client");
        tokio::time::sleep(delay).await;
    }

    next.run(request).await
}
