//! Credential pool with daily quotas, pacing and failure tracking.
//!
//! [`PoolState`] is the plain state machine; [`KeyPool`] wraps it in an async
//! mutex. A credential is reserved (counter incremented, next-allowed instant
//! advanced) while the lock is held, and the pacing delay is slept after the
//! lock is released, so concurrent callers never double-spend a slot.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct KeyPoolConfig {
    /// Hard cap on calls per credential per UTC day.
    pub daily_limit: u32,
    /// Minimum spacing between two calls on the same credential.
    pub min_interval: Duration,
    /// Consecutive failures before a credential is deactivated.
    pub max_failures: u32,
}

impl Default for KeyPoolConfig {
    fn default() -> Self {
        Self {
            daily_limit: 1500,
            min_interval: Duration::from_secs(4),
            max_failures: 3,
        }
    }
}

/// How a call on a credential failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rate limit or quota: the credential is spent for today.
    Quota,
    /// Anything else: counts towards deactivation.
    Other,
}

/// A reserved call slot on one credential.
#[derive(Clone)]
pub struct Lease {
    pub index: usize,
    pub key: String,
    /// Pacing delay to honour before calling.
    pub wait: Duration,
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("index", &self.index)
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

/// Public view of one credential, without the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub index: usize,
    pub requests_today: u32,
    pub failure_count: u32,
    pub active: bool,
}

#[derive(Clone)]
struct Credential {
    key: String,
    requests_today: u32,
    failure_count: u32,
    active: bool,
    next_allowed: Option<Instant>,
}

/// Rotation state over an ordered list of credentials.
#[derive(Clone)]
pub struct PoolState {
    config: KeyPoolConfig,
    credentials: Vec<Credential>,
    key_index: usize,
    day: NaiveDate,
}

impl fmt::Debug for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolState")
            .field("credentials", &self.credentials.len())
            .field("key_index", &self.key_index)
            .field("day", &self.day)
            .finish()
    }
}

impl PoolState {
    pub fn new(keys: Vec<String>, config: KeyPoolConfig, today: NaiveDate) -> Self {
        let credentials = keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(|key| Credential {
                key,
                requests_today: 0,
                failure_count: 0,
                active: true,
                next_allowed: None,
            })
            .collect();
        Self {
            config,
            credentials,
            key_index: 0,
            day: today,
        }
    }

    /// Resets counters and reactivates every credential on a new UTC day.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if today == self.day {
            return;
        }
        info!(from = %self.day, to = %today, "reasoning quota day rolled over");
        for credential in &mut self.credentials {
            credential.requests_today = 0;
            credential.failure_count = 0;
            credential.active = true;
        }
        self.key_index = 0;
        self.day = today;
    }

    /// Reserves a call on the current credential, rotating past spent or
    /// inactive ones. Returns `None` when nothing is usable.
    pub fn reserve(&mut self, today: NaiveDate, now: Instant) -> Option<Lease> {
        self.roll_over(today);
        let count = self.credentials.len();
        let daily_limit = self.config.daily_limit;
        let index = (0..count)
            .map(|offset| (self.key_index + offset) % count)
            .find(|&i| {
                let c = &self.credentials[i];
                c.active && c.requests_today < daily_limit
            })?;
        if index != self.key_index {
            debug!(from = self.key_index, to = index, "rotating reasoning credential");
            self.key_index = index;
        }

        let min_interval = self.config.min_interval;
        let credential = &mut self.credentials[index];
        let start = credential.next_allowed.map_or(now, |next| next.max(now));
        credential.requests_today += 1;
        credential.next_allowed = Some(start + min_interval);
        Some(Lease {
            index,
            key: credential.key.clone(),
            wait: start.saturating_duration_since(now),
        })
    }

    pub fn report_success(&mut self, index: usize) {
        if let Some(credential) = self.credentials.get_mut(index) {
            credential.failure_count = 0;
        }
    }

    pub fn report_failure(&mut self, index: usize, kind: FailureKind) {
        let count = self.credentials.len();
        let max_failures = self.config.max_failures;
        let daily_limit = self.config.daily_limit;
        let Some(credential) = self.credentials.get_mut(index) else {
            return;
        };
        match kind {
            FailureKind::Quota => {
                warn!(index, "reasoning credential hit its quota");
                credential.requests_today = daily_limit;
            }
            FailureKind::Other => {
                credential.failure_count += 1;
                if credential.failure_count >= max_failures {
                    warn!(index, failures = credential.failure_count, "deactivating reasoning credential");
                    credential.active = false;
                }
            }
        }
        let spent = !credential.active || credential.requests_today >= daily_limit;
        if spent && count > 0 && index == self.key_index {
            self.key_index = (index + 1) % count;
        }
    }

    /// Whether any credential can still be used today.
    pub fn has_capacity(&self) -> bool {
        self.credentials
            .iter()
            .any(|c| c.active && c.requests_today < self.config.daily_limit)
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn statuses(&self) -> Vec<CredentialStatus> {
        self.credentials
            .iter()
            .enumerate()
            .map(|(index, c)| CredentialStatus {
                index,
                requests_today: c.requests_today,
                failure_count: c.failure_count,
                active: c.active,
            })
            .collect()
    }
}

/// Shared, async-safe credential pool.
#[derive(Debug)]
pub struct KeyPool {
    state: Mutex<PoolState>,
}

impl KeyPool {
    pub fn new(keys: Vec<String>, config: KeyPoolConfig) -> Self {
        Self {
            state: Mutex::new(PoolState::new(keys, config, Utc::now().date_naive())),
        }
    }

    /// Reserves a credential and waits out its pacing delay.
    pub async fn acquire_credential(&self) -> Option<Lease> {
        let lease = {
            let mut state = self.state.lock().await;
            state.reserve(Utc::now().date_naive(), Instant::now())
        }?;
        if !lease.wait.is_zero() {
            debug!(index = lease.index, wait_ms = lease.wait.as_millis() as u64, "pacing reasoning call");
            tokio::time::sleep(lease.wait).await;
        }
        Some(lease)
    }

    pub async fn report_success(&self, index: usize) {
        self.state.lock().await.report_success(index);
    }

    pub async fn report_failure(&self, index: usize, kind: FailureKind) {
        let mut state = self.state.lock().await;
        state.roll_over(Utc::now().date_naive());
        state.report_failure(index, kind);
    }

    pub async fn has_capacity(&self) -> bool {
        let mut state = self.state.lock().await;
        state.roll_over(Utc::now().date_naive());
        state.has_capacity()
    }

    pub async fn statuses(&self) -> Vec<CredentialStatus> {
        self.state.lock().await.statuses()
    }
}
