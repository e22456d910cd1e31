use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Short-lived credential used for conversation calls.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl ServiceToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }
}

impl fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh(ServiceToken),
    /// Present but inside the refresh margin (or already past expiry).
    Stale,
    Empty,
}

/// Holds the current service token. At most one token at a time.
pub struct TokenCache {
    slot: Mutex<Option<ServiceToken>>,
    margin: chrono::Duration,
}

impl TokenCache {
    pub fn new(margin: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            margin: chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero()),
        }
    }

    pub fn get(&self) -> CacheLookup {
        self.get_at(Utc::now())
    }

    /// Fresh means `now + margin < expires_at`.
    pub fn get_at(&self, now: DateTime<Utc>) -> CacheLookup {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(token) if now + self.margin < token.expires_at => {
                CacheLookup::Fresh(token.clone())
            }
            Some(_) => CacheLookup::Stale,
            None => CacheLookup::Empty,
        }
    }

    pub fn set(&self, token: ServiceToken) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub fn invalidate(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Drop the cached token only if it is still the one that failed.
    /// Returns whether anything was removed.
    pub fn invalidate_if(&self, secret: &str) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|t| t.secret == secret) {
            *slot = None;
            true
        } else {
            false
        }
    }
}
