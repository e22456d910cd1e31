use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use copilot_common::{BridgeEvent, EventBus};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::cache::{CacheLookup, ServiceToken, TokenCache};
use super::exchange::TokenExchange;
use crate::error::BridgeError;

type PendingExchange = Shared<BoxFuture<'static, Result<ServiceToken, BridgeError>>>;

/// Produces valid service tokens, refreshing through a single shared
/// exchange when the cache is stale.
pub struct CredentialExchanger {
    inner: Arc<Inner>,
}

struct Inner {
    personal_token: String,
    exchange: Arc<dyn TokenExchange>,
    cache: TokenCache,
    pending: Mutex<Option<PendingExchange>>,
    fallback_ttl: chrono::Duration,
    retry_delay: Duration,
    events: Arc<EventBus>,
}

impl CredentialExchanger {
    pub fn new(
        personal_token: impl Into<String>,
        exchange: Arc<dyn TokenExchange>,
        cache: TokenCache,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                personal_token: personal_token.into(),
                exchange,
                cache,
                pending: Mutex::new(None),
                fallback_ttl: chrono::Duration::hours(2),
                retry_delay: Duration::from_secs(1),
                events: Arc::new(EventBus::default()),
            }),
        }
    }

    /// Builder: lifetime assumed when the exchange reports no expiry.
    pub fn with_fallback_ttl(mut self, ttl: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.fallback_ttl = chrono::Duration::from_std(ttl).unwrap_or(inner.fallback_ttl);
        }
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.retry_delay = delay;
        }
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.events = events;
        }
        self
    }

    pub fn cache(&self) -> &TokenCache {
        &self.inner.cache
    }

    /// Return a fresh service token, exchanging at most once for any number
    /// of concurrent callers that find the cache stale.
    pub async fn resolve_token(&self) -> Result<ServiceToken, BridgeError> {
        if let CacheLookup::Fresh(token) = self.inner.cache.get() {
            return Ok(token);
        }

        let pending = {
            let mut slot = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            // A refresh may have landed between the lookup and the lock.
            if let CacheLookup::Fresh(token) = self.inner.cache.get() {
                return Ok(token);
            }

            match slot.as_ref() {
                Some(existing) => {
                    debug!("joining in-flight token exchange");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut = async move { inner.refresh().await }.boxed().shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        let result = pending.clone().await;

        let mut slot = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|current| Shared::ptr_eq(current, &pending))
        {
            *slot = None;
        }

        result
    }

    /// Drop `token` from the cache if it is still current. Returns `false`
    /// when another caller already replaced or removed it.
    pub fn invalidate(&self, token: &ServiceToken) -> bool {
        let removed = self.inner.cache.invalidate_if(&token.secret);
        if removed {
            debug!("service token invalidated");
        }
        removed
    }
}

impl Inner {
    async fn refresh(&self) -> Result<ServiceToken, BridgeError> {
        if self.personal_token.is_empty() {
            return Err(BridgeError::Authentication(
                "no personal token configured".into(),
            ));
        }

        let exchanged = match self.exchange.exchange(&self.personal_token).await {
            Err(e) if e.is_transient() => {
                warn!(error = %e, "token exchange failed, retrying once");
                tokio::time::sleep(self.retry_delay).await;
                self.exchange.exchange(&self.personal_token).await?
            }
            other => other?,
        };

        let expires_at = exchanged
            .expires_at
            .unwrap_or_else(|| Utc::now() + self.fallback_ttl);
        let token = ServiceToken::new(exchanged.token, expires_at);
        self.cache.set(token.clone());

        info!(expires_at = %expires_at, "service token refreshed");
        self.events.publish(BridgeEvent::TokenRefreshed {
            expires_at: expires_at.timestamp(),
        });

        Ok(token)
    }
}
