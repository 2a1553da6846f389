//! Session store: Redis-backed when a store URL is configured, an in-memory
//! `HashMap` fallback otherwise. Every public method branches on which
//! backend is active — the same shape the agent this gateway descends from
//! uses for its own chat-history store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::observability::SessionEvent;
use crate::session::redis_backend::{RedisSessionBackend, RedisSessionConfig};
use crate::session::state::{SessionExtras, SessionState};

pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
    extras_inner: Arc<RwLock<HashMap<String, String>>>,
    redis: Option<Arc<RedisSessionBackend>>,
    ttl_secs: u64,
}

impl SessionStore {
    /// In-memory-only store; TTL is advisory (no background reaper runs).
    pub fn in_memory(ttl_secs: u64) -> Self {
        SessionStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            extras_inner: Arc::new(RwLock::new(HashMap::new())),
            redis: None,
            ttl_secs,
        }
    }

    pub fn with_redis(url: &str, key_prefix: &str, ttl_secs: u64) -> Result<Self, redis::RedisError> {
        let backend = RedisSessionBackend::new(RedisSessionConfig::new(url, key_prefix, ttl_secs))?;
        Ok(SessionStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            extras_inner: Arc::new(RwLock::new(HashMap::new())),
            redis: Some(Arc::new(backend)),
            ttl_secs,
        })
    }

    /// Builds from settings: Redis when a connection URL is configured,
    /// falling back to in-memory and logging the fallback otherwise.
    pub fn from_settings(redis: &crate::config::RedisSettings, ttl_secs: u64) -> Self {
        match redis.connection_url() {
            Some(url) => match Self::with_redis(&url, "ussd", ttl_secs) {
                Ok(store) => store,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to construct session store, falling back to memory");
                    tracing::warn!(event = SessionEvent::StoreFallbackToMemory.as_str(), "");
                    Self::in_memory(ttl_secs)
                }
            },
            None => {
                tracing::info!(event = SessionEvent::StoreFallbackToMemory.as_str(), "no redis configured");
                Self::in_memory(ttl_secs)
            }
        }
    }

    /// Store errors on read surface as "absent", never as a propagated
    /// error: an unreachable store is indistinguishable from a session that
    /// was never created, and the engine already treats that as "new
    /// session" rather than failing the turn.
    pub async fn load(&self, session_id: &str) -> EngineResult<Option<SessionState>> {
        if let Some(ref redis) = self.redis {
            let raw = match redis.load_state(session_id).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::error!(error = %err, session_id, "session store read failed, treating as absent");
                    return Ok(None);
                }
            };
            let state = raw.and_then(|s| serde_json::from_str(&s).ok());
            tracing::debug!(
                event = SessionEvent::SessionLoaded.as_str(),
                backend = "redis",
                session_id,
                found = state.is_some()
            );
            Ok(state)
        } else {
            let guard = self.inner.read().await;
            let state = guard
                .get(session_id)
                .and_then(|s| serde_json::from_str(s).ok());
            tracing::debug!(
                event = SessionEvent::SessionLoaded.as_str(),
                backend = "memory",
                session_id,
                found = state.is_some()
            );
            Ok(state)
        }
    }

    /// Persists `state`, refreshing the TTL. TTL is only ever touched here —
    /// `load` never extends a session's lifetime.
    pub async fn save(&self, state: &SessionState) -> EngineResult<()> {
        let json = serde_json::to_string(state).map_err(|e| EngineError::Store(e.to_string()))?;
        if let Some(ref redis) = self.redis {
            redis
                .save_state(&state.session_id, &json)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
            tracing::debug!(event = SessionEvent::SessionSaved.as_str(), backend = "redis", session_id = %state.session_id);
        } else {
            let mut guard = self.inner.write().await;
            guard.insert(state.session_id.clone(), json);
            tracing::debug!(event = SessionEvent::SessionSaved.as_str(), backend = "memory", session_id = %state.session_id);
        }
        Ok(())
    }

    /// Missing keys, same as [`SessionStore::load`], are never a fault: a
    /// read failure yields empty extras rather than an error.
    pub async fn load_extras(&self, session_id: &str) -> EngineResult<SessionExtras> {
        if let Some(ref redis) = self.redis {
            let raw = match redis.load_extras(session_id).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::error!(error = %err, session_id, "extras store read failed, treating as empty");
                    return Ok(SessionExtras::default());
                }
            };
            Ok(raw
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default())
        } else {
            let guard = self.extras_inner.read().await;
            Ok(guard
                .get(session_id)
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default())
        }
    }

    pub async fn save_extras(&self, session_id: &str, extras: &SessionExtras) -> EngineResult<()> {
        let json = serde_json::to_string(extras).map_err(|e| EngineError::Store(e.to_string()))?;
        if let Some(ref redis) = self.redis {
            redis
                .save_extras(session_id, &json)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
        } else {
            let mut guard = self.extras_inner.write().await;
            guard.insert(session_id.to_string(), json);
        }
        Ok(())
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips_state() {
        let store = SessionStore::in_memory(120);
        let state = SessionState::new("s1", "250700000000");
        store.save(&state).await.unwrap();
        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, "s1");
        assert_eq!(loaded.step_id, "home");
    }

    #[tokio::test]
    async fn missing_session_returns_none_not_error() {
        let store = SessionStore::in_memory(120);
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extras_round_trip_and_default_when_absent() {
        let store = SessionStore::in_memory(120);
        let extras = store.load_extras("s1").await.unwrap();
        assert!(extras.get("anything").is_none());

        let mut extras = SessionExtras::default();
        extras.set("electricity_meter_number", "1234567890");
        store.save_extras("s1", &extras).await.unwrap();
        let reloaded = store.load_extras("s1").await.unwrap();
        assert_eq!(
            reloaded.get_typed::<String>("electricity_meter_number").as_deref(),
            Some("1234567890")
        );
    }
}
