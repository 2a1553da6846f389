//! Redis/Valkey-backed session storage: key naming, lazy connection, and a
//! single reconnect-and-retry on a dropped connection.

use std::sync::Arc;

use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::observability::SessionEvent;

#[derive(Debug, Clone)]
pub struct RedisSessionConfig {
    pub url: String,
    pub key_prefix: String,
    pub ttl_secs: u64,
}

impl RedisSessionConfig {
    pub fn new(url: impl Into<String>, key_prefix: impl Into<String>, ttl_secs: u64) -> Self {
        RedisSessionConfig {
            url: url.into(),
            key_prefix: key_prefix.into(),
            ttl_secs,
        }
    }
}

pub struct RedisSessionBackend {
    client: redis::Client,
    key_prefix: String,
    ttl_secs: u64,
    connection: Arc<Mutex<Option<redis::aio::MultiplexedConnection>>>,
}

impl RedisSessionBackend {
    pub fn new(config: RedisSessionConfig) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(RedisSessionBackend {
            client,
            key_prefix: config.key_prefix,
            ttl_secs: config.ttl_secs,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    fn state_key(&self, session_id: &str) -> String {
        format!("{}:{}", self.key_prefix, session_id)
    }

    fn extras_key(&self, session_id: &str) -> String {
        format!("{}:{}-extra", self.key_prefix, session_id)
    }

    async fn ensure_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        tracing::debug!(event = SessionEvent::StoreValkeyConnected.as_str(), "connected to session store");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reconnect(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        let mut guard = self.connection.lock().await;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Runs a single GET against `key`, retrying once through a fresh
    /// connection if the first attempt fails (covers a dropped connection
    /// without maintaining a persistent health-check loop).
    async fn get_string(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.ensure_connection().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(v) => Ok(v),
            Err(first_err) => {
                let mut conn = self.reconnect().await?;
                match conn.get::<_, Option<String>>(key).await {
                    Ok(v) => {
                        tracing::warn!(
                            event = SessionEvent::StoreValkeyCommandRetrySucceeded.as_str(),
                            "session store GET recovered after reconnect"
                        );
                        Ok(v)
                    }
                    Err(retry_err) => {
                        tracing::error!(
                            event = SessionEvent::StoreValkeyCommandRetryFailed.as_str(),
                            first_error = %first_err,
                            "session store GET failed after reconnect"
                        );
                        Err(retry_err)
                    }
                }
            }
        }
    }

    /// Runs a SET with expiry, retrying once through a fresh connection on
    /// failure, mirroring [`Self::get_string`].
    async fn set_string_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), redis::RedisError> {
        let mut conn = self.ensure_connection().await?;
        match conn
            .set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
        {
            Ok(()) => Ok(()),
            Err(first_err) => {
                let mut conn = self.reconnect().await?;
                match conn.set_ex::<_, _, ()>(key, value, ttl_secs).await {
                    Ok(()) => {
                        tracing::warn!(
                            event = SessionEvent::StoreValkeyCommandRetrySucceeded.as_str(),
                            "session store SET recovered after reconnect"
                        );
                        Ok(())
                    }
                    Err(retry_err) => {
                        tracing::error!(
                            event = SessionEvent::StoreValkeyCommandRetryFailed.as_str(),
                            first_error = %first_err,
                            "session store SET failed after reconnect"
                        );
                        Err(retry_err)
                    }
                }
            }
        }
    }

    pub async fn load_state(&self, session_id: &str) -> Result<Option<String>, redis::RedisError> {
        self.get_string(&self.state_key(session_id)).await
    }

    pub async fn save_state(&self, session_id: &str, json: &str) -> Result<(), redis::RedisError> {
        self.set_string_ex(&self.state_key(session_id), json, self.ttl_secs)
            .await
    }

    pub async fn load_extras(&self, session_id: &str) -> Result<Option<String>, redis::RedisError> {
        self.get_string(&self.extras_key(session_id)).await
    }

    pub async fn save_extras(&self, session_id: &str, json: &str) -> Result<(), redis::RedisError> {
        self.set_string_ex(&self.extras_key(session_id), json, self.ttl_secs)
            .await
    }
}
