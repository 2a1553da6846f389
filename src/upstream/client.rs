//! Authenticated HTTP/JSON client to the payments backend.
//!
//! One process-wide token lease guarded by a mutex held across the login
//! call itself, so concurrent callers that arrive while a login is already
//! in flight wait on that same login instead of racing a second one.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::upstream::auth::{LEASE_TTL, Lease};

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// Prefers the friendly `msg` field over the raw `message` field, per
    /// the error-to-user policy.
    fn user_message(&self) -> String {
        if !self.msg.is_empty() {
            self.msg.clone()
        } else {
            self.message.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
    #[serde(rename = "tokenType", alias = "token_type", default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatePayload {
    pub service_type: String,
    pub customer_phone: String,
    pub account_number: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_msisdn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateResult {
    pub transaction_id: String,
    pub amount: f64,
    #[serde(default)]
    pub besoft_share_amount: f64,
    #[serde(default)]
    pub customer_account_name: String,
    #[serde(default)]
    pub vend_min: Option<f64>,
    #[serde(default)]
    pub vend_max: Option<f64>,
    #[serde(default)]
    pub validate_extras: Option<Value>,
    /// Populated for tax (RRA) initiations; absent for the other services.
    #[serde(default)]
    pub tax_type: Option<String>,
    #[serde(default)]
    pub charges: Option<f64>,
}

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    lease: Mutex<Option<Lease>>,
}

impl UpstreamClient {
    pub fn new(base_url: &str, username: Option<String>, password: Option<String>) -> anyhow::Result<Self> {
        validate_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(UpstreamClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            lease: Mutex::new(None),
        })
    }

    fn auth_enabled(&self) -> bool {
        matches!((&self.username, &self.password), (Some(u), Some(p)) if !u.is_empty() && !p.is_empty())
    }

    /// Returns the current lease, logging in if absent or expired. Holds the
    /// lease mutex across the login request so concurrent callers coalesce
    /// onto a single in-flight login.
    async fn ensure_lease(&self) -> Result<Option<(String, String)>, EngineError> {
        if !self.auth_enabled() {
            return Ok(None);
        }
        let mut guard = self.lease.lock().await;
        if let Some(lease) = guard.as_ref() {
            if !lease.is_expired() {
                return Ok(Some((lease.token.clone(), lease.token_type.clone())));
            }
        }
        let lease = self.login().await?;
        let pair = (lease.token.clone(), lease.token_type.clone());
        *guard = Some(lease);
        Ok(Some(pair))
    }

    async fn clear_lease(&self) {
        let mut guard = self.lease.lock().await;
        *guard = None;
    }

    async fn login(&self) -> Result<Lease, EngineError> {
        tracing::info!(
            event = crate::observability::SessionEvent::UpstreamLoginStarted.as_str(),
            ""
        );
        let body = serde_json::json!({
            "username": self.username.clone().unwrap_or_default(),
            "password": self.password.clone().unwrap_or_default(),
        });
        let response = self
            .http
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let envelope: Envelope<LoginData> = response
            .json()
            .await
            .map_err(|e| EngineError::BackendUnreachable(format!("malformed login response: {e}")))?;
        if !status.is_success() || !envelope.success {
            tracing::warn!(
                event = crate::observability::SessionEvent::UpstreamLoginFailed.as_str(),
                status = status.as_u16()
            );
            return Err(EngineError::Backend {
                status: status.as_u16(),
                message: envelope.user_message(),
            });
        }
        let data = envelope
            .data
            .ok_or_else(|| EngineError::BackendUnreachable("login response missing data".into()))?;
        tracing::info!(event = crate::observability::SessionEvent::UpstreamLoginSucceeded.as_str(), "");
        Ok(Lease {
            token: data.token,
            token_type: data.token_type,
            expires_at: Instant::now() + LEASE_TTL,
        })
    }

    /// POSTs `body` to `path`, retrying exactly once on 401/403 after
    /// clearing the lease and logging in again.
    async fn post_authenticated<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, EngineError> {
        let mut attempted_retry = false;
        loop {
            let auth = self.ensure_lease().await?;
            let mut request = self.http.post(format!("{}{}", self.base_url, path)).json(body);
            if let Some((token, token_type)) = &auth {
                request = request.header("Authorization", format!("{token_type} {token}"));
            }
            let response = request.send().await.map_err(map_transport_error)?;
            let status = response.status();

            if (status.as_u16() == 401 || status.as_u16() == 403) && auth.is_some() && !attempted_retry {
                attempted_retry = true;
                self.clear_lease().await;
                tracing::warn!(
                    event = crate::observability::SessionEvent::UpstreamRetryAfterAuthError.as_str(),
                    path
                );
                continue;
            }

            let envelope: Envelope<T> = response
                .json()
                .await
                .map_err(|e| EngineError::BackendUnreachable(format!("malformed response from {path}: {e}")))?;

            if !status.is_success() || !envelope.success {
                tracing::warn!(
                    event = crate::observability::SessionEvent::UpstreamCallFailed.as_str(),
                    path,
                    status = status.as_u16()
                );
                return Err(EngineError::Backend {
                    status: status.as_u16(),
                    message: envelope.user_message(),
                });
            }

            return envelope
                .data
                .ok_or_else(|| EngineError::BackendUnreachable(format!("{path} response missing data")));
        }
    }

    pub async fn initiate(&self, payload: &InitiatePayload) -> Result<InitiateResult, EngineError> {
        let body = serde_json::to_value(payload).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.post_authenticated("/api/efashe/initiate", &body).await
    }

    pub async fn initiate_for_other(&self, payload: &InitiatePayload) -> Result<InitiateResult, EngineError> {
        let body = serde_json::to_value(payload).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.post_authenticated("/api/efashe/initiate-for-other", &body).await
    }

    pub async fn process(&self, transaction_id: &str) -> Result<(), EngineError> {
        let _: Value = self
            .post_authenticated(&format!("/api/efashe/process/{transaction_id}"), &serde_json::json!({}))
            .await?;
        Ok(())
    }
}

fn map_transport_error(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::BackendUnreachable("upstream request timed out".to_string())
    } else if err.is_connect() {
        EngineError::BackendUnreachable(format!("could not connect to backend: {err}"))
    } else {
        EngineError::BackendUnreachable(err.to_string())
    }
}

/// Validates the base URL shape at construction time, the same class of
/// check the original bootstrap performed before starting the server.
fn validate_base_url(url: &str) -> anyhow::Result<()> {
    if url.is_empty() {
        anyhow::bail!("backend base url is empty");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("backend base url '{url}' must start with http:// or https://");
    }
    let host = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("");
    let host_only = host.split(':').next().unwrap_or("");
    if host_only.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let octets: Vec<&str> = host_only.split('.').collect();
        if octets.len() != 4 {
            anyhow::bail!(
                "backend base url host '{host_only}' looks like a malformed IPv4 address"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_scheme() {
        assert!(validate_base_url("127.0.0.1:8080").is_err());
    }

    #[test]
    fn rejects_malformed_ip_octet_count() {
        assert!(validate_base_url("http://164.928974:8383").is_err());
    }

    #[test]
    fn accepts_well_formed_url() {
        assert!(validate_base_url("http://164.92.89.74:8383").is_ok());
    }

    #[test]
    fn accepts_hostnames() {
        assert!(validate_base_url("https://backend.example.com").is_ok());
    }
}
