//! Layered configuration: a system config file merged with an optional
//! user/deployment overlay, following the same `overlay.field.or(self.field)`
//! merge convention the agent this gateway descends from uses for its own
//! runtime settings.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Overrides the directory config files are resolved from. Intended for
/// tests and the `--config` CLI flag; must be called before
/// [`load_runtime_settings`].
pub fn set_config_home_override(dir: PathBuf) {
    let _ = CONFIG_HOME_OVERRIDE.set(dir);
}

fn config_home() -> PathBuf {
    if let Some(dir) = CONFIG_HOME_OVERRIDE.get() {
        return dir.clone();
    }
    std::env::var("USSD_GATEWAY_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BackendSettings {
    fn merge(self, overlay: BackendSettings) -> Self {
        BackendSettings {
            url: overlay.url.or(self.url),
            username: overlay.username.or(self.username),
            password: overlay.password.or(self.password),
        }
    }

    /// Whether login should be attempted at all. Mirrors the source's
    /// convention: empty credentials mean the backend doesn't require auth.
    pub fn auth_enabled(&self) -> bool {
        matches!((&self.username, &self.password), (Some(u), Some(p)) if !u.is_empty() && !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgresSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub cluster: Option<String>,
    pub port: Option<u16>,
    pub keyspace: Option<String>,
}

impl PostgresSettings {
    fn merge(self, overlay: PostgresSettings) -> Self {
        PostgresSettings {
            user: overlay.user.or(self.user),
            password: overlay.password.or(self.password),
            cluster: overlay.cluster.or(self.cluster),
            port: overlay.port.or(self.port),
            keyspace: overlay.keyspace.or(self.keyspace),
        }
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.user.as_deref().unwrap_or("postgres"),
            self.password.as_deref().unwrap_or(""),
            self.cluster.as_deref().unwrap_or("127.0.0.1"),
            self.port.unwrap_or(5432),
            self.keyspace.as_deref().unwrap_or("ussd"),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub database: Option<u8>,
}

impl RedisSettings {
    fn merge(self, overlay: RedisSettings) -> Self {
        RedisSettings {
            host: overlay.host.or(self.host),
            port: overlay.port.or(self.port),
            password: overlay.password.or(self.password),
            database: overlay.database.or(self.database),
        }
    }

    pub fn connection_url(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        let port = self.port.unwrap_or(6379);
        match &self.password {
            Some(pw) if !pw.is_empty() => Some(format!(
                "redis://:{pw}@{host}:{port}/{}",
                self.database.unwrap_or(0)
            )),
            _ => Some(format!(
                "redis://{host}:{port}/{}",
                self.database.unwrap_or(0)
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSettings {
    pub backend_url: Option<String>,
    #[serde(default)]
    pub backend_auth: BackendSettings,
    #[serde(default)]
    pub postgres_db: PostgresSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    pub port: Option<u16>,
    pub step_graph_path: Option<String>,
    pub localization_dir: Option<String>,
    pub session_ttl_secs: Option<u64>,
    pub turn_timeout_secs: Option<u64>,
}

impl RuntimeSettings {
    pub fn merge(self, overlay: RuntimeSettings) -> Self {
        RuntimeSettings {
            backend_url: overlay.backend_url.or(self.backend_url),
            backend_auth: self.backend_auth.merge(overlay.backend_auth),
            postgres_db: self.postgres_db.merge(overlay.postgres_db),
            redis: self.redis.merge(overlay.redis),
            port: overlay.port.or(self.port),
            step_graph_path: overlay.step_graph_path.or(self.step_graph_path),
            localization_dir: overlay.localization_dir.or(self.localization_dir),
            session_ttl_secs: overlay.session_ttl_secs.or(self.session_ttl_secs),
            turn_timeout_secs: overlay.turn_timeout_secs.or(self.turn_timeout_secs),
        }
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(9000)
    }

    pub fn session_ttl_secs_or_default(&self) -> u64 {
        self.session_ttl_secs.unwrap_or(120)
    }

    pub fn turn_timeout_secs_or_default(&self) -> u64 {
        self.turn_timeout_secs.unwrap_or(8)
    }

    pub fn step_graph_path_or_default(&self) -> PathBuf {
        self.step_graph_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/ussd_config.json"))
    }

    pub fn localization_dir_or_default(&self) -> PathBuf {
        self.localization_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Validates `backend_url`, aborting startup (returning an error the
    /// caller turns into a process exit) on the same class of misconfiguration
    /// the original bootstrap guarded against: empty, missing scheme, or a
    /// known-malformed IP literal.
    pub fn validate_backend_url(&self) -> anyhow::Result<&str> {
        let url = self
            .backend_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "backend_url is not configured. Set backend_url (e.g. http://127.0.0.1:8383)"
                )
            })?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("invalid backend_url '{url}': must start with http:// or https://");
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
                    "backend_url host '{host_only}' looks like a malformed IPv4 address"
                );
            }
        }
        Ok(url)
    }
}

fn read_yaml(path: &Path) -> RuntimeSettings {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|body| serde_yaml::from_str(&body).ok())
        .unwrap_or_default()
}

/// Loads `config.yml` from the config home, then merges `config.local.yml`
/// over it if present. Never errors: a missing file yields defaults, letting
/// `validate_backend_url` be the single place startup fails loudly.
pub fn load_runtime_settings() -> RuntimeSettings {
    let home = config_home();
    let system = read_yaml(&home.join("config.yml"));
    let overlay = read_yaml(&home.join("config.local.yml"));
    system.merge(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_overlay_when_present() {
        let base = RuntimeSettings {
            backend_url: Some("http://base".into()),
            port: Some(1),
            ..Default::default()
        };
        let overlay = RuntimeSettings {
            port: Some(2),
            ..Default::default()
        };
        let merged = base.merge(overlay);
        assert_eq!(merged.backend_url.as_deref(), Some("http://base"));
        assert_eq!(merged.port, Some(2));
    }

    #[test]
    fn validate_backend_url_rejects_missing_scheme() {
        let settings = RuntimeSettings {
            backend_url: Some("127.0.0.1:8080".into()),
            ..Default::default()
        };
        assert!(settings.validate_backend_url().is_err());
    }

    #[test]
    fn validate_backend_url_rejects_malformed_ip_octet_count() {
        let settings = RuntimeSettings {
            backend_url: Some("http://164.928974:8383".into()),
            ..Default::default()
        };
        assert!(settings.validate_backend_url().is_err());
    }

    #[test]
    fn validate_backend_url_accepts_well_formed_url() {
        let settings = RuntimeSettings {
            backend_url: Some("http://164.92.89.74:8383".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.validate_backend_url().unwrap(),
            "http://164.92.89.74:8383"
        );
    }
}
