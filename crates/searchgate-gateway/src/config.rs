//! Gateway configuration.
//!
//! Configuration loads from a TOML or JSON file, then environment overrides
//! apply on top. `ES_CLUSTER_URL` is the one required setting; `USERNAME`
//! and `PASSWORD` bootstrap the admin principal on first run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use searchgate_core::{GatewayError, GatewayResult};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings.
    pub server: ServerSettings,
    /// Upstream search-cluster settings.
    pub upstream: UpstreamSettings,
    /// Analytics write-path settings.
    pub analytics: AnalyticsSettings,
    /// Principal store and bootstrap settings.
    pub principals: PrincipalSettings,
}

impl GatewayConfig {
    /// Loads configuration from a TOML or JSON file, by extension.
    pub fn from_file(path: impl Into<std::path::PathBuf>) -> GatewayResult<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| GatewayError::internal(format!("failed to read config file: {e}")))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| GatewayError::internal(format!("invalid TOML config: {e}"))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| GatewayError::internal(format!("invalid JSON config: {e}"))),
            _ => Err(GatewayError::internal(format!(
                "unsupported config format: {extension}"
            ))),
        }
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("ES_CLUSTER_URL") {
            self.upstream.url = url;
        }
        if let Ok(username) = std::env::var("USERNAME") {
            self.principals.bootstrap_username = Some(username);
        }
        if let Ok(password) = std::env::var("PASSWORD") {
            self.principals.bootstrap_password = Some(password);
        }
        if let Ok(addr) = std::env::var("SEARCHGATE_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(port) = std::env::var("SEARCHGATE_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                self.server.listen_port = port;
            }
        }
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.upstream.url.is_empty() {
            return Err(GatewayError::internal(
                "upstream url is required (set ES_CLUSTER_URL)",
            ));
        }
        if !self.upstream.url.starts_with("http://") && !self.upstream.url.starts_with("https://") {
            return Err(GatewayError::internal(
                "upstream url must start with http:// or https://",
            ));
        }
        if self.analytics.queue_capacity == 0 {
            return Err(GatewayError::internal(
                "analytics queue capacity must be positive",
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind.
    pub listen_addr: String,
    /// Port to bind.
    pub listen_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8000,
        }
    }
}

/// Upstream search-cluster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Base URL of the cluster.
    pub url: String,
    /// Per-request deadline for upstream calls.
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Fail startup when the cluster is unreachable.
    pub strict_startup: bool,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            strict_startup: false,
        }
    }
}

/// Analytics write-path settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// Analytics index name.
    pub index: String,
    /// Bounded capture queue capacity.
    pub queue_capacity: usize,
    /// Record every `_msearch` response instead of only the first.
    pub record_all_msearch_responses: bool,
    /// Deadline for each geo lookup.
    #[serde(with = "duration_serde")]
    pub geo_timeout: Duration,
    /// Deadline for each analytics write.
    #[serde(with = "duration_serde")]
    pub write_timeout: Duration,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            index: "analytics".to_string(),
            queue_capacity: 1024,
            record_all_msearch_responses: false,
            geo_timeout: Duration::from_millis(500),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl AnalyticsSettings {
    /// Converts into the analytics crate's tuning struct.
    #[must_use]
    pub fn to_analytics_config(&self) -> searchgate_analytics::AnalyticsConfig {
        searchgate_analytics::AnalyticsConfig {
            queue_capacity: self.queue_capacity,
            record_all_msearch_responses: self.record_all_msearch_responses,
            geo_timeout: self.geo_timeout,
            write_timeout: self.write_timeout,
        }
    }
}

/// Principal store and bootstrap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrincipalSettings {
    /// Principals index name.
    pub index: String,
    /// Admin principal created on first run, when set.
    pub bootstrap_username: Option<String>,
    /// Password for the bootstrap admin.
    pub bootstrap_password: Option<String>,
}

impl Default for PrincipalSettings {
    fn default() -> Self {
        Self {
            index: "principals".to_string(),
            bootstrap_username: None,
            bootstrap_password: None,
        }
    }
}

/// Serde support for durations written as `"500ms"`, `"30s"`, `"5m"` or bare
/// seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let (value, unit): (&str, fn(u64) -> Duration) = if let Some(v) = s.strip_suffix("ms") {
            (v, Duration::from_millis)
        } else if let Some(v) = s.strip_suffix('s') {
            (v, Duration::from_secs)
        } else if let Some(v) = s.strip_suffix('m') {
            (v, |n| Duration::from_secs(n * 60))
        } else {
            (s, Duration::from_secs)
        };
        value
            .trim()
            .parse()
            .map(unit)
            .map_err(|_| format!("invalid duration: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.listen_port, 8000);
        assert_eq!(config.upstream.timeout, Duration::from_secs(30));
        assert_eq!(config.principals.index, "principals");
        assert_eq!(config.analytics.index, "analytics");
        assert!(!config.analytics.record_all_msearch_responses);
    }

    #[test]
    fn test_validate_requires_upstream_url() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.upstream.url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.upstream.url = "http://localhost:9200".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml = r#"
[server]
listen_port = 8001

[upstream]
url = "http://es:9200"
timeout = "10s"
strict_startup = true

[analytics]
queue_capacity = 64
geo_timeout = "250ms"
"#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_port, 8001);
        assert_eq!(config.upstream.url, "http://es:9200");
        assert_eq!(config.upstream.timeout, Duration::from_secs(10));
        assert!(config.upstream.strict_startup);
        assert_eq!(config.analytics.queue_capacity, 64);
        assert_eq!(config.analytics.geo_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_env_overrides() {
        // Env vars are process-global; use names only this test sets.
        std::env::set_var("SEARCHGATE_LISTEN_PORT", "9001");
        let config = GatewayConfig::default().with_env_overrides();
        assert_eq!(config.server.listen_port, 9001);
        std::env::remove_var("SEARCHGATE_LISTEN_PORT");
    }
}
