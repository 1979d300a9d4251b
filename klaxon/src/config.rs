//! Service configuration, read from a single RON file.
//!
//! ```ron
//! (
//!     api: (
//!         listen_address: "[::]:8000",
//!         callers: [
//!             (id: "alice", token_sha256: "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"),
//!         ],
//!     ),
//!     dispatch: (
//!         require_authentication: true,
//!         request_timeout_ms: 5000,
//!         retry: (max_attempts: 3, base_delay_ms: 200, max_delay_ms: 5000),
//!     ),
//!     channel: Fcm((project_id: "my-project")),
//!     store: (path: Some("/etc/klaxon/recipients.ron")),
//! )
//! ```

use std::path::{Path, PathBuf};

use klaxon_common::audit::AuditConfig;
use klaxon_dispatch::{ChannelConfig, DispatchConfig};
use klaxon_health::HealthConfig;
use klaxon_metrics::MetricsConfig;
use serde::Deserialize;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "KLAXON_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KlaxonConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// HTTP alarm API settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Callers allowed to ring alarms, keyed by the SHA-256 of their bearer token
    #[serde(default)]
    pub callers: Vec<CallerConfig>,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_listen_address() -> String {
    "[::]:8000".to_string()
}

const fn default_max_body_bytes() -> usize {
    16 * 1024
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            callers: Vec::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// A known caller and the hex SHA-256 digest of its bearer token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallerConfig {
    pub id: String,
    pub token_sha256: String,
}

/// Where recipients are loaded from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// RON file holding a list of recipients; an empty store when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl KlaxonConfig {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid RON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        Self::parse(&contents)
            .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
    }

    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid RON for this schema.
    pub fn parse(contents: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(contents)
    }
}

/// Find the configuration file using the following precedence:
/// 1. an explicit path (from the command line)
/// 2. `KLAXON_CONFIG` environment variable
/// 3. ./klaxon.config.ron (current working directory)
/// 4. /etc/klaxon/klaxon.config.ron (system-wide config)
///
/// # Errors
///
/// Returns an error naming every location tried if no file exists.
pub fn find_config_file(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("Config file does not exist: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("{CONFIG_ENV} points to non-existent file: {}", path.display());
    }

    let default_paths = [
        PathBuf::from("./klaxon.config.ron"),
        PathBuf::from("/etc/klaxon/klaxon.config.ron"),
    ];

    if let Some(path) = default_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}

#[cfg(test)]
mod tests {
    use klaxon_dispatch::ChannelConfig;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = KlaxonConfig::parse("()").expect("empty config parses");

        assert_eq!(config.api.listen_address, "[::]:8000");
        assert!(config.api.callers.is_empty());
        assert!(config.dispatch.require_authentication);
        assert_eq!(config.dispatch.request_timeout_ms, 5_000);
        assert_eq!(config.dispatch.retry.max_attempts, 3);
        assert_eq!(config.dispatch.retry.base_delay_ms, 200);
        assert_eq!(config.dispatch.retry.max_delay_ms, 5_000);
        assert_eq!(config.channel, ChannelConfig::DryRun);
        assert!(config.store.path.is_none());
        assert!(config.health.enabled);
        assert!(!config.metrics.enabled);
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_full_config() {
        let config = KlaxonConfig::parse(
            r#"(
                api: (
                    listen_address: "127.0.0.1:9000",
                    callers: [(id: "alice", token_sha256: "abcd")],
                ),
                dispatch: (
                    require_authentication: false,
                    request_timeout_ms: 2500,
                    resolver: (cache_ttl_secs: 60, token_max_age_secs: Some(86400)),
                    retry: (max_attempts: 5),
                    template: (title: "Wake up"),
                ),
                channel: Fcm((project_id: "klaxon-prod")),
                store: (path: Some("/var/lib/klaxon/recipients.ron")),
                health: (listen_address: "127.0.0.1:9001", max_in_flight: 50),
                audit: (redact_target: true),
            )"#,
        )
        .expect("full config parses");

        assert_eq!(config.api.listen_address, "127.0.0.1:9000");
        assert_eq!(
            config.api.callers,
            vec![CallerConfig {
                id: "alice".to_string(),
                token_sha256: "abcd".to_string(),
            }]
        );
        assert!(!config.dispatch.require_authentication);
        assert_eq!(config.dispatch.request_timeout_ms, 2_500);
        assert_eq!(config.dispatch.resolver.cache_ttl_secs, 60);
        assert_eq!(config.dispatch.resolver.token_max_age_secs, Some(86_400));
        assert_eq!(config.dispatch.retry.max_attempts, 5);
        assert_eq!(config.dispatch.template.title, "Wake up");
        assert!(matches!(config.channel, ChannelConfig::Fcm(ref fcm) if fcm.project_id == "klaxon-prod"));
        assert_eq!(
            config.store.path.as_deref(),
            Some(Path::new("/var/lib/klaxon/recipients.ron"))
        );
        assert_eq!(config.health.max_in_flight, 50);
        assert!(config.audit.redact_target);
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("klaxon.config.ron");
        std::fs::write(&path, "(api: oops)").expect("write config");

        let err = KlaxonConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("klaxon.config.ron"));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let err = find_config_file(Some(PathBuf::from("/nonexistent/klaxon.ron"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/klaxon.ron"));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("klaxon.config.ron");
        std::fs::write(&path, "()").expect("write config");
        assert_eq!(
            find_config_file(Some(path.clone())).expect("explicit path found"),
            path
        );
    }
}
