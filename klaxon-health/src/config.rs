//! Health check configuration

use serde::Deserialize;

/// Configuration for health check endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Enable or disable health check server
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address to bind the health check server
    ///
    /// Common values:
    /// - `[::]:8080` (IPv6 any address, port 8080)
    /// - `0.0.0.0:8080` (IPv4 any address, port 8080)
    /// - `127.0.0.1:8080` (localhost only, port 8080)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// In-flight alarm threshold for the readiness probe
    ///
    /// Above this the service stops advertising itself as ready, so a load
    /// balancer can shed new alarms to other replicas.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u64,

    /// How often component readiness is sampled, in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

const fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}

const fn default_max_in_flight() -> u64 {
    1000
}

const fn default_sample_interval_ms() -> u64 {
    1000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
            max_in_flight: default_max_in_flight(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}
