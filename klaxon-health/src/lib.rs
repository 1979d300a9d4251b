//! Health check endpoints for the Klaxon alarm service
//!
//! # Endpoints
//!
//! - **`/health/live`** - Liveness probe: 200 while the process can respond
//! - **`/health/ready`** - Readiness probe: 200 while the API is bound, the
//!   recipient store and delivery channel are usable, and in-flight alarms
//!   are below the configured threshold
//!
//! # Usage
//!
//! ```rust,no_run
//! use klaxon_health::{HealthChecker, HealthConfig, HealthServer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HealthConfig {
//!     listen_address: "[::]:8080".to_string(),
//!     ..HealthConfig::default()
//! };
//!
//! let health_checker = Arc::new(HealthChecker::new(config.max_in_flight));
//! let server = HealthServer::new(config, health_checker).await?;
//!
//! // server.serve(shutdown_receiver).await?;
//! # Ok(())
//! # }
//! ```

mod checker;
mod config;
mod error;
mod server;

pub use checker::{HealthChecker, HealthStatus};
pub use config::HealthConfig;
pub use error::HealthError;
pub use server::HealthServer;
