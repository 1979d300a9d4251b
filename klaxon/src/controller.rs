use std::{
    net::SocketAddr,
    sync::{Arc, LazyLock},
    time::Duration,
};

use klaxon_common::{Signal, audit, internal, logging, tracing};
use klaxon_dispatch::{AlertService, MemoryRecipientStore, RecipientStore, policy::deadline_after};
use klaxon_health::{HealthChecker, HealthServer};
use tokio::{
    sync::broadcast,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    api::{ApiServer, ApiState},
    auth::TokenIdentityProvider,
    config::{KlaxonConfig, StoreConfig},
};

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

/// Initialise process-wide logging, audit and metrics, then run until a
/// termination signal is received.
///
/// # Errors
///
/// Returns an error if any component fails to start, or a server fails
/// while running.
pub async fn run(config: KlaxonConfig) -> anyhow::Result<()> {
    logging::init();
    audit::init(config.audit.clone());
    klaxon_metrics::init_metrics(&config.metrics)?;

    internal!(level = INFO, "Controller running");

    let klaxon = Klaxon::build(config).await?;

    let ret = tokio::select! {
        r = klaxon.serve(&SHUTDOWN_BROADCAST) => r,
        r = shutdown() => r,
    };

    internal!(level = INFO, "Shutting down...");

    ret
}

/// Every long-lived component of a running service
pub struct Klaxon {
    service: Arc<AlertService>,
    api: ApiServer,
    health: Option<HealthServer>,
    checker: Arc<HealthChecker>,
    sample_interval: Duration,
}

impl Klaxon {
    /// Construct the pipeline and bind the API and health listeners.
    ///
    /// # Errors
    ///
    /// Returns an error if the recipient file cannot be loaded, the channel
    /// or caller table is misconfigured, or a listener cannot be bound.
    pub async fn build(config: KlaxonConfig) -> anyhow::Result<Self> {
        let store = load_store(&config.store)?;
        let channel = config.channel.build()?;
        internal!(level = INFO, channel = channel.name(), "Delivery channel ready");

        let identity = TokenIdentityProvider::from_config(&config.api.callers)?;
        if identity.is_empty() && config.dispatch.require_authentication {
            tracing::warn!("No callers configured while authentication is required; every alarm will be rejected");
        }

        let service = Arc::new(AlertService::new(config.dispatch, store, channel));
        let checker = Arc::new(HealthChecker::new(config.health.max_in_flight));
        let sample_interval = Duration::from_millis(config.health.sample_interval_ms.max(1));

        let health = if config.health.enabled {
            Some(HealthServer::new(config.health, Arc::clone(&checker)).await?)
        } else {
            internal!(level = INFO, "Health check server is disabled");
            None
        };

        let api = ApiServer::new(
            &config.api,
            ApiState {
                service: Arc::clone(&service),
                identity: Arc::new(identity),
            },
        )
        .await?;

        checker.set_api_ready(true);
        sample_readiness(&service, &checker);

        Ok(Self {
            service,
            api,
            health,
            checker,
            sample_interval,
        })
    }

    /// Address the alarm API is listening on
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn api_addr(&self) -> std::io::Result<SocketAddr> {
        self.api.local_addr()
    }

    /// Address the health server is listening on, when enabled
    pub fn health_addr(&self) -> Option<SocketAddr> {
        self.health.as_ref().and_then(|h| h.local_addr().ok())
    }

    pub const fn service(&self) -> &Arc<AlertService> {
        &self.service
    }

    pub const fn health_checker(&self) -> &Arc<HealthChecker> {
        &self.checker
    }

    /// Serve until `Signal::Shutdown` is broadcast on `signals`.
    ///
    /// After the listeners stop, waits (bounded by the request timeout) for
    /// detached alarms to finish, then broadcasts `Signal::Finalised`.
    ///
    /// # Errors
    ///
    /// Returns an error if either server fails while running.
    pub async fn serve(self, signals: &broadcast::Sender<Signal>) -> anyhow::Result<()> {
        let Self {
            service,
            api,
            health,
            checker,
            sample_interval,
        } = self;

        let sampler = tokio::spawn(readiness_sampler(
            Arc::clone(&service),
            Arc::clone(&checker),
            sample_interval,
            signals.subscribe(),
        ));

        let api = api.serve(signals.subscribe());
        let health_shutdown = signals.subscribe();
        let health = async move {
            match health {
                Some(server) => server.serve(health_shutdown).await.map_err(anyhow::Error::from),
                None => Ok(()),
            }
        };

        let (api_result, health_result) = tokio::join!(api, health);
        checker.set_api_ready(false);

        drain(&service).await;
        let _ = sampler.await;

        internal!(level = INFO, "All alarms finished");
        let _ = signals.send(Signal::Finalised);

        api_result.and(health_result)
    }
}

fn load_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn RecipientStore>> {
    let Some(path) = &config.path else {
        tracing::warn!("No recipient file configured; every alarm will be NOT_FOUND");
        return Ok(Arc::new(MemoryRecipientStore::new()));
    };

    let store = MemoryRecipientStore::from_file(path).map_err(|e| {
        anyhow::anyhow!("Failed to load recipients from {}: {}", path.display(), e)
    })?;

    internal!(
        level = INFO,
        recipients = store.len(),
        path = %path.display(),
        "Loaded recipients"
    );

    Ok(Arc::new(store))
}

fn sample_readiness(service: &AlertService, checker: &HealthChecker) {
    checker.set_store_ready(service.store_ready());
    checker.set_channel_ready(service.channel_ready());
    checker.set_in_flight(u64::try_from(service.in_flight()).unwrap_or(u64::MAX));
}

async fn readiness_sampler(
    service: Arc<AlertService>,
    checker: Arc<HealthChecker>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<Signal>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => sample_readiness(&service, &checker),
            sig = shutdown.recv() => {
                if matches!(sig, Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                    break;
                }
            }
        }
    }
}

/// Wait for detached alarms whose clients already went away
async fn drain(service: &AlertService) {
    let deadline = deadline_after(service.request_timeout());

    while service.in_flight() > 0 {
        if Instant::now() >= deadline {
            tracing::warn!(
                in_flight = service.in_flight(),
                "Alarms still in flight at shutdown"
            );
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
