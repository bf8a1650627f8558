use std::{
    future::Future,
    sync::{Arc, LazyLock},
    time::Duration,
};

use herald_api::{ApiConfig, ApiServer};
use herald_common::{Signal, internal, logging};
use herald_dispatch::{CampaignService, DispatchConfig, TransportConfig};
use herald_store::StoreConfig;
use serde::Deserialize;
use tokio::sync::broadcast;

const fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Top-level configuration, and the controller that runs everything it names
#[derive(Debug, Clone, Deserialize)]
pub struct Herald {
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    transport: TransportConfig,
    #[serde(default)]
    api: ApiConfig,
    /// How long running campaigns get to settle once shutdown starts
    #[serde(default = "default_shutdown_timeout_secs")]
    shutdown_timeout_secs: u64,
}

impl Default for Herald {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            store: StoreConfig::default(),
            transport: TransportConfig::default(),
            api: ApiConfig::default(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

#[tracing::instrument(level = tracing::Level::TRACE)]
async fn wait_for_signal() {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                internal!(level = WARN, "Unable to listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        () = terminate => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };
}

impl Herald {
    #[must_use]
    pub const fn dispatch(&self) -> &DispatchConfig {
        &self.dispatch
    }

    #[must_use]
    pub const fn api(&self) -> &ApiConfig {
        &self.api
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate the configuration without starting anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a dispatch default falls outside its own limits or
    /// the transport cannot be set up.
    pub fn check(&self) -> anyhow::Result<()> {
        self.dispatch.check()?;
        self.transport.clone().into_transport()?;
        Ok(())
    }

    /// Build the campaign service described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails [`Self::check`].
    pub fn service(&self, shutdown: broadcast::Sender<Signal>) -> anyhow::Result<CampaignService> {
        self.dispatch.check()?;
        let transport = self.transport.clone().into_transport()?;
        let store = self.store.clone().into_store();

        Ok(CampaignService::new(
            self.dispatch.clone(),
            store,
            transport,
            shutdown,
        ))
    }

    /// Run this controller, and everything it controls, until SIGINT or SIGTERM
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is invalid or
    /// the API server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        self.run_until(SHUTDOWN_BROADCAST.clone(), wait_for_signal())
            .await
    }

    /// Run until `stop` resolves, then shut down gracefully.
    ///
    /// Shutdown broadcasts [`Signal::Shutdown`] on `shutdown`, waits up to
    /// `shutdown_timeout_secs` for running campaigns to settle (a second
    /// CTRL+C skips the wait) and finally broadcasts [`Signal::Finalised`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is invalid or
    /// the API server fails.
    #[tracing::instrument(level = tracing::Level::TRACE, skip_all, err)]
    pub async fn run_until(
        self,
        shutdown: broadcast::Sender<Signal>,
        stop: impl Future<Output = ()> + Send,
    ) -> anyhow::Result<()> {
        let service = Arc::new(self.service(shutdown.clone())?);
        let server = ApiServer::new(&self.api, service.clone()).await?;
        let mut server = tokio::spawn(server.serve(shutdown.subscribe()));

        internal!(level = INFO, "Controller running");

        let early_exit = tokio::select! {
            served = &mut server => Some(served),
            () = stop => None,
        };

        internal!(level = INFO, "Shutting down...");

        // Nobody may be listening any more if the server has already stopped
        let _ = shutdown.send(Signal::Shutdown);

        let timeout = self.shutdown_timeout();
        tokio::select! {
            settled = service.shutdown(timeout) => {
                if settled {
                    internal!(level = INFO, "All campaigns settled");
                } else {
                    internal!(
                        level = WARN,
                        in_flight = service.in_flight(),
                        "Campaigns still running after {timeout:?}, abandoning them"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                internal!(level = WARN, "Forced shutdown, abandoning running campaigns");
            }
        }

        let served = match early_exit {
            Some(served) => served,
            None => server.await,
        };

        let _ = shutdown.send(Signal::Finalised);

        served
            .map_err(|e| anyhow::anyhow!("API server task failed: {e}"))?
            .map_err(anyhow::Error::from)
    }
}
