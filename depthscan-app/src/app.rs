//! Scanner setup and run with builder pattern.

use std::error::Error;
use std::sync::Arc;

use depthscan_capture::{Sensor, SyntheticDriver};
use depthscan_ingest::{ScanReport, ScanSession};
use tracing::info;

use crate::config::ScanConfig;
use crate::summary::FrameSummary;

/// Builder for configuring and running a scan.
pub struct ScanApp {
    config: ScanConfig,
}

impl ScanApp {
    /// Create a ScanApp with default settings.
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Initialize logging, run the scan and report how it went.
    pub fn run(self) -> Result<ScanReport, Box<dyn Error>> {
        self.config.validate()?;
        self.init_logging();

        let driver = SyntheticDriver::new(self.config.sensor.clone());
        let sensor = Arc::new(Sensor::claim(driver)?);

        let mut session = ScanSession::new(sensor, self.config.dispatch, |frame| {
            info!("{}", FrameSummary::of(&frame));
        })?;
        if let Some(timeout) = self.config.timeout() {
            session = session.with_timeout(timeout);
        }

        Ok(session.run()?)
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.config.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer().with_filter(
                            tracing_subscriber::EnvFilter::try_from_default_env()
                                .unwrap_or_else(|_| self.config.logging.level.clone().into()),
                        ),
                    )
                    .init();
                return;
            }
        }

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&self.config.logging.level)
                }),
            )
            .with_thread_names(true)
            .init();
    }
}

impl Default for ScanApp {
    fn default() -> Self {
        Self::new()
    }
}
