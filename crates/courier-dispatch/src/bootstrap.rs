//! Host bootstrap orchestration.

use std::sync::Arc;

use courier_config::{Config, ConfigError};
use courier_filters::{EndpointAddressFilter, MessageFilter, ProcessorPool};
use courier_message::{EndpointAddress, Message, MessageVersion};
use thiserror::Error;

use crate::channel::{ChannelContext, ChannelDispatcher, DispatchOutcome};
use crate::endpoint::EndpointDispatcher;
use crate::errors::{BoxError, DispatchError};
use crate::health::HealthReporter;
use crate::runtime::DispatchRuntime;
use crate::security::SecurityDefaults;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the dispatcher configuration.
    ///
    /// # Errors
    ///
    /// Returns whatever prevented the configuration from being read.
    fn load(&self) -> Result<Config, BoxError>;
}

/// Loader that hands out a configuration built in code.
#[derive(Debug, Default, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, BoxError> {
        Ok(self.config.clone())
    }
}

/// Loader that parses a JSON document. Missing fields take their defaults.
#[derive(Debug, Clone)]
pub struct JsonConfigLoader {
    document: String,
}

impl JsonConfigLoader {
    /// Wraps the JSON text to parse.
    #[must_use]
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }
}

impl ConfigLoader for JsonConfigLoader {
    fn load(&self) -> Result<Config, BoxError> {
        Ok(serde_json::from_str(&self.document)?)
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Load {
        /// Underlying loader error.
        #[source]
        source: BoxError,
    },
    /// Configuration loaded but was rejected.
    #[error("invalid configuration: {source}")]
    Configuration {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap: a configured channel dispatcher plus
/// the shared pieces new endpoints are built from.
pub struct Courier {
    config: Config,
    channel: ChannelDispatcher,
    security: SecurityDefaults,
    address_pool: Arc<ProcessorPool>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl std::fmt::Debug for Courier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Courier")
            .field("config", &self.config)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Courier {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Channel dispatcher endpoints are attached to.
    #[must_use]
    pub const fn channel(&self) -> &ChannelDispatcher {
        &self.channel
    }

    /// Security managers new runtimes start with.
    #[must_use]
    pub const fn security(&self) -> &SecurityDefaults {
        &self.security
    }

    /// Processor pool shared by the address filters of new endpoints.
    #[must_use]
    pub const fn address_pool(&self) -> &Arc<ProcessorPool> {
        &self.address_pool
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Reporter lifecycle events go to.
    #[must_use]
    pub fn reporter(&self) -> &dyn HealthReporter {
        self.reporter.as_ref()
    }

    /// Creates a runtime configured from the resolved configuration.
    #[must_use]
    pub fn new_runtime(&self) -> Arc<DispatchRuntime> {
        Arc::new(DispatchRuntime::from_config(&self.config, &self.security))
    }

    /// Creates a detached endpoint whose address filter uses the shared
    /// processor pool.
    ///
    /// # Errors
    ///
    /// Cannot fail for a freshly built endpoint; the result mirrors
    /// [`EndpointDispatcher::set_address_filter`].
    pub fn new_endpoint(
        &self,
        address: EndpointAddress,
        contract_name: impl Into<String>,
        runtime: Arc<DispatchRuntime>,
    ) -> Result<Arc<EndpointDispatcher>, DispatchError> {
        let filter = EndpointAddressFilter::new(address.clone(), true)
            .with_pool(Arc::clone(&self.address_pool));
        let endpoint = EndpointDispatcher::new(address, contract_name, runtime);
        endpoint.set_address_filter(MessageFilter::EndpointAddress(filter).shared())?;
        Ok(Arc::new(endpoint))
    }

    /// Dispatches a message through the channel dispatcher.
    ///
    /// # Errors
    ///
    /// See [`ChannelDispatcher::dispatch`].
    pub async fn dispatch(
        &self,
        message: Message,
        channel: &ChannelContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.channel.dispatch(message, channel).await
    }
}

/// Bootstraps a dispatcher host using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration cannot be loaded or
/// validated, or telemetry cannot be installed. Every failure is reported
/// to `reporter` first.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    message_version: MessageVersion,
    security: SecurityDefaults,
) -> Result<Courier, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Load { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.validate() {
        let error = BootstrapError::Configuration { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let address_pool = Arc::new(ProcessorPool::new(config.address_processor_pool_capacity));
    let channel = ChannelDispatcher::new(&config, message_version, Arc::clone(&reporter));
    reporter.bootstrap_succeeded(&config);
    Ok(Courier {
        config,
        channel,
        security,
        address_pool,
        telemetry,
        reporter,
    })
}
