//! Structured health reporting for dispatcher lifecycle events.

use std::sync::Arc;

use courier_config::Config;
use courier_message::Url;

use crate::bootstrap::BootstrapError;
use crate::errors::ServiceError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked after an endpoint is attached to a channel dispatcher.
    fn endpoint_attached(&self, address: &Url, contract: &str);

    /// Invoked after an endpoint is detached from a channel dispatcher.
    fn endpoint_detached(&self, address: &Url, contract: &str);

    /// Invoked when an unhandled failure asks for the channel to be aborted.
    fn channel_faulted(&self, error: &ServiceError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn endpoint_attached(&self, address: &Url, contract: &str) {
        (**self).endpoint_attached(address, contract);
    }

    fn endpoint_detached(&self, address: &Url, contract: &str) {
        (**self).endpoint_detached(address, contract);
    }

    fn channel_faulted(&self, error: &ServiceError) {
        (**self).channel_faulted(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "courier_dispatch::health",
            event = "bootstrap_starting",
            "starting dispatcher bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "courier_dispatch::health",
            event = "bootstrap_succeeded",
            concurrency_mode = %config.concurrency_mode,
            instance_context_mode = %config.instance_context_mode,
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "dispatcher bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "courier_dispatch::health",
            event = "bootstrap_failed",
            error = %error,
            "dispatcher bootstrap failed"
        );
    }

    fn endpoint_attached(&self, address: &Url, contract: &str) {
        tracing::info!(
            target: "courier_dispatch::health",
            event = "endpoint_attached",
            address = %address,
            contract,
            "endpoint attached"
        );
    }

    fn endpoint_detached(&self, address: &Url, contract: &str) {
        tracing::info!(
            target: "courier_dispatch::health",
            event = "endpoint_detached",
            address = %address,
            contract,
            "endpoint detached"
        );
    }

    fn channel_faulted(&self, error: &ServiceError) {
        tracing::error!(
            target: "courier_dispatch::health",
            event = "channel_faulted",
            kind = error.kind(),
            error = %error,
            "unhandled failure, aborting channel"
        );
    }
}
