//! Test double for [`HealthReporter`] that records structured events for
//! assertions.

use std::sync::Mutex;

use courier_config::Config;
use courier_message::Url;

use crate::bootstrap::BootstrapError;
use crate::errors::ServiceError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// Endpoint attached at an address.
    EndpointAttached { address: String, contract: String },
    /// Endpoint detached from an address.
    EndpointDetached { address: String, contract: String },
    /// Channel aborted after an unhandled failure of the given kind.
    ChannelFaulted(&'static str),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn endpoint_attached(&self, address: &Url, contract: &str) {
        self.record(HealthEvent::EndpointAttached {
            address: address.to_string(),
            contract: contract.to_owned(),
        });
    }

    fn endpoint_detached(&self, address: &Url, contract: &str) {
        self.record(HealthEvent::EndpointDetached {
            address: address.to_string(),
            contract: contract.to_owned(),
        });
    }

    fn channel_faulted(&self, error: &ServiceError) {
        self.record(HealthEvent::ChannelFaulted(error.kind()));
    }
}
