//! Log output for a dispatcher host.
//!
//! The first bootstrap in a process installs a global `tracing` subscriber
//! built from [`Config`]: events go to stderr with UTC RFC 3339 timestamps,
//! either as one flattened JSON object per event or in the compact text
//! layout. A host that installed its own subscriber first keeps it, and
//! Courier's events flow into that one instead.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use courier_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Who formats Courier's log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberOwner {
    /// Courier installed the subscriber from its configuration.
    Courier,
    /// The host had already installed a subscriber.
    Host,
}

/// Outcome of telemetry setup, shared by every bootstrap in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    owner: SubscriberOwner,
    format: LogFormat,
}

impl TelemetryHandle {
    /// Who owns the global subscriber.
    #[must_use]
    pub const fn owner(&self) -> SubscriberOwner {
        self.owner
    }

    /// Output format in effect, when Courier owns the subscriber.
    #[must_use]
    pub const fn format(&self) -> Option<LogFormat> {
        match self.owner {
            SubscriberOwner::Courier => Some(self.format),
            SubscriberOwner::Host => None,
        }
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid list of filter directives.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// The rejected filter text.
        filter: String,
        /// Parser's description of the problem.
        message: String,
    },
}

/// Sets up log output for the process on first use.
///
/// The filter is checked on every call, so a bad configuration is rejected
/// even after another bootstrap installed the subscriber. Only the first
/// valid call decides the output; later calls get the same handle.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable `log_filter`.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;
    Ok(*INSTALLED.get_or_init(|| install(filter, config.log_format())))
}

fn install(filter: EnvFilter, format: LogFormat) -> TelemetryHandle {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    let owner = if tracing::subscriber::set_global_default(subscriber).is_ok() {
        SubscriberOwner::Courier
    } else {
        SubscriberOwner::Host
    };
    debug!(target: TELEMETRY_TARGET, ?owner, %format, "telemetry ready");
    TelemetryHandle { owner, format }
}
