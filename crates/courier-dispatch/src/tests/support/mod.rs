//! Test harness utilities for the dispatcher behavioural suites.

mod config_loader;
mod ledger;
mod reporter;
mod world;

pub use config_loader::FailingConfigLoader;
pub use ledger::{ADD_ACTION, ledger_runtime};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
