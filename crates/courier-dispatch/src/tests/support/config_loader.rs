//! Configuration loaders covering failure paths.

use std::io;

use courier_config::Config;

use crate::bootstrap::ConfigLoader;
use crate::errors::BoxError;

/// Loader whose configuration source is unavailable.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, BoxError> {
        Err(io::Error::other("configuration source unavailable").into())
    }
}
