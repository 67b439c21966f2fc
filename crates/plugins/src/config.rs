//! Typed reads of a plugin's configuration mapping.

use planeworld_kernel::PluginError;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

/// Deserialize the declaration's remaining keys into `T`.
pub(crate) fn parse<T: DeserializeOwned>(config: &Mapping) -> Result<T, PluginError> {
    serde_yaml::from_value(Value::Mapping(config.clone()))
        .map_err(|e| PluginError::Config(e.to_string()))
}
