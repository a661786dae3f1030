//! Settings for Roster: the `RosterConfig` model with its defaults, and the
//! JSON5 loader that layers system, user, working directory and runtime
//! files into one validated config.

mod error;
mod loader;
mod model;

pub use error::ConfigError;
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
pub use model::*;
