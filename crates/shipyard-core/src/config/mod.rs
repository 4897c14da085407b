//! Configuration loading and resolution.
//!
//! Three layers feed one explicit [`DeploySettings`] value:
//! - shipyard.toml (project root, then the user config directory)
//! - environment variables, captured once as [`EnvOverrides`]
//! - command-line flags, as [`SettingsOverrides`]

pub mod env;
pub mod parser;
pub mod schema;
pub mod settings;
pub mod store;

pub use env::EnvOverrides;
pub use parser::{parse_shipyard_toml, parse_shipyard_toml_str};
pub use schema::{
    BuildSection, ConvergenceSection, HealthSection, RegistrySection, RolloutSection,
    ShipyardConfig, TargetSection, TemplateSection,
};
pub use settings::{
    BuildSettings, DeploySettings, HealthSettings, RegistrySettings, RolloutSettings,
    SettingsOverrides,
};
pub use store::{CONFIG_FILE_NAME, ConfigStore};
