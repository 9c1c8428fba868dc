//! Environment-driven configuration.
//!
//! Mirrors the original `pydantic-settings` cascade (`RR_`-prefixed env vars
//! over defaults) but as an explicit struct passed to collaborators, never a
//! global singleton (Design Notes: "global singletons become explicit
//! dependencies").

mod credentials;
mod settings;

pub use credentials::Credentials;
pub use settings::Settings;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Load settings from `RR_`-prefixed environment variables layered over
/// defaults. Field names are flat (e.g. `RR_WAVES_MAX_WORKERS`); `__` is
/// reserved as the nesting separator but unused since `Settings` is flat,
/// matching the original's single-level `pydantic-settings` model.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::Config::try_from(&Settings::default())?)
        .add_source(
            config::Environment::with_prefix("RR")
                .separator("__")
                .try_parsing(true),
        );

    let settings: Settings = builder.build()?.try_deserialize()?;
    Ok(settings)
}

/// Load vendor credentials, checking both `RR_`-prefixed and bare env vars
/// (Design Notes: "configuration cascade" — explicit struct instead of a
/// side-effecting import).
pub fn load_credentials() -> Credentials {
    Credentials::from_env()
}
