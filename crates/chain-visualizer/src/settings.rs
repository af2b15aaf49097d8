//! Process-wide visualizer settings
//!
//! Installed once at startup with [`init`]; read anywhere with [`current`].
//! There is no teardown. Clients built with
//! [`VisualizerClient::from_settings`](crate::client::VisualizerClient::from_settings)
//! pick up the installed wait time, bind host and converter.

use std::fmt;
use std::sync::OnceLock;

use crate::client::{default_converter, Converter, VisualizerConfig};
use crate::error::{BridgeError, Result};

static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Configuration and conversion routine shared by the whole process
#[derive(Clone)]
pub struct Settings {
    pub config: VisualizerConfig,
    pub converter: Converter,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(VisualizerConfig::default())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Settings using the normalizer as converter
    pub fn new(config: VisualizerConfig) -> Self {
        Self {
            config,
            converter: default_converter(),
        }
    }

    /// Settings read from the environment
    pub fn from_env() -> Self {
        Self::new(VisualizerConfig::from_env())
    }

    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }
}

/// Install the process-wide settings.
///
/// Must run before anything calls [`current`]; a second call, or a call after
/// [`current`] has already fallen back to the defaults, fails with
/// [`BridgeError::AlreadyInitialized`].
pub fn init(settings: Settings) -> Result<&'static Settings> {
    settings.config.validate()?;
    SETTINGS
        .set(settings)
        .map_err(|_| BridgeError::AlreadyInitialized)?;

    let installed = current();
    tracing::info!(
        host = %installed.config.host,
        port = installed.config.port,
        wait_time_ms = installed.config.wait_time_ms,
        "Visualizer settings initialized"
    );
    Ok(installed)
}

/// The installed settings, or the defaults when [`init`] never ran
pub fn current() -> &'static Settings {
    SETTINGS.get_or_init(Settings::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_uses_loopback() {
        let settings = Settings::default();
        assert_eq!(settings.config.host, "127.0.0.1");
        assert_eq!(settings.config.wait_time_ms, 10_000);
    }

    #[test]
    fn test_settings_debug_hides_converter() {
        let rendered = format!("{:?}", Settings::default());
        assert!(rendered.starts_with("Settings { config: VisualizerConfig"));
        assert!(rendered.ends_with(".. }"));
    }
}
