//! Visualization server HTTP client
//!
//! Features:
//! - Readiness probe and bounded wait loop
//! - Value submission with retry and exponential backoff
//! - Injected conversion routine (defaults to [`normalize`])
//!
//! # Design
//!
//! The client owns its configuration and converter. Nothing here mutates
//! process-wide state; see [`crate::settings`] for the one-time startup
//! configuration.

use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{BridgeError, Result};
use crate::normalize::normalize;
use crate::readiness::{self, WaitPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_SECS};
use crate::value::Value;

/// Conversion routine applied to every submitted value
pub type Converter = Arc<dyn Fn(&Value) -> serde_json::Value + Send + Sync>;

/// The normalizer as a [`Converter`]
pub fn default_converter() -> Converter {
    Arc::new(normalize)
}

/// Loopback address the server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8935;

/// Configuration for the visualizer client
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerConfig {
    /// Host the server binds to
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum time to wait for the server to report running, in milliseconds
    pub wait_time_ms: u64,

    /// Delay between readiness checks in milliseconds
    pub poll_interval_ms: u64,

    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum retry attempts for submissions
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,

    /// Path values are posted to
    pub ingest_path: String,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            wait_time_ms: DEFAULT_WAIT_SECS * 1000,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: 5000,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            ingest_path: "/api/values".to_string(),
        }
    }
}

impl VisualizerConfig {
    /// Create a new config builder
    pub fn builder() -> VisualizerConfigBuilder {
        VisualizerConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("VISUALIZER_HOST").unwrap_or(defaults.host),
            port: std::env::var("VISUALIZER_PORT")
                .map(|v| v.parse().unwrap_or(DEFAULT_PORT))
                .unwrap_or(DEFAULT_PORT),
            wait_time_ms: std::env::var("VISUALIZER_WAIT_SECS")
                .map(|v| v.parse::<u64>().unwrap_or(DEFAULT_WAIT_SECS))
                .unwrap_or(DEFAULT_WAIT_SECS)
                .saturating_mul(1000),
            poll_interval_ms: std::env::var("VISUALIZER_POLL_MS")
                .map(|v| v.parse().unwrap_or(DEFAULT_POLL_INTERVAL_MS))
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ..defaults
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(BridgeError::Config("host must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(BridgeError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !self.ingest_path.starts_with('/') {
            return Err(BridgeError::Config(format!(
                "ingest_path must start with '/': {}",
                self.ingest_path
            )));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(BridgeError::Config(
                "backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL of the server
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Readiness polling derived from this config
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.wait_time_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

/// Builder for [`VisualizerConfig`]
pub struct VisualizerConfigBuilder {
    config: VisualizerConfig,
}

impl VisualizerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: VisualizerConfig::default(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the readiness budget
    pub fn wait_time_ms(mut self, wait: u64) -> Self {
        self.config.wait_time_ms = wait;
        self
    }

    pub fn poll_interval_ms(mut self, interval: u64) -> Self {
        self.config.poll_interval_ms = interval;
        self
    }

    pub fn request_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.request_timeout_ms = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn initial_backoff_ms(mut self, backoff: u64) -> Self {
        self.config.initial_backoff_ms = backoff;
        self
    }

    pub fn max_backoff_ms(mut self, backoff: u64) -> Self {
        self.config.max_backoff_ms = backoff;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    pub fn ingest_path(mut self, path: impl Into<String>) -> Self {
        self.config.ingest_path = path.into();
        self
    }

    /// Build and validate the config
    pub fn build(self) -> Result<VisualizerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for VisualizerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for the visualization server
pub struct VisualizerClient {
    client: Client,
    config: VisualizerConfig,
    converter: Converter,
}

impl fmt::Debug for VisualizerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualizerClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VisualizerClient {
    /// Create a client that converts values with the normalizer
    pub fn new(config: VisualizerConfig) -> Result<Self> {
        Self::with_converter(config, default_converter())
    }

    /// Create a client with a custom conversion routine
    pub fn with_converter(config: VisualizerConfig, converter: Converter) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            converter,
        })
    }

    /// Create a client from the process-wide settings
    pub fn from_settings(settings: &crate::settings::Settings) -> Result<Self> {
        Self::with_converter(settings.config.clone(), settings.converter.clone())
    }

    /// Apply the configured converter
    pub fn convert(&self, value: &Value) -> serde_json::Value {
        (self.converter)(value)
    }

    /// Whether the server answers its root path with a success status
    pub async fn is_running(&self) -> bool {
        let url = format!("{}/", self.config.base_url());

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "Visualization server not reachable");
                false
            }
        }
    }

    /// Poll [`is_running`](Self::is_running) until it succeeds or the wait budget runs out
    pub async fn wait_until_running(&self) -> Result<u32> {
        readiness::wait_until_async(&self.config.wait_policy(), || self.is_running()).await
    }

    /// Convert a value and post it to the server with retry logic
    pub async fn submit(&self, value: &Value) -> Result<()> {
        let url = format!("{}{}", self.config.base_url(), self.config.ingest_path);
        let payload = self.convert(value);

        let mut last_error = None;
        let mut backoff_ms = self.config.initial_backoff_ms;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    attempt = attempt,
                    backoff_ms = backoff_ms,
                    "Retrying value submission"
                );
                sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms as f64 * self.config.backoff_multiplier) as u64;
                backoff_ms = backoff_ms.min(self.config.max_backoff_ms);
            }

            match self.send(&url, &payload).await {
                Ok(()) => {
                    tracing::debug!(url = %url, "Submitted value to visualization server");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt, error = %e, "Failed to submit value");
                    let permanent = e.is_permanent();
                    last_error = Some(e);
                    if permanent {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::Http("Unknown error during value submission".to_string())
        }))
    }

    async fn send(&self, url: &str, payload: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| BridgeError::Http(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            Err(BridgeError::Rejected {
                status: status.as_u16(),
                body,
            })
        } else if status.is_server_error() {
            Err(BridgeError::Http(format!("Server error: {}", status)))
        } else {
            Err(BridgeError::Http(format!("Unexpected status: {}", status)))
        }
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        self.config.base_url()
    }
}
