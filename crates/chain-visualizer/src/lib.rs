//! Chain Visualizer
//!
//! Bridges the results of an LLM orchestration layer to a trace
//! visualization server.
//!
//! ## Features
//!
//! - **Normalization**: Turn generation results, chat results, role-tagged
//!   messages, templated strings, records and arbitrary objects into JSON
//! - **Readiness**: Bounded wait for the server to come up
//! - **Client**: Submit normalized values over HTTP with retries
//! - **Explicit setup**: Wait time, bind host and converter are injected,
//!   never patched into shared state
//!
//! ## Architecture
//!
//! 1. **Value** (`value`): Input model the normalizer understands.
//! 2. **Normalize** (`normalize`): Recursive value-to-JSON conversion.
//! 3. **Readiness** (`readiness`): Blocking and async polling loops.
//! 4. **Client** (`client/`): HTTP client for the visualization server.
//! 5. **Settings** (`settings`): One-time process initialization.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chain_visualizer::{
//!     normalize, Generation, LlmResult, Message, Value, VisualizerClient, VisualizerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> chain_visualizer::Result<()> {
//!     let result = LlmResult::new(vec![vec![Generation::new("hello")]]);
//!     assert_eq!(normalize(&Value::from(result)), serde_json::json!("hello"));
//!
//!     let client = VisualizerClient::new(VisualizerConfig::from_env())?;
//!     client.wait_until_running().await?;
//!     client.submit(&Value::from(Message::human("hi"))).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod readiness;
pub mod settings;
pub mod value;

pub use client::{default_converter, Converter, VisualizerClient, VisualizerConfig};
pub use error::{BridgeError, Result};
pub use logging::init_logging;
pub use normalize::{normalize, FSTRING_KEY, MAX_DEPTH, MEMORY_FIELD};
pub use readiness::{wait_until, wait_until_async, WaitPolicy};
pub use settings::Settings;
pub use value::{
    Callable, ChatGeneration, ChatResult, ConversionError, DictConvertible, FPart, FString,
    Generation, LlmResult, Message, Record, Role, Value, PRINT_DEPTH,
};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
