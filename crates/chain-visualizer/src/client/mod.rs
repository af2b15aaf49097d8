//! HTTP client for the trace visualization server
//!
//! The client takes its configuration and conversion routine explicitly.

pub mod visualizer;

pub use visualizer::{
    default_converter, Converter, VisualizerClient, VisualizerConfig, VisualizerConfigBuilder,
};
