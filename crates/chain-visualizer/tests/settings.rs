//! Process-wide settings initialization
//!
//! Kept in its own test binary: settings can only be installed once per
//! process.

use chain_visualizer::settings::{self, Settings};
use chain_visualizer::{BridgeError, Message, Value, VisualizerClient, VisualizerConfig};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_settings_install_once() {
    let config = VisualizerConfig::builder()
        .wait_time_ms(2_000)
        .build()
        .unwrap();
    let installed = settings::init(
        Settings::new(config).with_converter(Arc::new(|value: &Value| {
            json!({"wrapped": chain_visualizer::normalize(value)})
        })),
    )
    .unwrap();

    assert_eq!(installed.config.wait_time_ms, 2_000);
    assert_eq!(installed.config.host, "127.0.0.1");
    assert_eq!(settings::current().config.wait_time_ms, 2_000);

    let err = settings::init(Settings::default()).unwrap_err();
    assert!(matches!(err, BridgeError::AlreadyInitialized));

    let client = VisualizerClient::from_settings(settings::current()).unwrap();
    assert_eq!(
        client.convert(&Value::from(Message::ai("ok"))),
        json!({"wrapped": {"AI": "ok"}})
    );
}
