use common::{init_structured_logging, LoggingConfig};
use tracing::Level;

#[test]
fn test_subscriber_installs_once() {
    let config = LoggingConfig::default()
        .with_level(Level::DEBUG)
        .with_json_output(true);

    init_structured_logging(config.clone()).expect("first install succeeds");
    tracing::info!(phrase = "canyon", "logging initialised");

    // The global default can only be set once per process
    assert!(init_structured_logging(config).is_err());
}
