//! Configuration files feeding the dispatcher

use std::io::Write;

use itemcheck::{DispatchError, Dispatcher, MetricKey, config::read_config_file};
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_denied_keys_are_unsupported() {
    let file = config_file(r#"{"timeout": 5, "deny_keys": ["system.localtime"]}"#);
    let config = read_config_file(file.path().to_str().unwrap()).unwrap();
    let dispatcher = Dispatcher::from_config(&config).unwrap();

    assert_eq!(config.timeout, 5);
    assert_eq!(
        dispatcher.execute::<&str>("system.localtime", &[]),
        Err(DispatchError::UnsupportedMetric("system.localtime".to_string()))
    );
    assert!(!dispatcher.supported_keys().contains(&MetricKey::SystemLocaltime));
    assert!(dispatcher.execute::<&str>("system.boottime", &[]).is_ok());
}

#[test]
fn test_invalid_config_files_are_rejected() {
    for content in [
        "not json",
        r#"{"timeout": 0}"#,
        r#"{"timeout": 31}"#,
        r#"{"deny_keys": ["agent.ping"]}"#,
    ] {
        let file = config_file(content);
        assert!(
            read_config_file(file.path().to_str().unwrap()).is_err(),
            "{content}"
        );
    }
}

#[test]
fn test_missing_config_file() {
    assert!(read_config_file("/nonexistent/itemcheck.json").is_err());
}
