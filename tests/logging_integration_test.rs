//! Integration tests for logging functionality

use conduit::config::LoggingConfig;
use conduit::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_path, "logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_console_only_config() {
    let config = LoggingConfig::console_only();
    assert!(!config.local_enabled);
}

#[test]
fn test_invalid_level_is_rejected_before_install() {
    let err = init_logging("verbose", &LoggingConfig::console_only())
        .err()
        .expect("unknown level must fail");
    assert!(err.to_string().contains("Invalid log level"));
}

// The global subscriber can be installed once per process, so both the
// file-writer and the already-installed cases live in one test.
#[test]
fn test_file_logging_writes_json_lines() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "hourly".to_string(),
    };

    let guard = init_logging("debug", &config).unwrap();
    assert!(guard.has_file_writer());
    assert!(log_path.exists());

    conduit::log_pipeline_start!("run-1", "memory:records", 100usize, 2usize, 10usize);
    drop(guard);

    let files: Vec<_> = std::fs::read_dir(&log_path)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("conduit.log"), "unexpected file {name}");

    let second = init_logging("info", &LoggingConfig::console_only());
    assert!(second.is_err());
}
