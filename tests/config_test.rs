//! Configuration loading: file overrides, environment overrides and
//! validation failures.

use std::fs;
use std::path::Path;

use serial_test::serial;
use tempfile::TempDir;
use workcell_hub::config::{ConfigError, Settings};
use workcell_hub::ProtocolRunner;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("workcell.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let settings = Settings::load_from(Path::new("/nonexistent/workcell.toml")).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_file_overrides_application_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[application]
name = "Bench Cell"
tick_interval_ms = 50
exercise_ticks = 4
"#,
    );

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.application.name, "Bench Cell");
    assert_eq!(settings.application.tick_interval_ms, 50);
    assert_eq!(settings.application.exercise_ticks, 4);
    // Untouched sections keep their defaults.
    assert_eq!(settings.application.log_level, "info");
    assert_eq!(settings.devices.len(), 6);
    assert_eq!(settings.protocols.len(), 6);
}

#[test]
#[serial]
fn test_file_replaces_devices_and_protocols() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[[devices]]
name = "Arm"
test_operation = "Homing"

[[devices]]
name = "Reader"

[[protocols]]
name = "Quick Read"

[[protocols.steps]]
device = "Arm"
label = "Load plate"
duration_ticks = 2

[[protocols.steps]]
device = "Reader"
label = "Read plate"
"#,
    );

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.devices.len(), 2);
    assert_eq!(settings.devices[1].test_operation, "Running test");
    assert_eq!(settings.protocols[0].steps[1].duration_ticks, 10);

    let mut runner = ProtocolRunner::from_settings(&settings);
    assert_eq!(runner.library().get("Quick Read").unwrap().total_ticks(), 12);
    runner.start("Quick Read", 1).unwrap();
    for _ in 0..12 {
        runner.tick();
    }
    assert_eq!(runner.samples().len(), 3);
}

#[test]
#[serial]
fn test_step_with_undefined_device_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[[devices]]
name = "Arm"

[[protocols]]
name = "Broken"

[[protocols.steps]]
device = "Ghost"
label = "Haunt"
"#,
    );

    let err = Settings::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(ref msg) if msg.contains("unknown device 'Ghost'")));
}

#[test]
#[serial]
fn test_malformed_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[application\ntick_interval_ms = ");

    let err = Settings::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::LoadError(_)));
}

#[test]
#[serial]
fn test_out_of_range_default_sample_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[application]\ndefault_sample_count = 97\n");

    let err = Settings::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("default_sample_count"));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[application]\ntick_interval_ms = 50\n");

    std::env::set_var("WORKCELL_APPLICATION__TICK_INTERVAL_MS", "25");
    std::env::set_var("WORKCELL_APPLICATION__LOG_LEVEL", "debug");
    let result = Settings::load_from(&path);
    std::env::remove_var("WORKCELL_APPLICATION__TICK_INTERVAL_MS");
    std::env::remove_var("WORKCELL_APPLICATION__LOG_LEVEL");

    let settings = result.unwrap();
    assert_eq!(settings.application.tick_interval_ms, 25);
    assert_eq!(settings.application.log_level, "debug");
}

#[test]
#[serial]
fn test_dumped_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.application.tick_interval_ms = 125;
    settings.protocols.truncate(2);

    let path = write_config(&dir, &settings.to_toml().unwrap());
    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded, settings);
}
