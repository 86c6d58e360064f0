#![forbid(unsafe_code)]

//! Loading installation configs from disk.

use std::io::Write;

use mural_runtime::config::SurfaceGesture;
use mural_runtime::{ConfigError, InstallationConfig};
use tempfile::NamedTempFile;

fn write(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_toml_by_extension() {
    let file = write(
        ".toml",
        r#"
[layout]
screens = 4
windows_per_screen = 2

[gesture]
surface = "pan"

[network]
port = 47200

[network.peers]
5 = "10.0.0.3:47200"
"#,
    );
    let config = InstallationConfig::load(file.path()).unwrap();
    assert_eq!(config.layout.screens, 4);
    assert_eq!(config.gesture.surface, SurfaceGesture::Pan);
    assert_eq!(config.network.port, 47200);
    assert_eq!(config.peer_addresses().len(), 1);
}

#[test]
fn loads_json_by_extension() {
    let file = write(".JSON", r#"{"timeouts": {"reset_after_ms": 60000}}"#);
    let config = InstallationConfig::load(file.path()).unwrap();
    assert_eq!(config.timeouts.reset_after_ms, 60_000);
    assert_eq!(config.timeouts.unpair_after_ms, 10_000);
}

#[test]
fn rendered_defaults_load_back() {
    let defaults = InstallationConfig::default();
    let toml = write(".toml", &defaults.to_toml_string().unwrap());
    let json = write(".json", &defaults.to_json_string().unwrap());
    assert_eq!(InstallationConfig::load(toml.path()).unwrap(), defaults);
    assert_eq!(InstallationConfig::load(json.path()).unwrap(), defaults);
}

#[test]
fn unknown_extension_is_rejected() {
    let file = write(".yaml", "layout: {}");
    assert!(matches!(
        InstallationConfig::load(file.path()),
        Err(ConfigError::Extension(ext)) if ext == "yaml"
    ));
}

#[test]
fn layouts_too_large_to_table_are_rejected() {
    let file = write(".toml", "[layout]\nscreens = 70000\nwindows_per_screen = 70000\n");
    let Err(ConfigError::Validation(errors)) = InstallationConfig::load(file.path()) else {
        panic!("validation error expected");
    };
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("70000 screens x 70000 windows"), "{errors:?}");
}

#[test]
fn invalid_values_fail_validation() {
    let file = write(".toml", "[layout]\nscreens = 0\n\n[network]\nsensor_port = 47100\n");
    let Err(ConfigError::Validation(errors)) = InstallationConfig::load(file.path()) else {
        panic!("validation error expected");
    };
    assert!(errors.iter().any(|e| e.contains("screens")));
    assert!(errors.iter().any(|e| e.contains("port")));
}

#[test]
fn syntax_errors_and_missing_files_surface_their_cause() {
    let file = write(".toml", "[layout\nscreens = 2");
    assert!(matches!(InstallationConfig::load(file.path()), Err(ConfigError::Toml(_))));
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        InstallationConfig::load(dir.path().join("absent.json")),
        Err(ConfigError::Io(_))
    ));
}
