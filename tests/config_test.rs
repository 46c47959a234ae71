//! Tests for config module

use std::path::Path;

use setor::config::Config;

#[test]
fn test_config_file_exists() {
    let config_path = Path::new("config.toml");
    assert!(
        config_path.exists(),
        "config.toml should exist in project root"
    );
}

#[test]
fn test_config_toml_readable() {
    let content =
        std::fs::read_to_string("config.toml").expect("Should be able to read config.toml");

    for section in ["[balance]", "[geocoding]", "[storage]", "[logging]"] {
        assert!(
            content.contains(section),
            "config.toml should have {section} section"
        );
    }
}

#[test]
fn test_shipped_config_loads_and_validates() {
    let config = Config::from_file(Path::new("config.toml")).unwrap();
    config.validate().unwrap();

    let params = config.balance.to_params();
    assert!(params.min_pdv <= params.max_pdv);
    assert!(params.speed_kmh > 0.0);
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_shipped_config_matches_defaults() {
    let from_file = Config::from_file(Path::new("config.toml")).unwrap();
    let defaults = Config::default();

    assert_eq!(from_file.balance.to_params(), defaults.balance.to_params());
    assert_eq!(from_file.storage.runs_dir, defaults.storage.runs_dir);
}
