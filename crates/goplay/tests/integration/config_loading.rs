use std::io::Write;

use goplay::config::Config;
use goplay::{ConfigError, EXAMPLE_CONFIG};

#[test]
fn test_example_config_is_default() {
    let config = Config::default();
    let parsed = Config::parse_toml(EXAMPLE_CONFIG).unwrap();

    assert_eq!(config.default_variant, parsed.default_variant);
    assert_eq!(config.variants.len(), parsed.variants.len());
    assert_eq!(config.limits, parsed.limits);
}

#[test]
fn test_load_file_over_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
default_variant = "2"

[limits]
wall_time_limit = 3.0
"#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.default_variant, "2");
    assert_eq!(config.limits.wall_time_limit, 3.0);
    // Untouched values keep their defaults
    assert_eq!(config.limits.cpu_time_limit, 6);
    assert!(config.variants.contains_key("1"));
}

#[test]
fn test_load_rejects_unknown_default_variant() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "default_variant = \"missing\"").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn test_load_missing_file() {
    let err = Config::load(Some(std::path::Path::new("/nonexistent/goplay.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "{err}");
}
