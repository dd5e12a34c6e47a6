//! ConfigLoader tests: file discovery, environment overrides, validation.

use std::collections::HashMap;
use std::io::Write;

use freespeek_config::{ConfigError, ConfigLoader};

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_explicit_path_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[api]\nbase_url = \"https://api.freespeek.app\"\n\n[polling]\ndashboard_interval_ms = 2500\n"
    )
    .unwrap();

    let config = ConfigLoader::with_path(file.path()).load_with(env_of(&[])).unwrap();

    assert_eq!(config.api.base_url, "https://api.freespeek.app");
    assert_eq!(config.polling.dashboard_interval_ms, 2_500);
    assert_eq!(config.polling.live_users_interval_ms, 10_000);
}

#[test]
fn test_env_path_is_used_when_no_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[session]\nstorage_key = \"from_env_file\"\n").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let config = ConfigLoader::new()
        .load_with(env_of(&[("FREESPEEK_CONFIG", &path)]))
        .unwrap();

    assert_eq!(config.session.storage_key, "from_env_file");
}

#[test]
fn test_env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[api]\nbase_url = \"https://file.example\"\ntimeout_ms = 9000\n").unwrap();

    let config = ConfigLoader::with_path(file.path())
        .load_with(env_of(&[
            ("FREESPEEK_API_BASE_URL", "https://env.example/"),
            ("FREESPEEK_API_TIMEOUT_MS", "12000"),
            ("FREESPEEK_USERS_PAGE_SIZE", "50"),
            ("FREESPEEK_ADMIN_EMAIL", "ops@freespeek.app"),
            ("FREESPEEK_LOGOUT_ON_EXIT", "true"),
        ]))
        .unwrap();

    assert_eq!(config.api.base_url, "https://env.example");
    assert_eq!(config.api.timeout_ms, 12_000);
    assert_eq!(config.polling.users_page_size, 50);
    assert_eq!(config.watch.email, "ops@freespeek.app");
    assert!(config.watch.logout_on_exit);
}

#[test]
fn test_unparseable_override_is_ignored() {
    let config = ConfigLoader::with_path("/nonexistent/freespeek.toml")
        .load_with(env_of(&[("FREESPEEK_DASHBOARD_INTERVAL_MS", "soon")]))
        .unwrap();

    assert_eq!(config.polling.dashboard_interval_ms, 5_000);
}

#[test]
fn test_invalid_result_is_rejected() {
    let result = ConfigLoader::with_path("/nonexistent/freespeek.toml")
        .load_with(env_of(&[("FREESPEEK_API_TIMEOUT_MS", "0")]));

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[api\nbase_url = ").unwrap();

    let result = ConfigLoader::with_path(file.path()).load_with(env_of(&[]));

    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}
