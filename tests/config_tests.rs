//! Unit tests for configuration loading and validation.

use std::time::Duration;

use ecloud::{EcloudClient, EcloudConfig, EcloudError, config::ConfigError};
use rstest::*;

#[fixture]
fn valid_config() -> EcloudConfig {
    EcloudConfig {
        endpoint: String::from("https://services.example.com/"),
        access_key: String::from("ACCESSKEYEXAMPLE"),
        secret_key: String::from("SECRETKEYEXAMPLE"),
        api_version: String::from("2013-06-01"),
        http_timeout_secs: 30,
        poll_interval_secs: 5,
        task_timeout_secs: 300,
        error_grace_secs: 120,
        retry_delay_millis: 1000,
    }
}

#[test]
fn config_validation_rejects_missing_secret_with_actionable_error() {
    let cfg = EcloudConfig {
        secret_key: String::new(),
        ..valid_config()
    };

    let error = cfg.validate().expect_err("secret is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error");
    };
    assert!(
        message.contains("ECLOUD_SECRET_KEY"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("ecloud.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains("secret_key"),
        "error should mention TOML key: {message}"
    );
}

#[rstest]
#[case::endpoint(|cfg: &mut EcloudConfig| cfg.endpoint.clear(), "ECLOUD_ENDPOINT", "endpoint")]
#[case::access_key(|cfg: &mut EcloudConfig| cfg.access_key.clear(), "ECLOUD_ACCESS_KEY", "access_key")]
#[case::api_version(|cfg: &mut EcloudConfig| cfg.api_version = String::from("  "), "ECLOUD_API_VERSION", "api_version")]
fn config_validation_produces_actionable_errors(
    valid_config: EcloudConfig,
    #[case] mutate: fn(&mut EcloudConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);
    let message = cfg.validate().expect_err("validation should fail").to_string();
    assert!(message.contains(env_var), "error should mention {env_var}: {message}");
    assert!(message.contains("ecloud.toml"), "error should mention config file: {message}");
    assert!(message.contains(toml_key), "error should mention {toml_key}: {message}");
}

#[rstest]
#[case::scheme(|cfg: &mut EcloudConfig| cfg.endpoint = String::from("services.example.com"))]
#[case::poll_interval(|cfg: &mut EcloudConfig| cfg.poll_interval_secs = 0)]
#[case::http_timeout(|cfg: &mut EcloudConfig| cfg.http_timeout_secs = 0)]
fn config_validation_rejects_unusable_values(
    valid_config: EcloudConfig,
    #[case] mutate: fn(&mut EcloudConfig),
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
}

#[rstest]
fn config_converts_into_client_settings(valid_config: EcloudConfig) {
    let context = valid_config.endpoint_context();
    assert_eq!(context.endpoint(), "https://services.example.com");
    assert_eq!(context.version(), "2013-06-01");
    assert_eq!(valid_config.credentials().access_key(), "ACCESSKEYEXAMPLE");

    let poll = valid_config.poll_policy();
    assert_eq!(poll.interval, Duration::from_secs(5));
    assert_eq!(poll.timeout, Duration::from_secs(300));
    assert_eq!(poll.error_grace, Duration::from_secs(120));
    assert_eq!(poll.max_failed_polls, 5);

    let retry = valid_config.retry_policy();
    assert_eq!(retry.max_attempts, 5);
    assert_eq!(retry.delay, Duration::from_secs(1));
    assert_eq!(valid_config.http_timeout(), Duration::from_secs(30));
}

#[test]
fn credentials_debug_redacts_secret() {
    let rendered = format!("{:?}", valid_config().credentials());
    assert!(!rendered.contains("SECRETKEYEXAMPLE"), "{rendered}");
    assert!(rendered.contains("ACCESSKEYEXAMPLE"), "{rendered}");
}

#[rstest]
fn client_from_config_rejects_invalid_settings(valid_config: EcloudConfig) {
    let cfg = EcloudConfig {
        access_key: String::new(),
        ..valid_config
    };
    let result = EcloudClient::from_config(&cfg);
    assert!(matches!(result, Err(EcloudError::Config(_))));
}

#[tokio::test]
async fn config_loads_from_environment() {
    let _guard = ecloud::test_support::EnvGuard::set_vars(&[
        ("ECLOUD_ENDPOINT", "https://env.example.com"),
        ("ECLOUD_ACCESS_KEY", "ENVACCESS"),
        ("ECLOUD_SECRET_KEY", "ENVSECRET"),
        ("ECLOUD_POLL_INTERVAL_SECS", "7"),
    ])
    .await;

    let cfg = EcloudConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("environment config loads: {err}"));

    assert_eq!(cfg.endpoint, "https://env.example.com");
    assert_eq!(cfg.access_key, "ENVACCESS");
    assert_eq!(cfg.poll_interval_secs, 7);
    assert_eq!(cfg.api_version, "2013-06-01");
    assert_eq!(cfg.task_timeout_secs, 300);
    cfg.validate()
        .unwrap_or_else(|err| panic!("environment config validates: {err}"));
}
