use super::load_config::{
    Config, ConfigError, MAX_TIMEOUT_MINUTES, STAGING_TIMEOUT_ENV, STARTUP_TIMEOUT_ENV,
};
use super::shutdown::Shutdown;

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::timeout;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
    vars.iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn defaults_apply_without_file_or_environment() {
    let config = Config::load_from(None, false, &HashMap::new()).unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.binary_name, "paasctl");
    assert_eq!(config.timeouts.staging(), Duration::from_secs(15 * 60));
    assert_eq!(config.timeouts.startup(), Duration::from_secs(5 * 60));
    assert_eq!(config.token_refresh_interval(), Duration::from_secs(240));
}

#[test]
fn partial_file_only_overrides_what_it_names() {
    let file = config_file(
        r#"
        [target]
        org = "acme"

        [timeouts]
        staging_minutes = 20
        "#,
    );

    let config = Config::load_from(Some(file.path()), true, &HashMap::new()).unwrap();

    assert_eq!(config.target.org, "acme");
    assert_eq!(config.target.space, "development");
    assert_eq!(config.timeouts.staging_minutes, 20);
    assert_eq!(config.timeouts.startup_minutes, 5);
}

#[test]
fn prefixed_environment_overrides_the_file() {
    let file = config_file("[target]\norg = \"acme\"\nuser = \"ops\"\n");

    let config = Config::load_from(
        Some(file.path()),
        true,
        &env(&[
            ("PAASCTL__TARGET__ORG", "globex"),
            ("PAASCTL__TIMEOUTS__STARTUP_MINUTES", "7"),
        ]),
    )
    .unwrap();

    assert_eq!(config.target.org, "globex");
    assert_eq!(config.target.user, "ops");
    assert_eq!(config.timeouts.startup_minutes, 7);
}

#[test]
fn legacy_timeout_variables_win_over_every_other_layer() {
    let file = config_file("[timeouts]\nstaging_minutes = 20\nstartup_minutes = 9\n");

    let config = Config::load_from(
        Some(file.path()),
        true,
        &env(&[
            ("PAASCTL__TIMEOUTS__STAGING_MINUTES", "30"),
            (STAGING_TIMEOUT_ENV, "2"),
            (STARTUP_TIMEOUT_ENV, "3"),
        ]),
    )
    .unwrap();

    assert_eq!(config.timeouts.staging(), Duration::from_secs(2 * 60));
    assert_eq!(config.timeouts.startup(), Duration::from_secs(3 * 60));
}

#[test]
fn unparseable_legacy_timeouts_are_ignored() {
    let config = Config::load_from(
        None,
        false,
        &env(&[(STAGING_TIMEOUT_ENV, "soon"), (STARTUP_TIMEOUT_ENV, "")]),
    )
    .unwrap();

    assert_eq!(config.timeouts.staging_minutes, 15);
    assert_eq!(config.timeouts.startup_minutes, 5);
}

#[test]
fn zero_and_oversized_legacy_timeouts_are_ignored() {
    let config = Config::load_from(
        None,
        false,
        &env(&[
            (STAGING_TIMEOUT_ENV, "0"),
            (STARTUP_TIMEOUT_ENV, "9223372036854775807"),
        ]),
    )
    .unwrap();

    assert_eq!(config.timeouts.staging_minutes, 15);
    assert_eq!(config.timeouts.startup_minutes, 5);
}

#[test]
fn oversized_timeout_from_the_environment_is_rejected() {
    let err = Config::load_from(
        None,
        false,
        &env(&[("PAASCTL__TIMEOUTS__STAGING_MINUTES", "9223372036854775807")]),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ConfigError::OutOfRange { field: "timeouts.staging_minutes", .. }
    ));
}

#[test]
fn zero_timeout_or_refresh_interval_in_the_file_is_rejected() {
    let file = config_file("[timeouts]
startup_minutes = 0
");
    let err = Config::load_from(Some(file.path()), true, &HashMap::new()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutOfRange { field: "timeouts.startup_minutes", value: 0, .. }
    ));

    let file = config_file("token_refresh_interval_secs = 0
");
    let err = Config::load_from(Some(file.path()), true, &HashMap::new()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutOfRange { field: "token_refresh_interval_secs", .. }
    ));
}

#[test]
fn timeout_durations_never_overflow() {
    let mut config = Config::default();
    config.timeouts.staging_minutes = u64::MAX;

    assert_eq!(
        config.timeouts.staging(),
        Duration::from_secs(MAX_TIMEOUT_MINUTES * 60)
    );
}

#[test]
fn explicit_config_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");

    assert!(Config::load_from(Some(&missing), true, &HashMap::new()).is_err());
    assert_eq!(
        Config::load_from(Some(&missing), false, &HashMap::new()).unwrap(),
        Config::default()
    );
}

#[test]
fn malformed_file_is_an_error() {
    let file = config_file("[timeouts]\nstaging_minutes = \"a while\"\n");

    assert!(Config::load_from(Some(file.path()), true, &HashMap::new()).is_err());
}

#[test]
fn effective_config_renders_as_toml() {
    let rendered = Config::default().to_toml().unwrap();

    assert!(rendered.contains("binary_name = \"paasctl\""));
    assert!(rendered.contains("[timeouts]"));
    assert!(rendered.contains("staging_minutes = 15"));
}

#[tokio::test]
async fn shutdown_waiter_is_released_by_a_dropped_confirm() {
    let (shutdown, confirm) = Shutdown::new();
    let token = shutdown.token();

    let task = tokio::spawn(async move {
        token.cancelled().await;
        drop(confirm);
    });

    shutdown.trigger();
    timeout(Duration::from_secs(2), shutdown.wait_for_shutdown())
        .await
        .unwrap();
    task.await.unwrap();
}
