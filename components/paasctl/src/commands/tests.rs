use super::logs::logs;
use super::restage::restage;
use super::restart::{RestartStrategy, restart};
use super::start::start;
use crate::poller::poller::LogFilter;
use crate::actions::scripted::{
    PhaseTimeouts, Scenario, ScriptedControlPlane, ScriptedLogTransport, ScriptedTokenRefresher,
};
use crate::errors::action_error::ActionError;
use crate::errors::command_error::CommandError;
use crate::helpers::load_config::Config;
use crate::streaming::stream_logs::LogStreamer;
use crate::ui::testing::{RecordingUi, Rendered};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

const BOUND: Duration = Duration::from_secs(5);

fn config() -> Config {
    let mut config = Config::default();
    config.target.org = "acme".to_string();
    config.target.space = "prod".to_string();
    config.target.user = "ops".to_string();
    config
}

fn plane(json: &str) -> ScriptedControlPlane {
    let scenario: Scenario = serde_json::from_str(json).unwrap();
    let timeouts = config().timeouts;
    ScriptedControlPlane::new(
        scenario,
        PhaseTimeouts {
            staging: timeouts.staging(),
            startup: timeouts.startup(),
        },
    )
}

fn streamer(plane: &ScriptedControlPlane) -> LogStreamer<ScriptedLogTransport, ScriptedTokenRefresher> {
    LogStreamer::new(
        Arc::new(plane.transport()),
        Arc::new(plane.refresher()),
        Duration::from_secs(240),
    )
}

fn texts(ui: &RecordingUi) -> Vec<String> {
    ui.entries()
        .into_iter()
        .filter_map(|entry| match entry {
            Rendered::Text(text) => Some(text),
            _ => None,
        })
        .collect()
}

const STAGE_AND_START: &str = r#"{
    "application": { "name": "web", "guid": "web-guid", "instances": 2 },
    "operation": [
        { "event": { "state": "staging" } },
        { "event": { "log": { "message": "building droplet", "source_type": "STG" } } },
        { "event": { "warning": "stack is deprecated" } },
        { "event": { "state": "starting" } },
        { "event": { "log": { "message": "listening on 8080" } } }
    ]
}"#;

#[tokio::test]
async fn start_stages_starts_and_summarises() {
    let plane = plane(STAGE_AND_START);
    let ui = RecordingUi::new();

    let result = timeout(BOUND, start(&plane, &ui, &config(), "web", LogFilter::StagingOnly)).await.unwrap();

    assert_eq!(result, Ok(()));
    let texts = texts(&ui);
    assert_eq!(texts[0], "Starting app web in org acme / space prod as ops...");
    assert!(texts.contains(&"requested state:   started".to_string()));
    assert!(texts.contains(&"instances:         2".to_string()));
    assert_eq!(ui.notices(), vec!["Staging app and tracing logs...", "Waiting for app to start..."]);
    assert_eq!(ui.log_lines(), vec!["building droplet"]);
    assert_eq!(ui.warnings(), vec!["stack is deprecated"]);
}

#[tokio::test]
async fn start_can_show_runtime_output_too() {
    let plane = plane(STAGE_AND_START);
    let ui = RecordingUi::new();

    let result = timeout(BOUND, start(&plane, &ui, &config(), "web", LogFilter::All))
        .await
        .unwrap();

    assert_eq!(result, Ok(()));
    assert_eq!(ui.log_lines(), vec!["building droplet", "listening on 8080"]);
}

#[tokio::test]
async fn start_on_a_started_app_does_not_poll() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid", "state": "started" },
            "operation": [ { "event": { "state": "starting" } } ]
        }"#,
    );
    let ui = RecordingUi::new();

    let result = timeout(BOUND, start(&plane, &ui, &config(), "web", LogFilter::StagingOnly)).await.unwrap();

    assert_eq!(result, Ok(()));
    assert_eq!(
        ui.entries(),
        vec![
            Rendered::Text("Starting app web in org acme / space prod as ops...".to_string()),
            Rendered::Text("App web is already started".to_string()),
        ]
    );
}

#[tokio::test]
async fn start_of_an_unknown_app_fails_before_polling() {
    let plane = plane(STAGE_AND_START);
    let ui = RecordingUi::new();

    let result = timeout(BOUND, start(&plane, &ui, &config(), "api", LogFilter::StagingOnly)).await.unwrap();

    assert_eq!(
        result,
        Err(CommandError::Action(ActionError::ApplicationNotFound { name: "api".to_string() }))
    );
    assert_eq!(result.unwrap_err().to_string(), "App 'api' not found");
    assert!(ui.notices().is_empty());
}

#[tokio::test]
async fn staging_timeout_after_logs_reports_the_configured_timeout() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid" },
            "operation": [
                { "event": { "log": { "message": "log message 1", "source_type": "STG" } } },
                { "event": { "log": { "message": "log message 2", "source_type": "STG" } } },
                { "event": { "fail": "staging_timeout" } }
            ]
        }"#,
    );
    let ui = RecordingUi::new();

    let result = timeout(BOUND, start(&plane, &ui, &config(), "web", LogFilter::StagingOnly)).await.unwrap();

    let err = result.unwrap_err();
    assert_eq!(
        err,
        CommandError::StagingTimeout {
            app_name: "web".to_string(),
            timeout: Duration::from_secs(15 * 60),
        }
    );
    assert_eq!(err.to_string(), "Error staging application web: timed out after 15 minute(s)");
    assert_eq!(ui.log_lines(), vec!["log message 1", "log message 2"]);
}

#[tokio::test]
async fn crashed_instance_fails_the_start_with_a_tip() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid" },
            "operation": [
                { "event": { "state": "starting" } },
                { "event": { "fail": "instance_crashed" } }
            ]
        }"#,
    );
    let ui = RecordingUi::new();

    let result = timeout(BOUND, start(&plane, &ui, &config(), "web", LogFilter::StagingOnly)).await.unwrap();

    assert_eq!(
        result,
        Err(CommandError::ApplicationUnableToStart {
            app_name: "web".to_string(),
            binary_name: "paasctl".to_string(),
        })
    );
}

#[tokio::test]
async fn restart_of_a_running_app_shows_the_stop() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid", "state": "started" },
            "operation": [
                { "event": { "state": "staging" } },
                { "event": { "state": "starting" } }
            ]
        }"#,
    );
    let ui = RecordingUi::new();

    let result = timeout(BOUND, restart(&plane, &ui, &config(), "web", RestartStrategy::Stop, LogFilter::StagingOnly))
        .await
        .unwrap();

    assert_eq!(result, Ok(()));
    assert_eq!(texts(&ui)[0], "Restarting app web in org acme / space prod as ops...");
    assert_eq!(
        ui.notices(),
        vec!["Stopping app...", "Staging app and tracing logs...", "Waiting for app to start..."]
    );
}

#[tokio::test]
async fn rolling_restart_goes_through_a_deployment() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid", "state": "started" },
            "operation": [ { "event": { "state": "starting" } } ]
        }"#,
    );
    let ui = RecordingUi::new();

    let result = timeout(BOUND, restart(&plane, &ui, &config(), "web", RestartStrategy::Rolling, LogFilter::StagingOnly))
        .await
        .unwrap();

    assert_eq!(result, Ok(()));
    assert_eq!(texts(&ui)[1], "Creating deployment for app web...");
    assert_eq!(ui.notices(), vec!["Waiting for app to start..."]);
}

#[tokio::test]
async fn restage_failure_without_a_detected_app_suggests_buildpacks() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid", "state": "started" },
            "operation": [
                { "event": { "state": "staging" } },
                { "event": { "fail": { "staging_failed_no_app_detected": { "reason": "NoAppDetectedError" } } } }
            ]
        }"#,
    );
    let ui = RecordingUi::new();

    let result = timeout(BOUND, restage(&plane, &ui, &config(), "web", LogFilter::StagingOnly)).await.unwrap();

    assert_eq!(texts(&ui)[0], "Restaging app web in org acme / space prod as ops...");
    let err = result.unwrap_err();
    assert!(matches!(err, CommandError::StagingFailedNoAppDetected { .. }));
    assert!(err.to_string().contains("Use 'paasctl buildpacks'"));
}

#[tokio::test]
async fn recent_logs_are_rendered_in_timestamp_order() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid" },
            "recent_logs": [
                { "message": "second", "timestamp": "2024-05-01T10:00:02Z" },
                { "message": "first", "timestamp": "2024-05-01T10:00:01Z" },
                { "message": "third", "timestamp": "2024-05-01T10:00:03Z" }
            ]
        }"#,
    );
    let ui = Arc::new(RecordingUi::new());

    let result = timeout(
        BOUND,
        logs(&plane, &streamer(&plane), ui.clone(), &config(), "web", true, futures::future::pending::<()>()),
    )
    .await
    .unwrap();

    assert_eq!(result, Ok(()));
    assert_eq!(texts(&ui)[0], "Retrieving logs for app web in org acme / space prod as ops...");
    assert_eq!(ui.log_lines(), vec!["first", "second", "third"]);
    assert!(ui.entries().iter().all(|entry| match entry {
        Rendered::LogLine { with_header, .. } => *with_header,
        _ => true,
    }));
}

#[tokio::test]
async fn recent_logs_failure_is_failed_to_retrieve_logs() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid" },
            "recent_logs_error": "log cache unavailable"
        }"#,
    );
    let ui = Arc::new(RecordingUi::new());

    let result = timeout(
        BOUND,
        logs(&plane, &streamer(&plane), ui, &config(), "web", true, futures::future::pending::<()>()),
    )
    .await
    .unwrap();

    assert_eq!(
        result,
        Err(CommandError::FailedToRetrieveLogs { reason: "log cache unavailable".to_string() })
    );
}

#[tokio::test]
async fn live_logs_end_when_the_source_closes() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid" },
            "log_stream": [
                { "event": { "log": { "message": "GET / 200" } } },
                { "event": { "log": { "message": "GET /health 200" } } }
            ],
            "close_log_stream": true
        }"#,
    );
    let ui = Arc::new(RecordingUi::new());

    let result = timeout(
        BOUND,
        logs(&plane, &streamer(&plane), ui.clone(), &config(), "web", false, futures::future::pending::<()>()),
    )
    .await
    .unwrap();

    assert_eq!(result, Ok(()));
    assert_eq!(ui.log_lines(), vec!["GET / 200", "GET /health 200"]);
}

#[tokio::test]
async fn live_logs_stop_cleanly_on_interrupt() {
    let plane = plane(r#"{ "application": { "name": "web", "guid": "web-guid" } }"#);
    let ui = Arc::new(RecordingUi::new());
    let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();
    interrupt_tx.send(()).unwrap();

    let result = timeout(
        BOUND,
        logs(&plane, &streamer(&plane), ui.clone(), &config(), "web", false, async move {
            let _ = interrupt_rx.await;
        }),
    )
    .await
    .unwrap();

    assert_eq!(result, Ok(()));
    assert!(ui.log_lines().is_empty());
    assert!(!ui.entries().iter().any(|entry| matches!(entry, Rendered::Error(_))));
}

#[tokio::test]
async fn live_stream_transport_error_fails_the_command() {
    let plane = plane(
        r#"{
            "application": { "name": "web", "guid": "web-guid" },
            "log_stream": [ { "event": { "log_error": "unexpected status code 502" } } ]
        }"#,
    );
    let ui = Arc::new(RecordingUi::new());

    let result = timeout(
        BOUND,
        logs(&plane, &streamer(&plane), ui, &config(), "web", false, futures::future::pending::<()>()),
    )
    .await
    .unwrap();

    assert_eq!(
        result,
        Err(CommandError::FailedToRetrieveLogs { reason: "unexpected status code 502".to_string() })
    );
}
