use goplay::config::Credentials;
use goplay::orchestrator::DONE_MESSAGE;
use goplay::{EventKind, ExecutionRequest, Orchestrator, OutputEvent};

use super::{collect, fixture_source, test_config};

fn stdout_lines(events: &[OutputEvent]) -> Vec<&str> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Stdout)
        .map(|e| e.payload.as_str())
        .collect()
}

#[tokio::test]
async fn test_policy_denies_mkdir() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ws");
    let orchestrator = Orchestrator::new(test_config(root.clone())).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("mkdir.go"), "1"))
            .unwrap(),
    )
    .await;

    let stdout = stdout_lines(&events);
    assert_eq!(stdout.len(), 1, "{events:?}");
    assert!(stdout[0].contains("operation not permitted"), "{stdout:?}");
    assert_eq!(events.last().unwrap(), &OutputEvent::done(DONE_MESSAGE));
}

#[tokio::test]
async fn test_disabled_filter_allows_mkdir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("ws"));
    config.isolation.syscall_filter = false;
    let orchestrator = Orchestrator::new(config).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("mkdir.go"), "1"))
            .unwrap(),
    )
    .await;

    assert_eq!(stdout_lines(&events), vec!["mkdir: ok"]);
}

#[tokio::test]
#[ignore = "requires root"]
async fn test_run_as_unprivileged_user() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("ws"));
    config.isolation.run_as = Some(Credentials {
        uid: 65534,
        gid: 65534,
    });
    let orchestrator = Orchestrator::new(config).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("whoami.go"), "1"))
            .unwrap(),
    )
    .await;

    assert_eq!(stdout_lines(&events), vec!["uid 65534 gid 65534"]);
    assert_eq!(events.last().unwrap(), &OutputEvent::done(DONE_MESSAGE));
}
