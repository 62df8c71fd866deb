use std::time::{Duration, Instant};

use futures_util::StreamExt;
use goplay::orchestrator::{BUILD_FAILED_MESSAGE, DONE_MESSAGE};
use goplay::{EventKind, ExecutionRequest, Mode, Orchestrator, OutputEvent};

use super::{collect, fixture_source, test_config};

fn payloads(events: &[OutputEvent], kind: EventKind) -> Vec<&str> {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.payload.as_str())
        .collect()
}

fn assert_single_terminal(events: &[OutputEvent]) {
    assert_eq!(
        events.iter().filter(|e| e.is_terminal()).count(),
        1,
        "{events:?}"
    );
    assert!(events.last().is_some_and(OutputEvent::is_terminal), "{events:?}");
}

fn remaining_workspaces(root: &std::path::Path) -> usize {
    std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("sandbox-"))
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn test_hello_world() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let stream = orchestrator
        .execute(ExecutionRequest::new(fixture_source("hello.go"), "1"))
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(
        events,
        vec![OutputEvent::stdout("hi"), OutputEvent::done(DONE_MESSAGE)]
    );
    assert_single_terminal(&events);
    assert_eq!(remaining_workspaces(&dir.path().join("ws")), 0);
}

#[tokio::test]
async fn test_stdout_order() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("stdout.go"), "1"))
            .unwrap(),
    )
    .await;

    assert_eq!(payloads(&events, EventKind::Stdout), vec!["a", "b", "c"]);
    assert_eq!(events.last().unwrap(), &OutputEvent::done(DONE_MESSAGE));
}

#[tokio::test]
async fn test_clear_screen() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("clear.go"), "1"))
            .unwrap(),
    )
    .await;

    let visible: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Stdout | EventKind::Clear))
        .cloned()
        .collect();
    assert_eq!(
        visible,
        vec![
            OutputEvent::stdout("frame 1"),
            OutputEvent::clear(),
            OutputEvent::stdout("frame 2"),
        ]
    );
}

#[tokio::test]
async fn test_build_error() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("syntax_error.go"), "1"))
            .unwrap(),
    )
    .await;

    let stderr = payloads(&events, EventKind::Stderr);
    assert!(
        stderr.iter().any(|l| l.contains("undefined: fmt")),
        "{stderr:?}"
    );
    // Banner and wrapper lines are filtered, paths are relative
    assert!(stderr.iter().all(|l| !l.starts_with("# ")), "{stderr:?}");
    assert!(stderr.iter().all(|l| !l.contains("sandbox-")), "{stderr:?}");
    assert!(stderr.iter().all(|l| !l.contains("Build error")), "{stderr:?}");
    assert_eq!(events.last().unwrap(), &OutputEvent::error(BUILD_FAILED_MESSAGE));
    assert!(payloads(&events, EventKind::Stdout).is_empty());
}

#[tokio::test]
async fn test_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("exit_code.go"), "1"))
            .unwrap(),
    )
    .await;

    assert_eq!(payloads(&events, EventKind::Stderr), vec!["failing on purpose"]);
    assert_eq!(events.last().unwrap(), &OutputEvent::error("exit status 3"));
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    // Warm the build cache so the measurement covers execution only
    collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("hello.go"), "1"))
            .unwrap(),
    )
    .await;

    let started = Instant::now();
    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("infinite_loop.go"), "1"))
            .unwrap(),
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(
        events,
        vec![OutputEvent::timeout("Execution timed out (5s).")]
    );
    assert!(elapsed >= Duration::from_secs(5), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(8), "{elapsed:?}");
}

#[tokio::test]
async fn test_sleep_hits_wall_clock() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("ws"));
    config.limits = config.limits.clone().with_wall_time_limit(2.0);
    let orchestrator = Orchestrator::new(config).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("sleep.go"), "1"))
            .unwrap(),
    )
    .await;

    assert_eq!(
        events,
        vec![
            OutputEvent::stdout("sleeping"),
            OutputEvent::timeout("Execution timed out (2s)."),
        ]
    );
}

#[tokio::test]
async fn test_memory_limit() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("memory_hog.go"), "1"))
            .unwrap(),
    )
    .await;

    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::Error, "{events:?}");
    assert!(
        payloads(&events, EventKind::Stderr)
            .iter()
            .any(|l| l.contains("out of memory")),
        "{events:?}"
    );
}

#[tokio::test]
async fn test_go_test_mode() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let request = ExecutionRequest::new(fixture_source("add_test.go"), "1");
    assert_eq!(request.mode(), Mode::Test);
    let events = collect(orchestrator.execute(request).unwrap()).await;

    let stdout = payloads(&events, EventKind::Stdout);
    assert!(stdout.iter().any(|l| l.starts_with("=== RUN   TestAdd")), "{stdout:?}");
    assert!(stdout.iter().any(|l| l.starts_with("--- PASS: TestAdd")), "{stdout:?}");
    assert_eq!(events.last().unwrap(), &OutputEvent::done(DONE_MESSAGE));
}

#[tokio::test]
async fn test_failing_go_test() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(test_config(dir.path().join("ws"))).unwrap();

    let events = collect(
        orchestrator
            .execute(ExecutionRequest::new(fixture_source("failing_test.go"), "1"))
            .unwrap(),
    )
    .await;

    let stdout = payloads(&events, EventKind::Stdout);
    assert!(stdout.iter().any(|l| l.contains("always fails")), "{stdout:?}");
    assert_eq!(events.last().unwrap(), &OutputEvent::error("exit status 1"));
}

#[tokio::test]
async fn test_disconnect_stops_execution() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ws");
    let orchestrator = Orchestrator::new(test_config(root.clone())).unwrap();

    let mut stream = orchestrator
        .execute(ExecutionRequest::new(fixture_source("sleep.go"), "1"))
        .unwrap();
    let first = tokio::time::timeout(Duration::from_secs(60), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, OutputEvent::stdout("sleeping"));
    drop(stream);

    let deadline = Instant::now() + Duration::from_secs(5);
    while remaining_workspaces(&root) > 0 {
        assert!(Instant::now() < deadline, "workspace not removed after disconnect");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
