use goplay::config::ModuleName;
use goplay::runner::{self, RunSpec, RunnerError};
use goplay::{ExecutionRequest, Mode, ResourceLimits, Workspace};

use super::{fixture_source, init_toolchain_env, test_config};

async fn spec_for(root: &std::path::Path, fixture: &str) -> (Workspace, RunSpec) {
    let config = test_config(root.to_path_buf());
    let variant = config.get_variant("1").unwrap().clone();
    let request = ExecutionRequest::new(fixture_source(fixture), "1");
    let workspace = Workspace::prepare(root, &request, &variant, &ModuleName::default())
        .await
        .expect("Failed to prepare workspace");

    init_toolchain_env(&variant);

    let spec = RunSpec {
        mode: request.mode(),
        workspace: workspace.path().to_path_buf(),
        go_binary: variant.go_binary(),
        limits: ResourceLimits::default(),
        syscall_filter: true,
        allow_network: false,
        run_as: None,
    };
    (workspace, spec)
}

#[tokio::test]
async fn test_run_hello_world() {
    let dir = tempfile::tempdir().unwrap();
    let (mut workspace, spec) = spec_for(dir.path(), "hello.go").await;

    let stats = runner::run(&spec).await.expect("run failed");
    assert!(stats.max_rss_kb > 0);
    assert!(stats.wall_duration < spec.limits.wall_time());

    // The artifact is built outside the workspace
    assert!(!workspace.path().join("main").exists());
    workspace.cleanup().expect("Failed to cleanup");
}

#[tokio::test]
async fn test_run_build_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut workspace, spec) = spec_for(dir.path(), "syntax_error.go").await;

    let err = runner::run(&spec).await.unwrap_err();
    assert!(matches!(err, RunnerError::Build { .. }), "{err}");
    assert_eq!(err.exit_code(), 126);
    workspace.cleanup().expect("Failed to cleanup");
}

#[tokio::test]
async fn test_run_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let (mut workspace, spec) = spec_for(dir.path(), "exit_code.go").await;

    let err = runner::run(&spec).await.unwrap_err();
    assert_eq!(err.exit_code(), 3);
    workspace.cleanup().expect("Failed to cleanup");
}

#[tokio::test]
async fn test_run_cpu_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (mut workspace, mut spec) = spec_for(dir.path(), "infinite_loop.go").await;
    spec.limits = ResourceLimits::default()
        .with_cpu_time_limit(1)
        .with_wall_time_limit(10.0);

    let err = runner::run(&spec).await.unwrap_err();
    assert!(matches!(err, RunnerError::Timeout), "{err}");
    assert_eq!(err.exit_code(), 124);
    workspace.cleanup().expect("Failed to cleanup");
}

#[tokio::test]
async fn test_run_tests() {
    let dir = tempfile::tempdir().unwrap();
    let (mut workspace, spec) = spec_for(dir.path(), "add_test.go").await;
    assert_eq!(spec.mode, Mode::Test);

    runner::run(&spec).await.expect("go test failed");
    workspace.cleanup().expect("Failed to cleanup");
}
