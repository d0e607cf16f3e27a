//! End-to-end launch tests against a scripted stand-in server.
#![cfg(unix)]

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use startline::config::{ConfigResolver, ProcessConfig, Product};
use startline::supervisor::{ServerSupervisor, StartupError, SupervisorState};
use tempfile::TempDir;

fn write_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-server");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Resolve a real configuration from a settings file, then point the
/// executable at a script standing in for the server.
fn scripted_config(home: &TempDir, dest: &str, script_body: &str) -> ProcessConfig {
    let config_dir = home.path().join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("kibana.yml"),
        format!("logging:\n  dest: {dest}\n"),
    )
    .unwrap();

    let env: HashMap<String, String> = HashMap::new();
    let mut config = ConfigResolver::new(Product::new("kibana"))
        .home_dir(home.path())
        .resolve(&env)
        .unwrap();
    config.executable = write_script(home.path(), script_body);
    config
}

fn start_or_skip(supervisor: &ServerSupervisor) -> bool {
    match supervisor.start() {
        Ok(()) => true,
        Err(StartupError::Tail(e)) => {
            eprintln!("Skipping test due to system limit: {e}");
            false
        }
        Err(e) => panic!("start failed: {e}"),
    }
}

fn append_line(path: &Path, line: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    writeln!(file, "{line}").unwrap();
}

#[tokio::test]
async fn readiness_from_stdout_line() {
    let home = TempDir::new().unwrap();
    let config = scripted_config(
        &home,
        "stdout",
        "echo 'log   [info][server] Server started at http://127.0.0.1:5601'\nsleep 30\n",
    );

    let supervisor = ServerSupervisor::new(config);
    supervisor.start().unwrap();

    let address = supervisor
        .wait_until_ready(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(address.host, "127.0.0.1");
    assert_eq!(address.port, 5601);
    assert!(supervisor.state().is_ready());

    supervisor.shutdown().await;
    // Readiness is terminal; stopping does not demote it
    assert!(supervisor.state().is_ready());
}

#[tokio::test]
async fn wait_after_ready_returns_immediately() {
    let home = TempDir::new().unwrap();
    let config = scripted_config(
        &home,
        "stdout",
        "echo 'Server started at http://127.0.0.1:5601'\nsleep 30\n",
    );

    let supervisor = ServerSupervisor::new(config);
    supervisor.start().unwrap();
    supervisor
        .wait_until_ready(Duration::from_secs(10))
        .await
        .unwrap();

    // Already ready: even a tiny window must succeed
    let address = supervisor
        .wait_until_ready(Duration::from_millis(5))
        .await
        .unwrap();
    assert_eq!(address.port, 5601);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn duplicate_confirmations_keep_first_address() {
    let home = TempDir::new().unwrap();
    let config = scripted_config(
        &home,
        "stdout",
        concat!(
            "echo 'Server started at http://127.0.0.1:5601'\n",
            "echo 'Server started at http://127.0.0.1:9999'\n",
            "sleep 30\n",
        ),
    );

    let supervisor = ServerSupervisor::new(config);
    supervisor.start().unwrap();

    let address = supervisor
        .wait_until_ready(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(address.port, 5601);

    // Give the second line time to flow through, then re-check
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(supervisor.address().map(|a| a.port), Some(5601));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn exit_before_ready_is_distinct_from_timeout() {
    let home = TempDir::new().unwrap();
    let config = scripted_config(&home, "stdout", "echo 'booting'\nexit 7\n");

    let supervisor = ServerSupervisor::new(config);
    supervisor.start().unwrap();

    let err = supervisor
        .wait_until_ready(Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StartupError::ProcessExited { exit_code: Some(7) }
    ));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn readiness_from_log_file_tail() {
    let home = TempDir::new().unwrap();
    let log_path = home.path().join("kibana.log");
    let config = scripted_config(&home, &log_path.display().to_string(), "sleep 30\n");

    let supervisor = ServerSupervisor::new(config);
    if !start_or_skip(&supervisor) {
        return;
    }

    // The server is silent on stdout; readiness arrives via the log file
    append_line(&log_path, "log   [info][listening] Server started at http://0.0.0.0:5601");

    let address = supervisor
        .wait_until_ready(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(address.host, "0.0.0.0");
    assert_eq!(address.port, 5601);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn preexisting_log_content_is_never_replayed() {
    let home = TempDir::new().unwrap();
    let log_path = home.path().join("kibana.log");

    // A stale confirmation from a previous run sits in the file,
    // comfortably more than 500 bytes of it
    append_line(&log_path, "old run noise");
    append_line(&log_path, "Server started at http://127.0.0.1:1111");
    for i in 0..20 {
        append_line(
            &log_path,
            &format!("log   [info][plugins] old run plugin message {i}"),
        );
    }

    let config = scripted_config(&home, &log_path.display().to_string(), "sleep 30\n");
    let supervisor = ServerSupervisor::new(config);
    if !start_or_skip(&supervisor) {
        return;
    }

    // Nothing new was written: the stale line must not satisfy the wait
    let err = supervisor
        .wait_until_ready(Duration::from_millis(400))
        .await
        .unwrap_err();
    assert!(matches!(err, StartupError::Timeout { .. }));
    assert_eq!(supervisor.state(), SupervisorState::Starting);

    // A timed-out wait is retriable once the real confirmation lands
    append_line(&log_path, "Server started at http://127.0.0.1:5601");
    let address = supervisor
        .wait_until_ready(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(address.port, 5601);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_blocks_restart() {
    let home = TempDir::new().unwrap();
    let config = scripted_config(&home, "stdout", "sleep 30\n");

    let supervisor = ServerSupervisor::new(config);
    supervisor.start().unwrap();

    supervisor.stop();
    supervisor.stop();
    supervisor.shutdown().await;

    let err = supervisor
        .wait_until_ready(Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, StartupError::ProcessExited { exit_code: None }));

    assert!(matches!(supervisor.start(), Err(StartupError::Stopped)));
}

#[tokio::test]
async fn concurrent_stops_race_safely() {
    let home = TempDir::new().unwrap();
    let config = scripted_config(
        &home,
        "stdout",
        "echo 'Server started at http://127.0.0.1:5601'\nsleep 30\n",
    );

    let supervisor = std::sync::Arc::new(ServerSupervisor::new(config));
    supervisor.start().unwrap();
    supervisor
        .wait_until_ready(Duration::from_secs(10))
        .await
        .unwrap();

    let a = tokio::spawn({
        let supervisor = std::sync::Arc::clone(&supervisor);
        async move { supervisor.stop() }
    });
    let b = tokio::spawn({
        let supervisor = std::sync::Arc::clone(&supervisor);
        async move { supervisor.stop() }
    });
    a.await.unwrap();
    b.await.unwrap();

    supervisor.shutdown().await;
    assert!(supervisor.state().is_ready());
}

#[tokio::test]
async fn recent_output_keeps_unmatched_lines() {
    let home = TempDir::new().unwrap();
    let config = scripted_config(
        &home,
        "stdout",
        concat!(
            "echo 'optimizing bundles'\n",
            "echo 'plugin status green'\n",
            "sleep 30\n",
        ),
    );

    let supervisor = ServerSupervisor::new(config);
    supervisor.start().unwrap();

    // No confirmation will come; let the lines flow through
    tokio::time::sleep(Duration::from_millis(300)).await;
    let lines = supervisor.recent_output(10);
    assert!(lines.contains(&"optimizing bundles".to_string()));
    assert!(lines.contains(&"plugin status green".to_string()));

    supervisor.shutdown().await;
}
