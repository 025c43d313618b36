//! Integration tests for the orchestrator.
//!
//! These tests launch the `mock-mcp-proxy` binary in place of a real proxy
//! and drive the whole fleet through it. Each test uses its own port range
//! so they can run in parallel.

use std::time::{Duration, Instant};

use serde_json::json;
use toolfleet_mcp::{
    McpError, Orchestrator, OrchestratorOptions, ServerSpec, SessionOptions, SessionState,
    StopOutcome,
};

fn mock_options(base_port: u16) -> OrchestratorOptions {
    OrchestratorOptions::default()
        .with_base_port(base_port)
        .with_proxy_binary(env!("CARGO_BIN_EXE_mock-mcp-proxy"))
        .with_settle(Duration::from_millis(300))
        .with_shutdown_grace(Duration::from_secs(2))
        .with_session(
            SessionOptions::default()
                .with_request_timeout(Duration::from_secs(2))
                .with_retries(10, Duration::from_millis(100)),
        )
}

#[tokio::test]
async fn test_alpha_beta_fleet() {
    let mut fleet = Orchestrator::new(mock_options(8080));
    let report = fleet
        .start_all(vec![
            ServerSpec::new("alpha", "echo"),
            ServerSpec::new("beta", "echo"),
        ])
        .await
        .expect("start_all failed");

    assert!(report.is_clean());
    assert_eq!(report.port_of("alpha"), Some(8080));
    assert_eq!(report.port_of("beta"), Some(8081));
    assert_eq!(fleet.len(), 2);

    assert_eq!(fleet.stop_all().await, 2);
    assert!(fleet.is_empty());
}

#[tokio::test]
async fn test_distinct_ports_in_configuration_order() {
    let names = ["n0", "n1", "n2", "n3", "n4"];
    let mut fleet = Orchestrator::new(mock_options(31000));
    let report = fleet
        .start_all(names.iter().map(|n| ServerSpec::new(*n, "echo")))
        .await
        .unwrap();

    assert_eq!(report.pool.len(), names.len());
    for (i, entry) in report.pool.iter().enumerate() {
        assert_eq!(entry.name, names[i]);
        assert_eq!(entry.port, 31000 + i as u16);
        assert_eq!(entry.address, format!("http://localhost:{}/mcp", entry.port));
    }

    assert_eq!(fleet.stop_all().await, names.len());
}

#[tokio::test]
async fn test_duplicate_name_skipped() {
    let mut fleet = Orchestrator::new(mock_options(31100));
    let report = fleet
        .start_all(vec![
            ServerSpec::new("alpha", "echo"),
            ServerSpec::new("alpha", "echo"),
            ServerSpec::new("beta", "echo"),
        ])
        .await
        .unwrap();

    assert_eq!(fleet.len(), 2);
    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        McpError::DuplicateServer { name } => assert_eq!(name, "alpha"),
        other => panic!("Expected duplicate error, got {:?}", other),
    }
    // Duplicates do not consume a port.
    assert_eq!(report.port_of("beta"), Some(31101));

    fleet.stop_all().await;
}

#[tokio::test]
async fn test_list_all_tools_tags_and_orders() {
    let mut fleet = Orchestrator::new(mock_options(31200));
    fleet
        .start_all(vec![
            ServerSpec::new("files", "fs-server").with_args(["read", "write"]),
            ServerSpec::new("web", "web-server").with_arg("search"),
        ])
        .await
        .unwrap();

    let tools = fleet.list_all_tools().await;
    let names: Vec<String> = tools.iter().map(|t| t.qualified_name()).collect();
    assert_eq!(names, vec!["files.read", "files.write", "web.search"]);
    assert_eq!(tools[0].tool.description, "Mock tool read");

    let files = fleet.get("files").unwrap();
    assert!(files.session().is_ready());
    assert_eq!(files.session().session_id(), Some("mock-session-31200"));
    assert_eq!(
        files.session().server_info().map(|i| i.name.as_str()),
        Some("mock-mcp-proxy")
    );

    fleet.stop_all().await;
}

#[tokio::test]
async fn test_unbound_server_degrades_to_empty() {
    let options = mock_options(31300).with_session(
        SessionOptions::default()
            .with_request_timeout(Duration::from_secs(1))
            .with_retries(0, Duration::from_millis(10)),
    );
    let mut fleet = Orchestrator::new(options);
    fleet
        .start_all(vec![
            ServerSpec::new("good", "srv").with_arg("ping"),
            ServerSpec::new("dead", "unbound"),
        ])
        .await
        .unwrap();

    let started = Instant::now();
    let tools = fleet.list_all_tools().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].server, "good");
    assert_eq!(tools[0].tool.name, "ping");

    let dead = fleet.get_mut("dead").unwrap();
    assert!(dead.is_running());
    assert!(matches!(dead.session().state(), SessionState::Failed { .. }));
    assert!(dead.list_tools().await.next().is_none());
    assert!(matches!(
        dead.try_list_tools().await,
        Err(McpError::Handshake { .. })
    ));

    assert_eq!(fleet.stop_all().await, 2);
}

#[tokio::test]
async fn test_call_tool_round_trip() {
    let mut fleet = Orchestrator::new(mock_options(31400));
    fleet
        .start_all(vec![ServerSpec::new("echoer", "srv").with_arg("echo")])
        .await
        .unwrap();

    let result = fleet
        .call_tool("echoer", "echo", Some(json!({"message": "hello"})))
        .await
        .unwrap();
    assert!(!result.is_error());
    assert!(result.text().unwrap().contains("hello"));

    match fleet.call_tool("echoer", "missing", None).await {
        Err(McpError::ServerError { code, .. }) => assert_eq!(code, -32602),
        other => panic!("Expected server error, got {:?}", other),
    }

    assert!(matches!(
        fleet.call_tool("nobody", "echo", None).await,
        Err(McpError::ServerNotFound(_))
    ));

    fleet.stop_all().await;
}

#[tokio::test]
async fn test_exited_server_is_not_running() {
    let mut fleet = Orchestrator::new(mock_options(31500));
    let report = fleet
        .start_all(vec![ServerSpec::new("quitter", "exit")])
        .await
        .unwrap();
    assert!(report.is_clean());

    let quitter = fleet.get_mut("quitter").unwrap();
    assert!(!quitter.is_running());
    assert_eq!(quitter.list_tools().await.len(), 0);
    assert!(matches!(
        quitter.try_list_tools().await,
        Err(McpError::NotRunning(_))
    ));

    // Already exited, so nothing counts as stopped.
    assert_eq!(fleet.stop_all().await, 0);
}

#[tokio::test]
async fn test_restart_uses_fresh_port_and_session() {
    let mut fleet = Orchestrator::new(mock_options(31600));
    fleet
        .start_all(vec![
            ServerSpec::new("a", "srv").with_arg("one"),
            ServerSpec::new("b", "srv").with_arg("two"),
        ])
        .await
        .unwrap();
    assert_eq!(fleet.list_all_tools().await.len(), 2);

    let port = fleet.restart("a").await.unwrap();
    assert_eq!(port, 31602);
    assert_eq!(fleet.names(), vec!["a", "b"]);

    let a = fleet.get_mut("a").unwrap();
    assert!(!a.session().is_ready());
    let tools: Vec<_> = a.list_tools().await.collect();
    assert_eq!(tools.len(), 1);
    assert_eq!(a.session().session_id(), Some("mock-session-31602"));

    assert_eq!(fleet.stop("b").await.unwrap(), StopOutcome::Terminated);
    assert_eq!(fleet.stop_all().await, 1);
}

#[tokio::test]
async fn test_child_output_is_captured() {
    let mut fleet = Orchestrator::new(mock_options(31700));
    fleet
        .start_all(vec![ServerSpec::new("chatty", "srv")])
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = false;
    while Instant::now() < deadline {
        let output = fleet.get("chatty").unwrap().recent_output();
        if output.iter().any(|l| l.line.contains("mock proxy starting")) {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(seen, "expected captured proxy output");

    fleet.stop_all().await;
}
