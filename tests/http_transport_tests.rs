use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clusterops::{
    ClusterOp, ClusterTopology, CreateDatabaseOptions, Dispatcher, ExecutionContext,
    HostFailureKind, HostRequest, HostTransport, HttpMethod, HttpTransport, HttpTransportConfig,
    NmaHealthOp, NmaStageErrorReportOp, OpEngine,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

async fn stage(Path(rest): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let catalog = body["catalog_path"].as_str().unwrap_or_default().to_string();
    let rest = rest.trim_start_matches('/');
    Json(json!([
        {"name": format!("{}/{}", catalog, rest), "size_bytes": 10, "mod_time": "2024-01-01T00:00:00Z"}
    ]))
}

async fn spawn_agent() -> u16 {
    let app = Router::new()
        .route("/v1/health", get(|| async { Json(json!({"healthy": true})) }))
        .route(
            "/v1/node-state",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "starting") }),
        )
        .route("/v1/scrutinize/collect/*rest", post(stage));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

fn transport(port: u16) -> HttpTransport {
    let config = HttpTransportConfig::default()
        .port(port)
        .request_timeout(Duration::from_secs(5));
    HttpTransport::new(config).unwrap()
}

fn local_db() -> ClusterTopology {
    let options = CreateDatabaseOptions::new("vdb", vec!["127.0.0.1".to_string()]);
    ClusterTopology::from_creation_options(&options).unwrap()
}

#[tokio::test]
async fn http_transport_returns_status_and_body() {
    let port = spawn_agent().await;
    let transport = transport(port);

    let health = HostRequest {
        method: HttpMethod::Get,
        path: "health".to_string(),
        body: None,
    };
    let response = transport.send("127.0.0.1", &health).await.unwrap();
    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["healthy"], true);

    let state = HostRequest {
        method: HttpMethod::Get,
        path: "node-state".to_string(),
        body: None,
    };
    let response = transport.send("127.0.0.1", &state).await.unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.body, "starting");
}

#[tokio::test]
async fn staging_over_http_records_agent_files() {
    let port = spawn_agent().await;
    let dispatcher = Dispatcher::new(Arc::new(transport(port)));
    let mut ctx = ExecutionContext::new(dispatcher, local_db());

    let op = NmaStageErrorReportOp::from_topology("Scrutinize.1", &ctx.topology, &[]).unwrap();
    let ops: Vec<Box<dyn ClusterOp>> = vec![
        Box::new(NmaHealthOp::new(vec!["127.0.0.1".to_string()])),
        Box::new(op),
    ];
    OpEngine::new(ops).run(&mut ctx).await.unwrap();

    let files = &ctx.staged_files["127.0.0.1"];
    assert_eq!(files.len(), 1);
    assert_eq!(
        files[0].name,
        "/catalog/vdb/v_vdb_node0001_catalog/Scrutinize.1/v_vdb_node0001/context/ErrorReport.txt"
    );
}

#[tokio::test]
async fn unreachable_agent_is_a_transport_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut dispatcher = Dispatcher::new(Arc::new(transport(port)));
    let hosts = vec!["127.0.0.1".to_string()];
    dispatcher.setup(&hosts);

    let requests: HashMap<String, HostRequest> = [(
        "127.0.0.1".to_string(),
        HostRequest {
            method: HttpMethod::Get,
            path: "health".to_string(),
            body: None,
        },
    )]
    .into_iter()
    .collect();
    let results = dispatcher.dispatch(&requests).await.unwrap();
    assert_eq!(
        results["127.0.0.1"].failure().unwrap().kind,
        HostFailureKind::Transport
    );
}
