//! The HTTP surface, exercised over a real socket without a GitHub token.

use github_mcp::credentials::CredentialProvider;
use github_mcp::server::McpGithubServer;
use github_mcp::transport;
use serde_json::json;

const ACCEPT: &str = "application/json, text/event-stream";

async fn spawn() -> String {
    let credentials = CredentialProvider::from_lookup(|_| None);
    let server = McpGithubServer::new(credentials, "http://127.0.0.1:9");
    let app = transport::router(server);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post_mcp(base: &str, body: impl Into<reqwest::Body>) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/mcp", base))
        .header("accept", ACCEPT)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_check_works_without_token() {
    let base = spawn().await;
    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "github-mcp");
}

#[tokio::test]
async fn tool_catalog_lists_both_tools() {
    let base = spawn().await;
    let body: serde_json::Value = reqwest::get(format!("{}/tools", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"github.readFile"));
    assert!(names.contains(&"github.listTree"));
}

#[tokio::test]
async fn tools_list_over_mcp() {
    let base = spawn().await;
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let resp = post_mcp(&base, request.to_string()).await;
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();
    assert!(text.contains("github.readFile"), "{}", text);
    assert!(text.contains("github.listTree"), "{}", text);
}

#[tokio::test]
async fn tool_call_without_token_is_an_error() {
    let base = spawn().await;
    let request = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {
            "name": "github.readFile",
            "arguments": {"owner": "octo", "repo": "demo", "path": "README.md"}
        }
    });
    let resp = post_mcp(&base, request.to_string()).await;
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();
    assert!(text.contains("Missing GitHub token"), "{}", text);
    assert!(text.contains("\"error\""), "{}", text);
}

#[tokio::test]
async fn invalid_arguments_are_a_tool_failure() {
    let base = spawn().await;
    let request = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {
            "name": "github.listTree",
            "arguments": {"owner": "", "repo": "demo"}
        }
    });
    let resp = post_mcp(&base, request.to_string()).await;
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();
    assert!(text.contains("owner must not be empty"), "{}", text);
    assert!(text.contains("\"isError\":true"), "{}", text);
}

#[tokio::test]
async fn malformed_bodies_do_not_crash_the_transport() {
    let base = spawn().await;
    for body in ["", "{not json", "\u{0}\u{1}"] {
        let resp = post_mcp(&base, body.to_string()).await;
        assert!(
            !resp.status().is_server_error(),
            "body {:?} gave {}",
            body,
            resp.status()
        );
    }
    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn each_request_is_its_own_session() {
    let base = spawn().await;
    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "transport-test", "version": "0.1.0"}
        }
    });
    let resp = post_mcp(&base, request.to_string()).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("mcp-session-id").is_none());
    let text = resp.text().await.unwrap();
    assert!(text.contains("github-mcp"), "{}", text);

    // A later request needs no session id from the first one.
    let request = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
    let resp = post_mcp(&base, request.to_string()).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("github.listTree"));
}
