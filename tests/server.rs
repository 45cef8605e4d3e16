//! HTTP server tests over a real socket.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};

use mishkat::server::router;

use common::{engine, seeded_index, ScriptedLlm};

async fn start_server(fragments: &[&str]) -> SocketAddr {
    let index = seeded_index(&[("salah.pdf", "Salah is offered five times a day.")]);
    let engine = Arc::new(engine(index, Arc::new(ScriptedLlm::new(fragments))));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(engine)).await.unwrap();
    });
    addr
}

/// Split an SSE body into `(event, data)` pairs.
fn parse_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}

#[tokio::test]
async fn health_reports_version() {
    let addr = start_server(&[]).await;
    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn stats_reports_vector_count() {
    let addr = start_server(&[]).await;
    let body: Value = reqwest::get(format!("http://{}/stats", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["index"], "test");
    assert_eq!(body["total_vector_count"], 1);
    assert_eq!(body["dimension"], common::DIMS);
}

#[tokio::test]
async fn chat_streams_profile_fragments_and_done() {
    let addr = start_server(&["Five ", "times."]).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/chat", addr))
        .json(&json!({ "question": "How often is salah offered?", "history": [] }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = parse_events(&resp.text().await.unwrap());
    let names: Vec<&str> = events.iter().map(|(e, _)| e.as_str()).collect();
    assert_eq!(names.first(), Some(&"profile"));
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(events[0].1["code"], "en");
    assert_eq!(events[0].1["rtl"], false);

    let text: String = events
        .iter()
        .filter(|(e, _)| e == "fragment")
        .map(|(_, d)| d["text"].as_str().unwrap().to_string())
        .collect();
    assert!(text.ends_with("Five times."));
}

#[tokio::test]
async fn blank_question_is_a_bad_request() {
    let addr = start_server(&[]).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/chat", addr))
        .json(&json!({ "question": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_input");
}
