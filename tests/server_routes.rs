#![cfg(feature = "server")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::spawn;
use serde_json::{json, Value};
use wizard_agent::{
    router, Agent, AppState, ModelCompletion, ScriptedModel, ToolCall, ToolsConfig,
};

async fn serve_with(responses: Vec<ModelCompletion>, max_iterations: usize) -> String {
    // Tools point at a closed port; every call comes back as an error result.
    let tools = wizard_agent::standard_toolkit(&ToolsConfig::with_base_url("http://127.0.0.1:9"))
        .unwrap();
    let agent = Agent::new(ScriptedModel::new(responses), Arc::new(tools))
        .with_max_iterations(max_iterations);
    spawn(router(AppState::new(agent))).await
}

async fn post_chat(base: &str, message: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/chat"))
        .json(&json!({ "message": message }))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_index_and_tools() {
    let base = serve_with(Vec::new(), 1).await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");

    let index = client.get(format!("{base}/")).send().await.unwrap();
    assert!(index.text().await.unwrap().contains("Wizard Agent"));

    let tools: Value = client
        .get(format!("{base}/tools"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["function"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["get_weather", "book_recs", "random_joke", "random_dog", "trivia"]
    );
}

#[tokio::test]
async fn chat_returns_answer_and_tool_calls() {
    let base = serve_with(
        vec![
            ModelCompletion::calls(vec![ToolCall::new("j1", "random_joke", json!({}))]),
            ModelCompletion::text("The joke service is down, sorry."),
        ],
        5,
    )
    .await;

    let (status, body) = post_chat(&base, "tell me a joke").await;

    assert_eq!(status, 200);
    assert_eq!(body["answer"], "The joke service is down, sorry.");
    assert_eq!(body["iterations"], 2);
    assert_eq!(body["tool_calls"][0]["id"], "j1");
    assert_eq!(body["tool_calls"][0]["name"], "random_joke");
}

#[tokio::test]
async fn exhausted_runs_are_422() {
    let base = serve_with(
        vec![ModelCompletion::calls(vec![ToolCall::new("t", "trivia", json!({}))])],
        1,
    )
    .await;

    let (status, body) = post_chat(&base, "trivia").await;

    assert_eq!(status, 422);
    assert_eq!(body["kind"], "iteration_exhausted");
}

#[tokio::test]
async fn model_outage_is_502() {
    let base = serve_with(Vec::new(), 3).await;

    let (status, body) = post_chat(&base, "hello").await;

    assert_eq!(status, 502);
    assert_eq!(body["kind"], "model_unavailable");
    assert!(body["error"].as_str().unwrap().contains("model endpoint unavailable"));
}

#[tokio::test]
async fn blank_messages_are_rejected() {
    let base = serve_with(Vec::new(), 1).await;

    let (status, body) = post_chat(&base, "   ").await;

    assert_eq!(status, 400);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn events_stream_run_progress() {
    let base = serve_with(vec![ModelCompletion::text("hi there")], 2).await;

    let mut events = reqwest::Client::new()
        .get(format!("{base}/events"))
        .send()
        .await
        .unwrap();

    let (status, _) = post_chat(&base, "hello").await;
    assert_eq!(status, 200);

    let mut seen = String::new();
    while !seen.contains("run_finished") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), events.chunk())
            .await
            .expect("event stream stalled")
            .unwrap()
            .expect("event stream closed");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(seen.contains("run_started"));
    assert!(seen.contains("model_requested"));
}
