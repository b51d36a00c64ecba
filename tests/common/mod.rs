#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Well-behaved stand-ins for the five public APIs.
pub fn healthy_upstream(hits: Hits) -> Router {
    Router::new()
        .route("/v1/forecast", get(weather))
        .route("/books/v1/volumes", get(books))
        .route("/joke/Any", get(joke))
        .route("/api/breeds/image/random", get(dog))
        .route("/api.php", get(trivia))
        .with_state(hits)
}

async fn weather(State(hits): State<Hits>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    hits.bump();
    let latitude: f64 = q.get("latitude").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    let longitude: f64 = q.get("longitude").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    Json(json!({
        "latitude": latitude,
        "longitude": longitude,
        "current_units": {"temperature_2m": "°C", "wind_speed_10m": "km/h"},
        "current": {
            "time": "2024-06-01T12:00",
            "temperature_2m": 21.4,
            "weather_code": 3,
            "wind_speed_10m": 11.2
        }
    }))
}

async fn books(State(hits): State<Hits>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    hits.bump();
    let topic = q.get("q").cloned().unwrap_or_default();
    let max: usize = q.get("maxResults").and_then(|v| v.parse().ok()).unwrap_or(10);
    let items: Vec<Value> = (1..=max)
        .map(|i| {
            json!({
                "id": format!("vol{i}"),
                "volumeInfo": {
                    "title": format!("{topic} book {i}"),
                    "authors": [format!("Author {i}")],
                    "publishedDate": format!("20{:02}-01-01", i)
                }
            })
        })
        .collect();
    Json(json!({ "totalItems": max, "items": items }))
}

async fn joke(State(hits): State<Hits>) -> Json<Value> {
    hits.bump();
    Json(json!({
        "error": false,
        "type": "single",
        "joke": "I told my computer a joke about UDP. I'm not sure it got it."
    }))
}

async fn dog(State(hits): State<Hits>) -> Json<Value> {
    hits.bump();
    Json(json!({
        "message": "https://images.dog.ceo/breeds/hound-afghan/n02088094_1003.jpg",
        "status": "success"
    }))
}

async fn trivia(State(hits): State<Hits>) -> Json<Value> {
    hits.bump();
    Json(json!({
        "response_code": 0,
        "results": [{
            "type": "multiple",
            "difficulty": "easy",
            "category": "Science%3A%20Computers",
            "question": "What%20does%20%22CPU%22%20stand%20for%3F",
            "correct_answer": "Central%20Processing%20Unit",
            "incorrect_answers": ["Central%20Process%20Unit", "Computer%20Personal%20Unit", "Central%20Processor%20Unit"]
        }]
    }))
}

/// Stand-ins that fail each in their own way.
pub fn broken_upstream() -> Router {
    Router::new()
        .route(
            "/v1/forecast",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        )
        .route("/books/v1/volumes", get(|| async { "definitely not json" }))
        .route(
            "/joke/Any",
            get(|| async { Json(json!({"error": true, "message": "No matching joke found"})) }),
        )
        .route(
            "/api/breeds/image/random",
            get(|| async { Json(json!({"status": "error", "message": "Breed not found"})) }),
        )
        .route(
            "/api.php",
            get(|| async { Json(json!({"response_code": 1, "results": []})) }),
        )
}

/// A recorded model request: headers and JSON body.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub headers: HeaderMap,
    pub body: Value,
}

/// Fake model endpoint replaying canned JSON responses in order, for both
/// `/chat/completions` and `/messages`. Once the script runs out it answers
/// 500.
#[derive(Clone)]
pub struct FakeModel {
    responses: Arc<Mutex<Vec<Value>>>,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeModel {
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().rev().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/chat/completions", post(model_reply))
            .route("/messages", post(model_reply))
            .with_state(self.clone())
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn model_reply(
    State(fake): State<FakeModel>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.requests.lock().unwrap().push(Recorded { headers, body });
    match fake.responses.lock().unwrap().pop() {
        Some(reply) => Json(reply).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "model exploded").into_response(),
    }
}

/// OpenAI chat completion carrying tool calls.
pub fn openai_tool_calls(calls: &[(&str, &str, Value)]) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": args.to_string()}
            })
        })
        .collect();
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": null, "tool_calls": calls},
            "finish_reason": "tool_calls"
        }]
    })
}

pub fn openai_text(text: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}
