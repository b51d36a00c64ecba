use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::net::ToSocketAddrs;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::hooks::BroadcastHook;
use crate::llm::openai_tools;

/// Shared state of the web surface: one agent serving every request, and
/// the channel its run events are broadcast on.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub events: broadcast::Sender<String>,
}

impl AppState {
    /// Wires the agent's events into the `/events` stream.
    pub fn new(agent: Agent) -> Self {
        let (events, _) = broadcast::channel(512);
        let agent = agent.with_hook(Arc::new(BroadcastHook::new(events.clone())));
        Self {
            agent: Arc::new(agent),
            events,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/tools", get(list_tools))
        .route("/chat", post(chat))
        .route("/events", get(stream_events))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: impl ToSocketAddrs) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "web ui listening");
    axum::serve(listener, router(state).into_make_service())
        .await
        .map_err(|err| AgentError::Server(err.to_string()))?;
    Ok(())
}

async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(openai_tools(&state.agent.tools().schemas()))
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "message must not be empty", "kind": "invalid_request" })),
        )
            .into_response();
    }

    match state.agent.run(req.message).await {
        Ok(run) => Json(json!({
            "answer": run.answer,
            "iterations": run.iterations,
            "tool_calls": run.tool_calls(),
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: AgentError) -> Response {
    let status = match &err {
        AgentError::IterationExhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
        AgentError::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut body = json!({ "error": err.to_string(), "kind": err.kind() });
    if let AgentError::IterationExhausted {
        partial: Some(partial),
        ..
    } = &err
    {
        body["partial"] = json!(partial);
    }
    (status, Json(body)).into_response()
}

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(line) => Some(Ok::<Event, Infallible>(Event::default().data(line))),
            Err(_) => None,
        }
    });
    Sse::new(stream)
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
<!doctype html>
<html>
<head>
    <meta charset="utf-8" />
    <title>Wizard Agent</title>
    <style>
        body { font-family: sans-serif; margin: 2rem; max-width: 900px; }
        .panel { border: 1px solid #ccc; padding: 1rem; margin-bottom: 1rem; border-radius: 8px; }
        h2 { margin-top: 0; }
        #log { white-space: pre-wrap; }
        #events { background: #111; color: #0f0; height: 200px; overflow: auto; font-family: monospace; padding: 1rem; }
        input[type=text] { width: 80%; padding: 0.4rem; }
        .examples button { margin: 0.2rem; }
    </style>
</head>
<body>
    <h1>Wizard Agent</h1>
    <div class="panel">
        <h2>Chat</h2>
        <div id="log"></div>
        <form id="chat">
            <input type="text" id="message" placeholder="Ask about weather, books, jokes, dogs or trivia" />
            <button type="submit">Send</button>
        </form>
        <div class="examples">
            <button data-q="What's the weather in New York at coordinates 40.7128, -74.0060?">Weather</button>
            <button data-q="Recommend 3 mystery books for me">Books</button>
            <button data-q="Tell me a joke and show me a dog picture">Joke and dog</button>
            <button data-q="Give me a trivia question">Trivia</button>
        </div>
    </div>
    <div class="panel">
        <h2>Events</h2>
        <div id="events"></div>
    </div>
    <script>
        const log = document.getElementById('log');
        async function send(text) {
            log.innerText += `You: ${text}\n`;
            const resp = await fetch('/chat', {
                method: 'POST',
                headers: { 'content-type': 'application/json' },
                body: JSON.stringify({ message: text }),
            });
            const body = await resp.json();
            log.innerText += resp.ok
                ? `Agent: ${body.answer}\n(${body.iterations} model calls, ${body.tool_calls.length} tool calls)\n\n`
                : `Error [${body.kind}]: ${body.error}\n\n`;
        }
        document.getElementById('chat').onsubmit = (ev) => {
            ev.preventDefault();
            const input = document.getElementById('message');
            if (input.value.trim()) send(input.value.trim());
            input.value = '';
        };
        document.querySelectorAll('.examples button').forEach((b) => {
            b.onclick = () => send(b.dataset.q);
        });
        const evt = new EventSource('/events');
        evt.onmessage = (ev) => {
            const node = document.getElementById('events');
            node.innerText += ev.data + "\n";
            node.scrollTop = node.scrollHeight;
        };
    </script>
</body>
</html>
"#,
    )
}
