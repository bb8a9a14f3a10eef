use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral local port and returns its base URL
pub async fn spawn_mock(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn segment(departing_at: &str, arriving_at: &str) -> Value {
    json!({ "departing_at": departing_at, "arriving_at": arriving_at })
}

pub fn offer(id: &str, airline: &str, iata: &str, amount: &str, segments: Vec<Value>) -> Value {
    json!({
        "id": id,
        "owner": { "name": airline, "iata_code": iata },
        "total_amount": amount,
        "total_currency": "USD",
        "slices": [{ "duration": "PT6H15M", "segments": segments }]
    })
}

pub fn offer_request(offers: Vec<Value>) -> Value {
    json!({
        "data": {
            "id": "orq_0000AgQB2FmchXlr3xHPuI",
            "passengers": [{ "id": "pas_001", "type": "adult" }],
            "offers": offers
        }
    })
}

pub fn errors(code: &str, message: &str) -> Value {
    json!({ "errors": [{ "code": code, "message": message, "type": "validation_error" }] })
}

/// Chat completion body whose only choice is the assistant `message`
pub fn chat_completion(message: Value) -> Value {
    json!({
        "id": "chatcmpl-0001",
        "object": "chat.completion",
        "created": 1_760_000_000,
        "model": "gpt-4o",
        "system_fingerprint": null,
        "choices": [{
            "index": 0,
            "message": message,
            "logprobs": null,
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
    })
}

/// Tool call entry as OpenAI sends it, arguments stringified
pub fn tool_call(id: &str, name: &str, arguments: Value) -> Value {
    json!({
        "id": id,
        "type": "function",
        "function": { "name": name, "arguments": arguments.to_string() }
    })
}

/// OpenAI stand-in answering every completion with `status` and `body`.
/// Returns the router and the request bodies it received.
pub fn openai_router(status: StatusCode, body: Value) -> (Router, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                move |State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(request): Json<Value>| async move {
                    seen.lock().unwrap().push(request);
                    (status, Json(body))
                },
            ),
        )
        .with_state(seen.clone());
    (router, seen)
}
