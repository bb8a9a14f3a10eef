use crate::assistant::{ChatMessage, FlightAssistant};
use crate::error::AssistantError;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

pub struct AppState {
    pub assistant: FlightAssistant,
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
}

impl IntoResponse for AssistantError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssistantError::Completion(_) => StatusCode::BAD_GATEWAY,
            AssistantError::Tool(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind_addr: &str, state: Arc<AppState>) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Flight assistant listening on {}", listener.local_addr()?);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn authorized(headers: &HeaderMap, token: Option<&str>) -> bool {
    let Some(token) = token else {
        return true;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|supplied| supplied == token)
}

#[instrument(skip_all)]
async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, Response> {
    if !authorized(&headers, state.auth_token.as_deref()) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Missing or invalid bearer token" })),
        )
            .into_response());
    }

    match state.assistant.respond(&request.messages).await {
        Ok(content) => Ok(Json(ChatResponse { content })),
        Err(e) => {
            error!("Chat turn failed: {}", e);
            Err(e.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::duffel::DuffelClient;
    use crate::render::GREETING;
    use crate::test_support::{chat_completion, openai_router, spawn_mock, tool_call};
    use serde_json::Value;

    fn state(auth_token: Option<&str>) -> Arc<AppState> {
        state_with_openai(auth_token, None)
    }

    fn state_with_openai(auth_token: Option<&str>, openai_base_url: Option<String>) -> Arc<AppState> {
        let config = Config::from_lookup(|key| match key {
            "DUFFEL_API_KEY" => Some("duffel_test_key".to_string()),
            "DUFFEL_BASE_URL" => Some("http://127.0.0.1:9".to_string()),
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_BASE_URL" => openai_base_url.clone(),
            _ => None,
        })
        .unwrap();
        let duffel = DuffelClient::new(&config.duffel_base_url, &config.duffel_api_key).unwrap();
        Arc::new(AppState {
            assistant: FlightAssistant::new(&config, duffel),
            auth_token: auth_token.map(str::to_string),
        })
    }

    #[test]
    fn test_authorized() {
        let mut headers = HeaderMap::new();
        assert!(authorized(&headers, None));
        assert!(!authorized(&headers, Some("secret")));

        headers.insert(AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(!authorized(&headers, Some("secret")));

        headers.insert(AUTHORIZATION, "Bearer secret".parse().unwrap());
        assert!(authorized(&headers, Some("secret")));
    }

    #[tokio::test]
    async fn test_health_and_empty_chat() {
        let base = spawn_mock(build_router(state(None))).await;
        let http = reqwest::Client::new();

        let health: Value = http
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let reply: Value = http
            .post(format!("{}/chat", base))
            .json(&json!({ "messages": [] }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply["content"], GREETING);
    }

    #[tokio::test]
    async fn test_chat_requires_token_when_configured() {
        let base = spawn_mock(build_router(state(Some("secret")))).await;
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{}/chat", base))
            .json(&json!({ "messages": [] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        let response = http
            .post(format!("{}/chat", base))
            .bearer_auth("secret")
            .json(&json!({ "messages": [] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_status_follows_failure_kind() {
        let (openai, _) = openai_router(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": {"message": "The server had an error"}}),
        );
        let openai_base = spawn_mock(openai).await;
        let base = spawn_mock(build_router(state_with_openai(
            None,
            Some(format!("{}/v1", openai_base)),
        )))
        .await;
        let http = reqwest::Client::new();
        let turn = json!({ "messages": [{ "role": "user", "content": "Hi" }] });

        let response = http.post(format!("{}/chat", base)).json(&turn).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Completion failed"));

        let (openai, _) = openai_router(
            StatusCode::OK,
            chat_completion(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [tool_call("call_1", "get_offer", json!({"offer_id": "  "}))]
            })),
        );
        let openai_base = spawn_mock(openai).await;
        let base = spawn_mock(build_router(state_with_openai(
            None,
            Some(format!("{}/v1", openai_base)),
        )))
        .await;
        let response = http.post(format!("{}/chat", base)).json(&turn).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

        // A conversation ending on an assistant turn never reaches the model
        let ended = json!({ "messages": [
            { "role": "user", "content": "Hi" },
            { "role": "assistant", "content": "Hello!" }
        ] });
        let reply: Value = http
            .post(format!("{}/chat", base))
            .json(&ended)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply["content"], GREETING);
    }
}
