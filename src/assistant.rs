use crate::config::Config;
use crate::duffel::DuffelClient;
use crate::error::{AssistantError, ToolError};
use crate::render::GREETING;
use crate::tools::{CreateOrderTool, GetOfferTool, SearchFlightsTool};
use chrono::{Duration, Local, NaiveDate};
use rig::agent::Agent;
use rig::completion::{Completion, CompletionError};
use rig::completion::message::{AssistantContent, Message};
use rig::providers::openai;
use rig::providers::openai::completion::CompletionModel;
use rig::tool::Tool;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

/// One turn of the conversation as the chat UI sends it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// System turns are dropped, the assistant supplies its own preamble
    fn to_rig(&self) -> Option<Message> {
        match self.role.as_str() {
            "user" => Some(Message::user(self.content.clone())),
            "assistant" => Some(Message::assistant(self.content.clone())),
            _ => None,
        }
    }
}

pub fn system_preamble(today: NaiveDate) -> String {
    let today_str = today.format("%Y-%m-%d").to_string();
    let tomorrow_str = (today + Duration::days(1)).format("%Y-%m-%d").to_string();
    format!(
        "You are a helpful flight booking assistant.
Your job is to help users find and book flights.
- Greet users warmly and ask how you can help with their travel plans
- When they want to search flights, ask for: origin, destination, and departure date
- IMPORTANT: Today is {today}. When user says \"tomorrow\", use {tomorrow}
- Departure dates must be {tomorrow} or later (no same-day bookings)
- Once you have all details, use the search_flights tool.
- NOTE: If using a test API key, \"Duffel Airways\" is the most reliable airline for booking testing. Recommend it if available.
- When user selects a flight (via \"Book Flight X\" message), the message will contain the Offer ID (e.g., \"ID: off_...\"). Extract this ID.
- First use get_offer to retrieve the latest offer AND the valid passenger_ids.
- Collect passenger details: given_name, family_name, email, phone_number, born_on (YYYY-MM-DD), gender (m/f), title (mr/mrs/ms/miss)
- IMPORTANT: Phone numbers MUST be in E.164 format (e.g., +14155552671). Ask user for country code if missing.
- Use the passenger_ids returned by get_offer - map them in order (first ID for first passenger, etc.). Do NOT make up IDs.
- Once you have all passenger details, use create_order to complete the booking
- Display booking confirmation with booking_reference when order is created successfully
- Be conversational and friendly throughout",
        today = today_str,
        tomorrow = tomorrow_str
    )
}

/// rig reports a reply with neither text nor tool calls as a response error
const EMPTY_REPLY: &str = "no message or tool call";

/// Model arguments usually arrive as an object, some providers send a JSON string
fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let parsed = match arguments {
        Value::String(raw) => serde_json::from_str(&raw),
        other => serde_json::from_value(other),
    };
    parsed.map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Chat loop wiring the model to the flight tools
pub struct FlightAssistant {
    client: openai::Client,
    model: String,
    temperature: f64,
    search: SearchFlightsTool,
    offer: GetOfferTool,
    order: CreateOrderTool,
}

impl FlightAssistant {
    pub fn new(config: &Config, duffel: DuffelClient) -> Self {
        let client = match &config.openai_base_url {
            Some(base_url) => openai::Client::from_url(&config.openai_api_key, base_url),
            None => openai::Client::new(&config.openai_api_key),
        };
        FlightAssistant {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            search: SearchFlightsTool::new(duffel.clone(), &config.chat_send_url),
            offer: GetOfferTool::new(duffel.clone()),
            order: CreateOrderTool::new(duffel),
        }
    }

    fn agent(&self, today: NaiveDate) -> Agent<CompletionModel> {
        self.client
            .agent(&self.model)
            .preamble(&system_preamble(today))
            .temperature(self.temperature)
            .tool(self.search.clone())
            .tool(self.offer.clone())
            .tool(self.order.clone())
            .build()
    }

    /// Answers the latest message of `messages`.
    ///
    /// Makes a single completion call. If the model picks a tool, that tool's
    /// display output is the answer and is not sent back to the model.
    /// Conversations that do not end on a user turn get the greeting.
    #[instrument(skip(self, messages), fields(turns = messages.len()))]
    pub async fn respond(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        let turns: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| m.role == "user" || m.role == "assistant")
            .collect();
        let Some((last, earlier)) = turns.split_last() else {
            return Ok(GREETING.to_string());
        };
        if last.role != "user" {
            info!("Last turn is not from the user, greeting instead");
            return Ok(GREETING.to_string());
        }
        let prompt = Message::user(last.content.clone());
        let history: Vec<Message> = earlier.iter().filter_map(|m| m.to_rig()).collect();

        let agent = self.agent(Local::now().date_naive());
        let response = match agent.completion(prompt, history).await?.send().await {
            Ok(response) => response,
            Err(CompletionError::ResponseError(message)) if message.contains(EMPTY_REPLY) => {
                warn!("Model returned an empty reply: {}", message);
                return Ok(GREETING.to_string());
            }
            Err(e) => return Err(e.into()),
        };

        let mut reply: Option<String> = None;
        for content in response.choice.iter() {
            if let AssistantContent::ToolCall(call) = content {
                info!("Model selected tool {}", call.function.name);
                if let Some(output) = self
                    .dispatch(&call.function.name, call.function.arguments.clone())
                    .await
                {
                    return Ok(output?);
                }
            } else if let AssistantContent::Text(text) = content {
                if reply.is_none() && !text.text.trim().is_empty() {
                    reply = Some(text.text.clone());
                }
            }
        }
        Ok(reply.unwrap_or_else(|| GREETING.to_string()))
    }

    /// Runs the tool named by the model; `None` when no tool has that name
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Option<Result<String, ToolError>> {
        let result = match name {
            n if n == SearchFlightsTool::NAME => match parse_args(arguments) {
                Ok(args) => self.search.call(args).await,
                Err(e) => Err(e),
            },
            n if n == GetOfferTool::NAME => match parse_args(arguments) {
                Ok(args) => self.offer.call(args).await,
                Err(e) => Err(e),
            },
            n if n == CreateOrderTool::NAME => match parse_args(arguments) {
                Ok(args) => self.order.call(args).await,
                Err(e) => Err(e),
            },
            unknown => {
                warn!("Skipping call to unknown tool {}", unknown);
                return None;
            }
        };
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        chat_completion, offer, offer_request, openai_router, spawn_mock, tool_call,
    };
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    fn config(duffel_base_url: &str) -> Config {
        Config {
            duffel_api_key: "duffel_test_key".to_string(),
            duffel_base_url: duffel_base_url.to_string(),
            openai_api_key: "sk-test".to_string(),
            openai_base_url: None,
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            bind_addr: "127.0.0.1:0".to_string(),
            chat_send_url: "https://cycls.com/send/".to_string(),
            auth_token: None,
        }
    }

    fn assistant(duffel_base_url: &str) -> FlightAssistant {
        let config = config(duffel_base_url);
        let duffel = DuffelClient::new(&config.duffel_base_url, &config.duffel_api_key).unwrap();
        FlightAssistant::new(&config, duffel)
    }

    /// Assistant talking to a local OpenAI stand-in
    async fn live_assistant(duffel_base_url: &str, openai: Router) -> FlightAssistant {
        let openai_base = spawn_mock(openai).await;
        let config = Config {
            openai_base_url: Some(format!("{}/v1", openai_base)),
            ..config(duffel_base_url)
        };
        let duffel = DuffelClient::new(&config.duffel_base_url, &config.duffel_api_key).unwrap();
        FlightAssistant::new(&config, duffel)
    }

    fn turn(role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_preamble_embeds_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        let preamble = system_preamble(today);
        assert!(preamble.contains("Today is 2026-12-31"));
        assert!(preamble.contains("use 2027-01-01"));
        assert!(preamble.contains("Departure dates must be 2027-01-01 or later"));
    }

    #[test]
    fn test_chat_message_conversion_skips_system() {
        assert!(turn("user", "hello").to_rig().is_some());
        assert!(turn("assistant", "hello").to_rig().is_some());
        assert!(turn("system", "ignore").to_rig().is_none());
    }

    #[test]
    fn test_parse_args_accepts_string_encoded_json() {
        let args: crate::tools::GetOfferArgs =
            parse_args(Value::String(r#"{"offer_id":"off_1"}"#.to_string())).unwrap();
        assert_eq!(args.offer_id, "off_1");

        let err = parse_args::<crate::tools::GetOfferArgs>(json!({"id": "off_1"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_empty_conversation_greets_without_model_call() {
        let reply = assistant("http://127.0.0.1:9").respond(&[]).await.unwrap();
        assert_eq!(reply, GREETING);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_and_malformed() {
        let assistant = assistant("http://127.0.0.1:9");
        assert!(assistant.dispatch("book_hotel", json!({})).await.is_none());

        let result = assistant
            .dispatch("search_flights", json!({"origin": "JFK"}))
            .await
            .unwrap();
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_dispatch_search_returns_cards() {
        let router = Router::new().route(
            "/air/offer_requests",
            post(|| async {
                Json(offer_request(vec![offer("off_1", "Duffel Airways", "ZZ", "99.00", vec![])]))
            }),
        );
        let base = spawn_mock(router).await;
        let html = assistant(&base)
            .dispatch(
                "search_flights",
                json!({"origin": "JFK", "destination": "LAX", "departure_date": "2026-11-02"}),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(html.contains("Found 1 options from JFK"));
    }

    #[tokio::test]
    async fn test_text_reply_answers_last_user_turn() {
        let (openai, seen) = openai_router(
            StatusCode::OK,
            chat_completion(json!({"role": "assistant", "content": "Which date would you like to fly?"})),
        );
        let assistant = live_assistant("http://127.0.0.1:9", openai).await;

        let reply = assistant
            .respond(&[
                turn("user", "I need a flight"),
                turn("assistant", "Where to?"),
                turn("system", "Answer in French"),
                turn("user", "JFK to LAX"),
            ])
            .await
            .unwrap();
        assert_eq!(reply, "Which date would you like to fly?");

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let sent = requests[0]["messages"].as_array().unwrap();
        // preamble, two earlier turns, prompt
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0]["role"], "system");
        assert_eq!(sent[3]["role"], "user");
        assert!(sent[3].to_string().contains("JFK to LAX"));
        assert!(!requests[0].to_string().contains("Answer in French"));
        assert_eq!(requests[0]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_trailing_assistant_turn_greets_without_model_call() {
        let (openai, seen) = openai_router(
            StatusCode::OK,
            chat_completion(json!({"role": "assistant", "content": "unused"})),
        );
        let assistant = live_assistant("http://127.0.0.1:9", openai).await;

        let reply = assistant
            .respond(&[turn("user", "Hi"), turn("assistant", "Hello! Where to?")])
            .await
            .unwrap();
        assert_eq!(reply, GREETING);

        let reply = assistant.respond(&[turn("system", "Be brief")]).await.unwrap();
        assert_eq!(reply, GREETING);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_model_reply_greets() {
        for content in [json!(""), Value::Null, json!("   ")] {
            let (openai, _) = openai_router(
                StatusCode::OK,
                chat_completion(json!({"role": "assistant", "content": content})),
            );
            let assistant = live_assistant("http://127.0.0.1:9", openai).await;
            let reply = assistant.respond(&[turn("user", "Hi")]).await.unwrap();
            assert_eq!(reply, GREETING, "content {}", content);
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_an_error() {
        let (openai, _) = openai_router(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": {"message": "The server had an error"}}),
        );
        let assistant = live_assistant("http://127.0.0.1:9", openai).await;

        let err = assistant.respond(&[turn("user", "Hi")]).await.unwrap_err();
        assert!(matches!(
            err,
            AssistantError::Completion(CompletionError::ProviderError(_))
        ));
    }

    #[tokio::test]
    async fn test_first_known_tool_call_wins() {
        let duffel = Router::new().route(
            "/air/offers/{id}",
            get(|| async {
                Json(json!({"data": {
                    "id": "off_live",
                    "total_amount": "245.10",
                    "total_currency": "GBP",
                    "passengers": [{"id": "pas_a"}]
                }}))
            }),
        );
        let duffel_base = spawn_mock(duffel).await;
        let (openai, _) = openai_router(
            StatusCode::OK,
            chat_completion(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    tool_call("call_1", "book_hotel", json!({"city": "Paris"})),
                    tool_call("call_2", "get_offer", json!({"offer_id": "off_live"})),
                    tool_call("call_3", "search_flights", json!({"origin": "", "destination": "LAX", "departure_date": "x"}))
                ]
            })),
        );
        let assistant = live_assistant(&duffel_base, openai).await;

        let reply = assistant
            .respond(&[turn("user", "Book Flight 1 (ID: off_live)")])
            .await
            .unwrap();
        assert!(reply.starts_with("✅ Offer retrieved successfully. Current price: 245.10 GBP."));
        assert!(reply.contains("['pas_a']"));
    }

    #[tokio::test]
    async fn test_malformed_tool_arguments_are_an_error() {
        let (openai, _) = openai_router(
            StatusCode::OK,
            chat_completion(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [tool_call("call_1", "search_flights", json!({"origin": "JFK"}))]
            })),
        );
        let assistant = live_assistant("http://127.0.0.1:9", openai).await;

        let err = assistant.respond(&[turn("user", "JFK")]).await.unwrap_err();
        assert!(matches!(err, AssistantError::Tool(ToolError::InvalidArguments(_))));
    }
}
