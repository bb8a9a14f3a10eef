use crate::duffel::DuffelClient;
use crate::error::ToolError;
use crate::flights::{self, Passenger};
use crate::metrics::inc_tool_call;
use crate::render;
use chrono::NaiveDate;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Arguments the model supplies for `search_flights`
#[derive(Debug, Deserialize, Default)]
pub struct SearchFlightsArgs {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    #[serde(default = "one_passenger")]
    pub passengers: u32,
}

fn one_passenger() -> u32 {
    1
}

#[derive(Debug, Deserialize, Default)]
pub struct GetOfferArgs {
    pub offer_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateOrderArgs {
    pub offer_id: String,
    pub passengers: Vec<Passenger>,
    #[serde(default = "balance_payment")]
    pub payment_type: String,
    #[serde(default, deserialize_with = "amount_as_string")]
    pub total_amount: Option<String>,
    #[serde(default)]
    pub total_currency: Option<String>,
}

fn balance_payment() -> String {
    "balance".to_string()
}

/// Accepts `412.5` as well as `"412.50"`
fn amount_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        _ => Ok(None),
    }
}

fn airport_code(field: &str, value: &str) -> Result<String, ToolError> {
    let code = value.trim().to_uppercase();
    if code.is_empty() {
        return Err(ToolError::InvalidArguments(format!("{} must not be empty", field)));
    }
    Ok(code)
}

#[derive(Debug, Clone)]
pub struct SearchFlightsTool {
    client: DuffelClient,
    send_url: String,
}

impl SearchFlightsTool {
    pub fn new(client: DuffelClient, send_url: &str) -> Self {
        SearchFlightsTool {
            client,
            send_url: send_url.to_string(),
        }
    }
}

impl Tool for SearchFlightsTool {
    const NAME: &'static str = "search_flights";
    type Error = ToolError;
    type Args = SearchFlightsArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search for flights between two airports on a specific date".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "origin": { "type": "string", "description": "Origin airport code (e.g., 'JFK', 'CAI')" },
                    "destination": { "type": "string", "description": "Destination airport code (e.g., 'LAX', 'JFK')" },
                    "departure_date": { "type": "string", "description": "Date in YYYY-MM-DD format (must be tomorrow or later)" },
                    "passengers": {
                        "type": "integer",
                        "description": "Number of passengers",
                        "default": 1,
                        "minimum": 1,
                        "maximum": flights::MAX_PASSENGERS
                    }
                },
                "required": ["origin", "destination", "departure_date"]
            }),
        }
    }

    #[instrument(name = "call_search_flights_tool", skip(self))]
    async fn call(&self, args: SearchFlightsArgs) -> Result<String, ToolError> {
        inc_tool_call(Self::NAME);
        let origin = airport_code("origin", &args.origin)?;
        let destination = airport_code("destination", &args.destination)?;
        let departure_date = args.departure_date.trim();
        NaiveDate::parse_from_str(departure_date, DATE_FORMAT).map_err(|_| {
            ToolError::InvalidArguments(format!(
                "departure_date '{}' is not in YYYY-MM-DD format",
                departure_date
            ))
        })?;
        if args.passengers == 0 || args.passengers > flights::MAX_PASSENGERS {
            return Err(ToolError::InvalidArguments(format!(
                "passengers must be between 1 and {}, got {}",
                flights::MAX_PASSENGERS,
                args.passengers
            )));
        }

        let output = match flights::search_flights(
            &self.client,
            &origin,
            &destination,
            departure_date,
            args.passengers,
        )
        .await
        {
            Ok(search) => {
                info!(
                    offer_request_id = %search.offer_request_id,
                    passenger_ids = ?search.passenger_ids,
                    "Rendering {} flight offers",
                    search.flights.len()
                );
                render::flight_cards(&search, &self.send_url)
            }
            Err(e) => {
                info!("Flight search did not succeed: {}", e);
                render::error_block(&e.to_string())
            }
        };
        Ok(output)
    }
}

#[derive(Debug, Clone)]
pub struct GetOfferTool {
    client: DuffelClient,
}

impl GetOfferTool {
    pub fn new(client: DuffelClient) -> Self {
        GetOfferTool { client }
    }
}

impl Tool for GetOfferTool {
    const NAME: &'static str = "get_offer";
    type Error = ToolError;
    type Args = GetOfferArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Retrieve the latest version of an offer to get up-to-date pricing and passenger IDs before booking".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "offer_id": { "type": "string", "description": "The offer ID from search results" }
                },
                "required": ["offer_id"]
            }),
        }
    }

    #[instrument(name = "call_get_offer_tool", skip(self))]
    async fn call(&self, args: GetOfferArgs) -> Result<String, ToolError> {
        inc_tool_call(Self::NAME);
        let offer_id = args.offer_id.trim();
        if offer_id.is_empty() {
            return Err(ToolError::InvalidArguments(
                "offer_id must not be empty".to_string(),
            ));
        }

        let output = match flights::get_offer(&self.client, offer_id).await {
            Ok(offer) => {
                debug!(offer = %offer.offer, "Retrieved offer");
                render::offer_retrieved(&offer)
            }
            Err(e) if e.is_expired() => render::offer_expired_notice(&e.to_string()),
            Err(e) => render::error_block(&e.to_string()),
        };
        Ok(output)
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrderTool {
    client: DuffelClient,
}

impl CreateOrderTool {
    pub fn new(client: DuffelClient) -> Self {
        CreateOrderTool { client }
    }
}

impl Tool for CreateOrderTool {
    const NAME: &'static str = "create_order";
    type Error = ToolError;
    type Args = CreateOrderArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Create a booking order for a selected flight offer".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "offer_id": { "type": "string", "description": "The offer ID to book" },
                    "passengers": {
                        "type": "array",
                        "description": "Array of passenger objects",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string", "description": "The passenger ID from the get_offer response" },
                                "given_name": { "type": "string" },
                                "family_name": { "type": "string" },
                                "gender": { "type": "string", "enum": ["m", "f"] },
                                "title": { "type": "string", "enum": ["mr", "ms", "mrs", "miss", "dr"] },
                                "born_on": { "type": "string", "description": "YYYY-MM-DD" },
                                "email": { "type": "string" },
                                "phone_number": { "type": "string", "description": "E.164 format (e.g. +14155552671)" }
                            },
                            "required": ["id", "given_name", "family_name", "gender", "born_on", "email", "phone_number"]
                        }
                    },
                    "payment_type": { "type": "string", "description": "Payment type: 'balance' or 'arc_bsp_cash'", "default": "balance" },
                    "total_amount": { "type": "number", "description": "Total amount from offer" },
                    "total_currency": { "type": "string", "description": "Currency code" }
                },
                "required": ["offer_id", "passengers"]
            }),
        }
    }

    #[instrument(name = "call_create_order_tool", skip(self, args), fields(offer_id = %args.offer_id))]
    async fn call(&self, args: CreateOrderArgs) -> Result<String, ToolError> {
        inc_tool_call(Self::NAME);
        let offer_id = args.offer_id.trim();
        if offer_id.is_empty() {
            return Err(ToolError::InvalidArguments(
                "offer_id must not be empty".to_string(),
            ));
        }
        if args.passengers.is_empty() {
            return Err(ToolError::InvalidArguments(
                "at least one passenger is required".to_string(),
            ));
        }

        let output = match flights::create_order(
            &self.client,
            offer_id,
            &args.passengers,
            &args.payment_type,
            args.total_amount.clone(),
            args.total_currency.clone(),
        )
        .await
        {
            Ok(order) => {
                debug!(order = %order.order, "Order created");
                render::booking_confirmed(&order)
            }
            Err(e) => render::error_block(&e.to_string()),
        };
        Ok(output)
    }
}
