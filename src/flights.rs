use crate::duffel::DuffelClient;
use crate::error::{BookingError, DuffelError};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

const MAX_RESULTS: usize = 5;
/// Duffel rejects offer requests with more passengers than this
pub const MAX_PASSENGERS: u32 = 9;
const SANDBOX_AIRLINE_NAME: &str = "Duffel Airways";
const SANDBOX_AIRLINE_IATA: &str = "ZZ";

/// One offer as shown to the traveller
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlightSummary {
    pub offer_id: String,
    pub airline: String,
    pub price: String,
    pub total_amount: String,
    pub total_currency: String,
    pub duration: String,
    pub stops: usize,
    pub departure: String,
    pub arrival: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightSearch {
    pub flights: Vec<FlightSummary>,
    pub origin: String,
    pub destination: String,
    pub passenger_ids: Vec<String>,
    pub offer_request_id: String,
}

#[derive(Debug, Clone)]
pub struct OfferDetails {
    pub offer: Value,
    pub total_amount: Option<String>,
    pub total_currency: Option<String>,
    pub passenger_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub order: Value,
    pub booking_reference: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passenger {
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    pub gender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub born_on: String,
    pub email: String,
    pub phone_number: String,
    /// Any further fields the model supplied, forwarded to Duffel as is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Duffel response shapes, lenient on everything the summary does not need

#[derive(Debug, Default, Deserialize)]
struct OfferRequestData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    passengers: Vec<PassengerRef>,
    #[serde(default)]
    offers: Vec<Offer>,
}

#[derive(Debug, Default, Deserialize)]
struct PassengerRef {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Offer {
    #[serde(default)]
    id: String,
    #[serde(default)]
    owner: Owner,
    #[serde(default)]
    total_amount: String,
    #[serde(default)]
    total_currency: String,
    #[serde(default)]
    slices: Vec<Slice>,
}

#[derive(Debug, Default, Deserialize)]
struct Owner {
    #[serde(default)]
    name: String,
    #[serde(default)]
    iata_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Slice {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Default, Deserialize)]
struct Segment {
    #[serde(default)]
    departing_at: Option<String>,
    #[serde(default)]
    arriving_at: Option<String>,
}

impl Offer {
    fn is_sandbox_airline(&self) -> bool {
        self.owner.name == SANDBOX_AIRLINE_NAME
            || self.owner.iata_code.as_deref() == Some(SANDBOX_AIRLINE_IATA)
    }

    fn summarize(&self) -> FlightSummary {
        let first_slice = self.slices.first();
        let segments = first_slice.map(|s| s.segments.as_slice()).unwrap_or(&[]);
        FlightSummary {
            offer_id: self.id.clone(),
            airline: self.owner.name.clone(),
            price: format!("{} {}", self.total_amount, self.total_currency),
            total_amount: self.total_amount.clone(),
            total_currency: self.total_currency.clone(),
            duration: first_slice
                .and_then(|s| s.duration.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            // A slice without segments counts as a direct flight
            stops: segments.len().saturating_sub(1),
            departure: clock_time(segments.first().and_then(|s| s.departing_at.as_deref())),
            arrival: clock_time(segments.last().and_then(|s| s.arriving_at.as_deref())),
        }
    }
}

/// `HH:MM` part of an ISO-8601 timestamp, or "N/A"
fn clock_time(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(|ts| ts.split_once('T'))
        .map(|(_, time)| time.chars().take(5).collect())
        .unwrap_or_else(|| "N/A".to_string())
}

fn passenger_ids(data: &Value) -> Vec<String> {
    data.get("passengers")
        .and_then(|p| p.as_array())
        .map(|passengers| {
            passengers
                .iter()
                .filter_map(|p| p.get("id").and_then(|id| id.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn json_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[instrument(skip(client))]
pub async fn search_flights(
    client: &DuffelClient,
    origin: &str,
    destination: &str,
    departure_date: &str,
    passengers: u32,
) -> Result<FlightSearch, BookingError> {
    let travellers = vec![json!({"type": "adult"}); passengers as usize];
    let payload = json!({
        "data": {
            "slices": [{
                "origin": origin,
                "destination": destination,
                "departure_date": departure_date
            }],
            "passengers": travellers,
            "cabin_class": "economy"
        }
    });
    let result = client
        .request("air/offer_requests", Method::POST, Some(&payload))
        .await
        .map_err(|e| search_error(&e))?;

    let data: OfferRequestData = result
        .get("data")
        .filter(|data| !data.is_null())
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| BookingError::Provider(format!("Unexpected offer response: {}", e)))?
        .unwrap_or_default();

    if data.offers.is_empty() {
        return Err(BookingError::NoFlights);
    }

    let mut offers = data.offers;
    // Stable sort keeps the provider's order within each group
    offers.sort_by_key(|offer| !offer.is_sandbox_airline());
    let flights: Vec<FlightSummary> = offers
        .iter()
        .take(MAX_RESULTS)
        .map(Offer::summarize)
        .collect();

    info!("Found {} flights from {} to {}", flights.len(), origin, destination);
    Ok(FlightSearch {
        flights,
        origin: origin.to_string(),
        destination: destination.to_string(),
        passenger_ids: data.passengers.into_iter().filter_map(|p| p.id).collect(),
        offer_request_id: data.id,
    })
}

fn search_error(error: &DuffelError) -> BookingError {
    match error.first_message() {
        Some(message) if message.contains("must be after") => BookingError::DepartureInPast,
        _ => BookingError::from_provider(error),
    }
}

#[instrument(skip(client))]
pub async fn get_offer(client: &DuffelClient, offer_id: &str) -> Result<OfferDetails, BookingError> {
    // The id comes from the model, keep it a single path segment
    let endpoint = format!("air/offers/{}", urlencoding::encode(offer_id));
    let result = client
        .request(&endpoint, Method::GET, None)
        .await
        .map_err(|e| offer_error(&e))?;

    let offer = match result.get("data") {
        Some(data) if !is_empty_json(data) => data.clone(),
        _ => return Err(BookingError::NoOfferData),
    };

    Ok(OfferDetails {
        total_amount: json_string(offer.get("total_amount")),
        total_currency: json_string(offer.get("total_currency")),
        passenger_ids: passenger_ids(&offer),
        offer,
    })
}

fn offer_error(error: &DuffelError) -> BookingError {
    match error.first_message() {
        Some(message) => {
            let lowered = message.to_lowercase();
            if lowered.contains("does not exist") || lowered.contains("not found") {
                BookingError::OfferExpired(message)
            } else {
                BookingError::from_provider(error)
            }
        }
        None => BookingError::from_provider(error),
    }
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Books `offer_id`, re-pricing it first.
///
/// The amounts from a fresh `get_offer` win over the supplied ones. When the
/// offer is gone the supplied amounts are used, and without them booking is
/// refused.
#[instrument(skip(client, passengers))]
pub async fn create_order(
    client: &DuffelClient,
    offer_id: &str,
    passengers: &[Passenger],
    payment_type: &str,
    total_amount: Option<String>,
    total_currency: Option<String>,
) -> Result<OrderConfirmation, BookingError> {
    let (amount, currency) = match get_offer(client, offer_id).await {
        Ok(offer) => (offer.total_amount, offer.total_currency),
        Err(e) if e.is_expired() && (total_amount.is_none() || total_currency.is_none()) => {
            return Err(BookingError::ExpiredWithoutFallback);
        }
        Err(e) => {
            warn!("Could not refresh offer {}, using supplied price: {}", offer_id, e);
            (total_amount, total_currency)
        }
    };

    let payload = json!({
        "data": {
            "selected_offers": [offer_id],
            "payments": [{
                "type": payment_type,
                "currency": currency,
                "amount": amount
            }],
            "passengers": passengers
        }
    });
    let result = client
        .request("air/orders", Method::POST, Some(&payload))
        .await
        .map_err(|e| order_error(&e))?;

    let order = result.get("data").cloned().unwrap_or(Value::Null);
    let booking_reference = json_string(order.get("booking_reference"));
    let order_id = json_string(order.get("id"));
    info!("Created order {:?} with reference {:?}", order_id, booking_reference);
    Ok(OrderConfirmation {
        order,
        booking_reference,
        order_id,
    })
}

fn order_error(error: &DuffelError) -> BookingError {
    match error.first_code() {
        Some("offer_no_longer_available") => BookingError::OfferUnavailable,
        _ => BookingError::from_provider(error),
    }
}
