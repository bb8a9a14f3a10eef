use serde::Deserialize;
use thiserror::Error;

/// One entry of the `errors` array Duffel returns on failure
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl ApiErrorDetail {
    pub fn message(message: impl Into<String>) -> Self {
        ApiErrorDetail {
            message: message.into(),
            code: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DuffelError {
    #[error("HTTP request failed: {0}")]
    HttpRequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("API error ({status}): {}", first_message(.errors))]
    Api {
        status: u16,
        errors: Vec<ApiErrorDetail>,
    },
}

impl DuffelError {
    /// Message of the first provider error, or the error text itself
    pub fn first_message(&self) -> Option<String> {
        match self {
            DuffelError::Api { errors, .. } => errors.first().map(|e| e.message.clone()),
            DuffelError::HttpRequestFailed(msg) | DuffelError::InvalidResponse(msg) => {
                Some(msg.clone())
            }
        }
    }

    pub fn first_code(&self) -> Option<&str> {
        match self {
            DuffelError::Api { errors, .. } => errors.first().and_then(|e| e.code.as_deref()),
            _ => None,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            DuffelError::Api { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DuffelError::HttpRequestFailed(_) => "HttpRequestFailed",
            DuffelError::InvalidResponse(_) => "InvalidResponse",
            DuffelError::Api { .. } => "ApiError",
        }
    }
}

fn first_message(errors: &[ApiErrorDetail]) -> &str {
    errors.first().map(|e| e.message.as_str()).unwrap_or("")
}

/// Failures shown to the traveller, worded for the chat UI
#[derive(Debug, Error, PartialEq)]
pub enum BookingError {
    #[error(
        "❌ Sorry, the departure date must be in the future. Please choose a date starting from tomorrow or later."
    )]
    DepartureInPast,
    #[error("No flights found for your search criteria.")]
    NoFlights,
    #[error("❌ Offer may have expired. Error: {0}")]
    OfferExpired(String),
    #[error("❌ No offer data returned")]
    NoOfferData,
    #[error("❌ This offer has expired. Please search for flights again to get a fresh offer.")]
    ExpiredWithoutFallback,
    #[error(
        "❌ This flight offer has expired or is no longer available. In Test Mode, please try booking a 'Duffel Airways' flight for guaranteed success."
    )]
    OfferUnavailable,
    #[error("❌ {0}")]
    Provider(String),
}

impl BookingError {
    /// True when the offer could not be fetched because it is gone
    pub fn is_expired(&self) -> bool {
        matches!(self, BookingError::OfferExpired(_) | BookingError::NoOfferData)
    }

    /// Generic mapping used when no operation-specific case applies
    pub fn from_provider(error: &DuffelError) -> Self {
        match error {
            DuffelError::Api { errors, .. } if errors.is_empty() => {
                BookingError::Provider("Error: []".to_string())
            }
            _ => BookingError::Provider(error.first_message().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Completion failed: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
