use crate::error::{ApiErrorDetail, DuffelError};
use crate::metrics::{inc_duffel_request_error, inc_duffel_request_success};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const DUFFEL_VERSION: &str = "v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    errors: Vec<ApiErrorDetail>,
}

/// Thin client over the Duffel REST API
#[derive(Debug, Clone)]
pub struct DuffelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DuffelClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, DuffelError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DuffelError::HttpRequestFailed(e.to_string()))?;
        Ok(DuffelClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, DuffelError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| DuffelError::HttpRequestFailed(format!("Invalid API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Duffel-Version", HeaderValue::from_static(DUFFEL_VERSION));
        Ok(headers)
    }

    /// Sends one request and returns the decoded JSON body.
    ///
    /// Any status of 400 or above becomes [`DuffelError::Api`], carrying the
    /// provider's `errors` array when the body has one.
    #[instrument(skip(self, payload))]
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        payload: Option<&Value>,
    ) -> Result<Value, DuffelError> {
        let result = self.send(endpoint, method, payload).await;
        match &result {
            Ok(_) => inc_duffel_request_success(),
            Err(e) => inc_duffel_request_error(e),
        }
        result
    }

    async fn send(
        &self,
        endpoint: &str,
        method: Method,
        payload: Option<&Value>,
    ) -> Result<Value, DuffelError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        info!("Calling Duffel API: {} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .headers(self.headers()?);
        if method == Method::POST {
            if let Some(payload) = payload {
                request = request.json(payload);
            }
        }
        let response = request
            .send()
            .await
            .map_err(|e| DuffelError::HttpRequestFailed(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DuffelError::HttpRequestFailed(e.to_string()))?;

        if status.as_u16() >= 400 {
            error!("Duffel API call failed with status {}: {}", status, text);
            return Err(api_error(status.as_u16(), &text));
        }

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| DuffelError::InvalidResponse(e.to_string()))?;
        debug!("Duffel response from {}: {:?}", endpoint, data);
        Ok(data)
    }
}

fn api_error(status: u16, body: &str) -> DuffelError {
    let errors = match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload.errors,
        Err(_) => vec![ApiErrorDetail::message(format!("HTTP {}: {}", status, body))],
    };
    DuffelError::Api { status, errors }
}
