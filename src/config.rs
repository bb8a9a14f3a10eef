use crate::error::ConfigError;
use std::env;

pub const DEFAULT_DUFFEL_BASE_URL: &str = "https://api.duffel.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CHAT_SEND_URL: &str = "https://cycls.com/send/";

/// Runtime settings, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub duffel_api_key: String,
    pub duffel_base_url: String,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub bind_addr: String,
    pub chat_send_url: String,
    pub auth_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let temperature = match get("OPENAI_TEMPERATURE") {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| ConfigError::Invalid {
                key: "OPENAI_TEMPERATURE",
                value: raw.clone(),
            })?,
            None => DEFAULT_TEMPERATURE,
        };
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                key: "OPENAI_TEMPERATURE",
                value: temperature.to_string(),
            });
        }

        Ok(Config {
            duffel_api_key: required("DUFFEL_API_KEY")?,
            duffel_base_url: get("DUFFEL_BASE_URL")
                .unwrap_or_else(|| DEFAULT_DUFFEL_BASE_URL.to_string()),
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: get("OPENAI_BASE_URL"),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            chat_send_url: get("CHAT_SEND_URL")
                .unwrap_or_else(|| DEFAULT_CHAT_SEND_URL.to_string()),
            auth_token: get("ASSISTANT_AUTH_TOKEN"),
        })
    }
}
