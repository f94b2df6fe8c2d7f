use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::ExchangeRateSettings;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct LatestRates {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

impl LatestRates {
    fn vnd(&self) -> AppResult<f64> {
        match self.rates.get("VND") {
            Some(rate) if rate.is_finite() && *rate > 0.0 => Ok(*rate),
            _ => Err(AppError::Upstream(
                "Exchange rate service returned no VND rate".to_string(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct ExchangeRateClient {
    settings: ExchangeRateSettings,
    http: Client,
}

impl ExchangeRateClient {
    pub fn new(settings: ExchangeRateSettings, http: Client) -> Self {
        Self { settings, http }
    }

    /// How many VND one USD buys right now.
    pub async fn usd_to_vnd(&self) -> AppResult<f64> {
        let response = self
            .http
            .get(&self.settings.url)
            .query(&[("app_id", self.settings.app_id.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Upstream(format!("Exchange rate request failed: {}", e)))?;

        let rates: LatestRates = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Unexpected exchange rate response: {}", e)))?;
        let rate = rates.vnd()?;
        tracing::debug!(rate, "Fetched USD/VND rate");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: serde_json::Value) -> LatestRates {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn reads_vnd_rate() {
        let rates = parse(serde_json::json!({ "base": "USD", "rates": { "VND": 24000.5 } }));
        assert_eq!(rates.vnd().unwrap(), 24000.5);
    }

    #[test]
    fn missing_or_bad_rate_is_upstream_error() {
        assert!(matches!(
            parse(serde_json::json!({ "rates": {} })).vnd(),
            Err(AppError::Upstream(_))
        ));
        assert!(matches!(
            parse(serde_json::json!({ "rates": { "VND": 0.0 } })).vnd(),
            Err(AppError::Upstream(_))
        ));
    }
}
