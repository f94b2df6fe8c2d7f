use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};

use crate::config::StripeSettings;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: String,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AccountCreated {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AccountLink {
    url: String,
}

/// One card line item paid out to an instructor's connected account.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub unit_amount: i64,
    pub application_fee_amount: i64,
    pub destination_account: String,
    pub course_id: String,
}

impl CheckoutRequest {
    fn form(&self, settings: &StripeSettings) -> Vec<(String, String)> {
        vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), "usd".into()),
            (
                "line_items[0][price_data][product_data][name]".into(),
                self.product_name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                self.unit_amount.to_string(),
            ),
            (
                "payment_intent_data[application_fee_amount]".into(),
                self.application_fee_amount.to_string(),
            ),
            (
                "payment_intent_data[transfer_data][destination]".into(),
                self.destination_account.clone(),
            ),
            (
                "success_url".into(),
                format!("{}/{}", settings.success_url.trim_end_matches('/'), self.course_id),
            ),
            ("cancel_url".into(), settings.cancel_url.clone()),
        ]
    }
}

/// Thin form-encoded client over the card processor's REST API.
#[derive(Clone)]
pub struct StripeClient {
    settings: StripeSettings,
    http: Client,
}

impl StripeClient {
    pub fn new(settings: StripeSettings, http: Client) -> Self {
        Self { settings, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(String, String)]) -> AppResult<T> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.settings.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe request failed: {}", e)))?;
        Self::decode(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.settings.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe request failed: {}", e)))?;
        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(path, status = status.as_u16(), "Stripe error: {}", body);
            return Err(AppError::Upstream(format!(
                "Stripe rejected the request ({})",
                status
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Upstream(format!("Unexpected Stripe response: {}", e)))
    }

    pub async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        self.post("checkout/sessions", &request.form(&self.settings))
            .await
    }

    pub async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        self.get(&format!("checkout/sessions/{}", session_id)).await
    }

    /// Returns the new Express account id.
    pub async fn create_express_account(&self) -> AppResult<String> {
        let created: AccountCreated = self
            .post("accounts", &[("type".to_string(), "express".to_string())])
            .await?;
        Ok(created.id)
    }

    pub async fn create_onboarding_link(&self, account_id: &str) -> AppResult<String> {
        let form = [
            ("account".to_string(), account_id.to_string()),
            ("refresh_url".to_string(), self.settings.redirect_url.clone()),
            ("return_url".to_string(), self.settings.redirect_url.clone()),
            ("type".to_string(), "account_onboarding".to_string()),
        ];
        let link: AccountLink = self.post("account_links", &form).await?;
        Ok(link.url)
    }

    pub async fn retrieve_account(&self, account_id: &str) -> AppResult<serde_json::Value> {
        self.get(&format!("accounts/{}", account_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_form_routes_funds_to_instructor() {
        let settings = StripeSettings {
            secret_key: "sk_test".into(),
            api_base: "https://api.stripe.com".into(),
            success_url: "http://localhost:3000/stripe/success/".into(),
            cancel_url: "http://localhost:3000/stripe/cancel".into(),
            redirect_url: "http://localhost:3000/stripe/callback".into(),
        };
        let form = CheckoutRequest {
            product_name: "Rust | 240000 VND | $10.00".into(),
            unit_amount: 1000,
            application_fee_amount: 400,
            destination_account: "acct_1".into(),
            course_id: "c1".into(),
        }
        .form(&settings);

        let lookup = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(lookup("line_items[0][price_data][unit_amount]"), "1000");
        assert_eq!(lookup("payment_intent_data[application_fee_amount]"), "400");
        assert_eq!(lookup("payment_intent_data[transfer_data][destination]"), "acct_1");
        assert_eq!(lookup("success_url"), "http://localhost:3000/stripe/success/c1");
    }

    #[test]
    fn only_paid_sessions_count() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1", "url": null, "payment_status": "unpaid"
        }))
        .unwrap();
        assert!(!session.is_paid());
    }
}
