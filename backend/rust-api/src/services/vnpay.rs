use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha512;

use crate::config::VnpaySettings;
use crate::errors::{AppError, AppResult};
use crate::utils::time::vnpay_timestamp;

type HmacSha512 = Hmac<Sha512>;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
const ORDER_TYPE: &str = "250000";

fn encode(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT)
        .to_string()
        .replace("%20", "+")
}

/// Sorted `k=v&...` with both sides encoded; this string is what gets signed.
pub fn canonicalize(params: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (encode(key), encode(value)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// What the buyer is paying for.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub txn_ref: String,
    pub amount_vnd: u64,
    pub order_info: String,
    pub locale: Option<String>,
    pub bank_code: Option<String>,
    pub client_ip: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct VnpayGateway {
    settings: VnpaySettings,
}

impl VnpayGateway {
    pub fn new(settings: VnpaySettings) -> Self {
        Self { settings }
    }

    fn mac(&self) -> AppResult<HmacSha512> {
        HmacSha512::new_from_slice(self.settings.hash_secret.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid VNPay secret: {}", e)))
    }

    pub fn sign(&self, params: &BTreeMap<String, String>) -> AppResult<String> {
        let mut mac = self.mac()?;
        mac.update(canonicalize(params).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks `vnp_SecureHash` against the remaining parameters.
    pub fn verify(&self, params: &BTreeMap<String, String>) -> bool {
        let Some(provided) = params.get(SECURE_HASH) else {
            return false;
        };
        let Ok(provided) = hex::decode(provided.to_ascii_lowercase()) else {
            return false;
        };

        let mut unsigned = params.clone();
        unsigned.remove(SECURE_HASH);
        unsigned.remove(SECURE_HASH_TYPE);

        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(canonicalize(&unsigned).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }

    pub fn build_payment_url(&self, request: &PaymentRequest) -> AppResult<String> {
        let locale = request
            .locale
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or("vn");

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), "2.1.0".to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.settings.tmn_code.clone());
        params.insert("vnp_Locale".to_string(), locale.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), request.txn_ref.clone());
        params.insert("vnp_OrderInfo".to_string(), request.order_info.clone());
        params.insert("vnp_OrderType".to_string(), ORDER_TYPE.to_string());
        params.insert(
            "vnp_Amount".to_string(),
            (request.amount_vnd * 100).to_string(),
        );
        params.insert("vnp_ReturnUrl".to_string(), self.settings.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), request.client_ip.clone());
        params.insert(
            "vnp_CreateDate".to_string(),
            vnpay_timestamp(request.created_at),
        );
        if let Some(bank_code) = request.bank_code.as_deref().filter(|c| !c.is_empty()) {
            params.insert("vnp_BankCode".to_string(), bank_code.to_string());
        }

        let signature = self.sign(&params)?;
        Ok(format!(
            "{}?{}&{}={}",
            self.settings.pay_url,
            canonicalize(&params),
            SECURE_HASH,
            signature
        ))
    }

    /// Where the browser lands after the gateway's return redirect.
    pub fn return_redirect(&self, params: &BTreeMap<String, String>) -> &str {
        let paid = params.get("vnp_ResponseCode").map(String::as_str) == Some("00");
        if self.verify(params) && paid {
            &self.settings.success_redirect
        } else {
            &self.settings.cancel_redirect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpaySettings {
            tmn_code: "DEMO0001".into(),
            hash_secret: "SECRETKEY".into(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost:8000/api/payment/vnpay_return".into(),
            success_redirect: "http://localhost:3000/vnpay/success".into(),
            cancel_redirect: "http://localhost:3000/vnpay/cancel".into(),
        })
    }

    fn sample() -> BTreeMap<String, String> {
        [
            ("vnp_TxnRef", "20240101120000"),
            ("vnp_Amount", "50000000"),
            ("vnp_TmnCode", "DEMO0001"),
            ("vnp_OrderInfo", "Membership gold plan"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn canonical_string_sorts_and_encodes() {
        assert_eq!(
            canonicalize(&sample()),
            "vnp_Amount=50000000&vnp_OrderInfo=Membership+gold+plan&vnp_TmnCode=DEMO0001&vnp_TxnRef=20240101120000"
        );

        let mut params = BTreeMap::new();
        params.insert("vnp_ReturnUrl".to_string(), "https://a.b/c?d=e".to_string());
        params.insert("vnp_OrderInfo".to_string(), "it's (ok)!".to_string());
        assert_eq!(
            canonicalize(&params),
            "vnp_OrderInfo=it's+(ok)!&vnp_ReturnUrl=https%3A%2F%2Fa.b%2Fc%3Fd%3De"
        );
    }

    #[test]
    fn signs_with_hmac_sha512() {
        assert_eq!(
            gateway().sign(&sample()).unwrap(),
            "e079489d690085e6476427a3fd27a5e70fe3037ff64f5b5376b4be8b4a295fe29ab3b40e94a98c9585f32f7eb917b2bbcc195ad33cad21d887fd569f2c842d25"
        );
    }

    #[test]
    fn verifies_and_rejects_tampering() {
        let gateway = gateway();
        let mut params = sample();
        let signature = gateway.sign(&params).unwrap();
        params.insert(SECURE_HASH.to_string(), signature.to_uppercase());
        params.insert(SECURE_HASH_TYPE.to_string(), "HmacSHA512".to_string());
        assert!(gateway.verify(&params));

        params.insert("vnp_Amount".to_string(), "100".to_string());
        assert!(!gateway.verify(&params));

        let mut unsigned = sample();
        assert!(!gateway.verify(&unsigned));
        unsigned.insert(SECURE_HASH.to_string(), "not-hex".to_string());
        assert!(!gateway.verify(&unsigned));
    }

    #[test]
    fn payment_url_carries_a_valid_signature() {
        let gateway = gateway();
        let url = gateway
            .build_payment_url(&PaymentRequest {
                txn_ref: "T1".into(),
                amount_vnd: 900_000,
                order_info: "Gold membership".into(),
                locale: Some(String::new()),
                bank_code: None,
                client_ip: "127.0.0.1".into(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap(),
            })
            .unwrap();

        let parsed = url::Url::parse(&url).unwrap();
        let params: BTreeMap<String, String> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(params["vnp_Amount"], "90000000");
        assert_eq!(params["vnp_Locale"], "vn");
        assert_eq!(params["vnp_CreateDate"], "20240101120000");
        assert!(gateway.verify(&params));
    }

    #[test]
    fn return_redirect_requires_signature_and_success_code() {
        let gateway = gateway();
        let mut params = sample();
        params.insert("vnp_ResponseCode".to_string(), "00".to_string());
        let signature = gateway.sign(&params).unwrap();
        params.insert(SECURE_HASH.to_string(), signature);
        assert_eq!(gateway.return_redirect(&params), "http://localhost:3000/vnpay/success");

        params.insert("vnp_ResponseCode".to_string(), "24".to_string());
        assert_eq!(gateway.return_redirect(&params), "http://localhost:3000/vnpay/cancel");
    }
}
