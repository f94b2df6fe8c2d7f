use axum_extra::extract::cookie::SameSite;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub port: u16,
    /// Public front-end URL used in activation links.
    pub client_url: String,
    pub cookie: CookieSettings,
    pub stripe: StripeSettings,
    pub vnpay: VnpaySettings,
    pub exchange: ExchangeRateSettings,
    pub pricing: PricingSettings,
    pub email: EmailSettings,
    pub object_storage: Option<ObjectStorageSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieSettings {
    pub secure: bool,
    pub same_site: String,
}

impl CookieSettings {
    pub fn parse_same_site(&self) -> SameSite {
        match self.same_site.to_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "none" => SameSite::None,
            _ => SameSite::Lax,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSettings {
    pub secret_key: String,
    pub api_base: String,
    /// Checkout success redirect; the course id is appended as a path segment.
    pub success_url: String,
    pub cancel_url: String,
    /// Connect onboarding return/refresh target.
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VnpaySettings {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub success_redirect: String,
    pub cancel_redirect: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRateSettings {
    pub url: String,
    pub app_id: String,
}

/// Marketplace economics. Percentages are 0-100, plan prices in VND.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingSettings {
    pub premium_discount_percent: f64,
    pub premium_fee_percent: f64,
    pub standard_fee_percent: f64,
    pub silver_plan_vnd: u64,
    pub gold_plan_vnd: u64,
    pub premium_plan_vnd: u64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            premium_discount_percent: 30.0,
            premium_fee_percent: 7.0,
            standard_fee_percent: 40.0,
            silver_plan_vnd: 500_000,
            gold_plan_vnd: 900_000,
            premium_plan_vnd: 1_500_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub use_tls: bool,
    pub from_name: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStorageSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub key_prefix: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__ overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = Lookup {
            settings: &settings,
        };

        let jwt_secret = match lookup.optional("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let client_url = lookup.string("client.url", "CLIENT_URL", "http://localhost:3000");

        let object_storage = match (
            lookup.optional("object_storage.bucket", "S3_BUCKET"),
            lookup.optional("object_storage.access_key", "S3_ACCESS_KEY"),
            lookup.optional("object_storage.secret_key", "S3_SECRET_KEY"),
        ) {
            (Some(bucket), Some(access_key), Some(secret_key)) => Some(ObjectStorageSettings {
                bucket,
                region: lookup.string("object_storage.region", "S3_REGION", "us-east-1"),
                endpoint: lookup.optional("object_storage.endpoint", "S3_ENDPOINT"),
                access_key,
                secret_key,
                key_prefix: lookup.string("object_storage.key_prefix", "S3_KEY_PREFIX", ""),
            }),
            _ => None,
        };

        let pricing_defaults = PricingSettings::default();

        Ok(Config {
            mongo_uri: lookup.string(
                "database.mongo_uri",
                "MONGO_URI",
                "mongodb://localhost:27017",
            ),
            redis_uri: lookup.string("redis.uri", "REDIS_URI", "redis://127.0.0.1:6379/0"),
            mongo_database: lookup.string("database.mongo_database", "MONGO_DATABASE", "nextgoal"),
            jwt_secret,
            token_ttl_days: lookup.number("auth.token_ttl_days", "TOKEN_TTL_DAYS", 7.0) as i64,
            port: lookup.number("server.port", "PORT", 8000.0) as u16,
            cookie: CookieSettings {
                secure: lookup.flag("cookie.secure", "COOKIE_SECURE", app_env == "prod"),
                same_site: lookup.string("cookie.same_site", "COOKIE_SAME_SITE", "lax"),
            },
            stripe: StripeSettings {
                secret_key: lookup.string("stripe.secret_key", "STRIPE_SECRET", ""),
                api_base: lookup.string("stripe.api_base", "STRIPE_API_BASE", "https://api.stripe.com"),
                success_url: lookup.string(
                    "stripe.success_url",
                    "STRIPE_SUCCESS_URL",
                    &format!("{}/stripe/success", client_url),
                ),
                cancel_url: lookup.string(
                    "stripe.cancel_url",
                    "STRIPE_CANCEL_URL",
                    &format!("{}/stripe/cancel", client_url),
                ),
                redirect_url: lookup.string(
                    "stripe.redirect_url",
                    "STRIPE_REDIRECT_URL",
                    &format!("{}/stripe/callback", client_url),
                ),
            },
            vnpay: VnpaySettings {
                tmn_code: lookup.string("vnpay.tmn_code", "VNP_TMN_CODE", ""),
                hash_secret: lookup.string("vnpay.hash_secret", "VNP_HASH_SECRET", ""),
                pay_url: lookup.string(
                    "vnpay.pay_url",
                    "VNP_URL",
                    "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html",
                ),
                return_url: lookup.string(
                    "vnpay.return_url",
                    "VNP_RETURN_URL",
                    "http://localhost:8000/api/payment/vnpay_return",
                ),
                success_redirect: lookup.string(
                    "vnpay.success_redirect",
                    "VNP_SUCCESS_REDIRECT",
                    &format!("{}/payment/success", client_url),
                ),
                cancel_redirect: lookup.string(
                    "vnpay.cancel_redirect",
                    "VNP_CANCEL_REDIRECT",
                    &format!("{}/payment/cancel", client_url),
                ),
            },
            exchange: ExchangeRateSettings {
                url: lookup.string(
                    "exchange.url",
                    "EXCHANGE_RATE_URL",
                    "https://openexchangerates.org/api/latest.json",
                ),
                app_id: lookup.string("exchange.app_id", "EXCHANGE_RATE_APP_ID", ""),
            },
            pricing: PricingSettings {
                premium_discount_percent: lookup.number(
                    "pricing.premium_discount_percent",
                    "PREMIUM_DISCOUNT_PERCENT",
                    pricing_defaults.premium_discount_percent,
                ),
                premium_fee_percent: lookup.number(
                    "pricing.premium_fee_percent",
                    "PREMIUM_FEE_PERCENT",
                    pricing_defaults.premium_fee_percent,
                ),
                standard_fee_percent: lookup.number(
                    "pricing.standard_fee_percent",
                    "STANDARD_FEE_PERCENT",
                    pricing_defaults.standard_fee_percent,
                ),
                silver_plan_vnd: lookup.number(
                    "pricing.silver_plan_vnd",
                    "SILVER_PLAN_VND",
                    pricing_defaults.silver_plan_vnd as f64,
                ) as u64,
                gold_plan_vnd: lookup.number(
                    "pricing.gold_plan_vnd",
                    "GOLD_PLAN_VND",
                    pricing_defaults.gold_plan_vnd as f64,
                ) as u64,
                premium_plan_vnd: lookup.number(
                    "pricing.premium_plan_vnd",
                    "PREMIUM_PLAN_VND",
                    pricing_defaults.premium_plan_vnd as f64,
                ) as u64,
            },
            email: EmailSettings {
                server: lookup.string("email.server", "SMTP_SERVER", "localhost"),
                port: lookup.number("email.port", "SMTP_PORT", 587.0) as u16,
                login: lookup.string("email.login", "SMTP_LOGIN", ""),
                password: lookup.string("email.password", "SMTP_PASSWORD", ""),
                use_tls: lookup.flag("email.use_tls", "SMTP_TLS", true),
                from_name: lookup.string("email.from_name", "EMAIL_FROM_NAME", "NextGoal"),
                from_email: lookup.string(
                    "email.from_email",
                    "EMAIL_FROM",
                    "no-reply@nextgoal.local",
                ),
            },
            object_storage,
            client_url,
        })
    }
}

/// Resolves a key from the layered settings, then a plain env var.
struct Lookup<'a> {
    settings: &'a config::Config,
}

impl Lookup<'_> {
    fn optional(&self, key: &str, env_key: &str) -> Option<String> {
        self.settings
            .get_string(key)
            .ok()
            .or_else(|| env::var(env_key).ok())
            .filter(|value| !value.trim().is_empty())
    }

    fn string(&self, key: &str, env_key: &str, default: &str) -> String {
        self.optional(key, env_key)
            .unwrap_or_else(|| default.to_string())
    }

    fn number(&self, key: &str, env_key: &str, default: f64) -> f64 {
        self.optional(key, env_key)
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, env_key: &str, default: bool) -> bool {
        self.optional(key, env_key)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn loads_with_dev_defaults() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::remove_var("APP_ENV");
        let config = Config::load().unwrap();
        assert_eq!(config.token_ttl_days, 7);
        assert_eq!(config.pricing.premium_fee_percent, 7.0);
        assert!(!config.jwt_secret.is_empty());
    }

    #[test]
    #[serial_test::serial]
    fn prod_requires_jwt_secret() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("APP_ENV", "prod");
        env::remove_var("JWT_SECRET");
        let result = Config::load();
        env::remove_var("APP_ENV");
        assert!(result.is_err());
    }

    #[test]
    fn same_site_parsing_defaults_to_lax() {
        let cookie = CookieSettings {
            secure: false,
            same_site: "whatever".into(),
        };
        assert_eq!(cookie.parse_same_site(), SameSite::Lax);
    }
}
