use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::PricingSettings;
use crate::errors::{AppError, AppResult};
use crate::utils::time::millis_to_chrono;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Silver,
    Gold,
    Premium,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Silver => "silver",
            PlanType::Gold => "gold",
            PlanType::Premium => "premium",
        }
    }

    pub fn validity_months(&self) -> u32 {
        match self {
            PlanType::Silver => 3,
            PlanType::Gold => 6,
            PlanType::Premium => 12,
        }
    }

    pub fn price_vnd(&self, pricing: &PricingSettings) -> u64 {
        match self {
            PlanType::Silver => pricing.silver_plan_vnd,
            PlanType::Gold => pricing.gold_plan_vnd,
            PlanType::Premium => pricing.premium_plan_vnd,
        }
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "silver" => Ok(PlanType::Silver),
            "gold" => Ok(PlanType::Gold),
            "premium" => Ok(PlanType::Premium),
            _ => Err(format!("Invalid plan type: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructorInformation {
    pub plan_type: Option<PlanType>,
    /// Unix millis.
    pub plan_start: Option<i64>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub position: String,
    pub yoe: Option<u32>,
    #[serde(default)]
    pub social: SocialLinks,
}

impl InstructorInformation {
    pub fn plan_expires_at(&self) -> Option<DateTime<Utc>> {
        let plan = self.plan_type?;
        let start = millis_to_chrono(self.plan_start?)?;
        start.checked_add_months(Months::new(plan.validity_months()))
    }

    /// Plan currently in force, if any.
    pub fn active_plan(&self, now: DateTime<Utc>) -> Option<PlanType> {
        match self.plan_expires_at() {
            Some(expires) if now < expires => self.plan_type,
            _ => None,
        }
    }
}

/// What a student pays for a course and what the marketplace keeps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub price_vnd: f64,
    pub price_usd: f64,
    pub fee_percent: f64,
    pub fee_usd: f64,
    /// Smallest currency unit (cents) for the card processor.
    pub unit_amount: i64,
    pub application_fee_amount: i64,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl PriceQuote {
    pub fn compute(
        base_price_vnd: f64,
        active_plan: Option<PlanType>,
        usd_to_vnd: f64,
        pricing: &PricingSettings,
    ) -> AppResult<Self> {
        if base_price_vnd <= 0.0 {
            return Err(AppError::InvalidOperation(
                "Course has no price to charge".to_string(),
            ));
        }
        if !usd_to_vnd.is_finite() || usd_to_vnd <= 0.0 {
            return Err(AppError::Upstream("Invalid exchange rate".to_string()));
        }

        let premium = active_plan == Some(PlanType::Premium);
        let price_vnd = if premium {
            base_price_vnd * (100.0 - pricing.premium_discount_percent) / 100.0
        } else {
            base_price_vnd
        };
        let fee_percent = if premium {
            pricing.premium_fee_percent
        } else {
            pricing.standard_fee_percent
        };

        let price_usd = round_cents(price_vnd / usd_to_vnd);
        let fee_usd = round_cents(price_usd * fee_percent / 100.0);

        Ok(Self {
            price_vnd,
            price_usd,
            fee_percent,
            fee_usd,
            unit_amount: (price_usd * 100.0).round() as i64,
            application_fee_amount: (fee_usd * 100.0).round() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(plan: PlanType, start: DateTime<Utc>) -> InstructorInformation {
        InstructorInformation {
            plan_type: Some(plan),
            plan_start: Some(start.timestamp_millis()),
            ..Default::default()
        }
    }

    #[test]
    fn plans_expire_after_their_validity() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let silver = info(PlanType::Silver, start);
        assert_eq!(
            silver.plan_expires_at().unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap()
        );

        let in_range = Utc.with_ymd_and_hms(2024, 4, 14, 0, 0, 0).unwrap();
        let expired = Utc.with_ymd_and_hms(2024, 4, 16, 0, 0, 0).unwrap();
        assert_eq!(silver.active_plan(in_range), Some(PlanType::Silver));
        assert_eq!(silver.active_plan(expired), None);

        let premium = info(PlanType::Premium, start);
        assert_eq!(premium.active_plan(expired), Some(PlanType::Premium));
    }

    #[test]
    fn no_plan_means_no_active_plan() {
        let now = Utc::now();
        assert_eq!(InstructorInformation::default().active_plan(now), None);
    }

    #[test]
    fn standard_quote_uses_standard_fee() {
        let quote =
            PriceQuote::compute(250_000.0, None, 25_000.0, &PricingSettings::default()).unwrap();
        assert_eq!(quote.price_usd, 10.0);
        assert_eq!(quote.unit_amount, 1000);
        assert_eq!(quote.fee_percent, 40.0);
        assert_eq!(quote.application_fee_amount, 400);
    }

    #[test]
    fn premium_quote_is_discounted_with_lower_fee() {
        let quote = PriceQuote::compute(
            250_000.0,
            Some(PlanType::Premium),
            25_000.0,
            &PricingSettings::default(),
        )
        .unwrap();
        assert_eq!(quote.price_vnd, 175_000.0);
        assert_eq!(quote.price_usd, 7.0);
        assert_eq!(quote.unit_amount, 700);
        assert_eq!(quote.application_fee_amount, 49);
    }

    #[test]
    fn gold_plan_pays_standard_fee() {
        let quote = PriceQuote::compute(
            100_000.0,
            Some(PlanType::Gold),
            24_000.0,
            &PricingSettings::default(),
        )
        .unwrap();
        assert_eq!(quote.price_usd, 4.17);
        assert_eq!(quote.unit_amount, 417);
        assert_eq!(quote.fee_percent, 40.0);
    }

    #[test]
    fn rejects_bad_rate_and_free_course() {
        let pricing = PricingSettings::default();
        assert!(matches!(
            PriceQuote::compute(100.0, None, 0.0, &pricing).unwrap_err(),
            AppError::Upstream(_)
        ));
        assert!(matches!(
            PriceQuote::compute(0.0, None, 24_000.0, &pricing).unwrap_err(),
            AppError::InvalidOperation(_)
        ));
    }
}
