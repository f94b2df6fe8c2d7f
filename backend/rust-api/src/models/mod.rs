use serde::{Deserialize, Serialize};

pub mod banner;
pub mod category;
pub mod course;
pub mod enrollment;
pub mod membership;
pub mod payment;
pub mod published;
pub mod qa;
pub mod review;
pub mod user;

/// Response body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub paginated_results: Vec<T>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u64) -> (u64, u64) {
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(default_limit).min(100);
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        (page, limit)
    }

    /// Offset of the requested page, clamped to what Mongo accepts as a skip.
    pub fn skip(&self, default_limit: u64) -> u64 {
        let (page, limit) = self.resolve(default_limit);
        page.saturating_sub(1)
            .saturating_mul(limit)
            .min(i64::MAX as u64)
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Escapes user input before it is embedded in a Mongo `$regex`.
pub fn regex_literal(input: &str) -> String {
    regex::escape(input.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_and_caps() {
        let query = PageQuery {
            page: None,
            limit: None,
        };
        assert_eq!(query.resolve(14), (1, 14));
        assert_eq!(query.skip(14), 0);

        let query = PageQuery {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!(query.resolve(14), (3, 100));
        assert_eq!(query.skip(14), 200);
    }

    #[test]
    fn huge_page_numbers_saturate() {
        let query = PageQuery {
            page: Some(u64::MAX),
            limit: Some(10),
        };
        assert_eq!(query.skip(10), i64::MAX as u64);
    }

    #[test]
    fn failure_envelope_has_no_data() {
        let envelope = Envelope::<()>::failure("nope");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
    }
}
