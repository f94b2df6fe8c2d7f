use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records HTTP request count and latency.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Segments after these are slugs unless they are a fixed route word.
const SLUG_PARENTS: &[&str] = &["public", "enrolled-courses", "ins"];
const STATIC_SEGMENTS: &[&str] = &[
    "id",
    "course",
    "upload-image",
    "remove-image",
    "upload-pdf",
    "remove-pdf",
];

/// Collapses ids and slugs into placeholders to bound label cardinality.
fn normalize_path(path: &str) -> String {
    let mut normalized: Vec<&str> = Vec::new();
    let mut previous = "";

    for segment in path.split('/') {
        if is_uuid_like(segment) || is_numeric_id(segment) {
            normalized.push("{id}");
        } else if SLUG_PARENTS.contains(&previous)
            && !segment.is_empty()
            && !STATIC_SEGMENTS.contains(&segment)
        {
            normalized.push("{slug}");
        } else {
            normalized.push(segment);
        }
        previous = segment;
    }

    normalized.join("/")
}

fn is_uuid_like(s: &str) -> bool {
    // 8-4-4-4-12 hex characters
    if s.len() != 36 {
        return false;
    }
    s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/course/ins/550e8400-e29b-41d4-a716-446655440000/section"),
            "/api/course/ins/{id}/section"
        );
        assert_eq!(
            normalize_path("/api/course/public/intro-to-rust"),
            "/api/course/public/{slug}"
        );
        assert_eq!(
            normalize_path("/api/course/public/id/550e8400-e29b-41d4-a716-446655440000"),
            "/api/course/public/id/{id}"
        );
        assert_eq!(
            normalize_path("/api/course/ins/upload-image"),
            "/api/course/ins/upload-image"
        );
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_is_uuid_like() {
        assert!(is_uuid_like("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid_like("not-a-uuid"));
        assert!(!is_uuid_like("12345"));
    }

    #[test]
    fn test_is_numeric_id() {
        assert!(is_numeric_id("123"));
        assert!(!is_numeric_id("abc"));
        assert!(!is_numeric_id(""));
    }
}
