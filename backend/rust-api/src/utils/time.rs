use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// VNPay expects local Vietnam time (UTC+7).
const VIETNAM_OFFSET_SECS: i32 = 7 * 3600;

pub fn millis_to_chrono(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// `yyyyMMddHHmmss` in Vietnam local time.
pub fn vnpay_timestamp(dt: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(VIETNAM_OFFSET_SECS) {
        Some(offset) => dt.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string(),
        None => dt.format("%Y%m%d%H%M%S").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vnpay_timestamp_is_shifted_to_utc_plus_seven() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 31, 20, 5, 9).unwrap();
        assert_eq!(vnpay_timestamp(dt), "20240201030509");
    }

    #[test]
    fn millis_round_trip() {
        let dt = millis_to_chrono(1_700_000_000_000).unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }
}
