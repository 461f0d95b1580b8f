use super::normalize::to_local;
use crate::error::Result;
use crate::models::{Alert, AlertEntry};
use chrono::TimeZone;

/// Number of alerts whose window `[start, end]` contains `point`.
pub fn count_alerts(alerts: &[Alert], point: i64) -> u32 {
    alerts.iter().filter(|a| a.covers(point)).count() as u32
}

/// Converts the payload's `alerts` entries. `start` and `end` must be
/// representable in `tz`; the text fields default to empty.
pub fn parse_alerts<Tz: TimeZone>(entries: &[AlertEntry], tz: &Tz) -> Result<Vec<Alert>> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (start, end) = (entry.start.0, entry.end.0);
            Ok(Alert {
                start,
                end,
                starts_at: to_local(tz, start, &format!("alerts[{}].start", i))?,
                ends_at: to_local(tz, end, &format!("alerts[{}].end", i))?,
                event: entry.event.clone().unwrap_or_default(),
                sender_name: entry.sender_name.clone().unwrap_or_default(),
                description: entry.description.clone().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::normalize::parse_payload;
    use crate::error::AppError;
    use chrono::{NaiveDate, NaiveDateTime, Utc};
    use rstest::rstest;
    use serde_json::json;

    fn window(start: i64, end: i64) -> Alert {
        Alert {
            start,
            end,
            starts_at: NaiveDateTime::default(),
            ends_at: NaiveDateTime::default(),
            event: "Wind".into(),
            sender_name: "DWD".into(),
            description: String::new(),
        }
    }

    #[rstest]
    #[case(999, 0)]
    #[case(1000, 1)]
    #[case(1500, 2)]
    #[case(2000, 2)]
    #[case(2001, 1)]
    #[case(3000, 1)]
    #[case(3001, 0)]
    fn counts_closed_windows(#[case] point: i64, #[case] expected: u32) {
        let alerts = vec![window(1000, 2000), window(1500, 3000)];
        assert_eq!(count_alerts(&alerts, point), expected);
    }

    #[test]
    fn no_alerts_count_zero() {
        assert_eq!(count_alerts(&[], 1000), 0);
    }

    fn entries(raw: serde_json::Value) -> Vec<AlertEntry> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn parses_alert_fields() {
        let raw = json!([{
            "sender_name": "NWS Tulsa",
            "event": "Heat Advisory",
            "start": 1_684_952_747,
            "end": 1_684_988_747,
            "description": "Hot.",
            "tags": ["Extreme temperature value"]
        }, {"start": 1, "end": 2}]);

        let alerts = parse_alerts(&entries(raw), &Utc).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].event, "Heat Advisory");
        assert_eq!(alerts[0].sender_name, "NWS Tulsa");
        assert_eq!(alerts[0].description, "Hot.");
        assert_eq!(alerts[1].event, "");
        assert_eq!(
            alerts[1].starts_at,
            NaiveDate::from_ymd_opt(1970, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 1)
                .unwrap()
        );
    }

    #[test]
    fn alert_window_is_converted_to_local_time() {
        let raw = json!([{"start": 1_704_110_400, "end": 1_704_114_000}]);
        let alerts = parse_alerts(&entries(raw), &Utc).unwrap();
        let noon = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(alerts[0].starts_at, noon.and_hms_opt(12, 0, 0).unwrap());
        assert_eq!(alerts[0].ends_at, noon.and_hms_opt(13, 0, 0).unwrap());
    }

    #[rstest]
    #[case(json!([{"start": 9_000_000_000_000_i64, "end": 1}]), "alerts[0].start")]
    #[case(json!([{"start": 1, "end": 2}, {"start": 1, "end": i64::MIN}]), "alerts[1].end")]
    fn unrepresentable_alert_time_is_a_schema_error(#[case] raw: serde_json::Value, #[case] at: &str) {
        match parse_alerts(&entries(raw), &Utc) {
            Err(AppError::Schema { path, .. }) => assert_eq!(path, at),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn alert_without_end_is_rejected() {
        let raw = json!({"current": {"dt": 1, "temp": 1.0}, "alerts": [{"start": 1}]});
        match parse_payload(&raw) {
            Err(AppError::Schema { path, .. }) => assert_eq!(path, "alerts[0].end"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}
