// Canned degraded-mode responses used when the remote service can't be reached

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use crate::dispatcher::ResponseEnvelope;

pub const SERVICE_TEMPORARILY_UNAVAILABLE: &str = "SERVICE_TEMPORARILY_UNAVAILABLE";

pub fn fallback(target: &str) -> ResponseEnvelope {
    fallback_at(target, Utc::now())
}

/// Builds the fallback envelope for `target` as of `now`. Matching is by
/// substring, `/status` first.
pub fn fallback_at(target: &str, now: DateTime<Utc>) -> ResponseEnvelope {
    if target.contains("/status") {
        return ResponseEnvelope {
            ok: true,
            data: json!({
                "status": "operational",
                "message": "Using cached response",
                "cached": true,
            }),
            error_code: None,
            error_message: None,
            cached: true,
        };
    }

    if target.contains("/ping") {
        return ResponseEnvelope {
            ok: true,
            data: json!({
                "pong": true,
                "cached": true,
                "timestamp": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            error_code: None,
            error_message: None,
            cached: true,
        };
    }

    let message = "Please try again later";
    ResponseEnvelope {
        ok: false,
        data: json!({
            "error": SERVICE_TEMPORARILY_UNAVAILABLE,
            "message": message,
            "cached": true,
        }),
        error_code: Some(SERVICE_TEMPORARILY_UNAVAILABLE.to_string()),
        error_message: Some(message.to_string()),
        cached: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ping_fallback_has_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        for target in ["/ping", "https://itwhip.com/api/v3/ping", "/ping?x=1"] {
            let envelope = fallback_at(target, now);
            assert!(envelope.ok);
            assert!(envelope.cached);
            assert_eq!(envelope.data["pong"], true);
            assert_eq!(envelope.data["timestamp"], "2024-05-01T12:00:00.000Z");
        }
    }

    #[test]
    fn test_status_fallback_is_operational_but_cached() {
        let envelope = fallback("/status");

        assert!(envelope.ok);
        assert!(envelope.cached);
        assert_eq!(envelope.data["status"], "operational");
        assert_eq!(envelope.data["message"], "Using cached response");
        assert!(envelope.error_code.is_none());
    }

    #[test]
    fn test_other_targets_are_unavailable() {
        for target in ["/rides/RIDE_1", "/analytics/sample?period=week", "/auth/validate", ""] {
            let envelope = fallback(target);
            assert!(!envelope.ok);
            assert!(envelope.cached);
            assert_eq!(
                envelope.error_code.as_deref(),
                Some(SERVICE_TEMPORARILY_UNAVAILABLE)
            );
            assert_eq!(envelope.data["error"], SERVICE_TEMPORARILY_UNAVAILABLE);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_clock() {
        let now = Utc::now();
        assert_eq!(fallback_at("/ping", now), fallback_at("/ping", now));
        assert_eq!(fallback_at("/hotels", now), fallback_at("/hotels", now));
    }
}
