use jiff::Timestamp;
use serde::Deserialize;
use tracing::debug;

const STATUS_OK: &str = "OK";

/// Body returned by the sunrise/sunset API.
///
/// Every field is optional so that a partially filled response still decodes. Missing values
/// are dealt with when turning the payload into a [`SolarReading`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiPayload {
    #[serde(default)]
    pub results: Option<ApiResults>,
    #[serde(default)]
    pub status: Option<String>,
}

/// The `results` object of an [`ApiPayload`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiResults {
    #[serde(default)]
    pub sunrise: Option<String>,
    #[serde(default)]
    pub sunset: Option<String>,
}

/// Sunrise and sunset instants for a single day.
///
/// Unknown instants are represented by the Unix epoch instead of being absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolarReading {
    pub sunrise: Timestamp,
    pub sunset: Timestamp,
    pub next_sunrise: Timestamp,
}

impl SolarReading {
    /// Builds a reading from an optional API payload.
    ///
    /// A missing payload, a non-`OK` status or fields that are missing or not valid ISO-8601
    /// instants all resolve to the epoch.
    pub fn parse(payload: Option<&ApiPayload>) -> SolarReading {
        let Some(payload) = payload else {
            return SolarReading::default();
        };

        if let Some(status) = payload.status.as_deref() {
            if status != STATUS_OK {
                debug!(?status, "ignoring ephemeris payload with non-OK status");
                return SolarReading::default();
            }
        }

        let Some(results) = payload.results.as_ref() else {
            return SolarReading::default();
        };

        SolarReading {
            sunrise: parse_instant("sunrise", results.sunrise.as_deref()),
            sunset: parse_instant("sunset", results.sunset.as_deref()),
            next_sunrise: Timestamp::UNIX_EPOCH,
        }
    }

    /// Returns a copy of `self` with `next_sunrise` taken from the following day's reading.
    pub fn with_next_sunrise(self, tomorrow: &SolarReading) -> SolarReading {
        SolarReading {
            next_sunrise: tomorrow.sunrise,
            ..self
        }
    }

    /// Returns `true` if none of the instants are known.
    pub fn is_empty(&self) -> bool {
        self.sunrise == Timestamp::UNIX_EPOCH
            && self.sunset == Timestamp::UNIX_EPOCH
            && self.next_sunrise == Timestamp::UNIX_EPOCH
    }
}

fn parse_instant(field: &str, value: Option<&str>) -> Timestamp {
    match value.map(str::parse::<Timestamp>) {
        Some(Ok(timestamp)) => timestamp,
        Some(Err(err)) => {
            debug!(field, %err, "failed to parse ephemeris instant");
            Timestamp::UNIX_EPOCH
        }
        None => Timestamp::UNIX_EPOCH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> ApiPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parse_complete_payload() {
        let payload = payload(
            r#"{
                "results": {
                    "sunrise": "2025-06-21T03:43:12+00:00",
                    "sunset": "2025-06-21T19:33:40+00:00",
                    "solar_noon": "2025-06-21T11:38:26+00:00",
                    "day_length": 57028
                },
                "status": "OK"
            }"#,
        );

        let reading = SolarReading::parse(Some(&payload));
        assert_eq!(reading.sunrise, "2025-06-21T03:43:12Z".parse().unwrap());
        assert_eq!(reading.sunset, "2025-06-21T19:33:40Z".parse().unwrap());
        assert_eq!(reading.next_sunrise, Timestamp::UNIX_EPOCH);
    }

    #[test]
    fn parse_converts_offsets_to_utc() {
        let payload = payload(
            r#"{"results": {"sunrise": "2025-06-21T05:43:12+02:00", "sunset": "2025-06-21T21:33:40+02:00"}}"#,
        );

        let reading = SolarReading::parse(Some(&payload));
        assert_eq!(reading.sunrise, "2025-06-21T03:43:12Z".parse().unwrap());
        assert_eq!(reading.sunset, "2025-06-21T19:33:40Z".parse().unwrap());
    }

    #[test]
    fn parse_missing_payload() {
        assert!(SolarReading::parse(None).is_empty());
        assert!(SolarReading::parse(Some(&payload("{}"))).is_empty());
    }

    #[test]
    fn parse_missing_and_invalid_fields_fall_back_to_epoch() {
        let payload = payload(r#"{"results": {"sunrise": "5:05:35 AM"}, "status": "OK"}"#);

        let reading = SolarReading::parse(Some(&payload));
        assert_eq!(reading, SolarReading::default());
    }

    #[test]
    fn parse_non_ok_status() {
        let payload = payload(
            r#"{"results": {"sunrise": "2025-06-21T03:43:12+00:00", "sunset": "2025-06-21T19:33:40+00:00"}, "status": "INVALID_REQUEST"}"#,
        );

        assert!(SolarReading::parse(Some(&payload)).is_empty());
    }

    #[test]
    fn with_next_sunrise() {
        let today = SolarReading {
            sunrise: Timestamp::from_second(100).unwrap(),
            sunset: Timestamp::from_second(200).unwrap(),
            ..Default::default()
        };
        let tomorrow = SolarReading {
            sunrise: Timestamp::from_second(300).unwrap(),
            sunset: Timestamp::from_second(400).unwrap(),
            ..Default::default()
        };

        let reading = today.with_next_sunrise(&tomorrow);
        assert_eq!(reading.sunrise.as_second(), 100);
        assert_eq!(reading.sunset.as_second(), 200);
        assert_eq!(reading.next_sunrise.as_second(), 300);
        assert!(!reading.is_empty());
    }
}
