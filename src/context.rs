use crate::error::Result;
use crate::phase::{DayPhase, PhaseLabel};
use jiff::fmt::strtime;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use serde::Serialize;

/// Values handed to the site's templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseContext {
    /// Local sunrise time, `None` if it is unknown.
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub next_sunrise: Option<String>,
    /// Used for visual theming.
    pub phase: PhaseLabel,
    pub numeric_phase: u8,
}

/// Formats day phases for display in a fixed time zone.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    time_zone: TimeZone,
    time_format: String,
}

impl ContextBuilder {
    /// Creates a builder for the IANA time zone `time_zone` and the strftime-style pattern
    /// `time_format`.
    pub fn new(time_zone: &str, time_format: &str) -> Result<ContextBuilder> {
        let time_zone = if time_zone.eq_ignore_ascii_case("UTC") {
            TimeZone::UTC
        } else {
            TimeZone::get(time_zone)?
        };

        ContextBuilder::with_time_zone(time_zone, time_format)
    }

    pub fn with_time_zone(time_zone: TimeZone, time_format: &str) -> Result<ContextBuilder> {
        let builder = ContextBuilder {
            time_zone,
            time_format: time_format.to_string(),
        };

        // Reject bad patterns at startup instead of on the first request.
        builder.format(Timestamp::UNIX_EPOCH)?;

        Ok(builder)
    }

    pub fn build(&self, phase: &DayPhase) -> Result<PhaseContext> {
        // Unknown instants are the epoch and render as nothing.
        let format = |timestamp: Timestamp| -> Result<Option<String>> {
            if timestamp == Timestamp::UNIX_EPOCH {
                Ok(None)
            } else {
                self.format(timestamp).map(Some)
            }
        };

        Ok(PhaseContext {
            sunrise: format(phase.sunrise())?,
            sunset: format(phase.sunset())?,
            next_sunrise: format(phase.next_sunrise())?,
            phase: phase.phase_label(),
            numeric_phase: phase.numeric_phase(),
        })
    }

    fn format(&self, timestamp: Timestamp) -> Result<String> {
        let zoned = timestamp.to_zoned(self.time_zone.clone());
        Ok(strtime::format(&self.time_format, &zoned)?)
    }
}
