use crate::reading::SolarReading;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Valid values of a numeric phase. `0..=100` spans sunrise to sunset, `100..=200` spans sunset
/// to the next sunrise.
pub const NUMERIC_PHASE_RANGE: RangeInclusive<i64> = 0..=200;

/// Upper bound (inclusive) of each label's numeric phase window, checked in order.
const THRESHOLDS: [(u8, PhaseLabel); 6] = [
    (25, PhaseLabel::Morning),
    (75, PhaseLabel::Day),
    (100, PhaseLabel::Evening),
    (125, PhaseLabel::Twilight),
    (175, PhaseLabel::Night),
    (200, PhaseLabel::Dawn),
];

/// A discrete part of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseLabel {
    Morning,
    Day,
    Evening,
    Twilight,
    Night,
    Dawn,
}

impl PhaseLabel {
    /// Maps a numeric phase to its label. Returns `None` for values above 200.
    pub fn from_numeric(numeric_phase: u8) -> Option<PhaseLabel> {
        THRESHOLDS
            .iter()
            .find(|(max, _)| numeric_phase <= *max)
            .map(|(_, label)| *label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseLabel::Morning => "morning",
            PhaseLabel::Day => "day",
            PhaseLabel::Evening => "evening",
            PhaseLabel::Twilight => "twilight",
            PhaseLabel::Night => "night",
            PhaseLabel::Dawn => "dawn",
        }
    }
}

impl fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons why a numeric phase cannot be computed from a reading.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationError {
    #[error("interval from {start} to {end} has no positive length")]
    DegenerateInterval { start: Timestamp, end: Timestamp },
    #[error("reading lacks an instant required for the computation")]
    IncompleteReading,
}

/// A `DayPhase` that violates its invariants. Never expected at runtime.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("numeric phase {0} is outside of 0..=200")]
    OutOfRange(u8),
    #[error("label `{label}` does not match numeric phase {numeric_phase}, expected `{expected}`")]
    LabelMismatch {
        numeric_phase: u8,
        label: PhaseLabel,
        expected: PhaseLabel,
    },
    #[error("phase without ephemeris data must have numeric phase 0, got {0}")]
    UnavailableNonZero(u8),
}

/// Computes the raw numeric phase of `now` within the day/night cycle described by `reading`.
///
/// The result is not clamped: instants before `sunrise` yield negative values, instants after
/// `next_sunrise` yield values above 200.
pub fn numeric_phase(now: Timestamp, reading: &SolarReading) -> Result<i64, ComputationError> {
    if is_known(reading.sunrise) && is_known(reading.sunset) && reading.sunset <= reading.sunrise {
        return Err(ComputationError::DegenerateInterval {
            start: reading.sunrise,
            end: reading.sunset,
        });
    }

    if now > reading.sunset {
        Ok(percent_elapsed(now, reading.sunset, reading.next_sunrise)? + 100)
    } else {
        percent_elapsed(now, reading.sunrise, reading.sunset)
    }
}

fn percent_elapsed(now: Timestamp, start: Timestamp, end: Timestamp) -> Result<i64, ComputationError> {
    if !is_known(start) || !is_known(end) {
        return Err(ComputationError::IncompleteReading);
    }

    if end <= start {
        return Err(ComputationError::DegenerateInterval { start, end });
    }

    let elapsed = now.duration_since(start).as_secs_f64();
    let length = end.duration_since(start).as_secs_f64();

    Ok((elapsed / length * 100.0).round() as i64)
}

fn is_known(timestamp: Timestamp) -> bool {
    timestamp != Timestamp::UNIX_EPOCH
}

/// The position within the day/night cycle at the time of computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedDayPhase")]
pub struct DayPhase {
    sunrise: Timestamp,
    sunset: Timestamp,
    next_sunrise: Timestamp,
    numeric_phase: u8,
    phase_label: PhaseLabel,
}

impl DayPhase {
    /// Creates a `DayPhase`, verifying that `phase_label` matches `numeric_phase`.
    ///
    /// If all instants are the epoch the phase is considered unavailable, which requires a
    /// numeric phase of 0 and the `night` label.
    pub fn new(
        sunrise: Timestamp,
        sunset: Timestamp,
        next_sunrise: Timestamp,
        numeric_phase: u8,
        phase_label: PhaseLabel,
    ) -> Result<DayPhase, ValidationError> {
        let reading = SolarReading {
            sunrise,
            sunset,
            next_sunrise,
        };
        let expected = expected_label(&reading, numeric_phase)?;

        if phase_label != expected {
            return Err(ValidationError::LabelMismatch {
                numeric_phase,
                label: phase_label,
                expected,
            });
        }

        Ok(DayPhase {
            sunrise,
            sunset,
            next_sunrise,
            numeric_phase,
            phase_label,
        })
    }

    /// Creates a `DayPhase` for `reading`, deriving the label from `numeric_phase`.
    pub fn from_reading(reading: &SolarReading, numeric_phase: u8) -> Result<DayPhase, ValidationError> {
        let label = expected_label(reading, numeric_phase)?;

        DayPhase::new(
            reading.sunrise,
            reading.sunset,
            reading.next_sunrise,
            numeric_phase,
            label,
        )
    }

    /// The degraded phase used when no ephemeris data is available.
    pub fn unavailable() -> DayPhase {
        DayPhase {
            sunrise: Timestamp::UNIX_EPOCH,
            sunset: Timestamp::UNIX_EPOCH,
            next_sunrise: Timestamp::UNIX_EPOCH,
            numeric_phase: 0,
            phase_label: PhaseLabel::Night,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.reading().is_empty()
    }

    pub fn sunrise(&self) -> Timestamp {
        self.sunrise
    }

    pub fn sunset(&self) -> Timestamp {
        self.sunset
    }

    pub fn next_sunrise(&self) -> Timestamp {
        self.next_sunrise
    }

    pub fn numeric_phase(&self) -> u8 {
        self.numeric_phase
    }

    pub fn phase_label(&self) -> PhaseLabel {
        self.phase_label
    }

    fn reading(&self) -> SolarReading {
        SolarReading {
            sunrise: self.sunrise,
            sunset: self.sunset,
            next_sunrise: self.next_sunrise,
        }
    }
}

fn expected_label(reading: &SolarReading, numeric_phase: u8) -> Result<PhaseLabel, ValidationError> {
    if reading.is_empty() {
        return match numeric_phase {
            0 => Ok(PhaseLabel::Night),
            other => Err(ValidationError::UnavailableNonZero(other)),
        };
    }

    PhaseLabel::from_numeric(numeric_phase).ok_or(ValidationError::OutOfRange(numeric_phase))
}

/// Wire form of a `DayPhase` before validation.
#[derive(Deserialize)]
struct UncheckedDayPhase {
    sunrise: Timestamp,
    sunset: Timestamp,
    next_sunrise: Timestamp,
    numeric_phase: u8,
    phase_label: PhaseLabel,
}

impl TryFrom<UncheckedDayPhase> for DayPhase {
    type Error = ValidationError;

    fn try_from(value: UncheckedDayPhase) -> Result<Self, Self::Error> {
        DayPhase::new(
            value.sunrise,
            value.sunset,
            value.next_sunrise,
            value.numeric_phase,
            value.phase_label,
        )
    }
}
