use crate::cache::PhaseCache;
use crate::clock::Clock;
use crate::ephemeris::{EphemerisClient, EphemerisDate};
use crate::error::Result;
use crate::phase::{numeric_phase, DayPhase, NUMERIC_PHASE_RANGE};
use crate::reading::{ApiPayload, SolarReading};
use jiff::SignedDuration;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key of the single cache entry. One calculator serves one location.
pub const CACHE_KEY: &str = "solar_phase";

/// Computes where in the day/night cycle the current instant is.
pub struct TimeOfDayCalculator<C> {
    client: C,
    cache: Arc<dyn PhaseCache>,
    clock: Arc<dyn Clock>,
    ttl: SignedDuration,
}

impl<C: EphemerisClient> TimeOfDayCalculator<C> {
    /// Creates a calculator that caches its results for `ttl`.
    pub fn new(
        client: C,
        cache: Arc<dyn PhaseCache>,
        clock: Arc<dyn Clock>,
        ttl: SignedDuration,
    ) -> Self {
        TimeOfDayCalculator {
            client,
            cache,
            clock,
            ttl,
        }
    }

    /// Returns the cached day phase or computes a fresh one.
    pub async fn current_phase(&self) -> Result<DayPhase> {
        self.get_or_compute(false).await
    }

    /// Returns the cached day phase unless `force_refresh` is set or nothing is cached. Fresh
    /// results are written back to the cache.
    ///
    /// Fetch failures never surface as errors, they degrade to [`DayPhase::unavailable`]. Only
    /// a `DayPhase` that fails validation is returned as an error.
    pub async fn get_or_compute(&self, force_refresh: bool) -> Result<DayPhase> {
        if !force_refresh {
            if let Some(phase) = self.cache.get(CACHE_KEY) {
                debug!(phase = %phase.phase_label(), "using cached day phase");
                return Ok(phase);
            }
        }

        let phase = self.compute().await?;

        info!(
            phase = %phase.phase_label(),
            numeric_phase = phase.numeric_phase(),
            "computed day phase"
        );

        if let Err(err) = self.cache.set(CACHE_KEY, &phase, self.ttl) {
            warn!(%err, "failed to cache day phase");
        }

        Ok(phase)
    }

    async fn compute(&self) -> Result<DayPhase> {
        // Values above 200 and computation errors get exactly one refetch.
        let mut refetched = false;

        loop {
            let now = self.clock.now();
            let reading = self.fetch_reading().await;

            if reading.is_empty() {
                warn!("no ephemeris data available");
                return Ok(DayPhase::unavailable());
            }

            match numeric_phase(now, &reading) {
                Ok(value) if value <= *NUMERIC_PHASE_RANGE.end() || refetched => {
                    if value > *NUMERIC_PHASE_RANGE.end() {
                        warn!(value, "numeric phase still out of range after refetch, clamping");
                    } else if value < *NUMERIC_PHASE_RANGE.start() {
                        // Today's sunrise is still ahead, refetching returns the same data.
                        debug!(value, "before sunrise, clamping numeric phase");
                    }

                    return Ok(DayPhase::from_reading(&reading, clamp(value))?);
                }
                Ok(value) => warn!(value, "numeric phase out of range, refetching ephemeris"),
                Err(err) if refetched => {
                    warn!(%err, "failed to compute numeric phase after refetch");
                    return Ok(DayPhase::unavailable());
                }
                Err(err) => warn!(%err, "failed to compute numeric phase, refetching ephemeris"),
            }

            refetched = true;
        }
    }

    async fn fetch_reading(&self) -> SolarReading {
        let (today, tomorrow) = tokio::join!(
            self.fetch(EphemerisDate::Today),
            self.fetch(EphemerisDate::Tomorrow)
        );

        SolarReading::parse(today.as_ref())
            .with_next_sunrise(&SolarReading::parse(tomorrow.as_ref()))
    }

    async fn fetch(&self, date: EphemerisDate) -> Option<ApiPayload> {
        match self.client.fetch(date).await {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(?date, %err, "failed to fetch ephemeris");
                None
            }
        }
    }
}

fn clamp(value: i64) -> u8 {
    value.clamp(*NUMERIC_PHASE_RANGE.start(), *NUMERIC_PHASE_RANGE.end()) as u8
}
