use crate::clock::Clock;
use crate::error::Result;
use crate::phase::DayPhase;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Key-value store whose entries expire after a time-to-live.
pub trait PhaseCache: Send + Sync {
    /// Returns the value stored under `key` unless it is missing or expired.
    fn get(&self, key: &str) -> Option<DayPhase>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &DayPhase, ttl: SignedDuration) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    value: DayPhase,
    expires_at: Timestamp,
}

impl Entry {
    fn new(value: &DayPhase, now: Timestamp, ttl: SignedDuration) -> Result<Entry> {
        Ok(Entry {
            value: *value,
            expires_at: now.checked_add(ttl)?,
        })
    }

    fn live_value(&self, now: Timestamp) -> Option<DayPhase> {
        (now < self.expires_at).then_some(self.value)
    }
}

/// Process-local cache.
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryCache {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl PhaseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<DayPhase> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key)?.live_value(self.clock.now())
    }

    fn set(&self, key: &str, value: &DayPhase, ttl: SignedDuration) -> Result<()> {
        let entry = Entry::new(value, self.clock.now(), ttl)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
        Ok(())
    }
}

/// Cache persisted as a JSON document so entries survive restarts.
pub struct FileCache {
    clock: Arc<dyn Clock>,
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        FileCache {
            clock,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, Entry>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl PhaseCache for FileCache {
    fn get(&self, key: &str) -> Option<DayPhase> {
        let entries = match self.load() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = ?self.path, %err, "ignoring unreadable cache file");
                return None;
            }
        };

        let value = entries.get(key)?.live_value(self.clock.now());
        if value.is_none() {
            debug!(key, "cache entry expired");
        }
        value
    }

    fn set(&self, key: &str, value: &DayPhase, ttl: SignedDuration) -> Result<()> {
        let now = self.clock.now();
        // Drop whatever is unreadable or expired instead of failing the write.
        let mut entries = self.load().unwrap_or_default();
        entries.retain(|_, entry| entry.live_value(now).is_some());
        entries.insert(key.to_string(), Entry::new(value, now, ttl)?);

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&entries)?)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::FixedClock;
    use crate::reading::SolarReading;
    use jiff::ToSpan;

    fn start() -> Timestamp {
        "2025-03-20T12:00:00Z".parse().unwrap()
    }

    fn phase() -> DayPhase {
        let reading = SolarReading {
            sunrise: "2025-03-20T06:00:00Z".parse().unwrap(),
            sunset: "2025-03-20T18:00:00Z".parse().unwrap(),
            next_sunrise: "2025-03-21T06:00:00Z".parse().unwrap(),
        };
        DayPhase::from_reading(&reading, 50).unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "solar-phase-{name}-{}-{}.json",
            std::process::id(),
            Timestamp::now().as_nanosecond()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    fn assert_expires_after_ttl(cache: &dyn PhaseCache, clock: &FixedClock) {
        assert_eq!(cache.get("key"), None);

        cache.set("key", &phase(), SignedDuration::from_hours(24)).unwrap();
        assert_eq!(cache.get("key"), Some(phase()));
        assert_eq!(cache.get("other"), None);

        clock.set(start().checked_add(23.hours()).unwrap());
        assert_eq!(cache.get("key"), Some(phase()));

        clock.set(start().checked_add(24.hours()).unwrap());
        assert_eq!(cache.get("key"), None);
    }

    #[test]
    fn memory_cache() {
        let clock = FixedClock::new(start());
        let cache = MemoryCache::new(Arc::new(clock.clone()));
        assert_expires_after_ttl(&cache, &clock);
    }

    #[test]
    fn memory_cache_overwrites() {
        let clock = FixedClock::new(start());
        let cache = MemoryCache::new(Arc::new(clock));
        let unavailable = DayPhase::unavailable();

        cache.set("key", &phase(), SignedDuration::from_hours(1)).unwrap();
        cache.set("key", &unavailable, SignedDuration::from_hours(1)).unwrap();
        assert_eq!(cache.get("key"), Some(unavailable));
    }

    #[test]
    fn file_cache() {
        let clock = FixedClock::new(start());
        let path = temp_path("expiry");
        let cache = FileCache::new(&path, Arc::new(clock.clone()));
        assert_expires_after_ttl(&cache, &clock);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn file_cache_survives_new_instance() {
        let clock = Arc::new(FixedClock::new(start()));
        let path = temp_path("persist");

        FileCache::new(&path, clock.clone())
            .set("key", &phase(), SignedDuration::from_hours(24))
            .unwrap();

        let cache = FileCache::new(&path, clock);
        assert_eq!(cache.path(), path.as_path());
        assert_eq!(cache.get("key"), Some(phase()));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn file_cache_ignores_corrupt_file() {
        let clock = Arc::new(FixedClock::new(start()));
        let path = temp_path("corrupt");
        fs::write(&path, b"{not json").unwrap();

        let cache = FileCache::new(&path, clock);
        assert_eq!(cache.get("key"), None);

        cache.set("key", &phase(), SignedDuration::from_hours(24)).unwrap();
        assert_eq!(cache.get("key"), Some(phase()));
        fs::remove_file(path).unwrap();
    }
}
