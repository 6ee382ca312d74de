use crate::Error;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Performance counter families sampled per logical-processor instance.
///
/// The legacy kinds report raw per-core time; the utility kinds add
/// hardware-throttling-corrected values plus the wrapping base counter and a
/// 100ns timestamp they are scaled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    PercentPrivilegedTime,
    PercentUserTime,
    PercentInterruptTime,
    PercentDpcTime,
    PercentProcessorTime,
    PercentPrivilegedUtility,
    PercentProcessorUtility,
    PercentProcessorUtilityBase,
    TimestampSys100Ns,
}

impl CounterKind {
    pub const LEGACY: [CounterKind; 5] = [
        CounterKind::PercentPrivilegedTime,
        CounterKind::PercentUserTime,
        CounterKind::PercentInterruptTime,
        CounterKind::PercentDpcTime,
        CounterKind::PercentProcessorTime,
    ];

    pub const UTILITY: [CounterKind; 4] = [
        CounterKind::PercentPrivilegedUtility,
        CounterKind::PercentProcessorUtility,
        CounterKind::PercentProcessorUtilityBase,
        CounterKind::TimestampSys100Ns,
    ];

    pub fn is_utility(self) -> bool {
        Self::UTILITY.contains(&self)
    }
}

/// One poll of every counter kind across all processor instances. Values are
/// aligned positionally: `values[kind][i]` belongs to `instances[i]`.
#[derive(Debug, Clone, Default)]
pub struct CounterSnapshot {
    instances: Vec<String>,
    values: HashMap<CounterKind, Vec<u64>>,
}

impl CounterSnapshot {
    pub fn new(instances: Vec<String>, values: HashMap<CounterKind, Vec<u64>>) -> Self {
        Self { instances, values }
    }

    pub fn instances(&self) -> &[String] {
        &self.instances
    }

    pub fn value(&self, kind: CounterKind, index: usize) -> Option<u64> {
        self.values.get(&kind)?.get(index).copied()
    }

    /// Utility counters are usable only as a complete family. A snapshot
    /// missing any of them is treated as legacy-only.
    pub fn has_utility(&self) -> bool {
        CounterKind::UTILITY
            .iter()
            .all(|kind| self.values.contains_key(kind))
    }
}

/// The raw counter collaborator. Implementations own their refresh throttling
/// and may hand back a repeated snapshot when polled faster than they refresh.
pub trait CounterSource: Send + Sync {
    fn snapshot(&self) -> Result<CounterSnapshot, Error>;
}

/// Time-boxed memoization for a counter source: an explicit slot with a ttl,
/// refreshed through `get_or_refresh` rather than a background timer.
pub struct RefreshCache<T> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> RefreshCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn get_or_refresh<F>(&self, now: Instant, refresh: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, Error>,
    {
        let mut slot = self.slot.lock().unwrap();
        if let Some((fetched_at, value)) = slot.as_ref() {
            if now.duration_since(*fetched_at) < self.ttl {
                return Ok(value.clone());
            }
        }

        let value = refresh()?;
        *slot = Some((now, value.clone()));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(kinds: &[CounterKind]) -> CounterSnapshot {
        let values = kinds.iter().map(|&k| (k, vec![0u64])).collect();
        CounterSnapshot::new(vec!["0".into()], values)
    }

    #[test]
    fn partial_utility_family_is_unavailable() {
        let mut kinds = CounterKind::LEGACY.to_vec();
        kinds.extend([
            CounterKind::PercentProcessorUtility,
            CounterKind::TimestampSys100Ns,
        ]);
        assert!(!snapshot_with(&kinds).has_utility());

        kinds.extend([
            CounterKind::PercentPrivilegedUtility,
            CounterKind::PercentProcessorUtilityBase,
        ]);
        assert!(snapshot_with(&kinds).has_utility());
    }

    #[test]
    fn value_lookup_is_positional() {
        let snapshot = CounterSnapshot::new(
            vec!["0".into(), "1".into()],
            HashMap::from([(CounterKind::PercentUserTime, vec![10, 20])]),
        );
        assert_eq!(snapshot.value(CounterKind::PercentUserTime, 1), Some(20));
        assert_eq!(snapshot.value(CounterKind::PercentUserTime, 2), None);
        assert_eq!(snapshot.value(CounterKind::PercentDpcTime, 0), None);
    }

    #[test]
    fn cache_serves_within_ttl_and_refreshes_after() {
        let cache = RefreshCache::new(Duration::from_millis(300));
        let t0 = Instant::now();

        let first = cache.get_or_refresh(t0, || Ok(1u64)).unwrap();
        let cached = cache
            .get_or_refresh(t0 + Duration::from_millis(100), || Ok(2u64))
            .unwrap();
        let refreshed = cache
            .get_or_refresh(t0 + Duration::from_millis(400), || Ok(3u64))
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(cached, 1);
        assert_eq!(refreshed, 3);
    }

    #[test]
    fn cache_propagates_refresh_errors_and_stays_empty() {
        let cache: RefreshCache<u64> = RefreshCache::new(Duration::from_millis(300));
        let t0 = Instant::now();

        let err = cache.get_or_refresh(t0, || Err(Error::UnsupportedPlatform));
        assert!(err.is_err());

        let ok = cache.get_or_refresh(t0, || Ok(7u64)).unwrap();
        assert_eq!(ok, 7);
    }
}
