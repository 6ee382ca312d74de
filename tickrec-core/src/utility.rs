use crate::counters::{CounterKind, CounterSnapshot};

/// `delta_t` below this many 100ns units (5 seconds) yields a provisional
/// multiplier that is used but not cached.
const STABLE_DELTA_100NS: i64 = 50_000_000;

/// Corrected user/system values for one core, plus the net amount by which
/// idle must shrink so total accounted time is conserved.
pub(crate) struct Correction {
    pub user: u64,
    pub system: u64,
    pub idle_adjustment: i64,
}

/// Reconciliation state for the utility counter family.
///
/// The utility counters report throttling-corrected time scaled against an
/// opaque 32-bit wrapping base. This state derives the multiplier that maps
/// utility deltas back into 100ns units, from the ratio of the base delta to
/// the wall-clock delta since `initial`.
///
/// `initial` is captured the first time utility mode is used and re-seeded
/// only when `delta_t` outgrows the 32-bit base counter's wrap period. The
/// multiplier is cached permanently once estimated over at least 5 seconds;
/// callers serialize access through a mutex so the cache write and the
/// re-seed stay atomic.
pub(crate) struct UtilityState {
    initial: CounterSnapshot,
    cached_multiplier: Option<u64>,
}

impl UtilityState {
    pub fn new(initial: CounterSnapshot) -> Self {
        Self {
            initial,
            cached_multiplier: None,
        }
    }

    /// Reconcile one core's legacy counters with its utility counters.
    /// `index` addresses the same instance position in both snapshots.
    ///
    /// Returns `None` while no multiplier can be derived: counters not yet
    /// advanced, a required kind missing, or a detected wraparound (which
    /// re-seeds the baseline and skips this cycle).
    pub fn reconcile(&mut self, index: usize, current: &CounterSnapshot) -> Option<Correction> {
        let multiplier = match self.cached_multiplier {
            Some(multiplier) => multiplier,
            None => self.estimate(index, current)?,
        };

        let delta_proc = self.delta(CounterKind::PercentProcessorUtility, index, current)?;
        let delta_sys = self.delta(CounterKind::PercentPrivilegedUtility, index, current)?;

        let initial_user = self.initial.value(CounterKind::PercentUserTime, index)? as i64;
        let initial_system = self
            .initial
            .value(CounterKind::PercentPrivilegedTime, index)? as i64;
        let raw_user = current.value(CounterKind::PercentUserTime, index)? as i64;
        let raw_system = current.value(CounterKind::PercentPrivilegedTime, index)? as i64;

        let multiplier = multiplier as i64;
        let user = (initial_user + multiplier * (delta_proc - delta_sys) / 100).max(0) as u64;
        let system = (initial_system + multiplier * delta_sys / 100).max(0) as u64;

        // Idle shrinks by exactly what user+system grew over the raw values.
        let idle_adjustment = (user + system) as i64 - (raw_user + raw_system);

        Some(Correction {
            user,
            system,
            idle_adjustment,
        })
    }

    /// Estimate the multiplier from the timestamp and base deltas, caching it
    /// once `delta_t` spans the stabilization window.
    fn estimate(&mut self, index: usize, current: &CounterSnapshot) -> Option<u64> {
        let delta_t = self.delta(CounterKind::TimestampSys100Ns, index, current)?;
        if delta_t <= 0 {
            return None;
        }

        if (delta_t >> 32) != 0 {
            // The baseline is stale relative to the base counter's wrap
            // period; one cycle of correction is lost here and multiple wraps
            // inside one interval stay undetectable.
            log::warn!("Utility base wraparound detected, re-seeding baseline");
            self.initial = current.clone();
            return None;
        }

        let mut delta_base = self.delta(CounterKind::PercentProcessorUtilityBase, index, current)?;
        if delta_base <= 0 {
            // 32-bit wrapping counter, compensate a single wrap.
            delta_base += 1 << 32;
        }

        // Round half away from zero; both operands are positive here.
        let multiplier = ((delta_t + delta_base / 2) / delta_base) as u64;

        if delta_t >= STABLE_DELTA_100NS {
            log::debug!(
                "Utility multiplier stabilized at {} over {} units",
                multiplier,
                delta_t
            );
            self.cached_multiplier = Some(multiplier);
        }

        Some(multiplier)
    }

    fn delta(&self, kind: CounterKind, index: usize, current: &CounterSnapshot) -> Option<i64> {
        let now = current.value(kind, index)?;
        let then = self.initial.value(kind, index)?;
        Some(now as i64 - then as i64)
    }

    #[cfg(test)]
    pub fn cached_multiplier(&self) -> Option<u64> {
        self.cached_multiplier
    }

    #[cfg(test)]
    pub fn baseline(&self) -> &CounterSnapshot {
        &self.initial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot(
        timestamp: u64,
        base: u64,
        util_proc: u64,
        util_sys: u64,
        user: u64,
        system: u64,
    ) -> CounterSnapshot {
        let mut values = HashMap::new();
        values.insert(CounterKind::TimestampSys100Ns, vec![timestamp]);
        values.insert(CounterKind::PercentProcessorUtilityBase, vec![base]);
        values.insert(CounterKind::PercentProcessorUtility, vec![util_proc]);
        values.insert(CounterKind::PercentPrivilegedUtility, vec![util_sys]);
        values.insert(CounterKind::PercentUserTime, vec![user]);
        values.insert(CounterKind::PercentPrivilegedTime, vec![system]);
        CounterSnapshot::new(vec!["0".into()], values)
    }

    #[test]
    fn no_time_advance_yields_no_correction() {
        let initial = snapshot(1_000, 10, 0, 0, 0, 0);
        let mut state = UtilityState::new(initial.clone());
        assert!(state.reconcile(0, &initial).is_none());
    }

    #[test]
    fn multiplier_rounds_half_away_from_zero() {
        // delta_t = 1500, delta_base = 1000 -> 1.5 rounds to 2.
        let initial = snapshot(0, 0, 0, 0, 0, 0);
        let current = snapshot(1_500, 1_000, 100, 0, 0, 0);
        let mut state = UtilityState::new(initial);
        let correction = state.reconcile(0, &current).unwrap();
        // user = 0 + 2 * (100 - 0) / 100 = 2
        assert_eq!(correction.user, 2);
    }

    #[test]
    fn provisional_multiplier_is_not_cached() {
        let initial = snapshot(0, 0, 0, 0, 0, 0);
        // One second of delta_t: usable, below the stabilization window.
        let current = snapshot(10_000_000, 1_000, 0, 0, 0, 0);
        let mut state = UtilityState::new(initial);
        assert!(state.reconcile(0, &current).is_some());
        assert_eq!(state.cached_multiplier(), None);
    }

    #[test]
    fn multiplier_caches_past_stabilization_window() {
        let initial = snapshot(0, 0, 0, 0, 0, 0);
        // 6 seconds, base delta 6000 -> multiplier 10_000.
        let current = snapshot(60_000_000, 6_000, 0, 0, 0, 0);
        let mut state = UtilityState::new(initial);
        assert!(state.reconcile(0, &current).is_some());
        assert_eq!(state.cached_multiplier(), Some(10_000));

        // Later deltas that would imply a different ratio reuse the cache.
        let later = snapshot(120_000_000, 60_000, 200, 100, 0, 0);
        let correction = state.reconcile(0, &later).unwrap();
        // system = 0 + 10_000 * 100 / 100
        assert_eq!(correction.system, 10_000);
    }

    #[test]
    fn base_counter_wrap_is_compensated() {
        let initial = snapshot(0, 4_294_967_000, 0, 0, 0, 0);
        // base went "backwards" by wrapping: delta = 704 - 4_294_967_000
        // + 2^32 = 1000; delta_t = 10_000_000 -> multiplier 10_000.
        let current = snapshot(10_000_000, 704, 100, 0, 0, 0);
        let mut state = UtilityState::new(initial);
        let correction = state.reconcile(0, &current).unwrap();
        assert_eq!(correction.user, 10_000);
    }

    #[test]
    fn timestamp_overflow_reseeds_baseline() {
        let initial = snapshot(0, 0, 0, 0, 0, 0);
        let stale = snapshot(1 << 33, 500, 100, 50, 7, 8);
        let mut state = UtilityState::new(initial);

        assert!(state.reconcile(0, &stale).is_none());
        assert_eq!(
            state
                .baseline()
                .value(CounterKind::TimestampSys100Ns, 0),
            Some(1 << 33)
        );
        // The re-seed never touches an unset cache.
        assert_eq!(state.cached_multiplier(), None);
    }

    #[test]
    fn conservation_of_total_time() {
        let initial = snapshot(0, 0, 0, 0, 2_000_000, 1_000_000);
        let current = snapshot(10_000_000, 1_000, 400, 200, 2_000_000, 1_000_000);
        let mut state = UtilityState::new(initial);
        let correction = state.reconcile(0, &current).unwrap();

        // multiplier 10_000: user 2_000_000 + 10_000*200/100 = 2_020_000,
        // system 1_000_000 + 10_000*200/100 = 1_020_000.
        assert_eq!(correction.user, 2_020_000);
        assert_eq!(correction.system, 1_020_000);
        let grown = (correction.user as i64 - 2_000_000) + (correction.system as i64 - 1_000_000);
        assert_eq!(correction.idle_adjustment, grown);
    }
}
