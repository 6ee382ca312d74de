use crate::counters::{CounterKind, CounterSource};
use crate::loadavg::LoadSampler;
use crate::ticks::{self, TickRow, TickType};
use crate::topology::Topology;
use crate::utility::UtilityState;
use crate::Error;
use bitflags::bitflags;
use std::sync::{Arc, Mutex};

pub struct System {
    engine: Arc<Engine>,
    load: Option<LoadSampler>,
}

impl System {
    /// Build a system reader backed by the host's performance counters.
    pub fn new(features: Features) -> Result<Self, Error> {
        #[cfg(target_os = "windows")]
        {
            let source = crate::platform::windows::Pdh::new(
                features.contains(Features::CPU_UTILITY),
            )?;
            Ok(Self::with_source(
                features,
                Topology::detect(),
                Box::new(source),
            ))
        }

        #[cfg(not(target_os = "windows"))]
        {
            let _ = features;
            Err(Error::UnsupportedPlatform)
        }
    }

    /// Build a system reader over an explicit counter source and topology.
    pub fn with_source(
        features: Features,
        topology: Topology,
        source: Box<dyn CounterSource>,
    ) -> Self {
        let engine = Arc::new(Engine {
            features,
            topology,
            source,
            utility: Mutex::new(None),
        });

        let load = if features.contains(Features::LOAD_AVG) {
            Some(LoadSampler::start(engine.clone()))
        } else {
            None
        };

        Self { engine, load }
    }

    pub fn topology(&self) -> &Topology {
        &self.engine.topology
    }

    /// Cumulative ticks per logical processor, columns ordered by `TickType`.
    /// Each call is a fresh point-in-time snapshot, not a delta.
    pub fn cpu_ticks(&self) -> Result<Vec<TickRow>, Error> {
        self.engine.cpu_ticks()
    }

    /// Emulated 1/5/15 minute load averages. `Ok(None)` until the background
    /// sampler has seen its first interval.
    pub fn load_average(&self) -> Result<Option<[f64; 3]>, Error> {
        match &self.load {
            Some(load) => Ok(load.load_average()),
            None => Err(Error::FeatureMissing(Features::LOAD_AVG)),
        }
    }

    /// Per-core effective frequency in MHz.
    pub fn cpu_frequency(&self) -> Result<Vec<f32>, Error> {
        #[cfg(target_os = "windows")]
        {
            crate::platform::windows::cpu_frequency()
        }

        #[cfg(not(target_os = "windows"))]
        {
            Err(Error::UnsupportedPlatform)
        }
    }
}

pub(crate) struct Engine {
    features: Features,
    topology: Topology,
    source: Box<dyn CounterSource>,
    // The one piece of cross-call state; see UtilityState for why the whole
    // reconciliation runs under this lock.
    utility: Mutex<Option<UtilityState>>,
}

impl Engine {
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn cpu_ticks(&self) -> Result<Vec<TickRow>, Error> {
        let current = self
            .source
            .snapshot()
            .map_err(|err| Error::CounterQueryFailed(Box::new(err)))?;

        let ncpu = self.topology.len();
        let mut rows = vec![[0u64; TickType::COUNT]; ncpu];

        let utility_mode =
            self.features.contains(Features::CPU_UTILITY) && current.has_utility();

        let mut state = self.utility.lock().unwrap();
        if utility_mode && state.is_none() {
            *state = Some(UtilityState::new(current.clone()));
        }

        for (index, instance) in current.instances().iter().enumerate() {
            // Synthetic aggregate rows ("_Total", "0,_Total") would resolve
            // to core 0 and clobber it.
            if instance.contains("_Total") {
                continue;
            }

            let cpu = self.topology.resolve(instance);
            if cpu >= ncpu {
                continue;
            }

            let legacy = CounterKind::LEGACY
                .iter()
                .map(|&kind| current.value(kind, index))
                .collect::<Option<Vec<u64>>>();
            let [system, user, irq, softirq, idle] = match legacy {
                Some(values) => [values[0], values[1], values[2], values[3], values[4]],
                // Absent counters leave a zero row, not an error.
                None => continue,
            };

            let (user, system, idle) = match state
                .as_mut()
                .filter(|_| utility_mode)
                .and_then(|state| state.reconcile(index, &current))
            {
                Some(correction) => {
                    let idle = (idle as i64 - correction.idle_adjustment).max(0) as u64;
                    (correction.user, correction.system, idle)
                }
                None => (user, system, idle),
            };

            rows[cpu] = ticks::normalize(user, system, irq, softirq, idle);
        }

        Ok(rows)
    }
}

bitflags! {
    #[derive(Default)]
    pub struct Features: u32 {
        /// Blend the throttling-aware utility counters into the legacy ticks.
        const CPU_UTILITY = 1 << 0;
        /// Run the background load-average emulation sampler.
        const LOAD_AVG = 1 << 1;
    }
}
