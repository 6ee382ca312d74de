use tickrec_core::{TickRow, TickType};

/// Recorded series for one logical processor: per-sample tick deltas and the
/// utilization percentage derived from them.
pub struct CoreInfo {
    pub index: usize,
    pub deltas: Vec<TickRow>,
    pub utilization: Vec<f32>,
}

impl CoreInfo {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            deltas: vec![],
            utilization: vec![],
        }
    }

    pub fn push_sample(&mut self, previous: &TickRow, current: &TickRow) {
        let mut delta = [0u64; TickType::COUNT];
        for (d, (now, then)) in delta.iter_mut().zip(current.iter().zip(previous.iter())) {
            *d = now.saturating_sub(*then);
        }

        let total: u64 = delta.iter().sum();
        let busy = total - delta[TickType::Idle.index()];
        let utilization = if total > 0 {
            100.0 * busy as f32 / total as f32
        } else {
            0.0
        };

        self.deltas.push(delta);
        self.utilization.push(utilization);
    }

    pub fn avg_utilization(&self) -> f32 {
        if self.utilization.is_empty() {
            0.0
        } else {
            self.utilization.iter().sum::<f32>() / (self.utilization.len() as f32)
        }
    }
}

/// Load-average samples, one `[1m, 5m, 15m]` triple per recorded sample.
#[derive(Default)]
pub struct LoadInfo {
    pub samples: Vec<[f64; 3]>,
}

/// Effective-frequency series for one core, in MHz.
pub struct FreqInfo {
    pub mhz: Vec<f32>,
}

impl FreqInfo {
    pub fn avg(&self) -> f32 {
        if self.mhz.is_empty() {
            0.0
        } else {
            self.mhz.iter().sum::<f32>() / (self.mhz.len() as f32)
        }
    }
}
