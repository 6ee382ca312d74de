use crate::system::Engine;
use crate::ticks::TickType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);
const WINDOW_MINUTES: [f64; 3] = [1.0, 5.0, 15.0];

/// Emulated load average: the host has no native run-queue accounting in the
/// POSIX sense, so a background thread folds the mean number of busy cores
/// into exponentially decayed 1/5/15 minute averages.
pub(crate) struct LoadSampler {
    values: Arc<Mutex<Option<[f64; 3]>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl LoadSampler {
    pub fn start(engine: Arc<Engine>) -> Self {
        let values = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let values = values.clone();
            let stop = stop.clone();
            thread::spawn(move || sample_loop(engine, values, stop))
        };

        Self {
            values,
            stop,
            thread: Some(thread),
        }
    }

    pub fn load_average(&self) -> Option<[f64; 3]> {
        *self.values.lock().unwrap()
    }
}

impl Drop for LoadSampler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn sample_loop(engine: Arc<Engine>, values: Arc<Mutex<Option<[f64; 3]>>>, stop: Arc<AtomicBool>) {
    let mut previous = None;
    let mut loads = [0.0f64; 3];

    loop {
        let deadline = Instant::now() + SAMPLE_INTERVAL;
        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep(Duration::from_millis(250));
        }

        let rows = match engine.cpu_ticks() {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!("Load sampler tick query failed: {}", err);
                continue;
            }
        };

        let mut busy = 0u64;
        let mut total = 0u64;
        for row in &rows {
            let row_total: u64 = row.iter().sum();
            busy += row_total - row[TickType::Idle.index()];
            total += row_total;
        }

        if let Some((prev_busy, prev_total)) = previous {
            let busy_delta = busy.saturating_sub(prev_busy);
            let total_delta = total.saturating_sub(prev_total);
            if total_delta > 0 {
                let ncpu = engine.topology().len() as f64;
                let active = ncpu * busy_delta as f64 / total_delta as f64;
                for (load, minutes) in loads.iter_mut().zip(WINDOW_MINUTES) {
                    *load = decay(*load, active, minutes, SAMPLE_INTERVAL.as_secs_f64());
                }
                *values.lock().unwrap() = Some(loads);
            }
        }
        previous = Some((busy, total));
    }
}

/// One step of the exponential moving average over a `window_minutes` window.
pub(crate) fn decay(load: f64, active: f64, window_minutes: f64, interval_secs: f64) -> f64 {
    let e = (-interval_secs / (window_minutes * 60.0)).exp();
    load * e + active * (1.0 - e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_converges_toward_constant_activity() {
        let mut load = 0.0;
        for _ in 0..1_000 {
            load = decay(load, 2.0, 1.0, 5.0);
        }
        assert!((load - 2.0).abs() < 1e-6);
    }

    #[test]
    fn longer_windows_react_slower() {
        let one = decay(0.0, 1.0, 1.0, 5.0);
        let five = decay(0.0, 1.0, 5.0, 5.0);
        let fifteen = decay(0.0, 1.0, 15.0, 5.0);
        assert!(one > five && five > fifteen);
        assert!(fifteen > 0.0);
    }

    #[test]
    fn decay_stays_between_load_and_activity() {
        let stepped = decay(3.0, 1.0, 5.0, 5.0);
        assert!(stepped < 3.0 && stepped > 1.0);
    }
}
