use clap::Parser;
use std::path::PathBuf;
use tickrec_core::Features;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Opts {
    /// Specify the output file, e.g., -o result.{svg,json,csv}
    #[arg(short, long)]
    pub output: Vec<PathBuf>,
    /// Sampling interval in seconds
    #[arg(short, long, default_value_t = 1)]
    pub interval: u64,
    /// Number of samples to record
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
    /// Recording time limit, e.g., --time 1h30m59s
    #[arg(long)]
    pub time: Option<humantime::Duration>,
    /// Read only the legacy counters, even where utility counters exist
    #[arg(long)]
    pub legacy_only: bool,
    /// Sample emulated 1/5/15 minute load averages
    #[arg(long)]
    pub load_avg: bool,
    /// Record per-core effective frequency as well
    #[arg(long)]
    pub frequency: bool,
}

impl Opts {
    pub fn features(&self) -> Features {
        let mut features = Features::empty();
        if !self.legacy_only {
            features |= Features::CPU_UTILITY;
        }
        if self.load_avg {
            features |= Features::LOAD_AVG;
        }
        features
    }

    /// Samples to record: an explicit count wins, a bare time limit records
    /// until the deadline, neither means 30 samples.
    pub fn sample_count(&self) -> usize {
        match (self.count, self.time) {
            (Some(count), _) => count,
            (None, Some(_)) => usize::MAX,
            (None, None) => 30,
        }
    }
}
