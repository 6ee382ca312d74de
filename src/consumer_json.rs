use crate::types::{CoreInfo, FreqInfo, LoadInfo};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tickrec_core::TickType;

pub fn consume<P: AsRef<Path>>(
    path: P,
    timestamps: &[chrono::DateTime<chrono::Local>],
    cores: &[CoreInfo],
    load_info: &LoadInfo,
    freq_info: &[FreqInfo],
) {
    let file = File::create(path).unwrap();

    let mut json_output = JsonOutput::default();

    for ty in TickType::ALL {
        let mut target = vec![];

        for core in cores {
            target.push(CoreRecord {
                core: core.index,
                records: timestamps
                    .iter()
                    .enumerate()
                    .map(|(i, t)| Record {
                        timestamp: t.to_rfc3339(),
                        value: core.deltas[i][ty.index()] as f64,
                    })
                    .collect(),
            });
        }

        json_output.ticks.insert(ty, target);
    }

    for core in cores {
        json_output.utilization.push(CoreRecord {
            core: core.index,
            records: timestamps
                .iter()
                .enumerate()
                .map(|(i, t)| Record {
                    timestamp: t.to_rfc3339(),
                    value: core.utilization[i] as f64,
                })
                .collect(),
        });
    }

    if !load_info.samples.is_empty() {
        for (window, label) in [(0usize, "1m"), (1, "5m"), (2, "15m")] {
            json_output.load_avg.insert(
                label.to_string(),
                timestamps
                    .iter()
                    .enumerate()
                    .map(|(i, t)| Record {
                        timestamp: t.to_rfc3339(),
                        value: load_info.samples[i][window],
                    })
                    .collect(),
            );
        }
    }

    for (index, info) in freq_info.iter().enumerate() {
        json_output.cpu_freq.push(CoreRecord {
            core: index,
            records: info
                .mhz
                .iter()
                .enumerate()
                .map(|(i, &mhz)| Record {
                    timestamp: timestamps[i].to_rfc3339(),
                    value: mhz as f64,
                })
                .collect(),
        });
    }

    serde_json::to_writer(&file, &json_output).unwrap();
    file.sync_all().unwrap();
}

#[derive(Serialize)]
struct Record {
    timestamp: String,
    value: f64,
}

#[derive(Serialize)]
struct CoreRecord {
    core: usize,
    records: Vec<Record>,
}

#[derive(Default, Serialize)]
struct JsonOutput {
    ticks: HashMap<TickType, Vec<CoreRecord>>,
    utilization: Vec<CoreRecord>,
    load_avg: HashMap<String, Vec<Record>>,
    cpu_freq: Vec<CoreRecord>,
}
