use crate::types::{CoreInfo, FreqInfo, LoadInfo};
use std::path::Path;
use tickrec_core::TickType;

pub fn consume<P: AsRef<Path>>(
    path: P,
    timestamps: &[chrono::DateTime<chrono::Local>],
    cores: &[CoreInfo],
    load_info: &LoadInfo,
    freq_info: &[FreqInfo],
) {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .unwrap();

    // One block per tick category, cores as columns.
    for ty in TickType::ALL {
        wtr.write_field(format!("{} ticks", ty.label())).unwrap();
        for core in cores {
            wtr.write_field(format!("CPU{}", core.index)).unwrap();
        }
        wtr.write_record(None::<&[u8]>).unwrap();

        for (i, t) in timestamps.iter().enumerate() {
            wtr.write_field(t.to_rfc3339()).unwrap();
            for core in cores {
                wtr.write_field(core.deltas[i][ty.index()].to_string())
                    .unwrap();
            }
            wtr.write_record(None::<&[u8]>).unwrap();
        }

        wtr.write_record([" "]).unwrap();
    }

    // Utilization
    wtr.write_field("Core Utilization").unwrap();
    for core in cores {
        wtr.write_field(format!("CPU{}", core.index)).unwrap();
    }
    wtr.write_record(None::<&[u8]>).unwrap();

    for (i, t) in timestamps.iter().enumerate() {
        wtr.write_field(t.to_rfc3339()).unwrap();
        for core in cores {
            wtr.write_field(format!("{:.2}", core.utilization[i]))
                .unwrap();
        }
        wtr.write_record(None::<&[u8]>).unwrap();
    }
    wtr.write_record([" "]).unwrap();

    if !load_info.samples.is_empty() {
        wtr.write_record(["Load Average", "1m", "5m", "15m"]).unwrap();
        for (i, t) in timestamps.iter().enumerate() {
            let load = load_info.samples[i];
            wtr.write_record([
                t.to_rfc3339(),
                format!("{:.2}", load[0]),
                format!("{:.2}", load[1]),
                format!("{:.2}", load[2]),
            ])
            .unwrap();
        }
        wtr.write_record([" "]).unwrap();
    }

    if !freq_info.is_empty() {
        wtr.write_field("CPU Frequency").unwrap();
        for i in 0..freq_info.len() {
            wtr.write_field(format!("CPU{}", i)).unwrap();
        }
        wtr.write_record(None::<&[u8]>).unwrap();

        for i in 0..freq_info[0].mhz.len() {
            wtr.write_field(timestamps[i].to_rfc3339()).unwrap();
            for info in freq_info {
                wtr.write_field(format!("{:.2}", info.mhz[i])).unwrap();
            }
            wtr.write_record(None::<&[u8]>).unwrap();
        }
    }
}
