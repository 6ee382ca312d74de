mod consumer_csv;
mod consumer_json;
mod consumer_svg;
mod opt;
mod types;

use crate::opt::Opts;
use crate::types::{CoreInfo, FreqInfo, LoadInfo};
use clap::Parser;
use crossterm::style::Stylize;
use std::process;
use std::thread;
use std::time::{Duration, Instant};
use tickrec_core::{System, TickType};

fn main() {
    env_logger::init();

    let opts = Opts::parse();

    let system = match System::new(opts.features()) {
        Ok(system) => system,
        Err(err) => {
            eprintln!("tickrec: {}", err);
            process::exit(1);
        }
    };

    let ncpu = system.topology().len();
    let mut cores: Vec<CoreInfo> = (0..ncpu).map(CoreInfo::new).collect();
    let mut load_info = LoadInfo::default();
    let mut freq_info: Vec<FreqInfo> = vec![];
    let mut timestamps = vec![];

    let mut baseline = match system.cpu_ticks() {
        Ok(rows) => rows,
        Err(err) => {
            eprintln!("tickrec: {}", err);
            process::exit(1);
        }
    };

    let interval = Duration::from_secs(opts.interval.max(1));
    let deadline = opts.time.map(|time| Instant::now() + *time);

    for _ in 0..opts.sample_count() {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }

        thread::sleep(interval);

        let rows = match system.cpu_ticks() {
            Ok(rows) => rows,
            Err(err) => {
                eprintln!("tickrec: {}", err);
                process::exit(1);
            }
        };

        timestamps.push(chrono::Local::now());

        for (core, row) in cores.iter_mut().zip(rows.iter()) {
            core.push_sample(&baseline[core.index], row);
            print_core(core);
        }
        baseline = rows;

        if opts.load_avg {
            if let Ok(Some(load)) = system.load_average() {
                load_info.samples.push(load);
                println!(
                    "load average: {:.2} {:.2} {:.2}",
                    load[0], load[1], load[2]
                );
            } else {
                // Sampler warming up; keep the series aligned with samples.
                load_info.samples.push([0.0; 3]);
            }
        }

        if opts.frequency {
            match system.cpu_frequency() {
                Ok(freq) => {
                    if freq_info.is_empty() {
                        freq_info = freq.iter().map(|_| FreqInfo { mhz: vec![] }).collect();
                    }
                    for (info, mhz) in freq_info.iter_mut().zip(freq) {
                        info.mhz.push(mhz);
                    }
                }
                Err(err) => log::warn!("Frequency sampling failed: {}", err),
            }
        }

        println!("================");
    }

    for output in opts.output.iter() {
        match output.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => {
                consumer_csv::consume(output, &timestamps, &cores, &load_info, &freq_info)
            }
            Some("json") => {
                consumer_json::consume(output, &timestamps, &cores, &load_info, &freq_info)
            }
            Some("svg") => {
                consumer_svg::consume(output, &timestamps, &cores, &load_info, &freq_info)
            }
            _ => eprintln!("tickrec: unsupported output format {:?}", output),
        }
    }
}

fn print_core(core: &CoreInfo) {
    let utilization = *core.utilization.last().unwrap_or(&0.0);
    let delta = core.deltas.last().copied().unwrap_or_default();

    let mut message = format!("CPU{:<3} {:5.1}%", core.index, utilization);
    for ty in TickType::ALL {
        message.push_str(&format!(" / {} {}", ty.label(), delta[ty.index()]));
    }

    let styled = if utilization < 50.0 {
        message.green()
    } else if utilization < 80.0 {
        message.yellow()
    } else {
        message.red()
    };
    println!("{}", styled);
}
