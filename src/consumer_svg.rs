use crate::types::{CoreInfo, FreqInfo, LoadInfo};
use plotters::prelude::*;
use std::path::Path;

pub fn consume<P: AsRef<Path>>(
    path: P,
    timestamps: &[chrono::DateTime<chrono::Local>],
    cores: &[CoreInfo],
    load_info: &LoadInfo,
    freq_info: &[FreqInfo],
) {
    let samples = timestamps.len();
    if samples < 2 {
        eprintln!("tickrec: not enough samples for a chart");
        return;
    }

    let mut areas_len = 1;
    if !load_info.samples.is_empty() {
        areas_len += 1;
    }
    if !freq_info.is_empty() {
        areas_len += 1;
    }

    let path = path.as_ref().to_string_lossy().to_string();
    let root = SVGBackend::new(path.as_str(), (1280, 720 * areas_len as u32)).into_drawing_area();
    root.fill(&WHITE).unwrap();

    let areas = root.split_evenly((areas_len, 1));

    // Core utilization
    let mut chart = ChartBuilder::on(&areas[0])
        .caption("Core Utilization", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..(samples - 1), 0f32..100f32)
        .unwrap();

    chart
        .configure_mesh()
        .y_label_formatter(&|y| format!("{}%", y))
        .draw()
        .unwrap();

    for (idx, core) in cores.iter().enumerate() {
        let color = Palette99::pick(idx).stroke_width(2).filled();
        chart
            .draw_series(LineSeries::new(
                core.utilization.clone().into_iter().enumerate(),
                color.clone(),
            ))
            .unwrap()
            .label(format!(
                "CPU{} / AVG({:.2}%)",
                core.index,
                core.avg_utilization()
            ))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.clone()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .unwrap();

    let mut area_i = 1;

    if !load_info.samples.is_empty() {
        let mut max = 1.0f64;
        for sample in load_info.samples.iter() {
            for &load in sample {
                max = max.max(load);
            }
        }

        let mut chart = ChartBuilder::on(&areas[area_i])
            .caption("Load Average", ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..(samples - 1), 0f64..max)
            .unwrap();

        chart.configure_mesh().draw().unwrap();

        for (window, label) in [(0usize, "1m"), (1, "5m"), (2, "15m")] {
            let color = Palette99::pick(window).stroke_width(2).filled();
            chart
                .draw_series(LineSeries::new(
                    load_info
                        .samples
                        .iter()
                        .map(|sample| sample[window])
                        .enumerate(),
                    color.clone(),
                ))
                .unwrap()
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.clone()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .unwrap();

        area_i += 1;
    }

    if !freq_info.is_empty() {
        let mut max = 1000.0f32;
        for info in freq_info.iter() {
            for &mhz in info.mhz.iter() {
                max = max.max(mhz);
            }
        }

        let mut chart = ChartBuilder::on(&areas[area_i])
            .caption("CPU Frequency", ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..(samples - 1), 0f32..max)
            .unwrap();

        chart
            .configure_mesh()
            .y_label_formatter(&|y| format!("{}MHz", y))
            .draw()
            .unwrap();

        for (idx, info) in freq_info.iter().enumerate() {
            let color = Palette99::pick(idx).stroke_width(2).filled();
            chart
                .draw_series(LineSeries::new(
                    info.mhz.clone().into_iter().enumerate(),
                    color.clone(),
                ))
                .unwrap()
                .label(format!("CPU{} / AVG({:.2}MHz)", idx, info.avg()))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.clone()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .unwrap();
    }
}
