use crate::metrics::{RollingSeries, SamplerState};
use egui::Vec2;

const CORE_PLOT_HEIGHT: f32 = 60.0;
const WIDE_PLOT_HEIGHT: f32 = 90.0;

pub fn show_system_stats(ui: &mut egui::Ui, state: &SamplerState) {
    let history = &state.history;
    let max_points = history.history_len();

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            let columns = if history.cpu_cores().len() > 8 { 2 } else { 1 };
            ui.columns(columns, |cols| {
                for (i, series) in history.cpu_cores().iter().enumerate() {
                    let ui = &mut cols[i % columns];
                    ui.horizontal(|ui| {
                        ui.label(format!("CPU Core {}", i + 1));
                        ui.label(format!("{:.1}%", series.last().unwrap_or(0.0)));
                    });
                    percent_plot(
                        ui,
                        format!("cpu_core_{}", i),
                        CORE_PLOT_HEIGHT,
                        series,
                        max_points,
                    );
                }
            });

            ui.separator();
            ui.label(format!(
                "Memory: {:.1}% (peak {:.1}%)",
                history.memory().last().unwrap_or(0.0),
                history.memory().max().unwrap_or(0.0)
            ));
            percent_plot(ui, "memory", WIDE_PLOT_HEIGHT, history.memory(), max_points);

            ui.separator();
            ui.label(format!(
                "Network: ↑ {}  ↓ {}",
                format_rate(state.network_rate.sent),
                format_rate(state.network_rate.received)
            ));
            network_plot(ui, history.net_sent(), history.net_received(), max_points);

            if !history.gpu().is_empty() {
                ui.separator();
                ui.label(format!(
                    "GPU Memory: {:.1}% (avg {:.1}%)",
                    history.gpu().last().unwrap_or(0.0),
                    history.gpu().mean().unwrap_or(0.0)
                ));
                percent_plot(ui, "gpu", WIDE_PLOT_HEIGHT, history.gpu(), max_points);
            }
        });
}

fn points(series: &RollingSeries) -> egui_plot::PlotPoints {
    series
        .iter()
        .enumerate()
        .map(|(i, v)| [i as f64, *v as f64])
        .collect()
}

fn series_plot(
    ui: &mut egui::Ui,
    id: impl std::hash::Hash,
    height: f32,
    max_points: usize,
    y_max: Option<f64>,
    lines: Vec<egui_plot::Line>,
) {
    let mut plot = egui_plot::Plot::new(id)
        .height(height)
        .show_axes([false, true])
        .set_margin_fraction(Vec2::ZERO)
        .include_x(0.0)
        .include_x(max_points as f64)
        .include_y(0.0)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .allow_double_click_reset(false);

    if let Some(y_max) = y_max {
        plot = plot.include_y(y_max);
    }
    if lines.len() > 1 {
        plot = plot.legend(egui_plot::Legend::default());
    }

    plot.show(ui, |plot_ui| {
        for line in lines {
            plot_ui.line(line);
        }
    });
}

fn percent_plot(
    ui: &mut egui::Ui,
    id: impl std::hash::Hash,
    height: f32,
    series: &RollingSeries,
    max_points: usize,
) {
    let line = egui_plot::Line::new(points(series)).fill(0.0);
    series_plot(ui, id, height, max_points, Some(100.0), vec![line]);
}

fn network_plot(
    ui: &mut egui::Ui,
    sent: &RollingSeries,
    received: &RollingSeries,
    max_points: usize,
) {
    let lines = vec![
        egui_plot::Line::new(points(sent)).name("sent"),
        egui_plot::Line::new(points(received)).name("received"),
    ];
    series_plot(ui, "network", WIDE_PLOT_HEIGHT, max_points, None, lines);
}

pub fn format_rate(bytes_per_sec: f32) -> String {
    const UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
    let mut value = bytes_per_sec.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
