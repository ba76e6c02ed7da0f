use crate::components::process_view::ProcessView;
use crate::components::settings::{show_settings_window, Settings};
use crate::components::stats_view;
use crate::metrics::Sampler;
#[cfg(feature = "nvml")]
use crate::metrics::NvmlSource;
use std::time::Duration;

/// We derive Deserialize/Serialize so we can persist app state on shutdown.
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
pub struct ProcessMonitorApp {
    #[serde(skip)]
    sampler: Sampler,
    settings: Settings,
    process_view: ProcessView,
}

impl Default for ProcessMonitorApp {
    fn default() -> Self {
        Self {
            sampler: Sampler::default(),
            settings: Settings::default(),
            process_view: ProcessView::default(),
        }
    }
}

impl ProcessMonitorApp {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        // Load previous app state (if any).
        // Note that you must enable the `persistence` feature for this to work.
        let mut app: Self = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_default();

        app.sampler = build_sampler(&app.settings);
        app.sampler.start();
        app
    }

    /// Pushes settings edits to the sampler. The memory metric is fixed per
    /// sampler, so changing it starts a fresh one that inherits the charts.
    fn sync_sampler(&mut self) {
        let config = self.settings.sampler_config();

        if config.memory_metric != self.sampler.memory_metric() {
            log::info!(
                "Memory metric changed to {:?}, restarting sampler",
                config.memory_metric
            );
            let history = self.sampler.snapshot().history.clone();
            let replacement = build_sampler(&self.settings).with_history(history);
            std::mem::replace(&mut self.sampler, replacement).stop_in_background();
            self.sampler.start();
            return;
        }

        if config.interval_secs != self.sampler.interval() {
            self.sampler.set_interval(config.interval_secs);
        }
        if config.history_len != self.sampler.history_len() {
            self.sampler.set_history_len(config.history_len);
        }
    }
}

fn build_sampler(settings: &Settings) -> Sampler {
    let sampler = Sampler::new(settings.sampler_config());
    #[cfg(feature = "nvml")]
    let sampler = match NvmlSource::new() {
        Some(gpu) => sampler.with_gpu(Box::new(gpu)),
        None => sampler,
    };
    sampler
}

impl eframe::App for ProcessMonitorApp {
    /// Called by the frame work to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, self);
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.settings.apply(ctx);
        self.sync_sampler();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("Options", |ui| {
                    if ui.button("Update Speed").clicked() {
                        self.settings.show();
                        ui.close_menu();
                    }
                });

                ui.add_space(16.0);
                egui::widgets::global_theme_preference_buttons(ui);

                ui.add_space(16.0);
                if ui.button("⚙").clicked() {
                    self.settings.show();
                }
            });
        });

        show_settings_window(ctx, &mut self.settings);

        egui::SidePanel::left("process_list")
            .resizable(true)
            .default_width(460.0)
            .show(ctx, |ui| {
                self.process_view.show(ui, &self.sampler);
            });

        let state = self.sampler.snapshot();
        egui::CentralPanel::default().show(ctx, |ui| {
            if state.version == 0 {
                ui.label("Collecting first sample...");
            } else {
                stats_view::show_system_stats(ui, &state);
            }
        });

        // Redraw on our own clock; the sampler publishes independently
        ctx.request_repaint_after(Duration::from_millis(500));
    }
}
