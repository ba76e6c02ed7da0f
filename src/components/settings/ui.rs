use super::state::Settings;
use crate::metrics::{MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};
use crate::process::MemoryMetric;

pub fn show_settings_window(ctx: &egui::Context, settings: &mut Settings) {
    if !settings.is_visible() {
        return;
    }

    egui::Window::new("⚙ Settings")
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Update Speed:");
                ui.add(
                    egui::Slider::new(
                        &mut settings.sampler.interval_secs,
                        MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS,
                    )
                    .step_by(1.0)
                    .suffix(" s"),
                );
            });

            ui.horizontal(|ui| {
                ui.label("History Length:");
                ui.add(
                    egui::Slider::new(&mut settings.sampler.history_len, 10..=500)
                        .step_by(10.0)
                );
            });

            ui.horizontal(|ui| {
                ui.label("Process Memory:");
                let metric = &mut settings.sampler.memory_metric;
                ui.selectable_value(metric, MemoryMetric::Percent, "Percent");
                ui.selectable_value(metric, MemoryMetric::ResidentMb, "Resident MB");
            });

            ui.separator();

            ui.horizontal(|ui| {
                ui.label("UI Scale:");
                ui.add(
                    egui::Slider::new(&mut settings.scale, 0.5..=2.0)
                        .step_by(0.1)
                );
            });

            ui.horizontal(|ui| {
                ui.label("Font Size:");
                ui.add(
                    egui::Slider::new(&mut settings.font_size, 8.0..=32.0)
                        .step_by(1.0)
                );
            });

            ui.separator();

            if ui.button("Close").clicked() {
                settings.hide();
            }
        });
}
