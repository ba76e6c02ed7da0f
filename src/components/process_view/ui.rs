use super::state::ProcessView;
use crate::metrics::Sampler;
use crate::process::SortBy;

impl ProcessView {
    pub fn show(&mut self, ui: &mut egui::Ui, sampler: &Sampler) {
        ui.heading("Running Processes");

        egui::ComboBox::from_label("Sort by")
            .selected_text(self.sort_by.label())
            .show_ui(ui, |ui| {
                for sort_by in SortBy::ALL {
                    ui.selectable_value(&mut self.sort_by, sort_by, sort_by.label());
                }
            });

        ui.horizontal(|ui| {
            ui.label("Search:");
            ui.add(egui::TextEdit::singleline(&mut self.filter).hint_text("Filter by keyword"));
            if !self.filter.is_empty() && ui.small_button("❌").clicked() {
                self.filter.clear();
            }
        });

        if let Some(status) = &self.status {
            ui.label(egui::RichText::new(status).small());
        }
        ui.separator();

        let memory_suffix = sampler.memory_metric().suffix();
        let processes = sampler.filtered_view(&self.filter, self.sort_by);
        let mut to_kill = None;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("process_list")
                    .striped(true)
                    .num_columns(5)
                    .show(ui, |ui| {
                        ui.strong("PID");
                        ui.strong("Name");
                        ui.strong("CPU");
                        ui.strong("Memory");
                        ui.label("");
                        ui.end_row();

                        for process in &processes {
                            ui.monospace(process.pid.to_string());
                            ui.label(&process.name);
                            ui.monospace(format!("{:.1}%", process.cpu_percent));
                            match process.gpu_memory_mb {
                                Some(gpu) => ui.monospace(format!(
                                    "{:.1}{} (GPU {:.0} MB)",
                                    process.memory, memory_suffix, gpu
                                )),
                                None => ui.monospace(format!(
                                    "{:.1}{}",
                                    process.memory, memory_suffix
                                )),
                            };
                            if ui.small_button("Kill").on_hover_text("Kill Process").clicked() {
                                to_kill = Some(process.pid);
                            }
                            ui.end_row();
                        }
                    });
            });

        if let Some(pid) = to_kill {
            let result = sampler.kill(pid);
            self.record_kill(pid, result);
        }
    }
}
