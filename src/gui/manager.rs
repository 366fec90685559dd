//! Manager window implemented with egui/eframe

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use eframe::{CreationContext, NativeOptions, egui};
use tracing::{error, info, warn};

use super::components::network_settings::{self, NetworkAction};
use super::components::{audio_settings, color_settings, section_fields};
use super::constants::*;
use crate::config::schema::{AUDIO, COLOR_SETTINGS, NETWORK};
use crate::session::ConfigSession;
use crate::status::Status;
use crate::supervisor::WorkerState;

fn state_color(state: WorkerState) -> egui::Color32 {
    match state {
        WorkerState::Running => STATUS_RUNNING,
        WorkerState::Starting | WorkerState::Stopping => STATUS_STARTING,
        WorkerState::Idle | WorkerState::Crashed(_) => STATUS_STOPPED,
    }
}

struct StatusMessage {
    text: String,
    color: egui::Color32,
}

impl From<&Status> for StatusMessage {
    fn from(status: &Status) -> Self {
        Self {
            text: status.to_string(),
            color: if status.is_error() { STATUS_STOPPED } else { STATUS_INFO },
        }
    }
}

struct ManagerApp {
    session: ConfigSession,
    status_rx: Receiver<Status>,
    status_message: StatusMessage,
    worker_state: WorkerState,
    last_health_check: Instant,
    show_reset_confirm: bool,
    /// Raised by SIGINT/SIGTERM
    shutdown_requested: Arc<AtomicBool>,
}

impl ManagerApp {
    fn new(_cc: &CreationContext<'_>, session: ConfigSession, status_rx: Receiver<Status>, shutdown_requested: Arc<AtomicBool>) -> Self {
        info!("Initializing egui manager");
        Self {
            session,
            status_rx,
            status_message: StatusMessage::from(&Status::Idle),
            worker_state: WorkerState::Idle,
            last_health_check: Instant::now(),
            show_reset_confirm: false,
            shutdown_requested,
        }
    }

    fn drain_status(&mut self) {
        // Only the latest message is shown
        while let Ok(status) = self.status_rx.try_recv() {
            self.status_message = StatusMessage::from(&status);
        }
    }

    fn poll_session(&mut self) {
        if self.last_health_check.elapsed() < Duration::from_millis(WORKER_CHECK_INTERVAL_MS) {
            return;
        }
        self.last_health_check = Instant::now();
        self.worker_state = self.session.poll();
    }

    fn check_signals(&mut self, ctx: &egui::Context) {
        if self.shutdown_requested.swap(false, Ordering::AcqRel) {
            info!("Shutdown signal received, closing manager");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn launch(&mut self) {
        if let Err(err) = self.session.launch_worker() {
            error!(error = %err, "Failed to launch visualizer");
        }
        self.worker_state = self.session.worker_state();
    }

    fn save(&mut self) {
        if let Err(err) = self.session.save() {
            warn!(error = %err, "Save rejected");
        }
    }

    fn handle_network_action(&mut self, action: NetworkAction) {
        match action {
            NetworkAction::None => {}
            NetworkAction::AddAddress => {
                let _ = self.session.add_entered_light_ip();
            }
            NetworkAction::RemoveSelected => {
                self.session.remove_selected_light_ip();
            }
            NetworkAction::Discover => {
                self.session.start_discovery();
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let running = self.session.worker_pid().is_some();
            if ui
                .add_enabled(!running, egui::Button::new("\u{25B6} Start Visualizer"))
                .clicked()
            {
                self.launch();
            }
            if ui
                .add_enabled(running, egui::Button::new("\u{23F9} Stop Visualizer"))
                .clicked()
            {
                self.session.stop_worker();
            }
            if ui.button("\u{1F4BE} Save Config").clicked() {
                self.save();
            }
            if ui.button("Reset to Default").clicked() {
                self.show_reset_confirm = true;
            }
        });
    }

    fn reset_confirm_dialog(&mut self, ctx: &egui::Context) {
        egui::Window::new("Reset to Default")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Are you sure you want to reset the configuration to default?");
                ui.label(
                    egui::RichText::new("Unsaved edits are discarded and lights are searched for again.")
                        .small()
                        .weak(),
                );
                ui.add_space(ITEM_SPACING);

                ui.horizontal(|ui| {
                    if ui.button("Yes, Reset").clicked() {
                        if let Err(err) = self.session.reset_to_default() {
                            error!(error = %err, "Reset failed");
                        }
                        self.show_reset_confirm = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.show_reset_confirm = false;
                    }
                });
            });
    }

    fn sections(&mut self, ui: &mut egui::Ui) {
        let names: Vec<String> = self
            .session
            .document()
            .sections()
            .map(|(name, _)| name.to_string())
            .collect();
        let discovering = self.session.is_discovering();

        for name in &names {
            match name.as_str() {
                AUDIO => {
                    audio_settings::ui(ui, self.session.fields_mut());
                }
                NETWORK => {
                    let action = network_settings::ui(ui, &mut self.session.fields_mut().network, discovering);
                    self.handle_network_action(action);
                }
                COLOR_SETTINGS => {
                    color_settings::ui(ui, self.session.fields_mut());
                }
                other => {
                    section_fields::ui(ui, self.session.fields_mut(), other);
                }
            }
        }
    }
}

impl eframe::App for ManagerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_signals(ctx);
        self.poll_session();
        self.drain_status();

        egui::TopBottomPanel::top("status_panel").show(ctx, |ui| {
            ui.add_space(PADDING);
            ui.heading("WiZ Volume Visualizer");
            ui.horizontal(|ui| {
                ui.colored_label(state_color(self.worker_state), self.worker_state.label());
                if let Some(pid) = self.session.worker_pid() {
                    ui.label(format!("PID: {pid}"));
                }
            });
            ui.colored_label(self.status_message.color, &self.status_message.text);
            let stderr = self.session.worker_stderr();
            if !stderr.is_empty() {
                egui::CollapsingHeader::new("Visualizer output")
                    .id_salt("worker_stderr")
                    .show(ui, |ui| {
                        egui::ScrollArea::vertical()
                            .max_height(ADDRESS_LIST_HEIGHT)
                            .stick_to_bottom(true)
                            .show(ui, |ui| {
                                ui.label(egui::RichText::new(stderr).monospace().small());
                            });
                    });
            }
            ui.add_space(ITEM_SPACING);
            self.controls(ui);
            ui.add_space(PADDING);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.add_space(PADDING);
                    self.sections(ui);
                });
        });

        if self.show_reset_confirm {
            self.reset_confirm_dialog(ctx);
        }

        ctx.request_repaint_after(Duration::from_millis(WORKER_CHECK_INTERVAL_MS));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        match self.session.shutdown() {
            Ok(Some(mode)) => info!(mode = ?mode, "Stopped visualizer on exit"),
            Ok(None) => {}
            Err(err) => error!(error = %err, "Failed to stop visualizer during shutdown"),
        }
        info!("Manager exiting");
    }
}

pub fn run_gui(session: ConfigSession, status_rx: Receiver<Status>, shutdown_requested: Arc<AtomicBool>) -> Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([WINDOW_WIDTH, WINDOW_HEIGHT])
            .with_min_inner_size([WINDOW_MIN_WIDTH, WINDOW_MIN_HEIGHT])
            .with_title("WiZ Volume Visualizer Control"),
        ..Default::default()
    };

    eframe::run_native(
        "WiZ Volume Visualizer Control",
        options,
        Box::new(move |cc| Ok(Box::new(ManagerApp::new(cc, session, status_rx, shutdown_requested)))),
    )
    .map_err(|err| anyhow!("Failed to launch egui manager: {err}"))
}
