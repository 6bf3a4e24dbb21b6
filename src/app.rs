use std::time::Duration;

use eframe::Frame;
use log::{error, info};

use crate::buffer::BufferState;
use crate::chart::ChartView;
use crate::config::{AppConfig, ChartMode};
use crate::session::{ChartSession, LocationStatus};

pub struct GyroChartApp {
    session: ChartSession,
    chart: ChartView,
    refresh: Duration,
}

impl GyroChartApp {
    pub fn new(session: ChartSession, config: &AppConfig) -> Self {
        Self {
            session,
            chart: ChartView::new(config.plot.clone()),
            refresh: Duration::from_millis(config.window.refresh_interval_ms),
        }
    }

    fn render_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("status_bar")
            .min_height(40.0)
            .show(ctx, |ui| {
                ui.add_space(5.0);
                ui.horizontal(|ui| {
                    ui.label("Status:");

                    let (status_text, status_color) = match self.session.buffer().state() {
                        BufferState::Populated => ("Collecting", egui::Color32::from_rgb(0, 150, 0)),
                        BufferState::Empty => ("Waiting", egui::Color32::from_rgb(255, 165, 0)),
                    };
                    ui.colored_label(status_color, status_text);

                    ui.separator();
                    ui.label(format!("Source: {}", self.session.source_name()));

                    ui.separator();
                    let buffer = self.session.buffer();
                    ui.label(format!("Samples: {} / {}", buffer.len(), buffer.capacity()));

                    ui.separator();
                    ui.label(format!("Filtered: {}", self.session.stats().dropped));

                    ui.separator();
                    ui.label(location_text(&self.session));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let mode = self.chart.config().mode;
                        let next = match mode {
                            ChartMode::Line => ("⚬ Scatter", ChartMode::Scatter),
                            ChartMode::Scatter => ("📈 Line", ChartMode::Line),
                        };
                        if ui.button(next.0).clicked() {
                            self.chart.set_mode(next.1);
                        }
                    });
                });
                ui.add_space(5.0);
            });
    }

    fn render_bottom_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("bottom_status_bar")
            .min_height(25.0)
            .show(ctx, |ui| {
                ui.add_space(3.0);
                ui.horizontal(|ui| match self.session.status_message() {
                    Some(message) => {
                        ui.colored_label(egui::Color32::from_rgb(200, 0, 0), message);
                    }
                    None => {
                        ui.label("Permission to access the gyroscope and location sensors is required.");
                    }
                });
                ui.add_space(3.0);
            });
    }
}

fn location_text(session: &ChartSession) -> String {
    match (session.location_status(), session.buffer().latest_fix()) {
        (LocationStatus::Fixed, Some(fix)) => {
            format!("Location: {:.5}, {:.5}", fix.latitude, fix.longitude)
        }
        (LocationStatus::Denied, _) => "Location: denied".to_string(),
        (LocationStatus::Failed, _) => "Location: unavailable".to_string(),
        _ => "Location: locating...".to_string(),
    }
}

impl eframe::App for GyroChartApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        ctx.set_visuals(egui::Visuals::light());

        self.session.pump();

        self.render_status_bar(ctx);
        self.render_bottom_status_bar(ctx);

        let snapshot = self.session.snapshot();
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart.ui(ui, &snapshot);
        });

        ctx.request_repaint_after(self.refresh);
    }
}

/// Opens the chart window and blocks until it is closed. The session ends
/// when the app is dropped.
pub fn run(session: ChartSession, config: &AppConfig) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        vsync: config.window.vsync,
        renderer: eframe::Renderer::Glow,
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_resizable(config.window.resizable),
        ..Default::default()
    };

    let app = GyroChartApp::new(session, config);
    let result = eframe::run_native(
        &config.window.title,
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    );

    match &result {
        Ok(()) => info!("Chart window closed"),
        Err(e) => error!("GUI failed: {}", e),
    }
    result
}
