use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotPoints, Points};

use crate::config::{ChartMode, PlotConfig, SeriesStyle};
use crate::types::Snapshot;

/// Formats a y-axis value as a fixed-width label
fn format_fixed_width_y_label(value: f64) -> String {
    let abs_value = value.abs();
    if abs_value >= 1000.0 {
        format!("{:-6.1e}", value)
    } else if abs_value >= 100.0 {
        format!("{:-6.0}", value)
    } else if abs_value >= 10.0 {
        format!("{:-6.1}", value)
    } else {
        format!("{:-6.2}", value)
    }
}

/// Index-based points: sample `i` is drawn at x = i, oldest on the left.
pub fn series_points(values: &[f64]) -> Vec<[f64; 2]> {
    values
        .iter()
        .enumerate()
        .map(|(i, &y)| [i as f64, y])
        .collect()
}

/// Y range covering every series with 5% headroom, at least 0.1 tall.
pub fn padded_bounds(series: &[&[f64]]) -> Option<(f64, f64)> {
    let (y_min, y_max) = series
        .iter()
        .flat_map(|s| s.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), val| {
            (min.min(val), max.max(val))
        });

    if !y_min.is_finite() || !y_max.is_finite() {
        return None;
    }

    let range = (y_max - y_min).max(0.1);
    Some((y_min - range * 0.05, y_max + range * 0.05))
}

/// Timestamp label for an x-axis grid mark; blank between samples.
pub fn label_for_index(labels: &[String], x: f64) -> String {
    if x < 0.0 || x.fract() != 0.0 {
        return String::new();
    }
    labels.get(x as usize).cloned().unwrap_or_default()
}

fn color(style: &SeriesStyle) -> Color32 {
    Color32::from_rgb(style.color[0], style.color[1], style.color[2])
}

/// Draws a snapshot as a gyroscope series plus the constant location overlay.
#[derive(Debug, Clone)]
pub struct ChartView {
    config: PlotConfig,
}

impl ChartView {
    pub fn new(config: PlotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    pub fn set_mode(&mut self, mode: ChartMode) {
        self.config.mode = mode;
    }

    pub fn ui(&self, ui: &mut egui::Ui, snapshot: &Snapshot) {
        if snapshot.is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label("Waiting for gyroscope data...");
            });
            return;
        }

        let Some((y_min, y_max)) =
            padded_bounds(&[&snapshot.gyro_series, &snapshot.location_series])
        else {
            return;
        };
        let x_max = (snapshot.len().saturating_sub(1) as f64).max(1.0);
        let labels = snapshot.labels.clone();

        let mut plot = Plot::new("gyrochart")
            .height(self.config.plot_height)
            .x_axis_formatter(move |mark, _| label_for_index(&labels, mark.value))
            .y_axis_formatter(|mark, _| format_fixed_width_y_label(mark.value))
            .show_axes(self.config.show_axes)
            .allow_drag(self.config.allow_drag)
            .allow_zoom(self.config.allow_zoom);

        if self.config.show_legend {
            plot = plot.legend(Legend::default());
        }

        plot.show(ui, |plot_ui| {
            plot_ui.set_plot_bounds(PlotBounds::from_min_max([0.0, y_min], [x_max, y_max]));

            for (style, values) in [
                (&self.config.gyro, &snapshot.gyro_series),
                (&self.config.location, &snapshot.location_series),
            ] {
                let points = series_points(values);
                let draw_points = self.config.mode == ChartMode::Scatter || style.show_points;

                if self.config.mode == ChartMode::Line {
                    plot_ui.line(
                        Line::new(style.label.as_str(), PlotPoints::from(points.clone()))
                            .color(color(style))
                            .width(style.line_width),
                    );
                }
                if draw_points {
                    plot_ui.points(
                        Points::new(style.label.as_str(), PlotPoints::from(points))
                            .color(color(style))
                            .radius(self.config.point_radius),
                    );
                }
            }
        });
    }
}
