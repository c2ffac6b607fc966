//! Radar chart: one spoke per metric, axis values normalized to [0, 1] with
//! the better end of each metric pointing outward. Each group draws a filled
//! polygon over concentric guide rings.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::charts::{draw_err, render_with_backend, theme, PlotLayout};
use crate::models::ReportResult;

pub struct RadarGroup {
    pub label: String,
    pub color: RGBColor,
    /// One normalized value in [0, 1] per axis, in `axes` order.
    pub values: Vec<f64>,
}

pub struct RadarChart {
    pub title: String,
    pub subtitle: String,
    pub axes: Vec<String>,
    pub groups: Vec<RadarGroup>,
}

const RINGS: usize = 4;

fn spoke_angle(idx: usize, n_axes: usize) -> f64 {
    // First axis at 12 o'clock, proceeding clockwise.
    std::f64::consts::FRAC_PI_2 - 2.0 * std::f64::consts::PI * idx as f64 / n_axes as f64
}

fn polar(angle: f64, radius: f64) -> (f64, f64) {
    (radius * angle.cos(), radius * angle.sin())
}

pub fn render(path: &Path, layout: &PlotLayout, chart: &RadarChart) -> ReportResult<()> {
    render_with_backend!(path, layout, draw, chart)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &PlotLayout,
    data: &RadarChart,
) -> ReportResult<()> {
    let n_axes = data.axes.len();

    let mut chart = ChartBuilder::on(root)
        .caption(&data.title, theme::caption_style(layout))
        .margin(25)
        .margin_top(theme::header_margin(layout))
        .build_cartesian_2d(-1.45f64..1.45, -1.35f64..1.35)
        .map_err(draw_err)?;

    theme::draw_subtitle(root, &data.subtitle, layout)?;

    // No mesh: the rings and spokes are the grid.
    for ring in 1..=RINGS {
        let radius = ring as f64 / RINGS as f64;
        let outline: Vec<(f64, f64)> = (0..=120)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / 120.0;
                polar(angle, radius)
            })
            .collect();
        chart
            .draw_series(std::iter::once(PathElement::new(
                outline,
                BLACK.mix(0.2).stroke_width(1),
            )))
            .map_err(draw_err)?;
    }

    let tick_style = theme::tick_style(layout).pos(Pos::new(HPos::Left, VPos::Center));
    for ring in 1..=RINGS {
        let radius = ring as f64 / RINGS as f64;
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{:.2}", radius),
                (0.02, radius + 0.02),
                tick_style.clone(),
            )))
            .map_err(draw_err)?;
    }

    for (i, axis) in data.axes.iter().enumerate() {
        let angle = spoke_angle(i, n_axes);
        let tip = polar(angle, 1.0);
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(0.0, 0.0), tip],
                BLACK.mix(0.3).stroke_width(1),
            )))
            .map_err(draw_err)?;

        let label_pos = polar(angle, 1.12);
        let hpos = if label_pos.0 < -0.1 {
            HPos::Right
        } else if label_pos.0 > 0.1 {
            HPos::Left
        } else {
            HPos::Center
        };
        let style = theme::axis_desc_style(layout).pos(Pos::new(hpos, VPos::Center));
        chart
            .draw_series(std::iter::once(Text::new(
                axis.clone(),
                label_pos,
                style,
            )))
            .map_err(draw_err)?;
    }

    for group in &data.groups {
        let color = group.color;
        let mut polygon: Vec<(f64, f64)> = group
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| polar(spoke_angle(i, n_axes), v.clamp(0.0, 1.0)))
            .collect();
        polygon.push(polygon[0]);

        chart
            .draw_series(std::iter::once(Polygon::new(
                polygon.clone(),
                color.mix(0.25).filled(),
            )))
            .map_err(draw_err)?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                polygon.clone(),
                color.stroke_width(3),
            )))
            .map_err(draw_err)?
            .label(&group.label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3))
            });
        chart
            .draw_series(
                polygon
                    .iter()
                    .take(n_axes)
                    .map(|&p| Circle::new(p, 4, color.filled())),
            )
            .map_err(draw_err)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.9))
        .border_style(&BLACK)
        .label_font(theme::legend_style(layout))
        .position(SeriesLabelPosition::LowerRight)
        .draw()
        .map_err(draw_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_spoke_points_up() {
        let (x, y) = polar(spoke_angle(0, 5), 1.0);
        assert!(x.abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spokes_are_evenly_spaced() {
        let step = spoke_angle(0, 4) - spoke_angle(1, 4);
        assert!((step - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
