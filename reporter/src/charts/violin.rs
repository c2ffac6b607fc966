//! Violin chart: mirrored KDE outlines per group with median and quartile
//! markers. Test annotations are passed in as text.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::charts::density::{gaussian_kde, grid_over};
use crate::charts::{draw_err, render_with_backend, theme, PlotLayout};
use crate::models::ReportResult;

pub struct ViolinGroup {
    pub label: String,
    pub color: RGBColor,
    pub values: Vec<f64>,
}

pub struct ViolinChart {
    pub title: String,
    pub subtitle: String,
    pub y_label: String,
    pub groups: Vec<ViolinGroup>,
    /// Omnibus-test summary drawn in the top-left corner.
    pub annotation: String,
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() as f64 - 1.0) * q;
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    if idx + 1 < sorted.len() {
        sorted[idx] * (1.0 - frac) + sorted[idx + 1] * frac
    } else {
        sorted[idx]
    }
}

pub fn render(path: &Path, layout: &PlotLayout, chart: &ViolinChart) -> ReportResult<()> {
    render_with_backend!(path, layout, draw, chart)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &PlotLayout,
    data: &ViolinChart,
) -> ReportResult<()> {
    let n = data.groups.len();
    let all: Vec<f64> = data.groups.iter().flat_map(|g| g.values.iter().copied()).collect();
    let min = all.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = all.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let pad = (max - min).max(f64::EPSILON) * 0.1;

    let mut chart = ChartBuilder::on(root)
        .caption(&data.title, theme::caption_style(layout))
        .margin(15)
        .margin_top(theme::header_margin(layout))
        .x_label_area_size(70)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.6f64..(n as f64 - 0.4), (min - pad)..(max + pad))
        .map_err(draw_err)?;

    theme::draw_subtitle(root, &data.subtitle, layout)?;

    let labels: Vec<String> = data.groups.iter().map(|g| g.label.clone()).collect();
    chart
        .configure_mesh()
        .disable_mesh()
        .y_desc(&data.y_label)
        .axis_desc_style(theme::axis_desc_style(layout))
        .label_style(theme::tick_style(layout))
        .x_labels(n)
        .x_label_formatter(&move |x| {
            let idx = x.round() as i64;
            if idx >= 0 && (idx as usize) < labels.len() && (x - idx as f64).abs() < 0.3 {
                labels[idx as usize].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(draw_err)?;

    for (i, group) in data.groups.iter().enumerate() {
        let center = i as f64;
        let grid = {
            let g_min = group.values.iter().cloned().fold(f64::INFINITY, f64::min);
            let g_max = group.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            grid_over(g_min, g_max, 80)
        };
        let density = gaussian_kde(&group.values, &grid);
        let peak = density.iter().cloned().fold(0.0f64, f64::max).max(1e-12);

        // Mirrored outline: left side down, right side up.
        let half_width = 0.38;
        let mut outline: Vec<(f64, f64)> = grid
            .iter()
            .zip(density.iter())
            .map(|(&y, &d)| (center - half_width * d / peak, y))
            .collect();
        outline.extend(
            grid.iter()
                .zip(density.iter())
                .rev()
                .map(|(&y, &d)| (center + half_width * d / peak, y)),
        );

        chart
            .draw_series(std::iter::once(Polygon::new(
                outline.clone(),
                group.color.mix(0.55).filled(),
            )))
            .map_err(draw_err)?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                outline,
                group.color.stroke_width(2),
            )))
            .map_err(draw_err)?;

        let mut sorted = group.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(center - 0.03, q1), (center + 0.03, q3)],
                BLACK.mix(0.6).filled(),
            )))
            .map_err(draw_err)?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(center - 0.1, median), (center + 0.1, median)],
                WHITE.stroke_width(2),
            )))
            .map_err(draw_err)?;
    }

    if !data.annotation.is_empty() {
        let style = theme::annotation_style(layout).pos(Pos::new(HPos::Left, VPos::Top));
        chart
            .draw_series(std::iter::once(Text::new(
                data.annotation.clone(),
                (-0.55, max + pad * 0.8),
                style,
            )))
            .map_err(draw_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&sorted, 1.0) - 4.0).abs() < 1e-12);
    }
}
