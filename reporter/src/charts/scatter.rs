//! Scatterplot with an optional least-squares fit line and a correlation
//! annotation box. Also used for 2-D embedding projections.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::charts::{draw_err, render_with_backend, theme, PlotLayout};
use crate::models::ReportResult;

pub struct ScatterSeries {
    pub label: String,
    pub color: RGBColor,
    pub points: Vec<(f64, f64)>,
}

pub struct ScatterChart {
    pub title: String,
    pub subtitle: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ScatterSeries>,
    /// Fit line endpoints in data coordinates, precomputed by the caller.
    pub fit_line: Option<[(f64, f64); 2]>,
    /// Statistics text drawn in the top-left corner.
    pub annotation: String,
    /// Draw a legend only when categories are distinguished.
    pub show_legend: bool,
}

pub fn render(path: &Path, layout: &PlotLayout, chart: &ScatterChart) -> ReportResult<()> {
    render_with_backend!(path, layout, draw, chart)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &PlotLayout,
    data: &ScatterChart,
) -> ReportResult<()> {
    let xs: Vec<f64> = data.series.iter().flat_map(|s| s.points.iter().map(|p| p.0)).collect();
    let ys: Vec<f64> = data.series.iter().flat_map(|s| s.points.iter().map(|p| p.1)).collect();
    let x_min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let x_max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let y_min = ys.iter().cloned().fold(f64::INFINITY, f64::min);
    let y_max = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let x_pad = (x_max - x_min).max(f64::EPSILON) * 0.06;
    let y_pad = (y_max - y_min).max(f64::EPSILON) * 0.06;

    let mut chart = ChartBuilder::on(root)
        .caption(&data.title, theme::caption_style(layout))
        .margin(15)
        .margin_top(theme::header_margin(layout))
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(
            (x_min - x_pad)..(x_max + x_pad),
            (y_min - y_pad)..(y_max + y_pad),
        )
        .map_err(draw_err)?;

    theme::draw_subtitle(root, &data.subtitle, layout)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(&data.x_label)
        .y_desc(&data.y_label)
        .axis_desc_style(theme::axis_desc_style(layout))
        .label_style(theme::tick_style(layout))
        .draw()
        .map_err(draw_err)?;

    for series in &data.series {
        let color = series.color;
        chart
            .draw_series(
                series
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, color.mix(0.75).filled())),
            )
            .map_err(draw_err)?
            .label(&series.label)
            .legend(move |(x, y)| Circle::new((x + 7, y), 4, color.filled()));
    }

    if let Some([a, b]) = data.fit_line {
        chart
            .draw_series(LineSeries::new(
                vec![a, b],
                BLACK.mix(0.5).stroke_width(2),
            ))
            .map_err(draw_err)?;
    }

    if !data.annotation.is_empty() {
        let style = theme::annotation_style(layout).pos(Pos::new(HPos::Left, VPos::Top));
        chart
            .draw_series(std::iter::once(Text::new(
                data.annotation.clone(),
                (x_min - x_pad * 0.8, y_max + y_pad * 0.8),
                style,
            )))
            .map_err(draw_err)?;
    }

    if data.show_legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.9))
            .border_style(&BLACK)
            .label_font(theme::legend_style(layout))
            .position(SeriesLabelPosition::LowerRight)
            .draw()
            .map_err(draw_err)?;
    }

    Ok(())
}
