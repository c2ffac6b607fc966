//! Multi-metric ROC comparison chart with an AUC legend and a random
//! baseline.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::charts::{draw_err, render_with_backend, theme, PlotLayout};
use crate::models::ReportResult;

pub struct RocSeries {
    pub label: String,
    pub color: RGBColor,
    pub fprs: Vec<f64>,
    pub tprs: Vec<f64>,
    pub auc: f64,
}

pub struct RocChart {
    pub title: String,
    pub subtitle: String,
    /// Sorted by descending AUC before rendering so the legend reads
    /// best-first.
    pub series: Vec<RocSeries>,
}

pub fn render(path: &Path, layout: &PlotLayout, chart: &RocChart) -> ReportResult<()> {
    render_with_backend!(path, layout, draw, chart)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &PlotLayout,
    data: &RocChart,
) -> ReportResult<()> {
    let mut chart = ChartBuilder::on(root)
        .caption(&data.title, theme::caption_style(layout))
        .margin(15)
        .margin_top(theme::header_margin(layout))
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)
        .map_err(draw_err)?;

    theme::draw_subtitle(root, &data.subtitle, layout)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("False Positive Rate")
        .y_desc("True Positive Rate")
        .axis_desc_style(theme::axis_desc_style(layout))
        .label_style(theme::tick_style(layout))
        .draw()
        .map_err(draw_err)?;

    // Curves first so they appear above the random baseline in the legend.
    for series in &data.series {
        let color = series.color;
        chart
            .draw_series(LineSeries::new(
                series.fprs.iter().zip(series.tprs.iter()).map(|(&x, &y)| (x, y)),
                color.stroke_width(3),
            ))
            .map_err(draw_err)?
            .label(format!("{} (AUC = {:.3})", series.label, series.auc))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 25, y)], color.stroke_width(3))
            });
    }

    chart
        .draw_series(LineSeries::new(
            vec![(0.0, 0.0), (1.0, 1.0)],
            BLACK.mix(0.25).stroke_width(2),
        ))
        .map_err(draw_err)?
        .label("Random (AUC = 0.500)")
        .legend(|(x, y)| {
            PathElement::new(vec![(x, y), (x + 25, y)], BLACK.mix(0.25).stroke_width(2))
        });

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
