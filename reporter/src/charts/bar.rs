//! Stacked bar chart of submission counts, with per-segment count labels and
//! a percent annotation above each bar.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::charts::{draw_err, render_with_backend, theme, PlotLayout};
use crate::metrics::SUBTITLE_COLOR;
use crate::models::ReportResult;

pub struct BarSegment {
    pub label: String,
    pub color: RGBColor,
    /// One count per x level, in `x_levels` order.
    pub counts: Vec<u64>,
}

pub struct BarChart {
    pub title: String,
    pub subtitle: String,
    pub x_label: String,
    pub y_label: String,
    pub x_levels: Vec<String>,
    pub segments: Vec<BarSegment>,
    /// Annotation above each bar, e.g. "42% binders"; empty strings are
    /// skipped.
    pub percent_labels: Vec<String>,
}

pub fn render(path: &Path, layout: &PlotLayout, chart: &BarChart) -> ReportResult<()> {
    render_with_backend!(path, layout, draw, chart)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &PlotLayout,
    data: &BarChart,
) -> ReportResult<()> {
    let n = data.x_levels.len();
    let totals: Vec<u64> = (0..n)
        .map(|i| data.segments.iter().map(|s| s.counts[i]).sum())
        .collect();
    let y_max = (*totals.iter().max().unwrap_or(&1) as f64 * 1.18).max(1.0);

    let mut chart = ChartBuilder::on(root)
        .caption(&data.title, theme::caption_style(layout))
        .margin(15)
        .margin_top(theme::header_margin(layout))
        .x_label_area_size(70)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.6f64..(n as f64 - 0.4), 0f64..y_max)
        .map_err(draw_err)?;

    theme::draw_subtitle(root, &data.subtitle, layout)?;

    let levels = data.x_levels.clone();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(&data.x_label)
        .y_desc(&data.y_label)
        .axis_desc_style(theme::axis_desc_style(layout))
        .label_style(theme::tick_style(layout))
        .x_labels(n)
        .x_label_formatter(&move |x| {
            let idx = x.round() as i64;
            if idx >= 0 && (idx as usize) < levels.len() && (x - idx as f64).abs() < 0.3 {
                levels[idx as usize].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(draw_err)?;

    let count_style = (theme::FONT, theme::scaled(theme::TICK_SIZE, layout))
        .into_font()
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));

    let mut bottoms = vec![0f64; n];
    for segment in &data.segments {
        let color = segment.color;
        let bars: Vec<(f64, f64, f64)> = (0..n)
            .filter(|&i| segment.counts[i] > 0)
            .map(|i| (i as f64, bottoms[i], segment.counts[i] as f64))
            .collect();

        chart
            .draw_series(bars.iter().map(|&(x, bottom, count)| {
                Rectangle::new([(x - 0.4, bottom), (x + 0.4, bottom + count)], color.filled())
            }))
            .map_err(draw_err)?
            .label(&segment.label)
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 14, y + 6)], color.filled())
            });
        // Black outlines, drawn separately so the legend keeps the fill.
        chart
            .draw_series(bars.iter().map(|&(x, bottom, count)| {
                Rectangle::new([(x - 0.4, bottom), (x + 0.4, bottom + count)], BLACK)
            }))
            .map_err(draw_err)?;
        chart
            .draw_series(
                bars.iter()
                    .filter(|&&(_, _, count)| count >= y_max * 0.03)
                    .map(|&(x, bottom, count)| {
                        Text::new(
                            format!("{}", count as u64),
                            (x, bottom + count / 2.0),
                            count_style.clone(),
                        )
                    }),
            )
            .map_err(draw_err)?;

        for i in 0..n {
            bottoms[i] += segment.counts[i] as f64;
        }
    }

    let percent_style = (theme::FONT_BOLD, theme::scaled(theme::ANNOTATION_SIZE, layout))
        .into_font()
        .color(&SUBTITLE_COLOR)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    chart
        .draw_series(data.percent_labels.iter().enumerate().filter(|(_, l)| !l.is_empty()).map(
            |(i, label)| {
                Text::new(
                    label.clone(),
                    (i as f64, totals[i] as f64 + y_max * 0.02),
                    percent_style.clone(),
                )
            },
        ))
        .map_err(draw_err)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.9))
        .border_style(&BLACK)
        .label_font(theme::legend_style(layout))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(draw_err)?;

    Ok(())
}
