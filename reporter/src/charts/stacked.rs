//! 100%-stacked composition bars: each x level is normalized to percent so
//! bars compare category mix rather than counts.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::charts::{draw_err, render_with_backend, theme, PlotLayout};
use crate::models::ReportResult;

pub struct StackedSegment {
    pub label: String,
    pub color: RGBColor,
    /// One count per x level, in `x_levels` order. Normalization to percent
    /// happens at draw time.
    pub counts: Vec<u64>,
}

pub struct StackedChart {
    pub title: String,
    pub subtitle: String,
    pub x_label: String,
    pub x_levels: Vec<String>,
    pub segments: Vec<StackedSegment>,
}

pub fn render(path: &Path, layout: &PlotLayout, chart: &StackedChart) -> ReportResult<()> {
    render_with_backend!(path, layout, draw, chart)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &PlotLayout,
    data: &StackedChart,
) -> ReportResult<()> {
    let n = data.x_levels.len();
    let totals: Vec<f64> = (0..n)
        .map(|i| data.segments.iter().map(|s| s.counts[i] as f64).sum::<f64>().max(1.0))
        .collect();

    let mut chart = ChartBuilder::on(root)
        .caption(&data.title, theme::caption_style(layout))
        .margin(15)
        .margin_top(theme::header_margin(layout))
        .x_label_area_size(70)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.6f64..(n as f64 - 0.4), 0f64..100f64)
        .map_err(draw_err)?;

    theme::draw_subtitle(root, &data.subtitle, layout)?;

    let levels = data.x_levels.clone();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(&data.x_label)
        .y_desc("Percent of submissions")
        .axis_desc_style(theme::axis_desc_style(layout))
        .label_style(theme::tick_style(layout))
        .y_label_formatter(&|y| format!("{}%", *y as u32))
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

    let pct_style = (theme::FONT, theme::scaled(theme::TICK_SIZE, layout))
        .into_font()
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));

    let mut bottoms = vec![0f64; n];
    for segment in &data.segments {
        let color = segment.color;
        let bars: Vec<(f64, f64, f64)> = (0..n)
            .filter(|&i| segment.counts[i] > 0)
            .map(|i| {
                let pct = segment.counts[i] as f64 / totals[i] * 100.0;
                (i as f64, bottoms[i], pct)
            })
            .collect();

        chart
            .draw_series(bars.iter().map(|&(x, bottom, pct)| {
                Rectangle::new([(x - 0.4, bottom), (x + 0.4, bottom + pct)], color.filled())
            }))
            .map_err(draw_err)?
            .label(&segment.label)
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 14, y + 6)], color.filled())
            });
        chart
            .draw_series(bars.iter().map(|&(x, bottom, pct)| {
                Rectangle::new([(x - 0.4, bottom), (x + 0.4, bottom + pct)], BLACK)
            }))
            .map_err(draw_err)?;
        chart
            .draw_series(bars.iter().filter(|&&(_, _, pct)| pct >= 5.0).map(
                |&(x, bottom, pct)| {
                    Text::new(
                        format!("{:.0}%", pct),
                        (x, bottom + pct / 2.0),
                        pct_style.clone(),
                    )
                },
            ))
            .map_err(draw_err)?;

        for i in 0..n {
            bottoms[i] += segment.counts[i] as f64 / totals[i] * 100.0;
        }
    }

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
