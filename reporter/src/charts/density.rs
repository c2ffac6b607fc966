//! Overlaid kernel-density curves per category, plus the gaussian KDE helper
//! shared with the violin chart.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::charts::{draw_err, render_with_backend, theme, PlotLayout};
use crate::models::ReportResult;

pub struct DensitySeries {
    pub label: String,
    pub color: RGBColor,
    pub values: Vec<f64>,
}

pub struct DensityChart {
    pub title: String,
    pub subtitle: String,
    pub x_label: String,
    pub series: Vec<DensitySeries>,
}

/// Silverman's rule-of-thumb bandwidth.
pub fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n < 2.0 {
        return 1.0;
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    let sd = var.sqrt();
    if sd <= 0.0 {
        return 1.0;
    }
    0.9 * sd * n.powf(-0.2)
}

/// Gaussian kernel density estimate evaluated at `grid`.
pub fn gaussian_kde(values: &[f64], grid: &[f64]) -> Vec<f64> {
    let h = silverman_bandwidth(values);
    let n = values.len() as f64;
    let norm = 1.0 / (n * h * (2.0 * std::f64::consts::PI).sqrt());
    grid.iter()
        .map(|&x| {
            values
                .iter()
                .map(|&v| {
                    let z = (x - v) / h;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm
        })
        .collect()
}

pub fn grid_over(min: f64, max: f64, points: usize) -> Vec<f64> {
    let span = (max - min).max(f64::EPSILON);
    let pad = span * 0.1;
    let start = min - pad;
    let step = (span + 2.0 * pad) / (points - 1) as f64;
    (0..points).map(|i| start + step * i as f64).collect()
}

pub fn render(path: &Path, layout: &PlotLayout, chart: &DensityChart) -> ReportResult<()> {
    render_with_backend!(path, layout, draw, chart)
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &PlotLayout,
    data: &DensityChart,
) -> ReportResult<()> {
    let all: Vec<f64> = data.series.iter().flat_map(|s| s.values.iter().copied()).collect();
    let min = all.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = all.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let grid = grid_over(min, max, 200);

    let curves: Vec<(usize, Vec<f64>)> = data
        .series
        .iter()
        .enumerate()
        .map(|(i, s)| (i, gaussian_kde(&s.values, &grid)))
        .collect();
    let y_max = curves
        .iter()
        .flat_map(|(_, d)| d.iter().copied())
        .fold(0.0f64, f64::max)
        * 1.1;

    let mut chart = ChartBuilder::on(root)
        .caption(&data.title, theme::caption_style(layout))
        .margin(15)
        .margin_top(theme::header_margin(layout))
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(grid[0]..grid[grid.len() - 1], 0f64..y_max.max(1e-9))
        .map_err(draw_err)?;

    theme::draw_subtitle(root, &data.subtitle, layout)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(&data.x_label)
        .y_desc("Density")
        .axis_desc_style(theme::axis_desc_style(layout))
        .label_style(theme::tick_style(layout))
        .draw()
        .map_err(draw_err)?;

    for (idx, density) in &curves {
        let series = &data.series[*idx];
        let color = series.color;
        chart
            .draw_series(LineSeries::new(
                grid.iter().zip(density.iter()).map(|(&x, &y)| (x, y)),
                color.stroke_width(3),
            ))
            .map_err(draw_err)?
            .label(format!("{} (n = {})", series.label, series.values.len()))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3))
            });
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kde_integrates_to_roughly_one() {
        let values = vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0];
        let grid = grid_over(-3.0, 6.0, 500);
        let density = gaussian_kde(&values, &grid);
        let step = grid[1] - grid[0];
        let integral: f64 = density.iter().sum::<f64>() * step;
        assert!((integral - 1.0).abs() < 0.05, "integral = {}", integral);
    }

    #[test]
    fn kde_peaks_near_the_data() {
        let values = vec![5.0, 5.1, 4.9, 5.0];
        let grid = grid_over(0.0, 10.0, 101);
        let density = gaussian_kde(&values, &grid);
        let peak_idx = density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert!((grid[peak_idx] - 5.0).abs() < 0.5);
    }
}
