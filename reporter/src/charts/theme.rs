//! Shared visual theme: white background, dark gray text, bold titles, the
//! blog-post subtitle blue, black chart spines.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::charts::{draw_err, PlotLayout};
use crate::metrics::{SUBTITLE_COLOR, TEXT_COLOR};
use crate::models::ReportResult;

pub const FONT: &str = "sans-serif";
pub const FONT_BOLD: &str = "sans-serif bold";

pub const TITLE_SIZE: u32 = 26;
pub const SUBTITLE_SIZE: u32 = 20;
pub const AXIS_LABEL_SIZE: u32 = 18;
pub const TICK_SIZE: u32 = 14;
pub const LEGEND_SIZE: u32 = 15;
pub const ANNOTATION_SIZE: u32 = 15;

pub fn scaled(base: u32, layout: &PlotLayout) -> u32 {
    ((base as f64 * layout.font_scale()).round() as u32).max(8)
}

pub fn caption_style(layout: &PlotLayout) -> TextStyle<'static> {
    (FONT_BOLD, scaled(TITLE_SIZE, layout))
        .into_font()
        .color(&TEXT_COLOR)
}

pub fn axis_desc_style(layout: &PlotLayout) -> TextStyle<'static> {
    (FONT_BOLD, scaled(AXIS_LABEL_SIZE, layout))
        .into_font()
        .color(&TEXT_COLOR)
}

pub fn tick_style(layout: &PlotLayout) -> TextStyle<'static> {
    (FONT, scaled(TICK_SIZE, layout)).into_font().color(&TEXT_COLOR)
}

pub fn legend_style(layout: &PlotLayout) -> TextStyle<'static> {
    (FONT, scaled(LEGEND_SIZE, layout)).into_font().color(&TEXT_COLOR)
}

pub fn annotation_style(layout: &PlotLayout) -> TextStyle<'static> {
    (FONT, scaled(ANNOTATION_SIZE, layout))
        .into_font()
        .color(&TEXT_COLOR)
}

/// Subtitle line under the caption, centered, in the theme blue.
pub fn draw_subtitle<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    subtitle: &str,
    layout: &PlotLayout,
) -> ReportResult<()> {
    if subtitle.is_empty() {
        return Ok(());
    }
    let style = (FONT, scaled(SUBTITLE_SIZE, layout))
        .into_font()
        .color(&SUBTITLE_COLOR)
        .pos(Pos::new(HPos::Center, VPos::Top));
    let (width, _) = root.dim_in_pixel();
    root.draw(&Text::new(
        subtitle.to_string(),
        (width as i32 / 2, scaled(TITLE_SIZE, layout) as i32 + 14),
        style,
    ))
    .map_err(draw_err)?;
    Ok(())
}

/// Vertical space the caption and subtitle occupy, used as the chart's top
/// margin.
pub fn header_margin(layout: &PlotLayout) -> u32 {
    scaled(TITLE_SIZE, layout) + scaled(SUBTITLE_SIZE, layout) + 24
}
