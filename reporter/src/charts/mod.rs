//! Rendering stage: themed plotters charts writing PNG or SVG artifacts.
//!
//! Chart modules draw what they are given; statistics arrive precomputed and
//! text overlays arrive as plain strings.

pub mod bar;
pub mod density;
pub mod radar;
pub mod roc;
pub mod scatter;
pub mod stacked;
pub mod theme;
pub mod violin;

use std::fs::create_dir_all;
use std::path::Path;

use crate::models::{PlotFormat, ReportError, ReportResult};

/// Layout parameters shared by every chart: pixel dimensions, nominal DPI
/// (scales fonts), and output format.
#[derive(Debug, Clone)]
pub struct PlotLayout {
    pub width: u32,
    pub height: u32,
    pub res: u32,
    pub format: PlotFormat,
}

impl PlotLayout {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Font scale factor relative to the 300 DPI the theme was designed at.
    pub fn font_scale(&self) -> f64 {
        self.res as f64 / 300.0
    }
}

impl Default for PlotLayout {
    fn default() -> Self {
        PlotLayout {
            width: 1300,
            height: 1100,
            res: 300,
            format: PlotFormat::Png,
        }
    }
}

pub(crate) fn prepare_output(path: &Path) -> ReportResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub(crate) fn draw_err<E: std::fmt::Display>(e: E) -> ReportError {
    ReportError::Data(format!("drawing failed: {}", e))
}

/// Dispatch a generic draw function over the two backends. `$draw` must be a
/// function generic over the drawing backend.
macro_rules! render_with_backend {
    ($path:expr, $layout:expr, $draw:ident, $data:expr) => {{
        $crate::charts::prepare_output($path)?;
        match $layout.format {
            $crate::models::PlotFormat::Png => {
                let root = plotters::prelude::IntoDrawingArea::into_drawing_area(
                    plotters_bitmap::BitMapBackend::new($path, $layout.size()),
                );
                root.fill(&plotters::prelude::WHITE)
                    .map_err($crate::charts::draw_err)?;
                $draw(&root, $layout, $data)?;
                root.present().map_err($crate::charts::draw_err)?;
            }
            $crate::models::PlotFormat::Svg => {
                let root = plotters::prelude::IntoDrawingArea::into_drawing_area(
                    plotters_svg::SVGBackend::new($path, $layout.size()),
                );
                root.fill(&plotters::prelude::WHITE)
                    .map_err($crate::charts::draw_err)?;
                $draw(&root, $layout, $data)?;
                root.present().map_err($crate::charts::draw_err)?;
            }
        }
        tracing::info!("Wrote {}", $path.display());
        Ok(())
    }};
}

pub(crate) use render_with_backend;
