//! Pie-chart rendering for a [`CompositionMap`].
//!
//! Slices start at 12 o'clock and run clockwise in the map's display order
//! (largest share first), each sized by its share of the positive total.
//! The chart is a plain RGBA raster with a transparent background; labels
//! are left to the caller, who can pair [`palette_color`] with the same
//! slice order to draw a legend.

use crate::composition::CompositionMap;
use crate::error::AnalysisError;
use image::{ImageFormat, Rgba, RgbaImage};
use std::f64::consts::TAU;
use std::path::Path;
use tracing::debug;

/// Slice colours, cycled when there are more slices than entries.
pub const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Colour of the `index`-th slice.
pub fn palette_color(index: usize) -> [u8; 3] {
    PALETTE[index % PALETTE.len()]
}

/// Draw `map` as a `size × size` pie chart.
///
/// Returns `None` when there is nothing positive to draw.
pub fn render_pie_chart(map: &CompositionMap, size: u32) -> Option<RgbaImage> {
    let slices = map.chart_slices();
    if slices.is_empty() || size == 0 {
        return None;
    }

    // Cumulative end of each slice as a fraction of the full turn.
    let mut ends = Vec::with_capacity(slices.len());
    let mut acc = 0.0;
    for slice in &slices {
        acc += slice.fraction;
        ends.push(acc);
    }

    let center = size as f64 / 2.0;
    let radius = (center - 1.0).max(0.5);
    let mut img = RgbaImage::from_pixel(size, size, BACKGROUND);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - center;
        let dy = y as f64 + 0.5 - center;
        if dx * dx + dy * dy > radius * radius {
            continue;
        }
        let mut angle = dx.atan2(-dy);
        if angle < 0.0 {
            angle += TAU;
        }
        let turn = angle / TAU;
        let idx = ends
            .iter()
            .position(|&end| turn < end)
            .unwrap_or(ends.len() - 1);
        let [r, g, b] = palette_color(idx);
        *pixel = Rgba([r, g, b, 255]);
    }

    debug!("Rendered pie chart with {} slices at {}px", slices.len(), size);
    Some(img)
}

/// Render and save the chart as PNG.
///
/// Returns `Ok(false)` without touching the file system when the map has
/// nothing to draw.
pub fn write_pie_chart(map: &CompositionMap, path: &Path, size: u32) -> Result<bool, AnalysisError> {
    let Some(img) = render_pie_chart(map, size) else {
        return Ok(false);
    };
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| AnalysisError::OutputWriteFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    Ok(true)
}
