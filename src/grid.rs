use image::imageops;
use image::{Rgba, RgbaImage};
use log::debug;

use crate::config::{GridConfig, MAX_GRID_COLS, MAX_GRID_ROWS};
use crate::error::{Error, Result};

/// US Letter at 150 dpi, in pixels.
pub const LETTER_AT_150_DPI: (u32, u32) = (1275, 1650);

const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Packs labels row-major into pages of `rows`×`cols` cells with `spacing`
/// around every cell. All labels are assumed to share the first label's size.
/// The last page keeps its unused cells blank.
///
/// Fails when the grid is out of bounds or the page would not fit in `u32` pixels.
pub fn paginate(labels: &[RgbaImage], grid: GridConfig) -> Result<Vec<RgbaImage>> {
    grid.validate()?;
    let Some(first) = labels.first() else {
        return Ok(Vec::new());
    };
    let (label_w, label_h) = first.dimensions();
    let (rows, cols, spacing) = (grid.rows, grid.cols, grid.spacing);

    let (Some(page_w), Some(page_h)) = (
        page_len(cols, label_w, spacing),
        page_len(rows, label_h, spacing),
    ) else {
        return Err(Error::InvalidConfig(format!(
            "{rows}x{cols} grid of {label_w}x{label_h} labels with spacing {spacing} is too large"
        )));
    };
    let per_page = (rows * cols) as usize;

    let pages: Vec<RgbaImage> = labels
        .chunks(per_page)
        .map(|chunk| {
            let mut page = RgbaImage::from_pixel(page_w, page_h, PAGE_BACKGROUND);
            for (idx, label) in chunk.iter().enumerate() {
                let (row, col) = (idx as u32 / cols, idx as u32 % cols);
                let x = spacing + col * (label_w + spacing);
                let y = spacing + row * (label_h + spacing);
                imageops::replace(&mut page, label, i64::from(x), i64::from(y));
            }
            page
        })
        .collect();
    debug!("{} labels packed into {} pages", labels.len(), pages.len());
    Ok(pages)
}

/// `cells * len + (cells + 1) * spacing`, or `None` on overflow.
fn page_len(cells: u32, len: u32, spacing: u32) -> Option<u32> {
    cells
        .checked_mul(len)?
        .checked_add(cells.checked_add(1)?.checked_mul(spacing)?)
}

/// Largest (rows, cols) grid of labels that fits a page, at least 1×1 and
/// at most `MAX_GRID_ROWS`×`MAX_GRID_COLS`.
pub fn max_grid_for_page(page: (u32, u32), label: (u32, u32), spacing: u32) -> (u32, u32) {
    let fit = |avail: u32, len: u32, max: u32| {
        (avail.saturating_sub(spacing) / len.saturating_add(spacing).max(1)).clamp(1, max)
    };
    (
        fit(page.1, label.1, MAX_GRID_ROWS),
        fit(page.0, label.0, MAX_GRID_COLS),
    )
}
