//! Shrink-to-fit line wrapping for label text.

use log::debug;

use crate::config::MAX_FONT_PX;
use crate::font::{FontHandle, FontResolver};

/// Smallest font size the fitter will shrink to.
pub const MIN_FONT_PX: u32 = 10;
/// Number of sizes tried before accepting an overflowing layout.
pub const MAX_ATTEMPTS: usize = 5;
/// Gap between lines as a fraction of the line height.
pub const LINE_SPACING_RATIO: f32 = 0.1;

/// Wrapped text ready to draw.
#[derive(Debug, Clone)]
pub struct FittedLayout {
    pub lines: Vec<String>,
    pub font: FontHandle,
    pub font_size: u32,
    pub line_height: f32,
    pub line_spacing: f32,
    /// Set when even the last attempt did not fit the area.
    pub overflow: bool,
}

impl FittedLayout {
    /// Height of all lines plus the gaps between them.
    pub fn block_height(&self) -> f32 {
        let n = self.lines.len() as f32;
        if n == 0.0 {
            return 0.0;
        }
        n * self.line_height + (n - 1.0) * self.line_spacing
    }
}

/// Fits text into a rectangle by wrapping words and shrinking the font.
pub struct TextFitter<'a> {
    resolver: &'a FontResolver,
}

impl<'a> TextFitter<'a> {
    pub fn new(resolver: &'a FontResolver) -> Self {
        Self { resolver }
    }

    /// Tries up to `MAX_ATTEMPTS` sizes starting at `start_px`, each 10% smaller,
    /// stopping below `MIN_FONT_PX`. Returns the first layout that fits, or the
    /// last one attempted. `start_px` is clamped to `MIN_FONT_PX..=MAX_FONT_PX`.
    pub fn fit(&self, text: &str, area_width: f32, area_height: f32, start_px: u32) -> FittedLayout {
        let mut size = start_px.clamp(MIN_FONT_PX, MAX_FONT_PX);
        let mut attempt = 0;
        loop {
            let layout = self.layout_at(text, area_width, area_height, size);
            attempt += 1;
            if !layout.overflow {
                return layout;
            }

            let next = size * 9 / 10;
            if attempt >= MAX_ATTEMPTS || next < MIN_FONT_PX {
                debug!(
                    "text {:?} still overflows at {}px after {} attempts",
                    text, size, attempt
                );
                return layout;
            }
            size = next;
        }
    }

    fn layout_at(&self, text: &str, area_width: f32, area_height: f32, size: u32) -> FittedLayout {
        let font = self.resolver.resolve(size);
        let lines = wrap_words(&font, text, area_width);

        let line_height = font.line_height().unwrap_or(size as f32);
        let line_spacing = line_height * LINE_SPACING_RATIO;

        let mut layout = FittedLayout {
            lines,
            font,
            font_size: size,
            line_height,
            line_spacing,
            overflow: false,
        };
        let too_wide = layout
            .lines
            .iter()
            .any(|line| line_width(&layout.font, line, area_width) > area_width);
        layout.overflow = too_wide || layout.block_height() > area_height;
        layout
    }
}

/// Width of `line`, or just past `area_width` when the font cannot measure it.
fn line_width(font: &FontHandle, line: &str, area_width: f32) -> f32 {
    match font.measure(line) {
        Ok(ext) => ext.width,
        Err(_) => area_width + 1.0,
    }
}

/// Greedy word wrap. A word wider than the area still gets its own line.
pub fn wrap_words(font: &FontHandle, text: &str, area_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        let trial = if cur.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", cur, word)
        };
        if line_width(font, &trial, area_width) <= area_width {
            cur = trial;
        } else {
            if !cur.is_empty() {
                lines.push(cur);
            }
            cur = word.to_string();
        }
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}
