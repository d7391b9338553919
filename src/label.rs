use image::imageops;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{debug, warn};

use crate::config::LabelConfig;
use crate::fit::{FittedLayout, TextFitter};
use crate::font::{FontHandle, FontResolver};
use crate::qr;
use crate::records::Record;

/// Composes one label image per record: background, border, QR code on the
/// right and shrink-to-fit text on the left.
pub struct LabelRenderer<'a> {
    resolver: &'a FontResolver,
}

impl<'a> LabelRenderer<'a> {
    pub fn new(resolver: &'a FontResolver) -> Self {
        Self { resolver }
    }

    /// Renders `record`. Never fails: QR overflow leaves the QR block empty,
    /// text overflow and missing glyphs degrade the text.
    pub fn render(&self, record: &Record, config: &LabelConfig) -> RgbaImage {
        let mut label = RgbaImage::from_pixel(config.width, config.height, config.background);

        if config.draw_border {
            draw_border(&mut label, config);
        }

        let margin = i64::from(config.margin);
        let height = i64::from(config.height);
        let qr_x = i64::from(config.width) - i64::from(config.qr_size) - margin;
        let qr_y = (height - i64::from(config.qr_size)).div_euclid(2);
        match qr::encode(
            &record.qr_text,
            config.error_correction,
            config.qr_color,
            config.qr_size,
        ) {
            Ok(code) => {
                let code = DynamicImage::ImageRgb8(code).into_rgba8();
                imageops::replace(&mut label, &code, qr_x, qr_y);
            }
            Err(e) => warn!("no QR code for {:?}: {e}", record.label_text),
        }

        let area_width = (qr_x - margin * 2) as f32;
        let area_height = (height - margin * 2) as f32;
        let layout = TextFitter::new(self.resolver).fit(
            &record.label_text,
            area_width,
            area_height,
            config.font_size,
        );
        draw_layout(&mut label, &layout, margin * 2, height, config.text_color);

        label
    }
}

/// Outline `border_width` pixels thick, inset by `border_margin`.
fn draw_border(label: &mut RgbaImage, config: &LabelConfig) {
    let (w, h) = (i64::from(config.width), i64::from(config.height));
    for i in 0..i64::from(config.border_width) {
        let inset = i64::from(config.border_margin) + i;
        let (rw, rh) = (w - 2 * inset, h - 2 * inset);
        if rw <= 0 || rh <= 0 {
            break;
        }
        let rect = Rect::at(inset as i32, inset as i32).of_size(rw as u32, rh as u32);
        draw_hollow_rect_mut(label, rect, config.border_color);
    }
}

/// Left-aligned lines, vertically centred as a block in the label.
fn draw_layout(label: &mut RgbaImage, layout: &FittedLayout, x: i64, height: i64, color: Rgba<u8>) {
    let y_start = ((height as f32 - layout.block_height()) / 2.0).floor();
    let step = layout.line_height + layout.line_spacing;
    for (i, line) in layout.lines.iter().enumerate() {
        let y = (y_start + i as f32 * step) as i64;
        draw_line(label, &layout.font, x, y, line, color);
    }
}

/// Draws the whole line, or glyph by glyph when the font cannot draw it all.
/// Unsupported chars leave a gap of half the font size.
fn draw_line(label: &mut RgbaImage, font: &FontHandle, x: i64, y: i64, line: &str, color: Rgba<u8>) {
    let Err(e) = font.draw(label, x, y, line, color) else {
        return;
    };
    debug!("drawing {:?} glyph by glyph: {e}", line);

    let fallback_advance = (font.size() / 2) as f32;
    let mut cursor = x as f32;
    let mut buf = [0u8; 4];
    for ch in line.chars() {
        let glyph = ch.encode_utf8(&mut buf);
        let advance = match font.draw(label, cursor as i64, y, glyph, color) {
            Ok(()) => font.measure(glyph).map(|ext| ext.advance).unwrap_or(fallback_advance),
            Err(_) => fallback_advance,
        };
        cursor += advance;
    }
}
