use image::Rgba;

use crate::error::{Error, Result};

/// QR redundancy tier. Higher levels survive more damage but hold less data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EcLevel {
    L,
    M,
    Q,
    #[default]
    H,
}

impl EcLevel {
    /// Reads the leading letter of a level name such as `"M"` or `"Q (25%)"`.
    /// Anything unrecognised falls back to `H`.
    pub fn parse(s: &str) -> Self {
        match s.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('L') => EcLevel::L,
            Some('M') => EcLevel::M,
            Some('Q') => EcLevel::Q,
            _ => EcLevel::H,
        }
    }
}

impl From<EcLevel> for qrcode::EcLevel {
    fn from(level: EcLevel) -> Self {
        match level {
            EcLevel::L => qrcode::EcLevel::L,
            EcLevel::M => qrcode::EcLevel::M,
            EcLevel::Q => qrcode::EcLevel::Q,
            EcLevel::H => qrcode::EcLevel::H,
        }
    }
}

/// Largest starting font size a label accepts.
pub const MAX_FONT_PX: u32 = 1000;
/// Grid bounds per printed page.
pub const MAX_GRID_ROWS: u32 = 20;
pub const MAX_GRID_COLS: u32 = 10;

/// Fully resolved layout parameters for one batch of labels.
///
/// - `width`, `height`: label canvas in pixels
/// - `margin`: padding around the QR block and the text area
/// - `font_size`: starting font size for shrink-to-fit
/// - `qr_size`: side of the square QR block
/// - `border_*`: optional rectangle inset by `border_margin`
#[derive(Debug, Clone, PartialEq)]
pub struct LabelConfig {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub font_size: u32,
    pub qr_size: u32,
    pub draw_border: bool,
    pub border_width: u32,
    pub border_margin: u32,
    pub error_correction: EcLevel,
    pub qr_color: Rgba<u8>,
    pub text_color: Rgba<u8>,
    pub background: Rgba<u8>,
    pub border_color: Rgba<u8>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 200,
            margin: 5,
            font_size: 50,
            qr_size: 185,
            draw_border: true,
            border_width: 4,
            border_margin: 5,
            error_correction: EcLevel::H,
            qr_color: Rgba([0, 0, 0, 255]),
            text_color: Rgba([0, 0, 0, 255]),
            background: Rgba([255, 255, 255, 255]),
            border_color: Rgba([0, 0, 0, 255]),
        }
    }
}

impl LabelConfig {
    /// Checks the size invariants a caller must uphold before rendering.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.width == 0 || self.height == 0 {
            return invalid(format!("label size {}x{} must be positive", self.width, self.height));
        }
        if self.font_size == 0 || self.font_size > MAX_FONT_PX {
            return invalid(format!(
                "font size {} outside 1..={MAX_FONT_PX}",
                self.font_size
            ));
        }
        if self.qr_size == 0 {
            return invalid("QR size must be positive".into());
        }
        let needed = u64::from(self.qr_size) + 2 * u64::from(self.margin);
        if needed > u64::from(self.width) {
            return invalid(format!(
                "QR size {} plus margins {} exceeds label width {}",
                self.qr_size,
                needed - u64::from(self.qr_size),
                self.width
            ));
        }
        if self.draw_border && self.border_width == 0 {
            return invalid("border enabled with zero width".into());
        }
        Ok(())
    }
}

/// Labels per printed page and the gap around each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    pub spacing: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { rows: 3, cols: 2, spacing: 20 }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_GRID_ROWS).contains(&self.rows) || !(1..=MAX_GRID_COLS).contains(&self.cols) {
            return Err(Error::InvalidConfig(format!(
                "grid {}x{} outside 1..={MAX_GRID_ROWS} rows, 1..={MAX_GRID_COLS} cols",
                self.rows, self.cols
            )));
        }
        Ok(())
    }
}

/// Resolution and JPEG quality of the assembled document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfConfig {
    pub dpi: u32,
    pub quality: u8,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { dpi: 150, quality: 95 }
    }
}

/// Parses `#RRGGBB` plus an opacity percentage (0-100) into RGBA.
pub fn parse_hex_color(hex: &str, opacity_percent: u8) -> Option<Rgba<u8>> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = (u16::from(opacity_percent.min(100)) * 255 / 100) as u8;
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ec_level_reads_leading_letter() {
        assert_eq!(EcLevel::parse("L (7%)"), EcLevel::L);
        assert_eq!(EcLevel::parse("m"), EcLevel::M);
        assert_eq!(EcLevel::parse("Q"), EcLevel::Q);
        assert_eq!(EcLevel::parse("H (30%)"), EcLevel::H);
    }

    #[test]
    fn unknown_ec_level_defaults_to_h() {
        assert_eq!(EcLevel::parse("X"), EcLevel::H);
        assert_eq!(EcLevel::parse(""), EcLevel::H);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(LabelConfig::default().validate().is_ok());
    }

    #[test]
    fn qr_wider_than_label_is_rejected() {
        let cfg = LabelConfig { width: 190, ..LabelConfig::default() };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn font_size_is_bounded() {
        let huge = LabelConfig { font_size: 1_000_000_000, ..LabelConfig::default() };
        assert!(matches!(huge.validate(), Err(Error::InvalidConfig(_))));

        let largest = LabelConfig { font_size: MAX_FONT_PX, ..LabelConfig::default() };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn qr_taller_than_label_is_allowed() {
        let cfg = LabelConfig { height: 100, ..LabelConfig::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn huge_margin_does_not_overflow() {
        let cfg = LabelConfig { margin: u32::MAX, ..LabelConfig::default() };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn grid_bounds() {
        assert!(GridConfig::default().validate().is_ok());
        assert!(GridConfig { rows: 20, cols: 10, spacing: 0 }.validate().is_ok());
        assert!(GridConfig { rows: 0, ..GridConfig::default() }.validate().is_err());
        assert!(GridConfig { rows: 21, ..GridConfig::default() }.validate().is_err());
        assert!(GridConfig { cols: 11, ..GridConfig::default() }.validate().is_err());
    }

    #[test]
    fn zero_border_width_only_allowed_without_border() {
        let with_border = LabelConfig { border_width: 0, ..LabelConfig::default() };
        assert!(with_border.validate().is_err());

        let without = LabelConfig {
            draw_border: false,
            border_width: 0,
            border_margin: 0,
            ..LabelConfig::default()
        };
        assert!(without.validate().is_ok());
    }

    #[test]
    fn hex_color_with_opacity() {
        assert_eq!(parse_hex_color("#FF8000", 100), Some(Rgba([255, 128, 0, 255])));
        assert_eq!(parse_hex_color("000000", 50), Some(Rgba([0, 0, 0, 127])));
        assert_eq!(parse_hex_color("#12345", 100), None);
        assert_eq!(parse_hex_color("#GG0000", 100), None);
    }
}
