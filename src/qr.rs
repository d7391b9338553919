use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, Rgba};
use log::debug;
use qrcode::bits::Bits;
use qrcode::types::{QrError, QrResult, Version};
use qrcode::QrCode;

use crate::config::EcLevel;
use crate::error::Result;

/// Pixels per module in the native render, before resampling.
const MODULE_PX: u32 = 10;

/// Encodes `text` into a `target`×`target` QR bitmap.
///
/// The payload goes in as UTF-8 bytes in byte mode at the smallest version
/// that holds it. If byte mode overflows, the encoder retries with mixed
/// numeric/alphanumeric segments, which packs digits and upper-case text tighter.
/// Light modules are always opaque white; `fill` alpha is ignored.
pub fn encode(text: &str, level: EcLevel, fill: Rgba<u8>, target: u32) -> Result<RgbImage> {
    let ec = qrcode::EcLevel::from(level);
    let code = match byte_mode(text.as_bytes(), ec) {
        Ok(code) => code,
        Err(e) => {
            debug!("byte-mode QR failed ({e}), retrying with segment optimisation");
            QrCode::with_error_correction_level(text, ec)?
        }
    };

    let native = code
        .render::<Rgb<u8>>()
        .dark_color(Rgb([fill[0], fill[1], fill[2]]))
        .light_color(Rgb([255, 255, 255]))
        .module_dimensions(MODULE_PX, MODULE_PX)
        .quiet_zone(true)
        .build();
    Ok(imageops::resize(&native, target, target, FilterType::Nearest))
}

fn byte_mode(data: &[u8], ec: qrcode::EcLevel) -> QrResult<QrCode> {
    for v in 1..=40 {
        let mut bits = Bits::new(Version::Normal(v));
        if bits.push_byte_data(data).is_err() || bits.push_terminator(ec).is_err() {
            continue;
        }
        return QrCode::with_bits(bits, ec);
    }
    Err(QrError::DataTooLong)
}
