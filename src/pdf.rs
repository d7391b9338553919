use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, RgbaImage};
use log::info;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::config::PdfConfig;
use crate::error::Result;

/// Writes one JPEG-compressed image page per grid page.
///
/// Returns `Ok(None)` when there is nothing to assemble. Page size follows the
/// pixel size at `dpi`; `quality` (1-100) is the JPEG quality.
pub fn assemble(pages: &[RgbaImage], settings: PdfConfig) -> Result<Option<Vec<u8>>> {
    if pages.is_empty() {
        return Ok(None);
    }
    let dpi = settings.dpi.max(1) as f32;
    let quality = settings.quality.clamp(1, 100);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (w, h) = page.dimensions();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&flatten(page))?;

        let image_id = doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(w),
                    "Height" => i64::from(h),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
            .with_compression(false),
        );

        let (w_pt, h_pt) = (w as f32 * 72.0 / dpi, h as f32 * 72.0 / dpi);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w_pt.into(), 0.into(), 0.into(), h_pt.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w_pt.into(), h_pt.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        },
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    info!("assembled {} pages into {} bytes", pages.len(), buffer.len());
    Ok(Some(buffer))
}

/// Composites RGBA over white; JPEG has no alpha channel.
fn flatten(page: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(page.width(), page.height(), |x, y| {
        let p = page.get_pixel(x, y);
        let a = u32::from(p[3]);
        let over_white = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([over_white(p[0]), over_white(p[1]), over_white(p[2])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn page(color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(150, 300, color)
    }

    #[test]
    fn nothing_to_assemble() {
        assert!(assemble(&[], PdfConfig::default()).unwrap().is_none());
    }

    #[test]
    fn one_page_per_grid() {
        let pages = vec![page(Rgba([255, 255, 255, 255])), page(Rgba([0, 0, 0, 255]))];
        let bytes = assemble(&pages, PdfConfig::default()).unwrap().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn media_box_follows_dpi() {
        let bytes = assemble(&[page(Rgba([255, 255, 255, 255]))], PdfConfig { dpi: 150, quality: 80 })
            .unwrap()
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let media_box = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        // 150x300 px at 150 dpi = 1x2 inches
        assert_eq!(media_box[2].as_float().unwrap(), 72.0);
        assert_eq!(media_box[3].as_float().unwrap(), 144.0);
    }

    #[test]
    fn transparency_flattens_to_white() {
        let flat = flatten(&RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(*flat.get_pixel(0, 0), Rgb([255, 255, 255]));
        let opaque = flatten(&RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255])));
        assert_eq!(*opaque.get_pixel(0, 0), Rgb([10, 20, 30]));
    }
}
