//! Font resolution and glyph metrics.
//!
//! `FontResolver` walks a priority list (remote Unicode font, OS fonts,
//! built-in bitmap font) and never fails. `FontHandle` measures and draws
//! text, reporting `GlyphError::Unsupported` instead of silently dropping
//! glyphs the font cannot render.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use log::{debug, info, warn};
use once_cell::sync::{Lazy, OnceCell};
use rusttype::{point, Font, GlyphId, Scale};

use crate::bitmap_font::BitmapFont;
use crate::error::{Error, GlyphError, Result};

pub const NOTO_SANS_URL: &str =
    "https://github.com/notofonts/noto-fonts/raw/main/hinted/ttf/NotoSans/NotoSans-Regular.ttf";

/// Well-known OS font locations, tried in order after the remote font.
pub const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\seguisym.ttf",
    "C:\\Windows\\Fonts\\msgothic.ttc",
];

/// Reference pair whose ink height defines a line.
const LINE_REFERENCE: &str = "Ay";

/// Pixel extent of a measured string.
///
/// `width`/`height` are ink bounds; `advance` is where the next glyph would start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
    pub advance: f32,
}

/// A font resolved at a concrete pixel size.
#[derive(Clone)]
pub enum FontHandle {
    Outline { font: Font<'static>, px: u32, scale: Scale },
    Bitmap { font: BitmapFont, px: u32 },
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontHandle::Outline { px, .. } => f.debug_struct("Outline").field("px", px).finish(),
            FontHandle::Bitmap { font, px } => f
                .debug_struct("Bitmap")
                .field("px", px)
                .field("scale", &font.scale())
                .finish(),
        }
    }
}

impl FontHandle {
    /// Sizes an outline font so that its em square is `px` pixels tall.
    pub fn outline(font: Font<'static>, px: u32) -> Self {
        let em = f32::from(font.units_per_em());
        let vm = font.v_metrics_unscaled();
        let height = if em > 0.0 {
            px as f32 * (vm.ascent - vm.descent) / em
        } else {
            px as f32
        };
        FontHandle::Outline { font, px, scale: Scale::uniform(height) }
    }

    pub fn bitmap(px: u32) -> Self {
        FontHandle::Bitmap { font: BitmapFont::at_size(px), px }
    }

    /// Requested pixel size this handle was resolved at.
    pub fn size(&self) -> u32 {
        match self {
            FontHandle::Outline { px, .. } | FontHandle::Bitmap { px, .. } => *px,
        }
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self, FontHandle::Bitmap { .. })
    }

    pub fn measure(&self, text: &str) -> std::result::Result<TextExtent, GlyphError> {
        match self {
            FontHandle::Outline { font, scale, .. } => outline_extent(font, *scale, text),
            FontHandle::Bitmap { font, .. } => font.measure(text),
        }
    }

    /// Height of one text line, or `None` if the reference glyphs are missing.
    pub fn line_height(&self) -> Option<f32> {
        self.measure(LINE_REFERENCE).ok().map(|ext| ext.height)
    }

    /// Draws `text` with its top-left (ascender line) at (`x`, `y`).
    pub fn draw(
        &self,
        img: &mut RgbaImage,
        x: i64,
        y: i64,
        text: &str,
        color: Rgba<u8>,
    ) -> std::result::Result<(), GlyphError> {
        match self {
            FontHandle::Outline { font, scale, .. } => {
                check_coverage(font, text)?;
                let ascent = font.v_metrics(*scale).ascent;
                let origin = point(x as f32, y as f32 + ascent);
                for glyph in font.layout(text, *scale, origin) {
                    if let Some(bb) = glyph.pixel_bounding_box() {
                        glyph.draw(|gx, gy, v| {
                            let px = i64::from(bb.min.x) + i64::from(gx);
                            let py = i64::from(bb.min.y) + i64::from(gy);
                            blend_pixel(img, px, py, color, v);
                        });
                    }
                }
                Ok(())
            }
            FontHandle::Bitmap { font, .. } => font.draw(img, x, y, text, color),
        }
    }
}

fn check_coverage(font: &Font<'static>, text: &str) -> std::result::Result<(), GlyphError> {
    match text.chars().find(|&ch| font.glyph(ch).id() == GlyphId(0)) {
        Some(ch) => Err(GlyphError::Unsupported(ch)),
        None => Ok(()),
    }
}

fn outline_extent(
    font: &Font<'static>,
    scale: Scale,
    text: &str,
) -> std::result::Result<TextExtent, GlyphError> {
    check_coverage(font, text)?;
    let ascent = font.v_metrics(scale).ascent;
    let glyphs: Vec<_> = font.layout(text, scale, point(0.0, ascent)).collect();
    let advance = glyphs
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0);

    let ink = glyphs
        .iter()
        .filter_map(|g| g.pixel_bounding_box())
        .fold(None, |acc: Option<(i32, i32, i32, i32)>, bb| {
            Some(match acc {
                None => (bb.min.x, bb.min.y, bb.max.x, bb.max.y),
                Some((x0, y0, x1, y1)) => {
                    (x0.min(bb.min.x), y0.min(bb.min.y), x1.max(bb.max.x), y1.max(bb.max.y))
                }
            })
        });

    Ok(match ink {
        Some((x0, y0, x1, y1)) => TextExtent {
            width: (x1 - x0) as f32,
            height: (y1 - y0) as f32,
            advance,
        },
        None => TextExtent { width: advance, height: 0.0, advance },
    })
}

/// Composites `color` over the pixel at (`x`, `y`) with the given coverage.
/// Out-of-bounds coordinates are ignored.
pub(crate) fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= i64::from(img.width()) || y >= i64::from(img.height()) {
        return;
    }
    let a = coverage.clamp(0.0, 1.0) * f32::from(color[3]) / 255.0;
    if a <= 0.0 {
        return;
    }
    let dst = img.get_pixel_mut(x as u32, y as u32);
    let da = f32::from(dst[3]) / 255.0;
    let out_a = a + da * (1.0 - a);
    for i in 0..3 {
        let c = f32::from(color[i]) * a + f32::from(dst[i]) * da * (1.0 - a);
        dst[i] = (c / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

/// Capability that makes a Unicode-capable font file available locally.
pub trait FontSource: Send + Sync {
    /// Path of the acquired font, or `None` when acquisition failed.
    fn acquire(&self) -> Option<PathBuf>;
}

/// Font fetched over HTTP once and kept at `cache_path` for later runs.
pub struct RemoteFont {
    url: String,
    cache_path: PathBuf,
    fetched: OnceCell<Option<PathBuf>>,
}

impl RemoteFont {
    pub fn new(url: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            cache_path: cache_path.into(),
            fetched: OnceCell::new(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn fetch(&self) -> Result<PathBuf> {
        if is_nonempty_file(&self.cache_path) {
            debug!("reusing cached font {}", self.cache_path.display());
            return Ok(self.cache_path.clone());
        }

        info!("downloading font from {}", self.url);
        let response = ureq::get(&self.url)
            .call()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Err(Error::Fetch("downloaded font file is empty".into()));
        }

        // a concurrent process may be reading cache_path
        let partial = self.cache_path.with_extension("part");
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, &self.cache_path)?;
        Ok(self.cache_path.clone())
    }
}

impl FontSource for RemoteFont {
    fn acquire(&self) -> Option<PathBuf> {
        self.fetched
            .get_or_init(|| match self.fetch() {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("font acquisition from {} failed: {e}", self.url);
                    None
                }
            })
            .clone()
    }
}

fn is_nonempty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Process-wide Noto Sans download, fetched on first use.
pub static UNICODE_FONT: Lazy<Arc<RemoteFont>> = Lazy::new(|| {
    Arc::new(RemoteFont::new(
        NOTO_SANS_URL,
        std::env::temp_dir().join("NotoSans-Regular.ttf"),
    ))
});

/// Picks a usable font from a priority list; always returns something drawable.
pub struct FontResolver {
    remote: Option<Arc<dyn FontSource>>,
    candidates: Vec<PathBuf>,
    face: OnceCell<Option<Font<'static>>>,
}

impl FontResolver {
    pub fn new(remote: Option<Arc<dyn FontSource>>, candidates: Vec<PathBuf>) -> Self {
        Self { remote, candidates, face: OnceCell::new() }
    }

    /// Remote Noto Sans first, then the OS font paths.
    pub fn system() -> Self {
        let remote: Arc<dyn FontSource> = UNICODE_FONT.clone();
        Self::new(
            Some(remote),
            SYSTEM_FONT_PATHS.iter().map(PathBuf::from).collect(),
        )
    }

    /// Resolver that only ever yields the built-in bitmap font.
    pub fn bitmap_only() -> Self {
        Self::new(None, Vec::new())
    }

    pub fn resolve(&self, px: u32) -> FontHandle {
        let px = px.max(1);
        match self.face.get_or_init(|| self.load_first()) {
            Some(font) => FontHandle::outline(font.clone(), px),
            None => FontHandle::bitmap(px),
        }
    }

    fn load_first(&self) -> Option<Font<'static>> {
        let remote = self.remote.as_ref().and_then(|source| source.acquire());

        let mut failed = Vec::new();
        for path in remote.iter().chain(self.candidates.iter()) {
            if !path.exists() {
                continue;
            }
            match load_font(path) {
                Ok(font) => {
                    info!("using font {}", path.display());
                    return Some(font);
                }
                Err(reason) => failed.push(format!("{}: {reason}", path.display())),
            }
        }

        if !failed.is_empty() {
            warn!("failed to load the following fonts:");
            for fail in &failed {
                warn!("- {fail}");
            }
        }
        info!("no outline font available, using built-in bitmap font");
        None
    }
}

fn load_font(path: &Path) -> std::result::Result<Font<'static>, String> {
    let data = fs::read(path).map_err(|e| e.to_string())?;
    Font::try_from_vec(data).ok_or_else(|| "not a parseable TrueType/OpenType font".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        path: Option<PathBuf>,
    }

    impl FontSource for CountingSource {
        fn acquire(&self) -> Option<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.path.clone()
        }
    }

    #[test]
    fn no_candidates_yields_bitmap_font() {
        let resolver = FontResolver::bitmap_only();
        let handle = resolver.resolve(40);
        assert!(handle.is_bitmap());
        assert_eq!(handle.size(), 40);
        assert_eq!(handle.line_height(), Some(35.0));
    }

    #[test]
    fn zero_size_is_clamped() {
        assert_eq!(FontResolver::bitmap_only().resolve(0).size(), 1);
    }

    #[test]
    fn unparseable_and_missing_candidates_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        fs::write(&bogus, b"definitely not a font").unwrap();
        let missing = dir.path().join("missing.ttf");

        let resolver = FontResolver::new(None, vec![missing, bogus]);
        assert!(resolver.resolve(20).is_bitmap());
    }

    #[test]
    fn remote_source_is_consulted_once() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), path: None });
        let remote: Arc<dyn FontSource> = source.clone();
        let resolver = Arc::new(FontResolver::new(Some(remote), Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || resolver.resolve(10 + i).is_bitmap())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_font_reuses_cached_file() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("NotoSans-Regular.ttf");
        fs::write(&cached, b"cached bytes").unwrap();

        let remote = RemoteFont::new("not a url", &cached);
        assert_eq!(remote.acquire(), Some(cached));
    }

    #[test]
    fn remote_font_failure_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let remote = RemoteFont::new("not a url", dir.path().join("font.ttf"));
        assert_eq!(remote.acquire(), None);
        assert_eq!(remote.acquire(), None);
        assert!(!remote.cache_path().exists());
    }

    #[test]
    fn blend_respects_alpha() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        blend_pixel(&mut img, 0, 0, Rgba([0, 0, 0, 255]), 1.0);
        blend_pixel(&mut img, 1, 0, Rgba([0, 0, 0, 255]), 0.5);
        blend_pixel(&mut img, 5, 5, Rgba([0, 0, 0, 255]), 1.0);
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(1, 0), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn system_font_measures_when_available() {
        let path = Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf");
        if !path.exists() {
            return;
        }
        let resolver = FontResolver::new(None, vec![path.to_path_buf()]);
        let handle = resolver.resolve(30);
        assert!(!handle.is_bitmap());
        let short = handle.measure("ab").unwrap();
        let long = handle.measure("abab").unwrap();
        assert!(long.width > short.width);
        assert!(handle.line_height().unwrap() > 0.0);
    }
}
