//! QR label sheets: render text + QR code labels from tabular input and
//! pack them into printable PDF pages.
//!
//! Main modules:
//! - records: input decoding and CSV/TSV/text splitting
//! - font: font resolution, metrics and glyph drawing
//! - fit: shrink-to-fit word wrapping
//! - qr: QR bitmap encoding
//! - label: single label composition
//! - grid: packing labels into pages
//! - pdf: multi-page document assembly
//! - sheet: batch pipeline tying it together

pub mod bitmap_font;
pub mod config;
pub mod error;
pub mod fit;
pub mod font;
pub mod grid;
pub mod label;
pub mod pdf;
pub mod qr;
pub mod records;
pub mod sheet;

/// Layout, grid and document settings
pub use config::{EcLevel, GridConfig, LabelConfig, PdfConfig};
pub use error::{Error, GlyphError, Result};
pub use fit::{FittedLayout, TextFitter};
/// Font resolution (remote Unicode font, OS fonts, bitmap fallback)
pub use font::{FontHandle, FontResolver, FontSource, RemoteFont};
pub use label::LabelRenderer;
pub use records::{read_records, Ingest, Record};
/// Batch API: records to labels, pages and PDF bytes
pub use sheet::LabelSheet;
