use thiserror::Error;

/// Errors surfaced to the caller. Rendering never produces these; only
/// ingestion, configuration and document assembly do.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input contains no data")]
    EmptyInput,

    #[error("invalid label config: {0}")]
    InvalidConfig(String),

    #[error("QR encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("font download failed: {0}")]
    Fetch(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a measure/draw call the resolved font cannot satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GlyphError {
    #[error("font has no glyph for {0:?}")]
    Unsupported(char),
}
