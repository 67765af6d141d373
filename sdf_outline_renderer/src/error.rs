use std::time::Duration;

use thiserror::Error;

use crate::GlyphId;

#[derive(Clone, Debug, Error)]
pub enum SdfGlyphError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Rasterization exceeded its deadline of {0:?}; the partial field was discarded.")]
    Timeout(Duration),

    #[error("No outline is available for glyph {0}")]
    UnknownGlyph(GlyphId),

    #[error("The distance band must be finite and greater than zero, but {0} was provided.")]
    InvalidBand(f64),

    #[error("Invalid field resolution: {0}x{1} (both dimensions must be non-zero).")]
    InvalidResolution(u32, u32),

    #[error("Cutoff values must be between 0 and 1 (both non-inclusive), but {0} was provided.")]
    InvalidCutoff(f64),

    #[error("Rasterization of glyph {0} panicked before the field was published")]
    RasterizationPanicked(GlyphId),

    #[cfg(feature = "freetype")]
    #[error("The loaded glyph has no vector outline")]
    MissingOutline,

    #[cfg(feature = "freetype")]
    #[error("FreeType error: {0}")]
    FreeTypeError(#[from] freetype::Error),
}

impl SdfGlyphError {
    pub(crate) fn geometry(message: impl Into<String>) -> SdfGlyphError {
        SdfGlyphError::InvalidGeometry(message.into())
    }
}
