use sdf_outline_renderer::GlyphId;

#[derive(thiserror::Error, Debug)]
pub enum SdfFontError {
    #[error("SDF glyph error: {0}")]
    SdfGlyphError(#[from] sdf_outline_renderer::SdfGlyphError),
    #[error("Sub-process error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("Glyph {glyph} ({width}x{height}) does not fit in a {atlas_width}x{atlas_height} atlas")]
    AtlasFull {
        glyph: GlyphId,
        width: u32,
        height: u32,
        atlas_width: u32,
        atlas_height: u32,
    },
    #[error("Atlas dimensions must fit in an i32, but {width}x{height} with padding {padding} was provided.")]
    InvalidAtlasSize { width: u32, height: u32, padding: u32 },
    #[error("Pixels per glyph unit must be finite, greater than zero and yield an image of bounded size, but {0} was provided.")]
    InvalidScale(f64),
}
