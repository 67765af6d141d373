//! # SDF Font Tools
//!
//! Tools for serving signed distance field glyphs computed by
//! [`sdf_outline_renderer`] to a text renderer.
//!
//! * [`GlyphFieldCache`] computes each `(glyph, resolution, band)` field once, no matter how many
//!   threads ask for it at the same time, and evicts according to a pluggable
//!   [`EvictionPolicy`].
//! * [`get_fields`] fetches a run of glyphs from async code, using tokio's blocking pool for the
//!   actual rasterization.
//! * [`FieldAtlas`] packs quantised fields into a single texture for upload.
//! * [`Renderer`] is a CPU reference for the shading a GPU would do with those textures:
//!   alpha testing, smoothstep antialiasing, outlines, and simple line layout.
//!
//! ## References
//!   * [Improved Alpha-Tested Magnification for Vector Textures and Special Effects](https://steamcdn-a.akamaihd.net/apps/valve/2007/SIGGRAPH2007_AlphaTestedMagnification.pdf)
//!   * [Drawing Text with Signed Distance Fields in Mapbox GL](https://blog.mapbox.com/drawing-text-with-signed-distance-fields-in-mapbox-gl-b0933af6f817)

mod atlas;
mod cache;
mod error;
mod renderer;
mod tools;

// Re-export the core renderer
pub use sdf_outline_renderer;

pub use crate::atlas::*;
pub use crate::cache::*;
pub use crate::error::SdfFontError;
pub use crate::renderer::*;
pub use crate::tools::*;
