//! This crate computes signed distance fields (SDFs) for font glyphs directly from their vector
//! outlines, in the spirit of the technique popularised by
//! [Valve](https://steamcdn-a.akamaihd.net/apps/valve/2007/SIGGRAPH2007_AlphaTestedMagnification.pdf)
//! and used for map labels by
//! [Mapbox](https://blog.mapbox.com/drawing-text-with-signed-distance-fields-in-mapbox-gl-b0933af6f817).
//!
//! Unlike bitmap-based generators, nothing is rasterized first: every sample is the exact
//! Euclidean distance from the cell centre to the nearest point on the outline's line,
//! quadratic and cubic Bézier segments. Lines and quadratics are solved in closed form; cubics
//! use a bounded, deterministic numeric search. The sign comes from a separate nonzero-winding
//! classification, so a poorly conditioned nearest-point query can never flip a cell from
//! inside to outside.
//!
//! Fields are normalised to the range [-1.0, 1.0] in units of a caller-chosen distance band:
//! negative inside the glyph, positive outside, `+1.0` for anything a full band or more away.
//! [`clamp_to_u8`] packs them into bytes for texture upload.
//!
//! Outlines can be built by hand with [`ContourBuilder`], or loaded from any FreeType-readable
//! font when the optional `freetype` feature is enabled.

mod contour;
pub use crate::contour::*;

mod error;
pub use crate::error::SdfGlyphError;

mod field;
pub use crate::field::*;

mod geometry;
pub use crate::geometry::{Bounds, Point};

mod nearest;
pub use crate::nearest::*;

mod rasterizer;
pub use crate::rasterizer::*;

mod segment;
pub use crate::segment::Segment;

mod sign;
pub use crate::sign::*;

#[cfg(feature = "freetype")]
mod ft;
#[cfg(feature = "freetype")]
pub use crate::ft::*;

// Re-export freetype crate if the feature is enabled
#[cfg(feature = "freetype")]
pub use freetype;

#[cfg(test)]
mod fixtures;
