//! CPU reference shading of distance fields.
//!
//! These mirror what a fragment shader sampling an SDF texture would do, and
//! are mostly useful for previews, golden-image tests and headless rendering.

use std::sync::Arc;

use log::warn;
use sdf_outline_renderer::{Bounds, DistanceField, FieldParams, GlyphId, Point};

use crate::{GlyphFieldCache, SdfFontError};

/// An 8-bit straight-alpha colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Rgba {
        Rgba { r, g, b, a }
    }

    /// Linear blend towards `other`; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn mix(self, other: Rgba, t: f64) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgba {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
            a: channel(self.a, other.a),
        }
    }
}

/// How a normalised distance (negative inside) becomes coverage.
///
/// Edges and widths are in normalised field units, so `0.0` is the outline
/// and `0.5` is half a band outside it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Technique {
    /// Hard cut at `threshold`, as with alpha testing.
    AlphaTest { threshold: f64 },
    /// Antialiased edge: a smoothstep `softness` wide on either side of `edge`.
    Smoothstep { edge: f64, softness: f64 },
    /// Antialiased edge plus an outline band of `outline_width` just inside
    /// it, drawn in the outline colour.
    Outlined {
        edge: f64,
        outline_width: f64,
        softness: f64,
    },
    /// The raw field as a gradient: -1 is fully covered, +1 uncovered.
    Linear,
    /// Inside or outside, with no antialiasing.
    Monochrome,
}

impl Default for Technique {
    fn default() -> Self {
        Technique::Smoothstep {
            edge: 0.0,
            softness: 0.05,
        }
    }
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge0 == edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

impl Technique {
    /// Fraction of the pixel covered by the glyph, in `[0, 1]`.
    #[must_use]
    pub fn coverage(&self, value: f64) -> f64 {
        match *self {
            Technique::AlphaTest { threshold } => {
                if value <= threshold {
                    1.0
                } else {
                    0.0
                }
            }
            Technique::Smoothstep { edge, softness } | Technique::Outlined { edge, softness, .. } => {
                1.0 - smoothstep(edge - softness, edge + softness, value)
            }
            Technique::Linear => ((1.0 - value) * 0.5).clamp(0.0, 1.0),
            Technique::Monochrome => {
                if value <= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// How much of the outline colour (rather than the fill) to use.
    fn outline_weight(&self, value: f64) -> f64 {
        match *self {
            Technique::Outlined {
                edge,
                outline_width,
                softness,
            } => {
                let inner = edge - outline_width;
                smoothstep(inner - softness, inner + softness, value)
            }
            _ => 0.0,
        }
    }
}

/// A rendered image, row-major with the top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgba>,
}

impl RgbaImage {
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// Shades distance fields on the CPU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Renderer {
    pub technique: Technique,
    pub fill: Rgba,
    pub outline: Rgba,
    pub background: Rgba,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer {
            technique: Technique::default(),
            fill: Rgba::BLACK,
            outline: Rgba::new(153, 153, 0, 255),
            background: Rgba::TRANSPARENT,
        }
    }
}

impl Renderer {
    #[must_use]
    pub fn new(technique: Technique) -> Renderer {
        Renderer {
            technique,
            ..Renderer::default()
        }
    }

    /// The colour of a pixel whose normalised distance is `value`.
    #[must_use]
    pub fn shade(&self, value: f64) -> Rgba {
        let ink = self
            .fill
            .mix(self.outline, self.technique.outline_weight(value));
        self.background.mix(ink, self.technique.coverage(value))
    }

    /// Shades every cell of `field`, one pixel per cell.
    #[must_use]
    pub fn render_field(&self, field: &DistanceField) -> RgbaImage {
        RgbaImage {
            width: field.width(),
            height: field.height(),
            pixels: field.values().iter().map(|v| self.shade(*v)).collect(),
        }
    }

    /// Lays out `ids` left to right along a common baseline, advancing by
    /// each glyph's advance width, and renders the run at `pixels_per_unit`
    /// pixels per glyph unit.
    ///
    /// Fields come from `cache` (falling back to the placeholder for glyphs
    /// that fail), are resampled bilinearly, and overlapping glyphs combine as
    /// a union. Ids the cache has no outline for are skipped.
    pub fn render_line(
        &self,
        cache: &GlyphFieldCache,
        ids: &[GlyphId],
        params: FieldParams,
        pixels_per_unit: f64,
    ) -> Result<RgbaImage, SdfFontError> {
        if !(pixels_per_unit.is_finite() && pixels_per_unit > 0.0) {
            return Err(SdfFontError::InvalidScale(pixels_per_unit));
        }
        params.validate()?;

        let mut placed: Vec<(f64, Bounds, Arc<DistanceField>)> = Vec::with_capacity(ids.len());
        let mut pen = 0.0;
        let mut extent: Option<Bounds> = None;
        for &id in ids {
            let Some(glyph) = cache.glyph(id) else {
                warn!("Skipping glyph {id}, which has no outline");
                continue;
            };
            if let Some(bounds) = glyph.bounds() {
                let field = cache.get_or_placeholder(id, params);
                let reach = bounds.inflate(params.band);
                let shifted = Bounds {
                    min: reach.min + Point::new(pen, 0.0),
                    max: reach.max + Point::new(pen, 0.0),
                };
                extent = Some(extent.map_or(shifted, |e| e.union(shifted)));
                placed.push((pen, reach, field));
            }
            pen += glyph.advance();
        }

        let extent = extent.unwrap_or(Bounds {
            min: Point::ZERO,
            max: Point::ZERO,
        });
        let extent = Bounds {
            min: Point::new(extent.min.x.min(0.0), extent.min.y),
            max: Point::new(extent.max.x.max(pen), extent.max.y),
        };
        let (width, height) = image_size(extent, pixels_per_unit)?;

        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for py in 0..height {
            let y = extent.max.y - (f64::from(py) + 0.5) / pixels_per_unit;
            for px in 0..width {
                let x = extent.min.x + (f64::from(px) + 0.5) / pixels_per_unit;
                let value = placed
                    .iter()
                    .filter_map(|(origin, reach, field)| {
                        let local = Point::new(x - origin, y);
                        reach.contains(local).then(|| field.sample(local))
                    })
                    .fold(1.0, f64::min);
                pixels.push(self.shade(value));
            }
        }

        Ok(RgbaImage {
            width,
            height,
            pixels,
        })
    }
}

/// Largest image [`Renderer::render_line`] will allocate.
pub const MAX_IMAGE_PIXELS: u64 = 1 << 30;

/// Pixel dimensions of `extent` at `pixels_per_unit`, rejecting scales whose
/// image would not fit in `u32` dimensions or [`MAX_IMAGE_PIXELS`].
fn image_size(extent: Bounds, pixels_per_unit: f64) -> Result<(u32, u32), SdfFontError> {
    let side = |length: f64| {
        let pixels = (length * pixels_per_unit).ceil().max(1.0);
        if pixels <= f64::from(u32::MAX) {
            Ok(pixels as u32)
        } else {
            Err(SdfFontError::InvalidScale(pixels_per_unit))
        }
    };
    let (width, height) = (side(extent.width())?, side(extent.height())?);
    if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
        return Err(SdfFontError::InvalidScale(pixels_per_unit));
    }
    Ok((width, height))
}
