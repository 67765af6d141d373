use std::hash::{Hash, Hasher};
use std::mem::size_of;

use crate::geometry::{Bounds, Point};
use crate::SdfGlyphError;

/// Grid dimensions of a distance field, in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Resolution {
        Resolution { width, height }
    }

    /// Total number of cells.
    #[must_use]
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Everything besides the outline that determines a field's contents.
///
/// `band` is the distance, in glyph units, at which values saturate. Two
/// parameter sets are equal (and hash equally) only when the band has the
/// exact same bit pattern, so these can be used directly in cache keys.
#[derive(Clone, Copy, Debug)]
pub struct FieldParams {
    pub resolution: Resolution,
    pub band: f64,
}

impl FieldParams {
    /// Creates a validated parameter set.
    pub fn new(width: u32, height: u32, band: f64) -> Result<FieldParams, SdfGlyphError> {
        let params = FieldParams {
            resolution: Resolution::new(width, height),
            band,
        };
        params.validate()?;
        Ok(params)
    }

    /// Checks that the band is finite and positive and that the grid is not
    /// empty.
    pub fn validate(&self) -> Result<(), SdfGlyphError> {
        if !(self.band.is_finite() && self.band > 0.0) {
            return Err(SdfGlyphError::InvalidBand(self.band));
        }
        let Resolution { width, height } = self.resolution;
        if width == 0 || height == 0 {
            return Err(SdfGlyphError::InvalidResolution(width, height));
        }
        Ok(())
    }
}

impl PartialEq for FieldParams {
    fn eq(&self, other: &Self) -> bool {
        self.resolution == other.resolution && self.band.to_bits() == other.band.to_bits()
    }
}

impl Eq for FieldParams {}

impl Hash for FieldParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resolution.hash(state);
        self.band.to_bits().hash(state);
    }
}

/// Maps glyph space (y up) onto grid space (y down, row 0 at the top) with a
/// uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldTransform {
    /// Grid cells per glyph unit.
    pub scale: f64,

    /// The glyph-space position of the grid's top-left corner.
    pub origin: Point,
}

impl FieldTransform {
    /// Centres `bounds` inflated by `band` in the grid, scaled uniformly so
    /// that it fits along both axes.
    #[must_use]
    pub fn fit(bounds: Bounds, band: f64, resolution: Resolution) -> FieldTransform {
        let padded = bounds.inflate(band);
        let width = f64::from(resolution.width);
        let height = f64::from(resolution.height);
        let scale = (width / padded.width()).min(height / padded.height());
        let center = padded.center();
        FieldTransform {
            scale,
            origin: Point::new(
                center.x - 0.5 * width / scale,
                center.y + 0.5 * height / scale,
            ),
        }
    }

    #[must_use]
    pub fn to_grid(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.origin.x) * self.scale,
            (self.origin.y - p.y) * self.scale,
        )
    }

    #[must_use]
    pub fn to_glyph(&self, p: Point) -> Point {
        Point::new(
            self.origin.x + p.x / self.scale,
            self.origin.y - p.y / self.scale,
        )
    }

    /// The glyph-space position of the centre of cell `(col, row)`.
    #[must_use]
    pub fn cell_center(&self, col: u32, row: u32) -> Point {
        self.to_glyph(Point::new(f64::from(col) + 0.5, f64::from(row) + 0.5))
    }

    /// The glyph-space y coordinate shared by every cell centre of `row`.
    #[must_use]
    pub fn row_y(&self, row: u32) -> f64 {
        self.origin.y - (f64::from(row) + 0.5) / self.scale
    }
}

/// Normalises a distance to `[-1, 1]`: negative inside, saturating at `band`.
#[must_use]
pub fn normalize_distance(distance: f64, inside: bool, band: f64) -> f64 {
    let magnitude = distance.min(band) / band;
    if inside {
        -magnitude
    } else {
        magnitude
    }
}

/// A rasterized signed distance field.
///
/// Values are stored row-major starting from the top row. Each value is the
/// signed distance from the cell centre to the outline divided by the band
/// and clamped, so the range is `[-1.0, 1.0]`: `-1` deep inside, `0` on the
/// outline, `+1` at least a band away outside.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceField {
    params: FieldParams,
    transform: FieldTransform,
    values: Vec<f64>,
}

impl DistanceField {
    pub(crate) fn new(params: FieldParams, transform: FieldTransform, values: Vec<f64>) -> DistanceField {
        debug_assert_eq!(values.len(), params.resolution.cells());
        DistanceField {
            params,
            transform,
            values,
        }
    }

    /// A field that is "fully outside" everywhere, used in place of a glyph
    /// that could not be rasterized.
    #[must_use]
    pub fn placeholder(params: FieldParams) -> DistanceField {
        let bounds = Bounds {
            min: Point::ZERO,
            max: Point::ZERO,
        };
        DistanceField {
            params,
            transform: FieldTransform::fit(bounds, params.band, params.resolution),
            values: vec![1.0; params.resolution.cells()],
        }
    }

    #[must_use]
    pub fn params(&self) -> FieldParams {
        self.params
    }

    #[must_use]
    pub fn transform(&self) -> FieldTransform {
        self.transform
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.params.resolution.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.params.resolution.height
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The value at `(col, row)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, col: u32, row: u32) -> Option<f64> {
        if col >= self.width() || row >= self.height() {
            return None;
        }
        self.values
            .get(row as usize * self.width() as usize + col as usize)
            .copied()
    }

    /// Bilinearly interpolates the field at a glyph-space position. Positions
    /// beyond the outermost cell centres take the edge values.
    #[must_use]
    pub fn sample(&self, p: Point) -> f64 {
        let grid = self.transform.to_grid(p);
        let max_x = f64::from(self.width() - 1);
        let max_y = f64::from(self.height() - 1);
        let x = (grid.x - 0.5).clamp(0.0, max_x);
        let y = (grid.y - 0.5).clamp(0.0, max_y);

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as u32, y0 as u32);
        let x1 = (x0 + 1).min(self.width() - 1);
        let y1 = (y0 + 1).min(self.height() - 1);

        let at = |col: u32, row: u32| self.values[row as usize * self.width() as usize + col as usize];
        let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
        let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Approximate memory footprint in bytes, used for cache budgets.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        size_of::<DistanceField>() + self.values.len() * size_of::<f64>()
    }

    /// Quantises the field to one byte per cell; see [`clamp_to_u8`].
    pub fn to_u8(&self, cutoff: f64) -> Result<Vec<u8>, SdfGlyphError> {
        clamp_to_u8(&self.values, cutoff)
    }
}

/// Compresses a `Vec<f64>` into a `Vec<u8>` for efficiency.
///
/// The highest `cutoff` percent of values in the range (0-255) will be used to encode
/// negative values (points inside the glyph). This can be tuned based on the intended
/// application.
///
/// The `cutoff` value must be in the range (0, 1) - non-inclusive on both sides.
/// Values outside this range make no sense and will result in an error.
pub fn clamp_to_u8(sdf: &[f64], cutoff: f64) -> Result<Vec<u8>, SdfGlyphError> {
    if cutoff <= 0.0 || cutoff >= 1.0 {
        return Err(SdfGlyphError::InvalidCutoff(cutoff));
    }
    Ok(sdf
        .iter()
        // Float to integer casts saturate, so out of range values clamp to 0 or 255.
        .map(|v| (255.0 - 255.0 * (v + cutoff)) as u8)
        .collect())
}
