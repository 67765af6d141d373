use std::fmt;

use crate::geometry::{Bounds, Point};
use crate::segment::Segment;
use crate::SdfGlyphError;

/// Consecutive segment endpoints further apart than this (in glyph units) make
/// a contour open, and therefore invalid.
pub const CLOSURE_TOLERANCE: f64 = 1e-6;

/// One closed boundary loop of a glyph: an outer shape or a hole.
///
/// Under the nonzero winding rule used for sign resolution, holes must wind in
/// the opposite direction to the contour that encloses them.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    segments: Vec<Segment>,
    bounds: Bounds,
}

impl Contour {
    /// Creates a contour from an ordered list of segments.
    ///
    /// The segments must all be finite, each must start where the previous one
    /// ends, and the last must end where the first starts.
    pub fn new(segments: Vec<Segment>) -> Result<Contour, SdfGlyphError> {
        let Some(first) = segments.first() else {
            return Err(SdfGlyphError::geometry("a contour needs at least one segment"));
        };

        let mut bounds = first.control_bounds();
        for (index, segment) in segments.iter().enumerate() {
            if !segment.is_finite() {
                return Err(SdfGlyphError::geometry(format!(
                    "segment {index} has non-finite control points"
                )));
            }
            bounds = bounds.union(segment.control_bounds());

            let next = &segments[(index + 1) % segments.len()];
            let gap = segment.end().distance(next.start());
            if gap > CLOSURE_TOLERANCE {
                return Err(SdfGlyphError::geometry(format!(
                    "contour is not closed: segment {index} ends at {:?} but the next segment starts at {:?}",
                    segment.end(),
                    next.start()
                )));
            }
        }

        Ok(Contour { segments, bounds })
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Bounding box of every control point of the contour.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Signed area enclosed by the contour; positive for counter-clockwise
    /// winding in a y-up coordinate system.
    ///
    /// Curves are integrated exactly (Green's theorem over the Bézier
    /// polynomials), not approximated by their chords.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        self.segments.iter().map(segment_area).sum()
    }

    /// The same loop traversed in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Contour {
        Contour {
            segments: self.segments.iter().rev().map(Segment::reversed).collect(),
            bounds: self.bounds,
        }
    }
}

/// The contribution of one segment to `1/2 * integral(x dy - y dx)`.
fn segment_area(segment: &Segment) -> f64 {
    match *segment {
        Segment::Line(p0, p1) => 0.5 * p0.cross(p1),
        Segment::Quadratic(p0, p1, p2) => {
            (2.0 * p0.cross(p1) + 2.0 * p1.cross(p2) + p0.cross(p2)) / 6.0
        }
        Segment::Cubic(p0, p1, p2, p3) => {
            (6.0 * p0.cross(p1)
                + 3.0 * p0.cross(p2)
                + p0.cross(p3)
                + 3.0 * p1.cross(p2)
                + 3.0 * p1.cross(p3)
                + 6.0 * p2.cross(p3))
                / 20.0
        }
    }
}

/// Accumulates outline drawing commands into closed [`Contour`]s.
///
/// This mirrors the move/line/quad/cubic/close callbacks font outline
/// decoders emit. Contours close implicitly: [`Self::close`] (or the next
/// [`Self::move_to`], or [`Self::finish`]) adds a straight line back to the
/// contour's start if the pen is elsewhere.
#[derive(Debug, Default)]
pub struct ContourBuilder {
    contours: Vec<Contour>,
    current: Vec<Segment>,
    start: Option<Point>,
    pen: Point,
}

impl ContourBuilder {
    #[must_use]
    pub fn new() -> ContourBuilder {
        ContourBuilder::default()
    }

    /// Starts a new contour, closing the current one if there is one.
    pub fn move_to(&mut self, p: impl Into<Point>) -> Result<&mut Self, SdfGlyphError> {
        let p = finite(p.into())?;
        self.close()?;
        self.start = Some(p);
        self.pen = p;
        Ok(self)
    }

    pub fn line_to(&mut self, p: impl Into<Point>) -> Result<&mut Self, SdfGlyphError> {
        let p = finite(p.into())?;
        let from = self.pen_position()?;
        self.current.push(Segment::Line(from, p));
        self.pen = p;
        Ok(self)
    }

    pub fn quad_to(
        &mut self,
        control: impl Into<Point>,
        p: impl Into<Point>,
    ) -> Result<&mut Self, SdfGlyphError> {
        let control = finite(control.into())?;
        let p = finite(p.into())?;
        let from = self.pen_position()?;
        self.current.push(Segment::Quadratic(from, control, p));
        self.pen = p;
        Ok(self)
    }

    pub fn cubic_to(
        &mut self,
        control1: impl Into<Point>,
        control2: impl Into<Point>,
        p: impl Into<Point>,
    ) -> Result<&mut Self, SdfGlyphError> {
        let control1 = finite(control1.into())?;
        let control2 = finite(control2.into())?;
        let p = finite(p.into())?;
        let from = self.pen_position()?;
        self.current.push(Segment::Cubic(from, control1, control2, p));
        self.pen = p;
        Ok(self)
    }

    /// Closes the current contour. A contour consisting of a bare `move_to`
    /// is dropped, as font rasterizers do.
    pub fn close(&mut self) -> Result<&mut Self, SdfGlyphError> {
        let Some(start) = self.start.take() else {
            return Ok(self);
        };
        if self.current.is_empty() {
            return Ok(self);
        }
        if self.pen.distance(start) > CLOSURE_TOLERANCE {
            self.current.push(Segment::Line(self.pen, start));
        }
        let segments = std::mem::take(&mut self.current);
        self.contours.push(Contour::new(segments)?);
        self.pen = start;
        Ok(self)
    }

    /// Closes any open contour and returns everything drawn so far.
    pub fn finish(mut self) -> Result<Vec<Contour>, SdfGlyphError> {
        self.close()?;
        Ok(self.contours)
    }

    fn pen_position(&self) -> Result<Point, SdfGlyphError> {
        if self.start.is_none() {
            return Err(SdfGlyphError::geometry("drawing command issued before move_to"));
        }
        Ok(self.pen)
    }
}

fn finite(p: Point) -> Result<Point, SdfGlyphError> {
    if p.is_finite() {
        Ok(p)
    } else {
        Err(SdfGlyphError::geometry(format!("non-finite outline point {p:?}")))
    }
}

/// Identifies a glyph: a codepoint or a font-specific glyph index, depending on
/// the outline provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphId(pub u32);

impl fmt::Display for GlyphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match char::from_u32(self.0) {
            Some(c) if !c.is_control() => write!(f, "{} ({c:?})", self.0),
            _ => write!(f, "{}", self.0),
        }
    }
}

impl From<char> for GlyphId {
    fn from(c: char) -> GlyphId {
        GlyphId(c as u32)
    }
}

/// A glyph outline as delivered by a font outline provider.
#[derive(Clone, Debug, PartialEq)]
pub struct Glyph {
    id: GlyphId,
    contours: Vec<Contour>,
    advance: f64,
}

impl Glyph {
    /// Creates a glyph. Zero contours is valid (e.g. a space).
    #[must_use]
    pub fn new(id: GlyphId, contours: Vec<Contour>, advance: f64) -> Glyph {
        Glyph {
            id,
            contours,
            advance,
        }
    }

    #[must_use]
    pub fn id(&self) -> GlyphId {
        self.id
    }

    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// The horizontal advance in glyph units.
    #[must_use]
    pub fn advance(&self) -> f64 {
        self.advance
    }

    /// Bounds of the outline's control points, or `None` for an empty glyph.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.contours
            .iter()
            .map(Contour::bounds)
            .reduce(Bounds::union)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.contours.iter().flat_map(|contour| contour.segments.iter())
    }
}
