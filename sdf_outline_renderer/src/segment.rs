use crate::geometry::{Bounds, Point};

/// Control points closer than this (in glyph units) are considered coincident.
pub(crate) const DEGENERATE_EPSILON: f64 = 1e-9;

/// One piece of a glyph outline.
///
/// Segments are plain values: they own their control points and never change
/// once built. All evaluation is parametrised over `t` in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Segment {
    Line(Point, Point),
    Quadratic(Point, Point, Point),
    Cubic(Point, Point, Point, Point),
}

impl Segment {
    #[must_use]
    pub fn start(&self) -> Point {
        match *self {
            Segment::Line(p0, _) | Segment::Quadratic(p0, _, _) | Segment::Cubic(p0, _, _, _) => p0,
        }
    }

    #[must_use]
    pub fn end(&self) -> Point {
        match *self {
            Segment::Line(_, p1) => p1,
            Segment::Quadratic(_, _, p2) => p2,
            Segment::Cubic(_, _, _, p3) => p3,
        }
    }

    /// Evaluates the curve at `t`.
    #[must_use]
    pub fn eval(&self, t: f64) -> Point {
        match *self {
            Segment::Line(p0, p1) => p0.lerp(p1, t),
            Segment::Quadratic(p0, p1, p2) => {
                let s = 1.0 - t;
                s * s * p0 + 2.0 * s * t * p1 + t * t * p2
            }
            Segment::Cubic(p0, p1, p2, p3) => {
                let s = 1.0 - t;
                s * s * s * p0 + 3.0 * s * s * t * p1 + 3.0 * s * t * t * p2 + t * t * t * p3
            }
        }
    }

    /// The first derivative (tangent vector) at `t`.
    #[must_use]
    pub fn derivative(&self, t: f64) -> Point {
        match *self {
            Segment::Line(p0, p1) => p1 - p0,
            Segment::Quadratic(p0, p1, p2) => {
                let s = 1.0 - t;
                2.0 * s * (p1 - p0) + 2.0 * t * (p2 - p1)
            }
            Segment::Cubic(p0, p1, p2, p3) => {
                let s = 1.0 - t;
                3.0 * s * s * (p1 - p0) + 6.0 * s * t * (p2 - p1) + 3.0 * t * t * (p3 - p2)
            }
        }
    }

    /// The second derivative at `t`.
    #[must_use]
    pub fn second_derivative(&self, t: f64) -> Point {
        match *self {
            Segment::Line(..) => Point::ZERO,
            Segment::Quadratic(p0, p1, p2) => 2.0 * (p2 - 2.0 * p1 + p0),
            Segment::Cubic(p0, p1, p2, p3) => {
                let s = 1.0 - t;
                6.0 * s * (p2 - 2.0 * p1 + p0) + 6.0 * t * (p3 - 2.0 * p2 + p1)
            }
        }
    }

    /// Bounding box of the control polygon. The curve always lies inside it.
    #[must_use]
    pub fn control_bounds(&self) -> Bounds {
        let mut bounds = Bounds {
            min: self.start(),
            max: self.start(),
        };
        match *self {
            Segment::Line(_, p1) => bounds.include(p1),
            Segment::Quadratic(_, p1, p2) => {
                bounds.include(p1);
                bounds.include(p2);
            }
            Segment::Cubic(_, p1, p2, p3) => {
                bounds.include(p1);
                bounds.include(p2);
                bounds.include(p3);
            }
        }
        bounds
    }

    /// Splits the segment at `t` with de Casteljau's algorithm, returning the
    /// `[0, t]` and `[t, 1]` halves.
    #[must_use]
    pub fn split(&self, t: f64) -> (Segment, Segment) {
        match *self {
            Segment::Line(p0, p1) => {
                let m = p0.lerp(p1, t);
                (Segment::Line(p0, m), Segment::Line(m, p1))
            }
            Segment::Quadratic(p0, p1, p2) => {
                let a = p0.lerp(p1, t);
                let b = p1.lerp(p2, t);
                let m = a.lerp(b, t);
                (Segment::Quadratic(p0, a, m), Segment::Quadratic(m, b, p2))
            }
            Segment::Cubic(p0, p1, p2, p3) => {
                let ab = p0.lerp(p1, t);
                let bc = p1.lerp(p2, t);
                let cd = p2.lerp(p3, t);
                let abc = ab.lerp(bc, t);
                let bcd = bc.lerp(cd, t);
                let m = abc.lerp(bcd, t);
                (Segment::Cubic(p0, ab, abc, m), Segment::Cubic(m, bcd, cd, p3))
            }
        }
    }

    /// The same curve traversed in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Segment {
        match *self {
            Segment::Line(p0, p1) => Segment::Line(p1, p0),
            Segment::Quadratic(p0, p1, p2) => Segment::Quadratic(p2, p1, p0),
            Segment::Cubic(p0, p1, p2, p3) => Segment::Cubic(p3, p2, p1, p0),
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        match *self {
            Segment::Line(p0, p1) => p0.is_finite() && p1.is_finite(),
            Segment::Quadratic(p0, p1, p2) => p0.is_finite() && p1.is_finite() && p2.is_finite(),
            Segment::Cubic(p0, p1, p2, p3) => {
                p0.is_finite() && p1.is_finite() && p2.is_finite() && p3.is_finite()
            }
        }
    }

    /// True when every control point coincides with the start point, i.e. the
    /// segment collapses to a single point.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let p0 = self.start();
        let near = |p: Point| p.distance_squared(p0) <= DEGENERATE_EPSILON * DEGENERATE_EPSILON;
        match *self {
            Segment::Line(_, p1) => near(p1),
            Segment::Quadratic(_, p1, p2) => near(p1) && near(p2),
            Segment::Cubic(_, p1, p2, p3) => near(p1) && near(p2) && near(p3),
        }
    }
}
