//! Inside/outside classification, independent of the nearest-point search.
//!
//! The outline is cut into y-monotonic pieces so that a horizontal ray meets
//! every piece at most once, then crossings are counted under the nonzero
//! winding rule. Crossings use the half-open interval `y_lo <= y < y_hi`, so a
//! ray through a shared vertex is counted exactly once (or cancels out at a
//! local extremum). Points lying on the outline itself are classified as
//! inside.

use roots::{find_roots_linear, find_roots_quadratic};

use crate::contour::Contour;
use crate::geometry::Point;
use crate::segment::Segment;

/// Crossings and touch spans closer than this to a query (in glyph units)
/// count as the query lying on the outline.
pub const BOUNDARY_EPSILON: f64 = 1e-9;

/// Bisection steps used to locate a ray crossing on a monotonic curve; enough
/// to exhaust `f64` precision on the unit interval.
const CROSSING_ITERATIONS: usize = 60;

/// Split parameters this close to 0 or 1 are ignored.
const SPLIT_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug)]
struct MonotonicPiece {
    segment: Segment,
    y_lo: f64,
    y_hi: f64,
    /// +1 when the piece runs upwards (increasing y), -1 when downwards.
    direction: i32,
}

impl MonotonicPiece {
    /// The x coordinate at which the piece reaches height `y`, which must lie
    /// in `[y_lo, y_hi]`.
    fn crossing_x(&self, y: f64) -> f64 {
        let start = self.segment.start();
        if y == start.y {
            return start.x;
        }
        if let Segment::Line(p0, p1) = self.segment {
            return p0.x + (y - p0.y) * (p1.x - p0.x) / (p1.y - p0.y);
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..CROSSING_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            let below = self.segment.eval(mid).y < y;
            // Walking "up" the piece means increasing t for upward pieces.
            if below == (self.direction > 0) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        self.segment.eval(0.5 * (lo + hi)).x
    }
}

/// A piece of outline lying entirely at one height.
#[derive(Clone, Copy, Debug)]
struct FlatPiece {
    y: f64,
    x_min: f64,
    x_max: f64,
}

/// One ray crossing on a scanline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crossing {
    pub x: f64,
    /// +1 for an upward-running piece of outline, -1 for a downward one.
    pub direction: i32,
}

/// The crossings of one horizontal line with the outline, for classifying many
/// points of the same row cheaply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scanline {
    y: f64,
    /// Sorted by `x`.
    crossings: Vec<Crossing>,
    /// Closed `[x_min, x_max]` ranges where the outline touches the line
    /// without crossing it (flat edges, vertices).
    touches: Vec<(f64, f64)>,
}

impl Scanline {
    #[must_use]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn crossings(&self) -> &[Crossing] {
        &self.crossings
    }

    /// True when `x` lies on the outline along this scanline.
    #[must_use]
    pub fn on_boundary(&self, x: f64) -> bool {
        self.touches
            .iter()
            .any(|&(lo, hi)| x >= lo - BOUNDARY_EPSILON && x <= hi + BOUNDARY_EPSILON)
            || self
                .crossings
                .iter()
                .any(|crossing| (crossing.x - x).abs() <= BOUNDARY_EPSILON)
    }

    /// The winding number of the outline around `(x, y)`, positive for
    /// counter-clockwise loops. Not meaningful for points on the boundary.
    #[must_use]
    pub fn winding_number(&self, x: f64) -> i32 {
        // A ray towards -x crosses an upward piece from right to left, which is
        // clockwise around the query point.
        -self
            .crossings
            .iter()
            .take_while(|crossing| crossing.x < x)
            .map(|crossing| crossing.direction)
            .sum::<i32>()
    }

    /// Nonzero-rule classification; boundary points are inside.
    #[must_use]
    pub fn is_inside(&self, x: f64) -> bool {
        self.on_boundary(x) || self.winding_number(x) != 0
    }
}

/// Classifies points against a set of contours under the nonzero winding rule.
///
/// Contour orientation only matters relative to other contours: an outer loop
/// and its holes must wind in opposite directions, but whether outer loops are
/// clockwise (TrueType) or counter-clockwise (PostScript) does not matter.
#[derive(Clone, Debug, Default)]
pub struct SignResolver {
    pieces: Vec<MonotonicPiece>,
    flats: Vec<FlatPiece>,
}

impl SignResolver {
    #[must_use]
    pub fn new(contours: &[Contour]) -> SignResolver {
        let mut resolver = SignResolver::default();
        for segment in contours.iter().flat_map(|contour| contour.segments()) {
            resolver.push_segment(segment);
        }
        resolver
    }

    fn push_segment(&mut self, segment: &Segment) {
        let mut remaining = *segment;
        let mut consumed = 0.0;
        for t in y_extrema(segment) {
            let local = (t - consumed) / (1.0 - consumed);
            let (head, tail) = remaining.split(local);
            self.push_monotonic(head);
            remaining = tail;
            consumed = t;
        }
        self.push_monotonic(remaining);
    }

    fn push_monotonic(&mut self, segment: Segment) {
        let start = segment.start();
        let end = segment.end();
        if start.y == end.y {
            let bounds = segment.control_bounds();
            self.flats.push(FlatPiece {
                y: start.y,
                x_min: bounds.min.x,
                x_max: bounds.max.x,
            });
            return;
        }
        self.pieces.push(MonotonicPiece {
            segment,
            y_lo: start.y.min(end.y),
            y_hi: start.y.max(end.y),
            direction: if end.y > start.y { 1 } else { -1 },
        });
    }

    /// Intersects the horizontal line at `y` with the outline.
    #[must_use]
    pub fn scanline(&self, y: f64) -> Scanline {
        let mut crossings = Vec::new();
        let mut touches = Vec::new();

        for piece in &self.pieces {
            if piece.y_lo <= y && y < piece.y_hi {
                crossings.push(Crossing {
                    x: piece.crossing_x(y),
                    direction: piece.direction,
                });
            }
            for endpoint in [piece.segment.start(), piece.segment.end()] {
                if endpoint.y == y {
                    touches.push((endpoint.x, endpoint.x));
                }
            }
        }
        for flat in &self.flats {
            if flat.y == y {
                touches.push((flat.x_min, flat.x_max));
            }
        }

        crossings.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.direction.cmp(&b.direction)));
        Scanline {
            y,
            crossings,
            touches,
        }
    }

    #[must_use]
    pub fn winding_number(&self, p: Point) -> i32 {
        self.scanline(p.y).winding_number(p.x)
    }

    #[must_use]
    pub fn is_inside(&self, p: Point) -> bool {
        self.scanline(p.y).is_inside(p.x)
    }
}

/// Convenience wrapper: classify a single point against `contours`.
#[must_use]
pub fn is_inside(contours: &[Contour], query: Point) -> bool {
    SignResolver::new(contours).is_inside(query)
}

/// Parameters strictly inside `(0, 1)` where the segment's y coordinate has a
/// turning point, in ascending order.
fn y_extrema(segment: &Segment) -> Vec<f64> {
    let roots = match *segment {
        Segment::Line(..) => return Vec::new(),
        Segment::Quadratic(p0, p1, p2) => find_roots_linear(p0.y - 2.0 * p1.y + p2.y, p1.y - p0.y),
        Segment::Cubic(p0, p1, p2, p3) => {
            let d0 = p1.y - p0.y;
            let d1 = p2.y - p1.y;
            let d2 = p3.y - p2.y;
            find_roots_quadratic(d0 - 2.0 * d1 + d2, 2.0 * (d1 - d0), d0)
        }
    };
    let mut extrema: Vec<f64> = roots
        .as_ref()
        .iter()
        .copied()
        .filter(|t| *t > SPLIT_EPSILON && *t < 1.0 - SPLIT_EPSILON)
        .collect();
    extrema.sort_by(f64::total_cmp);
    extrema.dedup_by(|a, b| (*a - *b).abs() <= SPLIT_EPSILON);
    extrema
}
