//! Closest point on a segment to a query point.
//!
//! Lines are projected in closed form. For quadratics the stationary points of
//! the squared distance are the roots of a cubic, which is solved exactly. For
//! cubics the stationary points are the roots of a quintic; these are bracketed
//! on a fixed sample grid and located with Brent's method, and the
//! neighbourhood of the best sample is rescanned more densely as a fallback.
//! Every tolerance and iteration count is a constant so that repeated queries
//! give bit-identical answers.

use roots::{find_root_brent, find_roots_cubic, SimpleConvergency};

use crate::geometry::Point;
use crate::segment::Segment;
use crate::SdfGlyphError;

/// Number of equal parameter intervals scanned for sign changes on cubics.
pub const CUBIC_SAMPLES: usize = 32;

/// Number of intervals rescanned on each side of the best cubic sample.
pub const FALLBACK_SAMPLES: usize = 16;

/// Iteration cap for every Brent search.
pub const MAX_REFINE_ITERATIONS: usize = 64;

/// Brent searches stop once the bracket is narrower than this.
pub const T_TOLERANCE: f64 = 1e-12;

/// A leading coefficient this small relative to the others is treated as zero.
const DEGREE_EPSILON: f64 = 1e-12;

/// The result of a nearest-point query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nearest {
    /// The closest point on the segment.
    pub point: Point,

    /// The parameter of `point`, in `[0, 1]`.
    pub t: f64,

    /// The (unsigned) Euclidean distance from the query to `point`.
    pub distance: f64,
}

/// Finds the point on `segment` closest to `query`.
///
/// Degenerate curves (every control point coincident) are handled as a
/// zero-length line. Non-finite input is rejected with
/// [`SdfGlyphError::InvalidGeometry`].
pub fn nearest(segment: &Segment, query: Point) -> Result<Nearest, SdfGlyphError> {
    if !segment.is_finite() {
        return Err(SdfGlyphError::geometry(format!(
            "segment has non-finite control points: {segment:?}"
        )));
    }
    if !query.is_finite() {
        return Err(SdfGlyphError::geometry(format!(
            "query point is not finite: {query:?}"
        )));
    }
    Ok(nearest_unchecked(segment, query))
}

/// [`nearest`] without input validation; the caller guarantees finite input.
pub(crate) fn nearest_unchecked(segment: &Segment, query: Point) -> Nearest {
    if segment.is_degenerate() {
        return nearest_line(segment.start(), segment.end(), query);
    }
    match *segment {
        Segment::Line(p0, p1) => nearest_line(p0, p1, query),
        Segment::Quadratic(p0, p1, p2) => nearest_quadratic(segment, p0, p1, p2, query),
        Segment::Cubic(..) => nearest_cubic(segment, query),
    }
}

fn nearest_line(p0: Point, p1: Point, query: Point) -> Nearest {
    let a = p1 - p0;
    let length_squared = a.length_squared();
    let t = if length_squared > 0.0 {
        ((query - p0).dot(a) / length_squared).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let point = p0.lerp(p1, t);
    Nearest {
        point,
        t,
        distance: point.distance(query),
    }
}

fn nearest_quadratic(segment: &Segment, p0: Point, p1: Point, p2: Point, query: Point) -> Nearest {
    // B(t) - q = m + 2ta + t^2 b, so (B - q).B'/2 is the cubic below.
    let m = p0 - query;
    let a = p1 - p0;
    let b = p2 - p1 - a;

    let a3 = b.dot(b);
    let a2 = 3.0 * a.dot(b);
    let a1 = 2.0 * a.dot(a) + m.dot(b);
    let a0 = m.dot(a);
    // Nearly straight curves drop to the quadratic instead of dividing by ~0.
    let a3 = if a3 <= DEGREE_EPSILON * (a2.abs() + a1.abs() + a0.abs()).max(1.0) {
        0.0
    } else {
        a3
    };

    let mut best = Closest::new(segment, query);
    for &root in find_roots_cubic(a3, a2, a1, a0).as_ref() {
        if (0.0..=1.0).contains(&root) {
            best.consider(root);
        }
    }
    best.finish()
}

fn nearest_cubic(segment: &Segment, query: Point) -> Nearest {
    let mut best = Closest::new(segment, query);
    let sample = scan(&mut best, 0.0, 1.0, CUBIC_SAMPLES);

    // Two close minima can hide inside one interval without a sign change at
    // its ends; rescan around the best sample so that case still converges.
    let step = 1.0 / CUBIC_SAMPLES as f64;
    let lo = sample.saturating_sub(1) as f64 * step;
    let hi = (sample + 1).min(CUBIC_SAMPLES) as f64 * step;
    scan(&mut best, lo, hi, 2 * FALLBACK_SAMPLES);

    best.finish()
}

/// Samples `[lo, hi]` at `samples` equal intervals, offering every sample and
/// every local minimum found inside an interval to `best`. Returns the index
/// of the closest sample.
fn scan(best: &mut Closest<'_>, lo: f64, hi: f64, samples: usize) -> usize {
    let (segment, query) = (best.segment, best.query);
    let at = |i: usize| lo + (hi - lo) * i as f64 / samples as f64;

    let mut closest = 0;
    let mut closest_distance = f64::INFINITY;
    let mut prev_slope = slope(segment, query, lo);
    for i in 0..=samples {
        let t = at(i);
        let distance = segment.eval(t).distance_squared(query);
        if distance < closest_distance {
            closest_distance = distance;
            closest = i;
        }
        best.consider(t);

        if i > 0 {
            let s = slope(segment, query, t);
            // The squared distance falls then rises: a local minimum lies inside.
            if prev_slope < 0.0 && s >= 0.0 {
                if let Some(root) = stationary_point(segment, query, at(i - 1), t) {
                    best.consider(root);
                }
            }
            prev_slope = s;
        }
    }
    closest
}

/// Half the derivative of the squared distance with respect to `t`.
fn slope(segment: &Segment, query: Point, t: f64) -> f64 {
    (segment.eval(t) - query).dot(segment.derivative(t))
}

/// The root of [`slope`] inside `[lo, hi]`, which must bracket a sign change.
fn stationary_point(segment: &Segment, query: Point, lo: f64, hi: f64) -> Option<f64> {
    let mut convergency = SimpleConvergency {
        eps: T_TOLERANCE,
        max_iter: MAX_REFINE_ITERATIONS,
    };
    let f = |t: f64| slope(segment, query, t);
    find_root_brent(lo, hi, &f, &mut convergency).ok()
}

/// Running minimum over candidate parameters, seeded with both endpoints.
struct Closest<'a> {
    segment: &'a Segment,
    query: Point,
    best: Nearest,
    best_squared: f64,
}

impl<'a> Closest<'a> {
    fn new(segment: &'a Segment, query: Point) -> Closest<'a> {
        let start = segment.start();
        let mut closest = Closest {
            segment,
            query,
            best: Nearest {
                point: start,
                t: 0.0,
                distance: 0.0,
            },
            best_squared: start.distance_squared(query),
        };
        closest.consider(1.0);
        closest
    }

    fn consider(&mut self, t: f64) {
        let point = self.segment.eval(t);
        let distance_squared = point.distance_squared(self.query);
        if distance_squared < self.best_squared {
            self.best_squared = distance_squared;
            self.best = Nearest {
                point,
                t,
                distance: 0.0,
            };
        }
    }

    fn finish(mut self) -> Nearest {
        self.best.distance = self.best_squared.sqrt();
        self.best
    }
}
