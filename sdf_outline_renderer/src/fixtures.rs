//! Shapes shared by the unit tests.

use crate::contour::{Contour, Glyph, GlyphId};
use crate::geometry::Point;
use crate::segment::Segment;

/// Handle length for approximating a quarter circle with one cubic.
pub(crate) const KAPPA: f64 = 0.552_284_749_830_793_4;

/// A closed polygon through `points`, in order.
pub(crate) fn polygon(points: &[(f64, f64)]) -> Contour {
    let segments = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| Segment::Line(Point::from(*a), Point::from(*b)))
        .collect();
    Contour::new(segments).unwrap()
}

/// A circle made of four cubics, starting at the rightmost point.
pub(crate) fn circle(center: Point, r: f64, ccw: bool) -> Contour {
    let k = KAPPA * r;
    let c = center;
    let segments = vec![
        Segment::Cubic(
            c + Point::new(r, 0.0),
            c + Point::new(r, k),
            c + Point::new(k, r),
            c + Point::new(0.0, r),
        ),
        Segment::Cubic(
            c + Point::new(0.0, r),
            c + Point::new(-k, r),
            c + Point::new(-r, k),
            c + Point::new(-r, 0.0),
        ),
        Segment::Cubic(
            c + Point::new(-r, 0.0),
            c + Point::new(-r, -k),
            c + Point::new(-k, -r),
            c + Point::new(0.0, -r),
        ),
        Segment::Cubic(
            c + Point::new(0.0, -r),
            c + Point::new(k, -r),
            c + Point::new(r, -k),
            c + Point::new(r, 0.0),
        ),
    ];
    let contour = Contour::new(segments).unwrap();
    if ccw {
        contour
    } else {
        contour.reversed()
    }
}

/// An "O": a ring between radii 30 and 20 centred on (50, 50), with the hole
/// wound the other way.
pub(crate) fn letter_o() -> Glyph {
    let center = Point::new(50.0, 50.0);
    Glyph::new(
        GlyphId::from('O'),
        vec![circle(center, 30.0, true), circle(center, 20.0, false)],
        100.0,
    )
}
