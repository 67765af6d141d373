use std::ops::{Add, Mul, Neg, Sub};

/// A 2D point (or vector) in glyph units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    #[must_use]
    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// The z component of the 3D cross product; positive when `other` is
    /// counter-clockwise from `self`.
    #[must_use]
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    #[must_use]
    pub fn distance_squared(self, other: Point) -> f64 {
        (self - other).length_squared()
    }

    /// Linear interpolation; `t = 0` gives `self`, `t = 1` gives `other`.
    #[must_use]
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Point> for f64 {
    type Output = Point;

    fn mul(self, rhs: Point) -> Point {
        Point::new(self * rhs.x, self * rhs.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Point {
        Point::new(x, y)
    }
}

/// An axis-aligned bounding box in glyph units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    #[must_use]
    pub fn from_points(points: &[Point]) -> Option<Bounds> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Bounds {
            min: *first,
            max: *first,
        };
        for p in rest {
            bounds.include(*p);
        }
        Some(bounds)
    }

    pub fn include(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    #[must_use]
    pub fn union(self, other: Bounds) -> Bounds {
        let mut result = self;
        result.include(other.min);
        result.include(other.max);
        result
    }

    /// Grows the box by `amount` on every side.
    #[must_use]
    pub fn inflate(self, amount: f64) -> Bounds {
        Bounds {
            min: Point::new(self.min.x - amount, self.min.y - amount),
            max: Point::new(self.max.x + amount, self.max.y + amount),
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn center(&self) -> Point {
        self.min.lerp(self.max, 0.5)
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Euclidean distance from `p` to the box, zero when `p` is inside.
    /// This is a lower bound on the distance to anything the box encloses.
    #[must_use]
    pub fn distance_to(&self, p: Point) -> f64 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        dx.hypot(dy)
    }
}

#[cfg(test)]
mod tests {
    use super::{Bounds, Point};

    #[test]
    fn test_cross_orientation() {
        let x = Point::new(1.0, 0.0);
        let y = Point::new(0.0, 1.0);
        assert_eq!(x.cross(y), 1.0);
        assert_eq!(y.cross(x), -1.0);
    }

    #[test]
    fn test_bounds_distance() {
        let bounds = Bounds::from_points(&[Point::new(0.0, 0.0), Point::new(10.0, 5.0)]).unwrap();
        assert_eq!(bounds.distance_to(Point::new(5.0, 2.0)), 0.0);
        assert_eq!(bounds.distance_to(Point::new(13.0, 9.0)), 5.0);
        assert_eq!(bounds.distance_to(Point::new(-2.0, 3.0)), 2.0);
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_bounds_inflate_and_union() {
        let a = Bounds::from_points(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).unwrap();
        let b = Bounds::from_points(&[Point::new(3.0, -2.0)]).unwrap();
        let u = a.union(b).inflate(1.0);
        assert_eq!(u.min, Point::new(-1.0, -3.0));
        assert_eq!(u.max, Point::new(4.0, 2.0));
        assert_eq!(u.width(), 5.0);
        assert_eq!(u.height(), 5.0);
    }
}
