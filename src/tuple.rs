use std::ops::{ Add, Sub, Neg, Mul, Div };

use crate::feq;

/// A homogeneous 4-component tuple.
///
/// A `w` of `1.0` marks a point, a `w` of `0.0` marks a vector. Points and
/// vectors share one type so that `Matrix4D` can transform either; the `w`
/// component decides whether translations apply.
///
/// Equality is approximate (see `feq`).
#[derive(Debug, Default, Copy, Clone, PartialOrd)]
pub struct Tuple4D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64
}

impl PartialEq for Tuple4D {
    fn eq(&self, other: &Tuple4D) -> bool {
        feq(self.x, other.x) &&
            feq(self.y, other.y) &&
            feq(self.z, other.z) &&
            feq(self.w, other.w)
    }
}

impl Tuple4D {
    pub fn tuple(x: f64, y: f64, z: f64, w: f64) -> Tuple4D {
        Tuple4D { x, y, z, w }
    }

    pub fn point(x: f64, y: f64, z: f64) -> Tuple4D {
        Tuple4D { x, y, z, w: 1.0 }
    }

    pub fn vector(x: f64, y: f64, z: f64) -> Tuple4D {
        Tuple4D { x, y, z, w: 0.0 }
    }

    /// The point at the origin.
    pub fn origin() -> Tuple4D {
        Tuple4D::point(0.0, 0.0, 0.0)
    }

    pub fn is_point(&self) -> bool {
        self.w == 1.0
    }

    pub fn is_vector(&self) -> bool {
        self.w == 0.0
    }

    /// Returns the same tuple with its `w` component zeroed.
    pub fn as_vector(&self) -> Tuple4D {
        Tuple4D { w: 0.0, ..*self }
    }

    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Scales a tuple to unit length.
    ///
    /// A zero-length tuple has no direction; it is returned unchanged rather
    /// than divided by zero.
    ///
    /// ```
    /// # use aun_tracer::tuple::Tuple4D;
    /// let v = Tuple4D::vector(0.0, 3.0, 4.0);
    /// assert_eq!(v.normalize(), Tuple4D::vector(0.0, 0.6, 0.8));
    /// assert_eq!(Tuple4D::vector(0.0, 0.0, 0.0).normalize(),
    ///     Tuple4D::vector(0.0, 0.0, 0.0));
    /// ```
    pub fn normalize(&self) -> Tuple4D {
        let mag = self.magnitude();
        if mag == 0.0 {
            return *self;
        }

        *self / mag
    }

    pub fn dot(&self, other: &Tuple4D) -> f64 {
        self.x * other.x
            + self.y * other.y
            + self.z * other.z
            + self.w * other.w
    }

    /// The cross product of two vectors. The result is always a vector.
    pub fn cross(&self, other: &Tuple4D) -> Tuple4D {
        Tuple4D {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
            w: 0.0
        }
    }

    /// Reflects a vector across a normal.
    pub fn reflect(&self, normal: &Tuple4D) -> Tuple4D {
        *self - (*normal * 2.0 * self.dot(normal))
    }
}

impl Add for Tuple4D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            w: self.w + other.w
        }
    }
}

impl Sub for Tuple4D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            w: self.w - other.w
        }
    }
}

impl Neg for Tuple4D {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: -self.w
        }
    }
}

/// Implements scalar right-multiplication for a 4D tuple.
///
/// ```
/// use aun_tracer::tuple::Tuple4D;
///
/// let t = Tuple4D::tuple(1.0, 2.0, 3.0, 4.0);
/// assert_eq!(t * 5.0, Tuple4D::tuple(5.0, 10.0, 15.0, 20.0));
/// ```
impl Mul<f64> for Tuple4D {
    type Output = Self;

    fn mul(self, other: f64) -> Self {
        Self {
            x: self.x * other,
            y: self.y * other,
            z: self.z * other,
            w: self.w * other
        }
    }
}

/// Implements scalar left-multiplication for a 4D tuple.
impl Mul<Tuple4D> for f64 {
    type Output = Tuple4D;

    fn mul(self, other: Tuple4D) -> Tuple4D {
        other * self
    }
}

impl Div<f64> for Tuple4D {
    type Output = Self;

    fn div(self, other: f64) -> Self {
        Self {
            x: self.x / other,
            y: self.y / other,
            z: self.z / other,
            w: self.w / other
        }
    }
}

/* Tests */

#[test]
fn tuple_with_w_one_is_a_point() {
    let a = Tuple4D::tuple(4.3, -4.2, 3.1, 1.0);

    assert!(a.is_point());
    assert!(!a.is_vector());
}

#[test]
fn tuple_with_w_zero_is_a_vector() {
    let a = Tuple4D::tuple(4.3, -4.2, 3.1, 0.0);

    assert!(a.is_vector());
    assert!(!a.is_point());
}

#[test]
fn add_point_and_vector() {
    let a1 = Tuple4D::tuple(3.0, -2.0, 5.0, 1.0);
    let a2 = Tuple4D::tuple(-2.0, 3.0, 1.0, 0.0);

    assert_eq!(a1 + a2, Tuple4D::point(1.0, 1.0, 6.0));
}

#[test]
fn sub_points_gives_vector() {
    let p1 = Tuple4D::point(3.0, 2.0, 1.0);
    let p2 = Tuple4D::point(5.0, 6.0, 7.0);

    assert_eq!(p1 - p2, Tuple4D::vector(-2.0, -4.0, -6.0));
}

#[test]
fn sub_vector_from_point_gives_point() {
    let p = Tuple4D::point(3.0, 2.0, 1.0);
    let v = Tuple4D::vector(5.0, 6.0, 7.0);

    assert_eq!(p - v, Tuple4D::point(-2.0, -4.0, -6.0));
}

#[test]
fn negate_tuple() {
    let a = Tuple4D::tuple(1.0, -2.0, 3.0, -4.0);

    assert_eq!(-a, Tuple4D::tuple(-1.0, 2.0, -3.0, 4.0));
}

#[test]
fn scale_and_divide() {
    let a = Tuple4D::tuple(1.0, -2.0, 3.0, -4.0);

    assert_eq!(a * 3.5, Tuple4D::tuple(3.5, -7.0, 10.5, -14.0));
    assert_eq!(0.5 * a, Tuple4D::tuple(0.5, -1.0, 1.5, -2.0));
    assert_eq!(a / 2.0, Tuple4D::tuple(0.5, -1.0, 1.5, -2.0));
}

#[test]
fn magnitude_ignores_sign() {
    let v = Tuple4D::vector(1.0, 2.0, 3.0);

    assert_eq!(v.magnitude(), f64::sqrt(14.0));
    assert_eq!((-v).magnitude(), f64::sqrt(14.0));
}

#[test]
fn normalized_vectors_have_unit_length() {
    let vs = [
        Tuple4D::vector(4.0, 0.0, 0.0),
        Tuple4D::vector(1.0, 2.0, 3.0),
        Tuple4D::vector(-0.001, 250.0, 7.5),
    ];

    for v in vs.iter() {
        assert!((v.normalize().magnitude() - 1.0).abs() < 1e-5);
    }

    let e = Tuple4D::vector(
        1.0 / f64::sqrt(14.0),
        2.0 / f64::sqrt(14.0),
        3.0 / f64::sqrt(14.0)
    );
    assert_eq!(vs[1].normalize(), e);
}

#[test]
fn normalize_zero_vector_is_guarded() {
    let z = Tuple4D::vector(0.0, 0.0, 0.0);
    let n = z.normalize();

    assert!(n.x.is_finite() && n.y.is_finite() && n.z.is_finite());
    assert_eq!(n, z);
}

#[test]
fn dot_and_cross() {
    let a = Tuple4D::vector(1.0, 2.0, 3.0);
    let b = Tuple4D::vector(2.0, 3.0, 4.0);

    assert_eq!(a.dot(&b), 20.0);
    assert_eq!(a.cross(&b), Tuple4D::vector(-1.0, 2.0, -1.0));
    assert_eq!(b.cross(&a), Tuple4D::vector(1.0, -2.0, 1.0));
}

#[test]
fn reflect_approaching_at_45() {
    let v = Tuple4D::vector(1.0, -1.0, 0.0);
    let n = Tuple4D::vector(0.0, 1.0, 0.0);

    let r = v.reflect(&n);
    assert_eq!((r.x, r.y, r.z, r.w), (1.0, 1.0, 0.0, 0.0));
}

#[test]
fn reflect_off_slanted_surface() {
    let v = Tuple4D::vector(0.0, -1.0, 0.0);
    let n = Tuple4D::vector(2.0f64.sqrt() / 2.0, 2.0f64.sqrt() / 2.0, 0.0);

    assert_eq!(v.reflect(&n), Tuple4D::vector(1.0, 0.0, 0.0));
}
