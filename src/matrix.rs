use std::fmt;
use std::ops::{ Index, IndexMut, Mul };

use crate::feq;
use crate::error::{ Result, TracerError };
use crate::tuple::Tuple4D;

/// A coordinate axis, for building rotations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A 3x3 matrix, only used on the way to a 4x4 determinant.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Matrix3D {
    data: [f64; 9],
}

impl Index<(usize, usize)> for Matrix3D {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.data[(index.0 * 3) + index.1]
    }
}

impl Matrix3D {
    /// Determinant of the 2x2 submatrix left after removing `row` and `col`.
    fn minor(&self, row: usize, col: usize) -> f64 {
        let mut buf = [0.0; 4];
        let mut count = 0;

        for r in (0..3).filter(|&r| r != row) {
            for c in (0..3).filter(|&c| c != col) {
                buf[count] = self[(r, c)];
                count += 1;
            }
        }

        buf[0] * buf[3] - buf[1] * buf[2]
    }

    fn cofactor(&self, row: usize, col: usize) -> f64 {
        let m = self.minor(row, col);
        if (row + col) % 2 == 0 { m } else { -m }
    }

    fn determinant(&self) -> f64 {
        (0..3).map(|c| self[(0, c)] * self.cofactor(0, c)).sum()
    }
}

/// A 4x4 matrix.
///
/// Every transformation in the tracer (shape, pattern and camera transforms)
/// is a `Matrix4D`. Points and vectors are multiplied on the right.
///
/// Inversion goes through cofactor expansion and fails with
/// `TracerError::NonInvertible` when the determinant is zero.
///
/// # Examples
///
/// ```
/// # use aun_tracer::tuple::Tuple4D;
/// # use aun_tracer::matrix::Matrix4D;
/// let from = Tuple4D::point(0.0, 0.0, 8.0);
/// let to = Tuple4D::point(0.0, 0.0, 0.0);
/// let up = Tuple4D::vector(0.0, 1.0, 0.0);
/// let view = Matrix4D::view_transform(from, to, up);
/// assert_eq!(view, Matrix4D::translation(0.0, 0.0, -8.0));
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct Matrix4D {
    data: [f64; 16],
}

/// Matrices are compared element-wise, within `FEQ_EPSILON`.
impl PartialEq for Matrix4D {
    fn eq(&self, other: &Matrix4D) -> bool {
        self.data.iter().zip(other.data.iter()).all(|(x, y)| feq(*x, *y))
    }
}

impl Matrix4D {
    /// Creates a zero matrix.
    pub fn new() -> Matrix4D {
        Matrix4D { data: [0.0; 16] }
    }

    pub fn identity() -> Matrix4D {
        let mut buf = [0.0; 16];
        buf[0] = 1.0; buf[5] = 1.0; buf[10] = 1.0; buf[15] = 1.0;

        Matrix4D { data: buf }
    }

    /// Offsets points by `x`, `y` and `z`. Vectors are unaffected.
    pub fn translation(x: f64, y: f64, z: f64) -> Matrix4D {
        let mut trans = Self::identity();
        trans[(0, 3)] = x;
        trans[(1, 3)] = y;
        trans[(2, 3)] = z;

        trans
    }

    pub fn scaling(x: f64, y: f64, z: f64) -> Matrix4D {
        let mut scale = Self::identity();
        scale[(0, 0)] = x;
        scale[(1, 1)] = y;
        scale[(2, 2)] = z;

        scale
    }

    /// Rotates `r` radians about an axis (left-handed).
    ///
    /// ```
    /// # use aun_tracer::tuple::Tuple4D;
    /// # use aun_tracer::matrix::{ Axis, Matrix4D };
    /// let m = Matrix4D::rotation(Axis::X, std::f64::consts::PI / 2.0);
    /// assert_eq!(m * Tuple4D::point(0.0, 1.0, 0.0),
    ///     Tuple4D::point(0.0, 0.0, 1.0));
    /// ```
    pub fn rotation(axis: Axis, r: f64) -> Matrix4D {
        let (a, b) = match axis {
            Axis::X => (1, 2),
            Axis::Y => (2, 0),
            Axis::Z => (0, 1),
        };

        let mut rotate = Self::identity();
        rotate[(a, a)] =  r.cos();
        rotate[(a, b)] = -r.sin();
        rotate[(b, a)] =  r.sin();
        rotate[(b, b)] =  r.cos();

        rotate
    }

    pub fn rotation_x(r: f64) -> Matrix4D {
        Self::rotation(Axis::X, r)
    }

    pub fn rotation_y(r: f64) -> Matrix4D {
        Self::rotation(Axis::Y, r)
    }

    pub fn rotation_z(r: f64) -> Matrix4D {
        Self::rotation(Axis::Z, r)
    }

    /// Moves each component in proportion to the other two. `xy` is the
    /// change in `x` with respect to `y`, and so on.
    pub fn shearing(xy: f64, xz: f64, yx: f64, yz: f64, zx: f64, zy: f64)
        -> Matrix4D {
        let mut shear = Self::identity();
        shear[(0, 1)] = xy;
        shear[(0, 2)] = xz;
        shear[(1, 0)] = yx;
        shear[(1, 2)] = yz;
        shear[(2, 0)] = zx;
        shear[(2, 1)] = zy;

        shear
    }

    /// Orients the world as seen by an eye at `from`, looking at `to`.
    ///
    /// Note that the view transformation moves the *world* with respect to the
    /// eye, not the other way around.
    pub fn view_transform(from: Tuple4D, to: Tuple4D, up: Tuple4D) -> Matrix4D {
        let forward = (to - from).normalize();
        let left = forward.cross(&up.normalize());
        let true_up = left.cross(&forward);

        let orientation: Matrix4D = [
                 left.x,      left.y,      left.z, 0.0,
              true_up.x,   true_up.y,   true_up.z, 0.0,
             -forward.x,  -forward.y,  -forward.z, 0.0,
                    0.0,         0.0,         0.0, 1.0,
        ].into();

        orientation * Matrix4D::translation(-from.x, -from.y, -from.z)
    }

    /// Returns the transpose of this matrix.
    pub fn transposition(&self) -> Matrix4D {
        let mut buf = Matrix4D::new();
        for r in 0..4 {
            for c in 0..4 {
                buf[(c, r)] = self[(r, c)];
            }
        }

        buf
    }

    fn submatrix(&self, row: usize, col: usize) -> Matrix3D {
        let mut buf = Matrix3D::default();
        let mut count = 0;

        for r in (0..4).filter(|&r| r != row) {
            for c in (0..4).filter(|&c| c != col) {
                buf.data[count] = self[(r, c)];
                count += 1;
            }
        }

        buf
    }

    /// The determinant of the submatrix without `row` and `col`.
    pub fn minor(&self, row: usize, col: usize) -> f64 {
        self.submatrix(row, col).determinant()
    }

    /// The minor at `row` and `col`, negated when `row + col` is odd.
    pub fn cofactor(&self, row: usize, col: usize) -> f64 {
        let m = self.minor(row, col);
        if (row + col) % 2 == 0 { m } else { -m }
    }

    pub fn determinant(&self) -> f64 {
        (0..4).map(|c| self[(0, c)] * self.cofactor(0, c)).sum()
    }

    pub fn is_invertible(&self) -> bool {
        self.determinant() != 0.0
    }

    /// Calculates the inverse of a `Matrix4D`.
    ///
    /// Fails with `TracerError::NonInvertible` if the determinant is zero.
    pub fn inverse(&self) -> Result<Matrix4D> {
        let det = self.determinant();
        if det == 0.0 {
            return Err(TracerError::NonInvertible);
        }

        let mut inv = Matrix4D::new();
        for r in 0..4 {
            for c in 0..4 {
                inv[(c, r)] = self.cofactor(r, c) / det;
            }
        }

        Ok(inv)
    }
}

impl From<[f64; 16]> for Matrix4D {
    fn from(data: [f64; 16]) -> Matrix4D {
        Matrix4D { data }
    }
}

impl Index<(usize, usize)> for Matrix4D {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.data[(index.0 * 4) + index.1]
    }
}

impl IndexMut<(usize, usize)> for Matrix4D {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.data[(index.0 * 4) + index.1]
    }
}

/// Matrix product. Not commutative: `a * b` applies `b` first.
impl Mul<Matrix4D> for Matrix4D {
    type Output = Matrix4D;

    fn mul(self, other: Matrix4D) -> Matrix4D {
        let mut res = Matrix4D::new();

        for r in 0..4 {
            for c in 0..4 {
                res[(r, c)] = (0..4).map(|k| self[(r, k)] * other[(k, c)]).sum();
            }
        }

        res
    }
}

impl Mul<Tuple4D> for Matrix4D {
    type Output = Tuple4D;

    fn mul(self, other: Tuple4D) -> Tuple4D {
        let row = |r: usize| self[(r, 0)] * other.x
            + self[(r, 1)] * other.y
            + self[(r, 2)] * other.z
            + self[(r, 3)] * other.w;

        Tuple4D { x: row(0), y: row(1), z: row(2), w: row(3) }
    }
}

impl fmt::Display for Matrix4D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..4 {
            write!(f, "|")?;
            for c in 0..4 {
                write!(f, " {} |", self[(r, c)])?;
            }

            // Don't put a newline on the final row (allow the user to do that)
            if r != 3 {
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

#[test]
fn identity_is_neutral() {
    let i = Matrix4D::identity();
    let a: Matrix4D = [ 0.0, 1.0,  2.0,  4.0,
                        1.0, 2.0,  4.0,  8.0,
                        2.0, 4.0,  8.0, 16.0,
                        4.0, 8.0, 16.0, 32.0, ].into();

    assert_eq!(i * a, a);
    assert_eq!(a * i, a);
}

#[test]
fn multiply_matrices() {
    let a: Matrix4D = [ 1.0, 2.0, 3.0, 4.0,
                        5.0, 6.0, 7.0, 8.0,
                        9.0, 8.0, 7.0, 6.0,
                        5.0, 4.0, 3.0, 2.0, ].into();
    let b: Matrix4D = [ -2.0, 1.0, 2.0,  3.0,
                         3.0, 2.0, 1.0, -1.0,
                         4.0, 3.0, 6.0,  5.0,
                         1.0, 2.0, 7.0,  8.0, ].into();
    let p: Matrix4D = [ 20.0, 22.0,  50.0,  48.0,
                        44.0, 54.0, 114.0, 108.0,
                        40.0, 58.0, 110.0, 102.0,
                        16.0, 26.0,  46.0,  42.0, ].into();

    assert_eq!(a * b, p);
}

#[test]
fn transpose() {
    let a: Matrix4D = [ 0.0, 9.0, 3.0, 0.0,
                        9.0, 8.0, 0.0, 8.0,
                        1.0, 8.0, 5.0, 3.0,
                        0.0, 0.0, 5.0, 8.0, ].into();

    let t: Matrix4D = [ 0.0, 9.0, 1.0, 0.0,
                        9.0, 8.0, 8.0, 0.0,
                        3.0, 0.0, 5.0, 5.0,
                        0.0, 8.0, 3.0, 8.0, ].into();

    assert_eq!(t, a.transposition());
    assert_eq!(t.transposition(), a);
    assert_eq!(Matrix4D::identity().transposition(), Matrix4D::identity());
}

#[test]
fn submatrix_drops_row_and_column() {
    let a: Matrix4D = [ -6.0, 1.0,  1.0, 6.0,
                        -8.0, 5.0,  8.0, 6.0,
                        -1.0, 0.0,  8.0, 2.0,
                        -7.0, 1.0, -1.0, 1.0, ].into();

    let s = Matrix3D { data: [ -6.0,  1.0, 6.0,
                               -8.0,  8.0, 6.0,
                               -7.0, -1.0, 1.0, ] };

    assert_eq!(a.submatrix(2, 1), s);
}

#[test]
fn mat3_minor_and_cofactor() {
    let a = Matrix3D { data: [ 3.0,  5.0,  0.0,
                               2.0, -1.0, -7.0,
                               6.0, -1.0,  5.0, ] };

    assert_eq!(a.minor(0, 0), -12.0);
    assert_eq!(a.cofactor(0, 0), -12.0);
    assert_eq!(a.minor(1, 0), 25.0);
    assert_eq!(a.cofactor(1, 0), -25.0);
}

#[test]
fn mat3_determinant() {
    let a = Matrix3D { data: [  1.0, 2.0,  6.0,
                               -5.0, 8.0, -4.0,
                                2.0, 6.0,  4.0, ] };

    assert_eq!(a.cofactor(0, 2), -46.0);
    assert_eq!(a.determinant(), -196.0);
}

#[test]
fn mat4_determinant() {
    let a: Matrix4D = [ -2.0, -8.0,  3.0,  5.0,
                        -3.0,  1.0,  7.0,  3.0,
                         1.0,  2.0, -9.0,  6.0,
                        -6.0,  7.0,  7.0, -9.0, ].into();

    assert_eq!(a.cofactor(0, 0), 690.0);
    assert_eq!(a.cofactor(0, 1), 447.0);
    assert_eq!(a.cofactor(0, 2), 210.0);
    assert_eq!(a.cofactor(0, 3), 51.0);
    assert_eq!(a.determinant(), -4071.0);
}

#[test]
fn singular_matrix_is_not_invertible() {
    let a: Matrix4D = [ -4.0,  2.0, -2.0, -3.0,
                         9.0,  6.0,  2.0,  6.0,
                         0.0, -5.0,  1.0, -5.0,
                         0.0,  0.0,  0.0,  0.0, ].into();

    assert!(!a.is_invertible());
    assert!(matches!(a.inverse(), Err(TracerError::NonInvertible)));
    assert!(Matrix4D::scaling(1.0, 0.0, 1.0).inverse().is_err());
}

#[test]
fn mat4_inverse() {
    let a: Matrix4D = [  8.0, -5.0,  9.0,  2.0,
                         7.0,  5.0,  6.0,  1.0,
                        -6.0,  0.0,  9.0,  6.0,
                        -3.0,  0.0, -9.0, -4.0, ].into();

    let i: Matrix4D = [ -0.15385, -0.15385, -0.28205, -0.53846,
                        -0.07692,  0.12308,  0.02564,  0.03077,
                         0.35897,  0.35897,  0.43590,  0.92308,
                        -0.69231, -0.69231, -0.76923, -1.92308, ].into();

    assert_eq!(a.inverse().unwrap(), i);
}

#[test]
fn matrix_times_inverse_is_identity() {
    let ms: [Matrix4D; 3] = [
        [  3.0, -9.0,  7.0,  3.0,
           3.0,  8.0,  2.0, -9.0,
          -4.0,  4.0,  4.0,  1.0,
          -6.0,  5.0, -1.0,  1.0, ].into(),
        Matrix4D::translation(1.0, -2.0, 3.0)
            * Matrix4D::rotation_y(0.7)
            * Matrix4D::scaling(2.0, 0.5, 4.0),
        Matrix4D::shearing(1.0, 0.0, 0.5, 0.0, 0.0, 2.0),
    ];

    for m in ms.iter() {
        let product = *m * m.inverse().unwrap();
        for r in 0..4 {
            for c in 0..4 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!((product[(r, c)] - expected).abs() < 1e-5);
            }
        }
    }
}

#[test]
fn product_times_inverse_recovers_factor() {
    let a: Matrix4D = [  3.0, -9.0,  7.0,  3.0,
                         3.0,  8.0,  2.0, -9.0,
                        -4.0,  4.0,  4.0,  1.0,
                        -6.0,  5.0, -1.0,  1.0, ].into();

    let b: Matrix4D = [ 8.0,  2.0, 2.0, 2.0,
                        3.0, -1.0, 7.0, 0.0,
                        7.0,  0.0, 5.0, 4.0,
                        6.0, -2.0, 0.0, 5.0  ].into();

    assert_eq!(a, (a * b) * b.inverse().unwrap());
}

#[test]
fn translation_moves_points_not_vectors() {
    let transform = Matrix4D::translation(5.0, -3.0, 2.0);
    let point = Tuple4D::point(-3.0, 4.0, 5.0);
    let vector = Tuple4D::vector(-3.0, 4.0, 5.0);

    assert_eq!(transform * point, Tuple4D::point(2.0, 1.0, 7.0));
    assert_eq!(transform.inverse().unwrap() * point,
        Tuple4D::point(-8.0, 7.0, 3.0));
    assert_eq!(transform * vector, vector);
}

#[test]
fn scaling_and_reflection() {
    let transform = Matrix4D::scaling(2.0, 3.0, 4.0);
    let vector = Tuple4D::vector(-4.0, 6.0, 8.0);

    assert_eq!(transform * vector, Tuple4D::vector(-8.0, 18.0, 32.0));
    assert_eq!(transform.inverse().unwrap() * vector,
        Tuple4D::vector(-2.0, 2.0, 2.0));
    assert_eq!(Matrix4D::scaling(-1.0, 1.0, 1.0) * Tuple4D::point(2.0, 3.0, 4.0),
        Tuple4D::point(-2.0, 3.0, 4.0));
}

#[test]
fn rotations_about_each_axis() {
    let half = std::f64::consts::PI / 4.0;
    let full = std::f64::consts::PI / 2.0;
    let r2 = 2.0f64.sqrt() / 2.0;

    assert_eq!(Matrix4D::rotation_x(full) * Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(0.0, 0.0, 1.0));
    assert_eq!(Matrix4D::rotation_x(half) * Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(0.0, r2, r2));

    assert_eq!(Matrix4D::rotation_y(full) * Tuple4D::point(0.0, 0.0, 1.0),
        Tuple4D::point(1.0, 0.0, 0.0));
    assert_eq!(Matrix4D::rotation_y(half) * Tuple4D::point(0.0, 0.0, 1.0),
        Tuple4D::point(r2, 0.0, r2));

    assert_eq!(Matrix4D::rotation_z(full) * Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(-1.0, 0.0, 0.0));
    assert_eq!(Matrix4D::rotation_z(half) * Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(-r2, r2, 0.0));
}

#[test]
fn shearing_each_pair() {
    let p = Tuple4D::point(2.0, 3.0, 4.0);

    assert_eq!(Matrix4D::shearing(1.0, 0.0, 0.0, 0.0, 0.0, 0.0) * p,
        Tuple4D::point(5.0, 3.0, 4.0));
    assert_eq!(Matrix4D::shearing(0.0, 1.0, 0.0, 0.0, 0.0, 0.0) * p,
        Tuple4D::point(6.0, 3.0, 4.0));
    assert_eq!(Matrix4D::shearing(0.0, 0.0, 1.0, 0.0, 0.0, 0.0) * p,
        Tuple4D::point(2.0, 5.0, 4.0));
    assert_eq!(Matrix4D::shearing(0.0, 0.0, 0.0, 1.0, 0.0, 0.0) * p,
        Tuple4D::point(2.0, 7.0, 4.0));
    assert_eq!(Matrix4D::shearing(0.0, 0.0, 0.0, 0.0, 1.0, 0.0) * p,
        Tuple4D::point(2.0, 3.0, 6.0));
    assert_eq!(Matrix4D::shearing(0.0, 0.0, 0.0, 0.0, 0.0, 1.0) * p,
        Tuple4D::point(2.0, 3.0, 7.0));
}

#[test]
fn chained_transforms_apply_right_to_left() {
    let a = Matrix4D::rotation_x(std::f64::consts::PI / 2.0);
    let b = Matrix4D::scaling(5.0, 5.0, 5.0);
    let c = Matrix4D::translation(10.0, 5.0, 7.0);

    let t = c * b * a;
    assert_eq!(t * Tuple4D::point(1.0, 0.0, 1.0), Tuple4D::point(15.0, 0.0, 7.0));
}

#[test]
fn default_view_is_identity() {
    let from = Tuple4D::point(0.0, 0.0, 0.0);
    let to = Tuple4D::point(0.0, 0.0, -1.0);
    let up = Tuple4D::vector(0.0, 1.0, 0.0);

    assert_eq!(Matrix4D::identity(), Matrix4D::view_transform(from, to, up));
}

#[test]
fn positive_z_view_mirrors() {
    let from = Tuple4D::point(0.0, 0.0, 0.0);
    let to = Tuple4D::point(0.0, 0.0, 1.0);
    let up = Tuple4D::vector(0.0, 1.0, 0.0);

    assert_eq!(Matrix4D::view_transform(from, to, up),
        Matrix4D::scaling(-1.0, 1.0, -1.0));
}

#[test]
fn arbitrary_view() {
    let from = Tuple4D::point(1.0, 3.0, 2.0);
    let to = Tuple4D::point(4.0, -2.0, 8.0);
    let up = Tuple4D::vector(1.0, 1.0, 0.0);

    let a: Matrix4D = [ -0.50709, 0.50709,  0.67612, -2.36643,
                         0.76772, 0.60609,  0.12122, -2.82843,
                        -0.35857, 0.59761, -0.71714,  0.00000,
                         0.00000, 0.00000,  0.00000,  1.00000, ].into();

    assert_eq!(Matrix4D::view_transform(from, to, up), a);
}
