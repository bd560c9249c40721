use crate::tuple::Tuple4D;
use crate::matrix::Matrix4D;

/// A ray: an origin point and a direction vector.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Ray4D {
    pub origin: Tuple4D,
    pub direction: Tuple4D,
}

impl Ray4D {
    /// Creates a ray, coercing `origin` to a point and `direction` to a
    /// vector.
    pub fn new(origin: Tuple4D, direction: Tuple4D) -> Ray4D {
        Ray4D {
            origin: Tuple4D { w: 1.0, ..origin },
            direction: direction.as_vector(),
        }
    }

    /// The point `t` units along the ray.
    pub fn position(&self, t: f64) -> Tuple4D {
        self.origin + (t * self.direction)
    }

    /// Maps the ray through a transform (usually an inverse shape transform,
    /// taking the ray into object space). The direction is not renormalized.
    pub fn transform(&self, m: &Matrix4D) -> Ray4D {
        Ray4D {
            origin: *m * self.origin,
            direction: *m * self.direction,
        }
    }
}

#[test]
fn ray_position() {
    let r = Ray4D::new(
        Tuple4D::point(2.0, 3.0, 4.0),
        Tuple4D::vector(1.0, 0.0, 0.0)
    );

    assert_eq!(r.position(0.0), Tuple4D::point(2.0, 3.0, 4.0));
    assert_eq!(r.position(1.0), Tuple4D::point(3.0, 3.0, 4.0));
    assert_eq!(r.position(-1.0), Tuple4D::point(1.0, 3.0, 4.0));
    assert_eq!(r.position(2.5), Tuple4D::point(4.5, 3.0, 4.0));
}

#[test]
fn ray_coerces_components() {
    let r = Ray4D::new(
        Tuple4D::tuple(1.0, 2.0, 3.0, 0.0),
        Tuple4D::tuple(0.0, 1.0, 0.0, 1.0)
    );

    assert!(r.origin.is_point());
    assert!(r.direction.is_vector());
}

#[test]
fn ray_translation() {
    let r = Ray4D::new(
        Tuple4D::point(1.0, 2.0, 3.0),
        Tuple4D::vector(0.0, 1.0, 0.0)
    );
    let t = r.transform(&Matrix4D::translation(3.0, 4.0, 5.0));

    assert_eq!(t.origin, Tuple4D::point(4.0, 6.0, 8.0));
    assert_eq!(t.direction, Tuple4D::vector(0.0, 1.0, 0.0));
}

#[test]
fn ray_scaling() {
    let r = Ray4D::new(
        Tuple4D::point(1.0, 2.0, 3.0),
        Tuple4D::vector(0.0, 1.0, 0.0)
    );
    let t = r.transform(&Matrix4D::scaling(2.0, 3.0, 4.0));

    assert_eq!(t.origin, Tuple4D::point(2.0, 6.0, 12.0));
    assert_eq!(t.direction, Tuple4D::vector(0.0, 3.0, 0.0));
}
