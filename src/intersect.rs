use std::cmp::Ordering;
use std::iter::FromIterator;

use crate::consts::{ EPSILON, VACUUM_RI };
use crate::tuple::Tuple4D;
use crate::ray::Ray4D;
use crate::shape::{ ShapeId, Shapes };

/// An intersection.
///
/// This structure assumes that some ray produced an intersection. Parameter `t`
/// is analogous to `t` for a ray (the offset from the ray origin).
///
/// `object` identifies the primitive that was hit; two intersections refer
/// to the same shape exactly when their ids are equal. Triangles also record
/// the barycentric `uv` of the hit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Intersection {
    pub t: f64,
    pub object: ShapeId,
    pub uv: Option<(f64, f64)>,
}

impl Intersection {
    pub fn new(t: f64, object: ShapeId) -> Intersection {
        Intersection { t, object, uv: None }
    }

    /// An intersection carrying barycentric coordinates.
    pub fn new_uv(t: f64, object: ShapeId, u: f64, v: f64) -> Intersection {
        Intersection { t, object, uv: Some((u, v)) }
    }
}

/// A collection of intersections, kept in ascending order of `t`.
///
/// Sorting is stable, so intersections with equal `t` keep the order they
/// were produced in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Intersections {
    pub intersections: Vec<Intersection>,
}

impl From<Vec<Intersection>> for Intersections {
    fn from(intersections: Vec<Intersection>) -> Intersections {
        let mut is = Intersections { intersections };
        is.sort();
        is
    }
}

impl FromIterator<Intersection> for Intersections {
    fn from_iter<I: IntoIterator<Item = Intersection>>(iter: I)
        -> Intersections {
        Intersections::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl Intersections {
    /// Creates a new list of intersections.
    pub fn new() -> Intersections {
        Intersections { intersections: Vec::new() }
    }

    /// Merges several lists into one sorted list.
    pub fn aggregate<I>(lists: I) -> Intersections
        where I: IntoIterator<Item = Intersections> {
        lists.into_iter().flat_map(|is| is.intersections).collect()
    }

    /// Sorts the intersections by `t`, treating incomparable values as equal.
    pub fn sort(&mut self) {
        self.intersections.sort_by(|a, b|
            a.t.partial_cmp(&b.t).unwrap_or(Ordering::Equal)
        );
    }

    /// The nearest intersection with a finite, non-negative `t`.
    ///
    /// Relies on the list being sorted; returns `None` when nothing is hit.
    pub fn hit(&self) -> Option<Intersection> {
        self.intersections.iter()
            .find(|i| i.t.is_finite() && i.t >= 0.0)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Intersection> {
        self.intersections.iter()
    }
}

/// A record for computations associated with an `Intersection`.
///
/// Mostly a superset of an `Intersection`, holding everything shading needs.
#[derive(Copy, Clone, Debug)]
pub struct IntersectionComputation {
    /// The "time" of the ray intersection.
    pub t: f64,

    /// The object being intersected.
    pub object: ShapeId,

    /// The point where the intersection occurs.
    pub point: Tuple4D,

    /// A point slightly above the intersected surface. Shadow and reflection
    /// rays start here so a surface never shadows itself.
    pub over_point: Tuple4D,

    /// A point slightly below the intersected surface, where refracted rays
    /// start.
    pub under_point: Tuple4D,

    /// The eye vector for the intersection.
    pub eyev: Tuple4D,

    /// The normal vector at the hit, facing the eye.
    pub normalv: Tuple4D,

    /// The intersection ray, reflected across the normal.
    pub reflectv: Tuple4D,

    /// Whether the ray started inside the object.
    pub inside: bool,

    /// The refractive index of the material being exited.
    pub n1: f64,

    /// The refractive index of the material being entered.
    pub n2: f64,
}

impl IntersectionComputation {
    /// Prepares shading inputs for `hit`, one of the intersections of `r`.
    ///
    /// `is` must be the full sorted list `hit` came from; it is replayed to
    /// find the refractive indices on either side of the surface.
    pub fn new(r: &Ray4D, hit: &Intersection, is: &Intersections,
        shapes: &Shapes) -> IntersectionComputation {
        let t = hit.t;
        let point = r.position(t);
        let eyev = -r.direction;
        let mut normalv = shapes.normal_at(hit, point);

        let inside = if normalv.dot(&eyev) < 0.0 {
            normalv = -normalv;
            true
        } else {
            false
        };

        let over_point = point + normalv * EPSILON;
        let under_point = point - normalv * EPSILON;
        let reflectv = r.direction.reflect(&normalv);
        let (n1, n2) = Self::refraction_indices(hit, is, shapes);

        IntersectionComputation {
            t,
            object: hit.object,
            point, over_point, under_point,
            eyev, normalv, reflectv,
            inside,
            n1, n2,
        }
    }

    fn refraction_indices(hit: &Intersection, is: &Intersections,
        shapes: &Shapes) -> (f64, f64) {
        let index_of = |containers: &[ShapeId]| match containers.last() {
            Some(&id) => shapes.material(id).refractive_index,
            None => VACUUM_RI,
        };

        // Objects the ray has entered but not yet left, innermost last.
        let mut containers: Vec<ShapeId> = Vec::new();

        for i in is.iter() {
            let is_hit = i == hit;
            let n1 = index_of(&containers);

            match containers.iter().position(|&c| c == i.object) {
                Some(j) => { containers.remove(j); },
                None => containers.push(i.object),
            }

            if is_hit {
                return (n1, index_of(&containers));
            }
        }

        (VACUUM_RI, VACUUM_RI)
    }

    /// The Schlick approximation of the reflectance at the hit.
    ///
    /// Gives the fraction of light reflected, between 0 and 1; 1 under total
    /// internal reflection.
    pub fn schlick(&self) -> f64 {
        let mut cos = self.eyev.dot(&self.normalv);

        // Total internal reflection can only occur if n1 > n2.
        if self.n1 > self.n2 {
            let n = self.n1 / self.n2;
            let sin2_t = n.powi(2) * (1.0 - cos.powi(2));
            if sin2_t > 1.0 {
                return 1.0;
            }

            cos = (1.0 - sin2_t).sqrt();
        }

        let r0 = ((self.n1 - self.n2) / (self.n1 + self.n2)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cos).powi(5)
    }
}

#[cfg(test)]
use crate::shape::Shape;
#[cfg(test)]
use crate::light::Material;
#[cfg(test)]
use crate::matrix::Matrix4D;

#[cfg(test)]
fn glass_sphere() -> Shape {
    Shape::sphere().with_material(Material::glass())
}

#[test]
fn hit_with_all_positive() {
    let s = ShapeId(0);
    let is = Intersections::from(vec![
        Intersection::new(1.0, s),
        Intersection::new(2.0, s),
    ]);

    assert_eq!(is.hit(), Some(Intersection::new(1.0, s)));
}

#[test]
fn hit_with_some_negative() {
    let s = ShapeId(0);
    let is = Intersections::from(vec![
        Intersection::new(-1.0, s),
        Intersection::new(1.0, s),
    ]);

    assert_eq!(is.hit(), Some(Intersection::new(1.0, s)));
}

#[test]
fn hit_with_all_negative() {
    let s = ShapeId(0);
    let is = Intersections::from(vec![
        Intersection::new(-2.0, s),
        Intersection::new(-1.0, s),
    ]);

    assert_eq!(is.hit(), None);
}

#[test]
fn hit_is_lowest_nonnegative() {
    let s = ShapeId(0);
    let is = Intersections::from(vec![
        Intersection::new(5.0, s),
        Intersection::new(7.0, s),
        Intersection::new(-3.0, s),
        Intersection::new(2.0, s),
    ]);

    assert_eq!(is.hit(), Some(Intersection::new(2.0, s)));
}

#[test]
fn sorting_is_stable_for_equal_t() {
    let is = Intersections::from(vec![
        Intersection::new(3.0, ShapeId(2)),
        Intersection::new(1.0, ShapeId(0)),
        Intersection::new(3.0, ShapeId(1)),
    ]);

    let ids: Vec<usize> = is.iter().map(|i| i.object.index()).collect();
    assert_eq!(ids, vec![0, 2, 1]);
}

#[test]
fn precompute_outside_intersection() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(Shape::sphere());
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0),
                       Tuple4D::vector(0.0, 0.0, 1.0));
    let i = Intersection::new(4.0, s);

    let comps = IntersectionComputation::new(&r, &i,
        &Intersections::from(vec![i]), &shapes);

    assert_eq!(comps.t, 4.0);
    assert_eq!(comps.object, s);
    assert_eq!(comps.point, Tuple4D::point(0.0, 0.0, -1.0));
    assert_eq!(comps.eyev, Tuple4D::vector(0.0, 0.0, -1.0));
    assert_eq!(comps.normalv, Tuple4D::vector(0.0, 0.0, -1.0));
    assert!(!comps.inside);
}

#[test]
fn precompute_inside_intersection() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(Shape::sphere());
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, 0.0),
                       Tuple4D::vector(0.0, 0.0, 1.0));
    let i = Intersection::new(1.0, s);

    let comps = IntersectionComputation::new(&r, &i,
        &Intersections::from(vec![i]), &shapes);

    assert_eq!(comps.point, Tuple4D::point(0.0, 0.0, 1.0));
    assert_eq!(comps.eyev, Tuple4D::vector(0.0, 0.0, -1.0));
    // The normal is inverted to face the eye.
    assert_eq!(comps.normalv, Tuple4D::vector(0.0, 0.0, -1.0));
    assert!(comps.inside);
}

#[test]
fn hit_should_offset_over_and_under_points() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(
        glass_sphere().with_transform(Matrix4D::translation(0.0, 0.0, 1.0)).unwrap()
    );
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0),
                       Tuple4D::vector(0.0, 0.0, 1.0));
    let i = Intersection::new(5.0, s);

    let comps = IntersectionComputation::new(&r, &i,
        &Intersections::from(vec![i]), &shapes);

    assert!(comps.over_point.z < -EPSILON / 2.0);
    assert!(comps.point.z > comps.over_point.z);
    assert!(comps.under_point.z > EPSILON / 2.0);
    assert!(comps.point.z < comps.under_point.z);
}

#[test]
fn precompute_reflection_vector() {
    let mut shapes = Shapes::new();
    let p = shapes.insert(Shape::plane());
    let k = 2.0f64.sqrt() / 2.0;
    let r = Ray4D::new(Tuple4D::point(0.0, 1.0, -1.0),
                       Tuple4D::vector(0.0, -k, k));
    let i = Intersection::new(2.0f64.sqrt(), p);

    let comps = IntersectionComputation::new(&r, &i,
        &Intersections::from(vec![i]), &shapes);

    assert_eq!(comps.reflectv, Tuple4D::vector(0.0, k, k));
}

#[test]
fn refractive_indices_at_nested_glass_boundaries() {
    let mut shapes = Shapes::new();

    let mut m = Material::glass();
    let a = shapes.insert(glass_sphere()
        .with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
        .with_material(m));

    m.refractive_index = 2.0;
    let b = shapes.insert(glass_sphere()
        .with_transform(Matrix4D::translation(0.0, 0.0, -0.25)).unwrap()
        .with_material(m));

    m.refractive_index = 2.5;
    let c = shapes.insert(glass_sphere()
        .with_transform(Matrix4D::translation(0.0, 0.0, 0.25)).unwrap()
        .with_material(m));

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -4.0),
                       Tuple4D::vector(0.0, 0.0, 1.0));
    let is = Intersections::from(vec![
        Intersection::new(2.0, a),
        Intersection::new(2.75, b),
        Intersection::new(3.25, c),
        Intersection::new(4.75, b),
        Intersection::new(5.25, c),
        Intersection::new(6.0, a),
    ]);

    let expected = [
        (1.0, 1.5), (1.5, 2.0), (2.0, 2.5),
        (2.5, 2.5), (2.5, 1.5), (1.5, 1.0),
    ];

    for (i, (n1, n2)) in is.iter().zip(expected.iter()) {
        let comps = IntersectionComputation::new(&r, i, &is, &shapes);
        assert_eq!((comps.n1, comps.n2), (*n1, *n2));
    }
}

#[test]
fn schlick_under_total_internal_reflection() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(glass_sphere());
    let k = 2.0f64.sqrt() / 2.0;
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, k),
                       Tuple4D::vector(0.0, 1.0, 0.0));
    let is = Intersections::from(vec![
        Intersection::new(-k, s),
        Intersection::new(k, s),
    ]);

    let comps = IntersectionComputation::new(&r, &is.intersections[1], &is, &shapes);
    assert_eq!(comps.schlick(), 1.0);
}

#[test]
fn schlick_with_perpendicular_viewing_angle() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(glass_sphere());
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, 0.0),
                       Tuple4D::vector(0.0, 1.0, 0.0));
    let is = Intersections::from(vec![
        Intersection::new(-1.0, s),
        Intersection::new(1.0, s),
    ]);

    let comps = IntersectionComputation::new(&r, &is.intersections[1], &is, &shapes);
    assert!(crate::feq(comps.schlick(), 0.04));
}

#[test]
fn schlick_with_small_angle_and_n2_greater() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(glass_sphere());
    let r = Ray4D::new(Tuple4D::point(0.0, 0.99, -2.0),
                       Tuple4D::vector(0.0, 0.0, 1.0));
    let is = Intersections::from(vec![Intersection::new(1.8589, s)]);

    let comps = IntersectionComputation::new(&r, &is.intersections[0], &is, &shapes);
    assert!(crate::feq(comps.schlick(), 0.48873));
}
