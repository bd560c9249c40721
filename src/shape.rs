use std::fmt;
use std::ops::Index;

use crate::consts::{ EPSILON, FEQ_EPSILON, PLANE_EPSILON };
use crate::error::{ Result, TracerError };
use crate::tuple::Tuple4D;
use crate::ray::Ray4D;
use crate::light::Material;
use crate::matrix::Matrix4D;
use crate::intersect::{ Intersection, Intersections };

/// A handle to a shape stored in a `Shapes` arena.
///
/// Ids are only meaningful for the arena that handed them out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub(crate) usize);

impl ShapeId {
    /// The position of the shape in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Precomputed data for a flat triangle.
///
/// `e1` and `e2` are the edges leaving `p1`; `normal` is constant across the
/// whole face.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TriangleInfo {
    pub p1: Tuple4D,
    pub p2: Tuple4D,
    pub p3: Tuple4D,

    pub e1: Tuple4D,
    pub e2: Tuple4D,
    pub normal: Tuple4D,
}

impl TriangleInfo {
    pub fn new(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D) -> TriangleInfo {
        let e1 = p2 - p1;
        let e2 = p3 - p1;

        TriangleInfo {
            p1, p2, p3,
            e1, e2,
            normal: e2.cross(&e1).normalize(),
        }
    }

    /// Möller-Trumbore intersection, returning `(t, u, v)` on a hit.
    ///
    /// Triangles are single sided only in the sense that rays parallel to
    /// the face never hit it.
    fn hit(&self, ray: &Ray4D) -> Option<(f64, f64, f64)> {
        let dir_cross_e2 = ray.direction.cross(&self.e2);
        let determinant = self.e1.dot(&dir_cross_e2);
        if determinant.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / determinant;
        let p1_to_origin = ray.origin - self.p1;
        let u = f * p1_to_origin.dot(&dir_cross_e2);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let origin_cross_e1 = p1_to_origin.cross(&self.e1);
        let v = f * ray.direction.dot(&origin_cross_e1);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.e2.dot(&origin_cross_e1);
        Some((t, u, v))
    }
}

/// A triangle with a normal at each vertex.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SmoothTriangleInfo {
    pub triangle_info: TriangleInfo,

    pub n1: Tuple4D,
    pub n2: Tuple4D,
    pub n3: Tuple4D,
}

impl SmoothTriangleInfo {
    pub fn new(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D,
        n1: Tuple4D, n2: Tuple4D, n3: Tuple4D) -> SmoothTriangleInfo {
        SmoothTriangleInfo {
            triangle_info: TriangleInfo::new(p1, p2, p3),
            n1: n1.as_vector(),
            n2: n2.as_vector(),
            n3: n3.as_vector(),
        }
    }

    /// Blends the vertex normals with the barycentric coordinates of a hit.
    fn interpolate(&self, u: f64, v: f64) -> Tuple4D {
        self.n2 * u + self.n3 * v + self.n1 * (1.0 - u - v)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShapeType {
    /// A unit sphere with its center at the object-space origin.
    Sphere,

    /// The XZ plane, with its normal pointing up along Y.
    Plane,

    /// A cube spanning `[-1, 1]` on every axis.
    Cube,

    /// A unit-radius cylinder around Y. Minimum Y, maximum Y and whether the
    /// ends are capped.
    Cylinder(f64, f64, bool),

    /// A double-napped cone around Y. Minimum Y, maximum Y and whether the
    /// ends are capped.
    Cone(f64, f64, bool),

    /// A flat triangle. See `TriangleInfo`.
    Triangle(TriangleInfo),

    /// A triangle with interpolated normals. See `SmoothTriangleInfo`.
    SmoothTriangle(SmoothTriangleInfo),

    /// A group of shapes, held as ids into the owning arena.
    Group(Vec<ShapeId>),
}

/// A node of the scene graph.
///
/// Every shape owns a transform and its cached inverse, an optional
/// material and an optional parent. Shapes are built detached, then moved
/// into a `Shapes` arena where they can be attached to groups.
///
/// # Examples
///
/// ```
/// # use aun_tracer::shape::Shape;
/// # use aun_tracer::matrix::Matrix4D;
/// let s = Shape::sphere()
///     .with_transform(Matrix4D::translation(0.0, 1.0, 0.0))
///     .unwrap();
///
/// assert_eq!(*s.transform(), Matrix4D::translation(0.0, 1.0, 0.0));
/// assert!(s.material().is_none());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    ty: ShapeType,
    material: Option<Material>,
    transform: Matrix4D,
    inverse: Matrix4D,
    parent: Option<ShapeId>,
}

impl Shape {
    fn new(ty: ShapeType) -> Shape {
        Shape {
            ty,
            material: None,
            transform: Matrix4D::identity(),
            inverse: Matrix4D::identity(),
            parent: None,
        }
    }

    /// Creates a unit sphere with identity transform.
    pub fn sphere() -> Shape {
        Self::new(ShapeType::Sphere)
    }

    /// Creates a plane with a normal pointing up along the Y axis.
    pub fn plane() -> Shape {
        Self::new(ShapeType::Plane)
    }

    /// Creates a unit cube with identity transform.
    pub fn cube() -> Shape {
        Self::new(ShapeType::Cube)
    }

    /// Creates an infinitely long cylinder with no end caps.
    pub fn cylinder() -> Shape {
        Self::new(ShapeType::Cylinder(f64::NEG_INFINITY, f64::INFINITY, false))
    }

    /// Creates a bounded cylinder without caps.
    pub fn bounded_cylinder(minimum: f64, maximum: f64) -> Shape {
        Self::new(ShapeType::Cylinder(minimum, maximum, false))
    }

    /// Creates a bounded cylinder with caps.
    pub fn capped_cylinder(minimum: f64, maximum: f64) -> Shape {
        Self::new(ShapeType::Cylinder(minimum, maximum, true))
    }

    /// Creates an infinite double-napped cone.
    pub fn cone() -> Shape {
        Self::new(ShapeType::Cone(f64::NEG_INFINITY, f64::INFINITY, false))
    }

    /// Creates a bounded double-napped cone with no end caps.
    pub fn bounded_cone(minimum: f64, maximum: f64) -> Shape {
        Self::new(ShapeType::Cone(minimum, maximum, false))
    }

    /// Creates a bounded double-napped cone with end caps.
    pub fn capped_cone(minimum: f64, maximum: f64) -> Shape {
        Self::new(ShapeType::Cone(minimum, maximum, true))
    }

    /// Creates a triangle, defined by three points in space.
    pub fn triangle(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D) -> Shape {
        Self::new(ShapeType::Triangle(TriangleInfo::new(p1, p2, p3)))
    }

    /// Creates a "smooth" triangle with normals at each vertex.
    pub fn smooth_triangle(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D,
        n1: Tuple4D, n2: Tuple4D, n3: Tuple4D) -> Shape {
        Self::new(ShapeType::SmoothTriangle(
            SmoothTriangleInfo::new(p1, p2, p3, n1, n2, n3)
        ))
    }

    /// Creates an empty group. Children are attached through `Shapes`.
    pub fn group() -> Shape {
        Self::new(ShapeType::Group(Vec::new()))
    }

    pub fn ty(&self) -> &ShapeType {
        &self.ty
    }

    pub fn transform(&self) -> &Matrix4D {
        &self.transform
    }

    pub fn inverse(&self) -> &Matrix4D {
        &self.inverse
    }

    /// Replaces the transform, refreshing the cached inverse.
    ///
    /// Returns `TracerError::NonInvertible` and leaves the shape untouched
    /// if `transform` is singular.
    pub fn set_transform(&mut self, transform: Matrix4D) -> Result<()> {
        self.inverse = transform.inverse()?;
        self.transform = transform;
        Ok(())
    }

    /// Builder form of `set_transform`.
    pub fn with_transform(mut self, transform: Matrix4D) -> Result<Shape> {
        self.set_transform(transform)?;
        Ok(self)
    }

    /// The material set directly on this shape, if any.
    ///
    /// Use `Shapes::material` for the material a shape renders with.
    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = Some(material);
    }

    /// Builder form of `set_material`.
    pub fn with_material(mut self, material: Material) -> Shape {
        self.set_material(material);
        self
    }

    pub fn parent(&self) -> Option<ShapeId> {
        self.parent
    }

    /// Child ids if this shape is a group.
    pub fn children(&self) -> Option<&[ShapeId]> {
        match self.ty {
            ShapeType::Group(ref children) => Some(children),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.ty, ShapeType::Group(_))
    }

    /// Intersects a ray, already in object space, with a primitive.
    ///
    /// `id` is recorded in each intersection. Groups hold no geometry of
    /// their own and yield nothing here; `Shapes::local_intersect` descends
    /// into their children.
    pub fn local_intersect(&self, id: ShapeId, ray: &Ray4D) -> Intersections {
        let ts = match self.ty {
            ShapeType::Sphere => intersect_sphere(ray),
            ShapeType::Plane => intersect_plane(ray),
            ShapeType::Cube => intersect_cube(ray),
            ShapeType::Cylinder(min, max, closed)
                => intersect_cylinder(ray, min, max, closed),
            ShapeType::Cone(min, max, closed)
                => intersect_cone(ray, min, max, closed),

            ShapeType::Triangle(ref ti) => {
                return ti.hit(ray)
                    .map(|(t, _, _)| Intersection::new(t, id))
                    .into_iter()
                    .collect();
            },

            ShapeType::SmoothTriangle(ref sti) => {
                return sti.triangle_info.hit(ray)
                    .map(|(t, u, v)| Intersection::new_uv(t, id, u, v))
                    .into_iter()
                    .collect();
            },

            ShapeType::Group(_) => Vec::new(),
        };

        ts.into_iter().map(|t| Intersection::new(t, id)).collect()
    }

    /// The normal at an object-space point on the surface.
    ///
    /// `hit` supplies barycentric coordinates for smooth triangles. Groups
    /// are never hit directly, so they report the direction of `at` from
    /// the origin.
    pub fn local_normal_at(&self, at: Tuple4D, hit: &Intersection) -> Tuple4D {
        match self.ty {
            ShapeType::Sphere => at.as_vector(),
            ShapeType::Plane => Tuple4D::vector(0.0, 1.0, 0.0),
            ShapeType::Cube => normal_at_cube(at),
            ShapeType::Cylinder(min, max, _) => normal_at_cylinder(at, min, max),
            ShapeType::Cone(min, max, _) => normal_at_cone(at, min, max),
            ShapeType::Triangle(ref ti) => ti.normal,
            ShapeType::SmoothTriangle(ref sti) => match hit.uv {
                Some((u, v)) => sti.interpolate(u, v),
                None => sti.triangle_info.normal,
            },
            ShapeType::Group(_) => at.as_vector(),
        }
    }
}

/// Checks whether a ray intersects a unit sphere.
///
/// Either zero or two roots are returned; a tangent ray gives the same root
/// twice.
fn intersect_sphere(ray: &Ray4D) -> Vec<f64> {
    // Subtracting the origin point leaves a vector.
    let sphere_to_ray = ray.origin - Tuple4D::origin();

    let a = ray.direction.dot(&ray.direction);
    let b = 2.0 * ray.direction.dot(&sphere_to_ray);
    let c = sphere_to_ray.dot(&sphere_to_ray) - 1.0;

    let discriminant = b.powi(2) - 4.0 * a * c;
    if discriminant < 0.0 {
        return Vec::new();
    }

    let t1 = (-b - discriminant.sqrt()) / (2.0 * a);
    let t2 = (-b + discriminant.sqrt()) / (2.0 * a);
    vec![t1, t2]
}

fn intersect_plane(ray: &Ray4D) -> Vec<f64> {
    // Parallel (or coplanar) rays never hit the plane.
    if ray.direction.y.abs() < PLANE_EPSILON {
        return Vec::new();
    }

    vec![-ray.origin.y / ray.direction.y]
}

fn intersect_cube(ray: &Ray4D) -> Vec<f64> {
    let (xtmin, xtmax) = check_cube_axis(ray.origin.x, ray.direction.x);
    let (ytmin, ytmax) = check_cube_axis(ray.origin.y, ray.direction.y);
    let (ztmin, ztmax) = check_cube_axis(ray.origin.z, ray.direction.z);

    let tmin = xtmin.max(ytmin).max(ztmin);
    let tmax = xtmax.min(ytmax).min(ztmax);

    if tmin > tmax {
        return Vec::new();
    }

    vec![tmin, tmax]
}

/// Gets the entry and exit offsets of a ray against one pair of cube faces.
///
/// The smaller `t` is first in the tuple.
fn check_cube_axis(origin: f64, direction: f64) -> (f64, f64) {
    let tmin_numerator = -1.0 - origin;
    let tmax_numerator = 1.0 - origin;

    // A ray parallel to the faces never crosses them.
    let (tmin, tmax) = if direction.abs() >= EPSILON {
        (tmin_numerator / direction, tmax_numerator / direction)
    } else {
        (tmin_numerator * f64::INFINITY, tmax_numerator * f64::INFINITY)
    };

    if tmin > tmax { (tmax, tmin) } else { (tmin, tmax) }
}

fn normal_at_cube(p: Tuple4D) -> Tuple4D {
    let xa = p.x.abs();
    let ya = p.y.abs();
    let za = p.z.abs();

    let max_component = xa.max(ya).max(za);
    if max_component == xa {
        Tuple4D::vector(p.x, 0.0, 0.0)
    } else if max_component == ya {
        Tuple4D::vector(0.0, p.y, 0.0)
    } else {
        Tuple4D::vector(0.0, 0.0, p.z)
    }
}

/// Keeps the roots of a side-wall quadratic that fall strictly between the
/// bounds on Y.
fn bounded_roots(ray: &Ray4D, a: f64, b: f64, c: f64, minimum: f64,
    maximum: f64, ts: &mut Vec<f64>) {
    let disc = b.powi(2) - 4.0 * a * c;
    if disc < 0.0 {
        return;
    }

    let mut t0 = (-b - disc.sqrt()) / (2.0 * a);
    let mut t1 = (-b + disc.sqrt()) / (2.0 * a);
    if t0 > t1 {
        std::mem::swap(&mut t0, &mut t1);
    }

    for t in [t0, t1] {
        let y = ray.origin.y + t * ray.direction.y;
        if minimum < y && y < maximum {
            ts.push(t);
        }
    }
}

/// Adds hits on the end caps at `minimum` and `maximum`.
///
/// `radius` gives the cap radius for a cap at a particular height.
fn intersect_caps<F>(ray: &Ray4D, minimum: f64, maximum: f64, radius: F,
    ts: &mut Vec<f64>)
    where F: Fn(f64) -> f64 {
    if ray.direction.y.abs() < EPSILON {
        return;
    }

    for y in [minimum, maximum] {
        let t = (y - ray.origin.y) / ray.direction.y;
        let x = ray.origin.x + t * ray.direction.x;
        let z = ray.origin.z + t * ray.direction.z;

        if x.powi(2) + z.powi(2) <= radius(y).powi(2) {
            ts.push(t);
        }
    }
}

fn intersect_cylinder(ray: &Ray4D, minimum: f64, maximum: f64, closed: bool)
    -> Vec<f64> {
    let mut ts = Vec::new();

    let a = ray.direction.x.powi(2) + ray.direction.z.powi(2);

    // Rays parallel to Y can only hit the caps.
    if a >= EPSILON {
        let b = 2.0 * ray.origin.x * ray.direction.x
              + 2.0 * ray.origin.z * ray.direction.z;
        let c = ray.origin.x.powi(2) + ray.origin.z.powi(2) - 1.0;

        bounded_roots(ray, a, b, c, minimum, maximum, &mut ts);
    }

    if closed {
        intersect_caps(ray, minimum, maximum, |_| 1.0, &mut ts);
    }

    ts
}

fn normal_at_cylinder(at: Tuple4D, minimum: f64, maximum: f64) -> Tuple4D {
    // Square of the distance from the Y axis.
    let dist = at.x.powi(2) + at.z.powi(2);

    if dist < 1.0 && at.y >= maximum - FEQ_EPSILON {
        Tuple4D::vector(0.0, 1.0, 0.0)
    } else if dist < 1.0 && at.y <= minimum + FEQ_EPSILON {
        Tuple4D::vector(0.0, -1.0, 0.0)
    } else {
        Tuple4D::vector(at.x, 0.0, at.z)
    }
}

fn intersect_cone(ray: &Ray4D, minimum: f64, maximum: f64, closed: bool)
    -> Vec<f64> {
    let mut ts = Vec::new();

    let a = ray.direction.x.powi(2)
          - ray.direction.y.powi(2)
          + ray.direction.z.powi(2);

    let b = 2.0 * ray.origin.x * ray.direction.x
          - 2.0 * ray.origin.y * ray.direction.y
          + 2.0 * ray.origin.z * ray.direction.z;

    let c = ray.origin.x.powi(2)
          - ray.origin.y.powi(2)
          + ray.origin.z.powi(2);

    if a.abs() < EPSILON {
        // Parallel to one of the halves: a single hit on the other half, or
        // none at all when b vanishes too.
        if b.abs() >= EPSILON {
            let t = -c / (2.0 * b);
            let y = ray.origin.y + t * ray.direction.y;
            if minimum < y && y < maximum {
                ts.push(t);
            }
        }
    } else {
        bounded_roots(ray, a, b, c, minimum, maximum, &mut ts);
    }

    if closed {
        intersect_caps(ray, minimum, maximum, f64::abs, &mut ts);
    }

    ts
}

fn normal_at_cone(at: Tuple4D, minimum: f64, maximum: f64) -> Tuple4D {
    let dist = at.x.powi(2) + at.z.powi(2);

    if dist < maximum.powi(2) && at.y >= maximum - FEQ_EPSILON {
        Tuple4D::vector(0.0, 1.0, 0.0)
    } else if dist < minimum.powi(2) && at.y <= minimum + FEQ_EPSILON {
        Tuple4D::vector(0.0, -1.0, 0.0)
    } else {
        let mut y = dist.sqrt();
        if at.y > 0.0 {
            y = -y;
        }

        Tuple4D::vector(at.x, y, at.z)
    }
}

/// The scene graph: an arena owning every shape.
///
/// Groups refer to their children by `ShapeId` and children refer back to
/// their group the same way, so ownership stays with the arena and the tree
/// can be walked in both directions.
///
/// # Examples
///
/// ```
/// # use aun_tracer::shape::{ Shape, Shapes };
/// # use aun_tracer::matrix::Matrix4D;
/// # use aun_tracer::ray::Ray4D;
/// # use aun_tracer::tuple::Tuple4D;
/// let mut shapes = Shapes::new();
/// let group = shapes.insert(
///     Shape::group().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
/// );
/// let sphere = shapes.insert(
///     Shape::sphere().with_transform(Matrix4D::translation(5.0, 0.0, 0.0)).unwrap()
/// );
/// shapes.add_child(group, sphere).unwrap();
///
/// let r = Ray4D::new(Tuple4D::point(10.0, 0.0, -10.0),
///                    Tuple4D::vector(0.0, 0.0, 1.0));
/// assert_eq!(shapes.intersect(group, &r).len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Shapes {
    shapes: Vec<Shape>,
}

impl Index<ShapeId> for Shapes {
    type Output = Shape;

    fn index(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0]
    }
}

impl Shapes {
    pub fn new() -> Shapes {
        Default::default()
    }

    /// Moves a shape into the arena.
    ///
    /// The shape starts detached: no parent and, for groups, no children.
    pub fn insert(&mut self, mut shape: Shape) -> ShapeId {
        shape.parent = None;
        if let ShapeType::Group(ref mut children) = shape.ty {
            children.clear();
        }

        let id = ShapeId(self.shapes.len());
        self.shapes.push(shape);
        id
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.0)
    }

    /// Mutable access for transform and material setters.
    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterates over every shape with its id, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().enumerate().map(|(i, s)| (ShapeId(i), s))
    }

    fn check(&self, id: ShapeId) -> Result<&Shape> {
        self.get(id).ok_or_else(|| TracerError::InvalidHierarchy(
            format!("no shape {} in this scene", id)
        ))
    }

    /// Attaches `child` to the group `parent`.
    ///
    /// Fails with `NotAGroup` when `parent` cannot hold children, and with
    /// `InvalidHierarchy` when `child` already has a parent or is an
    /// ancestor of `parent` (the graph must stay a tree).
    pub fn add_child(&mut self, parent: ShapeId, child: ShapeId) -> Result<()> {
        if !self.check(parent)?.is_group() {
            return Err(TracerError::NotAGroup(parent.0));
        }

        if let Some(existing) = self.check(child)?.parent {
            return Err(TracerError::InvalidHierarchy(
                format!("shape {} is already a child of {}", child, existing)
            ));
        }

        let mut ancestor = Some(parent);
        while let Some(a) = ancestor {
            if a == child {
                return Err(TracerError::InvalidHierarchy(
                    format!("adding {} under {} would form a cycle", child, parent)
                ));
            }
            ancestor = self[a].parent;
        }

        if let ShapeType::Group(ref mut children) = self.shapes[parent.0].ty {
            children.push(child);
        }
        self.shapes[child.0].parent = Some(parent);

        Ok(())
    }

    /// Intersects a world-space ray with a shape and everything under it.
    ///
    /// The ray is moved into the shape's object space with its cached
    /// inverse before the local test.
    pub fn intersect(&self, id: ShapeId, ray: &Ray4D) -> Intersections {
        let local_ray = ray.transform(self[id].inverse());
        self.local_intersect(id, &local_ray)
    }

    /// Intersects a ray already in the shape's object space.
    ///
    /// Groups pass the ray to each child through that child's own inverse,
    /// then merge the results into one list sorted by `t`.
    pub fn local_intersect(&self, id: ShapeId, ray: &Ray4D) -> Intersections {
        match self[id].ty {
            ShapeType::Group(ref children) => Intersections::aggregate(
                children.iter().map(|&child| self.intersect(child, ray))
            ),
            _ => self[id].local_intersect(id, ray),
        }
    }

    /// Converts a world-space point into the object space of `id`, applying
    /// the inverse of every ancestor from the root down.
    pub fn world_to_object(&self, id: ShapeId, point: Tuple4D) -> Tuple4D {
        let shape = &self[id];
        let point = match shape.parent {
            Some(parent) => self.world_to_object(parent, point),
            None => point,
        };

        *shape.inverse() * point
    }

    /// Converts an object-space normal of `id` into world space, walking up
    /// through every ancestor.
    pub fn normal_to_world(&self, id: ShapeId, normal: Tuple4D) -> Tuple4D {
        let shape = &self[id];

        let mut normal = shape.inverse().transposition() * normal;
        normal.w = 0.0;
        let normal = normal.normalize();

        match shape.parent {
            Some(parent) => self.normal_to_world(parent, normal),
            None => normal,
        }
    }

    /// The world-space surface normal of the hit shape at `world_point`.
    pub fn normal_at(&self, hit: &Intersection, world_point: Tuple4D)
        -> Tuple4D {
        let local_point = self.world_to_object(hit.object, world_point);
        let local_normal = self[hit.object].local_normal_at(local_point, hit);
        self.normal_to_world(hit.object, local_normal)
    }

    /// The material a shape renders with.
    ///
    /// A material set on the shape itself always wins. Otherwise the
    /// nearest ancestor with a material supplies it, falling back to the
    /// default material.
    pub fn material(&self, id: ShapeId) -> Material {
        let mut current = Some(id);
        while let Some(c) = current {
            let shape = &self[c];
            if let Some(m) = shape.material {
                return m;
            }
            current = shape.parent;
        }

        Default::default()
    }
}

#[cfg(test)]
use std::f64::consts::PI;

#[cfg(test)]
fn ray(o: (f64, f64, f64), d: (f64, f64, f64)) -> Ray4D {
    Ray4D::new(Tuple4D::point(o.0, o.1, o.2), Tuple4D::vector(d.0, d.1, d.2))
}

#[cfg(test)]
fn local_ts(s: &Shape, r: &Ray4D) -> Vec<f64> {
    let is = Shapes::new().insert(s.clone());
    s.local_intersect(is, r).iter().map(|i| i.t).collect()
}

#[cfg(test)]
fn nested_groups(inner_scaling: Matrix4D) -> (Shapes, ShapeId) {
    let mut shapes = Shapes::new();

    let g1 = shapes.insert(
        Shape::group().with_transform(Matrix4D::rotation_y(PI / 2.0)).unwrap()
    );
    let g2 = shapes.insert(Shape::group().with_transform(inner_scaling).unwrap());
    let s = shapes.insert(
        Shape::sphere().with_transform(Matrix4D::translation(5.0, 0.0, 0.0)).unwrap()
    );

    shapes.add_child(g1, g2).unwrap();
    shapes.add_child(g2, s).unwrap();

    (shapes, s)
}

#[test]
fn ray_intersects_sphere_at_two_points() {
    let ts = local_ts(&Shape::sphere(), &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts, vec![4.0, 6.0]);
}

#[test]
fn ray_misses_sphere() {
    let ts = local_ts(&Shape::sphere(), &ray((0.0, 2.0, -5.0), (0.0, 0.0, 1.0)));
    assert!(ts.is_empty());
}

#[test]
fn ray_is_tangent_to_sphere() {
    let ts = local_ts(&Shape::sphere(), &ray((0.0, 1.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts, vec![5.0, 5.0]);
}

#[test]
fn ray_is_inside_sphere() {
    let ts = local_ts(&Shape::sphere(), &ray((0.0, 0.0, 0.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts, vec![-1.0, 1.0]);
}

#[test]
fn sphere_is_behind_ray() {
    let ts = local_ts(&Shape::sphere(), &ray((0.0, 0.0, 5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts, vec![-6.0, -4.0]);
}

#[test]
fn intersecting_scaled_sphere() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(
        Shape::sphere().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
    );

    let is = shapes.intersect(s, &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    let ts: Vec<f64> = is.iter().map(|i| i.t).collect();
    assert_eq!(ts, vec![3.0, 7.0]);
    assert!(is.iter().all(|i| i.object == s));
}

#[test]
fn singular_transform_is_rejected() {
    let mut s = Shape::sphere();
    let before = s.clone();

    let err = s.set_transform(Matrix4D::scaling(1.0, 0.0, 1.0));
    assert!(matches!(err, Err(TracerError::NonInvertible)));
    assert_eq!(s, before);
}

#[test]
fn normal_on_sphere_axes_and_nonaxial() {
    let s = Shape::sphere();
    let i = Intersection::new(0.0, ShapeId(0));
    let k = 3.0f64.sqrt() / 3.0;

    assert_eq!(s.local_normal_at(Tuple4D::point(1.0, 0.0, 0.0), &i),
        Tuple4D::vector(1.0, 0.0, 0.0));
    assert_eq!(s.local_normal_at(Tuple4D::point(0.0, 1.0, 0.0), &i),
        Tuple4D::vector(0.0, 1.0, 0.0));
    assert_eq!(s.local_normal_at(Tuple4D::point(k, k, k), &i),
        Tuple4D::vector(k, k, k));
}

#[test]
fn compute_normal_on_translated_sphere() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(
        Shape::sphere().with_transform(Matrix4D::translation(0.0, 1.0, 0.0)).unwrap()
    );

    let n = shapes.normal_at(&Intersection::new(0.0, s),
        Tuple4D::point(0.0, 1.70711, -0.70711));
    assert_eq!(n, Tuple4D::vector(0.0, 0.70711, -0.70711));
}

#[test]
fn compute_normal_on_transformed_sphere() {
    let mut shapes = Shapes::new();
    let m = Matrix4D::scaling(1.0, 0.5, 1.0) * Matrix4D::rotation_z(PI / 5.0);
    let s = shapes.insert(Shape::sphere().with_transform(m).unwrap());

    let p = Tuple4D::point(0.0, 2.0f64.sqrt() / 2.0, -(2.0f64.sqrt()) / 2.0);
    let n = shapes.normal_at(&Intersection::new(0.0, s), p);
    assert_eq!(n, Tuple4D::vector(0.0, 0.97014, -0.24254));
}

#[test]
fn ray_intersecting_plane() {
    let p = Shape::plane();

    assert_eq!(local_ts(&p, &ray((0.0, 1.0, 0.0), (0.0, -1.0, 0.0))), vec![1.0]);
    assert_eq!(local_ts(&p, &ray((0.0, -1.0, 0.0), (0.0, 1.0, 0.0))), vec![1.0]);
}

#[test]
fn ray_parallel_or_coplanar_with_plane() {
    let p = Shape::plane();

    assert!(local_ts(&p, &ray((0.0, 10.0, 0.0), (0.0, 0.0, 1.0))).is_empty());
    assert!(local_ts(&p, &ray((0.0, 0.0, 0.0), (0.0, 0.0, 1.0))).is_empty());
    assert!(local_ts(&p, &ray((0.0, 1.0, 0.0), (1.0, 0.000001, 0.0))).is_empty());
}

#[test]
fn normal_on_plane_is_constant() {
    let p = Shape::plane();
    let i = Intersection::new(0.0, ShapeId(0));

    for at in [(0.0, 0.0, 0.0), (10.0, 0.0, -10.0), (-5.0, 0.0, 150.0)] {
        assert_eq!(p.local_normal_at(Tuple4D::point(at.0, at.1, at.2), &i),
            Tuple4D::vector(0.0, 1.0, 0.0));
    }
}

#[test]
fn ray_intersects_cube() {
    let c = Shape::cube();

    let cases = [
        ((5.0, 0.5, 0.0), (-1.0, 0.0, 0.0), 4.0, 6.0),
        ((-5.0, 0.5, 0.0), (1.0, 0.0, 0.0), 4.0, 6.0),
        ((0.5, 5.0, 0.0), (0.0, -1.0, 0.0), 4.0, 6.0),
        ((0.5, 0.0, -5.0), (0.0, 0.0, 1.0), 4.0, 6.0),
        ((0.0, 0.5, 0.0), (0.0, 0.0, 1.0), -1.0, 1.0),
    ];

    for (o, d, t1, t2) in cases.iter() {
        assert_eq!(local_ts(&c, &ray(*o, *d)), vec![*t1, *t2]);
    }
}

#[test]
fn ray_misses_cube() {
    let c = Shape::cube();

    let cases = [
        ((-2.0, 0.0, 0.0), (0.2673, 0.5345, 0.8018)),
        ((0.0, -2.0, 0.0), (0.8018, 0.2673, 0.5345)),
        ((2.0, 0.0, 2.0), (0.0, 0.0, -1.0)),
        ((0.0, 2.0, 2.0), (0.0, -1.0, 0.0)),
    ];

    for (o, d) in cases.iter() {
        assert!(local_ts(&c, &ray(*o, *d)).is_empty());
    }
}

#[test]
fn normal_on_cube_surface() {
    let c = Shape::cube();
    let i = Intersection::new(0.0, ShapeId(0));

    assert_eq!(c.local_normal_at(Tuple4D::point(1.0, 0.5, -0.8), &i),
        Tuple4D::vector(1.0, 0.0, 0.0));
    assert_eq!(c.local_normal_at(Tuple4D::point(-0.4, 0.3, -1.0), &i),
        Tuple4D::vector(0.0, 0.0, -1.0));
    assert_eq!(c.local_normal_at(Tuple4D::point(1.0, 1.0, 1.0), &i),
        Tuple4D::vector(1.0, 0.0, 0.0));
}

#[test]
fn ray_misses_cylinder() {
    let c = Shape::cylinder();

    assert!(local_ts(&c, &ray((1.0, 0.0, 0.0), (0.0, 1.0, 0.0))).is_empty());
    assert!(local_ts(&c, &ray((0.0, 0.0, 0.0), (0.0, 1.0, 0.0))).is_empty());
    assert!(local_ts(&c, &ray((0.0, 0.0, -5.0), (1.0, 1.0, 1.0))).is_empty());
}

#[test]
fn ray_strikes_cylinder() {
    let c = Shape::cylinder();

    assert_eq!(local_ts(&c, &ray((1.0, 0.0, -5.0), (0.0, 0.0, 1.0))), vec![5.0, 5.0]);
    assert_eq!(local_ts(&c, &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0))), vec![4.0, 6.0]);
}

#[test]
fn intersecting_constrained_cylinder() {
    let c = Shape::bounded_cylinder(1.0, 2.0);

    let cases = [
        ((0.0, 1.5, 0.0), (0.1, 1.0, 0.0), 0),
        ((0.0, 3.0, -5.0), (0.0, 0.0, 1.0), 0),
        ((0.0, 0.0, -5.0), (0.0, 0.0, 1.0), 0),
        ((0.0, 2.0, -5.0), (0.0, 0.0, 1.0), 0),
        ((0.0, 1.0, -5.0), (0.0, 0.0, 1.0), 0),
        ((0.0, 1.5, -2.0), (0.0, 0.0, 1.0), 2),
    ];

    for (o, d, count) in cases.iter() {
        let r = ray(*o, *d);
        let r = Ray4D::new(r.origin, r.direction.normalize());
        assert_eq!(local_ts(&c, &r).len(), *count);
    }
}

#[test]
fn intersecting_cylinder_caps() {
    let c = Shape::capped_cylinder(1.0, 2.0);

    let cases = [
        ((0.0, 3.0, 0.0), (0.0, -1.0, 0.0), 2),
        ((0.0, 3.0, -2.0), (0.0, -1.0, 2.0), 2),
        ((0.0, 4.0, -2.0), (0.0, -1.0, 1.0), 2),
        ((0.0, 0.0, -2.0), (0.0, 1.0, 2.0), 2),
        ((0.0, -1.0, -2.0), (0.0, 1.0, 1.0), 2),
    ];

    for (o, d, count) in cases.iter() {
        let r = ray(*o, *d);
        let r = Ray4D::new(r.origin, r.direction.normalize());
        assert_eq!(local_ts(&c, &r).len(), *count);
    }
}

#[test]
fn normal_on_cylinder_wall_and_caps() {
    let c = Shape::capped_cylinder(1.0, 2.0);
    let i = Intersection::new(0.0, ShapeId(0));

    assert_eq!(c.local_normal_at(Tuple4D::point(0.0, 1.5, -1.0), &i),
        Tuple4D::vector(0.0, 0.0, -1.0));
    assert_eq!(c.local_normal_at(Tuple4D::point(0.5, 1.0, 0.0), &i),
        Tuple4D::vector(0.0, -1.0, 0.0));
    assert_eq!(c.local_normal_at(Tuple4D::point(0.0, 2.0, 0.5), &i),
        Tuple4D::vector(0.0, 1.0, 0.0));
}

#[test]
fn ray_strikes_cone() {
    let c = Shape::cone();

    let r = ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0));
    assert_eq!(local_ts(&c, &r), vec![5.0, 5.0]);

    let r = Ray4D::new(Tuple4D::point(1.0, 1.0, -5.0),
        Tuple4D::vector(-0.5, -1.0, 1.0).normalize());
    let ts = local_ts(&c, &r);
    assert_eq!(ts.len(), 2);
    assert!(crate::feq(ts[0], 4.55006));
    assert!(crate::feq(ts[1], 49.44994));
}

#[test]
fn ray_parallel_to_one_cone_half() {
    let c = Shape::cone();
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -1.0),
        Tuple4D::vector(0.0, 1.0, 1.0).normalize());

    let ts = local_ts(&c, &r);
    assert_eq!(ts.len(), 1);
    assert!(crate::feq(ts[0], 0.35355));
}

#[test]
fn parallel_hit_outside_cone_bounds_is_dropped() {
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -3.0),
        Tuple4D::vector(0.0, 1.0, 1.0).normalize());

    // The lone hit on the infinite cone is at y = 0.75.
    let ts = local_ts(&Shape::cone(), &r);
    assert_eq!(ts.len(), 1);
    assert!(crate::feq(r.position(ts[0]).y, 0.75));

    assert!(local_ts(&Shape::bounded_cone(-0.5, 0.5), &r).is_empty());
    assert!(local_ts(&Shape::bounded_cone(-0.5, 1.0), &r).len() == 1);
}

#[test]
fn intersecting_cone_caps() {
    let c = Shape::capped_cone(-0.5, 0.5);

    let cases = [
        ((0.0, 0.0, -5.0), (0.0, 1.0, 0.0), 0),
        ((0.0, 0.0, -0.25), (0.0, 1.0, 1.0), 2),
        ((0.0, 0.0, -0.25), (0.0, 1.0, 0.0), 4),
    ];

    for (o, d, count) in cases.iter() {
        let r = ray(*o, *d);
        let r = Ray4D::new(r.origin, r.direction.normalize());
        assert_eq!(local_ts(&c, &r).len(), *count);
    }
}

#[test]
fn normal_on_cone() {
    let c = Shape::cone();
    let i = Intersection::new(0.0, ShapeId(0));

    assert_eq!(c.local_normal_at(Tuple4D::point(1.0, 1.0, 1.0), &i),
        Tuple4D::vector(1.0, -(2.0f64.sqrt()), 1.0));
    assert_eq!(c.local_normal_at(Tuple4D::point(-1.0, -1.0, 0.0), &i),
        Tuple4D::vector(-1.0, 1.0, 0.0));
}

#[cfg(test)]
fn test_triangle() -> Shape {
    Shape::triangle(
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(-1.0, 0.0, 0.0),
        Tuple4D::point(1.0, 0.0, 0.0)
    )
}

#[test]
fn constructing_a_triangle() {
    let t = test_triangle();

    if let ShapeType::Triangle(ti) = t.ty() {
        assert_eq!(ti.e1, Tuple4D::vector(-1.0, -1.0, 0.0));
        assert_eq!(ti.e2, Tuple4D::vector(1.0, -1.0, 0.0));
        assert_eq!(ti.normal, Tuple4D::vector(0.0, 0.0, -1.0));
    } else {
        unreachable!();
    }
}

#[test]
fn ray_parallel_to_triangle_misses() {
    let t = test_triangle();
    assert!(local_ts(&t, &ray((0.0, -1.0, -2.0), (0.0, 1.0, 0.0))).is_empty());
}

#[test]
fn ray_misses_each_triangle_edge() {
    let t = test_triangle();

    assert!(local_ts(&t, &ray((1.0, 1.0, -2.0), (0.0, 0.0, 1.0))).is_empty());
    assert!(local_ts(&t, &ray((-1.0, 1.0, -2.0), (0.0, 0.0, 1.0))).is_empty());
    assert!(local_ts(&t, &ray((0.0, -1.0, -2.0), (0.0, 0.0, 1.0))).is_empty());
}

#[test]
fn ray_strikes_a_triangle() {
    let t = test_triangle();
    assert_eq!(local_ts(&t, &ray((0.0, 0.5, -2.0), (0.0, 0.0, 1.0))), vec![2.0]);
}

#[cfg(test)]
fn test_smooth_triangle() -> Shape {
    Shape::smooth_triangle(
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(-1.0, 0.0, 0.0),
        Tuple4D::point(1.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0),
        Tuple4D::vector(-1.0, 0.0, 0.0),
        Tuple4D::vector(1.0, 0.0, 0.0)
    )
}

#[test]
fn smooth_triangle_hit_stores_uv() {
    let s = test_smooth_triangle();
    let is = s.local_intersect(ShapeId(0), &ray((-0.2, 0.3, -2.0), (0.0, 0.0, 1.0)));

    let (u, v) = is.iter().next().and_then(|i| i.uv).unwrap();
    assert!(crate::feq(u, 0.45));
    assert!(crate::feq(v, 0.25));
}

#[test]
fn smooth_triangle_uses_uv_to_interpolate_the_normal() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(test_smooth_triangle());

    let i = Intersection::new_uv(1.0, s, 0.45, 0.25);
    let n = shapes.normal_at(&i, Tuple4D::point(0.0, 0.0, 0.0));

    assert_eq!(n, Tuple4D::vector(-0.5547, 0.83205, 0.0));
}

#[test]
fn intersecting_ray_with_empty_group() {
    let mut shapes = Shapes::new();
    let g = shapes.insert(Shape::group());

    let is = shapes.local_intersect(g, &ray((0.0, 0.0, 0.0), (0.0, 0.0, 1.0)));
    assert!(is.is_empty());
}

#[test]
fn intersecting_ray_with_nonempty_group() {
    let mut shapes = Shapes::new();
    let g = shapes.insert(Shape::group());
    let s1 = shapes.insert(Shape::sphere());
    let s2 = shapes.insert(
        Shape::sphere().with_transform(Matrix4D::translation(0.0, 0.0, -3.0)).unwrap()
    );
    let s3 = shapes.insert(
        Shape::sphere().with_transform(Matrix4D::translation(5.0, 0.0, 0.0)).unwrap()
    );

    for s in [s1, s2, s3] {
        shapes.add_child(g, s).unwrap();
    }

    let is = shapes.local_intersect(g, &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    let objects: Vec<ShapeId> = is.iter().map(|i| i.object).collect();
    assert_eq!(objects, vec![s2, s2, s1, s1]);
}

#[test]
fn intersecting_a_transformed_group() {
    let mut shapes = Shapes::new();
    let g = shapes.insert(
        Shape::group().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
    );
    let s = shapes.insert(
        Shape::sphere().with_transform(Matrix4D::translation(5.0, 0.0, 0.0)).unwrap()
    );
    shapes.add_child(g, s).unwrap();

    let is = shapes.intersect(g, &ray((10.0, 0.0, -10.0), (0.0, 0.0, 1.0)));
    assert_eq!(is.len(), 2);
}

#[test]
fn converting_a_point_from_world_to_object_space() {
    let (shapes, s) = nested_groups(Matrix4D::scaling(2.0, 2.0, 2.0));

    let p = shapes.world_to_object(s, Tuple4D::point(-2.0, 0.0, -10.0));
    assert_eq!(p, Tuple4D::point(0.0, 0.0, -1.0));
}

#[test]
fn converting_a_normal_from_object_to_world_space() {
    let (shapes, s) = nested_groups(Matrix4D::scaling(1.0, 2.0, 3.0));
    let k = 3.0f64.sqrt() / 3.0;

    let n = shapes.normal_to_world(s, Tuple4D::vector(k, k, k));
    assert_eq!(n, Tuple4D::vector(0.2857, 0.4286, -0.8571));
}

#[test]
fn finding_the_normal_on_a_child_object() {
    let (shapes, s) = nested_groups(Matrix4D::scaling(1.0, 2.0, 3.0));

    let n = shapes.normal_at(&Intersection::new(0.0, s),
        Tuple4D::point(1.7321, 1.1547, -5.5774));
    assert_eq!(n, Tuple4D::vector(0.2857, 0.4286, -0.8571));
}

#[test]
fn adding_a_child_sets_its_parent() {
    let mut shapes = Shapes::new();
    let g = shapes.insert(Shape::group());
    let s = shapes.insert(Shape::sphere());

    shapes.add_child(g, s).unwrap();

    assert_eq!(shapes[s].parent(), Some(g));
    assert_eq!(shapes[g].children(), Some(&[s][..]));
}

#[test]
fn children_need_a_group() {
    let mut shapes = Shapes::new();
    let s1 = shapes.insert(Shape::sphere());
    let s2 = shapes.insert(Shape::sphere());

    assert!(matches!(shapes.add_child(s1, s2), Err(TracerError::NotAGroup(0))));
    assert_eq!(shapes[s2].parent(), None);
}

#[test]
fn a_child_has_one_parent_and_no_cycles() {
    let mut shapes = Shapes::new();
    let g1 = shapes.insert(Shape::group());
    let g2 = shapes.insert(Shape::group());
    let s = shapes.insert(Shape::sphere());

    shapes.add_child(g1, g2).unwrap();
    shapes.add_child(g1, s).unwrap();

    assert!(matches!(shapes.add_child(g2, s),
        Err(TracerError::InvalidHierarchy(_))));
    assert!(matches!(shapes.add_child(g2, g1),
        Err(TracerError::InvalidHierarchy(_))));
    assert!(matches!(shapes.add_child(g1, g1),
        Err(TracerError::InvalidHierarchy(_))));
    assert_eq!(shapes[g2].children(), Some(&[][..]));
}

#[test]
fn leaf_material_wins_over_group_material() {
    use crate::color::Color;

    let red = Material { color: Color::red(), ..Default::default() };
    let blue = Material { color: Color::blue(), ..Default::default() };

    let mut shapes = Shapes::new();
    let outer = shapes.insert(Shape::group().with_material(red));
    let inner = shapes.insert(Shape::group());
    let plain = shapes.insert(Shape::sphere());
    let painted = shapes.insert(Shape::sphere().with_material(blue));
    let loose = shapes.insert(Shape::sphere());

    shapes.add_child(outer, inner).unwrap();
    shapes.add_child(inner, plain).unwrap();
    shapes.add_child(inner, painted).unwrap();

    assert_eq!(shapes.material(plain), red);
    assert_eq!(shapes.material(painted), blue);
    assert_eq!(shapes.material(loose), Material::default());
}
