use crate::error::{ Result, TracerError };
use crate::ray::Ray4D;
use crate::tuple::Tuple4D;
use crate::color::Color;
use crate::matrix::Matrix4D;
use crate::light::{ PointLight, Material, lighting };
use crate::shape::{ Shape, ShapeId, Shapes };
use crate::intersect::{ Intersections, IntersectionComputation };

/// A world with objects and light.
///
/// The world owns the scene graph arena and lists the top-level shapes in
/// it; groups reach the rest. Worlds are built up front and only read while
/// rendering, so a `&World` can be shared between render threads.
#[derive(Clone, Debug)]
pub struct World {
    shapes: Shapes,
    objects: Vec<ShapeId>,
    pub light: PointLight,
}

fn default_light() -> PointLight {
    PointLight::new(Color::white(), Tuple4D::point(-10.0, 10.0, -10.0))
}

/// The two concentric spheres used throughout the tests.
impl Default for World {
    fn default() -> World {
        let mut w = World::empty();

        let m1 = Material {
            color: Color::rgb(0.8, 1.0, 0.6),
            diffuse: 0.7,
            specular: 0.2,
            ..Default::default()
        };
        w.add_object(Shape::sphere().with_material(m1));

        let mut s2 = Shape::sphere();
        s2.set_transform(Matrix4D::scaling(0.5, 0.5, 0.5))
            .expect("a uniform scaling is invertible");
        w.add_object(s2);

        w
    }
}

impl World {
    /// Creates the default world with two spheres.
    pub fn new() -> World {
        Default::default()
    }

    /// Creates a world with no objects and a white light at (-10, 10, -10).
    pub fn empty() -> World {
        World {
            shapes: Shapes::new(),
            objects: Vec::new(),
            light: default_light(),
        }
    }

    pub fn shapes(&self) -> &Shapes {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut Shapes {
        &mut self.shapes
    }

    /// The top-level shapes, in insertion order.
    pub fn objects(&self) -> &[ShapeId] {
        &self.objects
    }

    /// Adds a top-level shape.
    pub fn add_object(&mut self, shape: Shape) -> ShapeId {
        let id = self.shapes.insert(shape);
        self.objects.push(id);
        id
    }

    /// Stores a shape without placing it in the scene yet. Attach it later
    /// with `Shapes::add_child` or `add_root`.
    pub fn insert_detached(&mut self, shape: Shape) -> ShapeId {
        self.shapes.insert(shape)
    }

    /// Adds `shape` as a child of the group `parent`.
    ///
    /// Nothing is stored if `parent` cannot take children.
    pub fn add_child(&mut self, parent: ShapeId, shape: Shape)
        -> Result<ShapeId> {
        match self.shapes.get(parent) {
            Some(p) if p.is_group() => (),
            Some(_) => return Err(TracerError::NotAGroup(parent.index())),
            None => return Err(TracerError::InvalidHierarchy(
                format!("no shape {} in this world", parent)
            )),
        }

        let id = self.shapes.insert(shape);
        self.shapes.add_child(parent, id)?;
        Ok(id)
    }

    /// Promotes an already stored shape to a top-level object.
    ///
    /// Shapes with a parent are reached through it and cannot also be roots.
    pub fn add_root(&mut self, id: ShapeId) -> Result<()> {
        let shape = self.shapes.get(id).ok_or_else(||
            TracerError::InvalidHierarchy(format!("no shape {} in this world", id))
        )?;

        if let Some(parent) = shape.parent() {
            return Err(TracerError::InvalidHierarchy(
                format!("shape {} is a child of {}", id, parent)
            ));
        }

        if self.objects.contains(&id) {
            return Err(TracerError::InvalidHierarchy(
                format!("shape {} is already in the world", id)
            ));
        }

        self.objects.push(id);
        Ok(())
    }

    /// Intersects a ray against all objects in a world, sorted by `t`.
    pub fn intersect(&self, r: &Ray4D) -> Intersections {
        Intersections::aggregate(
            self.objects.iter().map(|&id| self.shapes.intersect(id, r))
        )
    }

    /// Determines whether a point is shadowed from the light.
    pub fn is_shadowed(&self, p: Tuple4D) -> bool {
        let v = self.light.position - p;
        let distance = v.magnitude();
        let r = Ray4D::new(p, v.normalize());

        match self.intersect(&r).hit() {
            Some(i) => i.t < distance,
            None => false,
        }
    }

    /// Calculates the color for a hit: direct light plus whatever is
    /// reflected and refracted, recursing at most `depth` more times.
    pub fn shade_hit(&self, comps: &IntersectionComputation, depth: usize)
        -> Color {
        let material = self.shapes.material(comps.object);
        let in_shadow = self.is_shadowed(comps.over_point);
        let object_point = self.shapes.world_to_object(comps.object,
            comps.over_point);

        let surface = lighting(&material, &self.light, comps.over_point,
            object_point, comps.eyev, comps.normalv, in_shadow);

        let reflected = self.reflected_color(comps, depth);
        let refracted = self.refracted_color(comps, depth);

        if material.reflective > 0.0 && material.transparency > 0.0 {
            let reflectance = comps.schlick();
            surface + reflected * reflectance + refracted * (1.0 - reflectance)
        } else {
            surface + reflected + refracted
        }
    }

    /// The color seen in the mirror direction, scaled by reflectivity.
    pub fn reflected_color(&self, comps: &IntersectionComputation,
        depth: usize) -> Color {
        let reflective = self.shapes.material(comps.object).reflective;
        if depth == 0 || reflective == 0.0 {
            return Color::black();
        }

        let r = Ray4D::new(comps.over_point, comps.reflectv);
        self.color_at(&r, depth - 1) * reflective
    }

    /// The color seen through the surface, bent by Snell's law and scaled
    /// by transparency.
    pub fn refracted_color(&self, comps: &IntersectionComputation,
        depth: usize) -> Color {
        let transparency = self.shapes.material(comps.object).transparency;
        if depth == 0 || transparency == 0.0 {
            return Color::black();
        }

        let n_ratio = comps.n1 / comps.n2;
        let cos_i = comps.eyev.dot(&comps.normalv);
        let sin2_t = n_ratio.powi(2) * (1.0 - cos_i.powi(2));

        // Total internal reflection
        if sin2_t > 1.0 {
            return Color::black();
        }

        let cos_t = (1.0 - sin2_t).sqrt();
        let direction = comps.normalv * (n_ratio * cos_i - cos_t)
            - comps.eyev * n_ratio;

        let r = Ray4D::new(comps.under_point, direction);
        self.color_at(&r, depth - 1) * transparency
    }

    /// Determines the color seen along a ray; black when nothing is hit.
    pub fn color_at(&self, r: &Ray4D, depth: usize) -> Color {
        let is = self.intersect(r);

        match is.hit() {
            None => Color::black(),
            Some(hit) => {
                let comps = IntersectionComputation::new(r, &hit, &is,
                    &self.shapes);
                self.shade_hit(&comps, depth)
            },
        }
    }
}

#[cfg(test)]
use crate::intersect::Intersection;
#[cfg(test)]
use crate::consts::RECURSION_DEPTH;

#[cfg(test)]
fn ray(o: (f64, f64, f64), d: (f64, f64, f64)) -> Ray4D {
    Ray4D::new(Tuple4D::point(o.0, o.1, o.2), Tuple4D::vector(d.0, d.1, d.2))
}

#[cfg(test)]
fn shade_single(w: &World, r: &Ray4D, i: Intersection, depth: usize) -> Color {
    let is = Intersections::from(vec![i]);
    let comps = IntersectionComputation::new(r, &i, &is, w.shapes());
    w.shade_hit(&comps, depth)
}

#[cfg(test)]
fn set_material<F: FnOnce(&mut Material)>(w: &mut World, id: ShapeId, f: F) {
    let mut m = w.shapes().material(id);
    f(&mut m);
    w.shapes_mut().get_mut(id).unwrap().set_material(m);
}

#[cfg(test)]
fn translated(shape: Shape, x: f64, y: f64, z: f64) -> Shape {
    shape.with_transform(Matrix4D::translation(x, y, z)).unwrap()
}

#[test]
fn intersect_default_world_with_ray() {
    let w = World::default();
    let is = w.intersect(&ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));

    let ts: Vec<f64> = is.iter().map(|i| i.t).collect();
    assert_eq!(ts, vec![4.0, 4.5, 5.5, 6.0]);
}

#[test]
fn shade_intersection_from_outside() {
    let w = World::default();
    let r = ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0));
    let i = Intersection::new(4.0, w.objects()[0]);

    assert_eq!(shade_single(&w, &r, i, 1), Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn shade_intersection_from_inside() {
    let mut w = World::default();
    w.light = PointLight::new(Color::white(), Tuple4D::point(0.0, 0.25, 0.0));
    let r = ray((0.0, 0.0, 0.0), (0.0, 0.0, 1.0));
    let i = Intersection::new(0.5, w.objects()[1]);

    assert_eq!(shade_single(&w, &r, i, 1), Color::rgb(0.90498, 0.90498, 0.90498));
}

#[test]
fn shade_intersection_in_shadow() {
    let mut w = World::empty();
    w.light = PointLight::new(Color::white(), Tuple4D::point(0.0, 0.0, -10.0));
    w.add_object(Shape::sphere());
    let s2 = w.add_object(translated(Shape::sphere(), 0.0, 0.0, 10.0));

    let r = ray((0.0, 0.0, 5.0), (0.0, 0.0, 1.0));
    let i = Intersection::new(4.0, s2);

    assert_eq!(shade_single(&w, &r, i, 1), Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn color_ray_miss() {
    let w = World::default();
    let r = ray((0.0, 0.0, -5.0), (0.0, 1.0, 0.0));

    assert_eq!(w.color_at(&r, RECURSION_DEPTH), Color::black());
}

#[test]
fn color_ray_hit() {
    let w = World::default();
    let r = ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0));

    assert_eq!(w.color_at(&r, RECURSION_DEPTH), Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn color_behind_ray() {
    let mut w = World::default();
    let (outer, inner) = (w.objects()[0], w.objects()[1]);
    set_material(&mut w, outer, |m| m.ambient = 1.0);
    set_material(&mut w, inner, |m| m.ambient = 1.0);

    let r = ray((0.0, 0.0, 0.75), (0.0, 0.0, -1.0));
    let inner_color = w.shapes().material(inner).color;

    assert_eq!(w.color_at(&r, RECURSION_DEPTH), inner_color);
}

#[test]
fn shadow_collinear_point_and_light() {
    let w = World::default();
    assert!(!w.is_shadowed(Tuple4D::point(0.0, 10.0, 0.0)));
}

#[test]
fn shadow_object_between_point_and_light() {
    let w = World::default();
    assert!(w.is_shadowed(Tuple4D::point(10.0, -10.0, 10.0)));
}

#[test]
fn shadow_object_behind_light() {
    let w = World::default();
    assert!(!w.is_shadowed(Tuple4D::point(-20.0, 20.0, -20.0)));
}

#[test]
fn shadow_object_behind_point() {
    let w = World::default();
    assert!(!w.is_shadowed(Tuple4D::point(-2.0, 2.0, -2.0)));
}

#[test]
fn reflected_color_for_nonreflective_material() {
    let mut w = World::default();
    let inner = w.objects()[1];
    set_material(&mut w, inner, |m| m.ambient = 1.0);

    let r = ray((0.0, 0.0, 0.0), (0.0, 0.0, 1.0));
    let i = Intersection::new(1.0, inner);
    let comps = IntersectionComputation::new(&r, &i,
        &Intersections::from(vec![i]), w.shapes());

    assert_eq!(w.reflected_color(&comps, RECURSION_DEPTH), Color::black());
}

#[cfg(test)]
fn world_with_reflective_floor() -> (World, ShapeId) {
    let mut w = World::default();
    let floor = translated(Shape::plane(), 0.0, -1.0, 0.0)
        .with_material(Material { reflective: 0.5, ..Default::default() });
    let id = w.add_object(floor);
    (w, id)
}

#[test]
fn reflected_color_for_reflective_material() {
    let (w, floor) = world_with_reflective_floor();
    let k = 2.0f64.sqrt() / 2.0;
    let r = ray((0.0, 0.0, -3.0), (0.0, -k, k));
    let i = Intersection::new(2.0f64.sqrt(), floor);
    let comps = IntersectionComputation::new(&r, &i,
        &Intersections::from(vec![i]), w.shapes());

    assert_eq!(w.reflected_color(&comps, 1), Color::rgb(0.19032, 0.2379, 0.14274));
}

#[test]
fn shade_hit_with_reflective_material() {
    let (w, floor) = world_with_reflective_floor();
    let k = 2.0f64.sqrt() / 2.0;
    let r = ray((0.0, 0.0, -3.0), (0.0, -k, k));
    let i = Intersection::new(2.0f64.sqrt(), floor);

    assert_eq!(shade_single(&w, &r, i, 1), Color::rgb(0.87677, 0.92436, 0.82918));
}

#[test]
fn reflected_color_at_maximum_recursive_depth() {
    let (w, floor) = world_with_reflective_floor();
    let k = 2.0f64.sqrt() / 2.0;
    let r = ray((0.0, 0.0, -3.0), (0.0, -k, k));
    let i = Intersection::new(2.0f64.sqrt(), floor);
    let comps = IntersectionComputation::new(&r, &i,
        &Intersections::from(vec![i]), w.shapes());

    assert_eq!(w.reflected_color(&comps, 0), Color::black());
}

#[test]
fn mutually_reflective_surfaces_terminate() {
    let mut w = World::empty();
    w.light = PointLight::new(Color::white(), Tuple4D::point(0.0, 0.0, 0.0));

    let mirror = Material { reflective: 1.0, ..Default::default() };
    w.add_object(translated(Shape::plane(), 0.0, -1.0, 0.0).with_material(mirror));
    w.add_object(Shape::plane()
        .with_transform(Matrix4D::translation(0.0, 1.0, 0.0)
            * Matrix4D::rotation_x(std::f64::consts::PI)).unwrap()
        .with_material(mirror));

    let c = w.color_at(&ray((0.0, 0.0, 0.0), (0.0, 1.0, 0.0)), RECURSION_DEPTH);
    assert!(c.r > 0.0);
}

#[test]
fn refracted_color_with_opaque_surface() {
    let w = World::default();
    let s = w.objects()[0];
    let r = ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0));
    let is = Intersections::from(vec![
        Intersection::new(4.0, s),
        Intersection::new(6.0, s),
    ]);

    let comps = IntersectionComputation::new(&r, &is.intersections[0], &is, w.shapes());
    assert_eq!(w.refracted_color(&comps, RECURSION_DEPTH), Color::black());
}

#[test]
fn refracted_color_at_maximum_recursive_depth() {
    let mut w = World::default();
    let s = w.objects()[0];
    set_material(&mut w, s, |m| { m.transparency = 1.0; m.refractive_index = 1.5; });

    let r = ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0));
    let is = Intersections::from(vec![
        Intersection::new(4.0, s),
        Intersection::new(6.0, s),
    ]);

    let comps = IntersectionComputation::new(&r, &is.intersections[0], &is, w.shapes());
    assert_eq!(w.refracted_color(&comps, 0), Color::black());
}

#[test]
fn refracted_color_under_total_internal_reflection() {
    let mut w = World::default();
    let s = w.objects()[0];
    set_material(&mut w, s, |m| { m.transparency = 1.0; m.refractive_index = 1.5; });

    let k = 2.0f64.sqrt() / 2.0;
    let r = ray((0.0, 0.0, k), (0.0, 1.0, 0.0));
    let is = Intersections::from(vec![
        Intersection::new(-k, s),
        Intersection::new(k, s),
    ]);

    // Inside the sphere, so look at the second intersection.
    let comps = IntersectionComputation::new(&r, &is.intersections[1], &is, w.shapes());
    assert_eq!(w.refracted_color(&comps, RECURSION_DEPTH), Color::black());
}

#[cfg(test)]
fn world_with_glass_floor(reflective: f64) -> (World, ShapeId) {
    let mut w = World::default();

    let floor = translated(Shape::plane(), 0.0, -1.0, 0.0).with_material(Material {
        reflective,
        transparency: 0.5,
        refractive_index: 1.5,
        ..Default::default()
    });
    let floor = w.add_object(floor);

    let ball = translated(Shape::sphere(), 0.0, -3.5, -0.5).with_material(Material {
        color: Color::red(),
        ambient: 0.5,
        ..Default::default()
    });
    w.add_object(ball);

    (w, floor)
}

#[test]
fn shade_hit_with_transparent_material() {
    let (w, floor) = world_with_glass_floor(0.0);
    let k = 2.0f64.sqrt() / 2.0;
    let r = ray((0.0, 0.0, -3.0), (0.0, -k, k));
    let i = Intersection::new(2.0f64.sqrt(), floor);

    assert_eq!(shade_single(&w, &r, i, 5), Color::rgb(0.93642, 0.68642, 0.68642));
}

#[test]
fn shade_hit_with_reflective_transparent_material() {
    let (w, floor) = world_with_glass_floor(0.5);
    let k = 2.0f64.sqrt() / 2.0;
    let r = ray((0.0, 0.0, -3.0), (0.0, -k, k));
    let i = Intersection::new(2.0f64.sqrt(), floor);

    assert_eq!(shade_single(&w, &r, i, 5), Color::rgb(0.93391, 0.69643, 0.69243));
}

#[test]
fn group_children_inherit_group_material() {
    let mut w = World::empty();
    w.light = PointLight::new(Color::white(), Tuple4D::point(0.0, 0.0, -10.0));

    let flat_red = Material {
        color: Color::red(),
        ambient: 1.0,
        diffuse: 0.0,
        specular: 0.0,
        ..Default::default()
    };
    let g = w.add_object(Shape::group().with_material(flat_red));
    w.add_child(g, Shape::sphere()).unwrap();

    let c = w.color_at(&ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)), RECURSION_DEPTH);
    assert_eq!(c, Color::red());
}

#[test]
fn roots_and_children_are_validated() {
    let mut w = World::default();
    let sphere = w.objects()[0];

    assert!(matches!(w.add_child(sphere, Shape::sphere()),
        Err(TracerError::NotAGroup(_))));
    assert!(matches!(w.add_root(sphere), Err(TracerError::InvalidHierarchy(_))));

    let before = w.shapes().len();
    let g = w.insert_detached(Shape::group());
    let child = w.add_child(g, Shape::cube()).unwrap();

    assert_eq!(w.shapes().len(), before + 2);
    assert!(matches!(w.add_root(child), Err(TracerError::InvalidHierarchy(_))));
    w.add_root(g).unwrap();
    assert_eq!(w.objects().last(), Some(&g));
}

#[cfg(test)]
fn flat_stripes(pattern_transform: Matrix4D) -> Material {
    Material {
        pattern: Some(crate::pattern::Pattern::stripe(Color::white(), Color::black())
            .with_transform(pattern_transform).unwrap()),
        ambient: 1.0,
        diffuse: 0.0,
        specular: 0.0,
        ..Default::default()
    }
}

#[cfg(test)]
fn surface_color(shapes: &Shapes, id: ShapeId, world_point: Tuple4D) -> Color {
    shapes.material(id).color_at(shapes.world_to_object(id, world_point))
}

#[test]
fn pattern_follows_object_then_pattern_transform() {
    let mut shapes = Shapes::new();
    let s = shapes.insert(Shape::sphere()
        .with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
        .with_material(flat_stripes(Matrix4D::translation(0.5, 0.0, 0.0))));

    // Object space x = 1.25, pattern space x = 0.75.
    assert_eq!(surface_color(&shapes, s, Tuple4D::point(2.5, 0.0, 0.0)),
        Color::white());
    // Object space x = 1.5, pattern space x = 1.0.
    assert_eq!(surface_color(&shapes, s, Tuple4D::point(3.0, 0.0, 0.0)),
        Color::black());
}

#[test]
fn pattern_on_child_of_transformed_group() {
    let mut shapes = Shapes::new();
    let g = shapes.insert(Shape::group()
        .with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
        .with_material(flat_stripes(Matrix4D::translation(0.5, 0.0, 0.0))));
    let s = shapes.insert(translated(Shape::sphere(), 1.0, 0.0, 0.0));
    shapes.add_child(g, s).unwrap();

    // Group space 2.25, sphere space 1.25, pattern space 0.75.
    assert_eq!(surface_color(&shapes, s, Tuple4D::point(4.5, 0.0, 0.0)),
        Color::white());
    // Group space 2.75, sphere space 1.75, pattern space 1.25.
    assert_eq!(surface_color(&shapes, s, Tuple4D::point(5.5, 0.0, 0.0)),
        Color::black());
}

#[test]
fn shading_a_pattern_on_a_transformed_shape() {
    let mut w = World::empty();
    w.add_object(translated(Shape::sphere(), 1.0, 0.0, 0.0)
        .with_material(flat_stripes(Matrix4D::scaling(2.0, 2.0, 2.0))));

    // The hit at world x = 1.5 is x = 0.5 on the sphere and 0.25 in the
    // pattern.
    let c = w.color_at(&ray((1.5, 0.0, -5.0), (0.0, 0.0, 1.0)), RECURSION_DEPTH);
    assert_eq!(c, Color::white());
}
