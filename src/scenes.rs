//! Prebuilt demo scenes.

use std::f64::consts::PI;
use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::tuple::Tuple4D;
use crate::matrix::Matrix4D;
use crate::color::Color;
use crate::pattern::Pattern;
use crate::light::{ Material, PointLight };
use crate::shape::{ Shape, ShapeId };
use crate::world::World;
use crate::camera::Camera;
use crate::scene::Scene;
use crate::obj::ObjParser;

pub const TEAPOT_MODEL: &str = "utah-teapot.obj";
pub const TEAPOT_LOW_RES_MODEL: &str = "utah-teapot-low.obj";

/// Camera used by the room scenes, at `(0, 1.5, -5)` looking at `(0, 1, 0)`.
fn room_camera(width: usize, height: usize) -> Result<Camera> {
    Camera::look_at(width, height, PI / 3.0,
        Tuple4D::point(0.0, 1.5, -5.0),
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0))
}

/// A checkered floor and two walls meeting behind the origin, lit from the
/// upper left.
fn room() -> Result<World> {
    let mut world = World::empty();
    world.light = PointLight::new(Color::white(), Tuple4D::point(-10.0, 10.0, -10.0));

    let checker = Pattern::checker(Color::white(), Color::black())
        .with_transform(Matrix4D::scaling(0.1, 0.01, 0.1))?;
    let room_material = Material {
        color: Color::rgb(1.0, 0.9, 0.9),
        specular: 0.0,
        pattern: Some(checker),
        ..Default::default()
    };

    let flat = Matrix4D::scaling(10.0, 0.01, 10.0);
    let wall = |angle: f64| Matrix4D::translation(0.0, 0.0, 5.0)
        * Matrix4D::rotation_y(angle)
        * Matrix4D::rotation_x(PI / 2.0)
        * flat;

    for transform in [flat, wall(-PI / 4.0), wall(PI / 4.0)] {
        world.add_object(Shape::plane()
            .with_transform(transform)?
            .with_material(room_material));
    }

    Ok(world)
}

/// Two spheres and a checkered cube inside the room.
pub fn cubes(width: usize, height: usize) -> Result<Scene> {
    let mut world = room()?;

    let middle = Shape::sphere()
        .with_transform(Matrix4D::translation(-0.5, 1.0, 0.5))?
        .with_material(Material {
            color: Color::rgb(0.1, 1.0, 0.5),
            diffuse: 0.7,
            specular: 0.3,
            ..Default::default()
        });

    let right = Shape::sphere()
        .with_transform(Matrix4D::translation(1.5, 0.5, -0.5)
            * Matrix4D::scaling(0.5, 0.5, 0.5))?
        .with_material(Material {
            color: Color::rgb(0.5, 1.0, 0.1),
            diffuse: 0.7,
            specular: 0.3,
            reflective: 1.0,
            ..Default::default()
        });

    let left_pattern = Pattern::checker(Color::red(), Color::green())
        .with_transform(Matrix4D::translation(1.5, 0.5, -0.5)
            * Matrix4D::scaling(0.5, 0.5, 0.5))?;
    let left = Shape::cube()
        .with_transform(Matrix4D::translation(-1.5, 0.33, -0.75)
            * Matrix4D::scaling(0.33, 0.33, 0.33))?
        .with_material(Material {
            color: Color::rgb(1.0, 0.8, 0.1),
            diffuse: 0.7,
            specular: 0.3,
            pattern: Some(left_pattern),
            ..Default::default()
        });

    for shape in [middle, right, left] {
        world.add_object(shape);
    }

    debug!("built cubes scene with {} shapes", world.shapes().len());
    Ok(Scene { world, camera: room_camera(width, height)? })
}

/// One side of a hexagon: a sphere at the corner and a cylinder running
/// along the edge to the next corner.
fn hexagon_side(world: &mut World) -> Result<ShapeId> {
    let side = world.insert_detached(Shape::group());

    world.add_child(side, Shape::sphere()
        .with_transform(Matrix4D::translation(0.0, 0.0, -1.0)
            * Matrix4D::scaling(0.25, 0.25, 0.25))?)?;

    world.add_child(side, Shape::bounded_cylinder(0.0, 1.0)
        .with_transform(Matrix4D::translation(0.0, 0.0, -1.0)
            * Matrix4D::rotation_y(-PI / 6.0)
            * Matrix4D::rotation_z(-PI / 2.0)
            * Matrix4D::scaling(0.25, 1.0, 0.25))?)?;

    Ok(side)
}

/// Builds a hexagon of six sides, each rotated a further sixth of a turn
/// about Y, and returns its detached group.
///
/// None of the hexagon's parts has its own material, so all of them render
/// with `material`.
pub fn hexagon_group(world: &mut World, material: Material, transform: Matrix4D)
    -> Result<ShapeId> {
    let hex = world.insert_detached(Shape::group()
        .with_transform(transform)?
        .with_material(material));

    for i in 0..6 {
        let side = hexagon_side(world)?;
        if let Some(shape) = world.shapes_mut().get_mut(side) {
            shape.set_transform(Matrix4D::rotation_y(i as f64 * PI / 3.0))?;
        }
        world.shapes_mut().add_child(hex, side)?;
    }

    Ok(hex)
}

/// A checkered hexagon tilted towards the camera inside the room.
pub fn hexagon(width: usize, height: usize) -> Result<Scene> {
    let mut world = room()?;

    let material = Material {
        pattern: Some(Pattern::checker(Color::red(), Color::green())),
        ..Default::default()
    };
    let hex = hexagon_group(&mut world, material,
        Matrix4D::translation(-0.5, 1.0, 0.5) * Matrix4D::rotation_x(-PI / 12.0))?;
    world.add_root(hex)?;

    debug!("built hexagon scene with {} shapes", world.shapes().len());
    Ok(Scene { world, camera: room_camera(width, height)? })
}

/// The Utah teapot on a checkered floor in front of a back wall.
///
/// The mesh is read from `models`, which must hold `utah-teapot.obj` or,
/// with `low_res`, `utah-teapot-low.obj`.
pub fn teapot(models: &Path, low_res: bool, width: usize, height: usize)
    -> Result<Scene> {
    let mut world = World::empty();
    world.light = PointLight::new(Color::rgb(0.5, 0.5, 0.5),
        Tuple4D::point(2.0, 50.0, 100.0));

    let checkered = Pattern::checker(
        Color::rgb(0.35, 0.35, 0.35),
        Color::rgb(0.4, 0.4, 0.4));
    let planes_material = Material {
        pattern: Some(checkered),
        ambient: 1.0,
        diffuse: 0.0,
        specular: 0.0,
        reflective: 0.1,
        ..Default::default()
    };

    world.add_object(Shape::plane().with_material(planes_material));
    world.add_object(Shape::plane()
        .with_transform(Matrix4D::translation(0.0, 0.0, -10.0)
            * Matrix4D::rotation_x(PI / 2.0))?
        .with_material(planes_material));

    let model = if low_res { TEAPOT_LOW_RES_MODEL } else { TEAPOT_MODEL };
    let mesh = ObjParser::open(models.join(model))?;
    debug!("teapot mesh has {} triangles", mesh.triangle_count());

    let teapot = mesh.into_group(world.shapes_mut())?;
    if let Some(shape) = world.shapes_mut().get_mut(teapot) {
        shape.set_transform(Matrix4D::rotation_y(PI * 23.0 / 22.0)
            * Matrix4D::rotation_x(-PI / 2.0)
            * Matrix4D::scaling(0.3, 0.3, 0.3))?;
        shape.set_material(Material {
            color: Color::rgb(1.0, 0.3, 0.2),
            shininess: 5.0,
            specular: 0.4,
            ..Default::default()
        });
    }
    world.add_root(teapot)?;

    let camera = Camera::look_at(width, height, PI / 3.0,
        Tuple4D::point(0.0, 7.0, 13.0),
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0))?;

    Ok(Scene { world, camera })
}

#[cfg(test)]
use crate::error::TracerError;

#[test]
fn cubes_scene_contents() {
    let scene = cubes(32, 18).unwrap();

    assert_eq!(scene.world.objects().len(), 6);
    assert_eq!(scene.world.light.position, Tuple4D::point(-10.0, 10.0, -10.0));
    assert_eq!((scene.camera.hsize, scene.camera.vsize), (32, 18));
    assert!(crate::feq(scene.camera.field_of_view, PI / 3.0));

    let right = scene.world.objects()[4];
    assert_eq!(scene.world.shapes().material(right).reflective, 1.0);
}

#[test]
fn hexagon_is_six_sides_of_two_parts() {
    let scene = hexagon(32, 18).unwrap();
    let shapes = scene.world.shapes();

    // Three room planes plus the hexagon.
    assert_eq!(scene.world.objects().len(), 4);

    let hex = scene.world.objects()[3];
    let sides = shapes[hex].children().unwrap();
    assert_eq!(sides.len(), 6);

    for &side in sides {
        let parts = shapes[side].children().unwrap();
        assert_eq!(parts.len(), 2);
        for &part in parts {
            assert!(shapes[part].material().is_none());
            assert_eq!(shapes.material(part), *shapes[hex].material().unwrap());
        }
    }
}

#[test]
fn hexagon_corner_is_where_expected() {
    let mut world = World::empty();
    let hex = hexagon_group(&mut world, Material::default(), Matrix4D::identity())
        .unwrap();
    world.add_root(hex).unwrap();

    // The first side's corner sphere sits at (0, 0, -1) with radius 0.25.
    let ray = crate::ray::Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0),
        Tuple4D::vector(0.0, 0.0, 1.0));
    let hit = world.intersect(&ray).hit().unwrap();
    assert!(crate::feq(hit.t, 3.75));
}

#[test]
fn teapot_reads_model_from_directory() {
    let dir = std::env::temp_dir()
        .join(format!("aun-tracer-teapot-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(TEAPOT_LOW_RES_MODEL),
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\nf 1 2 3\nf 1 3 4\n").unwrap();

    let scene = teapot(&dir, true, 16, 9).unwrap();
    let shapes = scene.world.shapes();
    let mesh = scene.world.objects()[2];
    assert_eq!(shapes[mesh].children().unwrap().len(), 2);
    assert_eq!(shapes.material(shapes[mesh].children().unwrap()[0]).shininess, 5.0);

    let missing = teapot(&dir, false, 16, 9);
    assert!(matches!(missing, Err(TracerError::Io(_))));

    std::fs::remove_dir_all(&dir).unwrap();
}
