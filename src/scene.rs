use std::fs;
use std::path::Path;

use log::debug;
use serde::{ Serialize, Deserialize };

use crate::error::{ Result, TracerError };
use crate::tuple::Tuple4D;
use crate::matrix::Matrix4D;
use crate::color::Color;
use crate::pattern::Pattern;
use crate::light::{ Material, PointLight };
use crate::shape::{ Shape, ShapeId };
use crate::world::World;
use crate::camera::Camera;
use crate::obj::ObjParser;

/// A world together with the camera that frames it.
#[derive(Clone, Debug)]
pub struct Scene {
    pub world: World,
    pub camera: Camera,
}

impl Scene {
    /// Loads a JSON scene description from disk.
    ///
    /// Mesh paths inside the description are resolved relative to the
    /// directory holding the scene file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Scene> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        Self::from_json(&text, base)
    }

    /// Builds a scene from a JSON description.
    ///
    /// ```
    /// # use aun_tracer::scene::Scene;
    /// let json = r#"{
    ///     "canvas_width": 16, "canvas_height": 9, "field_of_view": 1.0472,
    ///     "camera_from": [0, 1.5, -5], "camera_to": [0, 1, 0],
    ///     "camera_up": [0, 1, 0],
    ///     "light": { "intensity": [1, 1, 1], "position": [-10, 10, -10] },
    ///     "shapes": [ { "type": "sphere" } ]
    /// }"#;
    ///
    /// let scene = Scene::from_json(json, std::path::Path::new(".")).unwrap();
    /// assert_eq!(scene.world.objects().len(), 1);
    /// assert_eq!(scene.camera.hsize, 16);
    /// ```
    pub fn from_json(json: &str, base: &Path) -> Result<Scene> {
        let scene_json: SceneJson = serde_json::from_str(json)?;
        scene_json.build(base)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneJson {
    canvas_width: usize,
    canvas_height: usize,
    field_of_view: f64,

    camera_from: [f64; 3],
    camera_to: [f64; 3],
    camera_up: [f64; 3],

    light: LightJson,

    #[serde(default)]
    shapes: Vec<ShapeJson>,
}

impl SceneJson {
    fn build(self, base: &Path) -> Result<Scene> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(TracerError::Scene(format!(
                "canvas must be at least 1x1, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }

        let camera = Camera::look_at(
            self.canvas_width,
            self.canvas_height,
            self.field_of_view,
            point(self.camera_from),
            point(self.camera_to),
            vector(self.camera_up),
        )?;

        let mut world = World::empty();
        world.light = PointLight::new(
            color(self.light.intensity),
            point(self.light.position),
        );

        for shape_json in self.shapes {
            let id = shape_json.insert(&mut world, base)?;
            world.add_root(id)?;
        }

        debug!("built scene with {} top-level objects ({} shapes in total)",
            world.objects().len(), world.shapes().len());

        Ok(Scene { world, camera })
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LightJson {
    intensity: [f64; 3],
    position: [f64; 3],
}

/// One step of a shape or pattern transform.
///
/// Steps apply in list order, so `[scale, translate]` scales first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TransformJson {
    Translate([f64; 3]),
    Scale([f64; 3]),
    RotateX(f64),
    RotateY(f64),
    RotateZ(f64),
    Shear([f64; 6]),
}

impl TransformJson {
    fn matrix(&self) -> Matrix4D {
        match *self {
            TransformJson::Translate([x, y, z]) => Matrix4D::translation(x, y, z),
            TransformJson::Scale([x, y, z]) => Matrix4D::scaling(x, y, z),
            TransformJson::RotateX(r) => Matrix4D::rotation_x(r),
            TransformJson::RotateY(r) => Matrix4D::rotation_y(r),
            TransformJson::RotateZ(r) => Matrix4D::rotation_z(r),
            TransformJson::Shear([xy, xz, yx, yz, zx, zy]) =>
                Matrix4D::shearing(xy, xz, yx, yz, zx, zy),
        }
    }
}

fn compose(steps: &[TransformJson]) -> Matrix4D {
    steps.iter().fold(Matrix4D::identity(), |m, step| step.matrix() * m)
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatternJson {
    #[serde(rename = "type")]
    ty: String,
    a: [f64; 3],
    b: Option<[f64; 3]>,

    #[serde(default)]
    transform: Vec<TransformJson>,
}

impl PatternJson {
    fn build(&self) -> Result<Pattern> {
        let a = color(self.a);
        let b = || self.b.map(color).ok_or_else(|| TracerError::Scene(
            format!("{} pattern needs a second color 'b'", self.ty)
        ));

        let pattern = match self.ty.as_str() {
            "solid" => Pattern::solid(a),
            "stripe" => Pattern::stripe(a, b()?),
            "ring" => Pattern::ring(a, b()?),
            "gradient" => Pattern::gradient(a, b()?),
            "checker" => Pattern::checker(a, b()?),
            other => return Err(TracerError::Scene(
                format!("unknown pattern type '{}'", other)
            )),
        };

        pattern.with_transform(compose(&self.transform))
    }
}

/// Material overrides; unset fields keep their default values.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MaterialJson {
    color: Option<[f64; 3]>,
    pattern: Option<PatternJson>,

    ambient: Option<f64>,
    diffuse: Option<f64>,
    specular: Option<f64>,
    shininess: Option<f64>,

    reflective: Option<f64>,
    transparency: Option<f64>,
    refractive_index: Option<f64>,
}

impl MaterialJson {
    fn build(&self) -> Result<Material> {
        let d = Material::default();

        Ok(Material {
            color: self.color.map(color).unwrap_or(d.color),
            pattern: self.pattern.as_ref().map(PatternJson::build).transpose()?,

            ambient: self.ambient.unwrap_or(d.ambient),
            diffuse: self.diffuse.unwrap_or(d.diffuse),
            specular: self.specular.unwrap_or(d.specular),
            shininess: self.shininess.unwrap_or(d.shininess),

            reflective: self.reflective.unwrap_or(d.reflective),
            transparency: self.transparency.unwrap_or(d.transparency),
            refractive_index: self.refractive_index.unwrap_or(d.refractive_index),
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShapeJson {
    #[serde(rename = "type")]
    ty: String,

    #[serde(default)]
    transform: Vec<TransformJson>,
    material: Option<MaterialJson>,

    // Cylinders and cones
    minimum: Option<f64>,
    maximum: Option<f64>,
    #[serde(default)]
    closed: bool,

    // Triangles
    points: Option<[[f64; 3]; 3]>,
    normals: Option<[[f64; 3]; 3]>,

    // Meshes
    path: Option<String>,

    // Groups
    #[serde(default)]
    children: Vec<ShapeJson>,
}

impl ShapeJson {
    /// Stores this shape and its subtree in `world`, returning the detached
    /// root of the subtree.
    fn insert(self, world: &mut World, base: &Path) -> Result<ShapeId> {
        if !self.children.is_empty() && self.ty != "group" {
            return Err(TracerError::Scene(
                format!("a {} cannot have children", self.ty)
            ));
        }

        let transform = compose(&self.transform);
        let material = self.material.as_ref().map(MaterialJson::build).transpose()?;

        let id = if self.ty == "mesh" {
            let path = self.path.as_ref().ok_or_else(||
                TracerError::Scene("mesh needs a 'path'".into())
            )?;
            let mesh = ObjParser::open(base.join(path))?;
            mesh.into_group(world.shapes_mut())?
        } else {
            world.insert_detached(self.primitive()?)
        };

        if let Some(shape) = world.shapes_mut().get_mut(id) {
            shape.set_transform(transform)?;
            if let Some(m) = material {
                shape.set_material(m);
            }
        }

        for child in self.children {
            let child_id = child.insert(world, base)?;
            world.shapes_mut().add_child(id, child_id)?;
        }

        Ok(id)
    }

    fn primitive(&self) -> Result<Shape> {
        let minimum = self.minimum.unwrap_or(f64::NEG_INFINITY);
        let maximum = self.maximum.unwrap_or(f64::INFINITY);
        if self.closed && !(minimum.is_finite() && maximum.is_finite()) {
            return Err(TracerError::Scene(
                format!("a closed {} needs finite minimum and maximum", self.ty)
            ));
        }

        let points = || self.points.ok_or_else(|| TracerError::Scene(
            format!("{} needs three 'points'", self.ty)
        ));

        let shape = match self.ty.as_str() {
            "sphere" => Shape::sphere(),
            "plane" => Shape::plane(),
            "cube" => Shape::cube(),
            "cylinder" if self.closed => Shape::capped_cylinder(minimum, maximum),
            "cylinder" => Shape::bounded_cylinder(minimum, maximum),
            "cone" if self.closed => Shape::capped_cone(minimum, maximum),
            "cone" => Shape::bounded_cone(minimum, maximum),
            "triangle" => {
                let [p1, p2, p3] = points()?;
                Shape::triangle(point(p1), point(p2), point(p3))
            },
            "smooth_triangle" => {
                let [p1, p2, p3] = points()?;
                let [n1, n2, n3] = self.normals.ok_or_else(||
                    TracerError::Scene("smooth_triangle needs three 'normals'".into())
                )?;
                Shape::smooth_triangle(point(p1), point(p2), point(p3),
                    vector(n1), vector(n2), vector(n3))
            },
            "group" => Shape::group(),
            other => return Err(TracerError::Scene(
                format!("unknown shape type '{}'", other)
            )),
        };

        Ok(shape)
    }
}

fn point([x, y, z]: [f64; 3]) -> Tuple4D {
    Tuple4D::point(x, y, z)
}

fn vector([x, y, z]: [f64; 3]) -> Tuple4D {
    Tuple4D::vector(x, y, z)
}

fn color([r, g, b]: [f64; 3]) -> Color {
    Color::rgb(r, g, b)
}

#[cfg(test)]
use crate::shape::ShapeType;

#[cfg(test)]
fn scene_with_shapes(shapes: &str) -> String {
    format!(r#"{{
        "canvas_width": 32, "canvas_height": 18, "field_of_view": 1.0472,
        "camera_from": [0, 1.5, -5], "camera_to": [0, 1, 0], "camera_up": [0, 1, 0],
        "light": {{ "intensity": [1, 1, 1], "position": [-10, 10, -10] }},
        "shapes": {}
    }}"#, shapes)
}

#[cfg(test)]
fn load_str(shapes: &str) -> Result<Scene> {
    Scene::from_json(&scene_with_shapes(shapes), Path::new("."))
}

#[test]
fn camera_and_light_from_json() {
    let scene = load_str("[]").unwrap();

    assert_eq!(scene.camera.hsize, 32);
    assert_eq!(scene.camera.vsize, 18);
    assert_eq!(*scene.camera.transform(), Matrix4D::view_transform(
        Tuple4D::point(0.0, 1.5, -5.0),
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0),
    ));
    assert_eq!(scene.world.light.position, Tuple4D::point(-10.0, 10.0, -10.0));
    assert!(scene.world.objects().is_empty());
}

#[test]
fn transform_steps_apply_in_order() {
    let scene = load_str(r#"[{
        "type": "sphere",
        "transform": [ { "scale": [2, 2, 2] }, { "translate": [0, 1, 0] } ]
    }]"#).unwrap();

    let id = scene.world.objects()[0];
    assert_eq!(*scene.world.shapes()[id].transform(),
        Matrix4D::translation(0.0, 1.0, 0.0) * Matrix4D::scaling(2.0, 2.0, 2.0));
}

#[test]
fn materials_and_patterns_from_json() {
    let scene = load_str(r#"[{
        "type": "plane",
        "material": {
            "specular": 0,
            "reflective": 0.5,
            "pattern": {
                "type": "checker", "a": [1, 1, 1], "b": [0, 0, 0],
                "transform": [ { "scale": [0.1, 0.1, 0.1] } ]
            }
        }
    }]"#).unwrap();

    let id = scene.world.objects()[0];
    let m = scene.world.shapes().material(id);
    assert_eq!(m.specular, 0.0);
    assert_eq!(m.reflective, 0.5);
    assert_eq!(m.diffuse, Material::default().diffuse);

    let pattern = m.pattern.unwrap();
    assert_eq!(pattern.kind, Pattern::checker(Color::white(), Color::black()).kind);
    assert_eq!(*pattern.transform(), Matrix4D::scaling(0.1, 0.1, 0.1));
}

#[test]
fn nested_groups_from_json() {
    let scene = load_str(r#"[{
        "type": "group",
        "transform": [ { "rotate_y": 1.5707963267948966 } ],
        "material": { "color": [1, 0, 0] },
        "children": [
            { "type": "cylinder", "minimum": 0, "maximum": 1, "closed": true },
            { "type": "group", "children": [ { "type": "sphere" } ] }
        ]
    }]"#).unwrap();

    let shapes = scene.world.shapes();
    let root = scene.world.objects()[0];
    let children = shapes[root].children().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(*shapes[children[0]].ty(), ShapeType::Cylinder(0.0, 1.0, true));

    let sphere = shapes[children[1]].children().unwrap()[0];
    assert_eq!(shapes.world_to_object(sphere, Tuple4D::point(1.0, 0.0, 0.0)),
        Tuple4D::point(0.0, 0.0, 1.0));
    assert_eq!(shapes.material(sphere).color, Color::red());
}

#[test]
fn triangles_from_json() {
    let scene = load_str(r#"[
        { "type": "triangle", "points": [[0, 1, 0], [-1, 0, 0], [1, 0, 0]] },
        { "type": "smooth_triangle", "points": [[0, 1, 0], [-1, 0, 0], [1, 0, 0]],
          "normals": [[0, 1, 0], [-1, 0, 0], [1, 0, 0]] }
    ]"#).unwrap();

    let shapes = scene.world.shapes();
    let objects = scene.world.objects();
    assert!(matches!(shapes[objects[0]].ty(), ShapeType::Triangle(_)));
    assert!(matches!(shapes[objects[1]].ty(), ShapeType::SmoothTriangle(_)));
}

#[test]
fn bad_descriptions_are_rejected() {
    let cases = [
        r#"[{ "type": "teapot" }]"#,
        r#"[{ "type": "sphere", "children": [ { "type": "cube" } ] }]"#,
        r#"[{ "type": "triangle" }]"#,
        r#"[{ "type": "cylinder", "closed": true }]"#,
        r#"[{ "type": "plane", "material": { "pattern": { "type": "stripe", "a": [1, 1, 1] } } }]"#,
        r#"[{ "type": "mesh" }]"#,
    ];

    for shapes in cases.iter() {
        assert!(matches!(load_str(shapes), Err(TracerError::Scene(_))), "{}", shapes);
    }

    assert!(matches!(load_str(r#"[{ "type": "cube", "colour": [1, 0, 0] }]"#),
        Err(TracerError::Json(_))));
    assert!(matches!(load_str(r#"[{ "type": "cube", "transform": [ { "scale": [0, 1, 1] } ] }]"#),
        Err(TracerError::NonInvertible)));
}

#[test]
fn missing_mesh_file_is_an_io_error() {
    let result = load_str(r#"[{ "type": "mesh", "path": "does/not/exist.obj" }]"#);
    assert!(matches!(result, Err(TracerError::Io(_))));
}
