use crate::consts::VACUUM_RI;
use crate::color::Color;
use crate::pattern::Pattern;
use crate::tuple::Tuple4D;

/// A point light.
///
/// Light radiates from a single `position` with color `intensity`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointLight {
    pub intensity: Color,
    pub position: Tuple4D,
}

impl PointLight {
    /// Creates a point light. `position` is coerced to a point.
    pub fn new(intensity: Color, position: Tuple4D) -> PointLight {
        PointLight {
            intensity,
            position: Tuple4D { w: 1.0, ..position },
        }
    }
}

/// A material record.
///
/// Materials use attributes from the Phong reflection model (ambient,
/// diffuse, specular and shininess), plus the coefficients driving
/// recursive reflection and refraction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    pub color: Color,
    pub pattern: Option<Pattern>,

    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub shininess: f64,

    pub reflective: f64,
    pub transparency: f64,
    pub refractive_index: f64,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            color: Color::rgb(1.0, 1.0, 1.0),
            pattern: None,

            ambient: 0.1,
            diffuse: 0.9,
            specular: 0.9,
            shininess: 200.0,

            reflective: 0.0,
            transparency: 0.0,
            refractive_index: VACUUM_RI,
        }
    }
}

impl Material {
    /// A glassy material: fully transparent with refractive index 1.5.
    pub fn glass() -> Material {
        Material {
            transparency: 1.0,
            refractive_index: 1.5,
            ..Default::default()
        }
    }

    /// The surface color at a point in the owning shape's object space.
    ///
    /// Falls back to the flat `color` when there is no pattern.
    pub fn color_at(&self, object_point: Tuple4D) -> Color {
        match self.pattern {
            Some(ref pat) => pat.pattern_at_object(object_point),
            None => self.color,
        }
    }
}

/// Calculate the Phong lighting of a point on a surface.
///
/// `point` is the world-space surface point, `object_point` the same point in
/// the shape's object space (used only for pattern lookups). If the point is
/// in a shadow (parameter `in_shadow`), only ambient light is used.
pub fn lighting(m: &Material, light: &PointLight, point: Tuple4D,
    object_point: Tuple4D, eyev: Tuple4D, normalv: Tuple4D, in_shadow: bool)
    -> Color {
    // Combine surface color with light's color
    let effective_color = m.color_at(object_point) * light.intensity;

    // Find direction to light source
    let lightv = (light.position - point).normalize();

    let ambient = effective_color * m.ambient;
    if in_shadow {
        return ambient;
    }

    // The light is on the other side of the surface
    let light_dot_normal = lightv.dot(&normalv);
    if light_dot_normal < 0.0 {
        return ambient;
    }

    let diffuse = effective_color * m.diffuse * light_dot_normal;

    // Specular highlight only when the reflected light points at the eye
    let reflectv = (-lightv).reflect(&normalv);
    let reflect_dot_eye = reflectv.dot(&eyev);
    let specular = if reflect_dot_eye <= 0.0 {
        Color::black()
    } else {
        light.intensity * m.specular * reflect_dot_eye.powf(m.shininess)
    };

    ambient + diffuse + specular
}

#[cfg(test)]
fn light_at(x: f64, y: f64, z: f64) -> PointLight {
    PointLight::new(Color::white(), Tuple4D::point(x, y, z))
}

#[cfg(test)]
fn shade(m: &Material, light: &PointLight, eyev: Tuple4D, in_shadow: bool)
    -> Color {
    let position = Tuple4D::point(0.0, 0.0, 0.0);
    let normalv = Tuple4D::vector(0.0, 0.0, -1.0);
    lighting(m, light, position, position, eyev, normalv, in_shadow)
}

#[test]
fn default_material() {
    let m = Material::default();

    assert_eq!(m.color, Color::white());
    assert_eq!(m.ambient, 0.1);
    assert_eq!(m.diffuse, 0.9);
    assert_eq!(m.specular, 0.9);
    assert_eq!(m.shininess, 200.0);
    assert_eq!(m.reflective, 0.0);
    assert_eq!(m.transparency, 0.0);
    assert_eq!(m.refractive_index, 1.0);
}

#[test]
fn eye_between_light_and_surface() {
    let eyev = Tuple4D::vector(0.0, 0.0, -1.0);
    let res = shade(&Material::default(), &light_at(0.0, 0.0, -10.0), eyev, false);

    assert_eq!(res, Color::rgb(1.9, 1.9, 1.9));
}

#[test]
fn eye_between_light_and_surface_offset_45() {
    let eyev = Tuple4D::vector(0.0, 2.0f64.sqrt() / 2.0, -(2.0f64.sqrt()) / 2.0);
    let res = shade(&Material::default(), &light_at(0.0, 0.0, -10.0), eyev, false);

    assert_eq!(res, Color::rgb(1.0, 1.0, 1.0));
}

#[test]
fn eye_opposite_surface_light_offset_45() {
    let eyev = Tuple4D::vector(0.0, 0.0, -1.0);
    let res = shade(&Material::default(), &light_at(0.0, 10.0, -10.0), eyev, false);

    assert_eq!(res, Color::rgb(0.7364, 0.7364, 0.7364));
}

#[test]
fn eye_in_path_of_reflection() {
    let eyev = Tuple4D::vector(0., -(2.0f64.sqrt())/2., -(2.0f64.sqrt())/2.);
    let res = shade(&Material::default(), &light_at(0.0, 10.0, -10.0), eyev, false);

    assert_eq!(res, Color::rgb(1.6364, 1.6364, 1.6364));
}

#[test]
fn light_behind_surface() {
    let eyev = Tuple4D::vector(0.0, 0.0, -1.0);
    let res = shade(&Material::default(), &light_at(0.0, 0.0, 10.0), eyev, false);

    assert_eq!(res, Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn surface_in_shadow_is_ambient_only() {
    let eyev = Tuple4D::vector(0.0, 0.0, -1.0);
    let res = shade(&Material::default(), &light_at(0.0, 0.0, -10.0), eyev, true);

    assert_eq!(res, Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn lighting_with_stripe_pattern() {
    // Only ambient light contributes, so the pattern color shows through.
    let m = Material {
        pattern: Some(Pattern::stripe(Color::white(), Color::black())),
        ambient: 1.0,
        diffuse: 0.0,
        specular: 0.0,
        ..Default::default()
    };

    let eyev = Tuple4D::vector(0.0, 0.0, -1.0);
    let normalv = Tuple4D::vector(0.0, 0.0, -1.0);
    let light = light_at(0.0, 0.0, -10.0);

    let p1 = Tuple4D::point(0.9, 0.0, 0.0);
    let p2 = Tuple4D::point(1.1, 0.0, 0.0);
    assert_eq!(lighting(&m, &light, p1, p1, eyev, normalv, false), Color::white());
    assert_eq!(lighting(&m, &light, p2, p2, eyev, normalv, false), Color::black());
}
