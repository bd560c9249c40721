use log::debug;

use crate::error::Result;
use crate::ray::Ray4D;
use crate::tuple::Tuple4D;
use crate::matrix::Matrix4D;
use crate::world::World;
use crate::canvas::Canvas;
use crate::consts::RECURSION_DEPTH;

/// A camera record for generating a canvas.
///
/// This record gives a "frame" of the world. The camera sits at the origin
/// of its own space looking down -Z, with the canvas one unit in front of
/// it; `transform` places that space in the world.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// The horizontal size of the resultant canvas.
    pub hsize: usize,

    /// The vertical size of the resultant canvas.
    pub vsize: usize,

    pub half_width: f64,
    pub half_height: f64,
    pub pixel_size: f64,

    /// The angle describing "how much" the camera can see.
    pub field_of_view: f64,

    transform: Matrix4D,
    inverse: Matrix4D,
}

impl Camera {
    /// Creates a camera, failing if `transform` has no inverse.
    ///
    /// ```
    /// # use aun_tracer::camera::Camera;
    /// # use aun_tracer::matrix::Matrix4D;
    /// let c = Camera::new(200, 125, std::f64::consts::PI / 2.0,
    ///     Matrix4D::identity()).unwrap();
    /// assert!((c.pixel_size - 0.01).abs() < 1e-9);
    /// ```
    pub fn new(hsize: usize, vsize: usize, field_of_view: f64,
        transform: Matrix4D) -> Result<Camera> {
        let half_view = (field_of_view / 2.0).tan();
        let aspect = (hsize as f64) / (vsize as f64);

        let (half_width, half_height) = if aspect >= 1.0 {
            (half_view, half_view / aspect)
        } else {
            (half_view * aspect, half_view)
        };

        Ok(Camera {
            hsize,
            vsize,
            half_width,
            half_height,
            pixel_size: half_width * 2.0 / (hsize as f64),
            field_of_view,
            inverse: transform.inverse()?,
            transform,
        })
    }

    /// Creates a camera at `from`, looking at `to`.
    pub fn look_at(hsize: usize, vsize: usize, field_of_view: f64,
        from: Tuple4D, to: Tuple4D, up: Tuple4D) -> Result<Camera> {
        Self::new(hsize, vsize, field_of_view,
            Matrix4D::view_transform(from, to, up))
    }

    pub fn transform(&self) -> &Matrix4D {
        &self.transform
    }

    /// Replaces the view transform. The camera is unchanged on error.
    pub fn set_transform(&mut self, transform: Matrix4D) -> Result<()> {
        self.inverse = transform.inverse()?;
        self.transform = transform;
        Ok(())
    }

    /// The world-space ray through the center of pixel `(px, py)`.
    pub fn ray_for_pixel(&self, px: usize, py: usize) -> Ray4D {
        // Offsets from the edge of the canvas to the pixel's center
        let xoffset = (px as f64 + 0.5) * self.pixel_size;
        let yoffset = (py as f64 + 0.5) * self.pixel_size;

        // The untransformed coordinates of the pixel; the canvas is at z=-1
        let world_x = self.half_width - xoffset;
        let world_y = self.half_height - yoffset;

        let pixel = self.inverse * Tuple4D::point(world_x, world_y, -1.0);
        let origin = self.inverse * Tuple4D::origin();
        let direction = (pixel - origin).normalize();

        Ray4D::new(origin, direction)
    }

    /// Renders every pixel on the calling thread.
    pub fn render(&self, w: &World) -> Canvas {
        self.render_to_depth(w, RECURSION_DEPTH)
    }

    /// Renders with an explicit reflection/refraction depth.
    pub fn render_to_depth(&self, w: &World, depth: usize) -> Canvas {
        debug!("rendering {}x{} on one thread", self.hsize, self.vsize);

        let mut image = Canvas::new(self.hsize, self.vsize);
        for y in 0..self.vsize {
            for x in 0..self.hsize {
                let ray = self.ray_for_pixel(x, y);
                image.write_pixel(x, y, &w.color_at(&ray, depth));
            }
        }

        image
    }
}

#[cfg(test)]
use std::f64::consts::PI;

#[test]
fn pixel_size_for_horizontal_and_vertical_canvas() {
    let h = Camera::new(200, 125, PI / 2.0, Matrix4D::identity()).unwrap();
    let v = Camera::new(125, 200, PI / 2.0, Matrix4D::identity()).unwrap();

    assert!(crate::feq(h.pixel_size, 0.01));
    assert!(crate::feq(v.pixel_size, 0.01));
}

#[test]
fn ray_through_center() {
    let c = Camera::new(201, 101, PI / 2.0, Matrix4D::identity()).unwrap();
    let r = c.ray_for_pixel(100, 50);

    assert_eq!(r.origin, Tuple4D::point(0.0, 0.0, 0.0));
    assert_eq!(r.direction, Tuple4D::vector(0.0, 0.0, -1.0));
}

#[test]
fn ray_through_corner() {
    let c = Camera::new(201, 101, PI / 2.0, Matrix4D::identity()).unwrap();
    let r = c.ray_for_pixel(0, 0);

    assert_eq!(r.origin, Tuple4D::point(0.0, 0.0, 0.0));
    assert_eq!(r.direction, Tuple4D::vector(0.66519, 0.33259, -0.66851));
}

#[test]
fn ray_when_camera_transformed() {
    let c = Camera::new(201, 101, PI / 2.0,
        Matrix4D::rotation_y(PI / 4.0) * Matrix4D::translation(0.0, -2.0, 5.0))
        .unwrap();
    let r = c.ray_for_pixel(100, 50);

    assert_eq!(r.origin, Tuple4D::point(0.0, 2.0, -5.0));
    assert_eq!(r.direction,
        Tuple4D::vector(2.0f64.sqrt() / 2.0, 0.0, -(2.0f64.sqrt() / 2.0)));
}

#[test]
fn singular_camera_transform_is_rejected() {
    let mut c = Camera::new(10, 10, PI / 2.0, Matrix4D::identity()).unwrap();

    assert!(Camera::new(10, 10, PI / 2.0, Matrix4D::scaling(0.0, 1.0, 1.0)).is_err());
    assert!(c.set_transform(Matrix4D::scaling(1.0, 1.0, 0.0)).is_err());
    assert_eq!(*c.transform(), Matrix4D::identity());
}

#[test]
fn render_world_with_camera() {
    use crate::color::Color;

    let w = World::default();
    let c = Camera::look_at(11, 11, PI / 2.0,
        Tuple4D::point(0.0, 0.0, -5.0),
        Tuple4D::point(0.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0)).unwrap();

    let image = c.render(&w);
    assert_eq!(image.read_pixel(5, 5).unwrap(),
        Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn render_covers_last_row_and_column() {
    let w = World::default();
    let c = Camera::look_at(5, 3, PI / 2.0,
        Tuple4D::point(0.0, 0.0, -1.2),
        Tuple4D::point(0.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0)).unwrap();

    // Close enough that the outer sphere fills the frame.
    let image = c.render(&w);
    assert_ne!(image.read_pixel(4, 2).unwrap(), crate::color::Color::black());
    assert_ne!(image.read_pixel(0, 0).unwrap(), crate::color::Color::black());
}
