use std::panic;
use std::thread;
use std::time::Instant;

use crossbeam_channel::bounded;
use log::{ debug, info };

use crate::color::Color;
use crate::world::World;
use crate::camera::Camera;
use crate::canvas::Canvas;
use crate::consts::{ DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, RECURSION_DEPTH };

/// Settings for `multi_threaded_render`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    /// Number of worker threads shading pixels. Zero is treated as one.
    pub workers: usize,

    /// Capacity of both the pixel queue and the result queue. Senders block
    /// once a queue is full.
    pub queue_capacity: usize,

    /// Reflection/refraction recursion depth.
    pub depth: usize,
}

impl Default for RenderConfig {
    fn default() -> RenderConfig {
        RenderConfig {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            depth: RECURSION_DEPTH,
        }
    }
}

/// Renders `world` through `camera` on a pool of worker threads.
///
/// The calling thread enqueues every pixel coordinate on a bounded queue.
/// Workers pull coordinates, shade them and push `(x, y, color)` onto a
/// second bounded queue, which a single aggregator thread drains into the
/// canvas. The aggregator is the only thread touching the canvas, so it
/// needs no lock.
///
/// The output is identical to `Camera::render` for any worker count.
pub fn multi_threaded_render(camera: &Camera, world: &World,
    config: &RenderConfig) -> Canvas {
    let workers = config.workers.max(1);
    let capacity = config.queue_capacity.max(1);
    let depth = config.depth;
    let (hsize, vsize) = (camera.hsize, camera.vsize);

    info!("rendering {}x{} ({} pixels) with {} workers",
        hsize, vsize, hsize * vsize, workers);
    let start = Instant::now();

    let canvas = thread::scope(|scope| {
        let (pixel_tx, pixel_rx) = bounded::<(usize, usize)>(capacity);
        let (result_tx, result_rx) = bounded::<(usize, usize, Color)>(capacity);

        let aggregator = scope.spawn(move || {
            let mut canvas = Canvas::new(hsize, vsize);
            for (x, y, color) in result_rx.iter() {
                canvas.write_pixel(x, y, &color);
            }
            canvas
        });

        let pool: Vec<_> = (0..workers).map(|n| {
            let pixel_rx = pixel_rx.clone();
            let result_tx = result_tx.clone();

            scope.spawn(move || {
                let mut shaded = 0usize;
                for (x, y) in pixel_rx.iter() {
                    let ray = camera.ray_for_pixel(x, y);
                    let color = world.color_at(&ray, depth);
                    if result_tx.send((x, y, color)).is_err() {
                        break;
                    }
                    shaded += 1;
                }
                debug!("worker {} shaded {} pixels", n, shaded);
            })
        }).collect();

        // Only the workers may hold these from here on, so the queues
        // disconnect once the pool is done.
        drop(pixel_rx);
        drop(result_tx);

        'enqueue: for y in 0..vsize {
            for x in 0..hsize {
                if pixel_tx.send((x, y)).is_err() {
                    break 'enqueue;
                }
            }
        }
        drop(pixel_tx);

        for worker in pool {
            if let Err(e) = worker.join() {
                panic::resume_unwind(e);
            }
        }

        match aggregator.join() {
            Ok(canvas) => canvas,
            Err(e) => panic::resume_unwind(e),
        }
    });

    info!("rendered {} pixels in {:.2?}", hsize * vsize, start.elapsed());
    canvas
}

#[cfg(test)]
use crate::tuple::Tuple4D;
#[cfg(test)]
use crate::shape::Shape;
#[cfg(test)]
use crate::light::Material;
#[cfg(test)]
use crate::matrix::Matrix4D;

#[cfg(test)]
fn glassy_world() -> World {
    let mut w = World::default();

    let floor = Shape::plane()
        .with_transform(Matrix4D::translation(0.0, -1.0, 0.0)).unwrap()
        .with_material(Material {
            reflective: 0.4,
            transparency: 0.5,
            refractive_index: 1.5,
            ..Default::default()
        });
    w.add_object(floor);

    let ball = Shape::sphere()
        .with_transform(Matrix4D::translation(1.5, 0.0, -1.0)).unwrap()
        .with_material(Material::glass());
    w.add_object(ball);

    w
}

#[cfg(test)]
fn test_camera() -> Camera {
    Camera::look_at(24, 16, std::f64::consts::PI / 3.0,
        Tuple4D::point(0.0, 1.5, -6.0),
        Tuple4D::point(0.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0)).unwrap()
}

#[test]
fn parallel_render_matches_single_threaded() {
    let w = glassy_world();
    let c = test_camera();
    let expected = c.render(&w);

    for workers in [1, 2, 3, 8] {
        let config = RenderConfig { workers, ..Default::default() };
        assert_eq!(multi_threaded_render(&c, &w, &config), expected);
    }
}

#[test]
fn tiny_queues_still_complete() {
    let w = World::default();
    let c = test_camera();

    let config = RenderConfig { workers: 4, queue_capacity: 1, depth: 2 };
    let canvas = multi_threaded_render(&c, &w, &config);

    assert_eq!(canvas, c.render_to_depth(&w, 2));
}

#[test]
fn zero_workers_means_one() {
    let w = World::default();
    let c = test_camera();

    let config = RenderConfig { workers: 0, queue_capacity: 0, depth: 1 };
    assert_eq!(multi_threaded_render(&c, &w, &config), c.render_to_depth(&w, 1));
}
