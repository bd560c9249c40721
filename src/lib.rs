pub mod error;
pub mod consts;

pub mod tuple;
pub mod matrix;
pub mod ray;

pub mod color;
pub mod pattern;
pub mod light;

pub mod shape;
pub mod intersect;
pub mod world;
pub mod camera;

pub mod canvas;
pub mod parallel;

pub mod obj;
pub mod scene;
pub mod scenes;

/// Approximate float equality, used by the `PartialEq` impls of the
/// geometric types.
pub fn feq(left: f64, right: f64) -> bool {
    (left - right).abs() < consts::FEQ_EPSILON
}
