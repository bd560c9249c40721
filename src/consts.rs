// Runtime defaults
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_WIDTH: usize = 640;
pub const ASPECT_RATIO: f64 = 16.0 / 9.0;
pub const OUT_FILE: &str = "out";

// Floating point comparisons
pub const FEQ_EPSILON: f64 = 0.0001;

// Offset used to lift secondary rays off a surface, and to reject
// near-degenerate quadratic and triangle determinants.
pub const EPSILON: f64 = 0.00000001;

// Rays closer than this to parallel with a plane never hit it.
pub const PLANE_EPSILON: f64 = 0.00001;

// Maximum recursion depth for reflection and refraction
pub const RECURSION_DEPTH: usize = 5;

// Refractive index of empty space, outside every object
pub const VACUUM_RI: f64 = 1.0;
