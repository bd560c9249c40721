use crate::feq;
use crate::error::Result;
use crate::tuple::Tuple4D;
use crate::color::Color;
use crate::matrix::Matrix4D;

/// The procedural color functions a pattern can evaluate.
///
/// Each variant is a pure function of a point in pattern space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PatternKind {
    /// A single color everywhere.
    Solid(Color),

    /// Alternates between two colors along X, one unit per stripe.
    Stripe(Color, Color),

    /// Concentric rings about the Y axis.
    Ring(Color, Color),

    /// Linear blend from the first color to the second across each unit of X.
    Gradient(Color, Color),

    /// A 3D checkerboard of unit cubes.
    Checker(Color, Color),
}

/// A procedural pattern with its own transform.
///
/// Patterns live in their own space. A world point is first mapped into the
/// owning shape's object space, then through the pattern's inverse
/// transform, before the pattern function is evaluated.
///
/// # Examples
///
/// ```
/// # use aun_tracer::color::Color;
/// # use aun_tracer::tuple::Tuple4D;
/// # use aun_tracer::pattern::Pattern;
/// let p = Pattern::stripe(Color::white(), Color::black());
/// assert_eq!(p.pattern_at(Tuple4D::point(0.5, 0.0, 0.0)), Color::white());
/// assert_eq!(p.pattern_at(Tuple4D::point(1.5, 0.0, 0.0)), Color::black());
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,

    transform: Matrix4D,
    inverse: Matrix4D,
}

/// True when `v` is an even integer (after flooring by the caller).
fn is_even(v: f64) -> bool {
    feq(v.rem_euclid(2.0), 0.0)
}

impl Pattern {
    pub fn new(kind: PatternKind) -> Pattern {
        Pattern {
            kind,
            transform: Matrix4D::identity(),
            inverse: Matrix4D::identity(),
        }
    }

    pub fn solid(c: Color) -> Pattern {
        Self::new(PatternKind::Solid(c))
    }

    pub fn stripe(a: Color, b: Color) -> Pattern {
        Self::new(PatternKind::Stripe(a, b))
    }

    pub fn ring(a: Color, b: Color) -> Pattern {
        Self::new(PatternKind::Ring(a, b))
    }

    pub fn gradient(a: Color, b: Color) -> Pattern {
        Self::new(PatternKind::Gradient(a, b))
    }

    pub fn checker(a: Color, b: Color) -> Pattern {
        Self::new(PatternKind::Checker(a, b))
    }

    pub fn transform(&self) -> &Matrix4D {
        &self.transform
    }

    pub fn inverse(&self) -> &Matrix4D {
        &self.inverse
    }

    /// Replaces the pattern transform, refreshing the cached inverse.
    ///
    /// Leaves the pattern untouched if `transform` is not invertible.
    pub fn set_transform(&mut self, transform: Matrix4D) -> Result<()> {
        self.inverse = transform.inverse()?;
        self.transform = transform;
        Ok(())
    }

    /// Builder form of `set_transform`.
    pub fn with_transform(mut self, transform: Matrix4D) -> Result<Pattern> {
        self.set_transform(transform)?;
        Ok(self)
    }

    /// Evaluates the pattern at a point already in pattern space.
    pub fn pattern_at(&self, p: Tuple4D) -> Color {
        match self.kind {
            PatternKind::Solid(c) => c,

            PatternKind::Stripe(a, b) => {
                if is_even(p.x.floor()) { a } else { b }
            },

            PatternKind::Ring(a, b) => {
                let distance = (p.x.powi(2) + p.z.powi(2)).sqrt();
                if is_even(distance.floor()) { a } else { b }
            },

            PatternKind::Gradient(a, b) => {
                let fraction = p.x - p.x.floor();
                a + (b - a) * fraction
            },

            PatternKind::Checker(a, b) => {
                let sum = p.x.floor() + p.y.floor() + p.z.floor();
                if is_even(sum) { a } else { b }
            },
        }
    }

    /// Evaluates the pattern at a point in the owning shape's object space.
    pub fn pattern_at_object(&self, object_point: Tuple4D) -> Color {
        self.pattern_at(self.inverse * object_point)
    }
}

#[cfg(test)]
fn white() -> Color { Color::white() }

#[cfg(test)]
fn black() -> Color { Color::black() }

#[test]
fn stripe_pattern_is_constant_along_y_and_z() {
    let pattern = Pattern::stripe(white(), black());

    for i in 0..3 {
        let v = i as f64;
        assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, v, 0.0)), white());
        assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.0, v)), white());
    }
}

#[test]
fn stripe_pattern_alternates_along_x() {
    let pattern = Pattern::stripe(white(), black());

    assert_eq!(pattern.pattern_at(Tuple4D::point( 0.0, 0.0, 0.0)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point( 0.9, 0.0, 0.0)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point( 1.0, 0.0, 0.0)), black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(-0.1, 0.0, 0.0)), black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(-1.0, 0.0, 0.0)), black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(-1.1, 0.0, 0.0)), white());
}

#[test]
fn gradient_interpolates_between_colors() {
    let pattern = Pattern::gradient(white(), black());

    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.0, 0.0)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.25, 0.0, 0.0)),
        Color::rgb(0.75, 0.75, 0.75));
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.5, 0.0, 0.0)),
        Color::rgb(0.5, 0.5, 0.5));
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.75, 0.0, 0.0)),
        Color::rgb(0.25, 0.25, 0.25));
}

#[test]
fn ring_extends_in_x_and_z() {
    let pattern = Pattern::ring(white(), black());

    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.0, 0.0)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point(1.0, 0.0, 0.0)), black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.0, 1.0)), black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.708, 0.0, 0.708)), black());
}

#[test]
fn checkers_repeat_in_each_dimension() {
    let pattern = Pattern::checker(white(), black());

    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.0, 0.0)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.99, 0.0, 0.0)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point(1.01, 0.0, 0.0)), black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.99, 0.0)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 1.01, 0.0)), black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.0, 0.99)), white());
    assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, 0.0, 1.01)), black());
}

#[test]
fn solid_is_constant() {
    let pattern = Pattern::solid(Color::rgb(0.1, 0.2, 0.3));

    assert_eq!(pattern.pattern_at(Tuple4D::point(5.0, -3.0, 1.5)),
        Color::rgb(0.1, 0.2, 0.3));
}

#[test]
fn pattern_transform_applies_in_object_space() {
    let pattern = Pattern::stripe(white(), black())
        .with_transform(Matrix4D::scaling(2.0, 2.0, 2.0))
        .unwrap();

    assert_eq!(pattern.pattern_at_object(Tuple4D::point(1.5, 0.0, 0.0)),
        white());
    assert_eq!(pattern.pattern_at_object(Tuple4D::point(2.5, 0.0, 0.0)),
        black());
}

#[test]
fn singular_pattern_transform_is_rejected() {
    let mut pattern = Pattern::stripe(white(), black());
    let before = pattern;

    assert!(pattern.set_transform(Matrix4D::scaling(0.0, 1.0, 1.0)).is_err());
    assert_eq!(pattern, before);
}
