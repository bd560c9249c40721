use std::ops::{ Add, Sub, Mul };

use crate::feq;

/// A linear RGB color.
///
/// Channels are nominally in `[0, 1]`, but intermediate shading results may
/// exceed that range; values are only clamped when converted to bytes.
///
/// # Examples
///
/// ```
/// # use aun_tracer::color::Color;
/// let yellow = Color::rgb(1.0, 1.0, 0.0);
/// let purple = Color::rgb(1.0, 0.0, 1.0);
/// assert_eq!(yellow * purple, Color::red());
/// ```
#[derive(Copy, Clone, Debug, Default, PartialOrd)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Colors are compared channel-wise, within `FEQ_EPSILON`.
impl PartialEq for Color {
    fn eq(&self, other: &Color) -> bool {
        feq(self.r, other.r) &&
            feq(self.g, other.g) &&
            feq(self.b, other.b)
    }
}

impl From<[f64; 3]> for Color {
    fn from(c: [f64; 3]) -> Color {
        Color::rgb(c[0], c[1], c[2])
    }
}

impl Color {
    pub const fn rgb(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b }
    }

    pub const fn black() -> Color {
        Color::rgb(0.0, 0.0, 0.0)
    }

    pub const fn white() -> Color {
        Color::rgb(1.0, 1.0, 1.0)
    }

    pub const fn red() -> Color {
        Color::rgb(1.0, 0.0, 0.0)
    }

    pub const fn green() -> Color {
        Color::rgb(0.0, 1.0, 0.0)
    }

    pub const fn blue() -> Color {
        Color::rgb(0.0, 0.0, 1.0)
    }

    /// Multiplies two colors channel by channel.
    pub fn hadamard(c1: &Color, c2: &Color) -> Color {
        Color::rgb(c1.r * c2.r, c1.g * c2.g, c1.b * c2.b)
    }

    /// Converts to 8-bit channels: clamp to `[0, 1]`, scale to 255, and round
    /// to the nearest integer.
    ///
    /// ```
    /// # use aun_tracer::color::Color;
    /// assert_eq!(Color::rgb(1.5, 0.5, -0.5).to_bytes(), [255, 128, 0]);
    /// ```
    pub fn to_bytes(&self) -> [u8; 3] {
        let byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [byte(self.r), byte(self.g), byte(self.b)]
    }

    /// The inverse of `to_bytes` for a given maximum channel value.
    pub fn from_bytes(channels: [u16; 3], max: u16) -> Color {
        let max = f64::from(max);
        Color::rgb(
            f64::from(channels[0]) / max,
            f64::from(channels[1]) / max,
            f64::from(channels[2]) / max,
        )
    }
}

impl Add<Color> for Color {
    type Output = Color;

    fn add(self, other: Color) -> Self::Output {
        Color::rgb(self.r + other.r, self.g + other.g, self.b + other.b)
    }
}

impl Sub<Color> for Color {
    type Output = Color;

    fn sub(self, other: Color) -> Self::Output {
        Color::rgb(self.r - other.r, self.g - other.g, self.b - other.b)
    }
}

impl Mul<f64> for Color {
    type Output = Color;

    fn mul(self, other: f64) -> Self::Output {
        Color::rgb(self.r * other, self.g * other, self.b * other)
    }
}

impl Mul<Color> for f64 {
    type Output = Color;

    fn mul(self, other: Color) -> Self::Output {
        other * self
    }
}

/// Shorthand for `Color::hadamard`.
impl Mul<Color> for Color {
    type Output = Color;

    fn mul(self, other: Color) -> Self::Output {
        Color::hadamard(&self, &other)
    }
}

#[test]
fn add_colors() {
    let c1 = Color::rgb(0.9, 0.6, 0.75);
    let c2 = Color::rgb(0.7, 0.1, 0.25);

    assert_eq!(c1 + c2, Color::rgb(1.6, 0.7, 1.0));
}

#[test]
fn subtract_colors() {
    let c1 = Color::rgb(0.9, 0.6, 0.75);
    let c2 = Color::rgb(0.7, 0.1, 0.25);

    assert_eq!(c1 - c2, Color::rgb(0.2, 0.5, 0.5));
}

#[test]
fn scale_color() {
    let c = Color::rgb(0.2, 0.3, 0.4);

    assert_eq!(c * 2.0, Color::rgb(0.4, 0.6, 0.8));
    assert_eq!(2.0 * c, Color::rgb(0.4, 0.6, 0.8));
}

#[test]
fn multiply_colors() {
    let c1 = Color::rgb(1.0, 0.2, 0.4);
    let c2 = Color::rgb(0.9, 1.0, 0.1);

    assert_eq!(c1 * c2, Color::rgb(0.9, 0.2, 0.04));
}

#[test]
fn bytes_are_clamped_and_rounded() {
    assert_eq!(Color::black().to_bytes(), [0, 0, 0]);
    assert_eq!(Color::white().to_bytes(), [255, 255, 255]);
    assert_eq!(Color::rgb(0.5, 0.0019, 0.0021).to_bytes(), [128, 0, 1]);
    assert_eq!(Color::rgb(2.0, -1.0, 1.0001).to_bytes(), [255, 0, 255]);
}

#[test]
fn bytes_round_trip() {
    for v in [0u16, 1, 127, 128, 254, 255].iter() {
        let c = Color::from_bytes([*v, *v, *v], 255);
        assert_eq!(c.to_bytes(), [*v as u8; 3]);
    }
}
