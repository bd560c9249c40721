use std::io::{ self, Read, Write, BufWriter };
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use log::info;

use crate::error::{ Result, TracerError };
use crate::color::Color;

/// The image encodings a `Canvas` can be saved in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// Plain-text `P3` pixel map.
    Ppm,

    /// Binary `P6` pixel map.
    PpmBinary,
}

impl ImageFormat {
    /// File extension for the format. Both pixel map flavours share one.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Ppm | ImageFormat::PpmBinary => "ppm",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<ImageFormat, String> {
        match s {
            "ppm" => Ok(ImageFormat::Ppm),
            "ppm-binary" => Ok(ImageFormat::PpmBinary),
            other => Err(format!(
                "unknown image format '{}' (expected ppm or ppm-binary)", other
            )),
        }
    }
}

/// A canvas for drawing pixels.
///
/// This structure stores the results of the ray tracer, one `Color` per
/// pixel in row-major order with row 0 at the top. Once rendering finishes
/// the canvas can be encoded as a pixel map.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Canvas {
    /// The width of the canvas, in pixels.
    pub width: usize,

    /// The height of the canvas, in pixels.
    pub height: usize,

    /// The pixels of the canvas, stored as a flattened vector.
    pixels: Vec<Color>,
}

impl Canvas {
    /// Creates a black canvas with specified width and height.
    pub fn new(width: usize, height: usize) -> Canvas {
        Canvas {
            width,
            height,
            pixels: vec![Color::black(); width * height],
        }
    }

    /// Writes a color to a location on the `Canvas`.
    ///
    /// Out-of-bounds pixels are ignored. `x` is the column and `y` the row,
    /// both zero-indexed.
    ///
    /// # Examples
    ///
    /// Writing a pixel to the fourth column, second row on an 8-by-8 canvas:
    ///
    /// ```
    /// # use aun_tracer::color::Color;
    /// # use aun_tracer::canvas::Canvas;
    /// let purple = Color::rgb(1.0, 0.0, 1.0);
    /// let mut canvas = Canvas::new(8, 8);
    /// canvas.write_pixel(4, 2, &purple);
    /// assert_eq!(canvas.read_pixel(4, 2).unwrap(), purple);
    /// assert_eq!(canvas.read_pixel(8, 2), None);
    /// ```
    pub fn write_pixel(&mut self, x: usize, y: usize, pixel: &Color) {
        if x >= self.width || y >= self.height {
            return;
        }

        self.pixels[(y * self.width) + x] = *pixel;
    }

    /// Reads a color from a location on the `Canvas`, or `None` when the
    /// location is out of bounds.
    pub fn read_pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }

        Some(self.pixels[(y * self.width) + x])
    }

    fn write_header<W: Write>(&self, out: &mut W, magic: &str) -> io::Result<()> {
        writeln!(out, "{}", magic)?;
        writeln!(out, "{} {}", self.width, self.height)?;
        writeln!(out, "255")
    }

    /// Encodes the canvas as a plain `P3` pixel map, one pixel per line.
    pub fn write_ppm<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.write_header(out, "P3")?;
        for pixel in self.pixels.iter() {
            let [r, g, b] = pixel.to_bytes();
            writeln!(out, "{} {} {}", r, g, b)?;
        }

        Ok(())
    }

    /// Encodes the canvas as a binary `P6` pixel map.
    pub fn write_ppm_binary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.write_header(out, "P6")?;
        for pixel in self.pixels.iter() {
            out.write_all(&pixel.to_bytes())?;
        }

        Ok(())
    }

    /// Encodes the canvas in `format`.
    pub fn write_image<W: Write>(&self, out: &mut W, format: ImageFormat)
        -> io::Result<()> {
        match format {
            ImageFormat::Ppm => self.write_ppm(out),
            ImageFormat::PpmBinary => self.write_ppm_binary(out),
        }
    }

    /// Saves the canvas to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ImageFormat)
        -> Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(File::create(path)?);

        self.write_image(&mut out, format)?;
        out.flush()?;

        info!("saved {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }

    /// Decodes a `P3` or `P6` pixel map.
    ///
    /// Header comments starting with `#` are skipped. Channels are scaled by
    /// the map's maximum value, so a canvas written by `write_ppm` reads back
    /// with the same 8-bit values.
    pub fn read_ppm<R: Read>(input: &mut R) -> Result<Canvas> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;

        let mut tokens = PpmTokens { data: &data, pos: 0 };
        let binary = match tokens.next_token() {
            Some(b"P3") => false,
            Some(b"P6") => true,
            _ => return Err(TracerError::Ppm("missing P3 or P6 magic".into())),
        };

        let width = tokens.next_number("width")? as usize;
        let height = tokens.next_number("height")? as usize;
        let max = tokens.next_number("maximum value")?;
        if max == 0 || max > u32::from(u16::MAX) {
            return Err(TracerError::Ppm(format!("invalid maximum value {}", max)));
        }
        let max = max as u16;
        if binary {
            tokens.begin_raster()?;
        }

        // Every sample takes at least one byte in either encoding, so a
        // size the remaining data cannot hold is rejected before allocating.
        let sample_bytes = if binary && max > 255 { 2 } else { 1 };
        let needed = width.checked_mul(height)
            .and_then(|n| n.checked_mul(3 * sample_bytes));
        match needed {
            Some(n) if n <= tokens.remaining() => (),
            _ => return Err(TracerError::Ppm(format!(
                "{}x{} image does not fit in the remaining data", width, height
            ))),
        }

        let mut canvas = Canvas::new(width, height);
        for i in 0..width * height {
            let mut channels = [0u16; 3];
            for c in channels.iter_mut() {
                *c = if binary {
                    tokens.next_raw(max)?
                } else {
                    let v = tokens.next_number("pixel value")?;
                    if v > u32::from(max) {
                        return Err(TracerError::Ppm(
                            format!("pixel value {} exceeds maximum {}", v, max)
                        ));
                    }
                    v as u16
                };
            }

            canvas.pixels[i] = Color::from_bytes(channels, max);
        }

        Ok(canvas)
    }
}

/// Reads header tokens and raster data out of a pixel map.
struct PpmTokens<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PpmTokens<'a> {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if b == b'#' {
                while self.pos < self.data.len() && self.data[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Option<&'a [u8]> {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        while self.pos < self.data.len()
            && !self.data[self.pos].is_ascii_whitespace()
            && self.data[self.pos] != b'#' {
            self.pos += 1;
        }

        if start == self.pos { None } else { Some(&self.data[start..self.pos]) }
    }

    fn next_number(&mut self, what: &str) -> Result<u32> {
        let token = self.next_token().ok_or_else(||
            TracerError::Ppm(format!("unexpected end of data reading {}", what))
        )?;

        std::str::from_utf8(token).ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| TracerError::Ppm(format!(
                "invalid {} '{}'", what, String::from_utf8_lossy(token)
            )))
    }

    /// Skips the single whitespace byte separating a binary header from
    /// its raster.
    fn begin_raster(&mut self) -> Result<()> {
        match self.data.get(self.pos) {
            Some(b) if b.is_ascii_whitespace() => {
                self.pos += 1;
                Ok(())
            },
            _ => Err(TracerError::Ppm("missing whitespace after header".into())),
        }
    }

    /// Reads one binary sample, two bytes big-endian when `max` exceeds 255.
    fn next_raw(&mut self, max: u16) -> Result<u16> {
        let width = if max < 256 { 1 } else { 2 };
        let bytes = self.data.get(self.pos..self.pos + width).ok_or_else(||
            TracerError::Ppm("raster data is truncated".into())
        )?;
        self.pos += width;

        Ok(bytes.iter().fold(0u16, |acc, &b| (acc << 8) | u16::from(b)))
    }
}

#[cfg(test)]
fn sample_canvas() -> Canvas {
    let mut c = Canvas::new(5, 3);
    c.write_pixel(0, 0, &Color::rgb(1.5, 0.0, 0.0));
    c.write_pixel(2, 1, &Color::rgb(0.0, 0.5, 0.0));
    c.write_pixel(4, 2, &Color::rgb(-0.5, 0.0, 1.0));
    c
}

#[test]
fn new_canvas_is_black() {
    let c = Canvas::new(10, 20);

    assert_eq!(c.width, 10);
    assert_eq!(c.height, 20);
    for y in 0..20 {
        for x in 0..10 {
            assert_eq!(c.read_pixel(x, y), Some(Color::black()));
        }
    }
}

#[test]
fn out_of_bounds_writes_are_ignored() {
    let mut c = Canvas::new(2, 2);
    c.write_pixel(2, 0, &Color::red());
    c.write_pixel(0, 2, &Color::red());

    assert_eq!(c, Canvas::new(2, 2));
}

#[test]
fn ppm_header_and_pixels() {
    let mut out = Vec::new();
    sample_canvas().write_ppm(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(&lines[..3], &["P3", "5 3", "255"]);
    assert_eq!(lines.len(), 3 + 15);
    assert_eq!(lines[3], "255 0 0");
    assert_eq!(lines[3 + 7], "0 128 0");
    assert_eq!(lines[3 + 14], "0 0 255");
    assert!(text.ends_with('\n'));
}

#[test]
fn ppm_round_trip_is_byte_identical() {
    let mut c = Canvas::new(4, 3);
    for y in 0..3 {
        for x in 0..4 {
            let v = (x * 3 + y) as f64 / 11.0;
            c.write_pixel(x, y, &Color::rgb(v, 1.0 - v, v * 0.37));
        }
    }

    for format in [ImageFormat::Ppm, ImageFormat::PpmBinary] {
        let mut first = Vec::new();
        c.write_image(&mut first, format).unwrap();

        let decoded = Canvas::read_ppm(&mut io::Cursor::new(&first)).unwrap();
        assert_eq!((decoded.width, decoded.height), (4, 3));

        let mut second = Vec::new();
        decoded.write_image(&mut second, format).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn read_ppm_skips_comments() {
    let text = "P3\n# made by hand\n2 1 # size\n255\n255 0 0\n0 0 255\n";
    let c = Canvas::read_ppm(&mut text.as_bytes()).unwrap();

    assert_eq!(c.read_pixel(0, 0), Some(Color::red()));
    assert_eq!(c.read_pixel(1, 0), Some(Color::blue()));
}

#[test]
fn read_ppm_scales_by_maximum_value() {
    let text = "P3\n1 1\n100\n100 50 0\n";
    let c = Canvas::read_ppm(&mut text.as_bytes()).unwrap();

    assert_eq!(c.read_pixel(0, 0), Some(Color::rgb(1.0, 0.5, 0.0)));
}

#[test]
fn read_ppm_rejects_bad_input() {
    let bad = [
        "P5\n1 1\n255\n0\n",
        "P3\n1 1\n255\n0 0\n",
        "P3\n1 1\n255\n0 0 256\n",
        "P3\n1 x\n255\n",
        "P3\n1 1\n0\n0 0 0\n",
        "P3\n4294967295 4294967295 255\n0 0 0\n",
        "P3\n100000 100000 255\n0 0 0\n",
        "P6\n2 1\n65535\n\x00\x01\x02\x03\x04\x05",
    ];

    for text in bad.iter() {
        assert!(matches!(Canvas::read_ppm(&mut text.as_bytes()),
            Err(TracerError::Ppm(_))), "accepted {:?}", text);
    }

    let truncated = b"P6\n2 1\n255\n\x01\x02\x03";
    assert!(Canvas::read_ppm(&mut &truncated[..]).is_err());
}

#[test]
fn format_names() {
    assert_eq!("ppm".parse::<ImageFormat>(), Ok(ImageFormat::Ppm));
    assert_eq!("ppm-binary".parse::<ImageFormat>(), Ok(ImageFormat::PpmBinary));
    assert!("jpeg".parse::<ImageFormat>().is_err());

    assert_eq!(ImageFormat::Ppm.extension(), "ppm");
    assert_eq!(ImageFormat::PpmBinary.extension(), "ppm");
}
