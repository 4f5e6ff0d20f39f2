//! Layered overlay compositing.
//!
//! Applies an ordered sequence of text and image marks onto a base image
//! with alpha blending. Overlays are applied in the order given and later
//! overlays cover earlier ones where they overlap — callers put the most
//! important mark last. A single request carries at most
//! [`MAX_OVERLAYS`] overlays and validation is all-or-nothing: nothing is
//! composited until every overlay in the request has been checked.

pub mod font;

use std::io::Cursor;
use std::str::FromStr;

use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ImprintError, Result};

/// Upper bound on overlays per compositing request.
pub const MAX_OVERLAYS: usize = 3;

/// Where an overlay is anchored on the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl Position {
    /// Resolve the top-left placement point for an overlay of size
    /// `(w, h)` on a base of size `(base_w, base_h)`.
    ///
    /// Coordinates are signed: an overlay larger than the base resolves
    /// to a negative origin and is clipped during compositing.
    pub fn resolve(self, base: (u32, u32), overlay: (u32, u32)) -> (i64, i64) {
        let (base_w, base_h) = (i64::from(base.0), i64::from(base.1));
        let (w, h) = (i64::from(overlay.0), i64::from(overlay.1));
        match self {
            Position::TopLeft => (0, 0),
            Position::TopRight => (base_w - w, 0),
            Position::BottomLeft => (0, base_h - h),
            Position::BottomRight => (base_w - w, base_h - h),
            Position::Center => ((base_w - w) / 2, (base_h - h) / 2),
        }
    }
}

impl FromStr for Position {
    type Err = ImprintError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "top-left" => Ok(Position::TopLeft),
            "top-right" => Ok(Position::TopRight),
            "bottom-left" => Ok(Position::BottomLeft),
            "bottom-right" => Ok(Position::BottomRight),
            "center" => Ok(Position::Center),
            other => Err(ImprintError::InvalidPosition(other.to_string())),
        }
    }
}

/// Overlay kind discriminant, for embedders parsing untyped requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Text,
    Image,
}

impl FromStr for OverlayKind {
    type Err = ImprintError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OverlayKind::Text),
            "image" => Ok(OverlayKind::Image),
            other => Err(ImprintError::UnknownOverlayKind(other.to_string())),
        }
    }
}

/// A single visual mark to composite onto the base image.
#[derive(Debug, Clone)]
pub enum Overlay {
    Text {
        text: String,
        position: Position,
        /// Named or `#RGB`/`#RRGGBB` hex color.
        color: String,
        /// Opacity fraction in [0, 1].
        opacity: f64,
    },
    Image {
        source: DynamicImage,
        position: Position,
        opacity: f64,
    },
}

/// Resolve a named or hex color to RGB.
///
/// Accepts `#RGB`, `#RRGGBB` and the CSS basic color names.
pub fn resolve_color(color: &str) -> Result<[u8; 3]> {
    let named = match color.to_ascii_lowercase().as_str() {
        "black" => Some([0x00, 0x00, 0x00]),
        "silver" => Some([0xC0, 0xC0, 0xC0]),
        "gray" | "grey" => Some([0x80, 0x80, 0x80]),
        "white" => Some([0xFF, 0xFF, 0xFF]),
        "maroon" => Some([0x80, 0x00, 0x00]),
        "red" => Some([0xFF, 0x00, 0x00]),
        "purple" => Some([0x80, 0x00, 0x80]),
        "fuchsia" => Some([0xFF, 0x00, 0xFF]),
        "green" => Some([0x00, 0x80, 0x00]),
        "lime" => Some([0x00, 0xFF, 0x00]),
        "olive" => Some([0x80, 0x80, 0x00]),
        "yellow" => Some([0xFF, 0xFF, 0x00]),
        "navy" => Some([0x00, 0x00, 0x80]),
        "blue" => Some([0x00, 0x00, 0xFF]),
        "teal" => Some([0x00, 0x80, 0x80]),
        "aqua" | "cyan" => Some([0x00, 0xFF, 0xFF]),
        _ => None,
    };
    if let Some(rgb) = named {
        return Ok(rgb);
    }

    let hex = color
        .strip_prefix('#')
        .ok_or_else(|| ImprintError::InvalidColor(color.to_string()))?;
    let expand = |d: u8| d << 4 | d;
    match hex.len() {
        3 => {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<_>>()
                .ok_or_else(|| ImprintError::InvalidColor(color.to_string()))?;
            Ok([expand(digits[0]), expand(digits[1]), expand(digits[2])])
        }
        6 => {
            let bytes =
                hex::decode(hex).map_err(|_| ImprintError::InvalidColor(color.to_string()))?;
            Ok([bytes[0], bytes[1], bytes[2]])
        }
        _ => Err(ImprintError::InvalidColor(color.to_string())),
    }
}

/// Uniform layer alpha for an opacity fraction.
fn opacity_alpha(opacity: f64) -> u8 {
    (255.0 * opacity.clamp(0.0, 1.0)).round() as u8
}

/// An overlay with its color resolved, ready to composite.
enum Prepared {
    Text {
        text: String,
        position: Position,
        rgb: [u8; 3],
        alpha: u8,
    },
    Image {
        source: DynamicImage,
        position: Position,
        alpha: u8,
    },
}

/// Applies ordered overlay sequences onto base images.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    pub fn new() -> Self {
        Self
    }

    /// Composite `overlays` over `base` in order, returning a new RGBA
    /// buffer. The input is never modified.
    pub fn apply(&self, base: &DynamicImage, overlays: &[Overlay]) -> Result<RgbaImage> {
        if overlays.len() > MAX_OVERLAYS {
            return Err(ImprintError::TooManyOverlays {
                count: overlays.len(),
                max: MAX_OVERLAYS,
            });
        }

        // Resolve colors and alphas for the whole request before any
        // pixel is touched.
        let prepared: Vec<Prepared> = overlays
            .iter()
            .map(|overlay| match overlay {
                Overlay::Text {
                    text,
                    position,
                    color,
                    opacity,
                } => Ok(Prepared::Text {
                    text: text.clone(),
                    position: *position,
                    rgb: resolve_color(color)?,
                    alpha: opacity_alpha(*opacity),
                }),
                Overlay::Image {
                    source,
                    position,
                    opacity,
                } => Ok(Prepared::Image {
                    source: source.clone(),
                    position: *position,
                    alpha: opacity_alpha(*opacity),
                }),
            })
            .collect::<Result<_>>()?;

        let mut canvas = base.to_rgba8();
        for overlay in prepared {
            match overlay {
                Prepared::Text {
                    text,
                    position,
                    rgb,
                    alpha,
                } => {
                    let layer = render_text(&text, rgb, alpha);
                    let (x, y) = position
                        .resolve(canvas.dimensions(), layer.dimensions());
                    tracing::debug!(%text, ?position, x, y, "applying text overlay");
                    imageops::overlay(&mut canvas, &layer, x, y);
                }
                Prepared::Image {
                    source,
                    position,
                    alpha,
                } => {
                    // Uniform alpha replaces any per-pixel alpha in the
                    // source: opacity is one scalar knob.
                    let mut layer = source.to_rgba8();
                    for pixel in layer.pixels_mut() {
                        pixel.0[3] = alpha;
                    }
                    let (x, y) = position
                        .resolve(canvas.dimensions(), layer.dimensions());
                    tracing::debug!(?position, x, y, alpha, "applying image overlay");
                    imageops::overlay(&mut canvas, &layer, x, y);
                }
            }
        }
        Ok(canvas)
    }
}

/// Rasterize a single-line string to a tight transparent layer.
fn render_text(text: &str, rgb: [u8; 3], alpha: u8) -> RgbaImage {
    let (width, height) = font::text_size(text);
    let mut layer = RgbaImage::new(width.max(1), height.max(1));
    for (i, c) in text.chars().enumerate() {
        let rows = font::glyph(c);
        for (dy, row) in rows.iter().enumerate() {
            for dx in 0..font::GLYPH_WIDTH {
                if row >> dx & 1 == 1 {
                    layer.put_pixel(
                        i as u32 * font::GLYPH_WIDTH + dx,
                        dy as u32,
                        Rgba([rgb[0], rgb[1], rgb[2], alpha]),
                    );
                }
            }
        }
    }
    layer
}

/// Re-encode a composited buffer as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ImprintError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}
