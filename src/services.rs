//! Host-provided services.
//!
//! The converter never does unit math or color-string parsing on its own. The embedding
//! presentation writer supplies a [`ConversionServices`] implementation together with a
//! [`MediaRegistry`] that receives encoded EMF parts.

use std::sync::Mutex;
use std::sync::PoisonError;

use kurbo::Shape;

use crate::cache::store::{CacheKey, EmfRef};
use crate::foundation::core::{Affine, BezPath, Rect, Rgba};

/// EMU per CSS pixel at 96 DPI.
pub const EMU_PER_PX: f64 = 9525.0;

/// Transfer functions of the color space filters run in.
pub trait ColorSpace: Send + Sync {
    /// Stable name of the transfer curve. Raster cache keys include it.
    fn id(&self) -> &str;
    /// sRGB-encoded unit value to linear light.
    fn to_linear(&self, c: f64) -> f64;
    /// Linear light unit value back to sRGB encoding.
    fn to_srgb(&self, c: f64) -> f64;

    /// Rec. 709 luminance of linear components.
    fn luminance(&self, r: f64, g: f64, b: f64) -> f64 {
        0.2125 * r + 0.7154 * g + 0.0721 * b
    }
}

/// The standard sRGB transfer curve.
#[derive(Clone, Copy, Debug, Default)]
pub struct SrgbColorSpace;

impl ColorSpace for SrgbColorSpace {
    fn id(&self) -> &str {
        "srgb"
    }

    fn to_linear(&self, c: f64) -> f64 {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    fn to_srgb(&self, c: f64) -> f64 {
        if c <= 0.003_130_8 {
            c * 12.92
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        }
    }
}

/// Unit conversion, color parsing and transform context for one conversion.
pub trait ConversionServices: Send + Sync {
    /// Convert a user-space length to EMU.
    fn to_emu(&self, length: f64) -> i64;
    /// Parse a CSS/SVG color value. `None` when unparseable.
    fn parse_color(&self, value: &str) -> Option<Rgba>;
    /// User space to slide space transform of the element being converted.
    fn current_transform(&self) -> Affine;
    /// Color space used for `linearRGB` filter math.
    fn color_space(&self) -> &dyn ColorSpace;
}

/// Default services: 96 DPI pixels, an identity transform and sRGB.
#[derive(Clone, Debug)]
pub struct StandardServices {
    emu_per_unit: f64,
    transform: Affine,
    color_space: SrgbColorSpace,
}

impl Default for StandardServices {
    fn default() -> Self {
        Self {
            emu_per_unit: EMU_PER_PX,
            transform: Affine::IDENTITY,
            color_space: SrgbColorSpace,
        }
    }
}

impl StandardServices {
    /// Services with a non-identity user-to-slide transform.
    pub fn with_transform(transform: Affine) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    /// Override the EMU per user unit scale.
    pub fn with_emu_per_unit(mut self, emu_per_unit: f64) -> Self {
        self.emu_per_unit = emu_per_unit;
        self
    }
}

impl ConversionServices for StandardServices {
    fn to_emu(&self, length: f64) -> i64 {
        if !length.is_finite() {
            return 0;
        }
        (length * self.emu_per_unit).round() as i64
    }

    fn parse_color(&self, value: &str) -> Option<Rgba> {
        parse_css_color(value)
    }

    fn current_transform(&self) -> Affine {
        self.transform
    }

    fn color_space(&self) -> &dyn ColorSpace {
        &self.color_space
    }
}

/// Parse the color forms that show up in filter markup: hex, `rgb()`/`rgba()` and a small set
/// of keywords.
pub fn parse_css_color(value: &str) -> Option<Rgba> {
    let v = value.trim();
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = v.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|s| s.strip_suffix(')'))
    {
        return parse_rgb_args(args);
    }
    let named = match lower.as_str() {
        "black" => Rgba::BLACK,
        "white" => Rgba::WHITE,
        "red" => Rgba::opaque(255, 0, 0),
        "green" => Rgba::opaque(0, 128, 0),
        "lime" => Rgba::opaque(0, 255, 0),
        "blue" => Rgba::opaque(0, 0, 255),
        "yellow" => Rgba::opaque(255, 255, 0),
        "cyan" | "aqua" => Rgba::opaque(0, 255, 255),
        "magenta" | "fuchsia" => Rgba::opaque(255, 0, 255),
        "gray" | "grey" => Rgba::opaque(128, 128, 128),
        "silver" => Rgba::opaque(192, 192, 192),
        "orange" => Rgba::opaque(255, 165, 0),
        "navy" => Rgba::opaque(0, 0, 128),
        "none" | "transparent" => Rgba::TRANSPARENT,
        _ => return None,
    };
    Some(named)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let nib = |c: u8| -> Option<u8> { (c as char).to_digit(16).map(|d| d as u8) };
    let b = hex.as_bytes();
    match b.len() {
        3 | 4 => {
            let mut ch = [255u8; 4];
            for (i, &c) in b.iter().enumerate() {
                let n = nib(c)?;
                ch[i] = n * 17;
            }
            Some(Rgba::new(ch[0], ch[1], ch[2], ch[3]))
        }
        6 | 8 => {
            let mut ch = [255u8; 4];
            for (i, pair) in b.chunks_exact(2).enumerate() {
                ch[i] = nib(pair[0])? * 16 + nib(pair[1])?;
            }
            Some(Rgba::new(ch[0], ch[1], ch[2], ch[3]))
        }
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Rgba> {
    let parts: Vec<&str> = args
        .split([',', ' ', '/'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| -> Option<u8> {
        if let Some(p) = s.strip_suffix('%') {
            let v: f64 = p.parse().ok()?;
            Some((v.clamp(0.0, 100.0) * 2.55).round() as u8)
        } else {
            let v: f64 = s.parse().ok()?;
            Some(v.clamp(0.0, 255.0).round() as u8)
        }
    };
    let alpha = match parts.get(3) {
        None => 255,
        Some(s) => {
            if let Some(p) = s.strip_suffix('%') {
                let v: f64 = p.parse().ok()?;
                (v.clamp(0.0, 100.0) * 2.55).round() as u8
            } else {
                let v: f64 = s.parse().ok()?;
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        }
    };
    Some(Rgba::new(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ))
}

/// Stroke paint of the element being filtered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    /// Stroke colour before element opacity.
    pub color: Rgba,
    /// User units.
    pub width: f64,
}

/// Geometry and paint of the element a filter is applied to, in user units.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeContext {
    /// Outline in user units.
    pub geometry: BezPath,
    /// `None` for `fill="none"`.
    pub fill: Option<Rgba>,
    /// `None` when the element is not stroked.
    pub stroke: Option<StrokeStyle>,
    /// Element opacity in `[0, 1]`.
    pub opacity: f64,
}

impl ShapeContext {
    /// Black-filled shape, matching the SVG initial `fill`.
    pub fn new(geometry: BezPath) -> Self {
        Self {
            geometry,
            fill: Some(Rgba::BLACK),
            stroke: None,
            opacity: 1.0,
        }
    }

    /// Axis-aligned rectangle.
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Rect::new(x, y, x + width, y + height).to_path(0.1))
    }

    /// Replace the fill paint.
    pub fn with_fill(mut self, fill: Option<Rgba>) -> Self {
        self.fill = fill;
        self
    }

    /// Replace the stroke.
    pub fn with_stroke(mut self, stroke: Option<StrokeStyle>) -> Self {
        self.stroke = stroke;
        self
    }

    /// Set element opacity, clamped by consumers to `[0, 1]`.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Geometry bounds grown by half the stroke width.
    pub fn bounds(&self) -> Rect {
        let b = self.geometry.bounding_box();
        match &self.stroke {
            Some(s) if s.width > 0.0 => b.inflate(s.width / 2.0, s.width / 2.0),
            _ => b,
        }
    }

    /// The dominant paint (fill, else stroke), with element opacity applied.
    pub fn paint(&self) -> Rgba {
        let base = self
            .fill
            .or(self.stroke.map(|s| s.color))
            .unwrap_or(Rgba::TRANSPARENT);
        base.with_alpha_factor(self.opacity)
    }
}

/// Opaque relationship id returned by the host when an EMF part is registered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct RelationshipId(pub String);

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receives encoded EMF parts for the package manifest.
///
/// A registry stands for one package part. Relationship ids are only meaningful inside the
/// registry that issued them, so the converter asks each registry separately.
pub trait MediaRegistry: Send + Sync {
    /// Relationship id this registry already issued for `key`, if any.
    fn relationship_for(&self, key: CacheKey) -> Option<RelationshipId>;

    /// Register one EMF part and return the relationship id to embed.
    fn register_media(&self, emf: &EmfRef, bytes: &[u8]) -> RelationshipId;
}

/// One part recorded by [`InMemoryMediaRegistry`].
#[derive(Clone, Debug)]
pub struct MediaPart {
    /// Cache key of the blob.
    pub key: CacheKey,
    /// Package part name, e.g. `ppt/media/drawfx1.emf`.
    pub part_name: String,
    /// Relationship id handed back to the emitter.
    pub relationship: RelationshipId,
    /// Encoded EMF bytes.
    pub bytes: Vec<u8>,
}

/// [`MediaRegistry`] that keeps parts in memory. Useful for tests and for hosts that assemble the
/// package afterwards.
#[derive(Debug, Default)]
pub struct InMemoryMediaRegistry {
    parts: Mutex<Vec<MediaPart>>,
}

impl InMemoryMediaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered parts.
    pub fn len(&self) -> usize {
        self.parts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` before the first registration.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of registered parts in registration order.
    pub fn parts(&self) -> Vec<MediaPart> {
        self.parts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MediaRegistry for InMemoryMediaRegistry {
    fn relationship_for(&self, key: CacheKey) -> Option<RelationshipId> {
        let parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        parts
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.relationship.clone())
    }

    fn register_media(&self, emf: &EmfRef, bytes: &[u8]) -> RelationshipId {
        let mut parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = parts.iter().find(|p| p.key == emf.key()) {
            return existing.relationship.clone();
        }
        let n = parts.len() + 1;
        let relationship = RelationshipId(format!("rIdFx{n}"));
        tracing::debug!(key = %emf.key(), part = n, "registered emf part");
        parts.push(MediaPart {
            key: emf.key(),
            part_name: format!("ppt/media/drawfx{n}.emf"),
            relationship: relationship.clone(),
            bytes: bytes.to_vec(),
        });
        relationship
    }
}

#[cfg(test)]
#[path = "../tests/unit/services.rs"]
mod tests;
