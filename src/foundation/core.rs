use crate::foundation::math::{premul_u8, unpremul_u8};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Straight-alpha RGBA8 color as it appears in markup (`flood-color`, fills, tile ink).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel, not premultiplied into `r`, `g`, `b`.
    pub a: u8,
}

impl Rgba {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Build a color from straight-alpha channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Build an opaque color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Scale alpha by `factor` (clamped to `[0, 1]`).
    pub fn with_alpha_factor(self, factor: f64) -> Self {
        let f = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self {
            a: (f64::from(self.a) * f).round() as u8,
            ..self
        }
    }

    /// Alpha as a unit fraction.
    pub fn alpha_f64(self) -> f64 {
        f64::from(self.a) / 255.0
    }

    /// `RRGGBB` hex form used by `a:srgbClr`.
    pub fn hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Premultiplied `[r, g, b, a]`.
    pub fn premultiplied(self) -> [u8; 4] {
        [
            premul_u8(self.r, self.a),
            premul_u8(self.g, self.a),
            premul_u8(self.b, self.a),
            self.a,
        ]
    }

    /// Inverse of [`Rgba::premultiplied`].
    pub fn from_premultiplied(px: [u8; 4]) -> Self {
        let a = px[3];
        Self::new(
            unpremul_u8(px[0], a),
            unpremul_u8(px[1], a),
            unpremul_u8(px[2], a),
            a,
        )
    }

    /// Channels as unit floats `[r, g, b, a]`.
    pub fn to_unit(self) -> [f64; 4] {
        [
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
            f64::from(self.a) / 255.0,
        ]
    }

    /// Build from unit floats, clamping each channel.
    pub fn from_unit(c: [f64; 4]) -> Self {
        use crate::foundation::math::unit_to_u8;
        Self::new(
            unit_to_u8(c[0]),
            unit_to_u8(c[1]),
            unit_to_u8(c[2]),
            unit_to_u8(c[3]),
        )
    }
}

/// Premultiplied RGBA8 raster.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterImage {
    pixels: image::RgbaImage,
}

impl RasterImage {
    /// Transparent raster of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: image::RgbaImage::new(width, height),
        }
    }

    /// Build a raster from a per-pixel function returning premultiplied RGBA.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        Self {
            pixels: image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(f(x, y))),
        }
    }

    /// Wrap a premultiplied RGBA8 buffer. Returns `None` on a length mismatch.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        image::RgbaImage::from_raw(width, height, data).map(|pixels| Self { pixels })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// `width * height` without overflow.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    /// Overwrite the premultiplied pixel at `(x, y)`.
    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        self.pixels.put_pixel(x, y, image::Rgba(px));
    }

    /// Row-major premultiplied bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consume into row-major premultiplied bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels.into_raw()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
