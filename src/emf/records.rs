//! EMF record types, GDI constants and their little-endian serialization.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::foundation::core::{RasterImage, Rgba};
use crate::foundation::error::EncodeError;

/// Record type of `EMR_HEADER`.
pub const EMR_HEADER: u32 = 1;
/// `EMR_EOF`.
pub const EMR_EOF: u32 = 14;
/// `EMR_SETBKMODE`.
pub const EMR_SETBKMODE: u32 = 18;
/// `EMR_SETPOLYFILLMODE`.
pub const EMR_SETPOLYFILLMODE: u32 = 19;
/// `EMR_INTERSECTCLIPRECT`.
pub const EMR_INTERSECTCLIPRECT: u32 = 30;
/// `EMR_SELECTOBJECT`.
pub const EMR_SELECTOBJECT: u32 = 37;
/// `EMR_CREATEPEN`.
pub const EMR_CREATEPEN: u32 = 38;
/// `EMR_CREATEBRUSHINDIRECT`.
pub const EMR_CREATEBRUSHINDIRECT: u32 = 39;
/// `EMR_DELETEOBJECT`.
pub const EMR_DELETEOBJECT: u32 = 40;
/// `EMR_ELLIPSE`.
pub const EMR_ELLIPSE: u32 = 42;
/// `EMR_RECTANGLE`.
pub const EMR_RECTANGLE: u32 = 43;
/// `EMR_POLYGON16`.
pub const EMR_POLYGON16: u32 = 86;
/// `EMR_ALPHABLEND`.
pub const EMR_ALPHABLEND: u32 = 114;

/// `" EMF"` signature in the header.
pub const ENHMETA_SIGNATURE: u32 = 0x464D_4520;
/// Format version written to the header.
pub const EMF_VERSION: u32 = 0x0001_0000;

/// Stock object: hollow brush.
pub const NULL_BRUSH: u32 = 0x8000_0005;
/// Stock object: no outline.
pub const NULL_PEN: u32 = 0x8000_0008;

/// Background mode that leaves gaps unpainted.
pub const BK_TRANSPARENT: u32 = 1;
/// Non-zero winding fill.
pub const POLYFILL_WINDING: u32 = 2;

/// Size of the header record this crate writes, in bytes.
pub const HEADER_SIZE: u32 = 108;
pub(crate) const ALPHABLEND_FIXED_SIZE: u32 = 108;
pub(crate) const BITMAPINFOHEADER_SIZE: u32 = 40;
/// BlendOp=AC_SRC_OVER, SourceConstantAlpha=255, AlphaFormat=AC_SRC_ALPHA.
pub(crate) const BLEND_SRC_ALPHA: u32 = 0x01FF_0000;
/// 96 DPI in pixels per metre.
const PELS_PER_METRE: i32 = 3780;

/// Inclusive-inclusive rectangle in logical units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RectL {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge, inclusive.
    pub right: i32,
    /// Bottom edge, inclusive.
    pub bottom: i32,
}

impl RectL {
    /// Rectangle from its four edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Fields of `EMR_HEADER` that vary between blobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmfHeader {
    /// Drawn extent in device pixels.
    pub bounds: RectL,
    /// 0.01 mm units.
    pub frame: RectL,
    /// Total blob size.
    pub bytes: u32,
    /// Record count, header and EOF included.
    pub records: u32,
    /// GDI object table size, slot 0 included.
    pub handles: u16,
    /// Reference device size in pixels.
    pub device_px: (i32, i32),
    /// Reference device size in millimetres.
    pub device_mm: (i32, i32),
    /// Reference device size in micrometres.
    pub device_um: (i32, i32),
}

impl EmfHeader {
    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        out.write_u32::<LittleEndian>(EMR_HEADER)?;
        out.write_u32::<LittleEndian>(HEADER_SIZE)?;
        write_rect(out, self.bounds)?;
        write_rect(out, self.frame)?;
        out.write_u32::<LittleEndian>(ENHMETA_SIGNATURE)?;
        out.write_u32::<LittleEndian>(EMF_VERSION)?;
        out.write_u32::<LittleEndian>(self.bytes)?;
        out.write_u32::<LittleEndian>(self.records)?;
        out.write_u16::<LittleEndian>(self.handles)?;
        out.write_u16::<LittleEndian>(0)?;
        // nDescription, offDescription, nPalEntries
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_i32::<LittleEndian>(self.device_px.0)?;
        out.write_i32::<LittleEndian>(self.device_px.1)?;
        out.write_i32::<LittleEndian>(self.device_mm.0)?;
        out.write_i32::<LittleEndian>(self.device_mm.1)?;
        // cbPixelFormat, offPixelFormat, bOpenGL
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_i32::<LittleEndian>(self.device_um.0)?;
        out.write_i32::<LittleEndian>(self.device_um.1)?;
        Ok(())
    }
}

/// Drawing records emitted after the header.
#[derive(Clone, Debug, PartialEq)]
pub enum EmfRecord {
    /// Background mode.
    SetBkMode(u32),
    /// Polygon fill rule.
    SetPolyFillMode(u32),
    /// Solid brush stored in an object slot.
    CreateBrush {
        /// Object table slot.
        index: u32,
        /// Brush colour; alpha is dropped.
        color: Rgba,
    },
    /// Solid pen stored in an object slot.
    CreatePen {
        /// Object table slot.
        index: u32,
        /// Logical units.
        width: u32,
        /// Pen colour; alpha is dropped.
        color: Rgba,
    },
    /// Select a slot or stock object.
    SelectObject(u32),
    /// Free a slot.
    DeleteObject(u32),
    /// Narrow the clip region.
    IntersectClipRect(RectL),
    /// Filled rectangle.
    Rectangle(RectL),
    /// Filled ellipse inscribed in the rectangle.
    Ellipse(RectL),
    /// Filled polygon with 16-bit points.
    Polygon16 {
        /// Bounding box of `points`.
        bounds: RectL,
        /// Vertices in logical units.
        points: Vec<(i16, i16)>,
    },
    /// 32-bpp premultiplied DIB; the pixels live in the blob's embedded raster.
    AlphaBlend {
        /// Destination rectangle.
        dest: RectL,
        /// Source width in pixels.
        width: u32,
        /// Source height in pixels.
        height: u32,
    },
    /// End of file.
    Eof,
}

impl EmfRecord {
    /// `iType` written for this record.
    pub fn record_type(&self) -> u32 {
        match self {
            Self::SetBkMode(_) => EMR_SETBKMODE,
            Self::SetPolyFillMode(_) => EMR_SETPOLYFILLMODE,
            Self::CreateBrush { .. } => EMR_CREATEBRUSHINDIRECT,
            Self::CreatePen { .. } => EMR_CREATEPEN,
            Self::SelectObject(_) => EMR_SELECTOBJECT,
            Self::DeleteObject(_) => EMR_DELETEOBJECT,
            Self::IntersectClipRect(_) => EMR_INTERSECTCLIPRECT,
            Self::Rectangle(_) => EMR_RECTANGLE,
            Self::Ellipse(_) => EMR_ELLIPSE,
            Self::Polygon16 { .. } => EMR_POLYGON16,
            Self::AlphaBlend { .. } => EMR_ALPHABLEND,
            Self::Eof => EMR_EOF,
        }
    }

    /// Encoded size in bytes, always a multiple of four.
    pub fn size(&self) -> u64 {
        match self {
            Self::SetBkMode(_)
            | Self::SetPolyFillMode(_)
            | Self::SelectObject(_)
            | Self::DeleteObject(_) => 12,
            Self::CreateBrush { .. } => 24,
            Self::CreatePen { .. } => 28,
            Self::IntersectClipRect(_) | Self::Rectangle(_) | Self::Ellipse(_) => 24,
            Self::Polygon16 { points, .. } => 28 + 4 * points.len() as u64,
            Self::AlphaBlend { width, height, .. } => {
                u64::from(ALPHABLEND_FIXED_SIZE)
                    + u64::from(BITMAPINFOHEADER_SIZE)
                    + 4 * u64::from(*width) * u64::from(*height)
            }
            Self::Eof => 20,
        }
    }

    pub(crate) fn write(
        &self,
        out: &mut Vec<u8>,
        raster: Option<&RasterImage>,
    ) -> Result<(), EncodeError> {
        let size = u32::try_from(self.size())
            .map_err(|_| EncodeError::MalformedBlob("record exceeds 4 GiB".to_owned()))?;
        out.write_u32::<LittleEndian>(self.record_type())?;
        out.write_u32::<LittleEndian>(size)?;
        match self {
            Self::SetBkMode(v)
            | Self::SetPolyFillMode(v)
            | Self::SelectObject(v)
            | Self::DeleteObject(v) => out.write_u32::<LittleEndian>(*v)?,
            Self::CreateBrush { index, color } => {
                out.write_u32::<LittleEndian>(*index)?;
                // BS_SOLID
                out.write_u32::<LittleEndian>(0)?;
                out.write_u32::<LittleEndian>(colorref(*color))?;
                out.write_u32::<LittleEndian>(0)?;
            }
            Self::CreatePen {
                index,
                width,
                color,
            } => {
                out.write_u32::<LittleEndian>(*index)?;
                // PS_SOLID
                out.write_u32::<LittleEndian>(0)?;
                out.write_u32::<LittleEndian>(*width)?;
                out.write_u32::<LittleEndian>(0)?;
                out.write_u32::<LittleEndian>(colorref(*color))?;
            }
            Self::IntersectClipRect(r) | Self::Rectangle(r) | Self::Ellipse(r) => {
                write_rect(out, *r)?;
            }
            Self::Polygon16 { bounds, points } => {
                write_rect(out, *bounds)?;
                out.write_u32::<LittleEndian>(points.len() as u32)?;
                for &(x, y) in points {
                    out.write_i16::<LittleEndian>(x)?;
                    out.write_i16::<LittleEndian>(y)?;
                }
            }
            Self::AlphaBlend {
                dest,
                width,
                height,
            } => {
                let img = raster.ok_or_else(|| {
                    EncodeError::MalformedBlob("alpha blend record without raster".to_owned())
                })?;
                if img.width() != *width || img.height() != *height {
                    return Err(EncodeError::MalformedBlob(format!(
                        "alpha blend is {width}x{height} but raster is {}x{}",
                        img.width(),
                        img.height()
                    )));
                }
                write_alpha_blend(out, *dest, img)?;
            }
            Self::Eof => {
                // nPalEntries, offPalEntries, nSizeLast
                out.write_u32::<LittleEndian>(0)?;
                out.write_u32::<LittleEndian>(16)?;
                out.write_u32::<LittleEndian>(20)?;
            }
        }
        Ok(())
    }
}

fn write_alpha_blend(out: &mut Vec<u8>, dest: RectL, img: &RasterImage) -> Result<(), EncodeError> {
    let (w, h) = (img.width(), img.height());
    let bits_len = 4 * w * h;
    write_rect(out, dest)?;
    out.write_i32::<LittleEndian>(dest.left)?;
    out.write_i32::<LittleEndian>(dest.top)?;
    out.write_i32::<LittleEndian>(dest.right - dest.left + 1)?;
    out.write_i32::<LittleEndian>(dest.bottom - dest.top + 1)?;
    out.write_u32::<LittleEndian>(BLEND_SRC_ALPHA)?;
    out.write_i32::<LittleEndian>(0)?;
    out.write_i32::<LittleEndian>(0)?;
    for v in [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0] {
        out.write_f32::<LittleEndian>(v)?;
    }
    // crBkColorSrc, iUsageSrc (DIB_RGB_COLORS)
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(ALPHABLEND_FIXED_SIZE)?;
    out.write_u32::<LittleEndian>(BITMAPINFOHEADER_SIZE)?;
    out.write_u32::<LittleEndian>(ALPHABLEND_FIXED_SIZE + BITMAPINFOHEADER_SIZE)?;
    out.write_u32::<LittleEndian>(bits_len)?;
    out.write_i32::<LittleEndian>(w as i32)?;
    out.write_i32::<LittleEndian>(h as i32)?;

    out.write_u32::<LittleEndian>(BITMAPINFOHEADER_SIZE)?;
    out.write_i32::<LittleEndian>(w as i32)?;
    // Positive height: bottom-up rows.
    out.write_i32::<LittleEndian>(h as i32)?;
    out.write_u16::<LittleEndian>(1)?;
    out.write_u16::<LittleEndian>(32)?;
    // BI_RGB
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(bits_len)?;
    out.write_i32::<LittleEndian>(PELS_PER_METRE)?;
    out.write_i32::<LittleEndian>(PELS_PER_METRE)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(0)?;

    out.reserve(bits_len as usize);
    let raw = img.as_raw();
    let stride = (w * 4) as usize;
    for row in raw.chunks_exact(stride.max(1)).rev() {
        for px in row.chunks_exact(4) {
            out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
    }
    Ok(())
}

fn write_rect(out: &mut Vec<u8>, r: RectL) -> Result<(), EncodeError> {
    out.write_i32::<LittleEndian>(r.left)?;
    out.write_i32::<LittleEndian>(r.top)?;
    out.write_i32::<LittleEndian>(r.right)?;
    out.write_i32::<LittleEndian>(r.bottom)?;
    Ok(())
}

/// GDI `COLORREF` is `0x00BBGGRR`; alpha is not representable.
pub fn colorref(c: Rgba) -> u32 {
    u32::from(c.r) | (u32::from(c.g) << 8) | (u32::from(c.b) << 16)
}

/// Opaque colour from a `COLORREF`.
pub fn from_colorref(v: u32) -> Rgba {
    Rgba::opaque((v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8)
}
