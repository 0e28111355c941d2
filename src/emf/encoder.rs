//! EMF blob assembly.

use crate::emf::records::{
    BK_TRANSPARENT, EmfHeader, EmfRecord, HEADER_SIZE, NULL_BRUSH, NULL_PEN, POLYFILL_WINDING,
    RectL,
};
use crate::foundation::core::{RasterImage, Rgba};
use crate::foundation::error::EncodeError;
use crate::pattern::tile::{TileGeometry, TileShape};

/// Reference device: 1920x1080 px at 96 DPI.
const REF_DEVICE_PX: (i32, i32) = (1920, 1080);
const REF_DEVICE_MM: (i32, i32) = (508, 286);
const REF_DEVICE_UM: (i32, i32) = (508_000, 285_750);

/// Encoded metafile plus the typed form it was written from.
///
/// Blobs are immutable and content-addressed: identical inputs produce identical bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct EmfBlob {
    header: EmfHeader,
    records: Vec<EmfRecord>,
    embedded_raster: Option<RasterImage>,
    bytes: Vec<u8>,
}

impl EmfBlob {
    /// Header as written.
    pub fn header(&self) -> &EmfHeader {
        &self.header
    }

    /// Drawing records, header excluded, EOF included.
    pub fn records(&self) -> &[EmfRecord] {
        &self.records
    }

    /// Pixels of the alpha-blend record, if the blob carries one.
    pub fn embedded_raster(&self) -> Option<&RasterImage> {
        self.embedded_raster.as_ref()
    }

    /// Encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Picture size in device pixels.
    pub fn size_px(&self) -> (u32, u32) {
        let b = self.header.bounds;
        (
            (b.right - b.left + 1).max(0) as u32,
            (b.bottom - b.top + 1).max(0) as u32,
        )
    }

    /// Memory charged against the cache budget.
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
            + self
                .embedded_raster
                .as_ref()
                .map_or(0, |r| r.as_raw().len())
    }
}

/// Accumulates records for one picture of `width x height` pixels.
pub(crate) struct EmfBuilder {
    width: u32,
    height: u32,
    records: Vec<EmfRecord>,
    handles: u16,
    raster: Option<RasterImage>,
}

impl EmfBuilder {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            records: Vec::new(),
            handles: 1,
            raster: None,
        }
    }

    pub(crate) fn push(&mut self, record: EmfRecord) {
        match &record {
            EmfRecord::CreateBrush { index, .. } | EmfRecord::CreatePen { index, .. } => {
                let needed = u16::try_from(index.saturating_add(1)).unwrap_or(u16::MAX);
                self.handles = self.handles.max(needed);
            }
            _ => {}
        }
        self.records.push(record);
    }

    pub(crate) fn finish(mut self) -> Result<EmfBlob, EncodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::UnsupportedDimensions {
                width: u64::from(self.width),
                height: u64::from(self.height),
                max_pixels: 0,
            });
        }
        if self.records.last() != Some(&EmfRecord::Eof) {
            self.records.push(EmfRecord::Eof);
        }

        let total: u64 = u64::from(HEADER_SIZE) + self.records.iter().map(EmfRecord::size).sum::<u64>();
        let total = u32::try_from(total)
            .map_err(|_| EncodeError::MalformedBlob(format!("metafile of {total} bytes")))?;

        let (w, h) = (self.width as i32, self.height as i32);
        let mut header = EmfHeader {
            bounds: RectL::new(0, 0, w - 1, h - 1),
            frame: RectL::new(0, 0, px_to_hundredth_mm(w), px_to_hundredth_mm(h)),
            bytes: 0,
            records: 0,
            handles: self.handles,
            device_px: REF_DEVICE_PX,
            device_mm: REF_DEVICE_MM,
            device_um: REF_DEVICE_UM,
        };

        let mut bytes = Vec::with_capacity(total as usize);
        header.write(&mut bytes)?;
        for r in &self.records {
            r.write(&mut bytes, self.raster.as_ref())?;
        }

        // Counts are only known once the stream is complete.
        header.bytes = bytes.len() as u32;
        header.records = self.records.len() as u32 + 1;
        bytes[48..52].copy_from_slice(&header.bytes.to_le_bytes());
        bytes[52..56].copy_from_slice(&header.records.to_le_bytes());
        debug_assert_eq!(header.bytes, total);

        Ok(EmfBlob {
            header,
            records: self.records,
            embedded_raster: self.raster,
            bytes,
        })
    }
}

fn px_to_hundredth_mm(px: i32) -> i32 {
    ((f64::from(px) * 2540.0) / 96.0).round() as i32
}

/// Wrap a premultiplied raster in a single `EMR_ALPHABLEND` record.
pub fn encode_raster(image: &RasterImage, max_pixels: u64) -> Result<EmfBlob, EncodeError> {
    let (w, h) = (image.width(), image.height());
    let pixels = image.pixel_count();
    let fits_record = pixels
        .checked_mul(4)
        .is_some_and(|b| b < u64::from(u32::MAX) - 4096);
    if w == 0 || h == 0 || pixels > max_pixels || !fits_record || w > i32::MAX as u32 {
        return Err(EncodeError::UnsupportedDimensions {
            width: u64::from(w),
            height: u64::from(h),
            max_pixels,
        });
    }
    let mut b = EmfBuilder::new(w, h);
    b.raster = Some(image.clone());
    b.push(EmfRecord::AlphaBlend {
        dest: RectL::new(0, 0, w as i32 - 1, h as i32 - 1),
        width: w,
        height: h,
    });
    b.finish()
}

/// Vector tile: background, clip to the tile cell, then every shape (including its periodic
/// copies) as polygons and ellipses.
pub fn encode_tile_geometry(geometry: &TileGeometry) -> Result<EmfBlob, EncodeError> {
    let (w, h) = (geometry.width, geometry.height);
    let mut b = EmfBuilder::new(w, h);
    b.push(EmfRecord::SetBkMode(BK_TRANSPARENT));
    b.push(EmfRecord::SetPolyFillMode(POLYFILL_WINDING));
    b.push(EmfRecord::SelectObject(NULL_PEN));

    if let Some(bg) = geometry.background {
        push_fill(&mut b, bg, |b| {
            let (w, h) = (w as i16, h as i16);
            b.push(polygon(&[(0, 0), (w, 0), (w, h), (0, h)]));
        });
    }

    b.push(EmfRecord::IntersectClipRect(RectL::new(
        0,
        0,
        w as i32,
        h as i32,
    )));
    let mut shapes = Vec::with_capacity(geometry.shapes.len());
    for shape in &geometry.shapes {
        shapes.push(match shape {
            TileShape::Polygon(pts) => {
                let pts = pts
                    .iter()
                    .map(|&(x, y)| Ok((to_i16(x)?, to_i16(y)?)))
                    .collect::<Result<Vec<_>, EncodeError>>()?;
                polygon(&pts)
            }
            TileShape::Ellipse(r) => EmfRecord::Ellipse(*r),
        });
    }
    push_fill(&mut b, geometry.color, |b| {
        for s in shapes {
            b.push(s);
        }
    });
    b.finish()
}

fn push_fill(b: &mut EmfBuilder, color: Rgba, draw: impl FnOnce(&mut EmfBuilder)) {
    b.push(EmfRecord::CreateBrush { index: 1, color });
    b.push(EmfRecord::SelectObject(1));
    draw(b);
    b.push(EmfRecord::SelectObject(NULL_BRUSH));
    b.push(EmfRecord::DeleteObject(1));
}

fn polygon(points: &[(i16, i16)]) -> EmfRecord {
    let (mut l, mut t, mut r, mut btm) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for &(x, y) in points {
        l = l.min(i32::from(x));
        t = t.min(i32::from(y));
        r = r.max(i32::from(x));
        btm = btm.max(i32::from(y));
    }
    EmfRecord::Polygon16 {
        bounds: RectL::new(l, t, r, btm),
        points: points.to_vec(),
    }
}

fn to_i16(v: i32) -> Result<i16, EncodeError> {
    i16::try_from(v).map_err(|_| EncodeError::MalformedTile(format!("coordinate {v} out of range")))
}

#[cfg(test)]
#[path = "../../tests/unit/emf/encoder.rs"]
mod tests;
