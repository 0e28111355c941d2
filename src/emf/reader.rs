//! Record-level EMF parser, used to verify encoder output.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::emf::records::{
    ALPHABLEND_FIXED_SIZE, EMF_VERSION, EMR_ALPHABLEND, EMR_CREATEBRUSHINDIRECT, EMR_CREATEPEN,
    EMR_DELETEOBJECT, EMR_ELLIPSE, EMR_EOF, EMR_HEADER, EMR_INTERSECTCLIPRECT, EMR_POLYGON16,
    EMR_RECTANGLE, EMR_SELECTOBJECT, EMR_SETBKMODE, EMR_SETPOLYFILLMODE, ENHMETA_SIGNATURE,
    EmfHeader, EmfRecord, RectL, from_colorref,
};
use crate::foundation::core::RasterImage;
use crate::foundation::error::EncodeError;

/// A metafile parsed back from bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEmf {
    /// Parsed `EMR_HEADER`.
    pub header: EmfHeader,
    /// Every record after the header, EOF included.
    pub records: Vec<EmfRecord>,
    /// Pixels of the (single) alpha-blend record, premultiplied RGBA top-down.
    pub raster: Option<RasterImage>,
}

fn malformed(msg: impl Into<String>) -> EncodeError {
    EncodeError::MalformedBlob(msg.into())
}

/// Parse a metafile produced by this crate. Validates the signature, the patched byte and
/// record counts and the terminating EOF. Record types it never writes are rejected.
pub fn read_records(bytes: &[u8]) -> Result<DecodedEmf, EncodeError> {
    if bytes.len() < 108 {
        return Err(malformed("shorter than an EMF header"));
    }
    let mut c = Cursor::new(bytes);
    let header = read_header(&mut c)?;
    if header.bytes as usize != bytes.len() {
        return Err(malformed(format!(
            "header claims {} bytes, blob has {}",
            header.bytes,
            bytes.len()
        )));
    }

    let mut records = Vec::new();
    let mut raster = None;
    let mut offset = c.position() as usize;
    let mut saw_eof = false;
    while offset < bytes.len() {
        if saw_eof {
            return Err(malformed("records after EOF"));
        }
        let mut rc = Cursor::new(&bytes[offset..]);
        let kind = rc.read_u32::<LittleEndian>()?;
        let size = rc.read_u32::<LittleEndian>()? as usize;
        if size < 8 || size % 4 != 0 || offset + size > bytes.len() {
            return Err(malformed(format!("bad size {size} for record type {kind} at {offset}")));
        }
        let body = &bytes[offset..offset + size];
        let rec = read_record(kind, body, &mut raster)?;
        saw_eof = rec == EmfRecord::Eof;
        records.push(rec);
        offset += size;
    }
    if !saw_eof {
        return Err(malformed("missing EOF record"));
    }
    if header.records as usize != records.len() + 1 {
        return Err(malformed(format!(
            "header claims {} records, found {}",
            header.records,
            records.len() + 1
        )));
    }
    Ok(DecodedEmf {
        header,
        records,
        raster,
    })
}

fn read_rect(c: &mut Cursor<&[u8]>) -> Result<RectL, EncodeError> {
    Ok(RectL::new(
        c.read_i32::<LittleEndian>()?,
        c.read_i32::<LittleEndian>()?,
        c.read_i32::<LittleEndian>()?,
        c.read_i32::<LittleEndian>()?,
    ))
}

fn read_header(c: &mut Cursor<&[u8]>) -> Result<EmfHeader, EncodeError> {
    if c.read_u32::<LittleEndian>()? != EMR_HEADER {
        return Err(malformed("first record is not EMR_HEADER"));
    }
    let size = c.read_u32::<LittleEndian>()?;
    let bounds = read_rect(c)?;
    let frame = read_rect(c)?;
    if c.read_u32::<LittleEndian>()? != ENHMETA_SIGNATURE {
        return Err(malformed("bad signature"));
    }
    if c.read_u32::<LittleEndian>()? != EMF_VERSION {
        return Err(malformed("unexpected version"));
    }
    let bytes = c.read_u32::<LittleEndian>()?;
    let records = c.read_u32::<LittleEndian>()?;
    let handles = c.read_u16::<LittleEndian>()?;
    let _reserved = c.read_u16::<LittleEndian>()?;
    let _n_description = c.read_u32::<LittleEndian>()?;
    let _off_description = c.read_u32::<LittleEndian>()?;
    let _n_pal = c.read_u32::<LittleEndian>()?;
    let device_px = (c.read_i32::<LittleEndian>()?, c.read_i32::<LittleEndian>()?);
    let device_mm = (c.read_i32::<LittleEndian>()?, c.read_i32::<LittleEndian>()?);
    let mut device_um = (0, 0);
    if size >= 108 {
        let _cb_pixel_format = c.read_u32::<LittleEndian>()?;
        let _off_pixel_format = c.read_u32::<LittleEndian>()?;
        let _open_gl = c.read_u32::<LittleEndian>()?;
        device_um = (c.read_i32::<LittleEndian>()?, c.read_i32::<LittleEndian>()?);
    }
    c.set_position(u64::from(size));
    Ok(EmfHeader {
        bounds,
        frame,
        bytes,
        records,
        handles,
        device_px,
        device_mm,
        device_um,
    })
}

fn read_record(
    kind: u32,
    body: &[u8],
    raster: &mut Option<RasterImage>,
) -> Result<EmfRecord, EncodeError> {
    let mut c = Cursor::new(body);
    c.set_position(8);
    let rec = match kind {
        EMR_SETBKMODE => EmfRecord::SetBkMode(c.read_u32::<LittleEndian>()?),
        EMR_SETPOLYFILLMODE => EmfRecord::SetPolyFillMode(c.read_u32::<LittleEndian>()?),
        EMR_SELECTOBJECT => EmfRecord::SelectObject(c.read_u32::<LittleEndian>()?),
        EMR_DELETEOBJECT => EmfRecord::DeleteObject(c.read_u32::<LittleEndian>()?),
        EMR_CREATEBRUSHINDIRECT => {
            let index = c.read_u32::<LittleEndian>()?;
            let _style = c.read_u32::<LittleEndian>()?;
            let color = from_colorref(c.read_u32::<LittleEndian>()?);
            EmfRecord::CreateBrush { index, color }
        }
        EMR_CREATEPEN => {
            let index = c.read_u32::<LittleEndian>()?;
            let _style = c.read_u32::<LittleEndian>()?;
            let width = c.read_u32::<LittleEndian>()?;
            let _y = c.read_u32::<LittleEndian>()?;
            let color = from_colorref(c.read_u32::<LittleEndian>()?);
            EmfRecord::CreatePen {
                index,
                width,
                color,
            }
        }
        EMR_INTERSECTCLIPRECT => EmfRecord::IntersectClipRect(read_rect(&mut c)?),
        EMR_RECTANGLE => EmfRecord::Rectangle(read_rect(&mut c)?),
        EMR_ELLIPSE => EmfRecord::Ellipse(read_rect(&mut c)?),
        EMR_POLYGON16 => {
            let bounds = read_rect(&mut c)?;
            let n = c.read_u32::<LittleEndian>()? as usize;
            if 28 + 4 * n != body.len() {
                return Err(malformed("polygon point count does not match record size"));
            }
            let mut points = Vec::with_capacity(n);
            for _ in 0..n {
                points.push((c.read_i16::<LittleEndian>()?, c.read_i16::<LittleEndian>()?));
            }
            EmfRecord::Polygon16 { bounds, points }
        }
        EMR_ALPHABLEND => {
            let dest = read_rect(&mut c)?;
            c.set_position(u64::from(ALPHABLEND_FIXED_SIZE) - 8);
            let w = c.read_i32::<LittleEndian>()?;
            let h = c.read_i32::<LittleEndian>()?;
            c.set_position(84);
            let off_bmi = c.read_u32::<LittleEndian>()? as usize;
            let _cb_bmi = c.read_u32::<LittleEndian>()?;
            let off_bits = c.read_u32::<LittleEndian>()? as usize;
            let cb_bits = c.read_u32::<LittleEndian>()? as usize;
            if w <= 0 || h <= 0 || off_bmi < 108 {
                return Err(malformed("bad alpha blend dimensions"));
            }
            let (w, h) = (w as u32, h as u32);
            if cb_bits != 4 * (w as usize) * (h as usize) || off_bits + cb_bits > body.len() {
                return Err(malformed("alpha blend bits out of range"));
            }
            let bits = &body[off_bits..off_bits + cb_bits];
            let stride = 4 * w as usize;
            let mut rgba = Vec::with_capacity(cb_bits);
            for row in bits.chunks_exact(stride).rev() {
                for px in row.chunks_exact(4) {
                    rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
            *raster = RasterImage::from_raw(w, h, rgba);
            EmfRecord::AlphaBlend {
                dest,
                width: w,
                height: h,
            }
        }
        EMR_EOF => EmfRecord::Eof,
        other => return Err(malformed(format!("unexpected record type {other}"))),
    };
    Ok(rec)
}

#[cfg(test)]
#[path = "../../tests/unit/emf/reader.rs"]
mod tests;
