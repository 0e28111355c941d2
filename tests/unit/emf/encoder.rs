use super::*;
use crate::emf::reader::read_records;

fn gradient(w: u32, h: u32) -> RasterImage {
    RasterImage::from_fn(w, h, |x, y| {
        let a = ((x + y) * 20).min(255) as u8;
        Rgba::new((x * 30) as u8, (y * 40) as u8, 90, a).premultiplied()
    })
}

#[test]
fn raster_blob_round_trips_through_reader() {
    let img = gradient(5, 3);
    let blob = encode_raster(&img, 1_000).unwrap();
    let decoded = read_records(blob.bytes()).unwrap();

    assert_eq!(decoded.header, *blob.header());
    assert_eq!(decoded.records, blob.records());
    assert_eq!(decoded.raster.as_ref(), Some(&img));
    assert_eq!(blob.size_px(), (5, 3));
}

#[test]
fn header_counts_are_patched() {
    let blob = encode_raster(&gradient(2, 2), 100).unwrap();
    let h = blob.header();
    assert_eq!(h.bytes as usize, blob.bytes().len());
    // header + alpha blend + eof
    assert_eq!(h.records, 3);
    assert_eq!(&blob.bytes()[48..52], &h.bytes.to_le_bytes());
    assert_eq!(blob.records().last(), Some(&EmfRecord::Eof));
    assert_eq!(blob.bytes().len() % 4, 0);
}

#[test]
fn frame_is_in_hundredths_of_a_millimetre() {
    let blob = encode_raster(&gradient(96, 48), 1 << 20).unwrap();
    assert_eq!(blob.header().frame, RectL::new(0, 0, 2540, 1270));
    assert_eq!(blob.header().bounds, RectL::new(0, 0, 95, 47));
}

#[test]
fn encoding_is_deterministic() {
    let img = gradient(7, 4);
    let a = encode_raster(&img, 1_000).unwrap();
    let b = encode_raster(&img, 1_000).unwrap();
    assert_eq!(a.bytes(), b.bytes());
}

#[test]
fn oversized_and_empty_rasters_are_rejected() {
    let err = encode_raster(&gradient(10, 10), 99).unwrap_err();
    assert!(matches!(
        err,
        EncodeError::UnsupportedDimensions {
            width: 10,
            height: 10,
            max_pixels: 99
        }
    ));
    let err = encode_raster(&RasterImage::new(0, 4), 100).unwrap_err();
    assert!(matches!(err, EncodeError::UnsupportedDimensions { .. }));
}

#[test]
fn byte_size_charges_bytes_and_pixels() {
    let img = gradient(4, 4);
    let blob = encode_raster(&img, 100).unwrap();
    assert_eq!(blob.byte_size(), blob.bytes().len() + 64);
}

#[test]
fn tile_geometry_writes_clipped_brush_sequence() {
    let geometry = TileGeometry {
        width: 8,
        height: 8,
        shapes: vec![
            TileShape::Polygon(vec![(0, 0), (8, 0), (8, 2), (0, 2)]),
            TileShape::Ellipse(RectL::new(2, 2, 6, 6)),
        ],
        color: Rgba::opaque(200, 10, 20),
        background: Some(Rgba::WHITE),
    };
    let blob = encode_tile_geometry(&geometry).unwrap();
    let recs = blob.records();

    assert_eq!(recs[0], EmfRecord::SetBkMode(BK_TRANSPARENT));
    assert!(recs.contains(&EmfRecord::IntersectClipRect(RectL::new(0, 0, 8, 8))));
    assert!(recs.contains(&EmfRecord::CreateBrush {
        index: 1,
        color: Rgba::WHITE
    }));
    assert!(recs.contains(&EmfRecord::CreateBrush {
        index: 1,
        color: Rgba::opaque(200, 10, 20)
    }));
    assert!(recs.contains(&EmfRecord::Ellipse(RectL::new(2, 2, 6, 6))));
    assert_eq!(blob.header().handles, 2);
    assert!(blob.embedded_raster().is_none());

    let decoded = read_records(blob.bytes()).unwrap();
    assert_eq!(decoded.records, recs);
}

#[test]
fn tile_coordinates_outside_i16_are_malformed() {
    let geometry = TileGeometry {
        width: 8,
        height: 8,
        shapes: vec![TileShape::Polygon(vec![(0, 0), (70_000, 0), (0, 3)])],
        color: Rgba::BLACK,
        background: None,
    };
    assert!(matches!(
        encode_tile_geometry(&geometry),
        Err(EncodeError::MalformedTile(_))
    ));
}
