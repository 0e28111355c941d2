use super::*;
use crate::emf::encoder::encode_raster;

fn blob_bytes() -> Vec<u8> {
    let img = RasterImage::from_fn(3, 2, |x, _| [x as u8 * 40, 0, 0, 200]);
    encode_raster(&img, 100).unwrap().bytes().to_vec()
}

#[test]
fn truncated_input_is_rejected() {
    let bytes = blob_bytes();
    assert!(matches!(
        read_records(&bytes[..60]),
        Err(EncodeError::MalformedBlob(_))
    ));
    assert!(read_records(&bytes[..bytes.len() - 4]).is_err());
}

#[test]
fn bad_signature_is_rejected() {
    let mut bytes = blob_bytes();
    bytes[40] ^= 0xff;
    assert!(matches!(
        read_records(&bytes),
        Err(EncodeError::MalformedBlob(m)) if m.contains("signature")
    ));
}

#[test]
fn record_count_mismatch_is_rejected() {
    let mut bytes = blob_bytes();
    bytes[52..56].copy_from_slice(&9u32.to_le_bytes());
    assert!(read_records(&bytes).is_err());
}

#[test]
fn bits_are_read_back_top_down() {
    let bytes = blob_bytes();
    let decoded = read_records(&bytes).unwrap();
    let raster = decoded.raster.unwrap();
    assert_eq!(raster.pixel(2, 0), [80, 0, 0, 200]);
    assert_eq!(raster.pixel(0, 1), [0, 0, 0, 200]);
    assert_eq!(
        decoded.records[0],
        EmfRecord::AlphaBlend {
            dest: RectL::new(0, 0, 2, 1),
            width: 3,
            height: 2
        }
    );
}
