use super::*;

#[test]
fn hex_is_uppercase_rrggbb() {
    assert_eq!(Rgba::opaque(0x12, 0xab, 0x0f).hex(), "12AB0F");
}

#[test]
fn alpha_factor_is_clamped() {
    let c = Rgba::new(10, 20, 30, 200);
    assert_eq!(c.with_alpha_factor(0.5).a, 100);
    assert_eq!(c.with_alpha_factor(2.0).a, 200);
    assert_eq!(c.with_alpha_factor(-1.0).a, 0);
}

#[test]
fn premultiplied_round_trip_keeps_opaque_colors() {
    let c = Rgba::opaque(200, 100, 50);
    assert_eq!(Rgba::from_premultiplied(c.premultiplied()), c);
    assert_eq!(Rgba::new(255, 0, 0, 128).premultiplied(), [128, 0, 0, 128]);
}

#[test]
fn raster_from_fn_and_raw_agree() {
    let img = RasterImage::from_fn(3, 2, |x, y| [x as u8, y as u8, 0, 255]);
    assert_eq!(img.pixel_count(), 6);
    assert_eq!(img.pixel(2, 1), [2, 1, 0, 255]);
    let raw = img.clone().into_raw();
    let back = RasterImage::from_raw(3, 2, raw).unwrap();
    assert_eq!(back, img);
    assert!(RasterImage::from_raw(3, 2, vec![0; 5]).is_none());
}
