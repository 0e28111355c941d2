use super::*;
use crate::diagnostics::Diagnostics;
use crate::graph::element::FilterElement;
use crate::services::{StandardServices, StrokeStyle};

#[test]
fn covering_snaps_outward_to_whole_pixels() {
    let f = Frame::covering(Rect::new(1.5, -0.25, 10.2, 4.0));
    assert_eq!(
        f,
        Frame {
            x: 1,
            y: -1,
            width: 10,
            height: 5
        }
    );
    assert_eq!(f.rect(), Rect::new(1.0, -1.0, 11.0, 4.0));
    assert_eq!(f.user_point(0, 0), Point::new(1.5, -0.5));
}

#[test]
fn frame_grows_by_blur_reach() {
    let filter =
        FilterElement::parse_xml(r#"<filter><feGaussianBlur stdDeviation="4"/></filter>"#).unwrap();
    let mut diags = Diagnostics::new();
    let graph = FilterGraph::build(&filter, &StandardServices::default(), &mut diags).unwrap();
    let shape = ShapeContext::rect(0.0, 0.0, 20.0, 20.0);
    let frame = frame_for(&graph, graph.output(), &shape, &PolicyConfig::default());
    // 3 sigma * 4 = 12 beats the 10% floor of 2.
    assert_eq!(frame.x, -12);
    assert_eq!(frame.width, 44);
}

#[test]
fn frame_keeps_minimum_margin_without_reach() {
    let filter = FilterElement::parse_xml(
        r#"<filter><feColorMatrix type="saturate" values="0.2"/></filter>"#,
    )
    .unwrap();
    let mut diags = Diagnostics::new();
    let graph = FilterGraph::build(&filter, &StandardServices::default(), &mut diags).unwrap();
    let shape = ShapeContext::rect(0.0, 0.0, 50.0, 30.0);
    let frame = frame_for(&graph, graph.output(), &shape, &PolicyConfig::default());
    assert_eq!((frame.x, frame.y, frame.width, frame.height), (-5, -5, 60, 40));
}

#[test]
fn source_graphic_covers_the_filled_rect() {
    let shape = ShapeContext::rect(2.0, 2.0, 4.0, 4.0).with_fill(Some(Rgba::opaque(255, 0, 0)));
    let frame = Frame::covering(Rect::new(0.0, 0.0, 8.0, 8.0));
    let img = render_source(SourceKind::SourceGraphic, &shape, &frame);
    assert_eq!(img.pixel(3, 3), [255, 0, 0, 255]);
    assert_eq!(img.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(img.pixel(6, 6), [0, 0, 0, 0]);
}

#[test]
fn source_alpha_is_black_with_shape_alpha() {
    let shape = ShapeContext::rect(0.0, 0.0, 4.0, 4.0)
        .with_fill(Some(Rgba::opaque(10, 200, 30)))
        .with_opacity(0.5);
    let frame = Frame::covering(Rect::new(0.0, 0.0, 4.0, 4.0));
    let img = render_source(SourceKind::SourceAlpha, &shape, &frame);
    let px = img.pixel(1, 1);
    assert_eq!(&px[..3], &[0, 0, 0]);
    assert!((i32::from(px[3]) - 128).abs() <= 1);
}

#[test]
fn stroke_paints_outside_the_fill() {
    let shape = ShapeContext::rect(4.0, 4.0, 8.0, 8.0)
        .with_fill(None)
        .with_stroke(Some(StrokeStyle {
            width: 2.0,
            color: Rgba::opaque(0, 0, 255),
        }));
    let frame = Frame::covering(Rect::new(0.0, 0.0, 16.0, 16.0));
    let img = render_source(SourceKind::SourceGraphic, &shape, &frame);
    assert_eq!(img.pixel(3, 8), [0, 0, 255, 255]);
    assert_eq!(img.pixel(8, 8), [0, 0, 0, 0]);
}

#[test]
fn paint_sources_flood_the_frame() {
    let shape = ShapeContext::rect(0.0, 0.0, 1.0, 1.0).with_fill(Some(Rgba::opaque(1, 2, 3)));
    let frame = Frame::covering(Rect::new(0.0, 0.0, 3.0, 2.0));
    let img = render_source(SourceKind::FillPaint, &shape, &frame);
    assert!(img.as_raw().chunks_exact(4).all(|p| p == [1, 2, 3, 255]));
    let bg = render_source(SourceKind::BackgroundImage, &shape, &frame);
    assert!(bg.as_raw().iter().all(|&b| b == 0));
}
