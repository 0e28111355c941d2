use super::*;
use crate::diagnostics::Diagnostics;
use crate::foundation::core::{Rect, Rgba};
use crate::graph::element::FilterElement;
use crate::services::{SrgbColorSpace, StandardServices};

fn graph(xml: &str) -> FilterGraph {
    let filter = FilterElement::parse_xml(xml).unwrap();
    let mut diags = Diagnostics::new();
    FilterGraph::build(&filter, &StandardServices::default(), &mut diags).unwrap()
}

fn render(g: &FilterGraph, shape: &ShapeContext, frame: Frame) -> Result<RasterImage, EncodeError> {
    let inputs = RasterInputs {
        shape,
        frame,
        color_space: &SrgbColorSpace,
        max_pixels: 1 << 20,
    };
    render_subgraph(g, g.output(), &inputs)
}

#[test]
fn flood_in_source_graphic_recolors_the_shape() {
    let g = graph(
        r#"<filter>
            <feFlood flood-color="red"/>
            <feComposite in2="SourceGraphic" operator="in"/>
        </filter>"#,
    );
    let shape = ShapeContext::rect(0.0, 0.0, 10.0, 10.0);
    let frame = Frame::covering(Rect::new(-5.0, -5.0, 15.0, 15.0));
    let img = render(&g, &shape, frame).unwrap();
    assert_eq!(img.pixel(10, 10), [255, 0, 0, 255]);
    assert_eq!(img.pixel(0, 0), [0, 0, 0, 0]);
}

#[test]
fn subregion_clips_node_output() {
    let g = graph(r#"<filter><feFlood flood-color="blue" x="1" y="1" width="2" height="2"/></filter>"#);
    let shape = ShapeContext::rect(0.0, 0.0, 4.0, 4.0);
    let img = render(&g, &shape, Frame::covering(Rect::new(0.0, 0.0, 4.0, 4.0))).unwrap();
    let inked: Vec<(u32, u32)> = (0..4)
        .flat_map(|y| (0..4).map(move |x| (x, y)))
        .filter(|&(x, y)| img.pixel(x, y)[3] != 0)
        .collect();
    assert_eq!(inked, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
}

#[test]
fn tile_repeats_the_input_subregion() {
    let g = graph(
        r#"<filter>
            <feFlood flood-color="blue" x="0" y="0" width="1" height="1" result="cell"/>
            <feTile in="cell"/>
        </filter>"#,
    );
    let frame = Frame::covering(Rect::new(0.0, 0.0, 4.0, 4.0));
    assert_eq!(tile_cell_rect(&g, g.output(), &frame), (0, 0, 1, 1));
    let img = render(&g, &ShapeContext::rect(0.0, 0.0, 4.0, 4.0), frame).unwrap();
    assert!(img.as_raw().chunks_exact(4).all(|p| p == [0, 0, 255, 255]));
}

#[test]
fn drop_shadow_keeps_source_on_top() {
    let g = graph(
        r#"<filter><feDropShadow dx="3" dy="0" stdDeviation="0" flood-color="black"/></filter>"#,
    );
    let shape = ShapeContext::rect(0.0, 0.0, 2.0, 2.0).with_fill(Some(Rgba::opaque(0, 255, 0)));
    let img = render(&g, &shape, Frame::covering(Rect::new(0.0, 0.0, 6.0, 2.0))).unwrap();
    assert_eq!(img.pixel(0, 0), [0, 255, 0, 255]);
    assert_eq!(img.pixel(3, 0), [0, 0, 0, 255]);
    assert_eq!(img.pixel(2, 0), [0, 0, 0, 0]);
}

#[test]
fn oversized_frame_is_refused_before_allocating() {
    let g = graph(r#"<filter><feGaussianBlur stdDeviation="1"/></filter>"#);
    let shape = ShapeContext::rect(0.0, 0.0, 10.0, 10.0);
    let inputs = RasterInputs {
        shape: &shape,
        frame: Frame::covering(Rect::new(0.0, 0.0, 100.0, 100.0)),
        color_space: &SrgbColorSpace,
        max_pixels: 9_999,
    };
    let err = render_subgraph(&g, g.output(), &inputs).unwrap_err();
    assert!(matches!(
        err,
        EncodeError::UnsupportedDimensions {
            width: 100,
            height: 100,
            max_pixels: 9_999
        }
    ));
}

#[test]
fn rendering_is_repeatable() {
    let g = graph(
        r#"<filter>
            <feTurbulence baseFrequency="0.2" numOctaves="2" seed="3"/>
            <feMorphology operator="dilate" radius="1"/>
        </filter>"#,
    );
    let shape = ShapeContext::rect(0.0, 0.0, 16.0, 16.0);
    let frame = Frame::covering(Rect::new(0.0, 0.0, 16.0, 16.0));
    assert_eq!(render(&g, &shape, frame).unwrap(), render(&g, &shape, frame).unwrap());
}
