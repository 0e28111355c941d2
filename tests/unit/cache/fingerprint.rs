use super::*;
use crate::diagnostics::Diagnostics;
use crate::graph::element::FilterElement;
use crate::services::{SrgbColorSpace, StandardServices};

fn graph(xml: &str) -> FilterGraph {
    let filter = FilterElement::parse_xml(xml).unwrap();
    let mut diags = Diagnostics::new();
    FilterGraph::build(&filter, &StandardServices::default(), &mut diags).unwrap()
}

fn frame() -> Rect {
    Rect::new(-10.0, -10.0, 30.0, 30.0)
}

#[test]
fn subgraph_key_ignores_unrelated_nodes() {
    let shape = ShapeContext::rect(0.0, 0.0, 20.0, 20.0);
    let alone = graph(r#"<filter><feGaussianBlur stdDeviation="2"/></filter>"#);
    let embedded = graph(
        r#"<filter>
            <feFlood flood-color="red" result="unused"/>
            <feGaussianBlur in="SourceGraphic" stdDeviation="2"/>
        </filter>"#,
    );
    assert_eq!(
        fingerprint_subgraph(&alone, alone.output(), &shape, frame(), &SrgbColorSpace),
        fingerprint_subgraph(&embedded, embedded.output(), &shape, frame(), &SrgbColorSpace),
    );
}

#[test]
fn subgraph_key_tracks_inputs_that_change_pixels() {
    let shape = ShapeContext::rect(0.0, 0.0, 20.0, 20.0);
    let g = graph(r#"<filter><feGaussianBlur stdDeviation="2"/></filter>"#);
    let base = fingerprint_subgraph(&g, g.output(), &shape, frame(), &SrgbColorSpace);

    let wider = graph(r#"<filter><feGaussianBlur stdDeviation="3"/></filter>"#);
    assert_ne!(base, fingerprint_subgraph(&wider, wider.output(), &shape, frame(), &SrgbColorSpace));

    let red = shape.clone().with_fill(Some(Rgba::opaque(255, 0, 0)));
    assert_ne!(base, fingerprint_subgraph(&g, g.output(), &red, frame(), &SrgbColorSpace));

    let moved = frame() + kurbo::Vec2::new(1.0, 0.0);
    assert_ne!(base, fingerprint_subgraph(&g, g.output(), &shape, moved, &SrgbColorSpace));
}

struct GammaSpace;

impl ColorSpace for GammaSpace {
    fn id(&self) -> &str {
        "gamma-2.2"
    }

    fn to_linear(&self, c: f64) -> f64 {
        c.powf(2.2)
    }

    fn to_srgb(&self, c: f64) -> f64 {
        c.powf(1.0 / 2.2)
    }
}

#[test]
fn subgraph_key_includes_the_color_space() {
    let shape = ShapeContext::rect(0.0, 0.0, 20.0, 20.0);
    let g = graph(r#"<filter><feColorMatrix type="saturate" values="0.3"/></filter>"#);
    assert_ne!(
        fingerprint_subgraph(&g, g.output(), &shape, frame(), &SrgbColorSpace),
        fingerprint_subgraph(&g, g.output(), &shape, frame(), &GammaSpace),
    );
}

#[test]
fn tile_key_covers_every_parameter() {
    let tile = PatternTile::new(PatternKind::Hatch, 8.0, Rgba::BLACK);
    assert_eq!(fingerprint_tile(&tile), fingerprint_tile(&tile));
    let variants = [
        PatternTile::new(PatternKind::Grid, 8.0, Rgba::BLACK),
        PatternTile::new(PatternKind::Hatch, 9.0, Rgba::BLACK),
        PatternTile::new(PatternKind::Hatch, 8.0, Rgba::WHITE),
        tile.with_angle(45.0),
        tile.with_density(0.5),
        tile.with_background(Some(Rgba::WHITE)),
    ];
    for v in variants {
        assert_ne!(fingerprint_tile(&tile), fingerprint_tile(&v), "{v:?}");
    }
}

#[test]
fn cell_key_hashes_pixels_and_size() {
    let a = RasterImage::new(2, 2);
    let mut b = a.clone();
    b.put_pixel(1, 1, [0, 0, 0, 255]);
    let wide = RasterImage::new(4, 1);
    assert_eq!(fingerprint_cell(&a), fingerprint_cell(&RasterImage::new(2, 2)));
    assert_ne!(fingerprint_cell(&a), fingerprint_cell(&b));
    assert_ne!(fingerprint_cell(&a), fingerprint_cell(&wide));
}

#[test]
fn signed_zero_hashes_alike() {
    let key = |v: f64| {
        let mut h = StableHasher::new();
        h.write_f64(v);
        h.finish()
    };
    assert_eq!(key(0.0), key(-0.0));
    assert_ne!(key(0.0), key(1.0));
}
