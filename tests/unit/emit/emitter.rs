use super::*;
use crate::diagnostics::Level;
use crate::emit::drawingml::{EmuRect, PathCommand};
use crate::graph::element::FilterElement;
use crate::pattern::tile::PatternKind;
use crate::policy::resolve::resolve;
use crate::services::{InMemoryMediaRegistry, StandardServices, StrokeStyle};

struct Harness {
    services: StandardServices,
    policy: PolicyConfig,
    cache: ResultCache,
    ledger: MediaLedger,
    registry: InMemoryMediaRegistry,
    shape: ShapeContext,
}

impl Harness {
    fn new() -> Self {
        Self::with_policy(PolicyConfig::default())
    }

    fn with_policy(policy: PolicyConfig) -> Self {
        Self {
            services: StandardServices::default(),
            policy,
            cache: ResultCache::new(1 << 20),
            ledger: MediaLedger::new(),
            registry: InMemoryMediaRegistry::new(),
            shape: ShapeContext::rect(0.0, 0.0, 10.0, 10.0),
        }
    }

    fn run(&self, xml: &str) -> (Emission, ResolvedGraph, Diagnostics) {
        let filter = FilterElement::parse_xml(xml).unwrap();
        let mut diags = Diagnostics::new();
        let graph = FilterGraph::build(&filter, &self.services, &mut diags).unwrap();
        let mut resolved = resolve(&graph, &self.policy, &mut diags);
        let cx = EmitContext {
            shape: &self.shape,
            services: &self.services,
            policy: &self.policy,
            cache: &self.cache,
            ledger: &self.ledger,
            registry: &self.registry,
        };
        let emission = emit(&graph, &mut resolved, &cx, &mut diags);
        (emission, resolved, diags)
    }
}

#[test]
fn unfiltered_keeps_the_base_shape() {
    let h = Harness::new();
    let f = unfiltered(&h.shape, &h.services);
    assert!(matches!(f.geometry, Geometry::Custom(ref p) if p.len() == 1));
    assert_eq!(f.fill, FillXml::Solid(ColorXml::plain(Rgba::BLACK)));
    assert!(f.effects.is_empty());
    assert_eq!(f.xfrm.cx, 95_250);
}

#[test]
fn merged_shadow_becomes_outer_shadow() {
    let h = Harness::new();
    let (e, _, _) = h.run(
        r#"<filter>
            <feGaussianBlur in="SourceAlpha" stdDeviation="3"/>
            <feOffset dx="2" dy="2" result="shadow"/>
            <feMerge><feMergeNode in="shadow"/><feMergeNode in="SourceGraphic"/></feMerge>
        </filter>"#,
    );
    assert!(e.media.is_empty());
    let f = &e.fragment;
    assert_eq!(f.fill, FillXml::Solid(ColorXml::plain(Rgba::BLACK)));
    assert_eq!(f.effects.blur, None);
    let shadow = f.effects.outer_shadow.unwrap();
    assert_eq!(shadow.blur_rad, 57_150);
    assert_eq!(shadow.dist, h.services.to_emu(2.0f64.hypot(2.0)));
    assert_eq!(shadow.dir, 2_700_000);
    assert_eq!(shadow.color.color, Rgba::BLACK);
}

#[test]
fn blur_and_offset_apply_to_the_shape() {
    let h = Harness::new();
    let (e, _, _) = h.run(
        r#"<filter><feGaussianBlur stdDeviation="2"/><feOffset dx="5" dy="0"/></filter>"#,
    );
    assert_eq!(e.fragment.effects.blur, Some(38_100));
    assert_eq!(e.fragment.xfrm.x, 47_625);
}

#[test]
fn saturate_becomes_sat_mod() {
    let h = Harness::new();
    let (e, _, _) = h.run(r#"<filter><feColorMatrix type="saturate" values="0.5"/></filter>"#);
    match e.fragment.fill {
        FillXml::Solid(c) => assert_eq!(c.sat_mod, Some(50_000)),
        other => panic!("unexpected fill {other:?}"),
    }
}

#[test]
fn flood_covers_the_filter_region() {
    let h = Harness::new();
    let (e, _, _) = h.run(r#"<filter><feFlood flood-color="red"/></filter>"#);
    let f = &e.fragment;
    assert_eq!(f.geometry, Geometry::Rect);
    assert_eq!(f.fill, FillXml::Solid(ColorXml::plain(Rgba::opaque(255, 0, 0))));
    assert_eq!(
        f.xfrm,
        EmuRect {
            x: -9_525,
            y: -9_525,
            cx: 114_300,
            cy: 114_300
        }
    );
}

#[test]
fn dilate_and_erode_are_vector() {
    let h = Harness::new();
    let (grown, resolved, _) =
        h.run(r#"<filter><feMorphology operator="dilate" radius="2"/></filter>"#);
    assert_eq!(resolved.strategy(NodeId(0)).tier(), crate::policy::capability::Tier::VectorApprox);
    assert!(matches!(grown.fragment.geometry, Geometry::Custom(ref p) if p.len() == 1));
    assert!(grown.media.is_empty());

    let (gone, _, _) = h.run(r#"<filter><feMorphology operator="erode" radius="6"/></filter>"#);
    assert_eq!(gone.fragment.fill, FillXml::None);
    assert_eq!(gone.fragment.line, None);
}

#[test]
fn dilating_a_stroked_rect_strokes_only_the_outer_contour() {
    let mut h = Harness::new();
    h.shape = ShapeContext::rect(0.0, 0.0, 10.0, 10.0).with_stroke(Some(StrokeStyle {
        color: Rgba::opaque(255, 0, 0),
        width: 2.0,
    }));
    let (e, _, _) = h.run(r#"<filter><feMorphology operator="dilate" radius="2"/></filter>"#);
    let f = &e.fragment;
    let Geometry::Custom(ref paths) = f.geometry else {
        panic!("expected custom geometry, got {:?}", f.geometry);
    };
    assert_eq!(paths.len(), 1);
    let moves = paths[0]
        .commands
        .iter()
        .filter(|c| matches!(c, PathCommand::MoveTo(..)))
        .count();
    assert_eq!(moves, 1);
    assert_eq!(f.line.as_ref().map(|l| l.width), Some(19_050));
    assert!((f.xfrm.x + 19_050).abs() < 1_000, "{:?}", f.xfrm);
    assert!((f.xfrm.cx - 133_350).abs() < 2_000, "{:?}", f.xfrm);
}

#[test]
fn chained_dilates_fold_into_one_radius() {
    let h = Harness::new();
    let (chained, _, _) = h.run(
        r#"<filter>
            <feMorphology operator="dilate" radius="1"/>
            <feMorphology operator="dilate" radius="1"/>
            <feMorphology operator="dilate" radius="1"/>
        </filter>"#,
    );
    let (single, _, _) = h.run(r#"<filter><feMorphology operator="dilate" radius="3"/></filter>"#);
    assert_eq!(chained.fragment, single.fragment);

    let (undone, _, _) = h.run(
        r#"<filter>
            <feMorphology operator="dilate" radius="2"/>
            <feMorphology operator="erode" radius="2"/>
        </filter>"#,
    );
    assert_eq!(undone.fragment, unfiltered(&h.shape, &h.services));
}

#[test]
fn edge_kernel_draws_dashed_outline() {
    let h = Harness::new();
    let (e, _, _) = h.run(
        r#"<filter><feConvolveMatrix order="3" kernelMatrix="0 1 0 1 -4 1 0 1 0"/></filter>"#,
    );
    let f = &e.fragment;
    assert_eq!(f.fill, FillXml::None);
    let line = f.line.unwrap();
    assert!(line.dashed);
    assert_eq!(line.width, 9_525);
}

#[test]
fn lighting_becomes_bevel() {
    let h = Harness::new();
    let (e, _, _) = h.run(
        r#"<filter>
            <feDiffuseLighting surfaceScale="1"><feDistantLight azimuth="225" elevation="45"/></feDiffuseLighting>
        </filter>"#,
    );
    let bevel = e.fragment.bevel.unwrap();
    assert_eq!((bevel.rig, bevel.direction, bevel.material), ("threePt", "tl", "matte"));
    assert_eq!(bevel.width, 19_050);
    assert!(e.fragment.effects.inner_shadow.is_some());
}

#[test]
fn raster_output_is_embedded_once() {
    let h = Harness::new();
    let xml = r#"<filter><feTurbulence baseFrequency="0.05"/></filter>"#;
    let (first, resolved, _) = h.run(xml);
    assert_eq!(first.media.len(), 1);
    assert!(first.fragment.is_image());
    assert!(matches!(
        first.fragment.fill,
        FillXml::Blip {
            mode: BlipMode::Stretch,
            ..
        }
    ));
    assert_eq!(first.fragment.xfrm.x, -9_525);
    assert!(matches!(
        resolved.strategy(NodeId(0)),
        ResolvedStrategy::RasterFallback { emf: Some(_), .. }
    ));

    let (second, _, _) = h.run(xml);
    assert_eq!(second.media[0].relationship, first.media[0].relationship);
    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.cache.stats().generations, 1);
    assert_eq!(h.cache.stats().hits, 1);
}

#[test]
fn encode_failure_emits_placeholder() {
    let h = Harness::with_policy(PolicyConfig {
        max_raster_pixels: 16,
        ..PolicyConfig::default()
    });
    let (e, _, diags) = h.run(r#"<filter><feTurbulence baseFrequency="0.05"/></filter>"#);
    assert!(e.media.is_empty());
    assert_eq!(e.fragment.fill, FillXml::Solid(ColorXml::plain(Rgba::BLACK)));
    let failed: Vec<_> = diags
        .iter()
        .filter(|d| d.code == DiagnosticCode::EncodeFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].level, Level::Warning);
    assert!(h.registry.is_empty());
}

#[test]
fn tiled_output_uses_a_tiled_blip() {
    let h = Harness::new();
    let (e, _, _) = h.run(
        r#"<filter>
            <feFlood flood-color="blue" x="0" y="0" width="2" height="2" result="cell"/>
            <feTile in="cell"/>
        </filter>"#,
    );
    assert_eq!(e.media.len(), 1);
    assert!(matches!(
        e.fragment.fill,
        FillXml::Blip {
            mode: BlipMode::Tile { .. },
            ..
        }
    ));
}

#[test]
fn pattern_fill_is_cached_and_registered_once() {
    let cache = ResultCache::new(1 << 20);
    let ledger = MediaLedger::new();
    let registry = InMemoryMediaRegistry::new();
    let tile = PatternTile::new(PatternKind::Hatch, 8.0, Rgba::BLACK);

    let (fill, media) = pattern_fill(&tile, &cache, &ledger, &registry).unwrap();
    assert_eq!(
        fill,
        FillXml::Blip {
            relationship: media.relationship.clone(),
            mode: BlipMode::Tile { tx: 0, ty: 0 },
            alpha: None,
        }
    );
    let (_, again) = pattern_fill(&tile, &cache, &ledger, &registry).unwrap();
    assert_eq!(again, media);
    assert_eq!(registry.len(), 1);
    assert_eq!(cache.stats().generations, 1);
}

#[test]
fn translucent_pattern_ink_sets_alpha_mod() {
    let tile = PatternTile::new(PatternKind::Dot, 6.0, Rgba::new(0, 0, 0, 128));
    assert_eq!(pattern_alpha(&tile), Some(50_196));
    let opaque_bg = tile.with_background(Some(Rgba::WHITE));
    assert_eq!(pattern_alpha(&opaque_bg), None);
}
