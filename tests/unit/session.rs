use super::*;
use crate::foundation::core::Rgba;
use crate::foundation::error::EncodeError;
use crate::policy::capability::Tier;
use crate::services::{InMemoryMediaRegistry, StandardServices};

#[test]
fn options_default_and_partial_json() {
    let d = ConverterOptions::default();
    assert_eq!(d.workers, None);
    assert_eq!(d.cache_max_bytes, 64 * 1024 * 1024);
    assert_eq!(d.policy, PolicyConfig::default());

    let opts =
        ConverterOptions::from_json_str(r#"{"workers": 2, "policy": {"max_chain_cost": 10}}"#)
            .unwrap();
    assert_eq!(opts.workers, Some(2));
    assert_eq!(opts.policy.max_chain_cost, 10);
    assert!(opts.policy.allow_raster_fallback);
    assert_eq!(opts.cache_max_bytes, d.cache_max_bytes);
}

#[test]
fn options_reject_bad_values() {
    let zero_workers = ConverterOptions::from_json_str(r#"{"workers": 0}"#).unwrap_err();
    assert!(matches!(zero_workers, FxError::Validation(_)));

    let zero_pixels =
        ConverterOptions::from_json_str(r#"{"policy": {"max_raster_pixels": 0}}"#).unwrap_err();
    assert!(matches!(zero_pixels, FxError::Validation(_)));

    let garbage = ConverterOptions::from_json_str("{not json").unwrap_err();
    assert!(matches!(garbage, FxError::Other(_)));
    assert!(garbage.to_string().contains("converter options"));

    let err = FilterConverter::new(ConverterOptions {
        workers: Some(0),
        ..ConverterOptions::default()
    })
    .err()
    .unwrap();
    assert!(err.to_string().contains("'workers' must be >= 1"));
}

#[test]
fn convert_reports_one_strategy_per_primitive() {
    let converter = FilterConverter::new(ConverterOptions::default()).unwrap();
    let filter = FilterElement::parse_xml(
        r#"<filter>
            <feGaussianBlur in="SourceAlpha" stdDeviation="2" result="soft"/>
            <feOffset dx="1" dy="1"/>
            <feMerge><feMergeNode/><feMergeNode in="SourceGraphic"/></feMerge>
        </filter>"#,
    )
    .unwrap();
    let shape = ShapeContext::rect(0.0, 0.0, 20.0, 10.0);
    let media = InMemoryMediaRegistry::new();
    let out = converter.convert(&filter, &shape, &StandardServices::default(), &media);

    let labels: Vec<&str> = out.strategies.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["soft", "feOffset#1", "feMerge#2"]);
    assert_eq!(out.strategies[0].kind, PrimitiveKind::Blur);
    assert!(out.strategies.iter().all(|s| s.strategy.tier() == Tier::Native));
    assert!(out.media.is_empty());
    assert!(out.fragment.effects.outer_shadow.is_some());
    assert_eq!(out.diagnostics.errors().count(), 0);
}

#[test]
fn rejected_graph_keeps_the_shape() {
    let converter = FilterConverter::new(ConverterOptions::default()).unwrap();
    let filter = FilterElement::parse_xml("<filter><desc>nothing</desc></filter>").unwrap();
    let shape = ShapeContext::rect(0.0, 0.0, 5.0, 5.0).with_fill(Some(Rgba::WHITE));
    let services = StandardServices::default();
    let out = converter.convert(&filter, &shape, &services, &InMemoryMediaRegistry::new());

    assert!(out.strategies.is_empty());
    assert_eq!(out.fragment, unfiltered(&shape, &services));
    assert!(out.diagnostics.has_code(DiagnosticCode::GraphRejected));
    assert_eq!(out.diagnostics.errors().count(), 1);
}

#[test]
fn pattern_fill_goes_through_the_shared_cache() {
    let converter = FilterConverter::new(ConverterOptions::default()).unwrap();
    let media = InMemoryMediaRegistry::new();
    let tile = PatternTile::new(crate::pattern::tile::PatternKind::Grid, 10.0, Rgba::BLACK);
    let (_, first) = converter.pattern_fill(&tile, &media).unwrap();
    let (_, second) = converter.pattern_fill(&tile, &media).unwrap();
    assert_eq!(first, second);
    assert_eq!(converter.registered_media(), 1);
    assert_eq!(converter.cache_stats().hits, 1);

    let bad = PatternTile::new(crate::pattern::tile::PatternKind::Grid, 0.5, Rgba::BLACK);
    assert!(matches!(
        converter.pattern_fill(&bad, &media),
        Err(FxError::Encode(EncodeError::MalformedTile(_)))
    ));
}

#[test]
fn each_registry_receives_its_own_copy_of_a_shared_blob() {
    let converter = FilterConverter::new(ConverterOptions::default()).unwrap();
    let filter = FilterElement::parse_xml(
        r#"<filter><feTurbulence baseFrequency="0.1" numOctaves="2" seed="3"/></filter>"#,
    )
    .unwrap();
    let shape = ShapeContext::rect(0.0, 0.0, 16.0, 16.0);
    let services = StandardServices::default();
    let slide1 = InMemoryMediaRegistry::new();
    let slide2 = InMemoryMediaRegistry::new();

    let a = converter.convert(&filter, &shape, &services, &slide1);
    let again = converter.convert(&filter, &shape, &services, &slide1);
    let b = converter.convert(&filter, &shape, &services, &slide2);

    assert_eq!(slide1.len(), 1);
    assert_eq!(slide2.len(), 1);
    assert_eq!(a.media[0].relationship, again.media[0].relationship);
    assert_eq!(b.media[0].relationship, slide2.parts()[0].relationship);
    assert_eq!(a.media[0].emf.key(), b.media[0].emf.key());
    assert_eq!(converter.registered_media(), 2);
    assert_eq!(converter.cache_stats().generations, 1);
}
