use super::*;
use crate::services::StandardServices;

fn build(xml: &str) -> (Result<FilterGraph, GraphError>, Diagnostics) {
    let filter = FilterElement::parse_xml(xml).unwrap();
    let mut diags = Diagnostics::new();
    let g = FilterGraph::build(&filter, &StandardServices::default(), &mut diags);
    (g, diags)
}

#[test]
fn default_inputs_chain_to_previous_sibling() {
    let (g, _) = build(
        r#"<filter><feGaussianBlur stdDeviation="2"/><feOffset dx="3" dy="3"/></filter>"#,
    );
    let g = g.unwrap();
    assert_eq!(
        g.node(NodeId(0)).inputs.as_slice(),
        &[InputRef::Source(SourceKind::SourceGraphic)]
    );
    assert_eq!(g.node(NodeId(1)).inputs.as_slice(), &[InputRef::Node(NodeId(0))]);
    assert_eq!(g.output(), NodeId(1));
}

#[test]
fn named_results_and_sources_resolve() {
    let (g, _) = build(
        r#"<filter>
            <feGaussianBlur in="SourceAlpha" stdDeviation="2" result="blur"/>
            <feOffset dx="1" dy="1" result="off"/>
            <feMerge><feMergeNode in="off"/><feMergeNode in="SourceGraphic"/></feMerge>
        </filter>"#,
    );
    let g = g.unwrap();
    assert_eq!(
        g.node(NodeId(0)).inputs.as_slice(),
        &[InputRef::Source(SourceKind::SourceAlpha)]
    );
    assert_eq!(
        g.node(NodeId(2)).inputs.as_slice(),
        &[
            InputRef::Node(NodeId(1)),
            InputRef::Source(SourceKind::SourceGraphic)
        ]
    );
    assert_eq!(g.result("blur"), Some(NodeId(0)));
    assert_eq!(g.node(NodeId(0)).label, "blur");
    assert_eq!(g.node(NodeId(2)).label, "feMerge#2");
}

#[test]
fn two_input_primitives_default_in2_to_previous() {
    let (g, _) = build(
        r#"<filter><feFlood flood-color="red"/><feComposite operator="in" in2="SourceAlpha"/></filter>"#,
    );
    let g = g.unwrap();
    assert!(g.node(NodeId(0)).inputs.is_empty());
    assert_eq!(
        g.node(NodeId(1)).inputs.as_slice(),
        &[
            InputRef::Node(NodeId(0)),
            InputRef::Source(SourceKind::SourceAlpha)
        ]
    );
}

#[test]
fn self_reference_is_a_cycle() {
    let (g, _) = build(r#"<filter><feOffset in="a" result="a"/></filter>"#);
    assert_eq!(
        g.unwrap_err(),
        GraphError::Cycle {
            node: "a".to_owned(),
            reference: "a".to_owned()
        }
    );
}

#[test]
fn forward_reference_is_a_cycle() {
    let (g, _) = build(
        r#"<filter><feOffset in="later"/><feGaussianBlur result="later"/></filter>"#,
    );
    assert!(matches!(g, Err(GraphError::Cycle { .. })));
}

#[test]
fn unknown_reference_is_unresolved() {
    let (g, _) = build(r#"<filter><feOffset in="nowhere"/></filter>"#);
    assert!(matches!(g, Err(GraphError::UnresolvedInput { .. })));
}

#[test]
fn empty_filter_is_rejected() {
    let (g, _) = build("<filter><desc>nothing</desc></filter>");
    assert_eq!(g.unwrap_err(), GraphError::Empty);
}

#[test]
fn unknown_primitives_become_unsupported_nodes() {
    let (g, d) = build(r#"<filter><feImage href="x.png"/><feOffset dx="1"/></filter>"#);
    let g = g.unwrap();
    assert_eq!(g.node(NodeId(0)).kind(), PrimitiveKind::Unsupported);
    assert_eq!(g.len(), 2);
    assert!(d.has_code(DiagnosticCode::UnsupportedPrimitive));
}

#[test]
fn redeclared_results_bind_to_the_latest_earlier_node() {
    let (g, _) = build(
        r#"<filter><feOffset result="x"/><feOffset dx="1" result="x"/><feGaussianBlur in="x"/></filter>"#,
    );
    let g = g.unwrap();
    assert_eq!(g.node(NodeId(2)).inputs.as_slice(), &[InputRef::Node(NodeId(1))]);
}

#[test]
fn contributions_skip_dead_branches() {
    let (g, _) = build(
        r#"<filter>
            <feFlood result="unused"/>
            <feGaussianBlur in="SourceGraphic" stdDeviation="1" result="b"/>
            <feOffset in="b"/>
        </filter>"#,
    );
    let g = g.unwrap();
    assert_eq!(g.contributes_to(g.output()), vec![false, true, true]);
    assert_eq!(g.ancestors(NodeId(2)), vec![NodeId(1)]);
    assert_eq!(g.consumers(NodeId(1)).collect::<Vec<_>>(), vec![NodeId(2)]);
}

#[test]
fn subregion_and_color_space_are_recorded() {
    let (g, _) = build(
        r#"<filter color-interpolation-filters="sRGB"><feFlood x="1" y="2" width="3" height="4"/>
           <feOffset color-interpolation-filters="linearRGB"/></filter>"#,
    );
    let g = g.unwrap();
    let sub = g.node(NodeId(0)).subregion;
    assert_eq!(sub.resolve(Rect::new(0.0, 0.0, 100.0, 100.0)), Rect::new(1.0, 2.0, 4.0, 6.0));
    assert!(!g.node(NodeId(0)).linear_rgb);
    assert!(g.node(NodeId(1)).linear_rgb);
}
