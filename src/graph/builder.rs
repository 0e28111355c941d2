//! Validated primitive DAG built from a parsed `<filter>` element.

use std::collections::{BTreeMap, HashMap};

use smallvec::SmallVec;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::foundation::core::Rect;
use crate::foundation::error::GraphError;
use crate::graph::element::FilterElement;
use crate::graph::primitive::{ParseCx, Primitive, PrimitiveKind, parse_primitive};
use crate::services::ConversionServices;

/// Index of a node inside its [`FilterGraph`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position in [`FilterGraph::nodes`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Well-known filter inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum SourceKind {
    /// The filtered element's rendering.
    SourceGraphic,
    /// Alpha channel of `SourceGraphic`.
    SourceAlpha,
    /// Backdrop. Always transparent here.
    BackgroundImage,
    /// Alpha of `BackgroundImage`.
    BackgroundAlpha,
    /// Infinite plane of the fill paint.
    FillPaint,
    /// Infinite plane of the stroke paint.
    StrokePaint,
}

impl SourceKind {
    /// Map an `in`/`in2` keyword to a source, or `None` for result names.
    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "SourceGraphic" => Self::SourceGraphic,
            "SourceAlpha" => Self::SourceAlpha,
            "BackgroundImage" => Self::BackgroundImage,
            "BackgroundAlpha" => Self::BackgroundAlpha,
            "FillPaint" => Self::FillPaint,
            "StrokePaint" => Self::StrokePaint,
            _ => return None,
        })
    }
}

/// Where a primitive input comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputRef {
    /// A well-known source.
    Source(SourceKind),
    /// An earlier primitive.
    Node(NodeId),
}

/// Primitive subregion in user units. Missing components inherit the filter region.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Subregion {
    /// `x` attribute.
    pub x: Option<f64>,
    /// `y` attribute.
    pub y: Option<f64>,
    /// `width` attribute.
    pub width: Option<f64>,
    /// `height` attribute.
    pub height: Option<f64>,
}

impl Subregion {
    /// No component was given.
    pub fn is_unset(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.width.is_none() && self.height.is_none()
    }

    /// Resolve against the default region.
    pub fn resolve(&self, region: Rect) -> Rect {
        let x0 = self.x.unwrap_or(region.x0);
        let y0 = self.y.unwrap_or(region.y0);
        let w = self.width.unwrap_or(region.x1 - x0).max(0.0);
        let h = self.height.unwrap_or(region.y1 - y0).max(0.0);
        Rect::new(x0, y0, x0 + w, y0 + h)
    }
}

/// One primitive with resolved inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterNode {
    /// Declaration index.
    pub id: NodeId,
    /// `result` name when declared, else `tag#index`.
    pub label: String,
    /// Parsed parameters.
    pub primitive: Primitive,
    /// `in` then `in2`.
    pub inputs: SmallVec<[InputRef; 2]>,
    /// `result` attribute as written.
    pub declared_result: Option<String>,
    /// Subregion attributes.
    pub subregion: Subregion,
    /// `color-interpolation-filters` resolved to linearRGB.
    pub linear_rgb: bool,
}

impl FilterNode {
    /// Primitive type.
    pub fn kind(&self) -> PrimitiveKind {
        self.primitive.kind()
    }

    /// Inputs that are earlier nodes, skipping sources.
    pub fn node_inputs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().filter_map(|i| match i {
            InputRef::Node(id) => Some(*id),
            InputRef::Source(_) => None,
        })
    }
}

/// Validated primitive DAG. Nodes are stored in declaration order, which is also a topological
/// order: every input reference points at an earlier node.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
    results: BTreeMap<String, NodeId>,
}

const NON_RENDERING: [&str; 5] = ["desc", "title", "metadata", "animate", "set"];

impl FilterGraph {
    /// Build the graph for one `<filter>` element.
    ///
    /// Parameter problems are clamped and reported into `diags`; only structural problems fail.
    #[tracing::instrument(skip_all, fields(children = filter.children.len()))]
    pub fn build(
        filter: &FilterElement,
        services: &dyn ConversionServices,
        diags: &mut Diagnostics,
    ) -> Result<Self, GraphError> {
        let elements: Vec<&FilterElement> = filter
            .children
            .iter()
            .filter(|c| !NON_RENDERING.iter().any(|t| c.is(t)))
            .collect();
        if elements.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut declared_at: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, el) in elements.iter().enumerate() {
            if let Some(name) = el.get("result").filter(|s| !s.is_empty()) {
                declared_at.entry(name).or_default().push(i);
            }
        }

        let filter_linear = filter.get("color-interpolation-filters") != Some("sRGB");
        let mut seen: HashMap<&str, NodeId> = HashMap::new();
        let mut nodes = Vec::with_capacity(elements.len());

        for (i, el) in elements.iter().enumerate() {
            let id = NodeId(i as u32);
            let declared_result = el
                .get("result")
                .filter(|s| !s.is_empty())
                .map(str::to_owned);
            let label = declared_result
                .clone()
                .unwrap_or_else(|| format!("{}#{i}", el.tag));

            let primitive = {
                let mut cx = ParseCx {
                    services,
                    label: &label,
                    diags: &mut *diags,
                };
                parse_primitive(el, &mut cx)
            };
            if let Primitive::Unsupported { name } = &primitive {
                diags.warn(
                    DiagnosticCode::UnsupportedPrimitive,
                    Some(&label),
                    format!("<{name}> is not supported; passing its input through"),
                );
            }

            let resolve = |reference: Option<&str>| -> Result<InputRef, GraphError> {
                match reference.map(str::trim).filter(|s| !s.is_empty()) {
                    None if i == 0 => Ok(InputRef::Source(SourceKind::SourceGraphic)),
                    None => Ok(InputRef::Node(NodeId(i as u32 - 1))),
                    Some(name) => {
                        if let Some(src) = SourceKind::from_keyword(name) {
                            return Ok(InputRef::Source(src));
                        }
                        if let Some(&prior) = seen.get(name) {
                            return Ok(InputRef::Node(prior));
                        }
                        if declared_at.contains_key(name) {
                            Err(GraphError::Cycle {
                                node: label.clone(),
                                reference: name.to_owned(),
                            })
                        } else {
                            Err(GraphError::UnresolvedInput {
                                node: label.clone(),
                                reference: name.to_owned(),
                            })
                        }
                    }
                }
            };

            let mut inputs: SmallVec<[InputRef; 2]> = SmallVec::new();
            match primitive.kind() {
                PrimitiveKind::Flood | PrimitiveKind::Turbulence => {}
                PrimitiveKind::Merge => {
                    for merge_node in el.children.iter().filter(|c| c.is("feMergeNode")) {
                        inputs.push(resolve(merge_node.get("in"))?);
                    }
                }
                PrimitiveKind::Composite
                | PrimitiveKind::Blend
                | PrimitiveKind::DisplacementMap => {
                    inputs.push(resolve(el.get("in"))?);
                    inputs.push(resolve(el.get("in2"))?);
                }
                _ => inputs.push(resolve(el.get("in"))?),
            }

            let linear_rgb = match el.get("color-interpolation-filters") {
                Some("sRGB") => false,
                Some("linearRGB") => true,
                _ => filter_linear,
            };

            nodes.push(FilterNode {
                id,
                label,
                primitive,
                inputs,
                declared_result,
                subregion: parse_subregion(el),
                linear_rgb,
            });
            if let Some(name) = el.get("result").filter(|s| !s.is_empty()) {
                seen.insert(name, id);
            }
        }

        let results = seen
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();
        tracing::debug!(nodes = nodes.len(), "filter graph built");
        Ok(Self { nodes, results })
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// Node by id.
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn node(&self, id: NodeId) -> &FilterNode {
        &self.nodes[id.index()]
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` for a filter with no primitives.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The filter output is the last primitive's result.
    pub fn output(&self) -> NodeId {
        NodeId(self.nodes.len().saturating_sub(1) as u32)
    }

    /// Node that a `result` name refers to at the end of the chain.
    pub fn result(&self, name: &str) -> Option<NodeId> {
        self.results.get(name).copied()
    }

    /// Marks nodes whose output reaches `target` (including `target`).
    pub fn contributes_to(&self, target: NodeId) -> Vec<bool> {
        let mut marks = vec![false; self.nodes.len()];
        if self.nodes.is_empty() {
            return marks;
        }
        marks[target.index()] = true;
        for i in (0..=target.index()).rev() {
            if !marks[i] {
                continue;
            }
            for input in self.nodes[i].node_inputs() {
                marks[input.index()] = true;
            }
        }
        marks
    }

    /// Strict ancestors of `id` in topological order.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.contributes_to(id)
            .iter()
            .enumerate()
            .filter(|&(i, &m)| m && i != id.index())
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    /// Nodes that read `id` directly.
    pub fn consumers(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(move |n| n.node_inputs().any(|i| i == id))
            .map(|n| n.id)
    }
}

fn parse_subregion(el: &FilterElement) -> Subregion {
    let num = |name: &str| -> Option<f64> {
        el.get(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };
    Subregion {
        x: num("x"),
        y: num("y"),
        width: num("width").filter(|w| *w >= 0.0),
        height: num("height").filter(|h| *h >= 0.0),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/builder.rs"]
mod tests;
