//! Graph walk that turns resolved strategies into a DrawingML fragment.

use std::sync::{Mutex, PoisonError};

use crate::cache::fingerprint::{fingerprint_cell, fingerprint_subgraph, fingerprint_tile};
use crate::cache::store::{EmfRef, ResultCache};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::emf::encoder::encode_raster;
use crate::emit::drawingml::{
    BlipMode, Bevel3dXml, ColorXml, DrawingMlFragment, EffectListXml, FillXml, Geometry, LineXml,
    ShadowXml, alpha_amount,
};
use crate::emit::vector;
use crate::foundation::core::{BezPath, Rect, Rgba, Vec2};
use crate::foundation::error::EncodeError;
use crate::graph::builder::{FilterGraph, FilterNode, InputRef, NodeId, SourceKind};
use crate::graph::primitive::{ColorMatrix, CompositeOperator, Primitive};
use crate::pattern::classify::classify_cell;
use crate::pattern::tile::PatternTile;
use crate::policy::capability::{Approximation, NativeEffect};
use crate::policy::resolve::{PolicyConfig, ResolvedGraph, ResolvedStrategy};
use crate::raster::eval::{RasterInputs, render_subgraph, tile_cell_rect};
use crate::raster::ops;
use crate::raster::source::{Frame, frame_for};
use crate::services::{ConversionServices, MediaRegistry, RelationshipId, ShapeContext};

/// Serializes media registration so each registry sees a given blob once.
///
/// Registries may differ between calls (one per slide part); each keeps its own relationship ids.
#[derive(Debug, Default)]
pub struct MediaLedger {
    registrations: Mutex<usize>,
}

impl MediaLedger {
    /// Ledger with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationship id for `emf` in `registry`, registering it there on first sight.
    pub fn register(&self, emf: &EmfRef, registry: &dyn MediaRegistry) -> RelationshipId {
        let mut count = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(relationship) = registry.relationship_for(emf.key()) {
            return relationship;
        }
        *count += 1;
        registry.register_media(emf, emf.bytes())
    }

    /// Number of `register_media` calls made so far, across all registries.
    pub fn len(&self) -> usize {
        *self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` before the first registration.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An EMF referenced by an emitted fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedMedia {
    /// Blob handle; keeps the bytes alive.
    pub emf: EmfRef,
    /// Id issued by the registry the fragment was emitted for.
    pub relationship: RelationshipId,
}

/// Shared collaborators for one element's emission.
pub struct EmitContext<'a> {
    /// Element being filtered.
    pub shape: &'a ShapeContext,
    /// Host services.
    pub services: &'a dyn ConversionServices,
    /// Policy limits, needed for raster frame sizing.
    pub policy: &'a PolicyConfig,
    /// Shared blob cache.
    pub cache: &'a ResultCache,
    /// Registration counter and lock.
    pub ledger: &'a MediaLedger,
    /// Package part receiving the EMF blobs.
    pub registry: &'a dyn MediaRegistry,
}

/// Output of [`emit`].
#[derive(Clone, Debug, PartialEq)]
pub struct Emission {
    /// Assembled `p:spPr` content.
    pub fragment: DrawingMlFragment,
    /// Media the fragment references, one entry per distinct blob.
    pub media: Vec<EmbeddedMedia>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Paint {
    color: Rgba,
    /// Saturation factor.
    sat: Option<f64>,
    /// Degrees.
    hue: Option<f64>,
}

impl Paint {
    fn plain(color: Rgba) -> Self {
        Self {
            color,
            sat: None,
            hue: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Shadow {
    color: Rgba,
    sigma: f64,
    dx: f64,
    dy: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Line {
    paint: Paint,
    width: f64,
    dashed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Bevel {
    rig: &'static str,
    direction: &'static str,
    material: &'static str,
    depth: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct ShapeLayer {
    paths: Vec<BezPath>,
    /// Pending dilation of `paths`, applied once when the outline is needed.
    grow: f64,
    fill: Option<Paint>,
    line: Option<Line>,
    blur: f64,
    translate: (f64, f64),
    outer_shadow: Option<Shadow>,
    inner_shadow: Option<Shadow>,
    bevel: Option<Bevel>,
}

impl ShapeLayer {
    fn outline(&self) -> Vec<BezPath> {
        if self.grow > 0.0 {
            self.paths.iter().map(|p| vector::dilate(p, self.grow)).collect()
        } else {
            self.paths.clone()
        }
    }

    fn settle(&mut self) {
        if self.grow > 0.0 {
            self.paths = self.outline();
            self.grow = 0.0;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct RasterLayer {
    node: NodeId,
    tile: bool,
    blur: f64,
    translate: (f64, f64),
    outer_shadow: Option<Shadow>,
}

/// A node's output as DrawingML can carry it.
#[derive(Clone, Debug, PartialEq)]
enum Layer {
    Shape(ShapeLayer),
    Shadow(Shadow),
    Fill { color: Rgba, node: Option<NodeId> },
    Raster(RasterLayer),
    Empty,
}

fn add_sigma(a: f64, b: f64) -> f64 {
    a.hypot(b)
}

fn base_shape(shape: &ShapeContext) -> ShapeLayer {
    ShapeLayer {
        paths: vec![shape.geometry.clone()],
        grow: 0.0,
        fill: shape
            .fill
            .map(|c| Paint::plain(c.with_alpha_factor(shape.opacity))),
        line: shape.stroke.filter(|s| s.width > 0.0).map(|s| Line {
            paint: Paint::plain(s.color.with_alpha_factor(shape.opacity)),
            width: s.width,
            dashed: false,
        }),
        blur: 0.0,
        translate: (0.0, 0.0),
        outer_shadow: None,
        inner_shadow: None,
        bevel: None,
    }
}

fn source_layer(kind: SourceKind, shape: &ShapeContext) -> Layer {
    match kind {
        SourceKind::SourceGraphic => Layer::Shape(base_shape(shape)),
        SourceKind::SourceAlpha => Layer::Shadow(Shadow {
            color: Rgba::new(0, 0, 0, shape.paint().a),
            sigma: 0.0,
            dx: 0.0,
            dy: 0.0,
        }),
        SourceKind::FillPaint => Layer::Fill {
            color: shape.fill.unwrap_or(Rgba::TRANSPARENT),
            node: None,
        },
        SourceKind::StrokePaint => Layer::Fill {
            color: shape.stroke.map_or(Rgba::TRANSPARENT, |s| s.color),
            node: None,
        },
        SourceKind::BackgroundImage | SourceKind::BackgroundAlpha => Layer::Empty,
    }
}

/// Fragment for the element with its filter dropped.
pub fn unfiltered(shape: &ShapeContext, services: &dyn ConversionServices) -> DrawingMlFragment {
    shape_fragment(&base_shape(shape), services)
}

/// Walk the resolved graph in order and build the element's shape properties.
///
/// Raster nodes are only rendered when their pixels reach the output; their strategies get the
/// resulting [`EmfRef`] filled in.
#[tracing::instrument(skip_all, fields(nodes = graph.len()))]
pub fn emit(
    graph: &FilterGraph,
    resolved: &mut ResolvedGraph,
    cx: &EmitContext<'_>,
    diags: &mut Diagnostics,
) -> Emission {
    let mut layers: Vec<Layer> = Vec::with_capacity(graph.len());
    for node in graph.nodes() {
        let inputs: Vec<Layer> = node
            .inputs
            .iter()
            .map(|input| match input {
                InputRef::Source(kind) => source_layer(*kind, cx.shape),
                InputRef::Node(id) => layers[id.index()].clone(),
            })
            .collect();
        let layer = match resolved.strategy(node.id) {
            ResolvedStrategy::RasterFallback { .. } => Layer::Raster(RasterLayer {
                node: node.id,
                tile: matches!(node.primitive, Primitive::Tile),
                blur: 0.0,
                translate: (0.0, 0.0),
                outer_shadow: None,
            }),
            ResolvedStrategy::Native { effect }
            | ResolvedStrategy::VectorApprox {
                approx: Approximation::NativeOverInput(effect),
                ..
            } => apply_native(*effect, node, inputs),
            ResolvedStrategy::VectorApprox { approx, .. } => {
                apply_approx(*approx, node, inputs, cx.services)
            }
        };
        layers.push(layer);
    }

    let output = layers.pop().unwrap_or(Layer::Empty);
    let mut media = Vec::new();
    let fragment = match output {
        Layer::Shape(s) => shape_fragment(&s, cx.services),
        Layer::Shadow(sh) => shape_fragment(&shadow_as_shape(cx.shape, sh), cx.services),
        Layer::Fill { color, node } => {
            let frame = frame_for(graph, graph.output(), cx.shape, cx.policy);
            let region = node.map_or(frame.rect(), |id| {
                graph.node(id).subregion.resolve(frame.rect())
            });
            rect_fragment(region, FillXml::Solid(ColorXml::plain(color)), cx.services)
        }
        Layer::Raster(r) => match materialize(graph, &r, cx) {
            Ok((emf, frame, mode, alpha)) => {
                if let ResolvedStrategy::RasterFallback { emf: slot, .. } =
                    resolved.strategy_mut(r.node)
                {
                    *slot = Some(emf.clone());
                }
                let relationship = cx.ledger.register(&emf, cx.registry);
                tracing::debug!(key = %emf.key(), rel = %relationship, "raster fallback embedded");
                media.push(EmbeddedMedia {
                    emf,
                    relationship: relationship.clone(),
                });
                raster_fragment(&r, &frame, relationship, mode, alpha, cx.services)
            }
            Err(e) => {
                let label = graph.node(r.node).label.as_str();
                diags.warn(
                    DiagnosticCode::EncodeFailed,
                    Some(label),
                    format!("{e}; solid placeholder emitted"),
                );
                placeholder(cx.shape, cx.services)
            }
        },
        Layer::Empty => {
            let mut s = base_shape(cx.shape);
            s.fill = None;
            s.line = None;
            shape_fragment(&s, cx.services)
        }
    };
    Emission { fragment, media }
}

fn apply_native(effect: NativeEffect, node: &FilterNode, mut inputs: Vec<Layer>) -> Layer {
    let first = if inputs.is_empty() {
        Layer::Empty
    } else {
        inputs.remove(0)
    };
    match (&node.primitive, first) {
        (Primitive::Blur { std_dev }, layer) => {
            let sigma = std_dev.0.max(std_dev.1);
            match layer {
                Layer::Shape(mut s) => {
                    s.blur = add_sigma(s.blur, sigma);
                    Layer::Shape(s)
                }
                Layer::Shadow(mut sh) => {
                    sh.sigma = add_sigma(sh.sigma, sigma);
                    Layer::Shadow(sh)
                }
                Layer::Raster(mut r) => {
                    r.blur = add_sigma(r.blur, sigma);
                    Layer::Raster(r)
                }
                other => other,
            }
        }
        (Primitive::Offset { dx, dy }, layer) => match layer {
            Layer::Shape(mut s) => {
                s.translate = (s.translate.0 + dx, s.translate.1 + dy);
                Layer::Shape(s)
            }
            Layer::Shadow(mut sh) => {
                sh.dx += dx;
                sh.dy += dy;
                Layer::Shadow(sh)
            }
            Layer::Raster(mut r) => {
                r.translate = (r.translate.0 + dx, r.translate.1 + dy);
                Layer::Raster(r)
            }
            other => other,
        },
        (
            Primitive::DropShadow {
                dx,
                dy,
                std_dev,
                color,
            },
            layer,
        ) => {
            let shadow = Shadow {
                color: *color,
                sigma: std_dev.0.max(std_dev.1),
                dx: *dx,
                dy: *dy,
            };
            match layer {
                Layer::Shape(mut s) => {
                    s.outer_shadow = Some(shadow);
                    Layer::Shape(s)
                }
                Layer::Raster(mut r) => {
                    r.outer_shadow = Some(shadow);
                    Layer::Raster(r)
                }
                other => other,
            }
        }
        (Primitive::Flood { color }, _) => Layer::Fill {
            color: *color,
            node: Some(node.id),
        },
        (Primitive::ColorMatrix(m), Layer::Shape(mut s)) => {
            let tweak = |p: &mut Paint| match m {
                ColorMatrix::Saturate(v) => p.sat = Some(p.sat.unwrap_or(1.0) * v),
                ColorMatrix::HueRotate(d) => p.hue = Some(p.hue.unwrap_or(0.0) + d),
                _ => {}
            };
            if let Some(p) = s.fill.as_mut() {
                tweak(p);
            }
            if let Some(l) = s.line.as_mut() {
                tweak(&mut l.paint);
            }
            Layer::Shape(s)
        }
        (
            Primitive::Composite {
                operator: CompositeOperator::In | CompositeOperator::Atop,
                ..
            },
            Layer::Fill { color, .. },
        ) if effect == NativeEffect::Recolor => match inputs.pop() {
            Some(Layer::Shadow(mut sh)) => {
                sh.color = Rgba::new(color.r, color.g, color.b, scale_alpha(color.a, sh.color.a));
                Layer::Shadow(sh)
            }
            Some(Layer::Shape(mut s)) => {
                let a = s.fill.map_or(255, |p| p.color.a);
                s.fill = Some(Paint::plain(Rgba::new(
                    color.r,
                    color.g,
                    color.b,
                    scale_alpha(color.a, a),
                )));
                Layer::Shape(s)
            }
            Some(other) => other,
            None => Layer::Empty,
        },
        (_, first) if effect == NativeEffect::EffectUnion => {
            inputs.insert(0, first);
            union(inputs)
        }
        (_, first) => first,
    }
}

fn scale_alpha(a: u8, b: u8) -> u8 {
    ((u16::from(a) * u16::from(b) + 127) / 255) as u8
}

/// Several layers on one shape: the shape keeps its paint and a lone shadow beneath it becomes its
/// `outerShdw`.
fn union(layers: Vec<Layer>) -> Layer {
    let mut shape: Option<ShapeLayer> = None;
    let mut shadow: Option<Shadow> = None;
    let mut other: Option<Layer> = None;
    for layer in layers {
        match layer {
            Layer::Shape(s) if shape.is_none() => shape = Some(s),
            Layer::Shadow(sh) if shadow.is_none() => shadow = Some(sh),
            Layer::Empty => {}
            l => {
                other.get_or_insert(l);
            }
        }
    }
    match (shape, shadow) {
        (Some(mut s), sh) => {
            if s.outer_shadow.is_none() {
                s.outer_shadow = sh;
            }
            Layer::Shape(s)
        }
        (None, Some(sh)) => Layer::Shadow(sh),
        (None, None) => other.unwrap_or(Layer::Empty),
    }
}

fn apply_approx(
    approx: Approximation,
    node: &FilterNode,
    inputs: Vec<Layer>,
    services: &dyn ConversionServices,
) -> Layer {
    let first = inputs.into_iter().next().unwrap_or(Layer::Empty);
    let space = node.linear_rgb.then(|| services.color_space());
    match (approx, &node.primitive, first) {
        (Approximation::OutlineExpand, Primitive::Morphology { radius, .. }, Layer::Shape(mut s)) => {
            s.grow += radius.0.max(radius.1);
            Layer::Shape(s)
        }
        (Approximation::OutlineInset, Primitive::Morphology { radius, .. }, Layer::Shape(mut s)) => {
            let mut r = radius.0.max(radius.1);
            let undone = r.min(s.grow);
            s.grow -= undone;
            r -= undone;
            if r <= 0.0 {
                return Layer::Shape(s);
            }
            s.paths = s
                .paths
                .iter()
                .map(|p| vector::erode(p, r))
                .filter(|p| !p.elements().is_empty())
                .collect();
            if s.paths.is_empty() {
                Layer::Empty
            } else {
                Layer::Shape(s)
            }
        }
        (Approximation::DashedEdgeOutline, _, Layer::Shape(mut s)) => {
            let paint = s
                .fill
                .or(s.line.map(|l| l.paint))
                .unwrap_or(Paint::plain(Rgba::BLACK));
            s.fill = None;
            s.line = Some(Line {
                paint,
                width: 1.0,
                dashed: true,
            });
            Layer::Shape(s)
        }
        (
            Approximation::Bevel3d,
            Primitive::DiffuseLighting(l) | Primitive::SpecularLighting(l),
            Layer::Shape(mut s),
        ) => {
            let (rig, direction) = vector::light_rig(&l.light);
            let material = if matches!(node.primitive, Primitive::SpecularLighting(_)) {
                "plastic"
            } else {
                "matte"
            };
            s.bevel = Some(Bevel {
                rig,
                direction,
                material,
                depth: (l.surface_scale.abs() * 2.0).max(1.0),
            });
            s.inner_shadow = Some(Shadow {
                color: Rgba::new(0, 0, 0, 64),
                sigma: 2.0,
                dx: 1.0,
                dy: 1.0,
            });
            Layer::Shape(s)
        }
        (Approximation::VertexJitter, Primitive::DisplacementMap { scale, .. }, Layer::Shape(mut s)) => {
            let seed = u64::from(node.id.0);
            s.settle();
            s.paths = s
                .paths
                .iter()
                .enumerate()
                .map(|(i, p)| vector::jitter(p, *scale, seed.wrapping_mul(31).wrapping_add(i as u64)))
                .collect();
            Layer::Shape(s)
        }
        (Approximation::BakedColor, primitive, layer) => {
            let bake = |c: Rgba| match primitive {
                Primitive::ColorMatrix(m) => vector::bake_matrix(c, m, space),
                Primitive::ComponentTransfer { funcs } => vector::bake_transfer(c, funcs, space),
                _ => c,
            };
            match layer {
                Layer::Shape(mut s) => {
                    if let Some(p) = s.fill.as_mut() {
                        p.color = bake(p.color);
                    }
                    if let Some(l) = s.line.as_mut() {
                        l.paint.color = bake(l.paint.color);
                    }
                    Layer::Shape(s)
                }
                Layer::Shadow(mut sh) => {
                    sh.color = bake(sh.color);
                    Layer::Shadow(sh)
                }
                Layer::Fill { color, node } => Layer::Fill {
                    color: bake(color),
                    node,
                },
                other => other,
            }
        }
        (_, _, layer) => layer,
    }
}

/// Output that is only a shadow: the shape silhouette in the shadow colour, blurred and moved.
fn shadow_as_shape(shape: &ShapeContext, sh: Shadow) -> ShapeLayer {
    ShapeLayer {
        paths: vec![shape.geometry.clone()],
        grow: 0.0,
        fill: Some(Paint::plain(sh.color)),
        line: None,
        blur: sh.sigma,
        translate: (sh.dx, sh.dy),
        outer_shadow: None,
        inner_shadow: None,
        bevel: None,
    }
}

fn color_xml(p: Paint) -> ColorXml {
    ColorXml {
        color: p.color,
        sat_mod: p.sat.map(|s| (s * 100_000.0).round() as i64),
        hue_off: p.hue.map(|d| (d.rem_euclid(360.0) * 60_000.0).round() as i64),
    }
}

fn shadow_xml(sh: &Shadow, services: &dyn ConversionServices) -> ShadowXml {
    let k = vector::length_scale(services);
    let (dist, dir) = vector::polar(sh.dx, sh.dy);
    ShadowXml {
        blur_rad: services.to_emu(2.0 * sh.sigma * k),
        dist: services.to_emu(dist * k),
        dir,
        color: ColorXml::plain(sh.color),
    }
}

fn effects_xml(
    blur: f64,
    inner: Option<&Shadow>,
    outer: Option<&Shadow>,
    services: &dyn ConversionServices,
) -> EffectListXml {
    let k = vector::length_scale(services);
    EffectListXml {
        blur: (blur > 0.0).then(|| services.to_emu(2.0 * blur * k)),
        inner_shadow: inner.map(|s| shadow_xml(s, services)),
        outer_shadow: outer.map(|s| shadow_xml(s, services)),
    }
}

fn shape_fragment(s: &ShapeLayer, services: &dyn ConversionServices) -> DrawingMlFragment {
    let (xfrm, paths) = vector::to_emu_geometry(&s.outline(), s.translate, services);
    let k = vector::length_scale(services);
    DrawingMlFragment {
        xfrm,
        geometry: Geometry::Custom(paths),
        fill: s
            .fill
            .map_or(FillXml::None, |p| FillXml::Solid(color_xml(p))),
        line: s.line.map(|l| LineXml {
            width: services.to_emu(l.width * k),
            color: color_xml(l.paint),
            dashed: l.dashed,
        }),
        effects: effects_xml(
            s.blur,
            s.inner_shadow.as_ref(),
            s.outer_shadow.as_ref(),
            services,
        ),
        bevel: s.bevel.map(|b| {
            let depth = services.to_emu(b.depth * k);
            Bevel3dXml {
                rig: b.rig,
                direction: b.direction,
                material: b.material,
                width: depth,
                height: depth,
            }
        }),
    }
}

fn rect_fragment(r: Rect, fill: FillXml, services: &dyn ConversionServices) -> DrawingMlFragment {
    let placed = services.current_transform().transform_rect_bbox(r);
    DrawingMlFragment {
        xfrm: vector::emu_rect(placed, services),
        geometry: Geometry::Rect,
        fill,
        line: None,
        effects: EffectListXml::default(),
        bevel: None,
    }
}

fn placeholder(shape: &ShapeContext, services: &dyn ConversionServices) -> DrawingMlFragment {
    let mut s = base_shape(shape);
    s.fill = Some(Paint::plain(shape.paint()));
    s.line = None;
    shape_fragment(&s, services)
}

fn raster_fragment(
    r: &RasterLayer,
    frame: &Frame,
    relationship: RelationshipId,
    mode: BlipMode,
    alpha: Option<i64>,
    services: &dyn ConversionServices,
) -> DrawingMlFragment {
    let region = frame.rect() + Vec2::new(r.translate.0, r.translate.1);
    let mut f = rect_fragment(
        region,
        FillXml::Blip {
            relationship,
            mode,
            alpha,
        },
        services,
    );
    f.effects = effects_xml(r.blur, None, r.outer_shadow.as_ref(), services);
    f
}

/// Render and encode the pixels behind a raster layer through the cache.
fn materialize(
    graph: &FilterGraph,
    r: &RasterLayer,
    cx: &EmitContext<'_>,
) -> Result<(EmfRef, Frame, BlipMode, Option<i64>), EncodeError> {
    let frame = frame_for(graph, r.node, cx.shape, cx.policy);
    let max_pixels = cx.policy.max_raster_pixels;
    let inputs = RasterInputs {
        shape: cx.shape,
        frame,
        color_space: cx.services.color_space(),
        max_pixels,
    };

    if r.tile {
        if let Some(InputRef::Node(cell_node)) = graph.node(r.node).inputs.first() {
            let rect = tile_cell_rect(graph, r.node, &frame);
            let source = render_subgraph(graph, *cell_node, &inputs)?;
            let cell = ops::crop(&source, rect);
            if cell.width() == 0 || cell.height() == 0 {
                return Err(EncodeError::MalformedTile("empty tile cell".to_owned()));
            }
            let offset = |px: u32| cx.services.to_emu(f64::from(px));
            let mode = BlipMode::Tile {
                tx: offset(rect.0),
                ty: offset(rect.1),
            };
            return match classify_cell(&cell) {
                Some(tile) => {
                    tracing::debug!(kind = ?tile.kind, spacing = tile.spacing, "tile cell matched a pattern");
                    let emf = cx
                        .cache
                        .try_get_or_insert(fingerprint_tile(&tile), || tile.encode())?;
                    Ok((emf, frame, mode, pattern_alpha(&tile)))
                }
                None => {
                    let emf = cx.cache.try_get_or_insert(fingerprint_cell(&cell), || {
                        encode_raster(&cell, u64::from(max_pixels))
                    })?;
                    Ok((emf, frame, mode, None))
                }
            };
        }
    }

    let key = fingerprint_subgraph(
        graph,
        r.node,
        cx.shape,
        frame.rect(),
        cx.services.color_space(),
    );
    let emf = cx.cache.try_get_or_insert(key, || {
        let image = render_subgraph(graph, r.node, &inputs)?;
        encode_raster(&image, u64::from(max_pixels))
    })?;
    Ok((emf, frame, BlipMode::Stretch, None))
}

/// Ink alpha that the EMF's `COLORREF`s cannot carry.
fn pattern_alpha(tile: &PatternTile) -> Option<i64> {
    match tile.background {
        Some(bg) if bg.a != tile.color.a => None,
        _ => alpha_amount(tile.color.a),
    }
}

/// Tiled picture fill for a pattern paint.
pub fn pattern_fill(
    tile: &PatternTile,
    cache: &ResultCache,
    ledger: &MediaLedger,
    registry: &dyn MediaRegistry,
) -> Result<(FillXml, EmbeddedMedia), EncodeError> {
    let emf = cache.try_get_or_insert(fingerprint_tile(tile), || tile.encode())?;
    let relationship = ledger.register(&emf, registry);
    let fill = FillXml::Blip {
        relationship: relationship.clone(),
        mode: BlipMode::Tile { tx: 0, ty: 0 },
        alpha: pattern_alpha(tile),
    };
    Ok((fill, EmbeddedMedia { emf, relationship }))
}

#[cfg(test)]
#[path = "../../tests/unit/emit/emitter.rs"]
mod tests;
