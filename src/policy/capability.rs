//! Per-primitive capability table.
//!
//! Each row answers one question: given what the inputs look like at the DrawingML level, what is
//! the cheapest way to express this primitive? Adding a primitive means adding a row here.

use crate::graph::builder::SourceKind;
use crate::graph::primitive::{
    BlendMode, ColorMatrix, CompositeOperator, MorphologyOperator, Primitive,
};
use crate::policy::resolve::PolicyConfig;

/// Strategy tiers, cheapest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// A DrawingML effect or shape property.
    Native,
    /// Vector construction approximating the primitive.
    VectorApprox,
    /// EMF picture rendered on the CPU.
    RasterFallback,
}

/// DrawingML constructs a node can map to directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeEffect {
    /// `a:blur` on the shape.
    Blur,
    /// Shape offset.
    Translate,
    /// `a:outerShdw` from `feDropShadow`.
    OuterShadow,
    /// `blurRad` of the pending shadow.
    ShadowBlur,
    /// `dist`/`dir` of the pending shadow.
    ShadowOffset,
    /// Flood colour composited into a shadow or shape.
    Recolor,
    /// `a:solidFill` from `feFlood`.
    SolidFill,
    /// `a:satMod` / `a:hueOff` on the fill colour.
    ColorTransform,
    /// Several effect layers on one shape.
    EffectUnion,
}

impl NativeEffect {
    /// Short name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::Translate => "translate",
            Self::OuterShadow => "outerShdw",
            Self::ShadowBlur => "outerShdw.blurRad",
            Self::ShadowOffset => "outerShdw.dist",
            Self::Recolor => "recolor",
            Self::SolidFill => "solidFill",
            Self::ColorTransform => "colorTransform",
            Self::EffectUnion => "effectLst",
        }
    }
}

/// Vector constructions that stand in for a primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Approximation {
    /// Outline grown by a morphology radius.
    OutlineExpand,
    /// Outline shrunk by a morphology radius.
    OutlineInset,
    /// Edges traced with a dashed line.
    DashedEdgeOutline,
    /// Lighting drawn as a bevel.
    Bevel3d,
    /// Path vertices moved by a small displacement.
    VertexJitter,
    /// Colour operation folded into a solid paint.
    BakedColor,
    /// Output equals the input.
    Passthrough,
    /// A native effect applied to content an earlier node already approximated or rasterized.
    NativeOverInput(NativeEffect),
}

impl Approximation {
    /// Human-readable phrase for diagnostics.
    pub fn description(self) -> String {
        match self {
            Self::OutlineExpand => "outline expanded by stroking".to_owned(),
            Self::OutlineInset => "outline inset by scaling".to_owned(),
            Self::DashedEdgeOutline => "edges drawn as a dashed outline".to_owned(),
            Self::Bevel3d => "3D bevel with light rig".to_owned(),
            Self::VertexJitter => "path vertices displaced".to_owned(),
            Self::BakedColor => "colour baked into the fill".to_owned(),
            Self::Passthrough => "input passed through".to_owned(),
            Self::NativeOverInput(e) => format!("{} applied over approximated input", e.name()),
        }
    }
}

/// What a node's output looks like in DrawingML terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerClass {
    /// The element's own geometry and paint, possibly with effects.
    Shape,
    /// An `a:outerShdw` that has not been placed under a shape yet.
    Shadow,
    /// A solid colour covering the filter region.
    Fill,
    /// Pixels; only an image fill can carry it.
    Raster,
    /// Transparent.
    Empty,
}

impl LayerClass {
    /// Class of a well-known filter input.
    pub fn of_source(source: SourceKind) -> Self {
        match source {
            SourceKind::SourceGraphic => Self::Shape,
            SourceKind::SourceAlpha => Self::Shadow,
            SourceKind::FillPaint | SourceKind::StrokePaint => Self::Fill,
            SourceKind::BackgroundImage | SourceKind::BackgroundAlpha => Self::Empty,
        }
    }
}

/// Outcome of one table lookup.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Capability {
    Native(NativeEffect, LayerClass),
    Vector(Approximation, LayerClass),
    /// Rasterize; the message explains why no vector form applies.
    Raster(String),
}

/// Native effects that still make sense on an image-filled shape.
pub(crate) fn native_over_raster(primitive: &Primitive) -> Option<NativeEffect> {
    match primitive {
        Primitive::Blur { .. } => Some(NativeEffect::Blur),
        Primitive::Offset { .. } => Some(NativeEffect::Translate),
        Primitive::DropShadow { .. } => Some(NativeEffect::OuterShadow),
        _ => None,
    }
}

/// Result of merging layers onto one shape, or `None` when they cannot share one.
fn union_of(classes: &[LayerClass]) -> Option<LayerClass> {
    let count = |c: LayerClass| classes.iter().filter(|&&x| x == c).count();
    if count(LayerClass::Fill) > 0 || count(LayerClass::Raster) > 0 {
        return None;
    }
    let (shapes, shadows) = (count(LayerClass::Shape), count(LayerClass::Shadow));
    match (shapes, shadows) {
        (0, 0) => Some(LayerClass::Empty),
        (0, 1) => Some(LayerClass::Shadow),
        (1, 0 | 1) => Some(LayerClass::Shape),
        _ => None,
    }
}

/// Look up the cheapest supported strategy for `primitive` given its input classes.
///
/// Raster inputs are handled by the caller; this only sees vector-expressible inputs.
pub(crate) fn assess(
    primitive: &Primitive,
    inputs: &[LayerClass],
    cfg: &PolicyConfig,
) -> Capability {
    use Capability::{Native, Raster, Vector};
    use LayerClass as L;

    let first = inputs.first().copied().unwrap_or(L::Shape);
    let tag = primitive.kind().tag();
    let passthrough = || Vector(Approximation::Passthrough, first);
    if first == L::Empty && !inputs.is_empty() && inputs.iter().all(|c| *c == L::Empty) {
        return passthrough();
    }

    match primitive {
        Primitive::Blur { .. } => match first {
            L::Shape => Native(NativeEffect::Blur, L::Shape),
            L::Shadow => Native(NativeEffect::ShadowBlur, L::Shadow),
            _ => passthrough(),
        },
        Primitive::Offset { .. } => match first {
            L::Shape => Native(NativeEffect::Translate, L::Shape),
            L::Shadow => Native(NativeEffect::ShadowOffset, L::Shadow),
            _ => passthrough(),
        },
        Primitive::DropShadow { .. } => match first {
            L::Shape => Native(NativeEffect::OuterShadow, L::Shape),
            _ => Raster(format!("{tag} of a non-shape input")),
        },
        Primitive::Flood { .. } => Native(NativeEffect::SolidFill, L::Fill),
        Primitive::ColorMatrix(m) => match (first, m) {
            (L::Shape, ColorMatrix::Saturate(_) | ColorMatrix::HueRotate(_)) => {
                Native(NativeEffect::ColorTransform, L::Shape)
            }
            (L::Shape | L::Shadow | L::Fill, _) => Vector(Approximation::BakedColor, first),
            _ => passthrough(),
        },
        Primitive::ComponentTransfer { .. } => match first {
            L::Shape | L::Shadow | L::Fill => Vector(Approximation::BakedColor, first),
            _ => passthrough(),
        },
        Primitive::Merge
        | Primitive::Composite {
            operator: CompositeOperator::Over,
            ..
        }
        | Primitive::Blend {
            mode: BlendMode::Normal,
        } => match union_of(inputs) {
            Some(class) => Native(NativeEffect::EffectUnion, class),
            None => Raster(format!("{tag} inputs cannot share one effect list")),
        },
        Primitive::Composite {
            operator: CompositeOperator::In | CompositeOperator::Atop,
            ..
        } => match inputs {
            [L::Fill, target @ (L::Shadow | L::Shape)] => Native(NativeEffect::Recolor, *target),
            _ => Raster(format!("{tag} operator needs pixel compositing")),
        },
        Primitive::Composite { .. } | Primitive::Blend { .. } => {
            Raster(format!("{tag} operator needs pixel compositing"))
        }
        Primitive::Morphology { operator, radius } => {
            let r = radius.0.max(radius.1);
            if first != L::Shape {
                Raster(format!("{tag} of a non-shape input"))
            } else if r <= 0.0 {
                passthrough()
            } else if r <= cfg.morphology_vector_max_radius {
                let approx = match operator {
                    MorphologyOperator::Dilate => Approximation::OutlineExpand,
                    MorphologyOperator::Erode => Approximation::OutlineInset,
                };
                Vector(approx, L::Shape)
            } else {
                Raster(format!(
                    "{tag} radius {r} exceeds vector limit {}",
                    cfg.morphology_vector_max_radius
                ))
            }
        }
        Primitive::ConvolveMatrix(p) => {
            if first == L::Shape && p.is_edge_kernel() {
                Vector(Approximation::DashedEdgeOutline, L::Shape)
            } else {
                Raster(format!(
                    "{tag} {}x{} kernel is not an edge detector",
                    p.order.0, p.order.1
                ))
            }
        }
        Primitive::DiffuseLighting(_) | Primitive::SpecularLighting(_) => match first {
            L::Shape => Vector(Approximation::Bevel3d, L::Shape),
            _ => Raster(format!("{tag} of a non-shape input")),
        },
        Primitive::DisplacementMap { scale, .. } => {
            if first == L::Shape && scale.abs() <= cfg.displacement_vector_max_scale {
                Vector(Approximation::VertexJitter, L::Shape)
            } else {
                Raster(format!(
                    "{tag} scale {scale} exceeds vector limit {}",
                    cfg.displacement_vector_max_scale
                ))
            }
        }
        Primitive::Tile => Raster(format!("{tag} needs a pattern fill")),
        Primitive::Turbulence { .. } => Raster(format!("{tag} is procedural noise")),
        Primitive::Unsupported { .. } => passthrough(),
    }
}

/// Estimated work for a node at a tier.
pub(crate) fn cost(primitive: &Primitive, tier: Tier) -> u32 {
    match tier {
        Tier::Native => 1,
        Tier::VectorApprox => match primitive {
            Primitive::DiffuseLighting(_) | Primitive::SpecularLighting(_) => 8,
            _ => 4,
        },
        Tier::RasterFallback => {
            let extra = match primitive {
                Primitive::ConvolveMatrix(p) => (p.order.0 * p.order.1) as u32,
                Primitive::Turbulence { octaves, .. } => 2 * octaves,
                Primitive::DiffuseLighting(_) | Primitive::SpecularLighting(_) => 8,
                Primitive::Morphology { .. } => 4,
                _ => 0,
            };
            16 + extra
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/policy/capability.rs"]
mod tests;
