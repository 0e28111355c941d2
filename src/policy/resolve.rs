//! Per-node strategy resolution under cost and raster limits.

use crate::cache::store::EmfRef;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::foundation::error::{FxError, FxResult};
use crate::graph::builder::{FilterGraph, InputRef, NodeId};
use crate::graph::primitive::PrimitiveKind;
use crate::policy::capability::{
    Approximation, Capability, LayerClass, NativeEffect, Tier, assess, cost, native_over_raster,
};

/// Limits and thresholds for strategy selection.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Cumulative cost after which every remaining node is rasterized.
    pub max_chain_cost: u32,
    /// When `false`, nodes that would rasterize pass their input through instead.
    pub allow_raster_fallback: bool,
    /// Largest raster a fallback may allocate.
    pub max_raster_pixels: u32,
    /// Largest morphology radius drawn as an outline.
    pub morphology_vector_max_radius: f64,
    /// Largest displacement scale drawn as vertex jitter.
    pub displacement_vector_max_scale: f64,
    /// Blur margin around rasters, in standard deviations.
    pub raster_margin_sigma: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_chain_cost: 100,
            allow_raster_fallback: true,
            max_raster_pixels: 4_194_304,
            morphology_vector_max_radius: 20.0,
            displacement_vector_max_scale: 8.0,
            raster_margin_sigma: 3.0,
        }
    }
}

impl PolicyConfig {
    /// Reject negative, non-finite or zero limits.
    pub fn validate(&self) -> FxResult<()> {
        if self.max_raster_pixels == 0 {
            return Err(FxError::validation("max_raster_pixels must be >= 1"));
        }
        for (name, v) in [
            ("morphology_vector_max_radius", self.morphology_vector_max_radius),
            ("displacement_vector_max_scale", self.displacement_vector_max_scale),
            ("raster_margin_sigma", self.raster_margin_sigma),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(FxError::validation(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Why a node was rasterized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterReason {
    /// No vector form exists for this primitive and input.
    Capability,
    /// An input is already pixels.
    InputRasterized,
    /// The chain exceeded `max_chain_cost`.
    CostLimit,
}

/// Strategy chosen for one node.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedStrategy {
    /// Direct DrawingML mapping.
    Native {
        /// Effect used.
        effect: NativeEffect,
    },
    /// Vector approximation.
    VectorApprox {
        /// Construction used.
        approx: Approximation,
        /// The approximation is applied on top of an image fill.
        over_raster: bool,
    },
    /// Rendered into an EMF.
    RasterFallback {
        /// Why vector output was not possible.
        reason: RasterReason,
        /// Filled in by the emitter once the node's pixels are encoded. Nodes whose pixels are
        /// consumed only by later raster nodes never get a blob of their own.
        emf: Option<EmfRef>,
    },
}

impl ResolvedStrategy {
    /// Tier of this strategy.
    pub fn tier(&self) -> Tier {
        match self {
            Self::Native { .. } => Tier::Native,
            Self::VectorApprox { .. } => Tier::VectorApprox,
            Self::RasterFallback { .. } => Tier::RasterFallback,
        }
    }

    /// `true` for [`ResolvedStrategy::RasterFallback`].
    pub fn is_raster(&self) -> bool {
        matches!(self, Self::RasterFallback { .. })
    }
}

/// Policy output: one strategy, output class and cost per node, indexed like the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGraph {
    strategies: Vec<ResolvedStrategy>,
    classes: Vec<LayerClass>,
    costs: Vec<u32>,
    total: u32,
}

impl ResolvedGraph {
    /// Strategy of `id`.
    pub fn strategy(&self, id: NodeId) -> &ResolvedStrategy {
        &self.strategies[id.index()]
    }

    /// All strategies in node order.
    pub fn strategies(&self) -> &[ResolvedStrategy] {
        &self.strategies
    }

    pub(crate) fn strategy_mut(&mut self, id: NodeId) -> &mut ResolvedStrategy {
        &mut self.strategies[id.index()]
    }

    /// Output class of `id`.
    pub fn class(&self, id: NodeId) -> LayerClass {
        self.classes[id.index()]
    }

    /// Cost charged for `id` alone.
    pub fn cost(&self, id: NodeId) -> u32 {
        self.costs[id.index()]
    }

    /// Sum of node costs.
    pub fn total_cost(&self) -> u32 {
        self.total
    }
}

/// Assign a strategy to every node in declaration (topological) order.
///
/// Pure: the same graph and config always produce the same result and diagnostics.
#[tracing::instrument(skip_all, fields(nodes = graph.len()))]
pub fn resolve(graph: &FilterGraph, cfg: &PolicyConfig, diags: &mut Diagnostics) -> ResolvedGraph {
    let n = graph.len();
    let mut out = ResolvedGraph {
        strategies: Vec::with_capacity(n),
        classes: Vec::with_capacity(n),
        costs: Vec::with_capacity(n),
        total: 0,
    };
    let mut limit_reported = false;

    for node in graph.nodes() {
        let label = node.label.as_str();
        let inputs: Vec<LayerClass> = node
            .inputs
            .iter()
            .map(|i| match i {
                InputRef::Source(s) => LayerClass::of_source(*s),
                InputRef::Node(id) => out.classes[id.index()],
            })
            .collect();
        let floor = node
            .node_inputs()
            .map(|id| out.strategies[id.index()].tier())
            .max()
            .unwrap_or(Tier::Native);
        let passthrough_class = inputs.first().copied().unwrap_or(LayerClass::Shape);

        let over_budget = out.total > cfg.max_chain_cost;
        if over_budget && !limit_reported {
            limit_reported = true;
            diags.warn(
                DiagnosticCode::CostLimitReached,
                Some(label),
                format!(
                    "chain cost {} exceeds {}; remaining primitives rasterized",
                    out.total, cfg.max_chain_cost
                ),
            );
        }

        let (strategy, class) = if over_budget {
            raster_or_passthrough(cfg, RasterReason::CostLimit, passthrough_class, label, diags)
        } else if inputs.contains(&LayerClass::Raster) {
            match native_over_raster(&node.primitive) {
                Some(effect) => {
                    diags.info(
                        DiagnosticCode::Approximated,
                        Some(label),
                        format!("{} applied over rasterized input", effect.name()),
                    );
                    (
                        ResolvedStrategy::VectorApprox {
                            approx: Approximation::NativeOverInput(effect),
                            over_raster: true,
                        },
                        LayerClass::Raster,
                    )
                }
                None => raster_or_passthrough(
                    cfg,
                    RasterReason::InputRasterized,
                    passthrough_class,
                    label,
                    diags,
                ),
            }
        } else {
            match assess(&node.primitive, &inputs, cfg) {
                Capability::Native(effect, class) if floor == Tier::Native => {
                    (ResolvedStrategy::Native { effect }, class)
                }
                Capability::Native(effect, class) => (
                    ResolvedStrategy::VectorApprox {
                        approx: Approximation::NativeOverInput(effect),
                        over_raster: false,
                    },
                    class,
                ),
                Capability::Vector(approx, class) => {
                    // Unsupported primitives were already reported by the graph builder.
                    if approx != Approximation::Passthrough {
                        diags.info(
                            DiagnosticCode::Approximated,
                            Some(label),
                            approx.description(),
                        );
                    } else if node.kind() != PrimitiveKind::Unsupported {
                        diags.info(
                            DiagnosticCode::Approximated,
                            Some(label),
                            "no visible effect on this input; passed through",
                        );
                    }
                    (
                        ResolvedStrategy::VectorApprox {
                            approx,
                            over_raster: false,
                        },
                        class,
                    )
                }
                Capability::Raster(why) => {
                    if cfg.allow_raster_fallback {
                        diags.warn(
                            DiagnosticCode::RasterFallback,
                            Some(label),
                            format!("{why}; rasterized"),
                        );
                    }
                    raster_or_passthrough(
                        cfg,
                        RasterReason::Capability,
                        passthrough_class,
                        label,
                        diags,
                    )
                }
            }
        };

        let c = cost(&node.primitive, strategy.tier());
        tracing::debug!(node = label, tier = ?strategy.tier(), cost = c, "strategy resolved");
        out.total = out.total.saturating_add(c);
        out.costs.push(c);
        out.classes.push(class);
        out.strategies.push(strategy);
    }
    out
}

fn raster_or_passthrough(
    cfg: &PolicyConfig,
    reason: RasterReason,
    passthrough_class: LayerClass,
    label: &str,
    diags: &mut Diagnostics,
) -> (ResolvedStrategy, LayerClass) {
    if cfg.allow_raster_fallback {
        (
            ResolvedStrategy::RasterFallback { reason, emf: None },
            LayerClass::Raster,
        )
    } else {
        diags.warn(
            DiagnosticCode::RasterDisabled,
            Some(label),
            "raster fallback disabled; primitive passed through",
        );
        (
            ResolvedStrategy::VectorApprox {
                approx: Approximation::Passthrough,
                over_raster: false,
            },
            passthrough_class,
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/policy/resolve.rs"]
mod tests;
