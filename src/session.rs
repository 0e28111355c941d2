//! Top-level conversion entry points.
//!
//! A [`FilterConverter`] is created once per document. It owns the result cache, the media ledger
//! and the worker pool; every element conversion borrows them.

use anyhow::Context;
use rayon::prelude::*;

use crate::cache::store::{CacheStats, ResultCache};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::emit::drawingml::{DrawingMlFragment, FillXml};
use crate::emit::emitter::{
    EmbeddedMedia, EmitContext, Emission, MediaLedger, emit, pattern_fill, unfiltered,
};
use crate::foundation::error::{FxError, FxResult};
use crate::graph::builder::FilterGraph;
use crate::graph::element::FilterElement;
use crate::graph::primitive::PrimitiveKind;
use crate::pattern::tile::PatternTile;
use crate::policy::resolve::{PolicyConfig, ResolvedStrategy, resolve};
use crate::services::{ConversionServices, MediaRegistry, ShapeContext};

/// Converter configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConverterOptions {
    /// Strategy selection limits.
    pub policy: PolicyConfig,
    /// Override the number of rayon worker threads for batch conversion. `None` uses rayon
    /// defaults.
    pub workers: Option<usize>,
    /// Soft limit on encoded bytes the result cache keeps alive.
    pub cache_max_bytes: usize,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            workers: None,
            cache_max_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ConverterOptions {
    /// Parse and validate options from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> FxResult<Self> {
        let opts: Self =
            serde_json::from_str(json).context("parse converter options JSON")?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reject option combinations the converter cannot run with.
    pub fn validate(&self) -> FxResult<()> {
        if matches!(self.workers, Some(0)) {
            return Err(FxError::validation(
                "converter 'workers' must be >= 1 when set",
            ));
        }
        self.policy.validate()
    }
}

/// Strategy report entry for one primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeStrategy {
    /// `feMorphology#0` style label, or the primitive's `result` name.
    pub label: String,
    /// Primitive type.
    pub kind: PrimitiveKind,
    /// Strategy the policy chose.
    pub strategy: ResolvedStrategy,
}

/// Result of converting one filtered element.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversion {
    /// `p:spPr` children to splice into the shape.
    pub fragment: DrawingMlFragment,
    /// One entry per primitive in declaration order; empty when the graph was rejected.
    pub strategies: Vec<NodeStrategy>,
    /// EMF parts referenced by `fragment`.
    pub media: Vec<EmbeddedMedia>,
    /// Fidelity notes gathered along the way.
    pub diagnostics: Diagnostics,
}

/// One element of a batch.
#[derive(Clone, Copy)]
pub struct ElementJob<'a> {
    /// Parsed `<filter>` element.
    pub filter: &'a FilterElement,
    /// Element the filter applies to.
    pub shape: &'a ShapeContext,
    /// Host services for this element.
    pub services: &'a dyn ConversionServices,
}

/// Per-document converter.
pub struct FilterConverter {
    options: ConverterOptions,
    cache: ResultCache,
    ledger: MediaLedger,
    pool: rayon::ThreadPool,
}

impl FilterConverter {
    /// Validate `options` and build the worker pool.
    pub fn new(options: ConverterOptions) -> FxResult<Self> {
        options.validate()?;
        let pool = build_thread_pool(options.workers)?;
        Ok(Self {
            cache: ResultCache::new(options.cache_max_bytes),
            ledger: MediaLedger::new(),
            pool,
            options,
        })
    }

    /// Options the converter was built with.
    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// Snapshot of result cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of `register_media` calls made so far, across all registries.
    pub fn registered_media(&self) -> usize {
        self.ledger.len()
    }

    /// Convert one filtered element.
    ///
    /// Never fails: a structurally invalid filter yields the unfiltered shape plus an error
    /// diagnostic, and encoding problems degrade to placeholders.
    #[tracing::instrument(skip_all, fields(children = filter.children.len()))]
    pub fn convert(
        &self,
        filter: &FilterElement,
        shape: &ShapeContext,
        services: &dyn ConversionServices,
        media: &dyn MediaRegistry,
    ) -> Conversion {
        let mut diagnostics = Diagnostics::new();
        let graph = match FilterGraph::build(filter, services, &mut diagnostics) {
            Ok(graph) => graph,
            Err(e) => {
                diagnostics.error(
                    DiagnosticCode::GraphRejected,
                    None,
                    format!("{e}; filter dropped"),
                );
                return Conversion {
                    fragment: unfiltered(shape, services),
                    strategies: Vec::new(),
                    media: Vec::new(),
                    diagnostics,
                };
            }
        };

        let mut resolved = resolve(&graph, &self.options.policy, &mut diagnostics);
        let cx = EmitContext {
            shape,
            services,
            policy: &self.options.policy,
            cache: &self.cache,
            ledger: &self.ledger,
            registry: media,
        };
        let Emission {
            fragment,
            media: embedded,
        } = emit(&graph, &mut resolved, &cx, &mut diagnostics);

        let strategies = graph
            .nodes()
            .iter()
            .zip(resolved.strategies())
            .map(|(node, strategy)| NodeStrategy {
                label: node.label.clone(),
                kind: node.kind(),
                strategy: strategy.clone(),
            })
            .collect();
        tracing::debug!(
            cost = resolved.total_cost(),
            media = embedded.len(),
            diagnostics = diagnostics.len(),
            "element converted"
        );
        Conversion {
            fragment,
            strategies,
            media: embedded,
            diagnostics,
        }
    }

    /// Convert independent elements on the worker pool. Results keep the order of `jobs`.
    #[tracing::instrument(skip_all, fields(jobs = jobs.len()))]
    pub fn convert_batch(
        &self,
        jobs: &[ElementJob<'_>],
        media: &dyn MediaRegistry,
    ) -> Vec<Conversion> {
        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| self.convert(job.filter, job.shape, job.services, media))
                .collect()
        })
    }

    /// Tiled picture fill for a `<pattern>` paint.
    pub fn pattern_fill(
        &self,
        tile: &PatternTile,
        media: &dyn MediaRegistry,
    ) -> FxResult<(FillXml, EmbeddedMedia)> {
        Ok(pattern_fill(tile, &self.cache, &self.ledger, media)?)
    }
}

fn build_thread_pool(workers: Option<usize>) -> FxResult<rayon::ThreadPool> {
    if matches!(workers, Some(0)) {
        return Err(FxError::validation(
            "converter 'workers' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = workers {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| FxError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
