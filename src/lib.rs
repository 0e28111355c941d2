//! drawfx converts SVG filter effects into PowerPoint DrawingML.
//!
//! Each `<filter>` is built into a primitive graph, every primitive gets the cheapest strategy
//! that can express it (a native DrawingML effect, a vector approximation, or a raster EMF), and
//! the result is emitted as one `p:spPr` fragment plus the EMF parts it references.
//!
//! - Create a [`FilterConverter`] from [`ConverterOptions`]
//! - Call [`FilterConverter::convert`] per element, or [`FilterConverter::convert_batch`]
//! - Hand the returned [`EmbeddedMedia`] to the package writer
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Content-addressed cache for encoded EMF blobs.
pub mod cache;
/// Fidelity diagnostics.
pub mod diagnostics;
/// EMF encoding and decoding.
pub mod emf;
/// DrawingML emission.
pub mod emit;
pub mod graph;
/// Procedural pattern tiles.
pub mod pattern;
/// Strategy selection.
pub mod policy;
/// CPU raster fallback.
pub mod raster;
pub mod services;
pub mod session;

pub use crate::foundation::core::{Affine, BezPath, Point, RasterImage, Rect, Rgba, Vec2};
pub use crate::foundation::error::{EncodeError, FxError, FxResult, GraphError};

pub use crate::cache::store::{CacheKey, CacheStats, EmfRef, ResultCache};
pub use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Level};
pub use crate::emf::encoder::EmfBlob;
pub use crate::emit::drawingml::DrawingMlFragment;
pub use crate::emit::emitter::EmbeddedMedia;
pub use crate::graph::builder::FilterGraph;
pub use crate::graph::element::FilterElement;
pub use crate::pattern::tile::{PatternKind, PatternTile};
pub use crate::policy::resolve::{PolicyConfig, ResolvedStrategy};
pub use crate::services::{
    ColorSpace, ConversionServices, InMemoryMediaRegistry, MediaRegistry, RelationshipId,
    ShapeContext, StandardServices, StrokeStyle,
};
pub use crate::session::{Conversion, ConverterOptions, ElementJob, FilterConverter, NodeStrategy};
