//! CPU rasterization of filter subgraphs for the EMF fallback tier.

pub mod eval;
pub mod ops;
pub mod source;
