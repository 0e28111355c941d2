//! DrawingML output: typed fragments, vector constructions and the graph walk that builds them.

pub mod drawingml;
pub mod emitter;
pub mod vector;
