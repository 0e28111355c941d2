//! Filter Graph Builder: `<filter>` element tree to a validated primitive DAG.

pub mod builder;
pub mod element;
pub mod primitive;
