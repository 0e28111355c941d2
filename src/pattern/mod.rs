pub mod classify;
pub mod tile;
