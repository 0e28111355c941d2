pub mod encoder;
pub mod reader;
pub mod records;
