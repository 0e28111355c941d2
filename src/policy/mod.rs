pub mod capability;
pub mod resolve;
