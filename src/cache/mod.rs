pub(crate) mod fingerprint;
pub mod store;
