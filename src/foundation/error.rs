/// Result alias used across the crate.
pub type FxResult<T> = Result<T, FxError>;

/// Top-level error for configuration and API misuse.
///
/// Conversion itself never fails with this type: graph and encoding problems are reported through
/// [`crate::Diagnostics`] and the effect degrades instead.
#[derive(thiserror::Error, Debug)]
pub enum FxError {
    /// The filter graph failed to build.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// EMF encoding or decoding failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Invalid options or input data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Rendering could not produce pixels.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// JSON serialization of reports or options.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FxError {
    /// Build a [`FxError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FxError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`FxError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

/// Structural problems found while building a filter graph.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Reference to a result declared at or after the referencing node.
    #[error("primitive '{node}' references result '{reference}' which is not declared before it")]
    Cycle {
        /// Label of the referencing primitive.
        node: String,
        /// The `in`/`in2` value.
        reference: String,
    },

    /// Reference to a result that is never declared.
    #[error("primitive '{node}' references unknown result '{reference}'")]
    UnresolvedInput {
        /// Label of the referencing primitive.
        node: String,
        /// The `in`/`in2` value.
        reference: String,
    },

    /// No primitive children.
    #[error("filter has no primitives")]
    Empty,
}

/// Failures of the EMF encoder and reader.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    /// Raster empty or larger than the pixel limit.
    #[error("unsupported raster dimensions {width}x{height} (limit {max_pixels} pixels)")]
    UnsupportedDimensions {
        /// Requested width.
        width: u64,
        /// Requested height.
        height: u64,
        /// Configured limit.
        max_pixels: u64,
    },

    /// Tile parameters or tile records out of range.
    #[error("malformed pattern tile: {0}")]
    MalformedTile(String),

    /// Bytes that do not parse as an EMF this crate writes.
    #[error("malformed EMF blob: {0}")]
    MalformedBlob(String),

    /// Byte buffer write failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
