//! Fidelity report attached to every conversion.

use crate::foundation::error::{FxError, FxResult};

/// Severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Fidelity note: the output is an approximation.
    Info,
    /// Visible degradation: fallback, clamping, dropped primitive.
    Warning,
    /// The filter effect was omitted.
    Error,
}

/// Stable machine-readable diagnostic code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// A parameter was outside its legal range and was clamped.
    ParameterClamped,
    /// Unknown or unsupported primitive.
    UnsupportedPrimitive,
    /// Emitted as a DrawingML approximation.
    Approximated,
    /// Rendered into an EMF fallback.
    RasterFallback,
    /// The cost budget forced a cheaper strategy.
    CostLimitReached,
    /// Raster was needed but disabled by policy.
    RasterDisabled,
    /// EMF encoding failed.
    EncodeFailed,
    /// The effect was dropped from the output.
    EffectDropped,
    /// The filter graph failed validation.
    GraphRejected,
}

/// One fidelity note.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Diagnostic {
    /// Severity.
    pub level: Level,
    /// What happened.
    pub code: DiagnosticCode,
    /// Node label (`feMorphology#0` or its `result` name) when the note concerns one primitive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

/// Ordered fidelity report for one conversion.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an [`Level::Info`] note.
    pub fn info(&mut self, code: DiagnosticCode, node: Option<&str>, message: impl Into<String>) {
        self.push(Level::Info, code, node, message.into());
    }

    /// Record a [`Level::Warning`] and log it.
    pub fn warn(&mut self, code: DiagnosticCode, node: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?code, node = node.unwrap_or("-"), "{message}");
        self.push(Level::Warning, code, node, message);
    }

    /// Record a [`Level::Error`] and log it.
    pub fn error(&mut self, code: DiagnosticCode, node: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?code, node = node.unwrap_or("-"), "filter effect dropped: {message}");
        self.push(Level::Error, code, node, message);
    }

    fn push(&mut self, level: Level, code: DiagnosticCode, node: Option<&str>, message: String) {
        self.items.push(Diagnostic {
            level,
            code,
            node: node.map(str::to_owned),
            message,
        });
    }

    /// Append every entry of `other`, keeping order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Entries in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries at [`Level::Warning`].
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.level == Level::Warning)
    }

    /// Entries at [`Level::Error`].
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.level == Level::Error)
    }

    /// Whether any entry carries `code`.
    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.items.iter().any(|d| d.code == code)
    }

    /// Serialize the report as a JSON array.
    pub fn to_json(&self) -> FxResult<String> {
        serde_json::to_string_pretty(&self.items).map_err(|e| FxError::serde(e.to_string()))
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
