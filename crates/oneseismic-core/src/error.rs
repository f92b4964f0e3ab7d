//! Failure taxonomy shared by every crate in the workspace.
//!
//! One enum, matched explicitly by callers instead of string-sniffed, so a
//! surrounding service can (for example) map [`Error::NotFound`] to a
//! 404-equivalent signal without inspecting a message.

use thiserror::Error;

/// Workspace-wide error type.
///
/// Every fallible entry point in `oneseismic-core`, `oneseismic-messages`,
/// `oneseismic-planner`, `oneseismic-process`, and `oneseismic-decoder`
/// returns `Result<_, Error>`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A wire message (JSON or MessagePack) did not parse into the expected
    /// shape: wrong array length, missing field, truncated buffer.
    #[error("bad message: {0}")]
    BadMessage(String),

    /// A manifest document was not valid JSON, or was missing a field the
    /// planner requires.
    #[error("bad document: {0}")]
    BadDocument(String),

    /// A value decoded correctly but lies outside its domain (an unknown
    /// enum tag, a negative count, ...).
    #[error("bad value: {0}")]
    BadValue(String),

    /// A requested line number is absent from the manifest's line index for
    /// the given dimension.
    #[error("not found: {0}")]
    NotFound(String),

    /// An axis index or coordinate lies at or beyond its shape's extent.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A caller-supplied parameter is nonsensical on its face (e.g.
    /// `task_size == 0`, a dimensionality above the supported cap).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal invariant was violated. Reaching this is always a bug in
    /// this workspace, never a consequence of bad input.
    #[error("internal logic error: {0}")]
    LogicError(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Construct a [`Error::LogicError`] from anything `Display`-able.
    ///
    /// Centralizing this makes the handful of "this should be unreachable"
    /// call sites greppable.
    #[must_use]
    pub fn logic(msg: impl Into<String>) -> Self {
        Self::LogicError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_render_distinct_messages() {
        let errs = [
            Error::BadMessage("x".into()),
            Error::BadDocument("x".into()),
            Error::BadValue("x".into()),
            Error::NotFound("x".into()),
            Error::OutOfRange("x".into()),
            Error::InvalidArgument("x".into()),
            Error::LogicError("x".into()),
        ];
        let mut rendered: Vec<String> = errs.iter().map(ToString::to_string).collect();
        rendered.dedup();
        assert_eq!(rendered.len(), errs.len(), "each variant must render distinctly");
    }
}
