#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! The per-fragment extractor: a stateful handle that ingests fetched
//! fragment bytes one at a time and packs the extracted sub-blocks into a
//! response bundle.
//!
//! Exclusive access is expressed the ordinary Rust way: every mutating
//! operation takes `&mut self`, so the borrow checker forbids the
//! concurrent-call shape out by construction.
//! `attribute`/`prefix`/`ext` are supplied to [`Process::init`] rather than
//! resolved from a manifest, since a `Process` never sees the manifest —
//! only the already-planned fetch task.

mod curtain;
mod slice;

use oneseismic_core::Result;

use curtain::CurtainProcess;
use slice::SliceProcess;

/// A stateful per-query extraction handle, for one of the two supported
/// operation kinds.
#[derive(Debug)]
pub enum Process {
    /// Handle extracting tiles for an axis-aligned slice.
    Slice(SliceProcess),
    /// Handle extracting full-depth traces for a curtain.
    Curtain(CurtainProcess),
}

impl Process {
    /// Unpack a fetch-task blob and reset internal state for a new
    /// extraction. `attribute` names the attribute this handle extracts;
    /// `prefix`/`ext` are the matching manifest catalog entry's fields used
    /// to format fragment resource names.
    ///
    /// # Errors
    /// Returns [`Error::BadMessage`] if `bytes` is not a valid task for this
    /// handle's kind, or [`Error::InvalidArgument`] / [`Error::LogicError`]
    /// if the task's shapes are malformed.
    ///
    /// [`Error::BadMessage`]: oneseismic_core::Error::BadMessage
    /// [`Error::InvalidArgument`]: oneseismic_core::Error::InvalidArgument
    /// [`Error::LogicError`]: oneseismic_core::Error::LogicError
    #[tracing::instrument(skip(self, bytes))]
    pub fn init(&mut self, bytes: &[u8], attribute: &str, prefix: &str, ext: &str) -> Result<()> {
        match self {
            Self::Slice(p) => p.init(bytes, attribute, prefix, ext),
            Self::Curtain(p) => p.init(bytes, attribute, prefix, ext),
        }
    }

    /// The `;`-delimited list of fragment resource names this handle's
    /// task needs fetched, in task order.
    #[must_use]
    pub fn fragments(&self) -> String {
        match self {
            Self::Slice(p) => p.fragments(),
            Self::Curtain(p) => p.fragments(),
        }
    }

    /// Extract the `index`-th fragment's contribution from its downloaded
    /// bytes (a little-endian float32 array of `FS[0]*FS[1]*FS[2]`
    /// elements). Not safe to call concurrently on one handle.
    ///
    /// # Errors
    /// - [`Error::OutOfRange`] if `index` is not a valid fragment index for
    ///   the initialized task.
    /// - [`Error::BadMessage`] if `bytes` is not the expected length.
    /// - [`Error::LogicError`] if called before `init`.
    ///
    /// [`Error::OutOfRange`]: oneseismic_core::Error::OutOfRange
    /// [`Error::BadMessage`]: oneseismic_core::Error::BadMessage
    /// [`Error::LogicError`]: oneseismic_core::Error::LogicError
    pub fn add(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        match self {
            Self::Slice(p) => p.add(index, bytes),
            Self::Curtain(p) => p.add(index, bytes),
        }
    }

    /// Serialize the tiles/traces accumulated so far into one packed
    /// attribute bundle, in the order `add` was called.
    ///
    /// # Errors
    /// Returns [`Error::LogicError`] only if the accumulated state cannot
    /// be represented (unreachable for a handle only ever driven through
    /// `init`/`add`).
    ///
    /// [`Error::LogicError`]: oneseismic_core::Error::LogicError
    pub fn pack(&self) -> Result<Vec<u8>> {
        match self {
            Self::Slice(p) => p.pack(),
            Self::Curtain(p) => p.pack(),
        }
    }
}

/// Construct a handle for the named operation. Returns `None` for any
/// `kind` other than `"slice"` or `"curtain"` — a null handle the caller
/// is expected to detect and report, rather than an error variant.
#[must_use]
pub fn make_process(kind: &str) -> Option<Process> {
    match kind {
        "slice" => Some(Process::Slice(SliceProcess::default())),
        "curtain" => Some(Process::Curtain(CurtainProcess::default())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_process_rejects_unknown_kind() {
        assert!(make_process("bogus").is_none());
    }

    #[test]
    fn make_process_builds_slice_and_curtain_handles() {
        assert!(matches!(make_process("slice"), Some(Process::Slice(_))));
        assert!(matches!(make_process("curtain"), Some(Process::Curtain(_))));
    }
}
