//! `ProcessHeader`: the first element of a response envelope, serialized as
//! a MessagePack map (so unknown/extra fields decode leniently).

use oneseismic_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Header describing the shape and attribute set of a response stream.
///
/// `nbundles` must equal the number of bundles that follow it in the
/// envelope body; the planner's own header (the last element of a task set)
/// instead uses `nbundles` to mean `ntasks`, the number of fetch tasks
/// preceding it — the field is reused for both roles rather than carrying
/// two near-identical counters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ProcessHeader {
    /// Process id, echoed from the originating query.
    pub pid: String,
    /// Name of the operation that produced this header (`"slice"` /
    /// `"curtain"`).
    pub function: String,
    /// Number of bundles in the response body (or, for a plan header, the
    /// number of fetch tasks preceding it).
    pub nbundles: u32,
    /// Number of dimensions of `shape`/`index`.
    pub ndims: u32,
    /// Shape of the result, after squeezing the sliced axis.
    pub shape: Vec<u32>,
    /// Per-axis line-number lists, after squeezing.
    pub index: Vec<Vec<i64>>,
    /// Per-axis human labels, after squeezing (empty if the manifest
    /// carried none).
    pub labels: Vec<String>,
    /// Attribute names present in the body, in bundle order.
    pub attributes: Vec<String>,
}

impl ProcessHeader {
    /// Serialize to a MessagePack map.
    ///
    /// # Errors
    /// Returns [`Error::LogicError`] only if `self` cannot be represented
    /// (unreachable for well-formed values).
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::encode::to_vec_named(self)
            .map_err(|e| Error::logic(format!("process header encode failed: {e}")))
    }

    /// Deserialize from a MessagePack map.
    ///
    /// # Errors
    /// Returns [`Error::BadMessage`] if `bytes` is not a valid MessagePack
    /// map matching this shape.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        rmp_serde::decode::from_slice(bytes)
            .map_err(|e| Error::BadMessage(format!("process header decode failed: {e}")))
    }
}
