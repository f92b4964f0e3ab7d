//! Worker task messages: what the planner hands to a fragment-fetching
//! worker, one per partitioned chunk of fragment ids.

use crate::query::QueryCommon;
use oneseismic_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A fetch task for the slice extractor: a chunk of fragment ids to
/// download and extract from, for one query.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SliceTask {
    /// Fields shared with every query/task.
    #[serde(flatten)]
    pub common: QueryCommon,
    /// The full (unsqueezed) cube shape, in samples.
    pub cube_shape: [u32; 3],
    /// Axis the slice is perpendicular to.
    pub dim: u32,
    /// Fragment-local index along `dim` (`pin mod FS[dim]`).
    ///
    /// The wire field is named `lineno` for protocol compatibility, even
    /// though it is a different quantity from the manifest line number; the
    /// Rust-facing name stays `local_idx` to keep the two concepts
    /// textually distinct (see `DESIGN.md`).
    #[serde(rename = "lineno")]
    pub local_idx: u32,
    /// Fragment ids this chunk is responsible for, in planner order.
    pub ids: Vec<[u32; 3]>,
}

impl SliceTask {
    /// Parse a `SliceTask` from its JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::BadMessage`] if `bytes` is not valid JSON or does
    /// not match the expected shape.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::BadMessage(format!("slice task parse failed: {e}")))
    }

    /// Serialize to the JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::LogicError`] only if `self` cannot be represented
    /// as JSON (unreachable for well-formed values).
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::logic(format!("slice task re-encode failed: {e}")))
    }
}

/// One fragment's worth of curtain trace coordinates.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CurtainSingle {
    /// The fragment id the `coordinates` fall inside.
    pub id: [u32; 3],
    /// `(x, y)` trace coordinates, in cube space, that land in this
    /// fragment.
    pub coordinates: Vec<[i64; 2]>,
}

/// A fetch task for the curtain extractor: the fragments touched by a
/// curtain query, grouped by containing fragment id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CurtainTask {
    /// Fields shared with every query/task.
    #[serde(flatten)]
    pub common: QueryCommon,
    /// The full cube shape, in samples.
    pub cube_shape: [u32; 3],
    /// One entry per touched fragment.
    pub singles: Vec<CurtainSingle>,
}

impl CurtainTask {
    /// Parse a `CurtainTask` from its JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::BadMessage`] if `bytes` is not valid JSON or does
    /// not match the expected shape.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::BadMessage(format!("curtain task parse failed: {e}")))
    }

    /// Serialize to the JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::LogicError`] only if `self` cannot be represented
    /// as JSON (unreachable for well-formed values).
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::logic(format!("curtain task re-encode failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common() -> QueryCommon {
        QueryCommon {
            pid: "pid".into(),
            guid: "guid".into(),
            token: "tok".into(),
            storage_endpoint: "https://store.example".into(),
            shape: [3, 3, 3],
            function: "slice".into(),
        }
    }

    #[test]
    fn slice_task_roundtrips_and_wire_field_is_lineno() {
        let t = SliceTask {
            common: common(),
            cube_shape: [5, 5, 5],
            dim: 0,
            local_idx: 0,
            ids: vec![[0, 0, 0], [0, 0, 1]],
        };
        let bytes = t.to_json().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"lineno\""));
        assert!(!text.contains("local_idx"));
        let back = SliceTask::from_json(&bytes).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn curtain_task_roundtrips() {
        let t = CurtainTask {
            common: common(),
            cube_shape: [5, 5, 5],
            singles: vec![CurtainSingle {
                id: [0, 0, 0],
                coordinates: vec![[1, 2], [3, 4]],
            }],
        };
        let bytes = t.to_json().unwrap();
        let back = CurtainTask::from_json(&bytes).unwrap();
        assert_eq!(back, t);
    }
}
