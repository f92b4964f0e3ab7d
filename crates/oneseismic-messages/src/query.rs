//! Query messages: the text (JSON) request a client sends for a slice or
//! curtain.

use oneseismic_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Fields common to every query, per the wire protocol naming.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueryCommon {
    /// Process id the response stream will be tagged with.
    pub pid: String,
    /// Caller-supplied request id, echoed back for tracing.
    pub guid: String,
    /// Opaque credential forwarded to the (out-of-scope) storage fetcher.
    pub token: String,
    /// Base URL/endpoint of the object store holding fragment blobs.
    pub storage_endpoint: String,
    /// Fragment shape this query was planned against.
    pub shape: [u32; 3],
    /// Name of the requested operation, e.g. `"slice"` or `"curtain"`.
    pub function: String,
}

/// A request for an axis-aligned slice through a cube.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SliceQuery {
    /// Fields shared with every query.
    #[serde(flatten)]
    pub common: QueryCommon,
    /// The manifest document, embedded as JSON.
    pub manifest: serde_json::Value,
    /// Axis the slice is perpendicular to.
    pub dim: u32,
    /// Line number (as it appears in `manifest.dimensions[dim]`) to slice at.
    pub lineno: i64,
}

impl SliceQuery {
    /// Parse a `SliceQuery` from its JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::BadMessage`] if `bytes` is not valid JSON or does
    /// not match the expected shape.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::BadMessage(format!("slice query parse failed: {e}")))
    }

    /// Serialize to the JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::LogicError`] only if `self` somehow cannot be
    /// represented as JSON (unreachable for well-formed values).
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::logic(format!("slice query re-encode failed: {e}")))
    }
}

/// A request for a curtain: full depth-traces at chosen `(x, y)` positions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CurtainQuery {
    /// Fields shared with every query.
    #[serde(flatten)]
    pub common: QueryCommon,
    /// The manifest document, embedded as JSON.
    pub manifest: serde_json::Value,
    /// First-axis coordinates of the requested traces.
    pub dim0s: Vec<i64>,
    /// Second-axis coordinates of the requested traces (same length as
    /// `dim0s`; `(dim0s[i], dim1s[i])` is one requested trace).
    pub dim1s: Vec<i64>,
}

impl CurtainQuery {
    /// Parse a `CurtainQuery` from its JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::BadMessage`] if `bytes` is not valid JSON, does not
    /// match the expected shape, or `dim0s`/`dim1s` differ in length.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let q: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::BadMessage(format!("curtain query parse failed: {e}")))?;
        if q.dim0s.len() != q.dim1s.len() {
            return Err(Error::BadMessage(format!(
                "curtain query dim0s/dim1s length mismatch: {} vs {}",
                q.dim0s.len(),
                q.dim1s.len()
            )));
        }
        Ok(q)
    }

    /// Serialize to the JSON text encoding.
    ///
    /// # Errors
    /// Returns [`Error::LogicError`] only if `self` somehow cannot be
    /// represented as JSON (unreachable for well-formed values).
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::logic(format!("curtain query re-encode failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_common() -> QueryCommon {
        QueryCommon {
            pid: "pid-1".into(),
            guid: "guid-1".into(),
            token: "token".into(),
            storage_endpoint: "https://store.example".into(),
            shape: [64, 64, 64],
            function: "slice".into(),
        }
    }

    #[test]
    fn slice_query_roundtrips_through_json() {
        let q = SliceQuery {
            common: sample_common(),
            manifest: json!({"dimensions": [[1,2,3],[4,5,6],[7,8,9]]}),
            dim: 0,
            lineno: 2,
        };
        let bytes = q.to_json().unwrap();
        let back = SliceQuery::from_json(&bytes).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn curtain_query_rejects_mismatched_lengths() {
        let q = CurtainQuery {
            common: sample_common(),
            manifest: json!({"dimensions": []}),
            dim0s: vec![1, 2, 3],
            dim1s: vec![1, 2],
        };
        let bytes = q.to_json().unwrap();
        let err = CurtainQuery::from_json(&bytes).unwrap_err();
        assert!(matches!(err, Error::BadMessage(_)));
    }

    #[test]
    fn malformed_json_is_bad_message() {
        let err = SliceQuery::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, Error::BadMessage(_)));
    }
}
