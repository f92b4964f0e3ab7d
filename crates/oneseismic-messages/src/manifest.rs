//! Manifest document (JSON): per-cube metadata the planner consults.
//!
//! Only `dimensions` is required; everything else describes attributes and
//! fragment catalogs that downstream collaborators (not this crate) use to
//! locate fragment blobs.

use oneseismic_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One entry of the manifest's `vol` or `attr` catalog: a named family of
/// fragments sharing a path prefix, extension, and set of fragment shapes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FragmentCatalogEntry {
    /// Path prefix fragment blobs for this family are stored under.
    pub prefix: String,
    /// File extension appended to fragment paths.
    pub ext: String,
    /// Declared data type, e.g. `"f32"`. Present only on `attr` entries.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    /// Declared memory layout, e.g. `"c"`. Present only on `attr` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    /// Human labels for this attribute (empty for `vol` entries).
    #[serde(default)]
    pub labels: Vec<String>,
    /// Fragment shapes available for this family.
    pub shapes: Vec<[u32; 3]>,
}

/// The manifest document describing one cube.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Manifest {
    /// Line-number index per dimension. Each inner array must be strictly
    /// increasing; the planner resolves a query's `lineno` against it.
    pub dimensions: Vec<Vec<i64>>,
    /// Optional free-form line-number metadata (format not prescribed by
    /// the planner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_numbers: Option<serde_json::Value>,
    /// Optional per-dimension human labels (e.g. "inline", "crossline",
    /// "time").
    #[serde(default)]
    pub line_labels: Vec<String>,
    /// Volume fragment catalog.
    #[serde(default)]
    pub vol: Vec<FragmentCatalogEntry>,
    /// Attribute fragment catalog.
    #[serde(default)]
    pub attr: Vec<FragmentCatalogEntry>,
}

impl Manifest {
    /// Parse a manifest from JSON bytes.
    ///
    /// # Errors
    /// Returns [`Error::BadDocument`] if the bytes are not valid JSON or do
    /// not match the manifest shape.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::BadDocument(format!("manifest parse failed: {e}")))
    }

    /// Parse a manifest from an already-decoded [`serde_json::Value`] (as
    /// embedded in a [`crate::query::SliceQuery`] or
    /// [`crate::query::CurtainQuery`]).
    ///
    /// # Errors
    /// Returns [`Error::BadDocument`] if `value` does not match the manifest
    /// shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::BadDocument(format!("manifest parse failed: {e}")))
    }

    /// Validate that every dimension's line-number index is strictly
    /// increasing.
    ///
    /// # Errors
    /// Returns [`Error::BadDocument`] on the first non-monotonic axis found.
    pub fn validate(&self) -> Result<()> {
        for (d, axis) in self.dimensions.iter().enumerate() {
            if axis.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::BadDocument(format!(
                    "dimension {d} line-number index is not strictly increasing"
                )));
            }
        }
        Ok(())
    }

    /// The cube shape implied by the lengths of the `dimensions` arrays.
    ///
    /// # Errors
    /// Returns [`Error::BadDocument`] if `dimensions` does not have exactly
    /// three axes (the planner only operates on 3D cubes).
    pub fn cube_shape_3d(&self) -> Result<[u32; 3]> {
        if self.dimensions.len() != 3 {
            return Err(Error::BadDocument(format!(
                "expected 3 manifest dimensions, found {}",
                self.dimensions.len()
            )));
        }
        let mut shape = [0u32; 3];
        for (i, axis) in self.dimensions.iter().enumerate() {
            shape[i] = u32::try_from(axis.len())
                .map_err(|_| Error::BadDocument(format!("dimension {i} is absurdly large")))?;
        }
        Ok(shape)
    }

    /// Locate `lineno` within `dimensions[dim]`, returning its (pin) index.
    ///
    /// # Errors
    /// - [`Error::OutOfRange`] if `dim` is not a valid axis.
    /// - [`Error::NotFound`] if `lineno` is absent from that axis's index.
    pub fn line_index(&self, dim: usize, lineno: i64) -> Result<usize> {
        let axis = self
            .dimensions
            .get(dim)
            .ok_or_else(|| Error::OutOfRange(format!("dimension {dim} does not exist")))?;
        axis.iter()
            .position(|&v| v == lineno)
            .ok_or_else(|| Error::NotFound(format!("lineno {lineno} not found in dimension {dim}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            dimensions: vec![vec![0, 1, 2, 3, 4], vec![0, 1, 2, 3, 4], vec![0, 1, 2, 3, 4]],
            ..Default::default()
        }
    }

    #[test]
    fn only_dimensions_required() {
        let json = br#"{"dimensions": [[1,2,3], [4,5,6], [7,8,9]]}"#;
        let m = Manifest::from_json(json).unwrap();
        assert_eq!(m.dimensions.len(), 3);
        assert!(m.vol.is_empty());
        assert!(m.attr.is_empty());
    }

    #[test]
    fn rejects_garbage_json() {
        let err = Manifest::from_json(b"not json").unwrap_err();
        assert!(matches!(err, Error::BadDocument(_)));
    }

    #[test]
    fn line_index_finds_pin() {
        let m = sample();
        assert_eq!(m.line_index(0, 2).unwrap(), 2);
    }

    #[test]
    fn line_index_rejects_unknown_lineno() {
        let m = sample();
        let err = m.line_index(0, 99).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn validate_rejects_non_monotonic_axis() {
        let mut m = sample();
        m.dimensions[1] = vec![0, 2, 1];
        let err = m.validate().unwrap_err();
        assert!(matches!(err, Error::BadDocument(_)));
    }
}
