//! Workspace-wide compile/construction-time constants.

/// Maximum supported number of dimensions for a cube/fragment pair.
///
/// The Cartesian-product machinery in [`crate::geometry`] hand-specializes
/// iteration for `1..=MAX_DIMS`; a `GVT` requested above this cap is rejected
/// with [`crate::Error::InvalidArgument`] at construction rather than miscompiling
/// or silently truncating.
pub const MAX_DIMS: usize = 5;
