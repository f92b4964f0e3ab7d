// crates/oneseismic-core/src/lib.rs

//! Geometry and error taxonomy shared by the oneseismic slice/curtain engine.
//!
//! This crate has no knowledge of wire formats, manifests, or object
//! storage — it is pure coordinate math plus the error type every other
//! crate in the workspace returns.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod error;
pub mod geometry;
pub mod limits;

pub use error::{Error, Result};
pub use geometry::{Dim, Gvt, SliceLayout, CP, CS, FID, FP, FS};
pub use limits::MAX_DIMS;
