#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Wire message types: the JSON queries/tasks and MessagePack
//! headers/bundles exchanged between the planner, the fragment processors,
//! and the streaming decoder.

pub mod header;
pub mod manifest;
pub mod query;
pub mod task;
pub mod wire;

pub use header::ProcessHeader;
pub use manifest::{FragmentCatalogEntry, Manifest};
pub use query::{CurtainQuery, QueryCommon, SliceQuery};
pub use task::{CurtainSingle, CurtainTask, SliceTask};
pub use wire::{
    decode_curtain_envelope, decode_slice_envelope, encode_curtain_envelope,
    encode_slice_envelope, rd_err, read_bytes_exact, read_str_owned, read_tile, read_values,
    CurtainBundle, SliceBundle, Tile,
};
