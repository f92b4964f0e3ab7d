//! Binary (MessagePack) encoding for response bundles.
//!
//! The envelope, bundle, and tile shapes are fixed tuples/arrays rather than
//! self-describing maps, so encoding is driven by hand via the low-level
//! `rmp` primitives instead of `#[derive(Serialize)]` — that's the only way
//! to guarantee the exact array layout, bit for
//! bit. [`crate::header::ProcessHeader`] is the one map-shaped exception and
//! goes through `rmp-serde` instead.
//!
//! This module only does the one-shot (non-streaming) encode/decode used to
//! build and round-trip-test a complete response. The incremental pull
//! parser that consumes arbitrary-sized byte chunks lives in
//! `oneseismic-decoder` and follows the same byte grammar documented here.

use oneseismic_core::Error;
use oneseismic_core::Result;
use rmp::decode::{self, ValueReadError};
use rmp::encode;
use std::io::Read;

use crate::header::ProcessHeader;

/// A single strided-copy tile: `[iterations, chunk_size, initial_skip,
/// superstride, substride, bin(values)]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    /// Number of read/write ops.
    pub iterations: u64,
    /// Elements moved per op.
    pub chunk_size: u64,
    /// Elements skipped before the first op.
    pub initial_skip: u64,
    /// Stride on the larger-structure side.
    pub superstride: u64,
    /// Stride on the isolated-fragment side.
    pub substride: u64,
    /// `iterations * chunk_size` little-endian float32 values.
    pub values: Vec<f32>,
}

/// All tiles for one attribute, for one slice response: `[attr_name,
/// [tile, tile, ...]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceBundle {
    /// Attribute name (e.g. `"amplitude"`).
    pub attribute: String,
    /// Tiles, one per fragment that contributed to this attribute.
    pub tiles: Vec<Tile>,
}

/// One attribute's worth of curtain traces: `[attr_name, size, major[2n],
/// minor[2n], bin(values)]`.
#[derive(Clone, Debug, PartialEq)]
pub struct CurtainBundle {
    /// Attribute name.
    pub attribute: String,
    /// Number of traces (`n`) this bundle carries.
    pub size: u64,
    /// `(ifst, ilst)` pairs per chunk, concatenated: `major[2i..2i+2]`.
    pub major: Vec<u64>,
    /// `(zfst, zlst)` depth-range pairs per chunk, concatenated.
    pub minor: Vec<u64>,
    /// Concatenated little-endian float32 values.
    pub values: Vec<f32>,
}

fn floats_to_bin(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn bin_to_floats(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::BadMessage(format!(
            "tile value buffer length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn write_tile(buf: &mut Vec<u8>, tile: &Tile) -> Result<()> {
    encode::write_array_len(buf, 6).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_uint(buf, tile.iterations).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_uint(buf, tile.chunk_size).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_uint(buf, tile.initial_skip).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_uint(buf, tile.superstride).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_uint(buf, tile.substride).map_err(|e| Error::logic(e.to_string()))?;
    let bin = floats_to_bin(&tile.values);
    encode::write_bin(buf, &bin).map_err(|e| Error::logic(e.to_string()))?;
    Ok(())
}

/// Encode one slice bundle: `[attr_name, [tile, ...]]`.
pub fn write_slice_bundle(buf: &mut Vec<u8>, bundle: &SliceBundle) -> Result<()> {
    encode::write_array_len(buf, 2).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_str(buf, &bundle.attribute).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_array_len(buf, u32::try_from(bundle.tiles.len()).unwrap_or(u32::MAX))
        .map_err(|e| Error::logic(e.to_string()))?;
    for tile in &bundle.tiles {
        write_tile(buf, tile)?;
    }
    Ok(())
}

/// Encode one curtain bundle: `[attr_name, size, major[2n], minor[2n],
/// bin(values)]`.
pub fn write_curtain_bundle(buf: &mut Vec<u8>, bundle: &CurtainBundle) -> Result<()> {
    encode::write_array_len(buf, 5).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_str(buf, &bundle.attribute).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_uint(buf, bundle.size).map_err(|e| Error::logic(e.to_string()))?;
    encode::write_array_len(buf, u32::try_from(bundle.major.len()).unwrap_or(u32::MAX))
        .map_err(|e| Error::logic(e.to_string()))?;
    for v in &bundle.major {
        encode::write_uint(buf, *v).map_err(|e| Error::logic(e.to_string()))?;
    }
    encode::write_array_len(buf, u32::try_from(bundle.minor.len()).unwrap_or(u32::MAX))
        .map_err(|e| Error::logic(e.to_string()))?;
    for v in &bundle.minor {
        encode::write_uint(buf, *v).map_err(|e| Error::logic(e.to_string()))?;
    }
    let bin = floats_to_bin(&bundle.values);
    encode::write_bin(buf, &bin).map_err(|e| Error::logic(e.to_string()))?;
    Ok(())
}

/// Encode a full slice-response envelope: `[header, [bundle, ...]]`.
///
/// # Errors
/// Returns [`Error::LogicError`] only if a field cannot be represented
/// (unreachable for well-formed values).
pub fn encode_slice_envelope(header: &ProcessHeader, bundles: &[SliceBundle]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode::write_array_len(&mut buf, 2).map_err(|e| Error::logic(e.to_string()))?;
    buf.extend_from_slice(&header.to_msgpack()?);
    encode::write_array_len(&mut buf, u32::try_from(bundles.len()).unwrap_or(u32::MAX))
        .map_err(|e| Error::logic(e.to_string()))?;
    for bundle in bundles {
        write_slice_bundle(&mut buf, bundle)?;
    }
    Ok(buf)
}

/// Encode a full curtain-response envelope: `[header, [bundle, ...]]`.
///
/// # Errors
/// Returns [`Error::LogicError`] only if a field cannot be represented
/// (unreachable for well-formed values).
pub fn encode_curtain_envelope(
    header: &ProcessHeader,
    bundles: &[CurtainBundle],
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode::write_array_len(&mut buf, 2).map_err(|e| Error::logic(e.to_string()))?;
    buf.extend_from_slice(&header.to_msgpack()?);
    encode::write_array_len(&mut buf, u32::try_from(bundles.len()).unwrap_or(u32::MAX))
        .map_err(|e| Error::logic(e.to_string()))?;
    for bundle in bundles {
        write_curtain_bundle(&mut buf, bundle)?;
    }
    Ok(buf)
}

/// Map an `rmp` low-level read error onto the workspace error type.
///
/// Exposed (not crate-private) so `oneseismic-decoder` can reuse the same
/// mapping for the handful of primitive reads its incremental parser drives
/// directly against `rmp::decode`, instead of duplicating it.
#[must_use]
pub fn rd_err(e: ValueReadError) -> Error {
    Error::BadMessage(format!("msgpack decode failed: {e}"))
}

/// Read exactly `len` bytes, mapping a short read to [`Error::BadMessage`].
///
/// # Errors
/// Returns [`Error::BadMessage`] if fewer than `len` bytes are available.
pub fn read_bytes_exact(rd: &mut impl Read, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    rd.read_exact(&mut buf)
        .map_err(|e| Error::BadMessage(format!("short read: {e}")))?;
    Ok(buf)
}

/// Read a msgpack string header plus its payload into an owned `String`.
///
/// # Errors
/// Returns [`Error::BadMessage`] on a non-string marker, a short read, or
/// non-UTF-8 payload bytes.
pub fn read_str_owned(rd: &mut impl Read) -> Result<String> {
    let len = decode::read_str_len(rd).map_err(rd_err)? as usize;
    let bytes = read_bytes_exact(rd, len)?;
    String::from_utf8(bytes).map_err(|e| Error::BadMessage(format!("non-utf8 string: {e}")))
}

/// Read a msgpack bin header plus its payload, reinterpreted as
/// little-endian `f32` values.
///
/// # Errors
/// Returns [`Error::BadMessage`] on a non-bin marker, a short read, or a
/// payload whose length is not a multiple of 4.
pub fn read_values(rd: &mut impl Read) -> Result<Vec<f32>> {
    let len = decode::read_bin_len(rd).map_err(rd_err)? as usize;
    let bytes = read_bytes_exact(rd, len)?;
    bin_to_floats(&bytes)
}

/// Read one `[iterations, chunk_size, initial_skip, superstride, substride,
/// bin(values)]` tile array.
///
/// # Errors
/// Returns [`Error::BadMessage`] if the array is not shaped as above.
pub fn read_tile(rd: &mut impl Read) -> Result<Tile> {
    let n = decode::read_array_len(rd).map_err(rd_err)?;
    if n != 6 {
        return Err(Error::BadMessage(format!("tile array must have 6 elements, found {n}")));
    }
    let iterations = decode::read_int(rd).map_err(rd_err)?;
    let chunk_size = decode::read_int(rd).map_err(rd_err)?;
    let initial_skip = decode::read_int(rd).map_err(rd_err)?;
    let superstride = decode::read_int(rd).map_err(rd_err)?;
    let substride = decode::read_int(rd).map_err(rd_err)?;
    let values = read_values(rd)?;
    Ok(Tile {
        iterations,
        chunk_size,
        initial_skip,
        superstride,
        substride,
        values,
    })
}

/// Decode a full slice-response envelope produced by
/// [`encode_slice_envelope`].
///
/// # Errors
/// Returns [`Error::BadMessage`] if `bytes` does not match the expected
/// envelope/bundle/tile shapes.
pub fn decode_slice_envelope(bytes: &[u8]) -> Result<(ProcessHeader, Vec<SliceBundle>)> {
    let mut rd = bytes;
    let n = decode::read_array_len(&mut rd).map_err(rd_err)?;
    if n != 2 {
        return Err(Error::BadMessage(format!("envelope array must have 2 elements, found {n}")));
    }
    let header = read_header(&mut rd)?;
    let nbundles = decode::read_array_len(&mut rd).map_err(rd_err)?;
    let mut bundles = Vec::with_capacity(nbundles as usize);
    for _ in 0..nbundles {
        let m = decode::read_array_len(&mut rd).map_err(rd_err)?;
        if m != 2 {
            return Err(Error::BadMessage(format!("slice bundle array must have 2 elements, found {m}")));
        }
        let attribute = read_str_owned(&mut rd)?;
        let ntiles = decode::read_array_len(&mut rd).map_err(rd_err)?;
        let mut tiles = Vec::with_capacity(ntiles as usize);
        for _ in 0..ntiles {
            tiles.push(read_tile(&mut rd)?);
        }
        bundles.push(SliceBundle { attribute, tiles });
    }
    Ok((header, bundles))
}

/// Decode a full curtain-response envelope produced by
/// [`encode_curtain_envelope`].
///
/// # Errors
/// Returns [`Error::BadMessage`] if `bytes` does not match the expected
/// envelope/bundle shapes.
pub fn decode_curtain_envelope(bytes: &[u8]) -> Result<(ProcessHeader, Vec<CurtainBundle>)> {
    let mut rd = bytes;
    let n = decode::read_array_len(&mut rd).map_err(rd_err)?;
    if n != 2 {
        return Err(Error::BadMessage(format!("envelope array must have 2 elements, found {n}")));
    }
    let header = read_header(&mut rd)?;
    let nbundles = decode::read_array_len(&mut rd).map_err(rd_err)?;
    let mut bundles = Vec::with_capacity(nbundles as usize);
    for _ in 0..nbundles {
        let m = decode::read_array_len(&mut rd).map_err(rd_err)?;
        if m != 5 {
            return Err(Error::BadMessage(format!("curtain bundle array must have 5 elements, found {m}")));
        }
        let attribute = read_str_owned(&mut rd)?;
        let size = decode::read_int(&mut rd).map_err(rd_err)?;
        let major_len = decode::read_array_len(&mut rd).map_err(rd_err)?;
        let mut major = Vec::with_capacity(major_len as usize);
        for _ in 0..major_len {
            major.push(decode::read_int(&mut rd).map_err(rd_err)?);
        }
        let minor_len = decode::read_array_len(&mut rd).map_err(rd_err)?;
        let mut minor = Vec::with_capacity(minor_len as usize);
        for _ in 0..minor_len {
            minor.push(decode::read_int(&mut rd).map_err(rd_err)?);
        }
        let values = read_values(&mut rd)?;
        bundles.push(CurtainBundle { attribute, size, major, minor, values });
    }
    Ok((header, bundles))
}

/// Read the map-encoded `ProcessHeader` that opens an envelope.
///
/// `rmp_serde`'s reader-based decoder consumes exactly one value and leaves
/// `rd` advanced past it, so the remaining bundles can be pulled off the same
/// cursor with the `rmp::decode` calls above.
fn read_header(rd: &mut &[u8]) -> Result<ProcessHeader> {
    rmp_serde::decode::from_read(rd)
        .map_err(|e| Error::BadMessage(format!("process header decode failed: {e}")))
}
