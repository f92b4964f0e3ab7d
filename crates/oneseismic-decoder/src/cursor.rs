//! Single-attempt, restartable primitive reads over a `&[u8]` cursor.
//!
//! Every function here takes `&mut &[u8]` and either fully consumes the
//! value it describes (advancing the cursor) or leaves the cursor
//! untouched. [`Step::NeedMore`] means the cursor's remaining bytes are a
//! valid-so-far prefix of the value but don't yet contain all of it — the
//! caller discards the whole cursor (a cheap slice reborrow, not the
//! decoder's real buffer) and tries again once more bytes are buffered.
//! [`Step::Bad`] means the bytes present are not a valid prefix at all.

use std::io;

use oneseismic_messages::{ProcessHeader, Tile};
use rmp::decode::{self, ValueReadError};

/// Outcome of one primitive read attempt.
pub(crate) enum Step<T> {
    /// The value was fully read; the cursor has been advanced past it.
    Done(T),
    /// Not enough bytes are present yet; the cursor is unchanged.
    NeedMore,
    /// The bytes present do not form a valid prefix of this value.
    Bad(String),
}

/// Propagate a non-[`Step::Done`] outcome out of the enclosing function,
/// unwrapping [`Step::Done`] to its value otherwise.
macro_rules! tri {
    ($e:expr) => {
        match $e {
            Step::Done(v) => v,
            Step::NeedMore => return Step::NeedMore,
            Step::Bad(m) => return Step::Bad(m),
        }
    };
}

fn io_is_eof(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::UnexpectedEof
}

fn classify_value_read_error(e: ValueReadError) -> Step<std::convert::Infallible> {
    match e {
        ValueReadError::InvalidMarkerRead(io) | ValueReadError::InvalidDataRead(io)
            if io_is_eof(&io) =>
        {
            Step::NeedMore
        }
        other => Step::Bad(format!("msgpack decode failed: {other}")),
    }
}

/// Adapt a `Step<Infallible>` "error-only" outcome into any `Step<T>`.
fn reclass<T>(e: ValueReadError) -> Step<T> {
    match classify_value_read_error(e) {
        Step::NeedMore => Step::NeedMore,
        Step::Bad(m) => Step::Bad(m),
        Step::Done(never) => match never {},
    }
}

/// Read an array-length marker (fixarray / array16 / array32).
pub(crate) fn step_array_len(cur: &mut &[u8]) -> Step<u32> {
    match decode::read_array_len(cur) {
        Ok(n) => Step::Done(n),
        Err(e) => reclass(e),
    }
}

fn step_uint(cur: &mut &[u8]) -> Step<u64> {
    match decode::read_int::<u64, _>(cur) {
        Ok(n) => Step::Done(n),
        Err(e) => reclass(e),
    }
}

fn step_bytes(cur: &mut &[u8], len: usize) -> Step<Vec<u8>> {
    if cur.len() < len {
        return Step::NeedMore;
    }
    let (head, tail) = cur.split_at(len);
    let out = head.to_vec();
    *cur = tail;
    Step::Done(out)
}

fn step_str(cur: &mut &[u8]) -> Step<String> {
    let len = match decode::read_str_len(cur) {
        Ok(n) => n as usize,
        Err(e) => return reclass(e),
    };
    let bytes = tri!(step_bytes(cur, len));
    match String::from_utf8(bytes) {
        Ok(s) => Step::Done(s),
        Err(e) => Step::Bad(format!("non-utf8 string: {e}")),
    }
}

fn step_values(cur: &mut &[u8]) -> Step<Vec<f32>> {
    let len = match decode::read_bin_len(cur) {
        Ok(n) => n as usize,
        Err(e) => return reclass(e),
    };
    let bytes = tri!(step_bytes(cur, len));
    if bytes.len() % 4 != 0 {
        return Step::Bad(format!(
            "tile value buffer length {} is not a multiple of 4",
            bytes.len()
        ));
    }
    Step::Done(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn step_tile(cur: &mut &[u8]) -> Step<Tile> {
    let n = tri!(step_array_len(cur));
    if n != 6 {
        return Step::Bad(format!("tile array must have 6 elements, found {n}"));
    }
    let iterations = tri!(step_uint(cur));
    let chunk_size = tri!(step_uint(cur));
    let initial_skip = tri!(step_uint(cur));
    let superstride = tri!(step_uint(cur));
    let substride = tri!(step_uint(cur));
    let values = tri!(step_values(cur));
    Step::Done(Tile {
        iterations,
        chunk_size,
        initial_skip,
        superstride,
        substride,
        values,
    })
}

/// Read one `[attr_name, [tile, ...]]` slice bundle.
pub(crate) fn step_slice_bundle(cur: &mut &[u8]) -> Step<(String, Vec<Tile>)> {
    let n = tri!(step_array_len(cur));
    if n != 2 {
        return Step::Bad(format!("slice bundle array must have 2 elements, found {n}"));
    }
    let attribute = tri!(step_str(cur));
    let ntiles = tri!(step_array_len(cur));
    let mut tiles = Vec::with_capacity(ntiles as usize);
    for _ in 0..ntiles {
        tiles.push(tri!(step_tile(cur)));
    }
    Step::Done((attribute, tiles))
}

/// Read one `[attr_name, size, major[2n], minor[2n], bin(values)]` curtain
/// bundle.
pub(crate) fn step_curtain_bundle(
    cur: &mut &[u8],
) -> Step<(String, u64, Vec<u64>, Vec<u64>, Vec<f32>)> {
    let n = tri!(step_array_len(cur));
    if n != 5 {
        return Step::Bad(format!("curtain bundle array must have 5 elements, found {n}"));
    }
    let attribute = tri!(step_str(cur));
    let size = tri!(step_uint(cur));
    let major_len = tri!(step_array_len(cur));
    let mut major = Vec::with_capacity(major_len as usize);
    for _ in 0..major_len {
        major.push(tri!(step_uint(cur)));
    }
    let minor_len = tri!(step_array_len(cur));
    let mut minor = Vec::with_capacity(minor_len as usize);
    for _ in 0..minor_len {
        minor.push(tri!(step_uint(cur)));
    }
    let values = tri!(step_values(cur));
    Step::Done((attribute, size, major, minor, values))
}

/// Read one MessagePack-map-encoded [`ProcessHeader`].
///
/// Unlike the other steps, this delegates to `rmp_serde` (the header is a
/// map decoded via `serde`, not a hand-walked tagged array); a short read
/// surfaces as one of `rmp_serde`'s own IO-wrapping variants, which we
/// classify the same way as the `rmp` primitives above.
pub(crate) fn step_header(cur: &mut &[u8]) -> Step<ProcessHeader> {
    match rmp_serde::decode::from_read::<_, ProcessHeader>(cur) {
        Ok(header) => Step::Done(header),
        Err(rmp_serde::decode::Error::InvalidMarkerRead(io))
        | Err(rmp_serde::decode::Error::InvalidDataRead(io))
            if io_is_eof(&io) =>
        {
            Step::NeedMore
        }
        Err(e) => Step::Bad(format!("process header decode failed: {e}")),
    }
}
