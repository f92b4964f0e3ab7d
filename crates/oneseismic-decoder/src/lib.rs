#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! The streaming (pull-parser) response decoder.
//!
//! A response bundle arrives over an arbitrary number of I/O reads, so this
//! decoder never assumes a whole message is in hand. It is an explicit state
//! machine (`envelope -> header -> nbundles -> bundles -> done`) over a
//! growing byte buffer and a cursor: every call to [`Decoder::process`]
//! advances as far as the buffered bytes allow and returns
//! [`DecodeStatus::Paused`] the moment it runs out, so the caller can
//! `buffer` more and call `process` again. The saved `phase` means resuming
//! costs nothing beyond re-attempting the step that paused.
//!
//! Each parse attempt runs against a throwaway cursor over the unconsumed
//! suffix of the buffer; only a *fully successful* attempt advances the
//! committed read position, so a short buffer never leaves the decoder in a
//! half-consumed state.

mod cursor;
mod scatter;

use std::collections::HashMap;

use oneseismic_core::{Error, Result};
use oneseismic_messages::{ProcessHeader, Tile};

use cursor::{step_array_len, step_curtain_bundle, step_header, step_slice_bundle, Step};

/// Result of one [`Decoder::process`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The buffered bytes were exhausted before the current phase
    /// completed; call [`Decoder::buffer`] (or [`Decoder::buffer_and_process`])
    /// with more bytes and call `process` again.
    Paused,
    /// All `nbundles` bundles have been scattered; the response is fully
    /// decoded.
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Envelope,
    Header,
    NBundles,
    Bundles,
    Done,
}

/// Decoded contents of one attribute's bundle, handed to the writer
/// registry for scattering. Kept internal; callers only ever see the
/// effects of a scatter in their own registered buffers.
enum Bundle {
    Slice { attribute: String, tiles: Vec<Tile> },
    Curtain { attribute: String, major: Vec<u64>, minor: Vec<u64>, values: Vec<f32> },
}

/// Streaming response decoder.
///
/// `'buf` is the lifetime of the output buffers registered with
/// [`Decoder::register_writer`]; the decoder borrows them for exactly as
/// long as it might still scatter into them, and the borrow checker (rather
/// than a caller convention) enforces that they outlive that use.
pub struct Decoder<'buf> {
    buf: Vec<u8>,
    pos: usize,
    phase: Phase,
    header: Option<ProcessHeader>,
    bundles_seen: u32,
    writers: HashMap<String, &'buf mut [f32]>,
    poison: Option<Error>,
}

impl<'buf> Default for Decoder<'buf> {
    fn default() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            phase: Phase::Envelope,
            header: None,
            bundles_seen: 0,
            writers: HashMap::new(),
            poison: None,
        }
    }
}

/// Byte count beyond which a fully-consumed prefix of the internal buffer
/// is compacted away, so a long-running decoder doesn't retain every byte
/// it has ever seen.
const COMPACT_THRESHOLD: usize = 64 * 1024;

impl<'buf> Decoder<'buf> {
    /// Construct a fresh decoder at the start of the state machine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the internal buffer without processing them.
    pub fn buffer(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append bytes and immediately drive [`Decoder::process`].
    ///
    /// # Errors
    /// See [`Decoder::process`].
    pub fn buffer_and_process(&mut self, bytes: &[u8]) -> Result<DecodeStatus> {
        self.buffer(bytes);
        self.process()
    }

    /// The parsed [`ProcessHeader`], once the `header` phase has completed.
    #[must_use]
    pub fn header(&self) -> Option<&ProcessHeader> {
        self.header.as_ref()
    }

    /// Register `dst` as the output buffer for `attr`. Bundles for
    /// attributes with no registered writer are parsed (to stay in sync
    /// with the byte stream) and silently discarded.
    pub fn register_writer(&mut self, attr: impl Into<String>, dst: &'buf mut [f32]) {
        self.writers.insert(attr.into(), dst);
    }

    /// Clear the buffer and state machine, but not registered writers.
    /// Required after any `process`/`buffer_and_process` call returns an
    /// error, per [`Decoder::process`]'s contract.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.phase = Phase::Envelope;
        self.header = None;
        self.bundles_seen = 0;
        self.poison = None;
    }

    /// Advance the state machine as far as the buffered bytes allow.
    ///
    /// Returns [`DecodeStatus::Paused`] when more bytes are needed —
    /// including, unconditionally, the first time the header finishes
    /// parsing, so the caller can inspect [`Decoder::header`] and register
    /// writers before any bundle is scattered. Returns [`DecodeStatus::Done`]
    /// once all bundles named by the header have been consumed.
    ///
    /// # Errors
    /// Returns [`Error::BadMessage`] (or [`Error::BadValue`] for an
    /// unrecognized `function`) the first time a structurally invalid
    /// message is encountered. Once that happens every subsequent call
    /// returns the same error until [`Decoder::reset`] is called.
    #[tracing::instrument(skip(self))]
    pub fn process(&mut self) -> Result<DecodeStatus> {
        if let Some(e) = &self.poison {
            return Err(e.clone());
        }
        loop {
            match self.phase {
                Phase::Envelope => match self.attempt_envelope()? {
                    Some(()) => {
                        tracing::trace!("envelope parsed");
                        self.phase = Phase::Header;
                    }
                    None => return Ok(DecodeStatus::Paused),
                },
                Phase::Header => match self.attempt_header()? {
                    Some(header) => {
                        tracing::debug!(function = %header.function, nbundles = header.nbundles, "header parsed");
                        self.header = Some(header);
                        self.phase = Phase::NBundles;
                        return Ok(DecodeStatus::Paused);
                    }
                    None => return Ok(DecodeStatus::Paused),
                },
                Phase::NBundles => match self.attempt_nbundles()? {
                    Some(()) => {
                        self.phase = Phase::Bundles;
                    }
                    None => return Ok(DecodeStatus::Paused),
                },
                Phase::Bundles => {
                    let expected = self
                        .header
                        .as_ref()
                        .ok_or_else(|| Error::logic("bundles phase reached without a header"))?
                        .nbundles;
                    if self.bundles_seen >= expected {
                        self.phase = Phase::Done;
                        continue;
                    }
                    match self.attempt_bundle()? {
                        Some(()) => {
                            self.bundles_seen += 1;
                            tracing::trace!(seen = self.bundles_seen, expected, "bundle scattered");
                        }
                        None => return Ok(DecodeStatus::Paused),
                    }
                }
                Phase::Done => return Ok(DecodeStatus::Done),
            }
        }
    }

    fn cursor(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn commit(&mut self, consumed: usize) {
        self.pos += consumed;
        if self.pos >= COMPACT_THRESHOLD || self.pos == self.buf.len() {
            self.buf.drain(0..self.pos);
            self.pos = 0;
        }
    }

    fn poison_with(&mut self, e: Error) -> Error {
        self.poison = Some(e.clone());
        e
    }

    fn run<T>(&mut self, f: impl FnOnce(&mut &[u8]) -> Step<T>) -> Result<Option<T>> {
        let mut cur = self.cursor();
        let original_len = cur.len();
        match f(&mut cur) {
            Step::Done(v) => {
                let consumed = original_len - cur.len();
                self.commit(consumed);
                Ok(Some(v))
            }
            Step::NeedMore => Ok(None),
            Step::Bad(msg) => Err(self.poison_with(Error::BadMessage(msg))),
        }
    }

    fn attempt_envelope(&mut self) -> Result<Option<()>> {
        self.run(|cur| match step_array_len(cur) {
            Step::Done(n) if n == 2 => Step::Done(()),
            Step::Done(n) => Step::Bad(format!("envelope array must have 2 elements, found {n}")),
            Step::NeedMore => Step::NeedMore,
            Step::Bad(m) => Step::Bad(m),
        })
    }

    fn attempt_header(&mut self) -> Result<Option<ProcessHeader>> {
        let header = self.run(step_header)?;
        let Some(header) = header else { return Ok(None) };
        if header.function != "slice" && header.function != "curtain" {
            return Err(self.poison_with(Error::BadValue(format!(
                "unrecognized process header function {:?}",
                header.function
            ))));
        }
        Ok(Some(header))
    }

    fn attempt_nbundles(&mut self) -> Result<Option<()>> {
        let expected = self
            .header
            .as_ref()
            .ok_or_else(|| Error::logic("nbundles phase reached without a header"))?
            .nbundles;
        self.run(|cur| match step_array_len(cur) {
            Step::Done(n) if n == expected => Step::Done(()),
            Step::Done(n) => {
                Step::Bad(format!("nbundles array must equal header.nbundles ({expected}), found {n}"))
            }
            Step::NeedMore => Step::NeedMore,
            Step::Bad(m) => Step::Bad(m),
        })
    }

    fn attempt_bundle(&mut self) -> Result<Option<()>> {
        let is_curtain = self
            .header
            .as_ref()
            .ok_or_else(|| Error::logic("bundle phase reached without a header"))?
            .function
            == "curtain";

        let bundle = if is_curtain {
            self.run(|cur| match step_curtain_bundle(cur) {
                Step::Done((attribute, _size, major, minor, values)) => {
                    Step::Done(Bundle::Curtain { attribute, major, minor, values })
                }
                Step::NeedMore => Step::NeedMore,
                Step::Bad(m) => Step::Bad(m),
            })?
        } else {
            self.run(|cur| match step_slice_bundle(cur) {
                Step::Done((attribute, tiles)) => Step::Done(Bundle::Slice { attribute, tiles }),
                Step::NeedMore => Step::NeedMore,
                Step::Bad(m) => Step::Bad(m),
            })?
        };

        let Some(bundle) = bundle else { return Ok(None) };

        let zlen = self
            .header
            .as_ref()
            .and_then(|h| h.index.get(2))
            .map(Vec::len);

        match bundle {
            Bundle::Slice { attribute, tiles } => {
                if let Some(dst) = self.writers.get_mut(&attribute) {
                    scatter::scatter_slice(&mut **dst, &tiles).map_err(|e| self.poison_with(e))?;
                } else {
                    tracing::trace!(attribute, "discarding slice bundle with no registered writer");
                }
            }
            Bundle::Curtain { attribute, major, minor, values } => {
                if let Some(dst) = self.writers.get_mut(&attribute) {
                    let zlen = zlen.ok_or_else(|| {
                        Error::BadMessage("curtain header is missing a z-axis index".to_string())
                    })?;
                    scatter::scatter_curtain(&mut **dst, zlen, &major, &minor, &values)
                        .map_err(|e| self.poison_with(e))?;
                } else {
                    tracing::trace!(attribute, "discarding curtain bundle with no registered writer");
                }
            }
        }
        Ok(Some(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oneseismic_messages::wire::{
        encode_curtain_envelope, encode_slice_envelope, CurtainBundle, SliceBundle,
    };

    fn sample_header(function: &str, nbundles: u32, ndims: u32, index: Vec<Vec<i64>>) -> ProcessHeader {
        ProcessHeader {
            pid: "pid".into(),
            function: function.into(),
            nbundles,
            ndims,
            shape: index.iter().map(|a| a.len() as u32).collect(),
            index,
            labels: Vec::new(),
            attributes: vec!["amplitude".into()],
        }
    }

    #[test]
    fn s4_piecewise_feed_pauses_exactly_once_at_header_and_once_at_done() {
        let header = sample_header("slice", 1, 2, vec![vec![0, 1, 2], vec![0, 1, 2]]);
        let bundle = SliceBundle {
            attribute: "amplitude".into(),
            tiles: vec![Tile {
                iterations: 1,
                chunk_size: 3,
                initial_skip: 0,
                superstride: 3,
                substride: 3,
                values: vec![1.0, 2.0, 3.0],
            }],
        };
        let bytes = encode_slice_envelope(&header, std::slice::from_ref(&bundle)).unwrap();

        let mut out = [0.0f32; 9];
        let mut decoder = Decoder::new();
        decoder.register_writer("amplitude", &mut out);

        let mut header_pauses = 0;
        let mut dones = 0;
        for &byte in &bytes {
            let status = decoder.buffer_and_process(&[byte]).unwrap();
            if status == DecodeStatus::Paused && decoder.header().is_some() && decoder.bundles_seen == 0 {
                header_pauses += 1;
            }
            if status == DecodeStatus::Done {
                dones += 1;
            }
        }
        assert_eq!(header_pauses, 1, "header must become available exactly once");
        assert_eq!(dones, 1, "decoder must finish exactly once");
        assert_eq!(out[0..3], [1.0, 2.0, 3.0]);
    }

    #[test]
    fn idempotent_under_arbitrary_chunking() {
        let header = sample_header("slice", 1, 2, vec![vec![0, 1], vec![0, 1]]);
        let bundle = SliceBundle {
            attribute: "amplitude".into(),
            tiles: vec![Tile {
                iterations: 2,
                chunk_size: 2,
                initial_skip: 0,
                superstride: 2,
                substride: 2,
                values: vec![9.0, 8.0, 7.0, 6.0],
            }],
        };
        let bytes = encode_slice_envelope(&header, std::slice::from_ref(&bundle)).unwrap();

        for chunk_size in [1usize, 2, 3, 5, bytes.len()] {
            let mut out = [0.0f32; 4];
            let mut decoder = Decoder::new();
            decoder.register_writer("amplitude", &mut out);
            let mut status = DecodeStatus::Paused;
            let mut dones = 0;
            for chunk in bytes.chunks(chunk_size) {
                status = decoder.buffer_and_process(chunk).unwrap();
                if status == DecodeStatus::Done {
                    dones += 1;
                }
            }
            assert_eq!(status, DecodeStatus::Done);
            assert_eq!(dones, 1, "chunk_size={chunk_size}");
            assert_eq!(out, [9.0, 8.0, 7.0, 6.0], "chunk_size={chunk_size}");
        }
    }

    #[test]
    fn discards_bundle_with_no_registered_writer() {
        let header = sample_header("slice", 1, 2, vec![vec![0, 1], vec![0, 1]]);
        let bundle = SliceBundle {
            attribute: "amplitude".into(),
            tiles: vec![Tile {
                iterations: 1,
                chunk_size: 2,
                initial_skip: 0,
                superstride: 2,
                substride: 2,
                values: vec![1.0, 2.0],
            }],
        };
        let bytes = encode_slice_envelope(&header, std::slice::from_ref(&bundle)).unwrap();
        let mut decoder: Decoder<'_> = Decoder::new();
        let status = decoder.buffer_and_process(&bytes).unwrap();
        assert_eq!(status, DecodeStatus::Done);
    }

    #[test]
    fn rejects_unknown_function_as_bad_value() {
        let header = sample_header("unknown", 0, 0, Vec::new());
        let bytes = encode_slice_envelope(&header, &[]).unwrap();
        let mut decoder: Decoder<'_> = Decoder::new();
        let err = decoder.buffer_and_process(&bytes).unwrap_err();
        assert!(matches!(err, Error::BadValue(_)));
    }

    #[test]
    fn malformed_message_poisons_until_reset() {
        let mut decoder: Decoder<'_> = Decoder::new();
        let err1 = decoder.buffer_and_process(&[0xc1]).unwrap_err();
        assert!(matches!(err1, Error::BadMessage(_)));
        let err2 = decoder.process().unwrap_err();
        assert_eq!(err1, err2, "a poisoned decoder must re-return the same error");
        decoder.reset();
        // A fresh envelope-array marker now parses again.
        let header = sample_header("slice", 0, 0, Vec::new());
        let bytes = encode_slice_envelope(&header, &[]).unwrap();
        assert_eq!(decoder.buffer_and_process(&bytes).unwrap(), DecodeStatus::Done);
    }

    #[test]
    fn curtain_bundle_scatters_contiguous_z_strips_per_chunk() {
        let header = sample_header(
            "curtain",
            1,
            3,
            vec![vec![0, 1, 2], vec![0, 1, 2], vec![0, 1, 2, 3, 4]],
        );
        let bundle = CurtainBundle {
            attribute: "amplitude".into(),
            size: 2,
            major: vec![0, 2],
            minor: vec![1, 4],
            values: vec![10.0, 20.0, 30.0, 11.0, 21.0, 31.0],
        };
        let bytes = encode_curtain_envelope(&header, std::slice::from_ref(&bundle)).unwrap();
        // zlen = 5 (from header.index[2]); two traces (t=0, t=1), z in [1,4).
        let mut out = vec![0.0f32; 2 * 5];
        let mut decoder = Decoder::new();
        decoder.register_writer("amplitude", &mut out);
        assert_eq!(decoder.buffer_and_process(&bytes).unwrap(), DecodeStatus::Done);
        assert_eq!(&out[0..5], &[0.0, 10.0, 20.0, 30.0, 0.0]);
        assert_eq!(&out[5..10], &[0.0, 11.0, 21.0, 31.0, 0.0]);
    }
}
