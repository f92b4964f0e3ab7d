//! Golden end-to-end scenarios (S1-S6): the planner, extractor, and decoder
//! driven together the way the surrounding (out-of-scope) runtime would,
//! rather than unit-tested in isolation per crate.
//!
//! Mirrors the teacher's cross-crate `tests/` convention (e.g.
//! `sezkp-fold/tests/harness.rs`, which pulls in `sezkp-trace` to exercise
//! its library against real trace data instead of synthetic fixtures local
//! to the crate under test).

use oneseismic_decoder::{DecodeStatus, Decoder};
use oneseismic_messages::{ProcessHeader, QueryCommon, SliceQuery, SliceTask};
use oneseismic_process::make_process;
use rmp::encode;
use serde_json::json;

const CUBE_555: [u32; 3] = [5, 5, 5];
const FRAG_333: [u32; 3] = [3, 3, 3];

fn manifest_for(cube: [u32; 3]) -> serde_json::Value {
    json!({
        "dimensions": [
            (0..cube[0]).map(i64::from).collect::<Vec<_>>(),
            (0..cube[1]).map(i64::from).collect::<Vec<_>>(),
            (0..cube[2]).map(i64::from).collect::<Vec<_>>(),
        ],
    })
}

fn common(shape: [u32; 3], function: &str) -> QueryCommon {
    QueryCommon {
        pid: "golden-pid".into(),
        guid: "golden-guid".into(),
        token: "tok".into(),
        storage_endpoint: "memory://golden".into(),
        shape,
        function: function.into(),
    }
}

/// `value(gx, gy, gz) = gx*100 + gy*10 + gz`, a naive hand-extractable
/// marker value so a slice's samples can be checked against cube
/// coordinates directly.
fn synth_fragment(frag: [u32; 3], id: [u32; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity((frag[0] * frag[1] * frag[2]) as usize * 4);
    for lx in 0..frag[0] {
        for ly in 0..frag[1] {
            for lz in 0..frag[2] {
                let gx = id[0] * frag[0] + lx;
                let gy = id[1] * frag[1] + ly;
                let gz = id[2] * frag[2] + lz;
                let v = gx as f32 * 100.0 + gy as f32 * 10.0 + gz as f32;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out
}

/// Plan, extract, and decode a full slice query end to end, returning the
/// decoded dense result plus the header describing its shape.
fn run_slice(cube: [u32; 3], frag: [u32; 3], dim: u32, lineno: i64, task_size: usize) -> (ProcessHeader, Vec<f32>) {
    let query = SliceQuery {
        common: common(frag, "slice"),
        manifest: manifest_for(cube),
        dim,
        lineno,
    };
    let query_bytes = query.to_json().unwrap();

    let blobs = oneseismic_planner::plan_slice(&query_bytes, task_size).unwrap();
    let (task_blobs, header_blob) = blobs.split_at(blobs.len() - 1);
    let header = ProcessHeader::from_msgpack(&header_blob[0]).unwrap();

    let mut bundle_bytes = Vec::new();
    for blob in task_blobs {
        let task = SliceTask::from_json(blob).unwrap();
        let mut process = make_process("slice").unwrap();
        process.init(blob, "amplitude", "amplitude", "f32").unwrap();
        for (i, id) in task.ids.iter().enumerate() {
            process.add(i, &synth_fragment(frag, *id)).unwrap();
        }
        bundle_bytes.push(process.pack().unwrap());
    }

    let mut envelope = Vec::new();
    encode::write_array_len(&mut envelope, 2).unwrap();
    envelope.extend_from_slice(&header_blob[0]);
    encode::write_array_len(&mut envelope, u32::try_from(bundle_bytes.len()).unwrap()).unwrap();
    for b in &bundle_bytes {
        envelope.extend_from_slice(b);
    }

    let total: usize = header.shape.iter().map(|&d| d as usize).product();
    let mut out = vec![f32::NAN; total];
    {
        let mut decoder: Decoder<'_> = Decoder::new();
        decoder.register_writer("amplitude", &mut out);
        let mut status = DecodeStatus::Paused;
        for chunk in envelope.chunks(13) {
            status = decoder.buffer_and_process(chunk).unwrap();
        }
        assert_eq!(status, DecodeStatus::Done);
    }
    assert!(!out.iter().any(|v| v.is_nan()), "every output sample must be written");
    (header, out)
}

/// (S1) Inline slice, 3x3x3 fragments tiling a 5x5x5 cube: exactly two task
/// blobs (3 ids, 1 id) plus a header, local_idx 0.
#[test]
fn s1_inline_slice_task_partition() {
    let query = SliceQuery {
        common: common(FRAG_333, "slice"),
        manifest: manifest_for(CUBE_555),
        dim: 0,
        lineno: 0,
    };
    let bytes = query.to_json().unwrap();
    let blobs = oneseismic_planner::plan_slice(&bytes, 3).unwrap();
    assert_eq!(blobs.len(), 3, "two task blobs plus a header");

    let t0 = SliceTask::from_json(&blobs[0]).unwrap();
    let t1 = SliceTask::from_json(&blobs[1]).unwrap();
    assert_eq!(t0.ids.len(), 3);
    assert_eq!(t1.ids.len(), 1);
    assert_eq!(t0.local_idx, 0);
    let mut all_ids = t0.ids.clone();
    all_ids.extend(t1.ids.clone());
    assert_eq!(all_ids, vec![[0, 0, 0], [0, 0, 1], [0, 1, 0], [0, 1, 1]]);
}

/// (S3/S8) Extractor correctness: the decoded inline=3 slice of a 5x5x5
/// cube tiled by 3x3x3 fragments equals the naive hand-extracted plane
/// `value(3, y, z) = 300 + y*10 + z`.
#[test]
fn s3_s8_extractor_matches_naive_slice() {
    let (header, out) = run_slice(CUBE_555, FRAG_333, 0, 3, 100);
    assert_eq!(header.shape, vec![5, 5]);
    let expected: Vec<f32> = (0..5)
        .flat_map(|y| (0..5).map(move |z| 300.0 + y as f32 * 10.0 + z as f32))
        .collect();
    assert_eq!(out, expected);
}

/// (S4) Piecewise decoder feed: byte-at-a-time delivery of a real planned
/// and extracted response must pause exactly once with the header
/// available and finish in exactly one `Done`.
#[test]
fn s4_byte_at_a_time_decode_pauses_and_finishes_once() {
    let query = SliceQuery {
        common: common(FRAG_333, "slice"),
        manifest: manifest_for(CUBE_555),
        dim: 0,
        lineno: 0,
    };
    let query_bytes = query.to_json().unwrap();
    let blobs = oneseismic_planner::plan_slice(&query_bytes, 100).unwrap();
    let (task_blobs, header_blob) = blobs.split_at(blobs.len() - 1);
    let header = ProcessHeader::from_msgpack(&header_blob[0]).unwrap();

    let mut bundle_bytes = Vec::new();
    for blob in task_blobs {
        let task = SliceTask::from_json(blob).unwrap();
        let mut process = make_process("slice").unwrap();
        process.init(blob, "amplitude", "amplitude", "f32").unwrap();
        for (i, id) in task.ids.iter().enumerate() {
            process.add(i, &synth_fragment(FRAG_333, *id)).unwrap();
        }
        bundle_bytes.push(process.pack().unwrap());
    }
    let mut envelope = Vec::new();
    encode::write_array_len(&mut envelope, 2).unwrap();
    envelope.extend_from_slice(&header_blob[0]);
    encode::write_array_len(&mut envelope, u32::try_from(bundle_bytes.len()).unwrap()).unwrap();
    for b in &bundle_bytes {
        envelope.extend_from_slice(b);
    }

    let total: usize = header.shape.iter().map(|&d| d as usize).product();
    let mut out = vec![f32::NAN; total];
    let mut decoder: Decoder<'_> = Decoder::new();
    decoder.register_writer("amplitude", &mut out);

    let mut header_pauses = 0;
    let mut dones = 0;
    for &byte in &envelope {
        let status = decoder.buffer_and_process(&[byte]).unwrap();
        if status == DecodeStatus::Paused && decoder.header().is_some() {
            // only count the transition, not every subsequent paused byte
            if header_pauses == 0 {
                header_pauses = 1;
            }
        }
        if status == DecodeStatus::Done {
            dones += 1;
        }
    }
    assert_eq!(header_pauses, 1);
    assert_eq!(dones, 1);
}

/// (S5) Planner rejects an unknown lineno with `NotFound`.
#[test]
fn s5_unknown_lineno_rejected() {
    let query = SliceQuery {
        common: common([1, 1, 1], "slice"),
        manifest: json!({"dimensions": [[1, 2, 3], [1, 2, 3], [1, 2, 3]]}),
        dim: 0,
        lineno: 99,
    };
    let bytes = query.to_json().unwrap();
    let err = oneseismic_planner::plan_slice(&bytes, 10).unwrap_err();
    assert!(matches!(err, oneseismic_core::Error::NotFound(_)));
}

/// (S6) Partition law: concatenating every task's `ids` (excluding the
/// header) reproduces the planner's full fragment list in order, for a
/// range of task sizes, end to end through JSON-packed task blobs.
#[test]
fn s6_partition_law_across_task_sizes() {
    let query = SliceQuery {
        common: common(FRAG_333, "slice"),
        manifest: manifest_for(CUBE_555),
        dim: 0,
        lineno: 0,
    };
    let bytes = query.to_json().unwrap();
    for task_size in 1..=6usize {
        let blobs = oneseismic_planner::plan_slice(&bytes, task_size).unwrap();
        let (tasks, header_bytes) = blobs.split_at(blobs.len() - 1);
        let header = ProcessHeader::from_msgpack(&header_bytes[0]).unwrap();
        assert_eq!(header.nbundles as usize, tasks.len());
        let mut all_ids = Vec::new();
        for t in tasks {
            let task = SliceTask::from_json(t).unwrap();
            assert!(task.ids.len() <= task_size);
            all_ids.extend(task.ids);
        }
        assert_eq!(all_ids, vec![[0, 0, 0], [0, 0, 1], [0, 1, 0], [0, 1, 1]]);
    }
}

/// Crossline slice (a middle axis, exercising the non-trivial `substride`
/// path) round-trips end to end against the naive hand-extracted plane.
#[test]
fn crossline_slice_through_full_pipeline() {
    let cube = [9, 15, 23];
    let frag = [3, 9, 5];
    let (header, out) = run_slice(cube, frag, 1, 11, 4);
    assert_eq!(header.shape, vec![9, 23]);
    let expected: Vec<f32> = (0..9)
        .flat_map(|x| (0..23).map(move |z| x as f32 * 100.0 + 11.0 * 10.0 + z as f32))
        .collect();
    assert_eq!(out, expected);
}
