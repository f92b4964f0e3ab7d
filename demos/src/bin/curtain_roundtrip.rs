//! Canned end-to-end curtain scenario: plan two full-depth traces against a
//! synthetic manifest, extract them against synthetic fragment data, and
//! decode the resulting response stream back into per-trace depth strips.
//!
//! Run with `cargo run --bin curtain_roundtrip` (no arguments). Fragments
//! here are chosen one-per-axis-deep (`FRAG[2] == CUBE[2]`) so every
//! requested trace is satisfied by a single fragment add — the cleanest
//! case to read off by hand.

use anyhow::{ensure, Context, Result};
use oneseismic_decoder::{DecodeStatus, Decoder};
use oneseismic_messages::{CurtainQuery, CurtainTask, ProcessHeader, QueryCommon};
use oneseismic_process::make_process;
use rmp::encode;
use serde_json::json;

const CUBE: [u32; 3] = [6, 6, 6];
const FRAG: [u32; 3] = [3, 3, 6];

/// A fragment's row-major f32 payload: `value(gx, gy, gz) = gx*100 + gy*10 + gz`.
fn synth_fragment(id: [u32; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity((FRAG[0] * FRAG[1] * FRAG[2]) as usize * 4);
    for lx in 0..FRAG[0] {
        for ly in 0..FRAG[1] {
            for lz in 0..FRAG[2] {
                let gx = id[0] * FRAG[0] + lx;
                let gy = id[1] * FRAG[1] + ly;
                let gz = id[2] * FRAG[2] + lz;
                let v = gx as f32 * 100.0 + gy as f32 * 10.0 + gz as f32;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let manifest = json!({
        "dimensions": [
            (0..CUBE[0]).map(i64::from).collect::<Vec<_>>(),
            (0..CUBE[1]).map(i64::from).collect::<Vec<_>>(),
            (0..CUBE[2]).map(i64::from).collect::<Vec<_>>(),
        ],
        "line_labels": ["inline", "crossline", "time"],
    });

    let dim0s = vec![1_i64, 4];
    let dim1s = vec![1_i64, 4];
    let query = CurtainQuery {
        common: QueryCommon {
            pid: "demo-pid".into(),
            guid: "demo-guid".into(),
            token: "unused".into(),
            storage_endpoint: "memory://demo".into(),
            shape: FRAG,
            function: "curtain".into(),
        },
        manifest,
        dim0s: dim0s.clone(),
        dim1s: dim1s.clone(),
    };
    let query_bytes = query.to_json().context("encode curtain query")?;

    let blobs = oneseismic_planner::plan_curtain(&query_bytes, 100).context("plan curtain")?;
    let (task_blobs, header_blob) = blobs.split_at(blobs.len() - 1);
    let header = ProcessHeader::from_msgpack(&header_blob[0]).context("decode process header")?;
    println!(
        "planned {} task(s) for {} traces, attributes={:?}",
        task_blobs.len(),
        dim0s.len(),
        header.attributes
    );

    let mut bundle_bytes = Vec::new();
    for blob in task_blobs {
        let task = CurtainTask::from_json(blob).context("decode curtain task")?;
        let mut process = make_process("curtain").context("unrecognized process kind")?;
        process.init(blob, "amplitude", "amplitude", "f32")?;
        for (i, single) in task.singles.iter().enumerate() {
            process.add(i, &synth_fragment(single.id))?;
        }
        bundle_bytes.push(process.pack()?);
    }

    let mut envelope = Vec::new();
    encode::write_array_len(&mut envelope, 2).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    envelope.extend_from_slice(&header_blob[0]);
    encode::write_array_len(&mut envelope, u32::try_from(bundle_bytes.len())?)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    for b in &bundle_bytes {
        envelope.extend_from_slice(b);
    }

    // Known by construction for this scenario: one output row of `zlen`
    // samples per requested trace, in request order.
    let zlen = CUBE[2] as usize;
    let ntraces = dim0s.len();
    let mut out = vec![f32::NAN; ntraces * zlen];
    let mut decoder: Decoder<'_> = Decoder::new();
    decoder.register_writer("amplitude", &mut out);

    let mut status = DecodeStatus::Paused;
    for chunk in envelope.chunks(17) {
        status = decoder.buffer_and_process(chunk)?;
    }
    ensure!(status == DecodeStatus::Done, "decoder did not reach Done");
    ensure!(!out.iter().any(|v| v.is_nan()), "decoder left unwritten samples behind");

    for (t, (&x, &y)) in dim0s.iter().zip(dim1s.iter()).enumerate() {
        let row = &out[t * zlen..(t + 1) * zlen];
        println!("trace (x={x}, y={y}): {row:?}");
    }
    Ok(())
}
