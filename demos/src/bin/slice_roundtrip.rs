//! Canned end-to-end slice scenario: plan a query against a synthetic
//! manifest, extract each planned task against synthetic fragment data, and
//! decode the resulting response stream back into a dense 2D array.
//!
//! Run with `cargo run --bin slice_roundtrip` (no arguments).

use anyhow::{ensure, Context, Result};
use oneseismic_decoder::{DecodeStatus, Decoder};
use oneseismic_messages::{ProcessHeader, QueryCommon, SliceQuery, SliceTask};
use oneseismic_process::make_process;
use rmp::encode;
use serde_json::json;

const CUBE: [u32; 3] = [6, 6, 6];
const FRAG: [u32; 3] = [3, 3, 3];

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

    let query = SliceQuery {
        common: QueryCommon {
            pid: "demo-pid".into(),
            guid: "demo-guid".into(),
            token: "unused".into(),
            storage_endpoint: "memory://demo".into(),
            shape: FRAG,
            function: "slice".into(),
        },
        manifest,
        dim: 0,
        lineno: 3,
    };
    let query_bytes = query.to_json().context("encode slice query")?;

    let blobs = oneseismic_planner::plan_slice(&query_bytes, 100).context("plan slice")?;
    let (task_blobs, header_blob) = blobs.split_at(blobs.len() - 1);
    let header = ProcessHeader::from_msgpack(&header_blob[0]).context("decode process header")?;
    println!("planned {} task(s), result shape {:?}", task_blobs.len(), header.shape);

    let mut bundle_bytes = Vec::new();
    for blob in task_blobs {
        let task = SliceTask::from_json(blob).context("decode slice task")?;
        let mut process = make_process("slice").context("unrecognized process kind")?;
        process.init(blob, "amplitude", "amplitude", "f32")?;
        for (i, id) in task.ids.iter().enumerate() {
            process.add(i, &synth_fragment(*id))?;
        }
        bundle_bytes.push(process.pack()?);
    }

    // Assemble the full `[header, [bundle, ...]]` envelope by hand, the way
    // the surrounding runtime (out of scope here) would after fetching
    // fragments and driving each task's `Process`.
    let mut envelope = Vec::new();
    encode::write_array_len(&mut envelope, 2).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    envelope.extend_from_slice(&header_blob[0]);
    encode::write_array_len(&mut envelope, u32::try_from(bundle_bytes.len())?)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    for b in &bundle_bytes {
        envelope.extend_from_slice(b);
    }

    let total: usize = header.shape.iter().map(|&d| d as usize).product();
    let mut out = vec![f32::NAN; total];
    let mut decoder: Decoder<'_> = Decoder::new();
    decoder.register_writer("amplitude", &mut out);

    // Feed the envelope in small chunks to exercise the pause/resume path
    // rather than handing it over all at once.
    let mut status = DecodeStatus::Paused;
    for chunk in envelope.chunks(17) {
        status = decoder.buffer_and_process(chunk)?;
    }
    ensure!(status == DecodeStatus::Done, "decoder did not reach Done");
    ensure!(!out.iter().any(|v| v.is_nan()), "decoder left unwritten samples behind");

    let ny = header.shape[1] as usize;
    println!("decoded inline=3 slice ({}x{}):", header.shape[0], header.shape[1]);
    for row in out.chunks(ny) {
        println!("{row:?}");
    }
    Ok(())
}
