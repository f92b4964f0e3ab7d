#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Turns a query plus its manifest into a set of fetch-task blobs and a
//! trailing process header.
//!
//! The planner is a pure function of its inputs: it holds no state across
//! calls and performs no I/O of its own (the caller already has the query
//! bytes and the manifest in hand; fetching fragment blobs afterwards is the
//! surrounding runtime's job, not this crate's).

use std::collections::HashMap;

use oneseismic_core::{Dim, Error, Gvt, Result, CS, FID, FS};
use oneseismic_messages::{
    CurtainQuery, CurtainSingle, CurtainTask, Manifest, ProcessHeader, SliceQuery, SliceTask,
};

fn to_usize3(shape: [u32; 3]) -> [usize; 3] {
    [shape[0] as usize, shape[1] as usize, shape[2] as usize]
}

fn to_u32_3(fid: FID<3>) -> [u32; 3] {
    [fid[0] as u32, fid[1] as u32, fid[2] as u32]
}

fn squeeze_vec<T: Clone>(v: &[T], d: usize) -> Vec<T> {
    v.iter()
        .enumerate()
        .filter(|(i, _)| *i != d)
        .map(|(_, x)| x.clone())
        .collect()
}

fn check_task_size(task_size: usize) -> Result<()> {
    if task_size < 1 {
        return Err(Error::InvalidArgument(format!(
            "task_size must be >= 1, got {task_size}"
        )));
    }
    Ok(())
}

fn chunks<T: Clone>(items: &[T], task_size: usize) -> Vec<Vec<T>> {
    items.chunks(task_size).map(<[T]>::to_vec).collect()
}

/// Plan a slice query: decode it, build the `GVT`, enumerate the touched
/// fragments, and emit `(tasks, header)` already packed to bytes — tasks as
/// JSON, the header as MessagePack, ready to be concatenated and shipped in
/// that order.
///
/// # Errors
/// - [`Error::InvalidArgument`] if `task_size < 1`.
/// - [`Error::BadMessage`] / [`Error::BadDocument`] for malformed query or
///   manifest bytes.
/// - [`Error::NotFound`] if the query's `lineno` is absent from the
///   manifest's line-number index for `dim`.
/// - [`Error::OutOfRange`] if `dim` is not a valid axis, or the resolved
///   pin falls outside the cube.
#[tracing::instrument(skip(query_bytes), fields(task_size))]
pub fn plan_slice(query_bytes: &[u8], task_size: usize) -> Result<Vec<Vec<u8>>> {
    check_task_size(task_size)?;
    let query = SliceQuery::from_json(query_bytes)?;
    let manifest = Manifest::from_value(query.manifest.clone())?;
    manifest.validate()?;

    let cube_shape = manifest.cube_shape_3d()?;
    let gvt = Gvt::<3>::new(CS::new(to_usize3(cube_shape)), FS::new(to_usize3(query.common.shape)))?;

    let dim = Dim::<3>::new(query.dim as usize)?;
    let pin = manifest.line_index(dim.get(), query.lineno)?;
    let local_idx = gvt.fragment_shape().local_index(dim, pin) as u32;
    let ids = gvt.slice(dim, pin)?;

    tracing::debug!(dim = query.dim, pin, fragment_count = ids.len(), "planned slice");

    let task_chunks = chunks(&ids, task_size);
    let ntasks = task_chunks.len();
    let mut blobs = Vec::with_capacity(ntasks + 1);
    for chunk in &task_chunks {
        let task = SliceTask {
            common: query.common.clone(),
            cube_shape,
            dim: query.dim,
            local_idx,
            ids: chunk.iter().copied().map(to_u32_3).collect(),
        };
        blobs.push(task.to_json()?);
    }

    let squeezed = gvt.squeeze(dim);
    let header = ProcessHeader {
        pid: query.common.pid.clone(),
        function: query.common.function.clone(),
        nbundles: u32::try_from(ntasks).map_err(|_| Error::logic("too many tasks to fit u32"))?,
        ndims: 2,
        shape: squeezed.cube_shape().as_slice().iter().map(|&v| v as u32).collect(),
        index: squeeze_vec(&manifest.dimensions, dim.get()),
        labels: if manifest.line_labels.is_empty() {
            Vec::new()
        } else {
            squeeze_vec(&manifest.line_labels, dim.get())
        },
        attributes: Vec::new(),
    };
    blobs.push(header.to_msgpack()?);
    Ok(blobs)
}

/// Plan a curtain query: decode it, group the requested `(x, y)` trace
/// positions by the fragment id that contains them (one entry per
/// `(x, y, z-fragment)` combination, since a curtain spans the full depth
/// axis), and emit `(tasks, header)` packed the same way as
/// [`plan_slice`].
///
/// # Errors
/// Same failure modes as [`plan_slice`], minus the lineno lookup (curtains
/// have no pinned axis to resolve).
#[tracing::instrument(skip(query_bytes), fields(task_size))]
pub fn plan_curtain(query_bytes: &[u8], task_size: usize) -> Result<Vec<Vec<u8>>> {
    check_task_size(task_size)?;
    let query = CurtainQuery::from_json(query_bytes)?;
    let manifest = Manifest::from_value(query.manifest.clone())?;
    manifest.validate()?;

    let cube_shape = manifest.cube_shape_3d()?;
    let gvt = Gvt::<3>::new(CS::new(to_usize3(cube_shape)), FS::new(to_usize3(query.common.shape)))?;
    let frag = gvt.fragment_shape();
    let depth_fragments = gvt.fragment_count(Dim::<3>::new(2)?);

    let mut order: Vec<FID<3>> = Vec::new();
    let mut by_id: HashMap<FID<3>, usize> = HashMap::new();
    let mut coords: Vec<Vec<[i64; 2]>> = Vec::new();

    for (&x, &y) in query.dim0s.iter().zip(query.dim1s.iter()) {
        if x < 0 || y < 0 || x as usize >= cube_shape[0] as usize || y as usize >= cube_shape[1] as usize {
            return Err(Error::OutOfRange(format!(
                "curtain trace ({x}, {y}) falls outside the cube"
            )));
        }
        let xy_id = [x as usize / frag[0], y as usize / frag[1]];
        for fz in 0..depth_fragments {
            let id = FID::new([xy_id[0], xy_id[1], fz]);
            let idx = *by_id.entry(id).or_insert_with(|| {
                order.push(id);
                coords.push(Vec::new());
                order.len() - 1
            });
            coords[idx].push([x, y]);
        }
    }

    tracing::debug!(ntraces = query.dim0s.len(), nfragments = order.len(), "planned curtain");

    let singles: Vec<CurtainSingle> = order
        .iter()
        .zip(coords)
        .map(|(&id, coordinates)| CurtainSingle { id: to_u32_3(id), coordinates })
        .collect();

    let task_chunks = chunks(&singles, task_size);
    let ntasks = task_chunks.len();
    let mut blobs = Vec::with_capacity(ntasks + 1);
    for chunk in task_chunks {
        let task = CurtainTask {
            common: query.common.clone(),
            cube_shape,
            singles: chunk,
        };
        blobs.push(task.to_json()?);
    }

    let header = ProcessHeader {
        pid: query.common.pid.clone(),
        function: query.common.function.clone(),
        nbundles: u32::try_from(ntasks).map_err(|_| Error::logic("too many tasks to fit u32"))?,
        ndims: 3,
        shape: cube_shape.to_vec(),
        index: manifest.dimensions.clone(),
        labels: manifest.line_labels.clone(),
        attributes: Vec::new(),
    };
    blobs.push(header.to_msgpack()?);
    Ok(blobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oneseismic_messages::QueryCommon;
    use serde_json::json;

    fn common(function: &str) -> QueryCommon {
        QueryCommon {
            pid: "pid-1".into(),
            guid: "guid-1".into(),
            token: "tok".into(),
            storage_endpoint: "https://store.example".into(),
            shape: [3, 9, 5],
            function: function.into(),
        }
    }

    fn manifest_555() -> serde_json::Value {
        json!({
            "dimensions": [[0,1,2,3,4], [0,1,2,3,4], [0,1,2,3,4]],
        })
    }

    #[test]
    fn s1_inline_slice_on_333_fragments_over_555_cube() {
        let query = SliceQuery {
            common: QueryCommon { shape: [3, 3, 3], ..common("slice") },
            manifest: manifest_555(),
            dim: 0,
            lineno: 0,
        };
        let bytes = query.to_json().unwrap();
        let blobs = plan_slice(&bytes, 3).unwrap();
        // 4 ids total, task_size=3 -> two task blobs (3, 1) + one header.
        assert_eq!(blobs.len(), 3);

        let t0 = SliceTask::from_json(&blobs[0]).unwrap();
        assert_eq!(t0.ids.len(), 3);
        assert_eq!(t0.local_idx, 0);
        let t1 = SliceTask::from_json(&blobs[1]).unwrap();
        assert_eq!(t1.ids.len(), 1);

        let mut all_ids = t0.ids.clone();
        all_ids.extend(t1.ids.clone());
        assert_eq!(
            all_ids,
            vec![[0, 0, 0], [0, 0, 1], [0, 1, 0], [0, 1, 1]]
        );

        let header = ProcessHeader::from_msgpack(&blobs[2]).unwrap();
        assert_eq!(header.nbundles, 2);
        assert_eq!(header.ndims, 2);
    }

    #[test]
    fn s2_crossline_slice_cartesian_product() {
        let query = SliceQuery {
            common: QueryCommon {
                shape: [3, 9, 5],
                ..common("slice")
            },
            manifest: json!({
                "dimensions": [
                    (0..9).collect::<Vec<i64>>(),
                    (0..15).collect::<Vec<i64>>(),
                    (0..23).collect::<Vec<i64>>(),
                ],
            }),
            dim: 1,
            lineno: 11,
        };
        let bytes = query.to_json().unwrap();
        let blobs = plan_slice(&bytes, 1000).unwrap();
        assert_eq!(blobs.len(), 2);
        let task = SliceTask::from_json(&blobs[0]).unwrap();
        assert_eq!(task.ids.len(), 15);
        let expected: Vec<[u32; 3]> = (0..3)
            .flat_map(|x| (0..5).map(move |z| [x, 1, z]))
            .collect();
        assert_eq!(task.ids, expected);
    }

    #[test]
    fn s5_unknown_lineno_is_not_found() {
        let query = SliceQuery {
            common: common("slice"),
            manifest: json!({"dimensions": [[1,2,3], [1,2,3], [1,2,3]]}),
            dim: 0,
            lineno: 99,
        };
        let bytes = query.to_json().unwrap();
        let err = plan_slice(&bytes, 10).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn rejects_task_size_zero() {
        let query = SliceQuery {
            common: common("slice"),
            manifest: manifest_555(),
            dim: 0,
            lineno: 0,
        };
        let bytes = query.to_json().unwrap();
        let err = plan_slice(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn s6_partition_law_holds_for_arbitrary_task_size() {
        let query = SliceQuery {
            common: QueryCommon { shape: [3, 3, 3], ..common("slice") },
            manifest: manifest_555(),
            dim: 0,
            lineno: 0,
        };
        let bytes = query.to_json().unwrap();
        for task_size in 1..=6usize {
            let blobs = plan_slice(&bytes, task_size).unwrap();
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

    #[test]
    fn curtain_plan_groups_by_fragment_and_spans_full_depth() {
        let query = CurtainQuery {
            common: QueryCommon { shape: [3, 3, 3], ..common("curtain") },
            manifest: manifest_555(),
            dim0s: vec![0, 1, 4],
            dim1s: vec![0, 1, 4],
        };
        let bytes = query.to_json().unwrap();
        let blobs = plan_curtain(&bytes, 100).unwrap();
        assert_eq!(blobs.len(), 2);
        let task = CurtainTask::from_json(&blobs[0]).unwrap();
        // depth fragments for a 5-sample axis with fragment size 3: ceil(5/3)=2
        // (0,0) and (1,1) share a fragment id, (4,4) is in a different one,
        // each crossed with 2 depth fragments -> 4 distinct fragment ids.
        assert_eq!(task.singles.len(), 4);
        let total_coords: usize = task.singles.iter().map(|s| s.coordinates.len()).sum();
        assert_eq!(total_coords, 6); // 3 traces * 2 depth fragments each
    }

    #[test]
    fn curtain_plan_rejects_out_of_range_trace() {
        let query = CurtainQuery {
            common: QueryCommon { shape: [3, 3, 3], ..common("curtain") },
            manifest: manifest_555(),
            dim0s: vec![99],
            dim1s: vec![0],
        };
        let bytes = query.to_json().unwrap();
        let err = plan_curtain(&bytes, 10).unwrap_err();
        assert!(matches!(err, Error::OutOfRange(_)));
    }
}
