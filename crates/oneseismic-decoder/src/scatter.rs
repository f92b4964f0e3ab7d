//! Scatter decoded tile/curtain payloads into caller-registered output
//! buffers, per the strided-copy recipes §4.5 prescribes.

use oneseismic_core::{Error, Result};
use oneseismic_messages::Tile;

fn as_usize(field: &str, v: u64) -> Result<usize> {
    usize::try_from(v).map_err(|_| {
        Error::BadMessage(format!("tile field `{field}` ({v}) does not fit in a usize"))
    })
}

fn bounds_check(what: &str, end: usize, len: usize) -> Result<()> {
    if end > len {
        return Err(Error::BadMessage(format!(
            "{what} write would end at offset {end}, but the registered buffer has only {len} elements"
        )));
    }
    Ok(())
}

/// For each tile, copy `iterations` chunks of `chunk_size` floats from the
/// tile's own packed `values` (strided by `substride`) into `dst` (strided
/// by `superstride`, starting at `initial_skip`):
///
/// ```text
/// for i in 0..iterations:
///   dst[initial_skip + i*superstride .. +chunk_size] <- v[i*substride .. +chunk_size]
/// ```
///
/// `values` may hold more elements than `iterations*chunk_size` — a
/// fragment's own plane is always stored at its full (un-padded) extent,
/// and `substride` (not `chunk_size`) is what skips the per-row padding
/// overhang that `chunk_size` trims from what actually gets written to
/// `dst`. See `DESIGN.md` for why this departs from a tightly-packed
/// `values` buffer.
pub(crate) fn scatter_slice(dst: &mut [f32], tiles: &[Tile]) -> Result<()> {
    for tile in tiles {
        let iterations = as_usize("iterations", tile.iterations)?;
        let chunk_size = as_usize("chunk_size", tile.chunk_size)?;
        let initial_skip = as_usize("initial_skip", tile.initial_skip)?;
        let superstride = as_usize("superstride", tile.superstride)?;
        let substride = as_usize("substride", tile.substride)?;

        for i in 0..iterations {
            let src_off = i * substride;
            bounds_check("tile src", src_off + chunk_size, tile.values.len())?;
            let dst_off = initial_skip + i * superstride;
            bounds_check("tile dst", dst_off + chunk_size, dst.len())?;
            dst[dst_off..dst_off + chunk_size]
                .copy_from_slice(&tile.values[src_off..src_off + chunk_size]);
        }
    }
    Ok(())
}

/// For each `(major, minor)` chunk, copy `(zlst - zfst)` contiguous values
/// per trace into `dst[trace * zlen + zfst ..]`, consuming `values`
/// sequentially (trace-major, depth-minor, matching the order the
/// extractor appended them in).
pub(crate) fn scatter_curtain(
    dst: &mut [f32],
    zlen: usize,
    major: &[u64],
    minor: &[u64],
    values: &[f32],
) -> Result<()> {
    if major.len() != minor.len() || major.len() % 2 != 0 {
        return Err(Error::BadMessage(format!(
            "curtain bundle major/minor arrays must be equal-length and even, got {} and {}",
            major.len(),
            minor.len()
        )));
    }
    let mut cursor = 0usize;
    for chunk in major.chunks_exact(2).zip(minor.chunks_exact(2)) {
        let ([ifst, ilst], [zfst, zlst]) = (
            [as_usize("major.ifst", chunk.0[0])?, as_usize("major.ilst", chunk.0[1])?],
            [as_usize("minor.zfst", chunk.1[0])?, as_usize("minor.zlst", chunk.1[1])?],
        );
        if ilst < ifst || zlst < zfst {
            return Err(Error::BadMessage(
                "curtain chunk has a decreasing (ifst, ilst) or (zfst, zlst) range".to_string(),
            ));
        }
        let strip_len = zlst - zfst;
        for trace in ifst..ilst {
            bounds_check("curtain src", cursor + strip_len, values.len())?;
            let dst_off = trace * zlen + zfst;
            bounds_check("curtain dst", dst_off + strip_len, dst.len())?;
            dst[dst_off..dst_off + strip_len]
                .copy_from_slice(&values[cursor..cursor + strip_len]);
            cursor += strip_len;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_slice_respects_substride_padding_gap() {
        // 2 rows of 3 valid elements each, but the source has a padded 4th
        // column per row (substride=4, chunk_size=3).
        let values = vec![1.0, 2.0, 3.0, 99.0, 4.0, 5.0, 6.0, 99.0];
        let tile = Tile {
            iterations: 2,
            chunk_size: 3,
            initial_skip: 0,
            superstride: 3,
            substride: 4,
            values,
        };
        let mut dst = vec![0.0; 6];
        scatter_slice(&mut dst, std::slice::from_ref(&tile)).unwrap();
        assert_eq!(dst, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn scatter_slice_rejects_dst_overrun() {
        let tile = Tile {
            iterations: 1,
            chunk_size: 4,
            initial_skip: 0,
            superstride: 4,
            substride: 4,
            values: vec![1.0, 2.0, 3.0, 4.0],
        };
        let mut dst = vec![0.0; 2];
        let err = scatter_slice(&mut dst, std::slice::from_ref(&tile)).unwrap_err();
        assert!(matches!(err, Error::BadMessage(_)));
    }

    #[test]
    fn scatter_curtain_writes_per_trace_strips() {
        let major = vec![0, 2];
        let minor = vec![1, 4];
        let values = vec![10.0, 20.0, 30.0, 11.0, 21.0, 31.0];
        let mut dst = vec![0.0; 2 * 5];
        scatter_curtain(&mut dst, 5, &major, &minor, &values).unwrap();
        assert_eq!(&dst[0..5], &[0.0, 10.0, 20.0, 30.0, 0.0]);
        assert_eq!(&dst[5..10], &[0.0, 11.0, 21.0, 31.0, 0.0]);
    }
}
