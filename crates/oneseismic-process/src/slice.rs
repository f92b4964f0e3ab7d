//! Slice extraction: per-fragment plane copy plus the strided parameters
//! the decoder later needs to scatter that plane into a 2D result.

use oneseismic_core::{Dim, Error, Gvt, Result, CS, FS};
use oneseismic_messages::{wire::Tile, SliceTask};

fn to_usize3(shape: [u32; 3]) -> [usize; 3] {
    [shape[0] as usize, shape[1] as usize, shape[2] as usize]
}

fn bytes_to_floats(bytes: &[u8], expected_len: usize) -> Result<Vec<f32>> {
    if bytes.len() != expected_len * 4 {
        return Err(Error::BadMessage(format!(
            "fragment payload is {} bytes, expected {} ({} f32 samples)",
            bytes.len(),
            expected_len * 4,
            expected_len
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[derive(Debug, Default)]
pub struct SliceProcess {
    task: Option<SliceTask>,
    gvt2d: Option<Gvt<2>>,
    dim: u32,
    attribute: String,
    prefix: String,
    ext: String,
    tiles: Vec<Tile>,
}

impl SliceProcess {
    pub fn init(&mut self, bytes: &[u8], attribute: &str, prefix: &str, ext: &str) -> Result<()> {
        let task = SliceTask::from_json(bytes)?;
        let gvt3 = Gvt::<3>::new(
            CS::new(to_usize3(task.cube_shape)),
            FS::new(to_usize3(task.common.shape)),
        )?;
        let dim = Dim::<3>::new(task.dim as usize)?;
        let gvt2d = gvt3.squeeze(dim);

        self.dim = task.dim;
        self.task = Some(task);
        self.gvt2d = Some(gvt2d);
        self.attribute = attribute.to_string();
        self.prefix = prefix.to_string();
        self.ext = ext.to_string();
        self.tiles.clear();
        Ok(())
    }

    pub fn fragments(&self) -> String {
        let Some(task) = &self.task else { return String::new() };
        let [fx, fy, fz] = task.common.shape;
        task.ids
            .iter()
            .map(|id| format!("{}/{fx}-{fy}-{fz}/{}-{}-{}.{}", self.prefix, id[0], id[1], id[2], self.ext))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn add(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let task = self.task.as_ref().ok_or_else(|| Error::logic("add called before init"))?;
        let gvt2d = self.gvt2d.as_ref().ok_or_else(|| Error::logic("add called before init"))?;
        let id = *task.ids.get(index).ok_or_else(|| {
            Error::OutOfRange(format!("fragment index {index} out of range ({} ids)", task.ids.len()))
        })?;

        let frag_shape = to_usize3(task.common.shape);
        let dim = Dim::<3>::new(self.dim as usize)?;
        let gvt3 = Gvt::<3>::new(CS::new(to_usize3(task.cube_shape)), FS::new(frag_shape))?;
        let layout = gvt3.fragment_shape().slice_stride(dim);

        let expected = frag_shape[0] * frag_shape[1] * frag_shape[2];
        let floats = bytes_to_floats(bytes, expected)?;

        let mut values = Vec::with_capacity(layout.iterations * layout.chunk_size);
        let src_base = layout.initial_skip * task.local_idx as usize;
        for i in 0..layout.iterations {
            let off = src_base + i * layout.superstride;
            values.extend_from_slice(&floats[off..off + layout.chunk_size]);
        }

        let squeezed_id = oneseismic_core::FID::new(to_usize3(id)).squeeze(dim);
        let inj = gvt2d.injection_stride(squeezed_id);
        self.tiles.push(Tile {
            iterations: inj.iterations as u64,
            chunk_size: inj.chunk_size as u64,
            initial_skip: inj.initial_skip as u64,
            superstride: inj.superstride as u64,
            substride: inj.substride as u64,
            values,
        });
        Ok(())
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        oneseismic_messages::wire::write_slice_bundle(
            &mut buf,
            &oneseismic_messages::wire::SliceBundle {
                attribute: self.attribute.clone(),
                tiles: self.tiles.clone(),
            },
        )?;
        Ok(buf)
    }
}
