//! Curtain extraction: collects full-depth traces at requested `(x, y)`
//! positions, one fragment's worth at a time, into the packed
//! `[major, minor]` chunk form the decoder scatters back out.

use oneseismic_core::{Dim, Error, Gvt, Result, CS, FID, FS};
use oneseismic_messages::{wire::CurtainBundle, CurtainTask};

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
pub struct CurtainProcess {
    task: Option<CurtainTask>,
    attribute: String,
    prefix: String,
    ext: String,
    next_trace: u64,
    major: Vec<u64>,
    minor: Vec<u64>,
    values: Vec<f32>,
}

impl CurtainProcess {
    pub fn init(&mut self, bytes: &[u8], attribute: &str, prefix: &str, ext: &str) -> Result<()> {
        let task = CurtainTask::from_json(bytes)?;
        self.task = Some(task);
        self.attribute = attribute.to_string();
        self.prefix = prefix.to_string();
        self.ext = ext.to_string();
        self.next_trace = 0;
        self.major.clear();
        self.minor.clear();
        self.values.clear();
        Ok(())
    }

    pub fn fragments(&self) -> String {
        let Some(task) = &self.task else { return String::new() };
        let [fx, fy, fz] = task.common.shape;
        task.singles
            .iter()
            .map(|s| format!("{}/{fx}-{fy}-{fz}/{}-{}-{}.{}", self.prefix, s.id[0], s.id[1], s.id[2], self.ext))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn add(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let task = self.task.as_ref().ok_or_else(|| Error::logic("add called before init"))?;
        let single = task.singles.get(index).ok_or_else(|| {
            Error::OutOfRange(format!("fragment index {index} out of range ({} singles)", task.singles.len()))
        })?;

        let frag_shape = to_usize3(task.common.shape);
        let [fx, fy, fz] = frag_shape;
        let gvt3 = Gvt::<3>::new(CS::new(to_usize3(task.cube_shape)), FS::new(frag_shape))?;
        let id3 = to_usize3(single.id);
        let depth_valid = fz - gvt3.padding(FID::new(id3), Dim::<3>::new(2)?);

        let expected = fx * fy * fz;
        let floats = bytes_to_floats(bytes, expected)?;

        let zfst_global = id3[2] * fz;
        let zlst_global = zfst_global + depth_valid;
        let t_start = self.next_trace;
        let n = single.coordinates.len();

        for &[x, y] in &single.coordinates {
            let lx = (x as usize) % fx;
            let ly = (y as usize) % fy;
            let base = (lx * fy + ly) * fz;
            self.values.extend_from_slice(&floats[base..base + depth_valid]);
        }
        self.major.push(t_start);
        self.major.push(t_start + n as u64);
        self.minor.push(zfst_global as u64);
        self.minor.push(zlst_global as u64);
        self.next_trace += n as u64;
        Ok(())
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        oneseismic_messages::wire::write_curtain_bundle(
            &mut buf,
            &CurtainBundle {
                attribute: self.attribute.clone(),
                size: self.next_trace,
                major: self.major.clone(),
                minor: self.minor.clone(),
                values: self.values.clone(),
            },
        )?;
        Ok(buf)
    }
}
