//! N-dimensional geometry: strongly-typed tuples and the global volume
//! translator (`GVT`, here named [`Gvt`]).
//!
//! Points and dimensions
//! =====================
//! All of [`CP`], [`FP`], [`FID`], [`CS`], and [`FS`] share the same
//! representation (a fixed-length array of `usize`), but are distinct types
//! so that mixing them up (e.g. passing a fragment point where a cube point
//! is expected) is a compile error rather than a silently-wrong offset. The
//! acronyms, kept from the domain vocabulary this crate implements:
//!
//!  - `C` refers to a full survey volume (cube)
//!  - `F` refers to the fragments a cube is partitioned into
//!  - `P` is a point/coordinate
//!  - `S` is a shape (of a cube or fragment), and an upper bound on a `P`
//!
//! `N` (a const generic) is the number of dimensions, capped at
//! [`crate::limits::MAX_DIMS`].

use crate::error::{Error, Result};
use crate::limits::MAX_DIMS;

/// An axis index in `{0 .. N-1}`, validated at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dim<const N: usize>(usize);

impl<const N: usize> Dim<N> {
    /// Validate and construct a dimension index.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `d >= N`.
    pub fn new(d: usize) -> Result<Self> {
        if d >= N {
            return Err(Error::InvalidArgument(format!(
                "invalid dimension: expected d (= {d}) < N (= {N})"
            )));
        }
        Ok(Self(d))
    }

    /// The last axis, `N - 1`. Used throughout for "innermost/contiguous axis"
    /// math (the fragment storage order is row-major with the last axis
    /// contiguous).
    #[must_use]
    pub const fn last() -> Self {
        Self(N - 1)
    }

    /// The raw axis index.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl<const N: usize> From<Dim<N>> for usize {
    #[inline]
    fn from(d: Dim<N>) -> Self {
        d.0
    }
}

macro_rules! point_tuple {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name<const N: usize>(pub [usize; N]);

        impl<const N: usize> $name<N> {
            /// Construct directly from coordinates. No bounds validation;
            /// callers that need the invariant checked should go through
            /// [`Gvt`] construction or the relevant `GVT` query instead.
            #[inline]
            #[must_use]
            pub const fn new(values: [usize; N]) -> Self {
                Self(values)
            }

            /// Borrow the coordinates as a slice.
            #[inline]
            #[must_use]
            pub fn as_slice(&self) -> &[usize] {
                &self.0
            }

            /// Number of dimensions.
            #[inline]
            #[must_use]
            pub const fn ndims(&self) -> usize {
                N
            }
        }

        impl<const N: usize> std::ops::Index<usize> for $name<N> {
            type Output = usize;
            #[inline]
            fn index(&self, i: usize) -> &usize {
                &self.0[i]
            }
        }

        impl<const N: usize> std::fmt::Debug for $name<N> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", stringify!($name))?;
                std::fmt::Display::fmt(self, f)
            }
        }

        impl<const N: usize> std::fmt::Display for $name<N> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "(")?;
                for (i, v) in self.0.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    };
}

point_tuple!(CP, "Point in cube coordinates. Holds that `CP[i] < CS[i]`.");
point_tuple!(FP, "Point in fragment coordinates. Holds that `FP[i] < FS[i]`.");
point_tuple!(
    FID,
    "Identifier of a fragment: its coordinate in the coarsened fragment grid."
);
point_tuple!(CS, "Cube shape: extents of the full padded volume, per axis.");
point_tuple!(FS, "Fragment shape: extents of a single fragment, per axis.");

/// Single-loop strided-copy descriptor, all counts in element units.
///
/// ```text
/// for i in 0..iterations:
///     read/write chunk_size contiguous elements
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SliceLayout {
    /// Number of read/write ops to perform.
    pub iterations: usize,
    /// Size of the chunk (in elements) moved per op.
    pub chunk_size: usize,
    /// Elements to skip before the first op (scaled by a caller-supplied
    /// index for per-use cases such as `slice_stride`).
    pub initial_skip: usize,
    /// Stride between iterations on the "super" (larger-structure) side.
    pub superstride: usize,
    /// Stride between iterations on the "sub" (isolated-fragment) side.
    pub substride: usize,
}

impl<const N: usize> CS<N> {
    /// Row-major element offset of cube point `p` (last axis varies fastest).
    #[must_use]
    pub fn to_offset(&self, p: CP<N>) -> usize {
        let mut offset = 0usize;
        for i in 0..N {
            let mut stride = 1usize;
            for j in (i + 1)..N {
                stride *= self.0[j];
            }
            offset += p[i] * stride;
        }
        offset
    }
}

impl<const N: usize> FS<N> {
    /// Row-major element offset of fragment-local point `p`.
    #[must_use]
    pub fn to_offset(&self, p: FP<N>) -> usize {
        let mut offset = 0usize;
        for i in 0..N {
            let mut stride = 1usize;
            for j in (i + 1)..N {
                stride *= self.0[j];
            }
            offset += p[i] * stride;
        }
        offset
    }

    /// Find the fragment-local index along `d` that the global sample index
    /// `global_idx` maps to.
    ///
    /// Example: a 4x6x8 cube made of 2x3x4 fragments, global index 3 along
    /// `dim=0` maps to local index `3 mod FS[0] = 1`.
    #[must_use]
    pub fn local_index(&self, d: Dim<N>, global_idx: usize) -> usize {
        global_idx % self.0[d.get()]
    }

    /// The `slice_stride` layout: given a downloaded fragment and a
    /// fragment-local index `idx` along `d`, the parameters to copy the
    /// planar sub-array out of it.
    #[must_use]
    pub fn slice_stride(&self, d: Dim<N>) -> SliceLayout {
        let d = d.get();
        let iterations: usize = self.0[..d].iter().product();
        let chunk_size: usize = self.0[(d + 1)..].iter().product();
        let superstride: usize = self.0[d..].iter().product();
        SliceLayout {
            iterations,
            chunk_size,
            initial_skip: chunk_size,
            superstride,
            substride: chunk_size,
        }
    }
}

/// Global volume translator: an immutable `(CS, FS)` pair with derived
/// queries. Cheap to copy; treat as a value, not a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gvt<const N: usize> {
    cube: CS<N>,
    frag: FS<N>,
}

impl<const N: usize> Gvt<N> {
    /// Construct a `GVT` from a cube shape and a fragment shape.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if `N > MAX_DIMS`, or any shape
    ///   component is zero, or a fragment component exceeds the matching
    ///   cube component.
    pub fn new(cube: CS<N>, frag: FS<N>) -> Result<Self> {
        if N == 0 || N > MAX_DIMS {
            return Err(Error::InvalidArgument(format!(
                "unsupported dimensionality: N (= {N}) must be in 1..={MAX_DIMS}"
            )));
        }
        for i in 0..N {
            if cube.0[i] == 0 || frag.0[i] == 0 {
                return Err(Error::InvalidArgument(format!(
                    "shape components must be > 0 (axis {i}: cube={}, frag={})",
                    cube.0[i], frag.0[i]
                )));
            }
            if frag.0[i] > cube.0[i] {
                return Err(Error::InvalidArgument(format!(
                    "fragment shape exceeds cube shape on axis {i}: {} > {}",
                    frag.0[i], cube.0[i]
                )));
            }
        }
        tracing::trace!(cube = ?cube.0, frag = ?frag.0, "built GVT");
        Ok(Self { cube, frag })
    }

    /// Build a [`Dim`] for this `GVT`'s dimensionality.
    ///
    /// # Errors
    /// See [`Dim::new`].
    pub fn mkdim(d: usize) -> Result<Dim<N>> {
        Dim::new(d)
    }

    /// The un-padded cube shape.
    #[inline]
    #[must_use]
    pub const fn cube_shape(&self) -> CS<N> {
        self.cube
    }

    /// The fragment shape.
    #[inline]
    #[must_use]
    pub const fn fragment_shape(&self) -> FS<N> {
        self.frag
    }

    /// Number of fragments along axis `d`: `ceil(CS[d] / FS[d])`.
    #[must_use]
    pub fn fragment_count(&self, d: Dim<N>) -> usize {
        let (cs, fs) = (self.cube[d.get()], self.frag[d.get()]);
        cs.div_ceil(fs)
    }

    /// Number of un-padded samples along axis `d`.
    #[inline]
    #[must_use]
    pub fn nsamples(&self, d: Dim<N>) -> usize {
        self.cube[d.get()]
    }

    /// Number of padded samples along axis `d` (`fragment_count * FS[d]`).
    #[must_use]
    pub fn nsamples_padded(&self, d: Dim<N>) -> usize {
        self.fragment_count(d) * self.frag[d.get()]
    }

    /// Map a global point to its fragment-local coordinate.
    ///
    /// Precondition: `p[i] < CS[i]` for all `i` (unchecked; violating it
    /// yields a nonsensical but not unsafe result).
    #[must_use]
    pub fn to_local(&self, p: CP<N>) -> FP<N> {
        let mut out = [0usize; N];
        for i in 0..N {
            out[i] = p[i] % self.frag[i];
        }
        FP::new(out)
    }

    /// Map a global point to the id of the fragment that contains it.
    #[must_use]
    pub fn frag_id(&self, p: CP<N>) -> FID<N> {
        let mut out = [0usize; N];
        for i in 0..N {
            out[i] = p[i] / self.frag[i];
        }
        FID::new(out)
    }

    /// Inverse of `(frag_id, to_local)`: recover the global point.
    #[must_use]
    pub fn to_global(&self, id: FID<N>, local: FP<N>) -> CP<N> {
        let mut out = [0usize; N];
        for i in 0..N {
            out[i] = id[i] * self.frag[i] + local[i];
        }
        CP::new(out)
    }

    /// Number of samples padded in direction `d` for fragment `id`:
    /// `0` unless `id` is the last fragment along `d`, in which case it's
    /// the (possibly zero) overhang `FS[d] - (CS[d] mod FS[d]) mod FS[d]`.
    ///
    /// A cube that is an exact multiple of the fragment shape has a
    /// `CS[d] mod FS[d] == 0` remainder, which must map to *no* padding, not
    /// full-fragment padding — hence the outer `mod FS[d]`.
    #[must_use]
    pub fn padding(&self, id: FID<N>, d: Dim<N>) -> usize {
        let d = d.get();
        let last_along_d = self.fragment_count(Dim::new(d).expect("d validated by caller")) - 1;
        if id[d] != last_along_d {
            return 0;
        }
        let fs = self.frag[d];
        (fs - self.cube[d] % fs) % fs
    }

    /// The `FID`s whose fragments contain cube index `n` along axis `dim`.
    ///
    /// Order: lexicographic by the non-pinned axes, lowest-index axis
    /// varying slowest (axis `dim` itself is fixed at `n / FS[dim]`).
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `n >= CS[dim]`.
    pub fn slice(&self, dim: Dim<N>, n: usize) -> Result<Vec<FID<N>>> {
        let d = dim.get();
        if n >= self.cube[d] {
            return Err(Error::OutOfRange(format!(
                "index {n} is out of range for axis {d} (CS[{d}] = {})",
                self.cube[d]
            )));
        }
        let pin = n / self.frag[d];

        let counts: Vec<usize> = (0..N)
            .map(|i| if i == d { 1 } else { self.fragment_count(Dim::new(i).expect("i < N by construction")) })
            .collect();

        let mut out = Vec::new();
        let mut idx = [0usize; N];
        idx[d] = pin;
        cartesian_fill(&counts, d, &mut idx, 0, &mut out);
        tracing::trace!(dim = d, n, pin, count = out.len(), "enumerated slice fragments");
        Ok(out)
    }

    /// Strided-copy parameters for injecting a single fragment's
    /// last-axis-contiguous block into its place in a 1-off squeezed cube
    /// buffer.
    #[must_use]
    pub fn injection_stride(&self, id: FID<N>) -> SliceLayout {
        let last = Dim::<N>::last();
        let origin = FP::new([0usize; N]);
        let base = self.to_global(id, origin);
        let initial_skip = self.cube.to_offset(base);
        let chunk_size = self.frag[last.get()] - self.padding(id, last);
        let superstride = self.cube[last.get()];
        let substride = self.frag[last.get()];
        let mut iterations = 1usize;
        for d in 0..N {
            if d == last.get() {
                continue;
            }
            let dim = Dim::new(d).expect("d < N by construction");
            iterations *= self.frag[d] - self.padding(id, dim);
        }
        SliceLayout {
            iterations,
            chunk_size,
            initial_skip,
            superstride,
            substride,
        }
    }

    /// Total number of `(x, y, z, ...)` points in the (un-padded) cube.
    #[must_use]
    pub fn global_size(&self) -> usize {
        (0..N).map(|i| self.cube[i]).product()
    }
}

/// Fill `out` with every point of the Cartesian product described by
/// `counts`, skipping axis `pinned` (whose coordinate is already set in
/// `idx`), lowest axis index varying slowest.
fn cartesian_fill<const N: usize>(
    counts: &[usize],
    pinned: usize,
    idx: &mut [usize; N],
    axis: usize,
    out: &mut Vec<FID<N>>,
) {
    if axis == N {
        out.push(FID::new(*idx));
        return;
    }
    if axis == pinned {
        cartesian_fill(counts, pinned, idx, axis + 1, out);
        return;
    }
    for v in 0..counts[axis] {
        idx[axis] = v;
        cartesian_fill(counts, pinned, idx, axis + 1, out);
    }
}

/// Drop axis `d` from a fixed-size array, shifting trailing axes left.
///
/// `M` must equal `N - 1`; call sites are generated by [`impl_squeeze`] for
/// the concrete `(N, M)` pairs this workspace needs (`N` up to
/// [`crate::limits::MAX_DIMS`]), mirroring the source's hand-specialization
/// for `N in 1..=5` rather than relying on unstable const-generic arithmetic.
fn squeeze_array<const N: usize, const M: usize>(src: &[usize; N], d: usize) -> [usize; M] {
    debug_assert_eq!(M, N - 1, "squeeze_array called with mismatched N/M");
    let mut out = [0usize; M];
    let mut j = 0;
    for (i, &v) in src.iter().enumerate() {
        if i == d {
            continue;
        }
        out[j] = v;
        j += 1;
    }
    out
}

macro_rules! impl_squeeze {
    ($from:literal, $to:literal) => {
        impl CS<$from> {
            /// Drop axis `d`, shifting trailing axes left.
            #[must_use]
            pub fn squeeze(&self, d: Dim<$from>) -> CS<$to> {
                CS::new(squeeze_array::<$from, $to>(&self.0, d.get()))
            }
        }
        impl FS<$from> {
            /// Drop axis `d`, shifting trailing axes left.
            #[must_use]
            pub fn squeeze(&self, d: Dim<$from>) -> FS<$to> {
                FS::new(squeeze_array::<$from, $to>(&self.0, d.get()))
            }
        }
        impl FID<$from> {
            /// Drop axis `d`, shifting trailing axes left.
            #[must_use]
            pub fn squeeze(&self, d: Dim<$from>) -> FID<$to> {
                FID::new(squeeze_array::<$from, $to>(&self.0, d.get()))
            }
        }
        impl Gvt<$from> {
            /// Squeeze dimension `d` of this `GVT`. Removes axis `d` from
            /// both shapes and shifts trailing axes left.
            #[must_use]
            pub fn squeeze(&self, d: Dim<$from>) -> Gvt<$to> {
                Gvt {
                    cube: self.cube.squeeze(d),
                    frag: self.frag.squeeze(d),
                }
            }
        }
    };
}

impl_squeeze!(5, 4);
impl_squeeze!(4, 3);
impl_squeeze!(3, 2);
impl_squeeze!(2, 1);
