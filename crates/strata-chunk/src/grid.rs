use strata_geom::{IVec3, Region};

use crate::Voxel;

/// Dense voxel copy of an arbitrary region, laid out like `ChunkBuf`
/// (x fastest, then z, then y).
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    region: Region,
    dims: IVec3,
    voxels: Vec<Voxel>,
}

impl VoxelGrid {
    pub fn new(region: Region) -> Self {
        let dims = region.dimensions();
        Self {
            region,
            dims,
            voxels: vec![Voxel::AIR; region.voxel_count() as usize],
        }
    }

    #[inline]
    pub fn region(&self) -> Region {
        self.region
    }

    #[inline]
    pub fn dims(&self) -> IVec3 {
        self.dims
    }

    #[inline]
    fn idx(&self, p: IVec3) -> usize {
        let l = p - self.region.lower();
        ((l.y * self.dims.z + l.z) * self.dims.x + l.x) as usize
    }

    /// Air outside the grid's region.
    #[inline]
    pub fn get(&self, p: IVec3) -> Voxel {
        if !self.region.contains_point(p) {
            return Voxel::AIR;
        }
        self.voxels[self.idx(p)]
    }

    #[inline]
    pub fn set(&mut self, p: IVec3, v: Voxel) -> bool {
        if !self.region.contains_point(p) {
            return false;
        }
        let i = self.idx(p);
        self.voxels[i] = v;
        true
    }

    /// Mutable x-run `[x0, x0 + len)` at row `(y, z)`. Caller keeps it inside
    /// the region.
    #[inline]
    pub fn row_mut(&mut self, x0: i32, y: i32, z: i32, len: usize) -> &mut [Voxel] {
        let i = self.idx(IVec3::new(x0, y, z));
        &mut self.voxels[i..i + len]
    }

    pub fn has_non_air(&self) -> bool {
        self.voxels.iter().any(|v| !v.is_air())
    }
}
