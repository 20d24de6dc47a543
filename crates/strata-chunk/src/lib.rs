//! Voxel values, chunk coordinates and dense voxel buffers.
#![forbid(unsafe_code)]

mod coord;
mod grid;
mod voxel;

pub use coord::{ChunkCoord, chunks_overlapping};
pub use grid::VoxelGrid;
pub use voxel::{Voxel, VoxelType};

/// Dense cube of voxels backing one resident chunk.
#[derive(Clone, Debug)]
pub struct ChunkBuf {
    pub coord: ChunkCoord,
    pub side: usize,
    pub voxels: Vec<Voxel>,
}

impl ChunkBuf {
    /// All-air buffer for `coord`.
    pub fn empty(coord: ChunkCoord, side: usize) -> Self {
        Self {
            coord,
            side,
            voxels: vec![Voxel::AIR; side * side * side],
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.side + z) * self.side + x
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> Voxel {
        self.voxels[self.idx(x, y, z)]
    }

    #[inline]
    pub fn set_local(&mut self, x: usize, y: usize, z: usize, v: Voxel) {
        let i = self.idx(x, y, z);
        self.voxels[i] = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_geom::IVec3;

    #[test]
    fn set_local_lands_at_the_floor_divided_position() {
        let coord = ChunkCoord::new(-1, 0, 2);
        let mut buf = ChunkBuf::empty(coord, 8);
        let p = IVec3::new(-1, 3, 16);
        let (lx, ly, lz) = coord.local(p, 8);
        assert_eq!((lx, ly, lz), (7, 3, 0));
        buf.set_local(lx, ly, lz, Voxel::new(VoxelType::Rock));
        assert_eq!(buf.get_local(7, 3, 0), Voxel::new(VoxelType::Rock));
        assert_eq!(buf.voxels.iter().filter(|v| !v.is_air()).count(), 1);
        assert_eq!(buf.idx(7, 3, 0), (3 * 8) * 8 + 7);
    }
}
