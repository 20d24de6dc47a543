use std::cell::Cell;
use std::sync::Arc;

use strata_chunk::{ChunkCoord, Voxel, VoxelGrid};
use strata_geom::{IVec3, Region};

use crate::cancel::CancelToken;

use super::{Chunk, PagedVolume};

/// Chunks pinned for the lifetime of the guard. Reads go straight to the
/// pinned chunk buffers without touching the resident set.
pub struct PinnedRegion<'v> {
    volume: &'v PagedVolume,
    region: Region,
    chunks: Vec<Arc<Chunk>>,
    /// Index of the chunk the last point read landed in.
    last: Cell<usize>,
}

impl<'v> PinnedRegion<'v> {
    pub(super) fn new(volume: &'v PagedVolume, region: Region) -> Self {
        Self {
            volume,
            region,
            chunks: Vec::new(),
            last: Cell::new(0),
        }
    }

    /// Takes ownership of one pin already counted on `chunk`.
    pub(super) fn push(&mut self, chunk: Arc<Chunk>) {
        self.chunks.push(chunk);
    }

    #[inline]
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        if let Some(c) = self.chunks.get(self.last.get()) {
            if c.coord() == coord {
                return Some(&**c);
            }
        }
        let i = self.chunks.iter().position(|c| c.coord() == coord)?;
        self.last.set(i);
        Some(&self.chunks[i])
    }

    /// Voxel at `p`. Air outside the pinned region or the world bound.
    pub fn voxel(&self, p: IVec3) -> Voxel {
        if !self.region.contains_point(p) {
            return Voxel::AIR;
        }
        let side = self.volume.chunk_side();
        let coord = ChunkCoord::from_world(p, side);
        match self.chunk(coord) {
            Some(chunk) => {
                let (x, y, z) = coord.local(p, side);
                chunk.buf().read().unwrap().get_local(x, y, z)
            }
            None => Voxel::AIR,
        }
    }

    /// Dense copy of the whole pinned region, one chunk lock at a time.
    /// `None` when `cancel` fires between chunks.
    pub fn sample(&self, cancel: &CancelToken) -> Option<VoxelGrid> {
        let mut grid = VoxelGrid::new(self.region);
        let side = self.volume.chunk_side();
        for chunk in &self.chunks {
            if cancel.is_cancelled() {
                return None;
            }
            let Some(overlap) = chunk.coord().region(side).intersection(&self.region) else {
                continue;
            };
            let lo = overlap.lower();
            let hi = overlap.upper();
            let run = overlap.width() as usize;
            let buf = chunk.buf().read().unwrap();
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    let (lx, ly, lz) = chunk.coord().local(IVec3::new(lo.x, y, z), side);
                    let start = buf.idx(lx, ly, lz);
                    grid.row_mut(lo.x, y, z, run)
                        .copy_from_slice(&buf.voxels[start..start + run]);
                }
            }
        }
        Some(grid)
    }
}

impl Drop for PinnedRegion<'_> {
    fn drop(&mut self) {
        let mut released = false;
        for chunk in self.chunks.drain(..) {
            released |= chunk.unpin();
        }
        if released {
            self.volume.notify_unpinned();
        }
    }
}
