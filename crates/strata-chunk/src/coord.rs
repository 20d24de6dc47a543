use strata_geom::{IVec3, Region};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    /// Chunk containing world position `p`. Floor division, so negative
    /// positions land in negative chunks.
    #[inline]
    pub fn from_world(p: IVec3, side: i32) -> Self {
        let c = p.div_floor(side);
        Self::new(c.x, c.y, c.z)
    }

    /// World position of the chunk's minimum corner.
    #[inline]
    pub fn origin(self, side: i32) -> IVec3 {
        IVec3::new(self.cx * side, self.cy * side, self.cz * side)
    }

    #[inline]
    pub fn region(self, side: i32) -> Region {
        Region::from_origin_size(self.origin(side), side)
    }

    /// Local offsets of world position `p` inside this chunk.
    #[inline]
    pub fn local(self, p: IVec3, side: i32) -> (usize, usize, usize) {
        let o = self.origin(side);
        debug_assert!(self.region(side).contains_point(p));
        ((p.x - o.x) as usize, (p.y - o.y) as usize, (p.z - o.z) as usize)
    }
}

impl From<ChunkCoord> for IVec3 {
    fn from(c: ChunkCoord) -> Self {
        IVec3::new(c.cx, c.cy, c.cz)
    }
}

/// Every chunk coordinate whose cube intersects `region`, x fastest.
pub fn chunks_overlapping(region: &Region, side: i32) -> impl Iterator<Item = ChunkCoord> {
    let lo = ChunkCoord::from_world(region.lower(), side);
    let hi = ChunkCoord::from_world(region.upper(), side);
    (lo.cy..=hi.cy).flat_map(move |cy| {
        (lo.cz..=hi.cz).flat_map(move |cz| (lo.cx..=hi.cx).map(move |cx| ChunkCoord::new(cx, cy, cz)))
    })
}
