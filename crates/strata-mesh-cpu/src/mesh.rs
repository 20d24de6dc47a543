use strata_chunk::VoxelType;
use strata_geom::{IVec3, Vec3};

use crate::face::Face;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    /// Relative to the owning mesh's offset.
    pub position: Vec3,
    pub normal: Vec3,
    pub material: VoxelType,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub offset: IVec3,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(offset: IVec3) -> Self {
        Self {
            offset,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Appends a quad `a, b, c, d` (perimeter order). Winding is flipped when
    /// needed so triangles face along `face`'s normal.
    pub fn add_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3, face: Face, material: VoxelType) {
        let n = face.normal();
        let mut vs = [a, b, c, d];
        let e1 = vs[1] - vs[0];
        let e2 = vs[2] - vs[0];
        let cross = Vec3::new(
            e1.y * e2.z - e1.z * e2.y,
            e1.z * e2.x - e1.x * e2.z,
            e1.x * e2.y - e1.y * e2.x,
        );
        if cross.dot(n) < 0.0 {
            vs.swap(1, 3);
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend(vs.iter().map(|&position| Vertex {
            position,
            normal: n,
            material,
        }));
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Extraction result for one mesh tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMeshes {
    pub opaque: Mesh,
    pub water: Mesh,
    /// Scheduler ticket this result answers; 0 until the runtime stamps it.
    pub ticket: u64,
}

impl ChunkMeshes {
    /// World offset of the tile's minimum corner.
    #[inline]
    pub fn translation(&self) -> IVec3 {
        self.opaque.offset
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.water.is_empty()
    }
}
