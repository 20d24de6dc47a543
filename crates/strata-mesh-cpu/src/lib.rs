//! CPU surface extraction: greedy quads over a sampled voxel grid.
#![forbid(unsafe_code)]

mod face;
mod greedy;
mod mesh;

pub use face::Face;
pub use greedy::extract_tile;
pub use mesh::{ChunkMeshes, Mesh, Vertex};

#[cfg(test)]
mod tests {
    use super::*;
    use strata_chunk::{Voxel, VoxelGrid, VoxelType};
    use strata_geom::{IVec3, Region, Vec3};
    use strata_world::CancelToken;

    fn tile() -> Region {
        Region::from_origin_size(IVec3::new(16, 0, -8), 4)
    }

    fn grid_for(tile: Region) -> VoxelGrid {
        VoxelGrid::new(tile.grown(1))
    }

    fn extract(grid: &VoxelGrid, tile: Region) -> ChunkMeshes {
        extract_tile(grid, tile, &CancelToken::new()).unwrap()
    }

    fn rock() -> Voxel {
        Voxel::new(VoxelType::Rock)
    }

    #[test]
    fn lone_voxel_emits_six_quads() {
        let t = tile();
        let mut g = grid_for(t);
        g.set(t.lower() + IVec3::ONE, rock());
        let m = extract(&g, t);
        assert_eq!(m.opaque.quad_count(), 6);
        assert_eq!(m.opaque.vertices.len(), 24);
        assert!(m.water.is_empty());
        assert_eq!(m.translation(), t.lower());
        assert!(m.opaque.vertices.iter().all(|v| v.material == VoxelType::Rock));
    }

    #[test]
    fn flat_slab_merges_to_one_quad_per_side() {
        let t = tile();
        let mut g = grid_for(t);
        for z in 0..4 {
            for x in 0..4 {
                g.set(t.lower() + IVec3::new(x, 1, z), rock());
            }
        }
        let m = extract(&g, t);
        assert_eq!(m.opaque.quad_count(), 6);
    }

    #[test]
    fn materials_do_not_merge() {
        let t = tile();
        let mut g = grid_for(t);
        g.set(t.lower(), rock());
        g.set(t.lower() + IVec3::new(1, 0, 0), Voxel::new(VoxelType::Dirt));
        let m = extract(&g, t);
        // Top, bottom and both z sides split per material; x ends stay single.
        assert_eq!(m.opaque.quad_count(), 10);
    }

    #[test]
    fn neighbour_outside_tile_culls_border_face() {
        let t = tile();
        let mut g = grid_for(t);
        g.set(t.lower(), rock());
        g.set(t.lower() - IVec3::new(1, 0, 0), rock());
        let m = extract(&g, t);
        assert_eq!(m.opaque.quad_count(), 5);
        assert!(m.opaque.vertices.iter().all(|v| v.normal != Vec3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn water_surfaces_face_air_only() {
        let t = tile();
        let mut g = grid_for(t);
        let base = t.lower() + IVec3::new(1, 1, 1);
        g.set(base, Voxel::new(VoxelType::Water));
        g.set(base + IVec3::new(0, 1, 0), rock());
        let m = extract(&g, t);
        // Water loses its top to the rock; rock keeps its bottom facing water.
        assert_eq!(m.water.quad_count(), 5);
        assert_eq!(m.opaque.quad_count(), 6);
        assert!(m.water.vertices.iter().all(|v| v.normal != Vec3::UP));
    }

    #[test]
    fn quads_wind_along_their_normal() {
        let t = tile();
        let mut g = grid_for(t);
        g.set(t.lower() + IVec3::new(2, 2, 1), rock());
        g.set(t.lower() + IVec3::new(2, 3, 1), Voxel::new(VoxelType::Grass));
        let m = extract(&g, t);
        for tri in m.opaque.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| m.opaque.vertices[i as usize]);
            let e1 = b.position - a.position;
            let e2 = c.position - a.position;
            let cross = Vec3::new(
                e1.y * e2.z - e1.z * e2.y,
                e1.z * e2.x - e1.x * e2.z,
                e1.x * e2.y - e1.y * e2.x,
            );
            assert!(cross.dot(a.normal) > 0.0);
        }
    }

    #[test]
    fn identical_input_gives_identical_meshes() {
        let t = tile();
        let mut g = grid_for(t);
        for (i, p) in [(0, 0, 0), (1, 0, 0), (3, 2, 1), (2, 3, 3)].into_iter().enumerate() {
            let ty = if i % 2 == 0 { VoxelType::Sand } else { VoxelType::Wood };
            g.set(t.lower() + IVec3::from(p), Voxel::new(ty));
        }
        assert_eq!(extract(&g, t), extract(&g, t));
    }

    #[test]
    fn cancelled_extraction_returns_nothing() {
        let t = tile();
        let mut g = grid_for(t);
        g.set(t.lower(), rock());
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(extract_tile(&g, t, &cancel).is_none());
    }

    #[test]
    fn all_air_grid_gives_empty_meshes_at_the_tile_origin() {
        let t = tile();
        let g = grid_for(t);
        let m = extract(&g, t);
        assert!(m.is_empty());
        assert_eq!(m.translation(), t.lower());
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(extract_tile(&g, t, &cancel).is_none());
    }
}
