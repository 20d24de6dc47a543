use proptest::prelude::*;

use strata_chunk::{Voxel, VoxelGrid, VoxelType};
use strata_geom::{IVec3, Region, Vec3};
use strata_mesh_cpu::{Face, Mesh, extract_tile};
use strata_world::CancelToken;

const SIZE: i32 = 5;

fn materials() -> impl Strategy<Value = VoxelType> {
    prop_oneof![
        4 => Just(VoxelType::Air),
        1 => Just(VoxelType::Water),
        1 => Just(VoxelType::Rock),
        1 => Just(VoxelType::Grass),
    ]
}

fn grid_from(tile: Region, cells: &[VoxelType]) -> VoxelGrid {
    let mut grid = VoxelGrid::new(tile.grown(1));
    let lo = grid.region().lower();
    let dims = grid.dims();
    let mut it = cells.iter();
    for y in 0..dims.y {
        for z in 0..dims.z {
            for x in 0..dims.x {
                if let Some(ty) = it.next() {
                    grid.set(lo + IVec3::new(x, y, z), Voxel::new(*ty));
                }
            }
        }
    }
    grid
}

fn quad_area(mesh: &Mesh) -> f32 {
    mesh.indices
        .chunks(6)
        .map(|q| {
            let v0 = mesh.vertices[q[0] as usize].position;
            let v1 = mesh.vertices[q[1] as usize].position;
            let v3 = mesh.vertices[q[5] as usize].position;
            let e1 = v1 - v0;
            let e2 = v3 - v0;
            Vec3::new(
                e1.y * e2.z - e1.z * e2.y,
                e1.z * e2.x - e1.x * e2.z,
                e1.x * e2.y - e1.y * e2.x,
            )
            .length()
        })
        .sum()
}

fn naive_faces(grid: &VoxelGrid, tile: Region, emits: impl Fn(Voxel, Voxel) -> bool) -> usize {
    let lo = tile.lower();
    let mut n = 0;
    for y in 0..SIZE {
        for z in 0..SIZE {
            for x in 0..SIZE {
                let p = lo + IVec3::new(x, y, z);
                for face in Face::ALL {
                    if emits(grid.get(p), grid.get(p + face.delta())) {
                        n += 1;
                    }
                }
            }
        }
    }
    n
}

proptest! {
    #[test]
    fn merged_area_matches_exposed_face_count(
        cells in proptest::collection::vec(materials(), ((SIZE + 2) * (SIZE + 2) * (SIZE + 2)) as usize),
    ) {
        let tile = Region::from_origin_size(IVec3::new(-3, 7, 2), SIZE);
        let grid = grid_from(tile, &cells);
        let meshes = extract_tile(&grid, tile, &CancelToken::new()).unwrap();

        let opaque = naive_faces(&grid, tile, |v, n| v.is_solid() && !n.is_solid());
        let water = naive_faces(&grid, tile, |v, n| v.is_water() && n.is_air());
        prop_assert_eq!(quad_area(&meshes.opaque).round() as usize, opaque);
        prop_assert_eq!(quad_area(&meshes.water).round() as usize, water);
        prop_assert!(meshes.opaque.quad_count() <= opaque);

        for v in meshes.opaque.vertices.iter().chain(&meshes.water.vertices) {
            let p = v.position;
            prop_assert!(p.x >= 0.0 && p.y >= 0.0 && p.z >= 0.0);
            prop_assert!(p.x <= SIZE as f32 && p.y <= SIZE as f32 && p.z <= SIZE as f32);
        }
    }
}
