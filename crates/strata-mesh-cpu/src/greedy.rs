use std::time::Instant;

use strata_chunk::{Voxel, VoxelGrid, VoxelType};
use strata_geom::{IVec3, Region, Vec3};
use strata_world::CancelToken;

use crate::face::Face;
use crate::mesh::{ChunkMeshes, Mesh};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Surface {
    Opaque,
    Water,
}

impl Surface {
    #[inline]
    fn emits(self, v: Voxel, neighbour: Voxel) -> bool {
        match self {
            Surface::Opaque => v.is_solid() && neighbour.is_translucent(),
            Surface::Water => v.is_water() && neighbour.is_air(),
        }
    }
}

#[inline]
fn unit(axis: usize) -> IVec3 {
    match axis {
        0 => IVec3::new(1, 0, 0),
        1 => IVec3::new(0, 1, 0),
        _ => IVec3::new(0, 0, 1),
    }
}

#[inline]
fn extent(dims: IVec3, axis: usize) -> i32 {
    match axis {
        0 => dims.x,
        1 => dims.y,
        _ => dims.z,
    }
}

/// Builds the opaque and water surfaces of `tile` from `grid`, which must
/// cover `tile` grown by one voxel so border faces cull against neighbours.
/// Returns `None` once `cancel` fires; no partial result escapes.
pub fn extract_tile(grid: &VoxelGrid, tile: Region, cancel: &CancelToken) -> Option<ChunkMeshes> {
    debug_assert!(grid.region().contains_region(&tile));
    let t0 = Instant::now();
    let origin = tile.lower();
    let mut out = ChunkMeshes {
        opaque: Mesh::new(origin),
        water: Mesh::new(origin),
        ticket: 0,
    };
    if !grid.has_non_air() {
        return (!cancel.is_cancelled()).then_some(out);
    }
    let mut mask = Vec::new();
    for face in Face::ALL {
        greedy_face(grid, &tile, face, Surface::Opaque, &mut mask, &mut out.opaque, cancel)?;
        greedy_face(grid, &tile, face, Surface::Water, &mut mask, &mut out.water, cancel)?;
    }
    log::debug!(
        target: "extract",
        "ms={} tile={:?} opaque_quads={} water_quads={}",
        t0.elapsed().as_millis(),
        origin,
        out.opaque.quad_count(),
        out.water.quad_count()
    );
    Some(out)
}

/// Sweeps `tile` slice by slice along `face`'s axis. Each slice builds a
/// mask of emitting cells keyed by material, then merges runs into the
/// widest rectangles it can, scanning rows first.
fn greedy_face(
    grid: &VoxelGrid,
    tile: &Region,
    face: Face,
    surface: Surface,
    mask: &mut Vec<Option<VoxelType>>,
    mesh: &mut Mesh,
    cancel: &CancelToken,
) -> Option<()> {
    let d = face.axis();
    let (u, v) = ((d + 1) % 3, (d + 2) % 3);
    let dims = tile.dimensions();
    let (nd, nu, nv) = (extent(dims, d), extent(dims, u), extent(dims, v));
    let (wu, wv) = (nu as usize, nv as usize);
    let (ed, eu, ev) = (unit(d), unit(u), unit(v));
    let lower = tile.lower();
    let step = face.delta();
    let lift = i32::from(face.is_positive());

    mask.clear();
    mask.resize(wu * wv, None);

    for slice in 0..nd {
        if cancel.is_cancelled() {
            return None;
        }
        for j in 0..nv {
            for i in 0..nu {
                let p = lower + ed * slice + eu * i + ev * j;
                let vox = grid.get(p);
                mask[j as usize * wu + i as usize] =
                    surface.emits(vox, grid.get(p + step)).then(|| vox.material());
            }
        }

        for j in 0..wv {
            let mut i = 0;
            while i < wu {
                let Some(mat) = mask[j * wu + i] else {
                    i += 1;
                    continue;
                };
                let mut w = 1;
                while i + w < wu && mask[j * wu + i + w] == Some(mat) {
                    w += 1;
                }
                let mut h = 1;
                while j + h < wv {
                    let row = (j + h) * wu + i;
                    if mask[row..row + w].iter().any(|m| *m != Some(mat)) {
                        break;
                    }
                    h += 1;
                }
                for r in j..j + h {
                    mask[r * wu + i..r * wu + i + w].fill(None);
                }

                let a = Vec3::from(ed * (slice + lift) + eu * i as i32 + ev * j as i32);
                let du = Vec3::from(eu * w as i32);
                let dv = Vec3::from(ev * h as i32);
                mesh.add_quad(a, a + du, a + du + dv, a + dv, face, mat);
                i += w;
            }
        }
    }
    Some(())
}
