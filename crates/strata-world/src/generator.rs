use fastnoise_lite::{FastNoiseLite, NoiseType};

use strata_chunk::{Voxel, VoxelType};
use strata_geom::IVec3;

use crate::pager::{PageError, PageInContext};

/// Inputs shared by every generated column.
#[derive(Clone, Debug)]
pub struct GenContext {
    pub seed: u64,
    pub water_level: i32,
    /// Topmost y the world can hold.
    pub max_height: i32,
}

/// Material source for chunks that have no persisted data.
pub trait Generator: Send + Sync {
    /// Pure function of position and context.
    fn material_at(&self, ctx: &GenContext, p: IVec3) -> VoxelType;

    /// Fills `out[i]` with the material at `(x, y0 + i, z)`. Override when a
    /// column shares work across its voxels.
    fn fill_column(&self, ctx: &GenContext, x: i32, z: i32, y0: i32, out: &mut [VoxelType]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.material_at(ctx, IVec3::new(x, y0 + i as i32, z));
        }
    }
}

/// Generates one chunk column by column, checking for cancellation between
/// columns.
pub(crate) fn generate_chunk(
    generator: &dyn Generator,
    gen_ctx: &GenContext,
    ctx: &mut PageInContext<'_>,
) -> Result<(), PageError> {
    let lower = ctx.region.lower();
    let side = ctx.region.width() as usize;
    if ctx.voxels.len() != side * side * side {
        return Err(PageError::Generation(format!(
            "buffer of {} voxels does not fit a {side}^3 chunk",
            ctx.voxels.len()
        )));
    }
    let mut column = vec![VoxelType::Air; side];
    for z in 0..side {
        for x in 0..side {
            if ctx.is_cancelled() {
                return Err(PageError::Cancelled);
            }
            generator.fill_column(
                gen_ctx,
                lower.x + x as i32,
                lower.z + z as i32,
                lower.y,
                &mut column,
            );
            for (y, ty) in column.iter().enumerate() {
                ctx.voxels[(y * side + z) * side + x] = Voxel::new(*ty);
            }
        }
    }
    Ok(())
}

/// Solid ground up to `height`, air above.
#[derive(Clone, Debug)]
pub struct FlatGenerator {
    pub height: i32,
    pub material: VoxelType,
}

impl FlatGenerator {
    pub fn new(height: i32) -> Self {
        Self {
            height,
            material: VoxelType::Rock,
        }
    }
}

impl Generator for FlatGenerator {
    fn material_at(&self, _ctx: &GenContext, p: IVec3) -> VoxelType {
        if p.y >= 0 && p.y <= self.height {
            self.material
        } else {
            VoxelType::Air
        }
    }
}

/// Heightmap terrain from 2D OpenSimplex noise with layered soil and
/// water filling everything below the water level.
pub struct NoiseTerrain {
    noise: FastNoiseLite,
    base_height: i32,
    amplitude: f32,
}

impl NoiseTerrain {
    pub fn new(seed: u64, frequency: f32, base_height: i32, amplitude: f32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed as i32);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(frequency));
        Self {
            noise,
            base_height,
            amplitude,
        }
    }

    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let n = self.noise.get_noise_2d(x as f32, z as f32);
        self.base_height + (n * self.amplitude).round() as i32
    }

    fn layer(&self, ctx: &GenContext, y: i32, surface: i32) -> VoxelType {
        if y < 0 || y > ctx.max_height {
            return VoxelType::Air;
        }
        if y > surface {
            return if y <= ctx.water_level {
                VoxelType::Water
            } else {
                VoxelType::Air
            };
        }
        let depth = surface - y;
        let beach = surface <= ctx.water_level + 1;
        match depth {
            0 if beach => VoxelType::Sand,
            0 => VoxelType::Grass,
            1..=3 if beach => VoxelType::Sand,
            1..=3 => VoxelType::Dirt,
            _ => VoxelType::Rock,
        }
    }
}

impl Generator for NoiseTerrain {
    fn material_at(&self, ctx: &GenContext, p: IVec3) -> VoxelType {
        self.layer(ctx, p.y, self.height_at(p.x, p.z))
    }

    fn fill_column(&self, ctx: &GenContext, x: i32, z: i32, y0: i32, out: &mut [VoxelType]) {
        let surface = self.height_at(x, z);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.layer(ctx, y0 + i as i32, surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GenContext {
        GenContext {
            seed: 7,
            water_level: 10,
            max_height: 127,
        }
    }

    #[test]
    fn flat_generator_is_solid_up_to_height() {
        let g = FlatGenerator::new(4);
        assert_eq!(g.material_at(&ctx(), IVec3::new(3, 4, -9)), VoxelType::Rock);
        assert_eq!(g.material_at(&ctx(), IVec3::new(3, 5, -9)), VoxelType::Air);
        assert_eq!(g.material_at(&ctx(), IVec3::new(3, -1, -9)), VoxelType::Air);
    }

    #[test]
    fn noise_column_matches_per_voxel_sampling() {
        let g = NoiseTerrain::new(42, 0.02, 12, 8.0);
        let c = ctx();
        let mut col = vec![VoxelType::Air; 32];
        g.fill_column(&c, 17, -5, 0, &mut col);
        for (y, ty) in col.iter().enumerate() {
            assert_eq!(*ty, g.material_at(&c, IVec3::new(17, y as i32, -5)));
        }
        let surface = g.height_at(17, -5);
        assert!(col[..=surface.clamp(0, 31) as usize].iter().all(|t| *t != VoxelType::Air));
    }
}
