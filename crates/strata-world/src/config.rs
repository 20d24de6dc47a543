use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use strata_chunk::Voxel;
use strata_geom::{IVec3, Region};

pub const MAX_AUTO_WORKERS: usize = 8;
/// World bounds must sit within this many voxels of the origin on every axis.
pub const MAX_WORLD_EXTENT: i32 = 1 << 30;
pub const MAX_MESH_SIZE: i32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub volume: VolumeSection,
    #[serde(default)]
    pub extraction: ExtractionSection,
    #[serde(default)]
    pub terrain: TerrainSection,
    #[serde(default)]
    pub persist: PersistSection,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VolumeSection {
    #[serde(default = "default_chunk_side")]
    pub chunk_side: i32,
    #[serde(default = "default_memory_budget_mb")]
    pub memory_budget_mb: u32,
    /// Overrides the budget-derived resident chunk count when set.
    #[serde(default)]
    pub max_resident_chunks: Option<usize>,
    #[serde(default = "default_bounds_min")]
    pub bounds_min: [i32; 3],
    #[serde(default = "default_bounds_max")]
    pub bounds_max: [i32; 3],
}
fn default_chunk_side() -> i32 {
    32
}
fn default_memory_budget_mb() -> u32 {
    128
}
fn default_bounds_min() -> [i32; 3] {
    [-4096, 0, -4096]
}
fn default_bounds_max() -> [i32; 3] {
    [4095, 255, 4095]
}
impl Default for VolumeSection {
    fn default() -> Self {
        Self {
            chunk_side: default_chunk_side(),
            memory_budget_mb: default_memory_budget_mb(),
            max_resident_chunks: None,
            bounds_min: default_bounds_min(),
            bounds_max: default_bounds_max(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExtractionSection {
    #[serde(default = "default_mesh_size")]
    pub mesh_size: i32,
    /// Worker thread count; 0 picks one less than the available cores,
    /// capped at `MAX_AUTO_WORKERS`.
    #[serde(default)]
    pub workers: usize,
}
fn default_mesh_size() -> i32 {
    64
}
impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            mesh_size: default_mesh_size(),
            workers: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TerrainMode {
    Flat,
    Noise,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TerrainSection {
    #[serde(default = "default_mode")]
    pub mode: TerrainMode,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_water_level")]
    pub water_level: i32,
    #[serde(default = "default_flat_height")]
    pub flat_height: i32,
    #[serde(default = "default_base_height")]
    pub base_height: i32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
}
fn default_mode() -> TerrainMode {
    TerrainMode::Noise
}
fn default_seed() -> u64 {
    0x5EED
}
fn default_water_level() -> i32 {
    40
}
fn default_flat_height() -> i32 {
    32
}
fn default_base_height() -> i32 {
    48
}
fn default_amplitude() -> f32 {
    24.0
}
fn default_frequency() -> f32 {
    0.008
}
impl Default for TerrainSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            seed: default_seed(),
            water_level: default_water_level(),
            flat_height: default_flat_height(),
            base_height: default_base_height(),
            amplitude: default_amplitude(),
            frequency: default_frequency(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PersistSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_persist_dir")]
    pub dir: PathBuf,
}
fn default_persist_dir() -> PathBuf {
    PathBuf::from("strata-save")
}
impl Default for PersistSection {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_persist_dir(),
        }
    }
}

impl WorldConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: WorldConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Enforced world bound; voxels outside read as air and reject writes.
    pub fn bounds(&self) -> Region {
        Region::new(
            IVec3::from(tuple(self.volume.bounds_min)),
            IVec3::from(tuple(self.volume.bounds_max)),
        )
    }

    pub fn resolved_workers(&self) -> usize {
        if self.extraction.workers > 0 {
            return self.extraction.workers;
        }
        thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(3)
            .clamp(1, MAX_AUTO_WORKERS)
    }

    pub fn max_resident_chunks(&self) -> usize {
        if let Some(n) = self.volume.max_resident_chunks {
            return n.max(1);
        }
        let side = self.volume.chunk_side.max(1) as usize;
        let chunk_bytes = side * side * side * std::mem::size_of::<Voxel>();
        let budget = self.volume.memory_budget_mb as usize * 1024 * 1024;
        (budget / chunk_bytes).max(1)
    }

    /// Worst-case chunk count pinned by one tile extraction (tile plus its
    /// one-voxel neighbour border).
    pub fn chunks_per_tile(&self) -> usize {
        let span = (self.extraction.mesh_size + 2).max(1) as usize;
        let side = self.volume.chunk_side.max(1) as usize;
        let per_axis = span.div_ceil(side) + 1;
        per_axis * per_axis * per_axis
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let side = self.volume.chunk_side;
        if !(8..=256).contains(&side) || (side as u32).count_ones() != 1 {
            return Err(ConfigError::Invalid(format!(
                "chunk_side must be a power of two in 8..=256, got {side}"
            )));
        }
        if !(1..=MAX_MESH_SIZE).contains(&self.extraction.mesh_size) {
            return Err(ConfigError::Invalid(format!(
                "mesh_size must be in 1..={MAX_MESH_SIZE}, got {}",
                self.extraction.mesh_size
            )));
        }
        let (lo, hi) = (self.volume.bounds_min, self.volume.bounds_max);
        if (0..3).any(|i| lo[i] > hi[i]) {
            return Err(ConfigError::Invalid(format!(
                "bounds_min {lo:?} exceeds bounds_max {hi:?}"
            )));
        }
        if lo.iter().chain(&hi).any(|c| c.unsigned_abs() > MAX_WORLD_EXTENT as u32) {
            return Err(ConfigError::Invalid(format!(
                "bounds {lo:?}..{hi:?} reach past {MAX_WORLD_EXTENT} voxels from the origin"
            )));
        }
        let needed = self.resolved_workers() * self.chunks_per_tile() + 1;
        let resident = self.max_resident_chunks();
        if resident < needed {
            return Err(ConfigError::Invalid(format!(
                "resident budget of {resident} chunks cannot hold {needed} pinned chunks"
            )));
        }
        Ok(())
    }
}

fn tuple(v: [i32; 3]) -> (i32, i32, i32) {
    (v[0], v[1], v[2])
}

pub fn load_config_from_path(path: &Path) -> Result<WorldConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    WorldConfig::from_toml_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.volume.chunk_side, 32);
        assert_eq!(cfg.extraction.mesh_size, 64);
        assert_eq!(cfg.terrain.mode, TerrainMode::Noise);
        assert!(!cfg.persist.enabled);
        // 128 MiB of 32^3 one-byte voxels
        assert_eq!(cfg.max_resident_chunks(), 4096);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = WorldConfig::from_toml_str(
            r#"
            [volume]
            chunk_side = 16
            max_resident_chunks = 900
            bounds_min = [-64, 0, -64]
            bounds_max = [63, 127, 63]

            [extraction]
            mesh_size = 32
            workers = 2

            [terrain]
            mode = "flat"
            flat_height = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.volume.chunk_side, 16);
        assert_eq!(cfg.max_resident_chunks(), 900);
        assert_eq!(cfg.resolved_workers(), 2);
        assert_eq!(cfg.terrain.mode, TerrainMode::Flat);
        assert_eq!(cfg.bounds().upper(), IVec3::new(63, 127, 63));
    }

    #[test]
    fn rejects_non_power_of_two_chunks() {
        let err = WorldConfig::from_toml_str("[volume]\nchunk_side = 24\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_budget_smaller_than_pinned_tiles() {
        let err = WorldConfig::from_toml_str(
            "[volume]\nmax_resident_chunks = 8\n[extraction]\nworkers = 4\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bounds_near_the_integer_limits() {
        let err = WorldConfig::from_toml_str("[volume]\nbounds_min = [-2147483648, 0, 0]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = WorldConfig::from_toml_str("[extraction]\nmesh_size = 4096\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn parse_errors_surface() {
        let err = WorldConfig::from_toml_str("[volume\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
