use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_chunk::{ChunkCoord, Voxel, VoxelType};
use strata_geom::{IVec3, Region, Vec3};
use strata_mesh_cpu::{ChunkMeshes, extract_tile};
use strata_world::config::TerrainMode;
use strata_world::{
    CancelToken, ConfigError, FlatGenerator, FsPersister, GenContext, Generator, NoiseTerrain,
    PagedVolume, Pager, PickResult, RaySample, RaycastResult, VolumeStats, WorldConfig,
    WorldPager,
};

use crate::pool::WorkerPool;
use crate::queue::ConcurrentQueue;
use crate::tracker::{ExtractionTracker, PendingTile};

/// Tries before `random_pos` settles for a column without a floor.
const RANDOM_POS_TRIES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start extraction workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Tiles pending, in flight, or completed but not yet popped.
    pub meshes: usize,
    /// Results waiting to be popped.
    pub extracted: usize,
    /// Tiles not yet picked up by a worker.
    pub pending: usize,
}

struct Shared {
    volume: PagedVolume,
    tracker: ExtractionTracker,
    results: ConcurrentQueue<ChunkMeshes>,
    cancel: CancelToken,
    mesh_size: i32,
}

impl Shared {
    fn tile_region(&self, tile: IVec3) -> Region {
        Region::from_origin_size(tile, self.mesh_size)
    }

    fn extract(&self, tile: IVec3) -> Option<ChunkMeshes> {
        let region = self.tile_region(tile);
        let pinned = self.volume.pin_region(region.grown(1), &self.cancel)?;
        let grid = pinned.sample(&self.cancel)?;
        drop(pinned);
        extract_tile(&grid, region, &self.cancel)
    }

    fn run_job(&self, job: PendingTile) {
        if !self.tracker.begin(job) {
            return;
        }
        match catch_unwind(AssertUnwindSafe(|| self.extract(job.pos))) {
            Ok(Some(mut meshes)) => {
                meshes.ticket = job.ticket;
                self.tracker.complete(job, meshes, &self.results);
            }
            Ok(None) => self.tracker.release(job),
            Err(_) => {
                log::error!(target: "runtime", "extraction of tile {:?} panicked", job.pos);
                self.tracker.release(job);
            }
        }
    }

    fn worker_loop(&self, index: usize) {
        log::debug!(target: "runtime", "extraction worker {index} started");
        while let Some(job) = self.tracker.pending().wait_and_pop(&self.cancel) {
            self.run_job(job);
        }
        log::debug!(target: "runtime", "extraction worker {index} stopped");
    }
}

/// Owns the paged volume and the extraction workers, and is the single entry
/// point for scheduling, polling and world queries.
pub struct WorldMgr {
    shared: Arc<Shared>,
    pool: Mutex<Option<WorkerPool>>,
    world_pager: Option<Arc<WorldPager>>,
    rng: Mutex<StdRng>,
    seed: u64,
}

impl WorldMgr {
    /// Builds the default pager (filesystem persistence plus the configured
    /// terrain generator) and starts the workers.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let t = &config.terrain;
        let generator: Arc<dyn Generator> = match t.mode {
            TerrainMode::Flat => Arc::new(FlatGenerator::new(t.flat_height)),
            TerrainMode::Noise => Arc::new(NoiseTerrain::new(
                t.seed,
                t.frequency,
                t.base_height,
                t.amplitude,
            )),
        };
        let gen_ctx = GenContext {
            seed: t.seed,
            water_level: t.water_level,
            max_height: config.bounds().upper().y,
        };
        let pager = Arc::new(WorldPager::new(
            Arc::new(FsPersister::new(config.persist.dir.clone())),
            generator,
            gen_ctx,
            config.persist.enabled,
        ));
        Self::build(config, pager.clone(), Some(pager))
    }

    /// Starts the workers over a caller-supplied pager. `set_persist` is a
    /// no-op for these.
    pub fn with_pager(config: WorldConfig, pager: Arc<dyn Pager>) -> Result<Self, WorldError> {
        config.validate()?;
        Self::build(config, pager, None)
    }

    fn build(
        config: WorldConfig,
        pager: Arc<dyn Pager>,
        world_pager: Option<Arc<WorldPager>>,
    ) -> Result<Self, WorldError> {
        let workers = config.resolved_workers();
        let volume = PagedVolume::new(
            pager,
            config.volume.chunk_side,
            config.max_resident_chunks(),
            config.bounds(),
        );
        let shared = Arc::new(Shared {
            volume,
            tracker: ExtractionTracker::new(),
            results: ConcurrentQueue::new(),
            cancel: CancelToken::new(),
            mesh_size: config.extraction.mesh_size,
        });
        let pool = WorkerPool::new(workers, "strata-extract")?;
        let worker_shared = Arc::clone(&shared);
        pool.start(move |i| worker_shared.worker_loop(i));
        log::info!(
            target: "runtime",
            "started {} extraction workers (chunk side {}, mesh size {}, {} resident chunks)",
            pool.workers(),
            config.volume.chunk_side,
            config.extraction.mesh_size,
            shared.volume.max_resident()
        );
        let seed = config.terrain.seed;
        Ok(Self {
            shared,
            pool: Mutex::new(Some(pool)),
            world_pager,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            seed,
        })
    }

    /// Queues the tile containing `pos`. `false` when that tile is already
    /// tracked, lies wholly outside the world bound, or the manager has shut
    /// down.
    pub fn schedule_mesh_extraction(&self, pos: IVec3) -> bool {
        let bounds = self.shared.volume.bounds();
        // Config keeps the bound far enough from the integer limits that this
        // grown box, and any tile inside it, cannot overflow.
        if !bounds.grown(self.shared.mesh_size).contains_point(pos) {
            return false;
        }
        let tile = self.mesh_pos(pos);
        if !self.shared.tile_region(tile).intersects(&bounds) {
            return false;
        }
        self.shared.tracker.schedule(tile)
    }

    /// Reorders tiles not yet picked up, nearest to `pos` first.
    pub fn update_extraction_order(&self, pos: IVec3) {
        self.shared.tracker.reorder(pos);
    }

    /// Lets the tile containing `pos` be scheduled again. Results already
    /// queued for it stay poppable.
    pub fn allow_re_extraction(&self, pos: IVec3) -> bool {
        self.shared.tracker.forget(self.mesh_pos(pos))
    }

    /// Next finished tile, if any. Never blocks.
    pub fn pop(&self) -> Option<ChunkMeshes> {
        let meshes = self.shared.results.pop()?;
        self.shared.tracker.on_popped(&meshes);
        Some(meshes)
    }

    pub fn stats(&self) -> ExtractionStats {
        ExtractionStats {
            meshes: self.shared.tracker.len(),
            extracted: self.shared.results.len(),
            pending: self.shared.tracker.pending().len(),
        }
    }

    /// Stops the workers, drops queued work and results, and flushes the
    /// volume. Safe to call more than once.
    pub fn shutdown(&self) {
        let Some(mut pool) = self.pool.lock().unwrap().take() else {
            return;
        };
        log::info!(target: "runtime", "shutting down extraction");
        self.shared.cancel.cancel();
        self.shared.tracker.close();
        self.shared.tracker.pending().wake_all();
        pool.join();
        self.shared.results.clear();
        self.shared.volume.flush();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.tracker.is_closed()
    }

    /// Drops pending work and queued results, forgets every tile and pages
    /// out the volume. Chunks a running extraction still has pinned stay
    /// resident. Workers keep running.
    pub fn reset(&self) {
        self.shared.tracker.clear();
        self.shared.results.clear();
        self.shared.volume.flush();
        log::debug!(target: "runtime", "world reset");
    }

    pub fn voxel_at(&self, pos: IVec3) -> Voxel {
        self.shared.volume.voxel_at(pos)
    }

    pub fn material(&self, x: i32, y: i32, z: i32) -> VoxelType {
        self.voxel_at(IVec3::new(x, y, z)).material()
    }

    pub fn set_voxel(&self, pos: IVec3, voxel: Voxel) -> bool {
        self.shared.volume.set_voxel(pos, voxel)
    }

    pub fn chunk_pos(&self, pos: IVec3) -> ChunkCoord {
        self.shared.volume.chunk_coord(pos)
    }

    /// Minimum corner of the mesh tile containing `pos`.
    pub fn mesh_pos(&self, pos: IVec3) -> IVec3 {
        pos.snap_down(self.shared.mesh_size)
    }

    pub fn mesh_region(&self, pos: IVec3) -> Region {
        self.shared.tile_region(self.mesh_pos(pos))
    }

    pub fn chunk_size(&self) -> i32 {
        self.shared.volume.chunk_side()
    }

    pub fn mesh_size(&self) -> i32 {
        self.shared.mesh_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn set_persist(&self, persist: bool) {
        match &self.world_pager {
            Some(pager) => pager.set_persist(persist),
            None => log::warn!(target: "runtime", "custom pager ignores set_persist({persist})"),
        }
    }

    /// Pages in every chunk within `radius` voxels of `pos`.
    pub fn prefetch(&self, pos: IVec3, radius: i32) {
        let region = Region::new(pos, pos).grown(radius.max(0));
        self.shared.volume.prefetch(&region);
    }

    pub fn volume_stats(&self) -> VolumeStats {
        self.shared.volume.stats()
    }

    /// Seeded random surface position inside the world bound: the column's
    /// floor plus one, or the bound's bottom when no column had a floor.
    pub fn random_pos(&self) -> IVec3 {
        let bounds = self.shared.volume.bounds();
        let (lo, hi) = (bounds.lower(), bounds.upper());
        let mut rng = self.rng.lock().unwrap();
        let mut last = lo;
        for _ in 0..RANDOM_POS_TRIES {
            let x = rng.random_range(lo.x..=hi.x);
            let z = rng.random_range(lo.z..=hi.z);
            if let Some(y) = self.find_floor(x, z, |m| m != VoxelType::Air) {
                return IVec3::new(x, (y + 1).min(hi.y), z);
            }
            last = IVec3::new(x, lo.y, z);
        }
        last
    }

    pub fn raycast<F>(&self, origin: Vec3, dir_with_length: Vec3, callback: F) -> RaycastResult
    where
        F: FnMut(&RaySample) -> bool,
    {
        strata_world::raycast(&self.shared.volume, origin, dir_with_length, callback)
    }

    /// First non-air voxel along the ray, with its position.
    pub fn raycast_hit(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<RaySample> {
        let mut hit = None;
        strata_world::raycast_with_direction(
            &self.shared.volume,
            origin,
            direction,
            max_distance,
            |s| {
                if s.voxel.is_air() {
                    return true;
                }
                hit = Some(*s);
                false
            },
        );
        hit
    }

    pub fn find_floor<F>(&self, x: i32, z: i32, check: F) -> Option<i32>
    where
        F: Fn(VoxelType) -> bool,
    {
        strata_world::find_floor(&self.shared.volume, x, z, check)
    }

    pub fn find_walkable_floor(&self, pos: Vec3, max_distance_y: f32) -> Option<i32> {
        strata_world::find_walkable_floor(&self.shared.volume, pos, max_distance_y)
    }

    /// Walkable cells from `start` to `end` inclusive, or `None` when no
    /// route exists within the search limit.
    pub fn find_path(&self, start: IVec3, end: IVec3) -> Option<Vec<IVec3>> {
        strata_world::find_path(&self.shared.volume, start, end)
    }

    pub fn pick_voxel(&self, origin: Vec3, dir_with_length: Vec3) -> PickResult {
        strata_world::pick_voxel(&self.shared.volume, origin, dir_with_length)
    }
}

impl Drop for WorldMgr {
    fn drop(&mut self) {
        self.shutdown();
    }
}
