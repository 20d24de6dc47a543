//! Sparse chunk store with a bounded resident set.
//!
//! Chunks live in a generational arena indexed by chunk coordinate. Misses
//! page the chunk in through the [`Pager`]; when the resident set is full the
//! least recently touched unpinned chunk is paged out first. Voxel reads take
//! the resident-set lock shared; eviction and flush take it exclusively.
//! Page-in runs outside the lock: the loading thread claims the coordinate
//! and reserves a slot, so other misses on the same chunk wait for it while
//! misses elsewhere proceed. Each chunk's voxels sit behind their own lock so
//! pinned regions can be sampled without touching the resident set at all.

mod arena;
mod pin;

pub use pin::PinnedRegion;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use strata_chunk::{ChunkBuf, ChunkCoord, Voxel, chunks_overlapping};
use strata_geom::{IVec3, Region};

use crate::cancel::CancelToken;
use crate::pager::{PageError, PageInContext, PageInOutcome, PageOutContext, PageOutcome, Pager};

use arena::{ChunkArena, SlotKey};

const PIN_WAIT: Duration = Duration::from_millis(5);

pub(crate) struct Chunk {
    coord: ChunkCoord,
    buf: RwLock<ChunkBuf>,
    last_access: AtomicU64,
    pins: AtomicUsize,
    dirty: AtomicBool,
    /// False when page-in failed and the chunk stands in as air.
    valid: bool,
}

impl Chunk {
    #[inline]
    pub(crate) fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub(crate) fn buf(&self) -> &RwLock<ChunkBuf> {
        &self.buf
    }

    #[inline]
    pub(crate) fn unpin(&self) -> bool {
        self.pins.fetch_sub(1, Ordering::AcqRel) == 1
    }

    #[inline]
    fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }
}

struct ResidentSet {
    arena: ChunkArena<Arc<Chunk>>,
    index: HashMap<ChunkCoord, SlotKey>,
    /// Slots held for page-ins running outside the lock.
    reserved: usize,
}

impl ResidentSet {
    fn find(&self, coord: ChunkCoord) -> Option<&Arc<Chunk>> {
        self.arena.get(*self.index.get(&coord)?)
    }

    fn occupied(&self) -> usize {
        self.arena.len() + self.reserved
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    page_ins: AtomicU64,
    page_outs: AtomicU64,
    failed_page_ins: AtomicU64,
    failed_page_outs: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VolumeStats {
    pub resident: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub page_ins: u64,
    pub page_outs: u64,
    pub failed_page_ins: u64,
    pub failed_page_outs: u64,
}

/// Exclusive right to page one coordinate in. Dropping it wakes threads
/// waiting on the same coordinate.
struct LoadClaim<'v> {
    volume: &'v PagedVolume,
    coord: ChunkCoord,
}

impl Drop for LoadClaim<'_> {
    fn drop(&mut self) {
        let mut loading = self.volume.loading.lock().unwrap();
        loading.remove(&self.coord);
        drop(loading);
        self.volume.loaded.notify_all();
    }
}

pub struct PagedVolume {
    resident: RwLock<ResidentSet>,
    loading: Mutex<HashSet<ChunkCoord>>,
    loaded: Condvar,
    pager: Arc<dyn Pager>,
    side: i32,
    max_resident: usize,
    bounds: Region,
    clock: AtomicU64,
    unpin_lock: Mutex<()>,
    unpinned: Condvar,
    counters: Counters,
}

impl PagedVolume {
    /// `side` must be a positive power of two; `max_resident` is clamped to 1.
    pub fn new(pager: Arc<dyn Pager>, side: i32, max_resident: usize, bounds: Region) -> Self {
        debug_assert!(side > 0 && (side as u32).is_power_of_two());
        Self {
            resident: RwLock::new(ResidentSet {
                arena: ChunkArena::new(),
                index: HashMap::new(),
                reserved: 0,
            }),
            loading: Mutex::new(HashSet::new()),
            loaded: Condvar::new(),
            pager,
            side,
            max_resident: max_resident.max(1),
            bounds,
            clock: AtomicU64::new(0),
            unpin_lock: Mutex::new(()),
            unpinned: Condvar::new(),
            counters: Counters::default(),
        }
    }

    #[inline]
    pub fn chunk_side(&self) -> i32 {
        self.side
    }

    #[inline]
    pub fn bounds(&self) -> Region {
        self.bounds
    }

    #[inline]
    pub fn max_resident(&self) -> usize {
        self.max_resident
    }

    #[inline]
    pub fn chunk_coord(&self, p: IVec3) -> ChunkCoord {
        ChunkCoord::from_world(p, self.side)
    }

    /// Voxel at `p`, paging its chunk in on a miss. Positions outside the
    /// world bound read as air without paging.
    pub fn voxel_at(&self, p: IVec3) -> Voxel {
        if !self.bounds.contains_point(p) {
            return Voxel::AIR;
        }
        let coord = self.chunk_coord(p);
        let local = coord.local(p, self.side);
        self.with_chunk(coord, None, |chunk| {
            let buf = chunk.buf.read().unwrap();
            buf.get_local(local.0, local.1, local.2)
        })
        .unwrap_or(Voxel::AIR)
    }

    /// Writes `v` at `p` and marks the chunk dirty. `false` outside the
    /// world bound.
    pub fn set_voxel(&self, p: IVec3, v: Voxel) -> bool {
        if !self.bounds.contains_point(p) {
            return false;
        }
        let coord = self.chunk_coord(p);
        let local = coord.local(p, self.side);
        self.with_chunk(coord, None, |chunk| {
            let mut buf = chunk.buf.write().unwrap();
            buf.set_local(local.0, local.1, local.2, v);
            chunk.dirty.store(true, Ordering::Release);
        })
        .is_some()
    }

    /// Whether the chunk holding `p` is resident and was paged in cleanly.
    /// Does not page anything in.
    pub fn is_valid_resident(&self, p: IVec3) -> Option<bool> {
        let coord = self.chunk_coord(p);
        let res = self.resident.read().unwrap();
        res.find(coord).map(|c| c.valid)
    }

    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.resident.read().unwrap().index.contains_key(&coord)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.read().unwrap().arena.len()
    }

    /// Pages in every chunk overlapping `region` (clipped to the world bound).
    pub fn prefetch(&self, region: &Region) {
        let Some(clipped) = region.intersection(&self.bounds) else {
            return;
        };
        for coord in chunks_overlapping(&clipped, self.side) {
            self.with_chunk(coord, None, |_| ());
        }
    }

    /// Pages in and pins every chunk overlapping `region`. Pinned chunks are
    /// never evicted until the returned guard drops. `None` when `cancel`
    /// fires part way; anything pinned so far is released.
    pub fn pin_region(&self, region: Region, cancel: &CancelToken) -> Option<PinnedRegion<'_>> {
        let mut pinned = PinnedRegion::new(self, region);
        let Some(clipped) = region.intersection(&self.bounds) else {
            return Some(pinned);
        };
        for coord in chunks_overlapping(&clipped, self.side) {
            if cancel.is_cancelled() {
                return None;
            }
            let chunk = self.with_chunk(coord, Some(cancel), |chunk| {
                chunk.pins.fetch_add(1, Ordering::AcqRel);
                Arc::clone(chunk)
            })?;
            pinned.push(chunk);
        }
        Some(pinned)
    }

    /// Pages out every unpinned resident chunk and returns how many stay
    /// behind pinned. Holds the write lock throughout so a concurrent miss
    /// cannot read storage before the flush lands.
    pub fn flush(&self) -> usize {
        let mut res = self.resident.write().unwrap();
        let victims: Vec<_> = res
            .arena
            .iter()
            .filter(|(_, c)| !c.is_pinned())
            .map(|(key, c)| (key, Arc::clone(c)))
            .collect();
        for (key, chunk) in &victims {
            res.arena.remove(*key);
            res.index.remove(&chunk.coord);
        }
        for (_, chunk) in &victims {
            self.page_out(chunk);
        }
        let kept = res.arena.len();
        drop(res);
        if !victims.is_empty() || kept > 0 {
            log::debug!(
                target: "volume",
                "flushed {} chunk(s), {kept} pinned chunk(s) kept",
                victims.len()
            );
        }
        kept
    }

    pub fn stats(&self) -> VolumeStats {
        let c = &self.counters;
        VolumeStats {
            resident: self.resident_count(),
            capacity: self.max_resident,
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            page_ins: c.page_ins.load(Ordering::Relaxed),
            page_outs: c.page_outs.load(Ordering::Relaxed),
            failed_page_ins: c.failed_page_ins.load(Ordering::Relaxed),
            failed_page_outs: c.failed_page_outs.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn notify_unpinned(&self) {
        let _guard = self.unpin_lock.lock().unwrap();
        self.unpinned.notify_all();
    }

    /// Runs `f` on the resident chunk for `coord`, paging it in first if
    /// needed. `f` runs while the resident set is locked, so the chunk cannot
    /// be evicted underneath it. `None` only when page-in was cancelled.
    fn with_chunk<R>(
        &self,
        coord: ChunkCoord,
        cancel: Option<&CancelToken>,
        f: impl FnOnce(&Arc<Chunk>) -> R,
    ) -> Option<R> {
        let mut missed = false;
        loop {
            {
                let res = self.resident.read().unwrap();
                if let Some(chunk) = res.find(coord) {
                    if !missed {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    }
                    self.touch(chunk);
                    return Some(f(chunk));
                }
            }
            if !missed {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                missed = true;
            }

            let claim = self.claim(coord, cancel)?;
            if self.is_resident(coord) {
                // Another thread finished paging it in while we waited.
                continue;
            }
            self.reserve_slot(coord, cancel)?;
            let Some(chunk) = self.load(coord, cancel) else {
                self.release_slot();
                return None;
            };
            let chunk = Arc::new(chunk);
            self.touch(&chunk);

            let mut res = self.resident.write().unwrap();
            res.reserved -= 1;
            let key = res.arena.insert(Arc::clone(&chunk));
            res.index.insert(coord, key);
            let r = f(&chunk);
            drop(res);
            drop(claim);
            return Some(r);
        }
    }

    /// Waits until no other thread is paging `coord` in, then claims it.
    /// Never called with the resident lock held.
    fn claim(&self, coord: ChunkCoord, cancel: Option<&CancelToken>) -> Option<LoadClaim<'_>> {
        let mut loading = self.loading.lock().unwrap();
        while !loading.insert(coord) {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            loading = self.loaded.wait_timeout(loading, PIN_WAIT).unwrap().0;
        }
        Some(LoadClaim {
            volume: self,
            coord,
        })
    }

    #[inline]
    fn touch(&self, chunk: &Chunk) {
        let t = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        chunk.last_access.store(t, Ordering::Relaxed);
    }

    /// Reserves room for one more chunk, evicting the LRU unpinned chunk if
    /// the set is full. The victim is paged out before the lock drops so a
    /// later miss on it reads what was written. Waits for an unpin when every
    /// resident chunk is pinned.
    fn reserve_slot(&self, coord: ChunkCoord, cancel: Option<&CancelToken>) -> Option<()> {
        let mut warned = false;
        loop {
            let mut res = self.resident.write().unwrap();
            if res.occupied() < self.max_resident {
                res.reserved += 1;
                return Some(());
            }
            if let Some((key, victim)) = Self::lru_victim(&res) {
                res.arena.remove(key);
                res.index.remove(&victim.coord);
                res.reserved += 1;
                log::trace!(target: "volume", "evicting {:?}", victim.coord);
                self.page_out(&victim);
                return Some(());
            }
            drop(res);
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            if !warned {
                log::warn!(
                    target: "volume",
                    "all {} resident chunks pinned; waiting to page in {:?}",
                    self.max_resident,
                    coord
                );
                warned = true;
            }
            let guard = self.unpin_lock.lock().unwrap();
            let _ = self.unpinned.wait_timeout(guard, PIN_WAIT).unwrap();
        }
    }

    fn release_slot(&self) {
        self.resident.write().unwrap().reserved -= 1;
        self.notify_unpinned();
    }

    fn lru_victim(res: &ResidentSet) -> Option<(SlotKey, Arc<Chunk>)> {
        res.arena
            .iter()
            .filter(|(_, c)| !c.is_pinned())
            .min_by_key(|(_, c)| c.last_access.load(Ordering::Relaxed))
            .map(|(key, c)| (key, Arc::clone(c)))
    }

    /// Pages `coord` in through the pager. Failures, pager panics included,
    /// leave an invalid all-air chunk.
    fn load(&self, coord: ChunkCoord, cancel: Option<&CancelToken>) -> Option<Chunk> {
        let mut buf = ChunkBuf::empty(coord, self.side as usize);
        let region = coord.region(self.side);
        let mut ctx = PageInContext {
            coord,
            region,
            voxels: &mut buf.voxels,
            cancel,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.pager.page_in(&mut ctx)))
            .unwrap_or_else(|_| Err(PageError::Generation("pager panicked".into())));
        let (valid, dirty) = match outcome {
            Ok(PageInOutcome::Loaded) => (true, false),
            Ok(PageInOutcome::Generated) => (true, true),
            Err(PageError::Cancelled) => return None,
            Err(e) => {
                log::warn!(target: "volume", "page-in of {coord:?} failed, treating as air: {e}");
                self.counters.failed_page_ins.fetch_add(1, Ordering::Relaxed);
                buf.voxels.fill(Voxel::AIR);
                (false, false)
            }
        };
        self.counters.page_ins.fetch_add(1, Ordering::Relaxed);
        Some(Chunk {
            coord,
            buf: RwLock::new(buf),
            last_access: AtomicU64::new(0),
            pins: AtomicUsize::new(0),
            dirty: AtomicBool::new(dirty),
            valid,
        })
    }

    /// Hands the chunk to the pager. The volume forgets the chunk whatever
    /// the outcome.
    fn page_out(&self, chunk: &Chunk) {
        let buf = chunk.buf.read().unwrap();
        let ctx = PageOutContext {
            coord: chunk.coord,
            region: chunk.coord.region(self.side),
            voxels: &buf.voxels,
            dirty: chunk.dirty.load(Ordering::Acquire),
        };
        self.counters.page_outs.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.pager.page_out(&ctx)))
            .unwrap_or_else(|_| Err(PageError::Io(std::io::Error::other("pager panicked"))));
        match outcome {
            Ok(PageOutcome::Persisted) => {
                log::trace!(target: "volume", "persisted {:?}", chunk.coord);
            }
            Ok(PageOutcome::Discarded) => {}
            Err(e) => {
                self.counters.failed_page_outs.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    target: "volume",
                    "page-out of {:?} failed, chunk data lost: {e}",
                    chunk.coord
                );
            }
        }
    }
}

impl Drop for PagedVolume {
    fn drop(&mut self) {
        // Pins borrow the volume, so nothing is pinned here.
        self.flush();
    }
}
