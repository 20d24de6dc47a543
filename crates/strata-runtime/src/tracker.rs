use std::sync::Mutex;

use hashbrown::HashMap;
use strata_geom::IVec3;
use strata_mesh_cpu::ChunkMeshes;

use crate::queue::ConcurrentQueue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileState {
    Pending,
    InFlight,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTile {
    pub pos: IVec3,
    pub ticket: u64,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    state: TileState,
    ticket: u64,
}

struct Inner {
    tiles: HashMap<IVec3, Entry>,
    next_ticket: u64,
    /// Results for tickets below this are dropped instead of queued.
    floor: u64,
    closed: bool,
}

/// Dedup set of tiles that are pending, in flight, or completed but not yet
/// popped, plus the pending queue. Every transition happens under the one
/// tracker lock; the pending and result queues are only locked after it.
pub struct ExtractionTracker {
    inner: Mutex<Inner>,
    pending: ConcurrentQueue<PendingTile>,
}

impl Default for ExtractionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tiles: HashMap::new(),
                next_ticket: 1,
                floor: 1,
                closed: false,
            }),
            pending: ConcurrentQueue::new(),
        }
    }

    pub fn pending(&self) -> &ConcurrentQueue<PendingTile> {
        &self.pending
    }

    /// Inserts `pos` as pending and queues it. `false` if already tracked
    /// or the tracker is closed.
    pub fn schedule(&self, pos: IVec3) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed || inner.tiles.contains_key(&pos) {
            return false;
        }
        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        inner.tiles.insert(
            pos,
            Entry {
                state: TileState::Pending,
                ticket,
            },
        );
        self.pending.push(PendingTile { pos, ticket });
        true
    }

    /// Pending → InFlight. `false` when the job went stale while queued.
    pub fn begin(&self, job: PendingTile) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.tiles.get_mut(&job.pos) {
            Some(e) if e.ticket == job.ticket && e.state == TileState::Pending => {
                e.state = TileState::InFlight;
                true
            }
            _ => false,
        }
    }

    /// InFlight → Completed and queues the result in one step, so a consumer
    /// never pops a result whose entry still reads InFlight. Results for
    /// tiles released mid-flight are still queued; results from before a
    /// reset or after close are dropped.
    pub fn complete(
        &self,
        job: PendingTile,
        meshes: ChunkMeshes,
        results: &ConcurrentQueue<ChunkMeshes>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed || job.ticket < inner.floor {
            return;
        }
        if let Some(e) = inner.tiles.get_mut(&job.pos) {
            if e.ticket == job.ticket {
                e.state = TileState::Completed;
            }
        }
        results.push(meshes);
    }

    /// Drops the entry for `job` if it still owns it (failed or cancelled
    /// extraction).
    pub fn release(&self, job: PendingTile) {
        let mut inner = self.inner.lock().unwrap();
        if inner.tiles.get(&job.pos).is_some_and(|e| e.ticket == job.ticket) {
            inner.tiles.remove(&job.pos);
        }
    }

    /// Popped → Unscheduled, but only for the entry that produced `meshes`.
    pub fn on_popped(&self, meshes: &ChunkMeshes) {
        let pos = meshes.translation();
        let mut inner = self.inner.lock().unwrap();
        if inner
            .tiles
            .get(&pos)
            .is_some_and(|e| e.ticket == meshes.ticket && e.state == TileState::Completed)
        {
            inner.tiles.remove(&pos);
        }
    }

    /// Forgets `pos` whatever its state; a pending job is pulled from the
    /// queue as well.
    pub fn forget(&self, pos: IVec3) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(entry) = inner.tiles.remove(&pos) else {
            return false;
        };
        if entry.state == TileState::Pending {
            self.pending.retain(|t| t.ticket != entry.ticket);
        }
        true
    }

    pub fn reorder(&self, around: IVec3) {
        let _inner = self.inner.lock().unwrap();
        self.pending.sort_by_key(|t| t.pos.distance_sq(around));
    }

    /// Drops every entry and pending job; in-flight results are discarded
    /// when they land.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.tiles.clear();
        inner.floor = inner.next_ticket;
        self.pending.clear();
    }

    /// Clears and refuses further scheduling.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.tiles.clear();
        inner.floor = inner.next_ticket;
        self.pending.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self, pos: IVec3) -> Option<TileState> {
        self.inner.lock().unwrap().tiles.get(&pos).map(|e| e.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_mesh_cpu::Mesh;

    fn result_for(job: PendingTile) -> ChunkMeshes {
        ChunkMeshes {
            opaque: Mesh::new(job.pos),
            water: Mesh::new(job.pos),
            ticket: job.ticket,
        }
    }

    #[test]
    fn full_lifecycle_returns_to_unscheduled() {
        let t = ExtractionTracker::new();
        let results = ConcurrentQueue::new();
        let pos = IVec3::new(64, 0, -64);
        assert!(t.schedule(pos));
        assert!(!t.schedule(pos));
        let job = t.pending().pop().unwrap();
        assert!(t.begin(job));
        assert_eq!(t.state(pos), Some(TileState::InFlight));
        t.complete(job, result_for(job), &results);
        assert_eq!(t.state(pos), Some(TileState::Completed));
        assert!(!t.schedule(pos));
        let popped = results.pop().unwrap();
        t.on_popped(&popped);
        assert_eq!(t.state(pos), None);
        assert!(t.schedule(pos));
    }

    #[test]
    fn stale_result_does_not_release_new_entry() {
        let t = ExtractionTracker::new();
        let results = ConcurrentQueue::new();
        let pos = IVec3::ZERO;
        t.schedule(pos);
        let old = t.pending().pop().unwrap();
        t.begin(old);
        assert!(t.forget(pos));
        assert!(t.schedule(pos));
        t.complete(old, result_for(old), &results);
        assert_eq!(t.state(pos), Some(TileState::Pending));
        t.on_popped(&results.pop().unwrap());
        assert_eq!(t.state(pos), Some(TileState::Pending));
    }

    #[test]
    fn forgetting_pending_tile_pulls_it_from_the_queue() {
        let t = ExtractionTracker::new();
        t.schedule(IVec3::ZERO);
        t.schedule(IVec3::splat(64));
        assert!(t.forget(IVec3::ZERO));
        assert!(!t.forget(IVec3::ZERO));
        assert_eq!(t.pending().len(), 1);
        assert_eq!(t.pending().pop().map(|j| j.pos), Some(IVec3::splat(64)));
    }

    #[test]
    fn clear_discards_in_flight_results() {
        let t = ExtractionTracker::new();
        let results = ConcurrentQueue::new();
        t.schedule(IVec3::ZERO);
        let job = t.pending().pop().unwrap();
        t.begin(job);
        t.clear();
        t.complete(job, result_for(job), &results);
        assert!(results.is_empty());
        assert!(t.is_empty());
        t.close();
        assert!(!t.schedule(IVec3::ZERO));
    }

    #[test]
    fn reorder_is_nearest_first_and_stable() {
        let t = ExtractionTracker::new();
        let tiles = [
            IVec3::new(128, 0, 0),
            IVec3::new(0, 0, 64),
            IVec3::new(64, 0, 0),
            IVec3::ZERO,
        ];
        for p in tiles {
            t.schedule(p);
        }
        t.reorder(IVec3::ZERO);
        let order: Vec<_> = std::iter::from_fn(|| t.pending().pop().map(|j| j.pos)).collect();
        assert_eq!(order, vec![tiles[3], tiles[1], tiles[2], tiles[0]]);
    }
}
