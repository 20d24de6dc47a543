//! A* search over walkable voxel cells.
//!
//! A cell is walkable when it is inside the world bound, not solid, and the
//! cell below it is solid. Moves go one cell along x or z, stepping up or down
//! at most one voxel. Every move costs one.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::HashMap;
use strata_geom::IVec3;

use crate::volume::PagedVolume;

/// Cells expanded before the search gives up.
pub const MAX_PATH_NODES: usize = 16_384;

const STEPS: [IVec3; 4] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

fn is_walkable(volume: &PagedVolume, p: IVec3) -> bool {
    volume.bounds().contains_point(p)
        && !volume.voxel_at(p).is_solid()
        && volume.voxel_at(p - IVec3::new(0, 1, 0)).is_solid()
}

fn heuristic(a: IVec3, b: IVec3) -> u32 {
    let d = b - a;
    let flat = d.x.unsigned_abs() + d.z.unsigned_abs();
    flat.max(d.y.unsigned_abs())
}

/// Walkable cells one move away from `p`.
fn neighbours(volume: &PagedVolume, p: IVec3) -> impl Iterator<Item = IVec3> + '_ {
    let up = IVec3::new(0, 1, 0);
    let headroom = !volume.voxel_at(p + up).is_solid();
    STEPS.into_iter().filter_map(move |step| {
        let level = p + step;
        if is_walkable(volume, level) {
            return Some(level);
        }
        if volume.voxel_at(level).is_solid() {
            let climb = level + up;
            return (headroom && is_walkable(volume, climb)).then_some(climb);
        }
        let drop = level - up;
        is_walkable(volume, drop).then_some(drop)
    })
}

/// Shortest walkable route from `start` to `end`, both ends included.
/// `None` when either end is not walkable, no route exists, or the search
/// expands more than [`MAX_PATH_NODES`] cells.
pub fn find_path(volume: &PagedVolume, start: IVec3, end: IVec3) -> Option<Vec<IVec3>> {
    if !is_walkable(volume, start) || !is_walkable(volume, end) {
        return None;
    }

    let mut open = BinaryHeap::new();
    let mut cost: HashMap<IVec3, u32> = HashMap::new();
    let mut came_from: HashMap<IVec3, IVec3> = HashMap::new();
    cost.insert(start, 0);
    open.push(Reverse((heuristic(start, end), 0u32, start)));

    let mut expanded = 0;
    while let Some(Reverse((_, g, p))) = open.pop() {
        if p == end {
            return Some(walk_back(&came_from, end));
        }
        // Skip entries superseded by a cheaper route.
        if cost.get(&p).is_some_and(|&best| best < g) {
            continue;
        }
        expanded += 1;
        if expanded > MAX_PATH_NODES {
            log::debug!(
                target: "path",
                "gave up on {start:?} -> {end:?} after {MAX_PATH_NODES} cells"
            );
            return None;
        }
        for n in neighbours(volume, p) {
            let next = g + 1;
            if cost.get(&n).is_some_and(|&best| best <= next) {
                continue;
            }
            cost.insert(n, next);
            came_from.insert(n, p);
            open.push(Reverse((next + heuristic(n, end), next, n)));
        }
    }
    None
}

/// Follows predecessors from `end` back to the start, which has none.
fn walk_back(came_from: &HashMap<IVec3, IVec3>, end: IVec3) -> Vec<IVec3> {
    let mut path = vec![end];
    let mut p = end;
    while let Some(&prev) = came_from.get(&p) {
        path.push(prev);
        p = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_never_overestimates_a_climb() {
        assert_eq!(heuristic(IVec3::ZERO, IVec3::new(3, 0, -4)), 7);
        assert_eq!(heuristic(IVec3::ZERO, IVec3::new(1, 5, 0)), 5);
        assert_eq!(heuristic(IVec3::new(2, 2, 2), IVec3::new(2, 2, 2)), 0);
    }
}
