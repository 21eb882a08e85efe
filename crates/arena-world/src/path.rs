//! A* pathfinding on the 4-connected grid.
//!
//! Step cost is the weight of the *destination* tile (default 1), so
//! with uniform weights the path cost equals the number of steps. The
//! Manhattan heuristic is admissible on a 4-connected grid for any
//! weights >= 1, so returned paths are cost-minimal.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use arena_types::Waypoint;

use crate::tile::TileMap;

/// The 4-connected neighborhood.
const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// A found path. `waypoints[0]` is the start, the last waypoint is the
/// goal, every consecutive pair is 4-adjacent, and `cost` is the sum of
/// destination-tile weights along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub waypoints: Vec<Waypoint>,
    pub cost: u32,
}

/// Find a minimal-cost path from `start` to `goal`.
///
/// Returns `None` when either endpoint is out of bounds or blocked, or
/// when no 4-connected passable route exists. A degenerate request with
/// `start == goal` returns the trivial single-waypoint path without a
/// passability check on that tile.
///
/// Ties between equal-cost frontier nodes break by insertion order, so
/// the result is deterministic for identical inputs.
pub fn find_path(map: &TileMap, start: Waypoint, goal: Waypoint) -> Option<Path> {
    if start == goal {
        return Some(Path {
            waypoints: vec![start],
            cost: 0,
        });
    }

    if !map.is_passable(start.x, start.y) || !map.is_passable(goal.x, goal.y) {
        return None;
    }

    // Frontier ordered by (f, insertion sequence). g-scores live in
    // `best_g`; stale heap entries are skipped on pop.
    let mut open: BinaryHeap<Reverse<(u32, u64, (i32, i32))>> = BinaryHeap::new();
    let mut best_g: HashMap<(i32, i32), u32> = HashMap::new();
    let mut came_from: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
    let mut closed: HashSet<(i32, i32)> = HashSet::new();
    let mut sequence: u64 = 0;

    let start_key = (start.x, start.y);
    let goal_key = (goal.x, goal.y);

    best_g.insert(start_key, 0);
    open.push(Reverse((heuristic(start, goal), sequence, start_key)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        if !closed.insert(current) {
            continue;
        }
        if current == goal_key {
            return Some(reconstruct(&came_from, &best_g, start_key, goal_key));
        }

        let g_here = match best_g.get(&current) {
            Some(&g) => g,
            None => continue,
        };

        for (dx, dy) in NEIGHBORS {
            let next = (current.0 + dx, current.1 + dy);
            if closed.contains(&next) || !map.is_passable(next.0, next.1) {
                continue;
            }

            let tentative = g_here + map.weight(next.0, next.1);
            if best_g.get(&next).is_none_or(|&g| tentative < g) {
                best_g.insert(next, tentative);
                came_from.insert(next, current);
                sequence += 1;
                let f = tentative
                    + heuristic(Waypoint::new(next.0, next.1), goal);
                open.push(Reverse((f, sequence, next)));
            }
        }
    }

    None
}

const fn heuristic(from: Waypoint, to: Waypoint) -> u32 {
    from.manhattan(to).unsigned_abs()
}

fn reconstruct(
    came_from: &HashMap<(i32, i32), (i32, i32)>,
    best_g: &HashMap<(i32, i32), u32>,
    start: (i32, i32),
    goal: (i32, i32),
) -> Path {
    let mut waypoints = Vec::new();
    let mut current = goal;
    waypoints.push(Waypoint::new(current.0, current.1));
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                current = prev;
                waypoints.push(Waypoint::new(current.0, current.1));
            }
            // Unreachable for a goal popped from the frontier.
            None => break,
        }
    }
    waypoints.reverse();
    Path {
        waypoints,
        cost: best_g.get(&goal).copied().unwrap_or(0),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mapgen;
    use crate::tile::TileKind;

    fn wp(x: i32, y: i32) -> Waypoint {
        Waypoint::new(x, y)
    }

    fn assert_path_is_wellformed(map: &TileMap, path: &Path) {
        for pair in path.waypoints.windows(2) {
            assert_eq!(pair[0].manhattan(pair[1]), 1, "waypoints must be 4-adjacent");
        }
        for w in &path.waypoints {
            assert!(map.is_passable(w.x, w.y), "waypoint off passable tiles");
        }
    }

    #[test]
    fn straight_line_on_open_map() {
        let map = mapgen::create_empty(5, 5);
        let path = find_path(&map, wp(0, 0), wp(4, 0)).unwrap();
        assert_eq!(path.cost, 4);
        assert_eq!(path.waypoints.first(), Some(&wp(0, 0)));
        assert_eq!(path.waypoints.last(), Some(&wp(4, 0)));
        assert_path_is_wellformed(&map, &path);
    }

    #[test]
    fn uniform_cost_equals_manhattan_plus_detours() {
        // Column x=2 blocked except at (2,4): the only way across is the
        // bottom gap, a 2-cells-per-step detour on each side.
        let mut map = mapgen::create_empty(5, 5);
        for y in 0..4 {
            map.set_kind(2, y, TileKind::Blocked);
        }
        let path = find_path(&map, wp(0, 0), wp(4, 0)).unwrap();
        let manhattan = 4;
        let detour_steps = (path.cost - manhattan) / 2;
        assert_eq!(path.cost, manhattan + 2 * detour_steps);
        assert_eq!(path.cost, 12); // down 4, across, up 4
        assert_path_is_wellformed(&map, &path);
    }

    #[test]
    fn no_route_returns_none() {
        let mut map = mapgen::create_empty(5, 5);
        for y in 0..5 {
            map.set_kind(2, y, TileKind::Blocked);
        }
        assert!(find_path(&map, wp(0, 0), wp(4, 0)).is_none());
    }

    #[test]
    fn blocked_endpoint_returns_none() {
        let mut map = mapgen::create_empty(3, 3);
        map.set_kind(2, 2, TileKind::Blocked);
        assert!(find_path(&map, wp(0, 0), wp(2, 2)).is_none());
        assert!(find_path(&map, wp(2, 2), wp(0, 0)).is_none());
    }

    #[test]
    fn oob_endpoint_returns_none() {
        let map = mapgen::create_empty(3, 3);
        assert!(find_path(&map, wp(0, 0), wp(3, 0)).is_none());
        assert!(find_path(&map, wp(-1, 0), wp(1, 1)).is_none());
    }

    #[test]
    fn trivial_path_skips_passability_check() {
        // Matches the reference behavior: start == goal short-circuits
        // before the endpoint checks, even on a blocked tile.
        let mut map = mapgen::create_empty(3, 3);
        map.set_kind(1, 1, TileKind::Blocked);
        let path = find_path(&map, wp(1, 1), wp(1, 1)).unwrap();
        assert_eq!(path.waypoints, vec![wp(1, 1)]);
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn weighted_tiles_are_avoided() {
        // A 3-wide corridor where the middle row is cheap except for a
        // single expensive tile; the optimal path steps around it.
        let mut map = mapgen::create_empty(5, 3);
        map.set_weight(2, 1, 10);
        let path = find_path(&map, wp(0, 1), wp(4, 1)).unwrap();
        assert!(path.cost < 4 + 9, "should route around the weight-10 tile");
        assert_eq!(path.cost, 6);
        assert!(!path.waypoints.contains(&wp(2, 1)));
        assert_path_is_wellformed(&map, &path);
    }

    #[test]
    fn deterministic_across_runs() {
        let mut map = mapgen::create_empty(9, 9);
        mapgen::add_random_obstacles(&mut map, 0.2, Some(7));
        let a = find_path(&map, wp(0, 0), wp(8, 8));
        let b = find_path(&map, wp(0, 0), wp(8, 8));
        assert_eq!(a, b);
    }

    #[test]
    fn cost_never_below_manhattan() {
        let mut map = mapgen::create_empty(10, 10);
        mapgen::add_random_obstacles(&mut map, 0.15, Some(42));
        for goal in [wp(9, 9), wp(9, 0), wp(0, 9), wp(5, 5)] {
            if let Some(path) = find_path(&map, wp(0, 0), goal) {
                assert!(path.cost >= wp(0, 0).manhattan(goal).unsigned_abs());
                assert_path_is_wellformed(&map, &path);
            }
        }
    }
}
