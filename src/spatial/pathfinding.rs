//! A* pathfinding on the 8-connected tile grid
//!
//! Walkability is read from the live map on every expansion, so a search
//! always reflects the world as it is this tick. Searches are bounded: when
//! the goal is not reached within the expansion budget the route to the
//! closest node seen so far is returned instead.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};
use ordered_float::OrderedFloat;
use rand::Rng;

use crate::core::types::{Direction, GridPos};
use crate::world::map::TileMap;
use crate::world::World;

/// Step cost multiplier for entering a road tile
pub const ROAD_COST_FACTOR: f32 = 0.7;

/// Heap entry: (f-cost, insertion counter, cell). Wrapped in `Reverse` for a
/// min-heap; the counter breaks f-cost ties in insertion order.
type OpenEntry = Reverse<(OrderedFloat<f32>, u64, GridPos)>;

/// Octile distance scaled by the road discount so it never overestimates
fn heuristic(from: GridPos, to: GridPos) -> f32 {
    let dx = (from.x - to.x).abs() as f32;
    let dy = (from.y - to.y).abs() as f32;
    let (short, long) = if dx < dy { (dx, dy) } else { (dy, dx) };
    (long - short + short * std::f32::consts::SQRT_2) * ROAD_COST_FACTOR
}

fn step_cost(map: &TileMap, to: GridPos, direction: Direction) -> f32 {
    let base = if direction.is_diagonal() {
        std::f32::consts::SQRT_2
    } else {
        1.0
    };
    if map.is_road(to) {
        base * ROAD_COST_FACTOR
    } else {
        base
    }
}

/// Find a path from `start` toward `goal`.
///
/// Returns the cells to walk, excluding `start`. The list ends at `goal` when
/// it was reached within `max_expansions`, otherwise at the explored cell
/// closest to the goal. Empty when no progress is possible.
pub fn find_path(
    map: &TileMap,
    start: GridPos,
    goal: GridPos,
    max_expansions: usize,
) -> Vec<GridPos> {
    if start == goal {
        return Vec::new();
    }

    let budget = max_expansions.max(1);
    let mut open_set: BinaryHeap<OpenEntry> = BinaryHeap::new();
    let mut came_from: AHashMap<GridPos, GridPos> = AHashMap::new();
    let mut g_scores: AHashMap<GridPos, f32> = AHashMap::new();
    let mut closed: AHashSet<GridPos> = AHashSet::new();
    let mut counter: u64 = 0;

    let mut best = start;
    let mut best_h = heuristic(start, goal);

    g_scores.insert(start, 0.0);
    open_set.push(Reverse((OrderedFloat(best_h), counter, start)));

    let mut expansions = 0;
    while let Some(Reverse((_, _, current))) = open_set.pop() {
        if current == goal {
            return reconstruct_path(&came_from, current);
        }
        if !closed.insert(current) {
            continue;
        }

        let current_g = *g_scores.get(&current).unwrap_or(&f32::INFINITY);

        for direction in Direction::ALL {
            let neighbor = current.step(direction);
            if closed.contains(&neighbor) || !map.is_walkable(neighbor) {
                continue;
            }

            let tentative_g = current_g + step_cost(map, neighbor, direction);
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current);
                g_scores.insert(neighbor, tentative_g);

                let h = heuristic(neighbor, goal);
                if h < best_h {
                    best_h = h;
                    best = neighbor;
                }

                counter += 1;
                open_set.push(Reverse((OrderedFloat(tentative_g + h), counter, neighbor)));
            }
        }

        expansions += 1;
        if expansions >= budget {
            break;
        }
    }

    if best == start {
        return Vec::new();
    }
    reconstruct_path(&came_from, best)
}

/// Walk `came_from` back to the start, excluding the start itself
fn reconstruct_path(came_from: &AHashMap<GridPos, GridPos>, mut current: GridPos) -> Vec<GridPos> {
    let mut path = Vec::new();
    while let Some(&prev) = came_from.get(&current) {
        path.push(current);
        current = prev;
    }
    path.reverse();
    path
}

/// Sum of step costs along a path that starts next to `start`
pub fn path_cost(map: &TileMap, start: GridPos, path: &[GridPos]) -> f32 {
    let mut cost = 0.0;
    let mut previous = start;
    for &cell in path {
        let diagonal = previous.x != cell.x && previous.y != cell.y;
        let base = if diagonal { std::f32::consts::SQRT_2 } else { 1.0 };
        cost += if map.is_road(cell) {
            base * ROAD_COST_FACTOR
        } else {
            base
        };
        previous = cell;
    }
    cost
}

/// Compass direction from one cell toward another. Same cell yields north.
pub fn direction_to(from: GridPos, to: GridPos) -> Direction {
    let dx = (to.x - from.x) as f32;
    let dy = (to.y - from.y) as f32;
    if dx == 0.0 && dy == 0.0 {
        return Direction::North;
    }
    let mut angle = dy.atan2(dx).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }
    Direction::from_octant(((angle + 22.5) / 45.0) as usize)
}

/// Score the eight neighbors for a reflexive escape: no smoke +5, no burning
/// structure +10, road +2, plus a random tie-break below 1. Unwalkable
/// neighbors are skipped; north is returned when nothing is walkable.
pub fn find_safe_direction<R: Rng>(world: &World, from: GridPos, rng: &mut R) -> Direction {
    let mut best_dir = Direction::North;
    let mut best_score = f32::NEG_INFINITY;

    for direction in Direction::ALL {
        let cell = from.step(direction);
        let Some(tile) = world.map.tile(cell) else {
            continue;
        };
        if !tile.is_walkable() {
            continue;
        }

        let mut score = 0.0;
        if !tile.smoke {
            score += 5.0;
        }
        if !world.burning_at(cell) {
            score += 10.0;
        }
        if tile.is_road() {
            score += 2.0;
        }
        score += rng.gen::<f32>();

        if score > best_score {
            best_score = score;
            best_dir = direction;
        }
    }

    best_dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::map::Terrain;
    use crate::world::WorldObject;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn open_map() -> TileMap {
        TileMap::new(10, 10, Terrain::Grass)
    }

    #[test]
    fn test_pathfind_diagonal_is_optimal() {
        let map = open_map();
        let path = find_path(&map, GridPos::new(0, 0), GridPos::new(5, 5), 1000);

        assert_eq!(path.len(), 5);
        for (i, cell) in path.iter().enumerate() {
            let step = i as i32 + 1;
            assert_eq!(*cell, GridPos::new(step, step));
        }
    }

    #[test]
    fn test_path_excludes_start() {
        let map = open_map();
        let start = GridPos::new(2, 2);
        let path = find_path(&map, start, GridPos::new(6, 2), 1000);

        assert!(!path.contains(&start));
        assert_eq!(path.last(), Some(&GridPos::new(6, 2)));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_pathfind_around_obstacle() {
        let mut map = open_map();
        for y in 0..8 {
            map.set_terrain(GridPos::new(4, y), Terrain::Wall);
        }

        let path = find_path(&map, GridPos::new(0, 0), GridPos::new(8, 0), 1000);

        assert_eq!(path.last(), Some(&GridPos::new(8, 0)));
        assert!(path.iter().all(|p| map.is_walkable(*p)));
        assert!(path.iter().any(|p| p.y >= 8));
    }

    #[test]
    fn test_partial_path_with_single_expansion() {
        let map = open_map();
        let path = find_path(&map, GridPos::new(0, 0), GridPos::new(9, 9), 1);

        assert!(!path.is_empty());
        assert_eq!(path[0], GridPos::new(1, 1));
    }

    #[test]
    fn test_unreachable_goal_returns_closest_explored() {
        let mut map = open_map();
        let goal = GridPos::new(8, 8);
        for direction in Direction::ALL {
            map.set_terrain(goal.step(direction), Terrain::Water);
        }

        let path = find_path(&map, GridPos::new(0, 0), goal, 10_000);

        assert!(!path.is_empty());
        assert!(!path.contains(&goal));
        let end = *path.last().unwrap();
        assert_eq!(end.chebyshev(&goal), 2);
    }

    #[test]
    fn test_boxed_in_start_returns_empty() {
        let mut map = open_map();
        let start = GridPos::new(5, 5);
        for direction in Direction::ALL {
            map.set_terrain(start.step(direction), Terrain::Wall);
        }

        assert!(find_path(&map, start, GridPos::new(0, 0), 100).is_empty());
    }

    #[test]
    fn test_same_start_and_goal() {
        let map = open_map();
        assert!(find_path(&map, GridPos::new(3, 3), GridPos::new(3, 3), 10).is_empty());
    }

    #[test]
    fn test_pathfind_prefers_road() {
        let mut map = open_map();
        // A road detour one row down beats the straight grass line
        for x in 0..10 {
            map.set_terrain(GridPos::new(x, 1), Terrain::Road);
        }

        let start = GridPos::new(0, 0);
        let goal = GridPos::new(9, 0);
        let path = find_path(&map, start, goal, 1000);

        assert_eq!(path.last(), Some(&goal));
        assert!(path.iter().filter(|p| map.is_road(**p)).count() >= 6);
        assert!(path_cost(&map, start, &path) < 9.0);
    }

    #[test]
    fn test_path_respects_live_map_changes() {
        let mut map = open_map();
        let start = GridPos::new(0, 5);
        let goal = GridPos::new(9, 5);
        let first = find_path(&map, start, goal, 1000);
        assert!(first.contains(&GridPos::new(5, 5)));

        map.set_terrain(GridPos::new(5, 5), Terrain::Wall);
        let second = find_path(&map, start, goal, 1000);
        assert!(!second.contains(&GridPos::new(5, 5)));
        assert_eq!(second.last(), Some(&goal));
    }

    #[test]
    fn test_direction_to_octants() {
        let origin = GridPos::new(5, 5);
        assert_eq!(direction_to(origin, GridPos::new(6, 5)), Direction::East);
        assert_eq!(direction_to(origin, GridPos::new(6, 6)), Direction::Southeast);
        assert_eq!(direction_to(origin, GridPos::new(5, 6)), Direction::South);
        assert_eq!(direction_to(origin, GridPos::new(4, 6)), Direction::Southwest);
        assert_eq!(direction_to(origin, GridPos::new(4, 5)), Direction::West);
        assert_eq!(direction_to(origin, GridPos::new(4, 4)), Direction::Northwest);
        assert_eq!(direction_to(origin, GridPos::new(5, 4)), Direction::North);
        assert_eq!(direction_to(origin, GridPos::new(6, 4)), Direction::Northeast);
        assert_eq!(direction_to(origin, origin), Direction::North);
    }

    #[test]
    fn test_direction_to_matches_step_for_neighbors() {
        let origin = GridPos::new(3, 3);
        for direction in Direction::ALL {
            assert_eq!(direction_to(origin, origin.step(direction)), direction);
        }
    }

    #[test]
    fn test_safe_direction_avoids_smoke_and_fire() {
        let mut world = World::new(TileMap::new(7, 7, Terrain::Grass));
        let center = GridPos::new(3, 3);
        let id = world.place(WorldObject::new("Shed", GridPos::new(3, 2)).flammable());
        world.ignite(id, 5.0);
        // Clear the smoke on one side only
        for y in 1..=5 {
            if let Some(tile) = world.map.tile_mut(GridPos::new(2, y)) {
                tile.smoke = false;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let dir = find_safe_direction(&world, center, &mut rng);
            assert_eq!(dir.delta().0, -1, "expected a westward escape, got {}", dir);
        }
    }

    #[test]
    fn test_safe_direction_prefers_road() {
        let mut world = World::new(TileMap::new(5, 5, Terrain::Grass));
        world.map.set_terrain(GridPos::new(3, 2), Terrain::Road);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dir = find_safe_direction(&world, GridPos::new(2, 2), &mut rng);
        assert_eq!(dir, Direction::East);
    }
}
