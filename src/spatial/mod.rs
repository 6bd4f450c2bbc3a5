//! Grid search utilities used by the autopilot and the action executor

pub mod pathfinding;

pub use pathfinding::{direction_to, find_path, find_safe_direction, path_cost, ROAD_COST_FACTOR};
