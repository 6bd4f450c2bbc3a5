//! Tile grid queried live by movement and pathfinding

use crate::core::types::GridPos;
use crate::world::items::Item;
use crate::world::objects::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Road,
    Plaza,
    Dirt,
    Grass,
    ShallowWater,
    Water,
    Wall,
    Building,
    /// What a collapsed building leaves behind
    Rubble,
}

impl Terrain {
    pub fn is_walkable(&self) -> bool {
        !matches!(self, Terrain::Water | Terrain::Wall | Terrain::Building)
    }

    /// Ticks of effort to enter a tile of this terrain
    pub fn movement_cost(&self) -> f32 {
        match self {
            Terrain::Road | Terrain::Plaza => 1.0,
            Terrain::Dirt => 1.2,
            Terrain::Grass => 1.3,
            Terrain::ShallowWater => 2.5,
            Terrain::Rubble => 3.0,
            Terrain::Water | Terrain::Wall | Terrain::Building => f32::INFINITY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Terrain::Road => "road",
            Terrain::Plaza => "plaza",
            Terrain::Dirt => "dirt",
            Terrain::Grass => "grass",
            Terrain::ShallowWater => "shallow water",
            Terrain::Water => "water",
            Terrain::Wall => "wall",
            Terrain::Building => "building",
            Terrain::Rubble => "rubble",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub terrain: Terrain,
    /// Object standing on this tile, if any
    pub object: Option<ObjectId>,
    /// Set while a solid object occupies the tile
    pub blocked: bool,
    pub smoke: bool,
    pub ground_items: Vec<Item>,
}

impl Tile {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            object: None,
            blocked: false,
            smoke: false,
            ground_items: Vec::new(),
        }
    }

    pub fn is_walkable(&self) -> bool {
        self.terrain.is_walkable() && !self.blocked
    }

    pub fn is_road(&self) -> bool {
        self.terrain == Terrain::Road
    }

    pub fn movement_cost(&self) -> f32 {
        if self.blocked {
            f32::INFINITY
        } else {
            self.terrain.movement_cost()
        }
    }
}

/// Row-major tile grid
#[derive(Debug, Clone)]
pub struct TileMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileMap {
    pub fn new(width: i32, height: i32, terrain: Terrain) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![Tile::new(terrain); (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: GridPos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, pos: GridPos) -> Option<&mut Tile> {
        self.index(pos).map(move |i| &mut self.tiles[i])
    }

    pub fn set_terrain(&mut self, pos: GridPos, terrain: Terrain) {
        if let Some(tile) = self.tile_mut(pos) {
            tile.terrain = terrain;
        }
    }

    /// Paint a filled rectangle, clipped to the map
    pub fn fill(&mut self, from: GridPos, to: GridPos, terrain: Terrain) {
        for y in from.y.min(to.y)..=from.y.max(to.y) {
            for x in from.x.min(to.x)..=from.x.max(to.x) {
                self.set_terrain(GridPos::new(x, y), terrain);
            }
        }
    }

    /// Out-of-bounds positions are never walkable
    pub fn is_walkable(&self, pos: GridPos) -> bool {
        self.tile(pos).map(Tile::is_walkable).unwrap_or(false)
    }

    pub fn is_road(&self, pos: GridPos) -> bool {
        self.tile(pos).map(Tile::is_road).unwrap_or(false)
    }

    pub fn has_smoke(&self, pos: GridPos) -> bool {
        self.tile(pos).map(|t| t.smoke).unwrap_or(false)
    }

    pub fn clear_smoke(&mut self) {
        for tile in &mut self.tiles {
            tile.smoke = false;
        }
    }
}
