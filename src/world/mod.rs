//! The world collaborator: tiles, placed objects and the item catalog
//!
//! The decision pipeline treats the world as a read-mostly oracle. Mutation
//! happens through the action executor and the tick loop only.

pub mod items;
pub mod map;
pub mod objects;

pub use items::{Item, ItemCatalog, ItemKind, ItemProps, Recipe};
pub use map::{Terrain, Tile, TileMap};
pub use objects::{
    Capabilities, CraftingStation, Flammable, Interactable, InteractionKind, ObjectId,
    Structural, WaterSource, WorldObject, WorldObjects,
};

use crate::core::config::WorldConfig;
use crate::core::types::{Direction, GridPos};
use rand::Rng;

/// Tiles of smoke around each burning object, in every direction
const SMOKE_RADIUS: i32 = 2;

/// What a pass of `tick_fires` changed
#[derive(Debug, Clone, PartialEq)]
pub enum FireChange {
    /// Sparks set a neighboring object alight
    Spread { name: String, position: GridPos },
    BurnedOut { name: String, position: GridPos },
    /// Burned to zero hp and left rubble behind
    Collapsed { name: String, position: GridPos },
}

#[derive(Debug, Clone)]
pub struct World {
    pub map: TileMap,
    pub objects: WorldObjects,
    pub catalog: ItemCatalog,
    /// Maintained by the day cycle in the tick loop
    pub is_night: bool,
}

impl World {
    pub fn new(map: TileMap) -> Self {
        Self {
            map,
            objects: WorldObjects::new(),
            catalog: ItemCatalog::with_defaults(),
            is_night: false,
        }
    }

    /// Place an object and register it on its tile
    pub fn place(&mut self, object: WorldObject) -> ObjectId {
        let pos = object.position;
        let solid = object.solid;
        let id = self.objects.add(object);
        if let Some(tile) = self.map.tile_mut(pos) {
            tile.object = Some(id);
            tile.blocked |= solid;
        }
        id
    }

    pub fn object_at(&self, pos: GridPos) -> Option<&WorldObject> {
        let id = self.map.tile(pos)?.object?;
        self.objects.get(id)
    }

    /// A burning object stands on this tile
    pub fn burning_at(&self, pos: GridPos) -> bool {
        self.object_at(pos)
            .map(|obj| obj.capabilities.is_burning())
            .unwrap_or(false)
    }

    pub fn is_walkable(&self, pos: GridPos) -> bool {
        self.map.is_walkable(pos)
    }

    /// Set a flammable object alight and smoke the tiles around it.
    /// Returns the object's position, or `None` if it cannot burn.
    /// An object that has burned through its fuel cannot be relit.
    pub fn ignite(&mut self, id: ObjectId, intensity: f32) -> Option<GridPos> {
        let object = self.objects.get_mut(id)?;
        let fire = object.capabilities.flammable_mut()?;
        if fire.fuel <= 0.0 {
            return None;
        }
        fire.burning = true;
        fire.intensity = intensity.max(0.0);
        let origin = object.position;
        self.refresh_smoke();
        Some(origin)
    }

    pub fn extinguish(&mut self, id: ObjectId) -> Option<GridPos> {
        let object = self.objects.get_mut(id)?;
        let fire = object.capabilities.flammable_mut()?;
        fire.burning = false;
        fire.intensity = 0.0;
        let origin = object.position;
        self.refresh_smoke();
        Some(origin)
    }

    /// Rebuild the smoke layer from the fires still burning
    pub fn refresh_smoke(&mut self) {
        self.map.clear_smoke();
        let fires: Vec<GridPos> = self
            .objects
            .iter()
            .filter(|obj| obj.capabilities.is_burning())
            .map(|obj| obj.position)
            .collect();
        for center in fires {
            for dy in -SMOKE_RADIUS..=SMOKE_RADIUS {
                for dx in -SMOKE_RADIUS..=SMOKE_RADIUS {
                    let pos = GridPos::new(center.x + dx, center.y + dy);
                    if let Some(tile) = self.map.tile_mut(pos) {
                        tile.smoke = true;
                    }
                }
            }
        }
    }

    /// Advance every fire by one tick.
    ///
    /// A burning object grows hotter up to `max_fire_intensity`, burns one
    /// unit of fuel and loses `fire_damage` hp if it has a structure. With
    /// `fire_spread_chance` it throws sparks at the eight tiles around it, and
    /// each flammable object there catches with `fire_catch_chance`. Fires go
    /// out when the fuel is gone; structures at zero hp collapse into rubble
    /// and leave the tile open.
    pub fn tick_fires<R: Rng>(&mut self, config: &WorldConfig, rng: &mut R) -> Vec<FireChange> {
        let burning: Vec<ObjectId> = self
            .objects
            .sorted()
            .into_iter()
            .filter(|obj| obj.capabilities.is_burning())
            .map(|obj| obj.id)
            .collect();
        if burning.is_empty() {
            return Vec::new();
        }

        let mut changes = Vec::new();
        let mut sparks = Vec::new();
        let mut collapsed = Vec::new();

        for id in burning {
            let Some(object) = self.objects.get_mut(id) else {
                continue;
            };
            let position = object.position;
            let Some(fire) = object.capabilities.flammable_mut() else {
                continue;
            };
            fire.intensity = (fire.intensity + 0.5).min(config.max_fire_intensity);
            fire.fuel -= 1.0;
            let burned_out = fire.fuel <= 0.0;
            if burned_out {
                fire.burning = false;
                fire.intensity = 0.0;
            }

            let broken = match object.capabilities.structural_mut() {
                Some(structure) => {
                    structure.hp = (structure.hp - config.fire_damage).max(0.0);
                    structure.hp <= 0.0
                }
                None => false,
            };

            if broken {
                collapsed.push(id);
            } else if burned_out {
                changes.push(FireChange::BurnedOut {
                    name: object.name.clone(),
                    position,
                });
            }
            if !burned_out && rng.gen::<f32>() < config.fire_spread_chance {
                sparks.push(position);
            }
        }

        for origin in sparks {
            for direction in Direction::ALL {
                let Some(id) = self.map.tile(origin.step(direction)).and_then(|t| t.object) else {
                    continue;
                };
                let Some(object) = self.objects.get_mut(id) else {
                    continue;
                };
                let Some(fire) = object.capabilities.flammable_mut() else {
                    continue;
                };
                if fire.burning || fire.fuel <= 0.0 {
                    continue;
                }
                if rng.gen::<f32>() < config.fire_catch_chance {
                    fire.burning = true;
                    fire.intensity = config.spread_intensity;
                    changes.push(FireChange::Spread {
                        name: object.name.clone(),
                        position: object.position,
                    });
                }
            }
        }

        for id in collapsed {
            let Some(object) = self.objects.remove(id) else {
                continue;
            };
            if let Some(tile) = self.map.tile_mut(object.position) {
                tile.object = None;
                tile.blocked = false;
                tile.terrain = Terrain::Rubble;
            }
            changes.push(FireChange::Collapsed {
                name: object.name,
                position: object.position,
            });
        }

        self.refresh_smoke();
        changes
    }

    /// Count down interaction cooldowns
    pub fn tick_objects(&mut self) {
        for object in self.objects.iter_mut() {
            if let Some(interact) = object.capabilities.interactable_mut() {
                interact.cooldown = interact.cooldown.saturating_sub(1);
            }
        }
    }
}
