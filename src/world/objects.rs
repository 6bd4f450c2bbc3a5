//! World objects and their capability sets
//!
//! Every object carries a fixed [`Capabilities`] struct. A capability that an
//! object lacks is simply `None`, so callers ask `obj.capabilities.flammable()`
//! instead of probing the object at runtime.

use crate::core::types::GridPos;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Identifier for placed objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Drink,
    Rest,
    Pray,
    Bathe,
    Trade,
    Work,
}

impl InteractionKind {
    pub fn label(&self) -> &'static str {
        match self {
            InteractionKind::Drink => "drinking",
            InteractionKind::Rest => "resting",
            InteractionKind::Pray => "prayer",
            InteractionKind::Bathe => "bathing",
            InteractionKind::Trade => "trade",
            InteractionKind::Work => "work",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interactable {
    pub kind: InteractionKind,
    pub grants_item: Option<String>,
    pub requires_item: Option<String>,
    /// Ticks the object stays busy after each use
    pub cooldown_max: u32,
    pub cooldown: u32,
}

impl Interactable {
    pub fn new(kind: InteractionKind) -> Self {
        Self {
            kind,
            grants_item: None,
            requires_item: None,
            cooldown_max: 0,
            cooldown: 0,
        }
    }

    pub fn granting(mut self, item: impl Into<String>) -> Self {
        self.grants_item = Some(item.into());
        self
    }

    pub fn requiring(mut self, item: impl Into<String>) -> Self {
        self.requires_item = Some(item.into());
        self
    }

    pub fn with_cooldown(mut self, ticks: u32) -> Self {
        self.cooldown_max = ticks;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterSource {
    pub flowing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Flammable {
    pub burning: bool,
    pub intensity: f32,
    /// Burned down by one per tick; the fire dies at zero
    pub fuel: f32,
}

impl Flammable {
    pub const FUEL: f32 = 100.0;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Structural {
    pub hp: f32,
    pub max_hp: f32,
}

impl Structural {
    pub fn new(max_hp: f32) -> Self {
        Self { hp: max_hp, max_hp }
    }

    pub fn integrity(&self) -> f32 {
        if self.max_hp <= 0.0 {
            0.0
        } else {
            (self.hp / self.max_hp).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftingStation {
    /// Station type a recipe can name, e.g. "oven"
    pub station: String,
}

/// Everything an object can do, resolved when the object is built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub interactable: Option<Interactable>,
    pub water: Option<WaterSource>,
    pub flammable: Option<Flammable>,
    pub structural: Option<Structural>,
    pub station: Option<CraftingStation>,
}

impl Capabilities {
    pub fn interactable(&self) -> Option<&Interactable> {
        self.interactable.as_ref()
    }

    pub fn interactable_mut(&mut self) -> Option<&mut Interactable> {
        self.interactable.as_mut()
    }

    pub fn water(&self) -> Option<&WaterSource> {
        self.water.as_ref()
    }

    pub fn flammable(&self) -> Option<&Flammable> {
        self.flammable.as_ref()
    }

    pub fn flammable_mut(&mut self) -> Option<&mut Flammable> {
        self.flammable.as_mut()
    }

    pub fn structural(&self) -> Option<&Structural> {
        self.structural.as_ref()
    }

    pub fn structural_mut(&mut self) -> Option<&mut Structural> {
        self.structural.as_mut()
    }

    pub fn station(&self) -> Option<&CraftingStation> {
        self.station.as_ref()
    }

    pub fn is_burning(&self) -> bool {
        self.flammable.map(|f| f.burning).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub id: ObjectId,
    pub name: String,
    pub position: GridPos,
    /// Solid objects make their tile unwalkable
    pub solid: bool,
    pub capabilities: Capabilities,
}

impl WorldObject {
    pub fn new(name: impl Into<String>, position: GridPos) -> Self {
        Self {
            id: ObjectId(0),
            name: name.into(),
            position,
            solid: false,
            capabilities: Capabilities::default(),
        }
    }

    pub fn solid(mut self) -> Self {
        self.solid = true;
        self
    }

    pub fn interactable(mut self, interactable: Interactable) -> Self {
        self.capabilities.interactable = Some(interactable);
        self
    }

    pub fn water_source(mut self) -> Self {
        self.capabilities.water = Some(WaterSource { flowing: true });
        self
    }

    pub fn flammable(mut self) -> Self {
        self.capabilities.flammable = Some(Flammable {
            burning: false,
            intensity: 0.0,
            fuel: Flammable::FUEL,
        });
        self
    }

    pub fn structural(mut self, max_hp: f32) -> Self {
        self.capabilities.structural = Some(Structural::new(max_hp));
        self
    }

    pub fn station(mut self, station: impl Into<String>) -> Self {
        self.capabilities.station = Some(CraftingStation {
            station: station.into(),
        });
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// Storage for all world objects (buildings, fountains, stations...)
#[derive(Debug, Clone, Default)]
pub struct WorldObjects {
    instances: AHashMap<ObjectId, WorldObject>,
    next_id: u32,
}

impl WorldObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a world object, assigning it a fresh id
    pub fn add(&mut self, mut object: WorldObject) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        object.id = id;
        self.instances.insert(id, object);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&WorldObject> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.instances.get_mut(&id)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<WorldObject> {
        self.instances.remove(&id)
    }

    /// First object with the given name, case-insensitive
    pub fn find_by_name(&self, name: &str) -> Option<&WorldObject> {
        self.sorted().into_iter().find(|obj| obj.matches(name))
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut WorldObject> {
        let id = self.find_by_name(name)?.id;
        self.instances.get_mut(&id)
    }

    /// All objects within radius of a tile, nearest first
    pub fn get_in_radius(&self, center: GridPos, radius: f32) -> Vec<&WorldObject> {
        let mut found: Vec<_> = self
            .instances
            .values()
            .filter(|obj| obj.position.distance(&center) <= radius)
            .collect();
        found.sort_by(|a, b| {
            a.position
                .distance(&center)
                .total_cmp(&b.position.distance(&center))
                .then(a.id.cmp(&b.id))
        });
        found
    }

    /// Objects in id order (hash map iteration order is not stable)
    pub fn sorted(&self) -> Vec<&WorldObject> {
        let mut all: Vec<_> = self.instances.values().collect();
        all.sort_by_key(|obj| obj.id);
        all
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldObject> {
        self.instances.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WorldObject> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get_object() {
        let mut objects = WorldObjects::new();
        let id = objects.add(WorldObject::new("Fountain", GridPos::new(10, 20)).water_source());

        let retrieved = objects.get(id).unwrap();
        assert_eq!(retrieved.name, "Fountain");
        assert!(retrieved.capabilities.water().is_some());
        assert!(retrieved.capabilities.flammable().is_none());
    }

    #[test]
    fn test_get_in_radius_sorted_by_distance() {
        let mut objects = WorldObjects::new();
        objects.add(WorldObject::new("Far Well", GridPos::new(8, 0)));
        objects.add(WorldObject::new("Near Well", GridPos::new(2, 0)));
        objects.add(WorldObject::new("Distant Temple", GridPos::new(50, 50)));

        let nearby = objects.get_in_radius(GridPos::new(0, 0), 10.0);
        assert_eq!(nearby.len(), 2);
        assert_eq!(nearby[0].name, "Near Well");
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let mut objects = WorldObjects::new();
        objects.add(WorldObject::new("Taverna", GridPos::new(1, 1)));
        assert!(objects.find_by_name("  taverna ").is_some());
        assert!(objects.find_by_name("forum").is_none());
    }

    #[test]
    fn test_remove_object() {
        let mut objects = WorldObjects::new();
        let id = objects.add(WorldObject::new("Cart", GridPos::new(0, 0)));
        assert!(objects.remove(id).is_some());
        assert!(objects.get(id).is_none());
    }

    #[test]
    fn test_burning_capability() {
        let mut bakery = WorldObject::new("Bakery", GridPos::new(3, 3)).flammable();
        assert!(!bakery.capabilities.is_burning());
        if let Some(fire) = bakery.capabilities.flammable_mut() {
            fire.burning = true;
            fire.intensity = 4.0;
        }
        assert!(bakery.capabilities.is_burning());
    }
}
