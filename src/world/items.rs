//! Items, spoilage and crafting recipes
//!
//! Items are plain values moved between inventories and tile ground piles.
//! The catalog holds templates (cloned on creation) and the recipe list.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Freshness at or below which a spoilable item is rotten
pub const SPOILED_FRESHNESS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Food,
    Drink,
    Medicine,
    Weapon,
    Tool,
    Material,
}

impl ItemKind {
    pub fn is_consumable(&self) -> bool {
        matches!(self, ItemKind::Food | ItemKind::Drink | ItemKind::Medicine)
    }
}

/// Effects applied when an item is consumed or wielded. Zero means "none".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemProps {
    pub nutrition: f32,
    pub thirst_relief: f32,
    pub healing: f32,
    pub energy_restore: f32,
    pub comfort: f32,
    pub damage: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    pub props: ItemProps,
    pub spoilable: bool,
    /// 1.0 = fresh, decays toward 0.0
    pub freshness: f32,
}

impl Item {
    pub fn new(name: impl Into<String>, kind: ItemKind, props: ItemProps) -> Self {
        Self {
            name: name.into(),
            kind,
            props,
            spoilable: false,
            freshness: 1.0,
        }
    }

    pub fn spoilable(mut self) -> Self {
        self.spoilable = true;
        self
    }

    pub fn with_freshness(mut self, freshness: f32) -> Self {
        self.freshness = freshness.clamp(0.0, 1.0);
        self
    }

    pub fn is_spoiled(&self) -> bool {
        self.spoilable && self.freshness <= SPOILED_FRESHNESS
    }

    /// Age the item. Non-spoilable items are unaffected.
    pub fn tick_spoilage(&mut self, dt: f32, rate: f32) {
        if self.spoilable {
            self.freshness = (self.freshness - rate * dt).max(0.0);
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// Quenches thirst when consumed
    pub fn quenches(&self) -> bool {
        self.kind.is_consumable() && self.props.thirst_relief > 0.0
    }

    /// Feeds when consumed
    pub fn feeds(&self) -> bool {
        self.kind.is_consumable() && self.props.nutrition > 0.0
    }

    pub fn heals(&self) -> bool {
        self.kind.is_consumable() && self.props.healing > 0.0
    }
}

/// A crafting recipe. `station` of `None` means it can be made anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub output: String,
    pub inputs: Vec<String>,
    pub station: Option<String>,
}

/// Item templates and recipes
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    templates: AHashMap<String, Item>,
    recipes: Vec<Recipe>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The goods of a small market town
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        let food = |nutrition: f32| ItemProps {
            nutrition,
            ..Default::default()
        };

        catalog.add_template(Item::new("Bread", ItemKind::Food, food(30.0)).spoilable());
        catalog.add_template(Item::new("Apple", ItemKind::Food, food(12.0)).spoilable());
        catalog.add_template(Item::new("Fish", ItemKind::Food, food(25.0)).spoilable());
        catalog.add_template(Item::new(
            "Cheese",
            ItemKind::Food,
            ItemProps {
                nutrition: 20.0,
                comfort: 5.0,
                ..Default::default()
            },
        ));
        catalog.add_template(Item::new(
            "Water",
            ItemKind::Drink,
            ItemProps {
                thirst_relief: 40.0,
                ..Default::default()
            },
        ));
        catalog.add_template(Item::new(
            "Wine",
            ItemKind::Drink,
            ItemProps {
                thirst_relief: 20.0,
                comfort: 10.0,
                ..Default::default()
            },
        ));
        catalog.add_template(Item::new(
            "Poultice",
            ItemKind::Medicine,
            ItemProps {
                healing: 30.0,
                ..Default::default()
            },
        ));
        catalog.add_template(Item::new(
            "Gladius",
            ItemKind::Weapon,
            ItemProps {
                damage: 25.0,
                ..Default::default()
            },
        ));
        catalog.add_template(Item::new(
            "Knife",
            ItemKind::Weapon,
            ItemProps {
                damage: 10.0,
                ..Default::default()
            },
        ));
        catalog.add_template(Item::new("Wheat", ItemKind::Material, ItemProps::default()));
        catalog.add_template(Item::new("Flour", ItemKind::Material, ItemProps::default()));
        catalog.add_template(Item::new("Herbs", ItemKind::Material, ItemProps::default()));
        catalog.add_template(Item::new("Iron", ItemKind::Material, ItemProps::default()));
        catalog.add_template(Item::new("Hammer", ItemKind::Tool, ItemProps::default()));

        catalog.add_recipe(Recipe {
            output: "Flour".into(),
            inputs: vec!["Wheat".into()],
            station: Some("mill".into()),
        });
        catalog.add_recipe(Recipe {
            output: "Bread".into(),
            inputs: vec!["Flour".into(), "Water".into()],
            station: Some("oven".into()),
        });
        catalog.add_recipe(Recipe {
            output: "Poultice".into(),
            inputs: vec!["Herbs".into(), "Water".into()],
            station: None,
        });
        catalog.add_recipe(Recipe {
            output: "Knife".into(),
            inputs: vec!["Iron".into()],
            station: Some("forge".into()),
        });

        catalog
    }

    pub fn add_template(&mut self, item: Item) {
        self.templates.insert(item.name.to_lowercase(), item);
    }

    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes.push(recipe);
    }

    /// Fresh copy of a template, looked up case-insensitively
    pub fn create(&self, name: &str) -> Option<Item> {
        self.templates.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn recipe_for(&self, output: &str) -> Option<&Recipe> {
        self.recipes
            .iter()
            .find(|r| r.output.eq_ignore_ascii_case(output.trim()))
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoilage_threshold() {
        let mut bread = ItemCatalog::with_defaults().create("bread").unwrap();
        assert!(!bread.is_spoiled());
        bread.tick_spoilage(1000.0, 0.001);
        assert!(bread.is_spoiled());
    }

    #[test]
    fn test_non_spoilable_never_rots() {
        let mut water = ItemCatalog::with_defaults().create("Water").unwrap();
        water.tick_spoilage(1_000_000.0, 1.0);
        assert!(!water.is_spoiled());
        assert!(water.quenches());
        assert!(!water.feeds());
    }

    #[test]
    fn test_recipe_lookup_case_insensitive() {
        let catalog = ItemCatalog::with_defaults();
        let recipe = catalog.recipe_for("BREAD").unwrap();
        assert_eq!(recipe.station.as_deref(), Some("oven"));
        assert!(catalog.recipe_for("castle").is_none());
    }

    #[test]
    fn test_every_recipe_output_has_template() {
        let catalog = ItemCatalog::with_defaults();
        for recipe in catalog.recipes() {
            assert!(catalog.create(&recipe.output).is_some(), "{}", recipe.output);
            for input in &recipe.inputs {
                assert!(catalog.create(input).is_some(), "{}", input);
            }
        }
    }
}
