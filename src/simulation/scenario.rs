//! A small walled town used by the binary and the integration tests

use crate::core::config::SimulationConfig;
use crate::core::types::GridPos;
use crate::entity::role::Role;
use crate::simulation::engine::Simulation;
use crate::world::objects::{Interactable, InteractionKind, WorldObject};
use crate::world::{Terrain, TileMap, World};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const TOWN_WIDTH: i32 = 40;
pub const TOWN_HEIGHT: i32 = 30;

const NAMES: &[&str] = &[
    "Marcus", "Livia", "Gaius", "Julia", "Titus", "Cornelia", "Lucius", "Aurelia", "Quintus",
    "Octavia", "Decimus", "Flavia", "Sextus", "Claudia", "Publius", "Valeria",
];

const ROLES: &[Role] = &[
    Role::Merchant,
    Role::Plebeian,
    Role::Craftsman,
    Role::Priest,
    Role::Guard,
    Role::Patrician,
    Role::Plebeian,
    Role::Senator,
    Role::Gladiator,
    Role::Legionary,
    Role::Legionary,
];

/// Places everyone knows from the start
const LANDMARKS: &[&str] = &["Fountain", "Forum Market", "Temple of Jupiter", "Taverna"];

/// Extra places a role knows and what it carries at the start
struct RoleKit {
    places: &'static [&'static str],
    items: &'static [&'static str],
}

impl RoleKit {
    fn for_role(role: Role) -> Self {
        match role {
            Role::Merchant => Self {
                places: &["Bakery", "Well"],
                items: &["Bread", "Wine", "Apple"],
            },
            Role::Craftsman => Self {
                places: &["Forge", "Mill"],
                items: &["Iron", "Wheat"],
            },
            Role::Priest => Self {
                places: &["Baths"],
                items: &["Herbs", "Poultice"],
            },
            Role::Guard | Role::Legionary | Role::Gladiator => Self {
                places: &["Well"],
                items: &["Gladius"],
            },
            Role::Senator | Role::Patrician => Self {
                places: &["Baths"],
                items: &["Wine"],
            },
            Role::Plebeian => Self {
                places: &["Insula", "Well"],
                items: &["Bread"],
            },
        }
    }
}

/// Build the town map and its structures
pub fn town_world() -> World {
    let mut map = TileMap::new(TOWN_WIDTH, TOWN_HEIGHT, Terrain::Grass);

    // Perimeter wall
    map.fill(GridPos::new(0, 0), GridPos::new(TOWN_WIDTH - 1, 0), Terrain::Wall);
    map.fill(
        GridPos::new(0, TOWN_HEIGHT - 1),
        GridPos::new(TOWN_WIDTH - 1, TOWN_HEIGHT - 1),
        Terrain::Wall,
    );
    map.fill(GridPos::new(0, 0), GridPos::new(0, TOWN_HEIGHT - 1), Terrain::Wall);
    map.fill(
        GridPos::new(TOWN_WIDTH - 1, 0),
        GridPos::new(TOWN_WIDTH - 1, TOWN_HEIGHT - 1),
        Terrain::Wall,
    );

    // Main streets and the forum
    map.fill(GridPos::new(1, 15), GridPos::new(TOWN_WIDTH - 2, 15), Terrain::Road);
    map.fill(GridPos::new(20, 1), GridPos::new(20, TOWN_HEIGHT - 2), Terrain::Road);
    map.fill(GridPos::new(17, 12), GridPos::new(23, 18), Terrain::Plaza);

    // A pond with a muddy edge
    map.fill(GridPos::new(3, 3), GridPos::new(7, 6), Terrain::ShallowWater);
    map.fill(GridPos::new(4, 4), GridPos::new(6, 5), Terrain::Water);

    let mut world = World::new(map);
    let drink = |grants: &str, cooldown: u32| {
        Interactable::new(InteractionKind::Drink)
            .granting(grants)
            .with_cooldown(cooldown)
    };

    world.place(
        WorldObject::new("Fountain", GridPos::new(20, 14))
            .water_source()
            .interactable(drink("Water", 1)),
    );
    world.place(
        WorldObject::new("Well", GridPos::new(9, 15))
            .water_source()
            .interactable(drink("Water", 2)),
    );
    world.place(
        WorldObject::new("Forum Market", GridPos::new(16, 11))
            .solid()
            .structural(150.0)
            .interactable(
                Interactable::new(InteractionKind::Trade)
                    .granting("Apple")
                    .with_cooldown(3),
            ),
    );
    world.place(
        WorldObject::new("Bakery", GridPos::new(25, 12))
            .solid()
            .flammable()
            .structural(100.0)
            .station("oven")
            .interactable(
                Interactable::new(InteractionKind::Work)
                    .granting("Bread")
                    .with_cooldown(5),
            ),
    );
    world.place(
        WorldObject::new("Taverna", GridPos::new(25, 18))
            .solid()
            .flammable()
            .structural(100.0)
            .interactable(drink("Wine", 4)),
    );
    world.place(
        WorldObject::new("Temple of Jupiter", GridPos::new(16, 19))
            .solid()
            .structural(300.0)
            .interactable(Interactable::new(InteractionKind::Pray)),
    );
    world.place(
        WorldObject::new("Baths", GridPos::new(32, 15))
            .solid()
            .structural(200.0)
            .interactable(Interactable::new(InteractionKind::Bathe).with_cooldown(2)),
    );
    world.place(
        WorldObject::new("Mill", GridPos::new(9, 10))
            .solid()
            .flammable()
            .structural(80.0)
            .station("mill")
            .interactable(
                Interactable::new(InteractionKind::Work)
                    .granting("Wheat")
                    .with_cooldown(4),
            ),
    );
    world.place(
        WorldObject::new("Forge", GridPos::new(32, 10))
            .solid()
            .structural(150.0)
            .station("forge")
            .interactable(
                Interactable::new(InteractionKind::Work)
                    .granting("Iron")
                    .with_cooldown(6),
            ),
    );
    world.place(
        WorldObject::new("Insula", GridPos::new(9, 21))
            .solid()
            .flammable()
            .structural(120.0)
            .interactable(Interactable::new(InteractionKind::Rest)),
    );
    world
}

/// The town populated with `agents` townsfolk around the forum
pub fn demo_town(config: SimulationConfig, seed: u64, agents: usize) -> Simulation {
    let mut sim = Simulation::new(config, town_world(), seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);

    for i in 0..agents {
        let base = NAMES[i % NAMES.len()];
        let name = match i / NAMES.len() {
            0 => base.to_string(),
            n => format!("{base} {}", n + 1),
        };
        let role = ROLES[i % ROLES.len()];
        let position = open_tile(&sim.world, &mut rng);
        sim.spawn_agent(name, role, position);

        let mut known: Vec<&str> = LANDMARKS.to_vec();
        let kit = RoleKit::for_role(role);
        known.extend_from_slice(kit.places);

        let world = &sim.world;
        let Some(agent) = sim.agents.last_mut() else {
            continue;
        };
        for place in known {
            if let Some(obj) = world.objects.find_by_name(place) {
                agent.memory.learn_location(obj.name.clone(), obj.position);
            }
        }
        for item in kit.items.iter().filter_map(|name| world.catalog.create(name)) {
            let _ = agent.inventory.push(item);
        }
    }

    tracing::info!(agents, seed, "demo town ready");
    sim
}

/// A random walkable tile near the forum
fn open_tile<R: Rng>(world: &World, rng: &mut R) -> GridPos {
    for _ in 0..200 {
        let pos = GridPos::new(rng.gen_range(12..28), rng.gen_range(9..22));
        if world.is_walkable(pos) && world.object_at(pos).is_none() {
            return pos;
        }
    }
    GridPos::new(20, 15)
}
