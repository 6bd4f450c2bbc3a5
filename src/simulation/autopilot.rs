//! Fast-path decision maker for routine situations
//!
//! The autopilot runs a priority cascade every call and either returns a
//! decision to execute immediately or `None`, which hands the agent to the
//! reasoning backend. Order:
//!
//! 1. One-shot override: clear it and defer
//! 2. Staleness counter: defer every `max_ticks` calls
//! 3. Survival: flee danger, use medicine, strike hostiles (combat roles)
//! 4. Path following: one waypoint per call, deferring on arrival or blockage
//! 5. Critical thirst/hunger: consume, else path to a known source, else defer
//! 6. Routine: resting when exhausted, formation keeping, greeting friends,
//!    resting when tired and idle
//! 7. Nothing matched: defer
//!
//! Every deferral resets the staleness counter so the next autopilot stretch
//! starts fresh after the backend has had its say.

use crate::core::config::AutopilotConfig;
use crate::core::types::{GridPos, Tick};
use crate::entity::agent::{Agent, Neighbor};
use crate::entity::drives::DriveKind;
use crate::entity::memory::{MemoryEntry, MemoryKind};
use crate::simulation::decision::{ActionKind, Decision};
use crate::spatial::pathfinding::{direction_to, find_path, find_safe_direction};
use crate::world::items::ItemKind;
use crate::world::World;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const HOSTILE_TRUST: f32 = -50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotState {
    #[default]
    Idle,
    Navigating,
    Fleeing,
    SeekingResource,
    Working,
    Socializing,
    Resting,
}

/// What the autopilot may look at besides the agent itself
pub struct AutopilotContext<'a> {
    pub world: &'a World,
    /// Snapshot of every other agent, taken at the start of the tick
    pub neighbors: &'a [Neighbor],
    pub config: &'a AutopilotConfig,
    pub max_expansions: usize,
    pub tick: Tick,
}

/// Serializable autopilot state for save/restore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutopilotSnapshot {
    pub state: AutopilotState,
    pub path: Vec<GridPos>,
    pub destination: Option<String>,
    pub ticks_on_autopilot: u32,
    pub override_requested: bool,
    pub consecutive_blocks: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Autopilot {
    state: AutopilotState,
    path: VecDeque<GridPos>,
    destination: Option<String>,
    ticks_on_autopilot: u32,
    override_requested: bool,
    /// Consecutive failed MOVEs, maintained by the executor
    pub consecutive_blocks: u32,
}

impl Autopilot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AutopilotState {
        self.state
    }

    pub fn set_state(&mut self, state: AutopilotState) {
        self.state = state;
    }

    pub fn path(&self) -> &VecDeque<GridPos> {
        &self.path
    }

    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn ticks_on_autopilot(&self) -> u32 {
        self.ticks_on_autopilot
    }

    pub fn set_path(&mut self, path: Vec<GridPos>, destination: impl Into<String>) {
        self.path = path.into();
        self.destination = Some(destination.into());
        self.state = AutopilotState::Navigating;
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
        self.destination = None;
        if matches!(
            self.state,
            AutopilotState::Navigating | AutopilotState::SeekingResource
        ) {
            self.state = AutopilotState::Idle;
        }
    }

    /// Hand the next call to the backend
    pub fn request_override(&mut self) {
        self.override_requested = true;
    }

    pub fn override_requested(&self) -> bool {
        self.override_requested
    }

    fn defer(&mut self) -> Option<Decision> {
        self.ticks_on_autopilot = 0;
        None
    }

    pub fn decide<R: Rng>(
        &mut self,
        agent: &mut Agent,
        ctx: &AutopilotContext<'_>,
        rng: &mut R,
    ) -> Option<Decision> {
        if self.override_requested {
            self.override_requested = false;
            return self.defer();
        }

        self.ticks_on_autopilot += 1;
        if self.ticks_on_autopilot >= ctx.config.max_ticks {
            return self.defer();
        }

        if let Some(decision) = self.check_survival(agent, ctx, rng) {
            return Some(decision);
        }

        // Routine states only describe the previous call
        if matches!(
            self.state,
            AutopilotState::Fleeing | AutopilotState::Resting | AutopilotState::Socializing
        ) {
            self.state = AutopilotState::Idle;
        }

        if self.has_path() {
            return match self.follow_path(agent, ctx) {
                Some(decision) => Some(decision),
                None => self.defer(),
            };
        }

        if let Some(outcome) = self.check_critical_needs(agent, ctx) {
            return match outcome {
                Some(decision) => Some(decision),
                None => self.defer(),
            };
        }

        match self.check_routine(agent, ctx, rng) {
            Some(decision) => Some(decision),
            None => self.defer(),
        }
    }

    // === SURVIVAL ===

    fn check_survival<R: Rng>(
        &mut self,
        agent: &Agent,
        ctx: &AutopilotContext<'_>,
        rng: &mut R,
    ) -> Option<Decision> {
        if agent.status.has_danger() {
            self.clear_path();
            self.state = AutopilotState::Fleeing;
            let direction = find_safe_direction(ctx.world, agent.position, rng);
            return Some(Decision::moving(direction, "Fire! I must get away!"));
        }

        if agent.health < ctx.config.critical_health {
            let medicine = agent
                .inventory
                .iter()
                .find(|item| item.heals() && !item.is_spoiled());
            if let Some(item) = medicine {
                return Some(
                    Decision::new(ActionKind::Consume, "I'm dying... must use this medicine.")
                        .with_target(item.name.clone()),
                );
            }
        }

        if agent.role.is_combatant() {
            let foe = ctx
                .neighbors
                .iter()
                .filter(|n| n.alive && n.id != agent.id)
                .filter(|n| agent.position.distance(&n.position) <= ctx.config.strike_range)
                .find(|n| {
                    n.hostile
                        || agent
                            .memory
                            .relationship(n.id)
                            .map(|r| r.trust < HOSTILE_TRUST)
                            .unwrap_or(false)
                });
            if let Some(foe) = foe {
                let mut decision =
                    Decision::new(ActionKind::Attack, format!("{} is a threat. I strike!", foe.name))
                        .with_target(foe.name.clone());
                let weapon = agent
                    .inventory
                    .iter()
                    .filter(|i| i.kind == ItemKind::Weapon)
                    .max_by(|a, b| a.props.damage.total_cmp(&b.props.damage));
                if let Some(weapon) = weapon {
                    decision = decision.with_item(weapon.name.clone());
                }
                return Some(decision);
            }
        }

        None
    }

    // === NAVIGATION ===

    fn follow_path(&mut self, agent: &mut Agent, ctx: &AutopilotContext<'_>) -> Option<Decision> {
        let destination = self
            .destination
            .clone()
            .unwrap_or_else(|| "my destination".to_string());

        if agent.movement_cooldown > 0 {
            return Some(Decision::idle(format!("Walking toward {destination}...")));
        }

        while self.path.front() == Some(&agent.position) {
            self.path.pop_front();
        }

        let Some(&next) = self.path.front() else {
            agent.memory.add(
                MemoryEntry::new(format!("You have arrived near {destination}."), ctx.tick, 1.0)
                    .kind(MemoryKind::Event)
                    .tag("arrival")
                    .at(agent.position),
            );
            self.destination = None;
            self.state = AutopilotState::Idle;
            return None;
        };

        if agent.position.chebyshev(&next) > 1 || !ctx.world.is_walkable(next) {
            self.clear_path();
            return None;
        }

        Some(Decision::moving(
            direction_to(agent.position, next),
            format!("Heading to {destination}."),
        ))
    }

    // === CRITICAL NEEDS ===

    /// `None` when no need is critical. `Some(None)` when a need is critical
    /// but nothing local can resolve it.
    fn check_critical_needs(
        &mut self,
        agent: &mut Agent,
        ctx: &AutopilotContext<'_>,
    ) -> Option<Option<Decision>> {
        let mut critical: Vec<(DriveKind, f32)> = [DriveKind::Thirst, DriveKind::Hunger]
            .into_iter()
            .map(|d| (d, agent.drives.get(d)))
            .filter(|(_, level)| *level > ctx.config.critical_need)
            .collect();
        if critical.is_empty() {
            return None;
        }
        critical.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (need, _) in critical {
            let item = agent.inventory.iter().find(|item| {
                let serves = match need {
                    DriveKind::Thirst => item.quenches(),
                    _ => item.feeds(),
                };
                serves && !item.is_spoiled() && agent.memory.preference(&item.name) > -0.5
            });
            if let Some(item) = item {
                let thought = match need {
                    DriveKind::Thirst => format!("So thirsty... I'll drink my {}.", item.name),
                    _ => format!("I need to eat. The {} will do.", item.name),
                };
                return Some(Some(
                    Decision::new(ActionKind::Consume, thought).with_target(item.name.clone()),
                ));
            }

            if let Some((name, pos)) = agent.memory.location_for_need(need, agent.position) {
                let path = find_path(&ctx.world.map, agent.position, pos, ctx.max_expansions);
                if !path.is_empty() {
                    self.set_path(path, name);
                    self.state = AutopilotState::SeekingResource;
                    return Some(self.follow_path(agent, ctx));
                }
            }
        }

        Some(None)
    }

    // === ROUTINE ===

    fn check_routine<R: Rng>(
        &mut self,
        agent: &Agent,
        ctx: &AutopilotContext<'_>,
        rng: &mut R,
    ) -> Option<Decision> {
        // Reached only when no need is critical
        if agent.drives.energy > ctx.config.exhaustion {
            self.state = AutopilotState::Resting;
            return Some(Decision::new(ActionKind::Rest, "I'm exhausted. I must rest."));
        }

        let living = || {
            ctx.neighbors
                .iter()
                .filter(move |n| n.alive && n.id != agent.id)
        };

        if agent.role.is_grouped() {
            let ally = living()
                .filter(|n| n.role == agent.role)
                .map(|n| (n, agent.position.distance(&n.position)))
                .filter(|(_, d)| *d <= ctx.config.cohesion_range)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((ally, dist)) = ally {
                if dist > ctx.config.formation_radius {
                    return Some(Decision::moving(
                        direction_to(agent.position, ally.position),
                        format!("I should stay close to {}.", ally.name),
                    ));
                }
            }
        }

        if agent.drives.social > ctx.config.loneliness {
            let nearby: Vec<&Neighbor> = living()
                .filter(|n| agent.position.distance(&n.position) < ctx.config.greeting_radius)
                .collect();
            if !nearby.is_empty() {
                let friend = nearby.iter().find(|n| {
                    agent
                        .memory
                        .relationship(n.id)
                        .map(|r| {
                            r.familiarity > ctx.config.greeting_familiarity
                                && r.trust > ctx.config.greeting_trust
                        })
                        .unwrap_or(false)
                });
                // A first meeting is left to the backend
                let friend = friend?;
                let greetings = [
                    format!("Salve, {}!", friend.name),
                    format!("Ave, {}. Good to see you.", friend.name),
                    format!("How goes it, {}?", friend.name),
                ];
                let speech = greetings
                    .choose(rng)
                    .cloned()
                    .unwrap_or_else(|| format!("Salve, {}!", friend.name));
                self.state = AutopilotState::Socializing;
                return Some(
                    Decision::new(
                        ActionKind::Talk,
                        format!("Ah, {}! I should say hello.", friend.name),
                    )
                    .with_target(friend.name.clone())
                    .with_speech(speech),
                );
            }
        }

        if agent.drives.energy > ctx.config.fatigue && self.state == AutopilotState::Idle {
            self.state = AutopilotState::Resting;
            return Some(Decision::new(
                ActionKind::Rest,
                "I should take a moment to catch my breath.",
            ));
        }

        None
    }

    // === PERSISTENCE ===

    pub fn snapshot(&self) -> AutopilotSnapshot {
        AutopilotSnapshot {
            state: self.state,
            path: self.path.iter().copied().collect(),
            destination: self.destination.clone(),
            ticks_on_autopilot: self.ticks_on_autopilot,
            override_requested: self.override_requested,
            consecutive_blocks: self.consecutive_blocks,
        }
    }

    pub fn restore(&mut self, snapshot: AutopilotSnapshot) {
        self.state = snapshot.state;
        self.path = snapshot.path.into();
        self.destination = snapshot.destination;
        self.ticks_on_autopilot = snapshot.ticks_on_autopilot;
        self.override_requested = snapshot.override_requested;
        self.consecutive_blocks = snapshot.consecutive_blocks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use crate::entity::role::Role;
    use crate::entity::status::StatusKind;
    use crate::world::{ItemCatalog, Terrain, TileMap};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (World, SimulationConfig, ChaCha8Rng) {
        let world = World::new(TileMap::new(20, 20, Terrain::Plaza));
        (world, SimulationConfig::default(), ChaCha8Rng::seed_from_u64(7))
    }

    fn agent_at(config: &SimulationConfig, role: Role, x: i32, y: i32) -> Agent {
        Agent::new("Tiro", role, GridPos::new(x, y), config)
    }

    fn ctx<'a>(
        world: &'a World,
        neighbors: &'a [Neighbor],
        config: &'a SimulationConfig,
    ) -> AutopilotContext<'a> {
        AutopilotContext {
            world,
            neighbors,
            config: &config.autopilot,
            max_expansions: config.pathfinding.max_expansions,
            tick: 1,
        }
    }

    #[test]
    fn test_override_defers_once() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.energy = 90.0;
        let mut pilot = Autopilot::new();
        pilot.request_override();

        let c = ctx(&world, &[], &config);
        assert!(pilot.decide(&mut agent, &c, &mut rng).is_none());
        assert!(!pilot.override_requested());
        let next = pilot.decide(&mut agent, &c, &mut rng).unwrap();
        assert_eq!(next.action, ActionKind::Rest);
    }

    #[test]
    fn test_staleness_cap_forces_deferral() {
        let (world, mut config, mut rng) = setup();
        config.autopilot.max_ticks = 3;
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.energy = 90.0;
        let mut pilot = Autopilot::new();
        let c = ctx(&world, &[], &config);

        assert!(pilot.decide(&mut agent, &c, &mut rng).is_some());
        pilot.set_state(AutopilotState::Idle);
        assert!(pilot.decide(&mut agent, &c, &mut rng).is_some());
        assert!(pilot.decide(&mut agent, &c, &mut rng).is_none());
        assert_eq!(pilot.ticks_on_autopilot(), 0);
    }

    #[test]
    fn test_danger_always_flees() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Merchant, 5, 5);
        agent.status.apply(StatusKind::SmokeInhalation, 5);
        agent.drives.thirst = 99.0;
        agent.drives.hunger = 99.0;
        agent.drives.energy = 99.0;
        let mut pilot = Autopilot::new();
        pilot.set_path(vec![GridPos::new(6, 5)], "Market");

        let decision = pilot
            .decide(&mut agent, &ctx(&world, &[], &config), &mut rng)
            .unwrap();
        assert_eq!(decision.action, ActionKind::Move);
        assert!(decision.direction.is_some());
        assert_eq!(pilot.state(), AutopilotState::Fleeing);
        assert!(!pilot.has_path());
    }

    #[test]
    fn test_critical_need_without_means_defers_instead_of_resting() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.hunger = 95.0;
        agent.drives.energy = 95.0;
        let mut pilot = Autopilot::new();

        let decision = pilot.decide(&mut agent, &ctx(&world, &[], &config), &mut rng);
        assert!(decision.is_none());
        assert_eq!(pilot.ticks_on_autopilot(), 0);
    }

    #[test]
    fn test_exhaustion_rests_even_while_working() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        let mut pilot = Autopilot::new();
        pilot.set_state(AutopilotState::Working);
        let c = ctx(&world, &[], &config);

        agent.drives.energy = 75.0;
        assert!(pilot.decide(&mut agent, &c, &mut rng).is_none());
        assert_eq!(pilot.state(), AutopilotState::Working);

        agent.drives.energy = 90.0;
        let decision = pilot.decide(&mut agent, &c, &mut rng).unwrap();
        assert_eq!(decision.action, ActionKind::Rest);
        assert_eq!(pilot.state(), AutopilotState::Resting);
    }

    #[test]
    fn test_critical_need_outranks_exhaustion() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.thirst = 90.0;
        agent.drives.energy = 95.0;
        let water = ItemCatalog::with_defaults().create("water").unwrap();
        agent.inventory.push(water).unwrap();
        let mut pilot = Autopilot::new();
        pilot.set_state(AutopilotState::Working);

        let decision = pilot
            .decide(&mut agent, &ctx(&world, &[], &config), &mut rng)
            .unwrap();
        assert_eq!(decision.action, ActionKind::Consume);
    }

    #[test]
    fn test_critical_thirst_drinks_from_inventory() {
        let (world, config, mut rng) = setup();
        let catalog = ItemCatalog::with_defaults();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.thirst = 80.0;
        agent.drives.hunger = 75.0;
        agent.inventory.push(catalog.create("bread").unwrap()).unwrap();
        agent.inventory.push(catalog.create("water").unwrap()).unwrap();

        let decision = Autopilot::new()
            .decide(&mut agent, &ctx(&world, &[], &config), &mut rng)
            .unwrap();
        assert_eq!(decision.action, ActionKind::Consume);
        assert_eq!(decision.target.as_deref(), Some("Water"));
    }

    #[test]
    fn test_disliked_or_spoiled_food_is_skipped() {
        let (world, config, mut rng) = setup();
        let catalog = ItemCatalog::with_defaults();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.hunger = 80.0;
        agent
            .inventory
            .push(catalog.create("bread").unwrap().with_freshness(0.0))
            .unwrap();
        agent.inventory.push(catalog.create("apple").unwrap()).unwrap();
        agent.memory.update_preference("apple", -0.6);

        let decision = Autopilot::new().decide(&mut agent, &ctx(&world, &[], &config), &mut rng);
        assert!(decision.is_none());
    }

    #[test]
    fn test_blocked_waypoint_clears_path() {
        let (mut world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        let mut pilot = Autopilot::new();
        pilot.set_path(vec![GridPos::new(6, 5), GridPos::new(7, 5)], "Forum");
        world.map.set_terrain(GridPos::new(6, 5), Terrain::Wall);

        assert!(pilot
            .decide(&mut agent, &ctx(&world, &[], &config), &mut rng)
            .is_none());
        assert!(!pilot.has_path());
        assert_eq!(pilot.state(), AutopilotState::Idle);
    }

    #[test]
    fn test_cooldown_waits_on_path() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.movement_cooldown = 2;
        let mut pilot = Autopilot::new();
        pilot.set_path(vec![GridPos::new(6, 5)], "Forum");

        let decision = pilot
            .decide(&mut agent, &ctx(&world, &[], &config), &mut rng)
            .unwrap();
        assert_eq!(decision.action, ActionKind::Idle);
        assert!(decision.thought.contains("Forum"));
    }

    #[test]
    fn test_greets_familiar_trusted_neighbor() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.social = 80.0;
        let friend = agent_at(&config, Role::Merchant, 6, 6);
        for tick in 0..6 {
            agent
                .memory
                .update_relationship(friend.id, &friend.name, 3.0, tick);
        }
        let neighbors = vec![Neighbor::of(&friend)];

        let decision = Autopilot::new()
            .decide(&mut agent, &ctx(&world, &neighbors, &config), &mut rng)
            .unwrap();
        assert_eq!(decision.action, ActionKind::Talk);
        assert_eq!(decision.target.as_deref(), Some("Tiro"));
        assert!(decision.speech.unwrap().contains("Tiro"));
    }

    #[test]
    fn test_strangers_are_left_to_backend() {
        let (world, config, mut rng) = setup();
        let mut agent = agent_at(&config, Role::Plebeian, 5, 5);
        agent.drives.social = 80.0;
        agent.drives.energy = 80.0;
        let stranger = agent_at(&config, Role::Merchant, 6, 6);
        let neighbors = vec![Neighbor::of(&stranger)];

        assert!(Autopilot::new()
            .decide(&mut agent, &ctx(&world, &neighbors, &config), &mut rng)
            .is_none());
    }

    #[test]
    fn test_guard_strikes_hostile_with_best_weapon() {
        let (world, config, mut rng) = setup();
        let catalog = ItemCatalog::with_defaults();
        let mut guard = agent_at(&config, Role::Guard, 5, 5);
        guard.inventory.push(catalog.create("knife").unwrap()).unwrap();
        guard.inventory.push(catalog.create("gladius").unwrap()).unwrap();
        let mut brigand = agent_at(&config, Role::Plebeian, 6, 5);
        brigand.hostile = true;
        let neighbors = vec![Neighbor::of(&brigand)];

        let decision = Autopilot::new()
            .decide(&mut guard, &ctx(&world, &neighbors, &config), &mut rng)
            .unwrap();
        assert_eq!(decision.action, ActionKind::Attack);
        assert_eq!(decision.item.as_deref(), Some("Gladius"));
    }

    #[test]
    fn test_legionary_keeps_formation() {
        let (world, config, mut rng) = setup();
        let mut soldier = agent_at(&config, Role::Legionary, 2, 2);
        let ally = agent_at(&config, Role::Legionary, 10, 2);
        let neighbors = vec![Neighbor::of(&ally)];

        let decision = Autopilot::new()
            .decide(&mut soldier, &ctx(&world, &neighbors, &config), &mut rng)
            .unwrap();
        assert_eq!(decision.action, ActionKind::Move);
        assert_eq!(decision.direction, Some(crate::core::types::Direction::East));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut pilot = Autopilot::new();
        pilot.set_path(vec![GridPos::new(1, 1), GridPos::new(2, 2)], "Temple");
        pilot.request_override();
        pilot.consecutive_blocks = 2;

        let json = serde_json::to_string(&pilot.snapshot()).unwrap();
        let mut restored = Autopilot::new();
        restored.restore(serde_json::from_str(&json).unwrap());
        assert_eq!(restored, pilot);
    }
}
