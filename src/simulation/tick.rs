//! Tick system - advances the simulation one step
//!
//! Order within a tick:
//! 1. Deliver events queued during the previous tick
//! 2. World objects, fires and the day cycle
//! 3. Environmental threat scan (every `env_update_interval` ticks)
//! 4. Hazard statuses for agents standing in smoke or next to fire
//! 5. Per agent: biology and gate, then the autopilot when the gate spiked,
//!    a path is being walked or the agent is in danger. A deferral queues the
//!    agent for the backend.
//!
//! Events emitted in step 5 stay queued until the next tick, so nobody
//! perceives anything retroactively.
//!
//! Uses rayon for the threat scan once the population is large enough.

use crate::core::types::{GridPos, Tick};
use crate::entity::agent::{Agent, Neighbor};
use crate::entity::status::StatusKind;
use crate::simulation::autopilot::AutopilotContext;
use crate::simulation::engine::Simulation;
use crate::simulation::events::{Event, EventKind};
use crate::world::FireChange;
use rayon::prelude::*;

const SMOKE_TICKS: u32 = 5;
const BURN_TICKS: u32 = 5;
/// Unease from each badly hurt agent in view
const INJURED_NEIGHBOR_URGENCY: f32 = 0.5;

/// Counters for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: Tick,
    pub spikes: usize,
    pub autopilot_decisions: usize,
    pub enqueued: usize,
    pub deaths: usize,
}

impl Simulation {
    /// Run one tick of `dt` simulated time units
    pub fn step(&mut self, dt: f32) -> TickSummary {
        let tick = self.tick;
        let mut summary = TickSummary {
            tick,
            ..TickSummary::default()
        };

        self.bus.process(&mut self.agents, &self.world, tick);
        self.world.tick_objects();
        self.advance_fires(tick);
        self.advance_day(tick);

        if tick % self.config.neuron.env_update_interval.max(1) == 0 {
            self.scan_threats();
        }
        self.apply_hazards();

        let neighbors: Vec<Neighbor> = self.agents.iter().map(Neighbor::of).collect();

        for idx in 0..self.agents.len() {
            if !self.agents[idx].alive {
                continue;
            }

            let spiked = self.agents[idx].update_biology(dt, tick, &self.config);
            if !self.agents[idx].alive {
                summary.deaths += 1;
                self.announce_death(idx);
                continue;
            }
            if spiked {
                summary.spikes += 1;
                tracing::debug!(agent = %self.agents[idx].name, tick, "gate spiked");
            }

            let agent = &self.agents[idx];
            if agent.waiting_for_backend || agent.last_acted_tick == Some(tick) {
                continue;
            }
            let walking = agent.autopilot.has_path() && agent.movement_cooldown == 0;
            if !(spiked || walking || agent.status.has_danger()) {
                continue;
            }

            let decision = {
                let ctx = AutopilotContext {
                    world: &self.world,
                    neighbors: &neighbors,
                    config: &self.config.autopilot,
                    max_expansions: self.config.pathfinding.max_expansions,
                    tick,
                };
                self.agents[idx].run_autopilot(&ctx, &mut self.rng)
            };

            match decision {
                Some(decision) => {
                    summary.autopilot_decisions += 1;
                    self.agents[idx].last_acted_tick = Some(tick);
                    self.execute(idx, &decision, tick);
                }
                None => {
                    if self.enqueue(idx) {
                        summary.enqueued += 1;
                    }
                }
            }
        }

        self.tick += 1;
        summary
    }

    fn announce_death(&mut self, idx: usize) {
        let agent = &self.agents[idx];
        self.bus.emit(
            Event::new(EventKind::AgentDied)
                .at(agent.position, self.config.events.disaster_radius)
                .from_agent(agent.name.clone(), agent.id)
                .with("name", agent.name.clone())
                .importance(5.0),
        );
    }

    /// Burn, spread and collapse, announcing each change around its origin
    fn advance_fires(&mut self, tick: Tick) {
        let radius = self.config.events.disaster_radius;
        for change in self.world.tick_fires(&self.config.world, &mut self.rng) {
            let event = match change {
                FireChange::Spread { name, position } => {
                    tracing::info!(tick, building = %name, %position, "fire spread");
                    Event::new(EventKind::FireStarted)
                        .at(position, radius)
                        .with("building", name)
                        .importance(3.0)
                }
                FireChange::BurnedOut { name, position } => {
                    tracing::info!(tick, building = %name, %position, "fire burned out");
                    Event::new(EventKind::FireExtinguished)
                        .at(position, radius)
                        .with("building", name)
                }
                FireChange::Collapsed { name, position } => {
                    tracing::warn!(tick, building = %name, %position, "building collapsed");
                    Event::new(EventKind::BuildingCollapsed)
                        .at(position, radius)
                        .with("building", name)
                        .importance(4.0)
                }
            };
            self.bus.emit(event);
        }
    }

    /// Track night and day, announcing each change town-wide
    fn advance_day(&mut self, tick: Tick) {
        let cfg = &self.config.world;
        let day = cfg.day_length_ticks.max(1);
        let phase = (tick % day) as f32 / day as f32;
        let night = phase < cfg.dawn_phase || phase >= cfg.dusk_phase;
        if night == self.world.is_night {
            return;
        }
        self.world.is_night = night;
        if tick == 0 {
            return;
        }
        let kind = if night { EventKind::Dusk } else { EventKind::Dawn };
        tracing::info!(tick, %kind, "day cycle");
        self.bus.emit(Event::new(kind).importance(0.5));
    }

    /// Refresh each agent's cached environmental urgency
    fn scan_threats(&mut self) {
        let disaster_radius = self.config.events.disaster_radius;
        let fire_weight = self.config.neuron.env_fire_weight;
        let night_urgency = if self.world.is_night {
            self.config.neuron.env_night_urgency
        } else {
            0.0
        };
        let nearby = self.config.actions.nearby_radius;

        let fires: Vec<(GridPos, f32)> = self
            .world
            .objects
            .iter()
            .filter_map(|obj| {
                let fire = obj.capabilities.flammable()?;
                fire.burning.then_some((obj.position, fire.intensity))
            })
            .collect();
        let injured: Vec<GridPos> = self
            .agents
            .iter()
            .filter(|a| a.alive && a.max_health > 0.0 && a.health / a.max_health < 0.5)
            .map(|a| a.position)
            .collect();

        let assess = |agent: &mut Agent| {
            if !agent.alive {
                agent.env_urgency = 0.0;
                return;
            }
            let fire: f32 = fires
                .iter()
                .map(|(pos, intensity)| (agent.position.distance(pos), intensity))
                .filter(|(d, _)| *d <= disaster_radius)
                .map(|(d, intensity)| intensity * fire_weight / d.max(1.0))
                .sum();
            let hurt = injured
                .iter()
                .filter(|pos| **pos != agent.position && pos.distance(&agent.position) <= nearby)
                .count() as f32;
            agent.env_urgency = fire + hurt * INJURED_NEIGHBOR_URGENCY + night_urgency;
        };

        if self.agents.len() > self.config.world.parallel_threshold {
            self.agents.par_iter_mut().for_each(assess);
        } else {
            self.agents.iter_mut().for_each(assess);
        }
    }

    fn apply_hazards(&mut self) {
        for agent in self.agents.iter_mut().filter(|a| a.alive) {
            if self.world.map.has_smoke(agent.position) {
                agent.status.apply(StatusKind::SmokeInhalation, SMOKE_TICKS);
            }
            let scorched = (-1..=1)
                .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                .any(|(dx, dy)| {
                    self.world
                        .burning_at(GridPos::new(agent.position.x + dx, agent.position.y + dy))
                });
            if scorched {
                agent.status.apply(StatusKind::Burned, BURN_TICKS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use crate::entity::role::Role;
    use crate::simulation::decision::ActionKind;
    use crate::world::objects::WorldObject;
    use crate::world::{Terrain, TileMap, World};

    fn sim(config: SimulationConfig) -> Simulation {
        let mut world = World::new(TileMap::new(30, 30, Terrain::Plaza));
        world.place(WorldObject::new("Bakery", GridPos::new(15, 15)).solid().flammable());
        Simulation::new(config, world, 11)
    }

    #[test]
    fn test_tick_advances() {
        let mut sim = sim(SimulationConfig::default());
        sim.spawn_agent("Marcus", Role::Merchant, GridPos::new(2, 2));
        let first = sim.step(1.0);
        let second = sim.step(1.0);
        assert_eq!(first.tick, 0);
        assert_eq!(second.tick, 1);
        assert_eq!(sim.tick(), 2);
    }

    #[test]
    fn test_events_are_perceived_next_tick() {
        let mut sim = sim(SimulationConfig::default());
        let id = sim.spawn_agent("Marcus", Role::Merchant, GridPos::new(13, 15));
        sim.ignite("Bakery", 5.0);

        sim.step(1.0);
        let agent = sim.agent(id).unwrap();
        assert!(agent
            .memory
            .short_term()
            .any(|m| m.text.contains("fire has broken out at Bakery")));
    }

    #[test]
    fn test_fire_raises_threat_and_danger() {
        let mut sim = sim(SimulationConfig::default());
        let near = sim.spawn_agent("Near", Role::Plebeian, GridPos::new(14, 15));
        let far = sim.spawn_agent("Far", Role::Plebeian, GridPos::new(1, 1));
        sim.ignite("Bakery", 5.0);
        sim.step(1.0);

        let near = sim.agent(near).unwrap();
        let far = sim.agent(far).unwrap();
        assert!(near.env_urgency > far.env_urgency);
        assert!(near.status.has(StatusKind::Burned));
        assert!(!far.status.has_danger());
    }

    #[test]
    fn test_collapse_is_heard_nearby_and_clears_the_tile() {
        let mut sim = sim(SimulationConfig::default());
        let shack = GridPos::new(5, 5);
        sim.world.place(
            WorldObject::new("Shack", shack)
                .solid()
                .flammable()
                .structural(4.0),
        );
        let near = sim.spawn_agent("Near", Role::Plebeian, GridPos::new(5, 9));
        let far = sim.spawn_agent("Far", Role::Plebeian, GridPos::new(28, 2));
        sim.ignite("Shack", 5.0);

        // Collapses on the second tick, heard on the third
        for _ in 0..3 {
            sim.step(1.0);
        }

        assert!(sim.world.is_walkable(shack));
        assert!(sim.world.objects.find_by_name("Shack").is_none());
        let heard = |id| {
            sim.agent(id)
                .unwrap()
                .memory
                .short_term()
                .any(|m| m.text.contains("Shack has collapsed"))
        };
        assert!(heard(near));
        assert!(!heard(far));
    }

    #[test]
    fn test_agent_in_danger_flees_on_autopilot() {
        let mut sim = sim(SimulationConfig::default());
        let id = sim.spawn_agent("Marcus", Role::Merchant, GridPos::new(14, 15));
        sim.ignite("Bakery", 5.0);
        let summary = sim.step(1.0);

        assert_eq!(summary.autopilot_decisions, 1);
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.decision_log.back().unwrap().decision.action, ActionKind::Move);
        assert_ne!(agent.position, GridPos::new(14, 15));
    }

    #[test]
    fn test_parallel_scan_matches_serial() {
        let mut serial = SimulationConfig::default();
        serial.world.parallel_threshold = usize::MAX;
        let mut parallel = SimulationConfig::default();
        parallel.world.parallel_threshold = 0;

        let mut a = sim(serial);
        let mut b = sim(parallel);
        for s in [&mut a, &mut b] {
            for i in 0..6 {
                s.spawn_agent(format!("A{i}"), Role::Plebeian, GridPos::new(10 + i, 12));
            }
            s.ignite("Bakery", 4.0);
            s.scan_threats();
        }
        for (x, y) in a.agents.iter().zip(b.agents.iter()) {
            assert!((x.env_urgency - y.env_urgency).abs() < 1e-4);
        }
    }

    #[test]
    fn test_spiking_agent_without_plan_is_queued_once() {
        let mut config = SimulationConfig::default();
        config.neuron.baseline_urgency = 500.0;
        let mut sim = sim(config);
        let id = sim.spawn_agent("Marcus", Role::Merchant, GridPos::new(2, 2));

        let mut enqueued = 0;
        for _ in 0..5 {
            enqueued += sim.step(1.0).enqueued;
        }
        assert_eq!(enqueued, 1);
        assert!(sim.agent(id).unwrap().waiting_for_backend);
        assert_eq!(sim.queue().len(), 1);
    }

    #[test]
    fn test_day_cycle_announces_dawn() {
        let mut config = SimulationConfig::default();
        config.world.day_length_ticks = 10;
        let mut sim = sim(config);
        sim.spawn_agent("Marcus", Role::Merchant, GridPos::new(2, 2));

        sim.step(1.0);
        assert!(sim.world.is_night);
        sim.step(1.0);
        sim.step(1.0);
        assert!(!sim.world.is_night);
        sim.step(1.0);
        assert_eq!(sim.bus.recent_events(5, Some(&EventKind::Dawn)).len(), 1);
    }

    #[test]
    fn test_starvation_death_is_announced() {
        let mut sim = sim(SimulationConfig::default());
        let id = sim.spawn_agent("Marcus", Role::Merchant, GridPos::new(2, 2));
        sim.spawn_agent("Livia", Role::Priest, GridPos::new(3, 2));
        sim.agents[0].health = 0.1;
        sim.agents[0].drives.thirst = 100.0;

        let summary = sim.step(1.0);
        assert_eq!(summary.deaths, 1);
        assert!(!sim.agent(id).unwrap().alive);
        sim.step(1.0);
        assert!(sim.agents[1]
            .memory
            .short_term()
            .any(|m| m.text == "Marcus has died!"));
    }
}
