//! The simulated townsperson

use crate::core::config::{NeuronConfig, SimulationConfig};
use crate::core::types::{AgentId, Direction, GridPos, Tick};
use crate::entity::drives::{DriveKind, Drives, GrowthRates};
use crate::entity::inventory::Inventory;
use crate::entity::memory::{Memory, MemoryEntry, MemoryKind};
use crate::entity::neuron::{GateSnapshot, NeuronGate};
use crate::entity::role::Role;
use crate::entity::status::StatusEffects;
use crate::simulation::autopilot::{Autopilot, AutopilotContext, AutopilotSnapshot};
use crate::simulation::decision::Decision;
use crate::world::World;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const DECISION_LOG_CAP: usize = 20;

/// Current action label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    #[default]
    Idle,
    Moving,
    Talking,
    Interacting,
    Consuming,
    Trading,
    Resting,
    Sleeping,
    Working,
    Inspecting,
    Crafting,
    Reflecting,
    Attacking,
    Dead,
}

impl Activity {
    pub fn label(&self) -> &'static str {
        match self {
            Activity::Idle => "IDLE",
            Activity::Moving => "MOVING",
            Activity::Talking => "TALKING",
            Activity::Interacting => "INTERACTING",
            Activity::Consuming => "CONSUMING",
            Activity::Trading => "TRADING",
            Activity::Resting => "RESTING",
            Activity::Sleeping => "SLEEPING",
            Activity::Working => "WORKING",
            Activity::Inspecting => "INSPECTING",
            Activity::Crafting => "CRAFTING",
            Activity::Reflecting => "REFLECTING",
            Activity::Attacking => "ATTACKING",
            Activity::Dead => "DEAD",
        }
    }
}

/// Speech waiting for a reply
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSpeech {
    pub speaker: AgentId,
    pub speaker_name: String,
    pub message: String,
    pub tick: Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub tick: Tick,
    pub decision: Decision,
}

/// Gate and autopilot state, enough to resume an agent mid-decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMindSnapshot {
    pub gate: GateSnapshot,
    pub autopilot: AutopilotSnapshot,
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub position: GridPos,
    pub drives: Drives,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    /// Attacked on sight by combat roles
    pub hostile: bool,
    pub activity: Activity,
    pub gate: NeuronGate,
    pub autopilot: Autopilot,
    pub inventory: Inventory,
    pub memory: Memory,
    pub status: StatusEffects,
    pub movement_cooldown: u32,
    /// Cached environmental threat, refreshed by the periodic scan
    pub env_urgency: f32,
    /// Set while a backend request for this agent is outstanding
    pub waiting_for_backend: bool,
    pub last_acted_tick: Option<Tick>,
    pub current_thought: String,
    pub last_speech: Option<String>,
    pub pending_speech: Option<PendingSpeech>,
    pub decision_log: VecDeque<DecisionRecord>,
    /// Local time fed to the gate
    pub clock: f32,
    pub death_tick: Option<Tick>,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: Role, position: GridPos, config: &SimulationConfig) -> Self {
        let id = AgentId::new();
        let params = role.gate_params(id, config.neuron.jitter);
        Self {
            id,
            name: name.into(),
            role,
            position,
            drives: Drives::default(),
            health: 100.0,
            max_health: 100.0,
            alive: true,
            hostile: false,
            activity: Activity::Idle,
            gate: NeuronGate::new(params, config.neuron.saturation_ceiling),
            autopilot: Autopilot::new(),
            inventory: Inventory::new(config.biology.inventory_capacity),
            memory: Memory::new(config.memory.clone()),
            status: StatusEffects::new(),
            movement_cooldown: 0,
            env_urgency: 0.0,
            waiting_for_backend: false,
            last_acted_tick: None,
            current_thought: String::new(),
            last_speech: None,
            pending_speech: None,
            decision_log: VecDeque::with_capacity(DECISION_LOG_CAP),
            clock: 0.0,
            death_tick: None,
        }
    }

    /// Gate input: baseline, drive pressure, status effects, health deficit
    /// and the cached environmental threat
    pub fn urgency(&self, config: &NeuronConfig) -> f32 {
        let mut urgency = config.baseline_urgency;
        urgency += self.drives.pressure(&config.drive_weights);
        urgency += self.status.total_urgency();
        if self.health < self.max_health && self.max_health > 0.0 {
            let deficit = (1.0 - self.health / self.max_health).clamp(0.0, 1.0);
            urgency += deficit.powf(1.5) * config.health_weight;
        }
        urgency + self.env_urgency
    }

    /// Advance drives, status effects and health by `dt`, then integrate the
    /// gate. Returns `true` when the gate spikes.
    pub fn update_biology(&mut self, dt: f32, tick: Tick, config: &SimulationConfig) -> bool {
        self.clock += dt;
        if !self.alive {
            return false;
        }

        let status_damage = self.status.tick();
        self.movement_cooldown = self.movement_cooldown.saturating_sub(1);

        let bio = &config.biology;
        let moving = if self.activity == Activity::Moving {
            bio.moving_multiplier
        } else {
            1.0
        };
        self.drives.grow(
            dt,
            GrowthRates {
                hunger: bio.hunger_rate * self.status.hunger_multiplier() * moving,
                thirst: bio.thirst_rate * self.status.thirst_multiplier() * moving,
                energy: bio.energy_rate * self.status.energy_multiplier() * moving,
                social: bio.social_rate,
                comfort: bio.comfort_rate,
            },
        );

        for item in self.inventory.iter_mut() {
            item.tick_spoilage(dt, bio.spoil_rate);
        }

        self.health -= status_damage;
        if self.drives.hunger > 90.0 {
            self.health -= 0.5 * dt;
        }
        if self.drives.thirst > 90.0 {
            self.health -= 0.8 * dt;
        } else if self.drives.hunger < 50.0 && self.drives.energy < 50.0 {
            self.health = (self.health + bio.health_regen * dt).min(self.max_health);
        }

        if self.health <= 0.0 {
            self.die(tick);
            return false;
        }

        let input = self.urgency(&config.neuron);
        self.gate.update(dt, input, self.clock)
    }

    fn die(&mut self, tick: Tick) {
        self.health = 0.0;
        self.alive = false;
        self.activity = Activity::Dead;
        self.death_tick = Some(tick);
        self.autopilot.clear_path();
        tracing::info!(agent = %self.name, tick, "agent died");
    }

    /// Returns `true` if this blow killed the agent
    pub fn take_damage(&mut self, amount: f32, tick: Tick) -> bool {
        if !self.alive {
            return false;
        }
        self.health = (self.health - amount.max(0.0)).max(0.0);
        if self.health <= 0.0 {
            self.die(tick);
            return true;
        }
        false
    }

    /// Another agent addressed this one. The reply is left to the backend.
    pub fn receive_speech(
        &mut self,
        speaker: AgentId,
        speaker_name: &str,
        message: &str,
        tick: Tick,
        nudge: f32,
    ) {
        self.memory.add(
            MemoryEntry::new(format!("{speaker_name} said to you: \"{message}\""), tick, 2.5)
                .kind(MemoryKind::Conversation)
                .about(speaker),
        );
        let rel = self.memory.update_relationship(speaker, speaker_name, 1.0, tick);
        rel.last_said_to_me = Some(message.to_string());
        self.drives.satisfy(DriveKind::Social, 5.0);
        self.gate.nudge(nudge);
        self.pending_speech = Some(PendingSpeech {
            speaker,
            speaker_name: speaker_name.to_string(),
            message: message.to_string(),
            tick,
        });
        self.autopilot.request_override();
    }

    /// Move one tile. The error carries a human-readable reason.
    pub fn try_step(&mut self, direction: Direction, world: &World) -> Result<(), String> {
        if self.movement_cooldown > 0 {
            return Err("You are still catching your breath.".to_string());
        }
        let next = self.position.step(direction);
        let Some(tile) = world.map.tile(next) else {
            return Err("You cannot go that way, it is the edge of the world.".to_string());
        };
        if !tile.is_walkable() {
            return Err(format!(
                "The way {direction} is blocked ({}).",
                tile.terrain.name()
            ));
        }

        let cost = tile.movement_cost();
        self.movement_cooldown = (cost.round() as u32).max(1);
        self.position = next;
        self.activity = Activity::Moving;
        self.drives.strain(DriveKind::Energy, 0.5 * cost);
        Ok(())
    }

    /// Let the autopilot decide for this agent
    pub fn run_autopilot<R: Rng>(&mut self, ctx: &AutopilotContext<'_>, rng: &mut R) -> Option<Decision> {
        let mut autopilot = std::mem::take(&mut self.autopilot);
        let decision = autopilot.decide(self, ctx, rng);
        self.autopilot = autopilot;
        decision
    }

    pub fn record_decision(&mut self, decision: &Decision, tick: Tick) {
        self.current_thought = decision.thought.clone();
        self.decision_log.push_back(DecisionRecord {
            tick,
            decision: decision.clone(),
        });
        while self.decision_log.len() > DECISION_LOG_CAP {
            self.decision_log.pop_front();
        }
    }

    pub fn snapshot_mind(&self) -> AgentMindSnapshot {
        AgentMindSnapshot {
            gate: self.gate.snapshot(),
            autopilot: self.autopilot.snapshot(),
        }
    }

    pub fn restore_mind(&mut self, snapshot: AgentMindSnapshot) {
        self.gate.restore(snapshot.gate);
        self.autopilot.restore(snapshot.autopilot);
    }
}

/// Read-only view of another agent, taken at the start of a tick
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub position: GridPos,
    pub health: f32,
    pub alive: bool,
    pub hostile: bool,
}

impl Neighbor {
    pub fn of(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            role: agent.role,
            position: agent.position,
            health: agent.health,
            alive: agent.alive,
            hostile: agent.hostile,
        }
    }
}
