//! Simulation configuration with documented constants
//!
//! All tuning numbers live here. Every section has a default, so a TOML file
//! only needs to name the values it changes:
//!
//! ```toml
//! [worker]
//! batch_size = 4
//!
//! [autopilot]
//! max_ticks = 20
//! ```

use crate::core::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration passed explicitly to every component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub neuron: NeuronConfig,
    pub autopilot: AutopilotConfig,
    pub pathfinding: PathfindingConfig,
    pub events: EventConfig,
    pub worker: WorkerConfig,
    pub backend: BackendConfig,
    pub actions: ActionConfig,
    pub biology: BiologyConfig,
    pub memory: MemoryConfig,
    pub world: WorldConfig,
    pub logging: LoggingConfig,
}

// === NEURON GATE ===

/// Relative weight of each drive in the urgency input current
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveWeights {
    pub hunger: f32,
    pub thirst: f32,
    pub energy: f32,
    pub social: f32,
    pub comfort: f32,
}

impl Default for DriveWeights {
    fn default() -> Self {
        Self {
            hunger: 10.0,
            thirst: 12.0,
            energy: 5.0,
            social: 2.0,
            comfort: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuronConfig {
    /// Constant input added every tick so a fully satisfied agent still
    /// escalates eventually
    pub baseline_urgency: f32,

    /// Weights for the `0.5 * r + r^2` drive pressure terms
    pub drive_weights: DriveWeights,

    /// Scale of the `(1 - health_ratio)^1.5` health deficit term
    pub health_weight: f32,

    /// Potential is clamped to this ceiling (raised to the threshold if lower)
    pub saturation_ceiling: f32,

    /// Fractional spread applied to role profiles per agent (0.2 = ±20%)
    ///
    /// Keeps agents of the same role from spiking in lockstep.
    pub jitter: f32,

    /// Urgency per unit of fire intensity, divided by distance
    pub env_fire_weight: f32,

    /// Unease for agents outdoors at night
    pub env_night_urgency: f32,

    /// Ticks between environmental threat scans
    pub env_update_interval: u64,

    /// Potential added when another agent speaks to this one
    pub speech_nudge: f32,

    /// Potential added when this agent is attacked and survives
    pub attack_nudge: f32,
}

impl Default for NeuronConfig {
    fn default() -> Self {
        Self {
            baseline_urgency: 0.3,
            drive_weights: DriveWeights::default(),
            health_weight: 20.0,
            saturation_ceiling: 1000.0,
            jitter: 0.2,
            env_fire_weight: 2.0,
            env_night_urgency: 1.0,
            env_update_interval: 10,
            speech_nudge: 3.0,
            attack_nudge: 5.0,
        }
    }
}

// === AUTOPILOT ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Consecutive autopilot calls before control is handed back to the
    /// backend for a fresh look
    pub max_ticks: u32,

    /// Thirst/hunger level (0-100) above which the need is critical
    pub critical_need: f32,

    /// Health below which medicine is used reflexively
    pub critical_health: f32,

    /// Social drive above which a familiar face gets greeted
    pub loneliness: f32,

    /// Energy drive above which an idle agent rests
    pub fatigue: f32,

    /// Energy drive above which any agent rests, whatever it was doing
    pub exhaustion: f32,

    /// Minimum familiarity/trust for an autopilot greeting
    pub greeting_familiarity: f32,
    pub greeting_trust: f32,

    /// Distance within which others count as "nearby" for greetings
    pub greeting_radius: f32,

    /// Combat roles engage hostiles within this distance
    pub strike_range: f32,

    /// Grouped roles regroup when the nearest ally is farther than this
    pub formation_radius: f32,

    /// How far a grouped role looks for allies
    pub cohesion_range: f32,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            max_ticks: 30,
            critical_need: 70.0,
            critical_health: 25.0,
            loneliness: 60.0,
            fatigue: 65.0,
            exhaustion: 85.0,
            greeting_familiarity: 20.0,
            greeting_trust: 10.0,
            greeting_radius: 5.0,
            strike_range: 2.0,
            formation_radius: 4.0,
            cohesion_range: 12.0,
        }
    }
}

// === PATHFINDING ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Node expansions per search before settling for a partial path
    ///
    /// Agents chain partial paths across ticks, so this bounds the cost of a
    /// single tick rather than the length of a trip.
    pub max_expansions: usize,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            max_expansions: 2000,
        }
    }
}

// === EVENTS ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Delivered events kept for `recent_events` queries
    pub history_cap: usize,

    /// Retellings allowed before a rumor stops spreading
    pub max_gossip_hops: u8,

    /// Perceived importance is scaled by this once per hop travelled
    pub gossip_decay: f32,

    /// Importance kept by each retelling
    pub retelling_factor: f32,

    /// Perception radius for speech events
    pub speech_radius: f32,

    /// Perception radius for fires and collapses
    pub disaster_radius: f32,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            history_cap: 500,
            max_gossip_hops: 3,
            gossip_decay: 0.7,
            retelling_factor: 0.7,
            speech_radius: 6.0,
            disaster_radius: 10.0,
        }
    }
}

// === DECISION WORKER ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Agents drained from the queue per round trip
    pub batch_size: usize,

    /// Sleep when the queue is empty (milliseconds)
    pub idle_sleep_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            idle_sleep_ms: 100,
        }
    }
}

// === REASONING BACKEND ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Chat completion endpoint. `None` runs the scripted backend.
    pub api_url: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,

    /// Artificial latency for the scripted backend (milliseconds)
    pub scripted_latency_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key_env: "LLM_API_KEY".into(),
            model: "Qwen/Qwen3-8B-AWQ".into(),
            temperature: 0.2,
            max_tokens: 256,
            timeout_secs: 30,
            scripted_latency_ms: 30,
        }
    }
}

// === ACTIONS ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Base reach for object interaction (objects are usable at +3 tiles)
    pub interaction_radius: f32,
    pub talk_radius: f32,
    /// Trade partners and "nearby" agents for the scripted backend
    pub nearby_radius: f32,
    pub attack_radius: f32,
    pub unarmed_damage: f32,
    pub rest_energy: f32,
    pub sleep_energy: f32,
    pub sleep_comfort: f32,
    pub inspect_object_radius: f32,
    pub inspect_agent_radius: f32,
    /// Failed MOVE attempts in a row before the active path is dropped
    pub blocked_path_limit: u32,
    /// Importance given to reflections so they reach long-term memory
    pub reflection_importance: f32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            interaction_radius: 2.0,
            talk_radius: 8.0,
            nearby_radius: 5.0,
            attack_radius: 2.0,
            unarmed_damage: 5.0,
            rest_energy: 10.0,
            sleep_energy: 30.0,
            sleep_comfort: 10.0,
            inspect_object_radius: 6.0,
            inspect_agent_radius: 8.0,
            blocked_path_limit: 3,
            reflection_importance: 4.0,
        }
    }
}

// === BIOLOGY ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiologyConfig {
    /// Drive growth per unit of simulated time (drives run 0-100)
    pub hunger_rate: f32,
    pub thirst_rate: f32,
    pub energy_rate: f32,
    pub social_rate: f32,
    pub comfort_rate: f32,

    /// Health recovered per unit time while fed and rested
    pub health_regen: f32,

    /// Metabolic multiplier while walking
    pub moving_multiplier: f32,

    /// Freshness lost per unit time by spoilable items
    pub spoil_rate: f32,

    pub inventory_capacity: usize,
}

impl Default for BiologyConfig {
    fn default() -> Self {
        Self {
            hunger_rate: 0.12,
            thirst_rate: 0.10,
            energy_rate: 0.08,
            social_rate: 0.05,
            comfort_rate: 0.03,
            health_regen: 0.2,
            moving_multiplier: 1.5,
            spoil_rate: 0.001,
            inventory_capacity: 12,
        }
    }
}

// === MEMORY ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub short_term_cap: usize,
    pub long_term_cap: usize,
    /// Entries at or above this importance are copied to long-term memory
    pub promote_importance: f32,
    /// Observations at or above this importance become retellable rumors
    pub rumor_importance: f32,
    pub rumor_cap: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_cap: 20,
            long_term_cap: 50,
            promote_importance: 3.0,
            rumor_importance: 3.0,
            rumor_cap: 8,
        }
    }
}

// === WORLD ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub day_length_ticks: u64,
    /// Fraction of the day at which dawn / dusk are announced
    pub dawn_phase: f32,
    pub dusk_phase: f32,
    /// Entity count above which the threat scan runs on the rayon pool
    pub parallel_threshold: usize,
    /// Per-tick chance that a burning object throws sparks at its neighbors
    pub fire_spread_chance: f32,
    /// Chance that a neighbor hit by sparks catches
    pub fire_catch_chance: f32,
    /// Intensity of a fire started by sparks
    pub spread_intensity: f32,
    pub max_fire_intensity: f32,
    /// Structural hp lost per tick of burning
    pub fire_damage: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            day_length_ticks: 2400,
            dawn_phase: 0.2,
            dusk_phase: 0.7,
            parallel_threshold: 256,
            fire_spread_chance: 0.05,
            fire_catch_chance: 0.3,
            spread_intensity: 5.0,
            max_fire_intensity: 20.0,
            fire_damage: 2.0,
        }
    }
}

// === LOGGING ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "civitas=info".into(),
            ansi: true,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(source)?;
        config.validate().map_err(SimError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.autopilot.fatigue >= 100.0 || self.autopilot.critical_need > 100.0 {
            return Err("drive thresholds must lie within 0-100".into());
        }

        if self.autopilot.fatigue >= self.autopilot.critical_need + 30.0 {
            return Err(format!(
                "fatigue ({}) should sit near or below critical_need ({})",
                self.autopilot.fatigue, self.autopilot.critical_need
            ));
        }

        if self.autopilot.exhaustion < self.autopilot.fatigue || self.autopilot.exhaustion > 100.0 {
            return Err(format!(
                "exhaustion ({}) must lie between fatigue ({}) and 100",
                self.autopilot.exhaustion, self.autopilot.fatigue
            ));
        }

        if self.autopilot.max_ticks == 0 {
            return Err("autopilot.max_ticks must be positive".into());
        }

        if self.worker.batch_size == 0 {
            return Err("worker.batch_size must be positive".into());
        }

        if self.pathfinding.max_expansions == 0 {
            return Err("pathfinding.max_expansions must be positive".into());
        }

        if !(0.0..1.0).contains(&self.events.gossip_decay) {
            return Err(format!(
                "events.gossip_decay ({}) must be in [0, 1) so rumors fade",
                self.events.gossip_decay
            ));
        }

        if !(0.0..1.0).contains(&self.events.retelling_factor) {
            return Err(format!(
                "events.retelling_factor ({}) must be in [0, 1) so retellings weaken",
                self.events.retelling_factor
            ));
        }

        if self.events.history_cap == 0 {
            return Err("events.history_cap must be positive".into());
        }

        if !(0.0..1.0).contains(&self.world.dawn_phase)
            || !(0.0..1.0).contains(&self.world.dusk_phase)
            || self.world.dawn_phase >= self.world.dusk_phase
        {
            return Err("world.dawn_phase must precede world.dusk_phase within the day".into());
        }

        if self.world.day_length_ticks == 0 {
            return Err("world.day_length_ticks must be positive".into());
        }

        if !(0.0..=1.0).contains(&self.world.fire_spread_chance)
            || !(0.0..=1.0).contains(&self.world.fire_catch_chance)
        {
            return Err("world fire chances must be probabilities".into());
        }

        Ok(())
    }
}
