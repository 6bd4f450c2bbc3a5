//! The slow path: prompts, backends, parsing and the decision worker

pub mod client;
pub mod context;
pub mod parser;
pub mod scripted;
pub mod worker;

pub use client::LlmClient;
pub use context::AgentContext;
pub use parser::{parse_decision, parse_json};
pub use scripted::ScriptedBackend;
pub use worker::{DecisionQueue, DecisionWorker};

use crate::core::config::ActionConfig;
use crate::core::error::Result;
use crate::core::types::{AgentId, Tick};
use crate::entity::agent::Agent;
use crate::simulation::decision::Decision;
use crate::world::World;
use rand::Rng;
use std::future::Future;

pub const SYSTEM_PROMPT: &str = "You are a townsperson in a living simulation. \
    Stay in character, look after your body first, and answer with a single JSON object.";

/// Everything the worker needs for one backend round trip, captured under
/// the simulation lock
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub agent: AgentId,
    pub agent_name: String,
    pub prompt: String,
    /// Local best guess, used when the backend fails
    pub heuristic: Decision,
}

impl DecisionRequest {
    pub fn capture<R: Rng>(
        agents: &[Agent],
        idx: usize,
        world: &World,
        tick: Tick,
        config: &ActionConfig,
        rng: &mut R,
    ) -> Option<Self> {
        let context = AgentContext::capture(agents, idx, world, tick, config)?;
        let agent = agents.get(idx)?;
        Some(Self {
            agent: agent.id,
            agent_name: agent.name.clone(),
            prompt: context.prompt(),
            heuristic: scripted::heuristic_decision(agents, idx, world, config, rng),
        })
    }
}

/// An opaque, unreliable, high-latency text service
pub trait ReasoningBackend: Send + Sync + 'static {
    /// Raw response text for one request
    fn complete(&self, request: &DecisionRequest) -> impl Future<Output = Result<String>> + Send;
}
