//! The simulation state shared between the tick loop and the decision worker

use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{AgentId, GridPos, Tick};
use crate::entity::agent::Agent;
use crate::entity::role::Role;
use crate::llm::worker::DecisionQueue;
use crate::llm::DecisionRequest;
use crate::simulation::decision::Decision;
use crate::simulation::events::{Event, EventBus, EventKind};
use crate::simulation::executor::{ActionExecutor, ActionOutcome};
use crate::world::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The single coarse lock around all mutable simulation state
pub type SharedSimulation = Arc<Mutex<Simulation>>;

/// Default fire intensity for `ignite`
pub const DEFAULT_FIRE_INTENSITY: f32 = 5.0;

pub struct Simulation {
    pub config: SimulationConfig,
    pub world: World,
    pub agents: Vec<Agent>,
    pub bus: EventBus,
    pub(crate) executor: ActionExecutor,
    queue: Arc<DecisionQueue>,
    pub(crate) tick: Tick,
    pub(crate) rng: ChaCha8Rng,
}

impl Simulation {
    pub fn new(config: SimulationConfig, world: World, seed: u64) -> Self {
        Self {
            bus: EventBus::new(&config.events),
            executor: ActionExecutor::new(&config),
            queue: Arc::new(DecisionQueue::new()),
            tick: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            agents: Vec::new(),
            world,
            config,
        }
    }

    pub fn into_shared(self) -> SharedSimulation {
        Arc::new(Mutex::new(self))
    }

    /// Lock the shared state. A panic elsewhere while holding the lock does
    /// not stop the simulation.
    pub fn lock(shared: &SharedSimulation) -> MutexGuard<'_, Simulation> {
        shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Index of the tick that runs next
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn queue(&self) -> Arc<DecisionQueue> {
        Arc::clone(&self.queue)
    }

    pub fn spawn_agent(&mut self, name: impl Into<String>, role: Role, position: GridPos) -> AgentId {
        let agent = Agent::new(name, role, position, &self.config);
        let id = agent.id;
        tracing::debug!(agent = %agent.name, %role, %position, "agent spawned");
        self.agents.push(agent);
        id
    }

    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.agents.iter().position(|a| a.id == id)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    pub fn agent_by_name(&self, name: &str) -> Option<&Agent> {
        self.agents
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn living(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    /// Hand `agents[idx]` to the decision worker
    pub fn enqueue(&mut self, idx: usize) -> bool {
        match self.agents.get_mut(idx) {
            Some(agent) => self.queue.enqueue(agent),
            None => false,
        }
    }

    /// Snapshot a queued agent for the backend. `None` if the agent is gone.
    pub fn decision_request(&mut self, id: AgentId) -> Option<DecisionRequest> {
        let idx = self.index_of(id)?;
        if !self.agents[idx].alive {
            return None;
        }
        DecisionRequest::capture(
            &self.agents,
            idx,
            &self.world,
            self.tick,
            &self.config.actions,
            &mut self.rng,
        )
    }

    /// Clear the waiting flag without acting
    pub fn release(&mut self, id: AgentId) {
        if let Some(agent) = self.agent_mut(id) {
            agent.waiting_for_backend = false;
        }
    }

    /// Execute a decision that came back from the backend. The waiting flag
    /// is cleared whatever happens; `Ok(None)` means the agent died while the
    /// request was in flight.
    pub fn apply_backend_decision(
        &mut self,
        id: AgentId,
        decision: &Decision,
    ) -> Result<Option<ActionOutcome>> {
        let idx = self.index_of(id).ok_or(SimError::AgentNotFound(id))?;
        let agent = &mut self.agents[idx];
        agent.waiting_for_backend = false;
        agent.pending_speech = None;
        if !agent.alive {
            return Ok(None);
        }

        // Counts as the agent's action for the upcoming tick
        let tick = self.tick;
        agent.last_acted_tick = Some(tick);
        tracing::debug!(
            agent = %agent.name,
            action = %decision.action,
            provenance = ?decision.provenance,
            "backend decision"
        );
        Ok(Some(self.execute(idx, decision, tick)))
    }

    pub(crate) fn execute(&mut self, idx: usize, decision: &Decision, tick: Tick) -> ActionOutcome {
        self.executor.execute(
            &mut self.world,
            &mut self.agents,
            &mut self.bus,
            idx,
            decision,
            tick,
        )
    }

    /// Set a named structure on fire and announce it to everyone in range
    pub fn ignite(&mut self, building: &str, intensity: f32) -> Option<GridPos> {
        let id = self.world.objects.find_by_name(building)?.id;
        let origin = self.world.ignite(id, intensity)?;
        tracing::info!(building, %origin, "fire started");
        self.bus.emit(
            Event::new(EventKind::FireStarted)
                .at(origin, self.config.events.disaster_radius)
                .with("building", building)
                .importance(3.0),
        );
        Some(origin)
    }

    pub fn extinguish(&mut self, building: &str) -> Option<GridPos> {
        let id = self.world.objects.find_by_name(building)?.id;
        let origin = self.world.extinguish(id)?;
        tracing::info!(building, %origin, "fire extinguished");
        self.bus.emit(
            Event::new(EventKind::FireExtinguished)
                .at(origin, self.config.events.disaster_radius)
                .with("building", building),
        );
        Some(origin)
    }

    /// A town-wide announcement, heard by everyone next tick
    pub fn announce(&mut self, text: &str) {
        self.bus.emit(
            Event::new(EventKind::Announcement)
                .with("text", text)
                .importance(2.0),
        );
    }
}
