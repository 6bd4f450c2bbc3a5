//! Spatial publish/subscribe with decaying gossip
//!
//! Events are queued with `emit` and delivered by `process`, which the tick
//! loop calls once at the start of each tick. Anything emitted while agents
//! are deciding is therefore perceived on the following tick.

use crate::core::config::EventConfig;
use crate::core::error::Result;
use crate::core::types::{AgentId, GridPos, Tick};
use crate::entity::agent::Agent;
use crate::entity::memory::{MemoryEntry, MemoryKind, Rumor};
use crate::world::World;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FireStarted,
    FireExtinguished,
    BuildingCollapsed,
    Speech,
    AgentDied,
    Fight,
    TradeCompleted,
    Dawn,
    Dusk,
    Gossip,
    Announcement,
    Custom(String),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::FireStarted => "fire_started",
            EventKind::FireExtinguished => "fire_extinguished",
            EventKind::BuildingCollapsed => "building_collapsed",
            EventKind::Speech => "speech",
            EventKind::AgentDied => "agent_died",
            EventKind::Fight => "fight",
            EventKind::TradeCompleted => "trade_completed",
            EventKind::Dawn => "dawn",
            EventKind::Dusk => "dusk",
            EventKind::Gossip => "gossip",
            EventKind::Announcement => "announcement",
            EventKind::Custom(name) => name,
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub origin: Option<GridPos>,
    /// Perception radius around `origin`. 0 = global.
    pub radius: f32,
    pub payload: BTreeMap<String, String>,
    pub source: Option<String>,
    pub source_id: Option<AgentId>,
    /// Restrict delivery to a single agent (gossip to a conversation partner)
    pub recipient: Option<AgentId>,
    /// Stamped by `process`
    pub tick: Tick,
    pub importance: f32,
    pub gossip_hops: u8,
    /// Retelling limit. `None` until `emit` applies the bus limit.
    pub max_hops: Option<u8>,
    pub consumed_by: AHashSet<AgentId>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            origin: None,
            radius: 0.0,
            payload: BTreeMap::new(),
            source: None,
            source_id: None,
            recipient: None,
            tick: 0,
            importance: 1.0,
            gossip_hops: 0,
            max_hops: None,
            consumed_by: AHashSet::new(),
        }
    }

    /// Perceivable within `radius` of `origin`
    pub fn at(mut self, origin: GridPos, radius: f32) -> Self {
        self.origin = Some(origin);
        self.radius = radius.max(0.0);
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn from_agent(mut self, name: impl Into<String>, id: AgentId) -> Self {
        self.source = Some(name.into());
        self.source_id = Some(id);
        self
    }

    pub fn to(mut self, recipient: AgentId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }

    /// A rumor held in memory, as an event that can be retold
    pub fn from_rumor(teller: &str, teller_id: AgentId, rumor: &Rumor) -> Self {
        let mut event = Event::new(EventKind::Gossip)
            .with("text", rumor.text.clone())
            .from_agent(teller, teller_id)
            .importance(rumor.importance);
        event.gossip_hops = rumor.hops;
        event.max_hops = rumor.max_hops;
        event.tick = rumor.tick;
        event
    }

    /// Text worth retelling
    fn story(&self) -> String {
        self.get("text")
            .or_else(|| self.get("speech"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("something happened ({})", self.kind))
    }

    fn in_range(&self, pos: GridPos) -> bool {
        match self.origin {
            Some(origin) if self.radius > 0.0 => origin.distance(&pos) <= self.radius,
            _ => true,
        }
    }
}

pub type Listener = Box<dyn FnMut(&Event, &[Agent], &World) -> Result<()> + Send>;

pub struct EventBus {
    pending: Vec<Event>,
    history: VecDeque<Event>,
    listeners: AHashMap<EventKind, Vec<Listener>>,
    history_cap: usize,
    max_gossip_hops: u8,
    gossip_decay: f32,
    retelling_factor: f32,
}

impl EventBus {
    pub fn new(config: &EventConfig) -> Self {
        Self {
            pending: Vec::new(),
            history: VecDeque::with_capacity(config.history_cap),
            listeners: AHashMap::new(),
            history_cap: config.history_cap,
            max_gossip_hops: config.max_gossip_hops,
            gossip_decay: config.gossip_decay,
            retelling_factor: config.retelling_factor,
        }
    }

    /// Queue for delivery on the next `process` call
    pub fn emit(&mut self, mut event: Event) {
        event.max_hops = Some(self.hop_limit(event.max_hops));
        tracing::debug!(kind = %event.kind, "event emitted");
        self.pending.push(event);
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Deliver everything queued. Listener failures are logged and do not
    /// stop delivery.
    pub fn process(&mut self, agents: &mut [Agent], world: &World, tick: Tick) {
        let events = std::mem::take(&mut self.pending);

        for mut event in events {
            event.tick = tick;

            if let Some(listeners) = self.listeners.get_mut(&event.kind) {
                for listener in listeners.iter_mut() {
                    if let Err(e) = listener(&event, agents, world) {
                        tracing::warn!(kind = %event.kind, error = %e, "event listener failed");
                    }
                }
            }

            self.deliver(&mut event, agents);

            self.history.push_back(event);
            while self.history.len() > self.history_cap {
                self.history.pop_front();
            }
        }
    }

    fn deliver(&self, event: &mut Event, agents: &mut [Agent]) {
        for agent in agents.iter_mut() {
            if !agent.alive || event.consumed_by.contains(&agent.id) {
                continue;
            }
            if event.recipient.is_some_and(|r| r != agent.id) {
                continue;
            }
            if !event.in_range(agent.position) {
                continue;
            }
            self.perceive(agent, event);
            event.consumed_by.insert(agent.id);
        }
    }

    /// Turn an event into a memory. Secondhand news weighs less.
    fn perceive(&self, agent: &mut Agent, event: &Event) {
        let importance = event.importance * self.gossip_decay.powi(event.gossip_hops as i32);
        let observed = |text: String, importance: f32| {
            let mut entry = MemoryEntry::new(text, event.tick, importance).kind(MemoryKind::Observation);
            entry.location = event.origin;
            entry
        };

        let entry = match &event.kind {
            EventKind::FireStarted => {
                let building = event.get("building").unwrap_or("something");
                observed(format!("A fire has broken out at {building}!"), importance.max(3.0))
                    .tag("fire")
                    .tag("danger")
            }
            EventKind::FireExtinguished => {
                let building = event.get("building").unwrap_or("a building");
                observed(format!("The fire at {building} has been put out."), importance)
                    .tag("fire")
            }
            EventKind::BuildingCollapsed => {
                let building = event.get("building").unwrap_or("a building");
                observed(format!("{building} has collapsed!"), importance.max(4.0))
                    .tag("collapse")
                    .tag("danger")
            }
            EventKind::Speech => {
                if event.source_id == Some(agent.id) {
                    return;
                }
                if event
                    .get("target")
                    .is_some_and(|target| target.eq_ignore_ascii_case(&agent.name))
                {
                    return;
                }
                let speaker = event.source.as_deref().unwrap_or("Someone");
                let speech = event.get("speech").unwrap_or("...");
                let mut entry = MemoryEntry::new(
                    format!("You overheard {speaker} say: \"{speech}\""),
                    event.tick,
                    importance,
                )
                .kind(MemoryKind::Conversation);
                entry.related_agent = event.source_id;
                entry
            }
            EventKind::AgentDied => {
                if event.source_id == Some(agent.id) {
                    return;
                }
                let name = event.get("name").unwrap_or("someone");
                observed(format!("{name} has died!"), importance.max(5.0)).tag("death")
            }
            EventKind::Fight => {
                let attacker = event.source.as_deref().unwrap_or("Someone");
                let target = event.get("target").unwrap_or("someone");
                observed(format!("{attacker} attacked {target}!"), importance)
                    .tag("violence")
                    .tag("danger")
            }
            EventKind::TradeCompleted => {
                let text = event.get("text").unwrap_or("A trade was made nearby.");
                observed(text.to_string(), importance).tag("trade")
            }
            EventKind::Dawn => observed("A new day begins.".to_string(), 0.3).tag("time"),
            EventKind::Dusk => observed("Night falls over the town.".to_string(), 0.5)
                .tag("time")
                .tag("danger"),
            EventKind::Gossip => {
                let text = event.story();
                let source = event.source.as_deref().unwrap_or("someone");
                let prefix = if event.gossip_hops <= 1 {
                    "You heard that"
                } else {
                    "Rumor has it that"
                };
                agent
                    .memory
                    .hear_rumor(text.clone(), importance, event.gossip_hops, event.max_hops, event.tick);
                let mut entry = MemoryEntry::new(
                    format!("{prefix} {text} (from {source})"),
                    event.tick,
                    importance,
                )
                .kind(MemoryKind::Conversation)
                .tag("gossip");
                entry.related_agent = event.source_id;
                entry
            }
            EventKind::Announcement => {
                let text = event.get("text").unwrap_or("An announcement was made.");
                observed(text.to_string(), importance.max(2.0)).tag("announcement")
            }
            EventKind::Custom(_) => observed(event.story(), importance),
        };

        agent.memory.add(entry);
    }

    /// A retelling of `event` by `teller`, addressed to nobody yet. `None`
    /// once the rumor has travelled its maximum number of hops.
    pub fn create_gossip(&self, teller: &Agent, event: &Event) -> Option<Event> {
        let max_hops = self.hop_limit(event.max_hops);
        if event.gossip_hops >= max_hops {
            return None;
        }
        let mut gossip = Event::new(EventKind::Gossip)
            .with("text", event.story())
            .with("original_kind", event.kind.to_string())
            .from_agent(teller.name.clone(), teller.id)
            .importance(event.importance * self.retelling_factor);
        gossip.gossip_hops = event.gossip_hops + 1;
        gossip.max_hops = Some(max_hops);
        Some(gossip)
    }

    /// Pass on a remembered rumor. `None` once it has travelled far enough.
    pub fn retell(&self, teller: &Agent, rumor: &Rumor) -> Option<Event> {
        self.create_gossip(teller, &Event::from_rumor(&teller.name, teller.id, rumor))
    }

    /// An event's own limit, never above the configured one
    fn hop_limit(&self, own: Option<u8>) -> u8 {
        own.map_or(self.max_gossip_hops, |m| m.min(self.max_gossip_hops))
    }

    /// Most recent `n` archived events, optionally of one kind, oldest first
    pub fn recent_events(&self, n: usize, kind: Option<&EventKind>) -> Vec<&Event> {
        let mut recent: Vec<&Event> = self
            .history
            .iter()
            .rev()
            .filter(|e| kind.map_or(true, |k| &e.kind == k))
            .take(n)
            .collect();
        recent.reverse();
        recent
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
