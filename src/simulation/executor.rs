//! Applies decisions to the world
//!
//! Execution is total. A target that does not exist, an item the agent does
//! not carry or a path that is blocked never aborts the tick; the agent
//! remembers what went wrong and goes idle.

use crate::core::config::{ActionConfig, SimulationConfig};
use crate::core::types::{GridPos, Tick};
use crate::entity::agent::{Activity, Agent};
use crate::entity::drives::DriveKind;
use crate::entity::memory::{MemoryEntry, MemoryKind};
use crate::entity::status::StatusKind;
use crate::simulation::autopilot::AutopilotState;
use crate::simulation::decision::{ActionKind, Decision};
use crate::simulation::events::{Event, EventBus, EventKind};
use crate::spatial::pathfinding::find_path;
use crate::world::items::{Item, ItemKind};
use crate::world::objects::InteractionKind;
use crate::world::World;

const WELL_FED_TICKS: u32 = 50;
const REFRESHED_TICKS: u32 = 40;
const RESTED_TICKS: u32 = 60;
const FOOD_POISONING_TICKS: u32 = 30;
/// Trust below which a partner refuses to trade
const TRADE_REFUSAL_TRUST: f32 = -20.0;

/// Result of one handler
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Done,
    /// The action could not be carried out; the text is remembered
    Blocked(String),
}

pub struct ActionExecutor {
    actions: ActionConfig,
    speech_nudge: f32,
    attack_nudge: f32,
    speech_radius: f32,
    max_expansions: usize,
}

impl ActionExecutor {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            actions: config.actions.clone(),
            speech_nudge: config.neuron.speech_nudge,
            attack_nudge: config.neuron.attack_nudge,
            speech_radius: config.events.speech_radius,
            max_expansions: config.pathfinding.max_expansions,
        }
    }

    /// Execute `decision` for `agents[idx]`. Dead or missing agents are
    /// ignored. Events raised here are perceived on the next tick.
    pub fn execute(
        &self,
        world: &mut World,
        agents: &mut [Agent],
        bus: &mut EventBus,
        idx: usize,
        decision: &Decision,
        tick: Tick,
    ) -> ActionOutcome {
        match agents.get_mut(idx) {
            Some(agent) if agent.alive => agent.record_decision(decision, tick),
            _ => return ActionOutcome::Done,
        }

        let outcome = match decision.action {
            ActionKind::Move => self.move_step(world, agents, idx, decision),
            ActionKind::Goto => self.goto(world, agents, idx, decision),
            ActionKind::Talk => self.talk(agents, bus, idx, decision, tick),
            ActionKind::Interact => self.interact(world, agents, idx, decision, tick),
            ActionKind::Consume => consume(agents, idx, decision, tick),
            ActionKind::PickUp => pick_up(world, agents, idx, decision, tick),
            ActionKind::Drop => drop_item(world, agents, idx, decision, tick),
            ActionKind::Craft => self.craft(world, agents, idx, decision, tick),
            ActionKind::Trade => self.trade(agents, bus, idx, decision, tick),
            ActionKind::Rest => self.rest(agents, idx),
            ActionKind::Sleep => self.sleep(agents, idx),
            ActionKind::Work => work(agents, idx, tick),
            ActionKind::Inspect => self.inspect(world, agents, idx, decision, tick),
            ActionKind::Reflect => self.reflect(agents, idx, decision, tick),
            ActionKind::Attack => self.attack(agents, bus, idx, decision, tick),
            ActionKind::Idle => {
                if let Some(agent) = agents.get_mut(idx) {
                    agent.activity = Activity::Idle;
                }
                ActionOutcome::Done
            }
        };

        if decision.action != ActionKind::Talk {
            self.speak_aloud(agents, bus, idx, decision);
        }

        if let (ActionOutcome::Blocked(reason), Some(agent)) = (&outcome, agents.get_mut(idx)) {
            tracing::debug!(agent = %agent.name, action = %decision.action, %reason, "action blocked");
            agent.memory.add(
                MemoryEntry::new(reason.clone(), tick, 1.0)
                    .kind(MemoryKind::Event)
                    .tag("blocked"),
            );
            if agent.alive {
                agent.activity = Activity::Idle;
            }
        }
        outcome
    }

    /// Speech attached to a non-TALK action is said to nobody in particular
    fn speak_aloud(&self, agents: &mut [Agent], bus: &mut EventBus, idx: usize, decision: &Decision) {
        let Some(speech) = decision.speech.as_deref() else {
            return;
        };
        let Some(agent) = agents.get_mut(idx) else {
            return;
        };
        agent.last_speech = Some(speech.to_string());
        bus.emit(
            Event::new(EventKind::Speech)
                .at(agent.position, self.speech_radius)
                .with("speech", speech)
                .from_agent(agent.name.clone(), agent.id)
                .importance(1.0),
        );
    }

    // === MOVEMENT ===

    fn move_step(&self, world: &World, agents: &mut [Agent], idx: usize, decision: &Decision) -> ActionOutcome {
        let Some(agent) = agents.get_mut(idx) else {
            return ActionOutcome::Done;
        };
        let Some(direction) = decision.direction else {
            return ActionOutcome::Blocked("Wanted to move but had no direction in mind.".to_string());
        };

        match agent.try_step(direction, world) {
            Ok(()) => {
                agent.autopilot.consecutive_blocks = 0;
                ActionOutcome::Done
            }
            Err(reason) => {
                agent.autopilot.consecutive_blocks += 1;
                if agent.autopilot.consecutive_blocks >= self.actions.blocked_path_limit {
                    agent.autopilot.clear_path();
                    agent.autopilot.consecutive_blocks = 0;
                }
                ActionOutcome::Blocked(format!("Tried to go {direction} but: {reason}"))
            }
        }
    }

    fn goto(&self, world: &World, agents: &mut [Agent], idx: usize, decision: &Decision) -> ActionOutcome {
        let Some(agent) = agents.get_mut(idx) else {
            return ActionOutcome::Done;
        };
        let target = decision.target_or_empty();
        if target.is_empty() {
            return ActionOutcome::Blocked("Wanted to go somewhere but not sure where.".to_string());
        }

        let known = agent
            .memory
            .known_locations()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(target))
            .map(|(name, pos)| (name.clone(), *pos));
        let Some((name, dest)) = known else {
            return ActionOutcome::Blocked(format!(
                "Wanted to go to {target} but don't know where it is."
            ));
        };

        if agent.position.chebyshev(&dest) <= 1 {
            agent.activity = Activity::Idle;
            return ActionOutcome::Done;
        }

        let path = find_path(&world.map, agent.position, dest, self.max_expansions);
        if path.is_empty() {
            return ActionOutcome::Blocked(format!("Could not find a way to {name}."));
        }
        agent.autopilot.set_path(path, name);
        agent.autopilot.consecutive_blocks = 0;
        agent.activity = Activity::Moving;
        ActionOutcome::Done
    }

    // === SOCIAL ===

    fn talk(
        &self,
        agents: &mut [Agent],
        bus: &mut EventBus,
        idx: usize,
        decision: &Decision,
        tick: Tick,
    ) -> ActionOutcome {
        let target = decision.target_or_empty();
        let Some(other) = find_agent(agents, idx, target, self.actions.talk_radius) else {
            return ActionOutcome::Blocked(format!("Wanted to talk to {target} but they aren't nearby."));
        };
        let Some((speaker, listener)) = pair_mut(agents, idx, other) else {
            return ActionOutcome::Done;
        };
        let speech = decision
            .speech
            .clone()
            .unwrap_or_else(|| format!("Salve, {}.", listener.name));

        speaker.memory.add(
            MemoryEntry::new(format!("You said to {}: \"{speech}\"", listener.name), tick, 2.0)
                .kind(MemoryKind::Conversation)
                .about(listener.id),
        );
        let rel = speaker
            .memory
            .update_relationship(listener.id, &listener.name, 1.0, tick);
        rel.last_i_said = Some(speech.clone());
        speaker.drives.satisfy(DriveKind::Social, 10.0);
        speaker.last_speech = Some(speech.clone());
        speaker.activity = Activity::Talking;

        listener.receive_speech(speaker.id, &speaker.name, &speech, tick, self.speech_nudge);

        // Pass along a rumor, unless it is about the listener
        let rumor = speaker.memory.rumor_for_conversation().cloned();
        if let Some(rumor) = rumor {
            let about_listener = rumor
                .text
                .to_lowercase()
                .contains(&listener.name.to_lowercase());
            if !about_listener {
                if let Some(gossip) = bus.retell(speaker, &rumor) {
                    bus.emit(gossip.to(listener.id));
                }
            }
        }

        bus.emit(
            Event::new(EventKind::Speech)
                .at(speaker.position, self.speech_radius)
                .with("speech", speech)
                .with("target", listener.name.clone())
                .from_agent(speaker.name.clone(), speaker.id)
                .importance(1.5),
        );
        ActionOutcome::Done
    }

    fn trade(
        &self,
        agents: &mut [Agent],
        bus: &mut EventBus,
        idx: usize,
        decision: &Decision,
        tick: Tick,
    ) -> ActionOutcome {
        let target = decision.target_or_empty();
        let (Some(offer), Some(want)) = (decision.offer.as_deref(), decision.want.as_deref()) else {
            return ActionOutcome::Blocked(format!(
                "Wanted to trade with {target} but didn't say what to swap."
            ));
        };
        let Some(other) = find_agent(agents, idx, target, self.actions.nearby_radius) else {
            return ActionOutcome::Blocked(format!("Wanted to trade with {target} but they aren't nearby."));
        };
        let Some((trader, partner)) = pair_mut(agents, idx, other) else {
            return ActionOutcome::Done;
        };

        if !trader.inventory.has(offer) {
            return ActionOutcome::Blocked(format!("Offered {offer} to {} but don't have any.", partner.name));
        }
        if !partner.inventory.has(want) {
            return ActionOutcome::Blocked(format!("{} has no {want} to trade.", partner.name));
        }
        let partner_trust = partner
            .memory
            .relationship(trader.id)
            .map(|r| r.trust)
            .unwrap_or(0.0);
        if partner_trust < TRADE_REFUSAL_TRUST {
            return ActionOutcome::Blocked(format!("{} refused to trade with you.", partner.name));
        }

        let (Some(given), Some(received)) = (trader.inventory.take(offer), partner.inventory.take(want))
        else {
            return ActionOutcome::Done;
        };
        let given_name = given.name.clone();
        let received_name = received.name.clone();
        // A one-for-one swap never overflows either inventory
        let _ = partner.inventory.push(given);
        let _ = trader.inventory.push(received);

        trader.memory.add(
            MemoryEntry::new(
                format!("Traded your {given_name} to {} for {received_name}.", partner.name),
                tick,
                2.5,
            )
            .kind(MemoryKind::Event)
            .tag("trade")
            .about(partner.id),
        );
        partner.memory.add(
            MemoryEntry::new(
                format!("{} traded you {given_name} for your {received_name}.", trader.name),
                tick,
                2.5,
            )
            .kind(MemoryKind::Event)
            .tag("trade")
            .about(trader.id),
        );
        trader.memory.update_relationship(partner.id, &partner.name, 2.0, tick);
        partner.memory.update_relationship(trader.id, &trader.name, 2.0, tick);
        trader.drives.satisfy(DriveKind::Social, 10.0);
        partner.drives.satisfy(DriveKind::Social, 10.0);
        trader.activity = Activity::Trading;

        bus.emit(
            Event::new(EventKind::TradeCompleted)
                .at(trader.position, self.actions.nearby_radius)
                .with(
                    "text",
                    format!(
                        "{} traded {given_name} to {} for {received_name}.",
                        trader.name, partner.name
                    ),
                )
                .from_agent(trader.name.clone(), trader.id)
                .importance(1.0),
        );
        ActionOutcome::Done
    }

    fn attack(
        &self,
        agents: &mut [Agent],
        bus: &mut EventBus,
        idx: usize,
        decision: &Decision,
        tick: Tick,
    ) -> ActionOutcome {
        let target = decision.target_or_empty();
        let Some(other) = find_agent(agents, idx, target, self.actions.attack_radius) else {
            return ActionOutcome::Blocked(format!("Wanted to attack {target} but they are out of reach."));
        };
        let Some((attacker, victim)) = pair_mut(agents, idx, other) else {
            return ActionOutcome::Done;
        };

        let weapon = decision.item.as_deref().and_then(|name| {
            attacker
                .inventory
                .iter()
                .find(|i| i.kind == ItemKind::Weapon && i.matches(name))
        });
        let (damage, with) = match weapon {
            Some(w) => (w.props.damage, format!(" with your {}", w.name)),
            None => (self.actions.unarmed_damage, String::new()),
        };

        let killed = victim.take_damage(damage, tick);
        attacker.activity = Activity::Attacking;
        attacker.memory.add(
            MemoryEntry::new(format!("You attacked {}{with}.", victim.name), tick, 3.0)
                .kind(MemoryKind::Event)
                .tag("violence")
                .about(victim.id),
        );
        attacker.memory.update_relationship(victim.id, &victim.name, -10.0, tick);
        if !victim.hostile {
            attacker.hostile = true;
        }

        victim.memory.add(
            MemoryEntry::new(format!("{} attacked you!", attacker.name), tick, 5.0)
                .kind(MemoryKind::Event)
                .tag("danger")
                .tag("violence")
                .about(attacker.id),
        );
        victim.memory.update_relationship(attacker.id, &attacker.name, -20.0, tick);
        if victim.alive {
            victim.gate.nudge(self.attack_nudge);
            victim.autopilot.request_override();
        }

        bus.emit(
            Event::new(EventKind::Fight)
                .at(attacker.position, self.speech_radius)
                .with("target", victim.name.clone())
                .from_agent(attacker.name.clone(), attacker.id)
                .importance(3.0),
        );
        if killed {
            attacker.memory.add(
                MemoryEntry::new(format!("You killed {}.", victim.name), tick, 5.0)
                    .kind(MemoryKind::Event)
                    .tag("violence")
                    .tag("death"),
            );
            bus.emit(
                Event::new(EventKind::AgentDied)
                    .with("name", victim.name.clone())
                    .from_agent(victim.name.clone(), victim.id)
                    .importance(5.0),
            );
        }
        ActionOutcome::Done
    }

    // === OBJECTS ===

    fn interact(
        &self,
        world: &mut World,
        agents: &mut [Agent],
        idx: usize,
        decision: &Decision,
        tick: Tick,
    ) -> ActionOutcome {
        let Some(agent) = agents.get_mut(idx) else {
            return ActionOutcome::Done;
        };
        let target = decision.target_or_empty();
        let found = world
            .objects
            .get_in_radius(agent.position, self.actions.interaction_radius)
            .into_iter()
            .find(|obj| obj.matches(target))
            .map(|obj| obj.id);
        let Some(id) = found else {
            return if world.objects.find_by_name(target).is_some() {
                ActionOutcome::Blocked(format!("{target} is too far away to use."))
            } else {
                ActionOutcome::Blocked(format!("Couldn't find {target} nearby."))
            };
        };
        let Some(object) = world.objects.get_mut(id) else {
            return ActionOutcome::Done;
        };
        let burning = object.capabilities.is_burning();
        let name = object.name.clone();
        let position = object.position;
        let Some(usable) = object.capabilities.interactable_mut() else {
            return ActionOutcome::Blocked(format!("There is nothing to do with {name}."));
        };
        if burning {
            return ActionOutcome::Blocked(format!("{name} is on fire!"));
        }
        if usable.cooldown > 0 {
            return ActionOutcome::Blocked(format!("{name} is busy right now."));
        }
        if let Some(required) = usable.requires_item.as_deref() {
            if !agent.inventory.has(required) {
                return ActionOutcome::Blocked(format!("Need {required} to use {name}."));
            }
        }
        usable.cooldown = usable.cooldown_max;
        let kind = usable.kind;
        let grants = usable.grants_item.clone();

        let text = match kind {
            InteractionKind::Drink => {
                agent.drives.satisfy(DriveKind::Thirst, 40.0);
                agent.status.apply(StatusKind::Refreshed, REFRESHED_TICKS);
                format!("Drank from {name}. Refreshing.")
            }
            InteractionKind::Rest => {
                agent.drives.satisfy(DriveKind::Energy, 20.0);
                agent.drives.satisfy(DriveKind::Comfort, 10.0);
                format!("Rested a while at {name}.")
            }
            InteractionKind::Pray => {
                agent.drives.satisfy(DriveKind::Comfort, 15.0);
                agent.drives.satisfy(DriveKind::Social, 5.0);
                format!("Prayed at {name}. You feel at peace.")
            }
            InteractionKind::Bathe => {
                agent.drives.satisfy(DriveKind::Energy, 30.0);
                agent.drives.satisfy(DriveKind::Comfort, 20.0);
                agent.drives.satisfy(DriveKind::Thirst, 10.0);
                agent.status.apply(StatusKind::Refreshed, REFRESHED_TICKS);
                format!("Bathed at {name}. Clean and refreshed.")
            }
            InteractionKind::Trade => format!("You browse the wares at {name}."),
            InteractionKind::Work => {
                agent.drives.satisfy(DriveKind::Comfort, 3.0);
                format!("Put in some work at {name}.")
            }
        };

        if let Some(item) = grants.as_deref().and_then(|g| world.catalog.create(g)) {
            let item_name = item.name.clone();
            if let Err(item) = agent.inventory.push(item) {
                if let Some(tile) = world.map.tile_mut(agent.position) {
                    tile.ground_items.push(item);
                }
                agent.memory.note(
                    format!("Your hands are full, the {item_name} falls to the ground."),
                    tick,
                    1.0,
                );
            }
        }

        agent.memory.learn_location(name, position);
        agent.memory.add(
            MemoryEntry::new(text, tick, 2.0)
                .kind(MemoryKind::Event)
                .tag(kind.label())
                .at(position),
        );
        agent.activity = Activity::Interacting;
        ActionOutcome::Done
    }

    fn craft(
        &self,
        world: &mut World,
        agents: &mut [Agent],
        idx: usize,
        decision: &Decision,
        tick: Tick,
    ) -> ActionOutcome {
        let Some(agent) = agents.get_mut(idx) else {
            return ActionOutcome::Done;
        };
        let target = decision.target_or_empty();
        let Some(recipe) = world.catalog.recipe_for(target).cloned() else {
            return ActionOutcome::Blocked(format!("Don't know how to make {target}."));
        };

        if let Some(station) = recipe.station.as_deref() {
            let near_station = world
                .objects
                .get_in_radius(agent.position, self.actions.interaction_radius)
                .into_iter()
                .any(|obj| {
                    obj.capabilities
                        .station()
                        .is_some_and(|s| s.station.eq_ignore_ascii_case(station))
                });
            if !near_station {
                return ActionOutcome::Blocked(format!("Need a {station} to make {}.", recipe.output));
            }
        }

        let mut needed: Vec<(&str, usize)> = Vec::new();
        for input in &recipe.inputs {
            match needed.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(input)) {
                Some((_, count)) => *count += 1,
                None => needed.push((input.as_str(), 1)),
            }
        }
        let missing: Vec<&str> = needed
            .iter()
            .filter(|(name, count)| agent.inventory.iter().filter(|i| i.matches(name)).count() < *count)
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return ActionOutcome::Blocked(format!(
                "Need {} to make {}.",
                missing.join(", "),
                recipe.output
            ));
        }

        let Some(output) = world.catalog.create(&recipe.output) else {
            return ActionOutcome::Blocked(format!("Don't know how to make {}.", recipe.output));
        };
        for input in &recipe.inputs {
            agent.inventory.take(input);
        }
        let output_name = output.name.clone();
        if let Err(item) = agent.inventory.push(output) {
            if let Some(tile) = world.map.tile_mut(agent.position) {
                tile.ground_items.push(item);
            }
        }

        agent.memory.add(
            MemoryEntry::new(format!("You crafted {output_name}."), tick, 2.0)
                .kind(MemoryKind::Event)
                .tag("craft"),
        );
        agent.activity = Activity::Crafting;
        ActionOutcome::Done
    }

    // === SELF ===

    fn rest(&self, agents: &mut [Agent], idx: usize) -> ActionOutcome {
        if let Some(agent) = agents.get_mut(idx) {
            agent.drives.satisfy(DriveKind::Energy, self.actions.rest_energy);
            agent.activity = Activity::Resting;
            agent.autopilot.set_state(AutopilotState::Resting);
        }
        ActionOutcome::Done
    }

    fn sleep(&self, agents: &mut [Agent], idx: usize) -> ActionOutcome {
        if let Some(agent) = agents.get_mut(idx) {
            agent.drives.satisfy(DriveKind::Energy, self.actions.sleep_energy);
            agent.drives.satisfy(DriveKind::Comfort, self.actions.sleep_comfort);
            agent.status.apply(StatusKind::Rested, RESTED_TICKS);
            agent.activity = Activity::Sleeping;
            agent.autopilot.set_state(AutopilotState::Resting);
        }
        ActionOutcome::Done
    }

    fn inspect(
        &self,
        world: &mut World,
        agents: &mut [Agent],
        idx: usize,
        decision: &Decision,
        tick: Tick,
    ) -> ActionOutcome {
        let target = decision.target_or_empty();
        let Some(origin) = agents.get(idx).map(|a| a.position) else {
            return ActionOutcome::Done;
        };

        let object = world
            .objects
            .get_in_radius(origin, self.actions.inspect_object_radius)
            .into_iter()
            .find(|obj| obj.matches(target))
            .map(|obj| (obj.name.clone(), obj.position, describe_object(obj)));
        let observation = match object {
            Some((name, pos, text)) => {
                if let Some(agent) = agents.get_mut(idx) {
                    agent.memory.learn_location(name, pos);
                }
                Some((text, Some(pos)))
            }
            None => find_agent(agents, idx, target, self.actions.inspect_agent_radius)
                .and_then(|other| agents.get(other))
                .map(|other| (describe_agent(other), Some(other.position))),
        };

        let Some(agent) = agents.get_mut(idx) else {
            return ActionOutcome::Done;
        };
        let Some((text, pos)) = observation else {
            return ActionOutcome::Blocked(format!("Couldn't see {target} from here."));
        };
        let mut entry = MemoryEntry::new(text, tick, 1.5).kind(MemoryKind::Observation);
        entry.location = pos;
        agent.memory.add(entry);
        agent.activity = Activity::Inspecting;
        ActionOutcome::Done
    }

    fn reflect(&self, agents: &mut [Agent], idx: usize, decision: &Decision, tick: Tick) -> ActionOutcome {
        let Some(agent) = agents.get_mut(idx) else {
            return ActionOutcome::Done;
        };
        let text = decision
            .note
            .as_deref()
            .or(decision.target.as_deref())
            .unwrap_or("")
            .trim();
        if text.is_empty() {
            agent.activity = Activity::Idle;
            return ActionOutcome::Done;
        }
        agent.memory.add(
            MemoryEntry::new(text, tick, self.actions.reflection_importance)
                .kind(MemoryKind::Reflection)
                .tag("reflection"),
        );
        agent.activity = Activity::Reflecting;
        ActionOutcome::Done
    }
}

fn consume(agents: &mut [Agent], idx: usize, decision: &Decision, tick: Tick) -> ActionOutcome {
    let Some(agent) = agents.get_mut(idx) else {
        return ActionOutcome::Done;
    };
    let target = decision.target_or_empty();
    let Some(slot) = agent.inventory.find(target) else {
        return ActionOutcome::Blocked(format!("Wanted to consume {target} but don't have any."));
    };
    if agent
        .inventory
        .get(slot)
        .is_some_and(|item| !item.kind.is_consumable())
    {
        return ActionOutcome::Blocked(format!("{target} is not something you can eat or drink."));
    }
    let Some(item) = agent.inventory.take_at(slot) else {
        return ActionOutcome::Done;
    };

    agent.activity = Activity::Consuming;
    if item.is_spoiled() {
        agent.status.apply(StatusKind::FoodPoisoning, FOOD_POISONING_TICKS);
        agent.memory.update_preference(&item.name, -0.5);
        agent.memory.add(
            MemoryEntry::new(format!("Ate rotten {} and got sick!", item.name), tick, 4.0)
                .kind(MemoryKind::Event)
                .tag("negative"),
        );
        return ActionOutcome::Done;
    }

    apply_item(agent, &item);
    agent.memory.update_preference(&item.name, 0.3);
    let verb = if item.kind == ItemKind::Drink { "drank" } else { "consumed" };
    agent.memory.add(
        MemoryEntry::new(format!("You {verb} the {}.", item.name), tick, 1.5)
            .kind(MemoryKind::Event)
            .tag("consume"),
    );
    ActionOutcome::Done
}

fn apply_item(agent: &mut Agent, item: &Item) {
    let props = &item.props;
    agent.drives.satisfy(DriveKind::Hunger, props.nutrition);
    agent.drives.satisfy(DriveKind::Thirst, props.thirst_relief);
    agent.drives.satisfy(DriveKind::Energy, props.energy_restore);
    agent.drives.satisfy(DriveKind::Comfort, props.comfort);
    agent.health = (agent.health + props.healing).min(agent.max_health);

    if props.nutrition >= 20.0 {
        agent.status.apply(StatusKind::WellFed, WELL_FED_TICKS);
    }
    if props.thirst_relief >= 20.0 {
        agent.status.apply(StatusKind::Refreshed, REFRESHED_TICKS);
    }
    if item.kind == ItemKind::Medicine {
        for kind in [StatusKind::Burned, StatusKind::SmokeInhalation, StatusKind::FoodPoisoning] {
            agent.status.clear(kind);
        }
    }
}

fn pick_up(world: &mut World, agents: &mut [Agent], idx: usize, decision: &Decision, tick: Tick) -> ActionOutcome {
    let Some(agent) = agents.get_mut(idx) else {
        return ActionOutcome::Done;
    };
    let target = decision.target_or_empty();
    let Some(tile) = world.map.tile_mut(agent.position) else {
        return ActionOutcome::Done;
    };
    let Some(slot) = tile.ground_items.iter().position(|i| i.matches(target)) else {
        return ActionOutcome::Blocked(format!("There is no {target} here to pick up."));
    };
    if agent.inventory.is_full() {
        return ActionOutcome::Blocked(format!("Hands are full, can't pick up {target}."));
    }
    let item = tile.ground_items.remove(slot);
    let name = item.name.clone();
    if let Err(item) = agent.inventory.push(item) {
        tile.ground_items.push(item);
        return ActionOutcome::Blocked(format!("Hands are full, can't pick up {name}."));
    }
    agent.memory.note(format!("Picked up {name}."), tick, 1.0);
    agent.activity = Activity::Idle;
    ActionOutcome::Done
}

fn drop_item(world: &mut World, agents: &mut [Agent], idx: usize, decision: &Decision, tick: Tick) -> ActionOutcome {
    let Some(agent) = agents.get_mut(idx) else {
        return ActionOutcome::Done;
    };
    let target = decision.target_or_empty();
    let Some(tile) = world.map.tile_mut(agent.position) else {
        return ActionOutcome::Done;
    };
    let Some(item) = agent.inventory.take(target) else {
        return ActionOutcome::Blocked(format!("Wanted to drop {target} but don't have any."));
    };
    agent.memory.note(format!("Dropped {}.", item.name), tick, 1.0);
    tile.ground_items.push(item);
    agent.activity = Activity::Idle;
    ActionOutcome::Done
}

fn work(agents: &mut [Agent], idx: usize, tick: Tick) -> ActionOutcome {
    let Some(agent) = agents.get_mut(idx) else {
        return ActionOutcome::Done;
    };
    agent.drives.strain(DriveKind::Energy, 5.0);
    agent.drives.satisfy(DriveKind::Comfort, 3.0);
    agent.activity = Activity::Working;
    agent.autopilot.set_state(AutopilotState::Working);
    let text = format!("Worked as a {}.", agent.role);
    agent.memory.note(text, tick, 1.0);
    ActionOutcome::Done
}

fn describe_object(obj: &crate::world::WorldObject) -> String {
    let caps = &obj.capabilities;
    let mut details = Vec::new();
    if caps.is_burning() {
        details.push("it is on fire".to_string());
    }
    if caps.water().is_some() {
        details.push("it holds fresh water".to_string());
    }
    if let Some(usable) = caps.interactable() {
        details.push(format!("it is used for {}", usable.kind.label()));
        if usable.cooldown > 0 {
            details.push("it is busy".to_string());
        }
    }
    if let Some(station) = caps.station() {
        details.push(format!("it works as a {}", station.station));
    }
    if let Some(structure) = caps.structural() {
        if structure.integrity() < 0.5 {
            details.push("it looks badly damaged".to_string());
        }
    }
    if details.is_empty() {
        format!("You looked closely at {}.", obj.name)
    } else {
        format!("You looked closely at {}: {}.", obj.name, details.join(", "))
    }
}

fn describe_agent(other: &Agent) -> String {
    let condition = if other.max_health > 0.0 && other.health / other.max_health < 0.5 {
        "looks badly hurt"
    } else if other.health < other.max_health {
        "looks a little worn"
    } else {
        "looks healthy"
    };
    format!(
        "You looked at {} the {}. They {condition} and are {}.",
        other.name,
        other.role,
        other.activity.label().to_lowercase()
    )
}

/// Nearest living agent other than `idx` whose name matches `name`
/// (case-insensitive, first names accepted) within `radius`
fn find_agent(agents: &[Agent], idx: usize, name: &str, radius: f32) -> Option<usize> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    let origin: GridPos = agents.get(idx)?.position;
    agents
        .iter()
        .enumerate()
        .filter(|(i, a)| *i != idx && a.alive)
        .filter(|(_, a)| {
            let full = a.name.to_lowercase();
            full == name || full.split_whitespace().next() == Some(name.as_str())
        })
        .map(|(i, a)| (i, a.position.distance(&origin)))
        .filter(|(_, d)| *d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Two distinct agents borrowed mutably at once
fn pair_mut(agents: &mut [Agent], a: usize, b: usize) -> Option<(&mut Agent, &mut Agent)> {
    if a == b || a >= agents.len() || b >= agents.len() {
        return None;
    }
    if a < b {
        let (left, right) = agents.split_at_mut(b);
        Some((&mut left[a], &mut right[0]))
    } else {
        let (left, right) = agents.split_at_mut(a);
        Some((&mut right[0], &mut left[b]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Direction;
    use crate::entity::role::Role;
    use crate::world::objects::{Interactable, WorldObject};
    use crate::world::{Terrain, TileMap};

    struct Fixture {
        config: SimulationConfig,
        world: World,
        agents: Vec<Agent>,
        bus: EventBus,
        executor: ActionExecutor,
    }

    fn fixture() -> Fixture {
        let config = SimulationConfig::default();
        let world = World::new(TileMap::new(20, 20, Terrain::Plaza));
        let agents = vec![
            Agent::new("Marcus", Role::Merchant, GridPos::new(5, 5), &config),
            Agent::new("Livia", Role::Plebeian, GridPos::new(6, 5), &config),
        ];
        Fixture {
            bus: EventBus::new(&config.events),
            executor: ActionExecutor::new(&config),
            config,
            world,
            agents,
        }
    }

    impl Fixture {
        fn run(&mut self, idx: usize, decision: Decision) -> ActionOutcome {
            self.executor
                .execute(&mut self.world, &mut self.agents, &mut self.bus, idx, &decision, 1)
        }

        fn latest(&self, idx: usize) -> String {
            self.agents[idx]
                .memory
                .latest()
                .map(|m| m.text.clone())
                .unwrap_or_default()
        }
    }

    #[test]
    fn test_move_updates_position() {
        let mut f = fixture();
        let outcome = f.run(0, Decision::moving(Direction::North, "Go"));
        assert_eq!(outcome, ActionOutcome::Done);
        assert_eq!(f.agents[0].position, GridPos::new(5, 4));
        assert_eq!(f.agents[0].activity, Activity::Moving);
        assert_eq!(f.agents[0].current_thought, "Go");
    }

    #[test]
    fn test_blocked_moves_clear_path_after_limit() {
        let mut f = fixture();
        f.world.map.set_terrain(GridPos::new(5, 4), Terrain::Wall);
        f.agents[0]
            .autopilot
            .set_path(vec![GridPos::new(5, 4), GridPos::new(5, 3)], "Forum");

        for _ in 0..2 {
            f.run(0, Decision::moving(Direction::North, "Go"));
            assert!(f.agents[0].autopilot.has_path());
        }
        f.run(0, Decision::moving(Direction::North, "Go"));
        assert!(!f.agents[0].autopilot.has_path());
        assert_eq!(f.agents[0].position, GridPos::new(5, 5));
        assert!(f.latest(0).starts_with("Tried to go north"));
        assert_eq!(f.agents[0].activity, Activity::Idle);
    }

    #[test]
    fn test_goto_unknown_place_is_remembered() {
        let mut f = fixture();
        let outcome = f.run(0, Decision::new(ActionKind::Goto, "Go").with_target("Atlantis"));
        assert!(matches!(outcome, ActionOutcome::Blocked(_)));
        assert!(f.latest(0).contains("don't know where it is"));
        assert!(f.agents[0].memory.latest().unwrap().has_tag("blocked"));
    }

    #[test]
    fn test_goto_known_place_sets_path() {
        let mut f = fixture();
        f.agents[0].memory.learn_location("Forum", GridPos::new(15, 5));
        f.run(0, Decision::new(ActionKind::Goto, "Go").with_target("forum"));
        assert!(f.agents[0].autopilot.has_path());
        assert_eq!(f.agents[0].autopilot.destination(), Some("Forum"));
        assert_eq!(f.agents[0].activity, Activity::Moving);
    }

    #[test]
    fn test_talk_reaches_listener() {
        let mut f = fixture();
        f.run(
            0,
            Decision::new(ActionKind::Talk, "Greet")
                .with_target("livia")
                .with_speech("Fine weather today."),
        );

        let listener = &f.agents[1];
        let pending = listener.pending_speech.as_ref().unwrap();
        assert_eq!(pending.speaker_name, "Marcus");
        assert!(listener.autopilot.override_requested());
        assert_eq!(f.agents[0].activity, Activity::Talking);
        assert_eq!(f.agents[0].last_speech.as_deref(), Some("Fine weather today."));
        let rel = f.agents[0].memory.relationship(f.agents[1].id).unwrap();
        assert_eq!(rel.last_i_said.as_deref(), Some("Fine weather today."));
        assert_eq!(f.bus.pending_len(), 1);
    }

    #[test]
    fn test_talk_to_absent_agent_is_blocked() {
        let mut f = fixture();
        f.agents[1].position = GridPos::new(19, 19);
        f.run(0, Decision::new(ActionKind::Talk, "Greet").with_target("Livia"));
        assert!(f.agents[1].pending_speech.is_none());
        assert!(f.latest(0).contains("aren't nearby"));
    }

    #[test]
    fn test_talk_passes_rumor_to_listener() {
        let mut f = fixture();
        f.agents[0].memory.hear_rumor("The bakery burned down", 4.0, 0, None, 0);
        f.run(
            0,
            Decision::new(ActionKind::Talk, "Chat")
                .with_target("Livia")
                .with_speech("Did you hear?"),
        );
        assert_eq!(f.bus.pending_len(), 2);

        f.bus.process(&mut f.agents, &f.world, 2);
        let heard = f.agents[1]
            .memory
            .short_term()
            .any(|m| m.has_tag("gossip") && m.text.contains("bakery"));
        assert!(heard);
    }

    #[test]
    fn test_interact_with_fountain() {
        let mut f = fixture();
        f.world.place(
            WorldObject::new("Fountain", GridPos::new(5, 6))
                .water_source()
                .interactable(Interactable::new(InteractionKind::Drink).with_cooldown(3)),
        );
        f.agents[0].drives.thirst = 80.0;
        f.run(0, Decision::new(ActionKind::Interact, "Drink").with_target("fountain"));

        assert_eq!(f.agents[0].drives.thirst, 40.0);
        assert_eq!(f.agents[0].activity, Activity::Interacting);
        assert!(f.agents[0].memory.known_locations().contains_key("Fountain"));

        // Busy until the cooldown runs out
        f.run(1, Decision::new(ActionKind::Interact, "Drink").with_target("Fountain"));
        assert!(f.latest(1).contains("busy"));
    }

    #[test]
    fn test_interact_grants_item() {
        let mut f = fixture();
        f.world.place(
            WorldObject::new("Bakery", GridPos::new(4, 5))
                .interactable(Interactable::new(InteractionKind::Trade).granting("Bread")),
        );
        f.run(0, Decision::new(ActionKind::Interact, "Buy").with_target("Bakery"));
        assert!(f.agents[0].inventory.has("Bread"));
    }

    #[test]
    fn test_consume_spoiled_food_poisons() {
        let mut f = fixture();
        let apple = f.world.catalog.create("Apple").unwrap().with_freshness(0.0);
        f.agents[0].inventory.push(apple).unwrap();
        f.run(0, Decision::new(ActionKind::Consume, "Eat").with_target("Apple"));

        assert!(f.agents[0].status.has(StatusKind::FoodPoisoning));
        assert!(f.agents[0].memory.preference("apple") < 0.0);
        assert!(!f.agents[0].inventory.has("Apple"));
    }

    #[test]
    fn test_consume_fresh_food_feeds() {
        let mut f = fixture();
        f.agents[0].drives.hunger = 70.0;
        let bread = f.world.catalog.create("Bread").unwrap();
        let nutrition = bread.props.nutrition;
        f.agents[0].inventory.push(bread).unwrap();
        f.run(0, Decision::new(ActionKind::Consume, "Eat").with_target("bread"));

        assert_eq!(f.agents[0].drives.hunger, (70.0 - nutrition).max(0.0));
        assert_eq!(f.agents[0].activity, Activity::Consuming);
    }

    #[test]
    fn test_consume_missing_item_is_blocked() {
        let mut f = fixture();
        f.run(0, Decision::new(ActionKind::Consume, "Eat").with_target("Cake"));
        assert!(f.latest(0).contains("don't have any"));
        assert_eq!(f.agents[0].activity, Activity::Idle);
    }

    #[test]
    fn test_drop_then_pick_up() {
        let mut f = fixture();
        let knife = f.world.catalog.create("Knife").unwrap();
        f.agents[0].inventory.push(knife).unwrap();
        f.run(0, Decision::new(ActionKind::Drop, "Drop").with_target("Knife"));
        assert!(!f.agents[0].inventory.has("Knife"));
        assert_eq!(f.world.map.tile(GridPos::new(5, 5)).unwrap().ground_items.len(), 1);

        f.run(0, Decision::new(ActionKind::PickUp, "Take").with_target("knife"));
        assert!(f.agents[0].inventory.has("Knife"));
        assert!(f.world.map.tile(GridPos::new(5, 5)).unwrap().ground_items.is_empty());
    }

    #[test]
    fn test_craft_needs_station_and_inputs() {
        let mut f = fixture();
        f.run(0, Decision::new(ActionKind::Craft, "Mill").with_target("Flour"));
        assert!(f.latest(0).contains("Need a mill"));

        f.world
            .place(WorldObject::new("Mill", GridPos::new(5, 6)).station("mill"));
        f.run(0, Decision::new(ActionKind::Craft, "Mill").with_target("Flour"));
        assert!(f.latest(0).contains("Need Wheat"));

        let inputs = f.world.catalog.recipe_for("Flour").unwrap().inputs.clone();
        for input in &inputs {
            let item = f.world.catalog.create(input).unwrap();
            f.agents[0].inventory.push(item).unwrap();
        }
        f.run(0, Decision::new(ActionKind::Craft, "Mill").with_target("Flour"));
        assert!(f.agents[0].inventory.has("Flour"));
        assert!(!f.agents[0].inventory.has("Wheat"));
        assert_eq!(f.agents[0].activity, Activity::Crafting);
    }

    #[test]
    fn test_trade_swaps_items() {
        let mut f = fixture();
        let bread = f.world.catalog.create("Bread").unwrap();
        let wine = f.world.catalog.create("Wine").unwrap();
        f.agents[0].inventory.push(bread).unwrap();
        f.agents[1].inventory.push(wine).unwrap();

        let mut decision = Decision::new(ActionKind::Trade, "Swap").with_target("Livia");
        decision.offer = Some("Bread".to_string());
        decision.want = Some("Wine".to_string());
        f.run(0, decision);

        assert!(f.agents[0].inventory.has("Wine"));
        assert!(f.agents[1].inventory.has("Bread"));
        let trust = f.agents[1].memory.relationship(f.agents[0].id).unwrap().trust;
        assert!(trust > 0.0);
    }

    #[test]
    fn test_attack_kills_and_announces() {
        let mut f = fixture();
        f.agents[1].health = 3.0;
        f.run(0, Decision::new(ActionKind::Attack, "Strike").with_target("Livia"));

        assert!(!f.agents[1].alive);
        assert_eq!(f.agents[1].activity, Activity::Dead);
        assert!(f.agents[0].hostile);
        // Fight plus death
        assert_eq!(f.bus.pending_len(), 2);
    }

    #[test]
    fn test_attack_nudges_survivor() {
        let mut f = fixture();
        f.run(0, Decision::new(ActionKind::Attack, "Strike").with_target("Livia"));
        assert_eq!(
            f.agents[1].health,
            f.agents[1].max_health - f.config.actions.unarmed_damage
        );
        assert!(f.agents[1].autopilot.override_requested());
        let trust = f.agents[1].memory.relationship(f.agents[0].id).unwrap().trust;
        assert!(trust < 0.0);
    }

    #[test]
    fn test_rest_and_sleep() {
        let mut f = fixture();
        f.agents[0].drives.energy = 80.0;
        f.run(0, Decision::new(ActionKind::Rest, "Rest"));
        assert_eq!(f.agents[0].drives.energy, 80.0 - f.config.actions.rest_energy);
        assert_eq!(f.agents[0].activity, Activity::Resting);

        f.run(0, Decision::new(ActionKind::Sleep, "Sleep"));
        assert!(f.agents[0].status.has(StatusKind::Rested));
        assert_eq!(f.agents[0].activity, Activity::Sleeping);
    }

    #[test]
    fn test_reflect_records_reflection() {
        let mut f = fixture();
        let mut decision = Decision::new(ActionKind::Reflect, "Think");
        decision.note = Some("Livia seems trustworthy.".to_string());
        f.run(0, decision);
        let latest = f.agents[0].memory.latest().unwrap();
        assert_eq!(latest.kind, MemoryKind::Reflection);
        assert_eq!(f.agents[0].activity, Activity::Reflecting);
    }

    #[test]
    fn test_inspect_agent() {
        let mut f = fixture();
        f.run(0, Decision::new(ActionKind::Inspect, "Look").with_target("Livia"));
        assert!(f.latest(0).contains("Livia"));
        assert_eq!(f.agents[0].activity, Activity::Inspecting);
    }

    #[test]
    fn test_dead_agents_do_nothing() {
        let mut f = fixture();
        f.agents[0].take_damage(500.0, 0);
        f.run(0, Decision::moving(Direction::North, "Go"));
        assert_eq!(f.agents[0].position, GridPos::new(5, 5));
        assert!(f.agents[0].decision_log.is_empty());
    }

    #[test]
    fn test_speech_on_other_actions_is_overheard() {
        let mut f = fixture();
        f.run(0, Decision::new(ActionKind::Rest, "Rest").with_speech("What a day."));
        assert_eq!(f.bus.pending_len(), 1);
        assert_eq!(f.agents[0].last_speech.as_deref(), Some("What a day."));
    }
}
