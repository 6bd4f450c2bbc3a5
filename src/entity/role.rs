//! Social roles and their cognitive rhythm

use crate::core::types::AgentId;
use crate::entity::neuron::GateParams;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Senator,
    Patrician,
    Priest,
    Gladiator,
    Guard,
    Legionary,
    Merchant,
    Craftsman,
    Plebeian,
}

/// Gate threshold, leak and refractory period for a role
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleProfile {
    pub threshold: f32,
    pub decay: f32,
    pub refractory: f32,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Senator,
        Role::Patrician,
        Role::Priest,
        Role::Gladiator,
        Role::Guard,
        Role::Legionary,
        Role::Merchant,
        Role::Craftsman,
        Role::Plebeian,
    ];

    /// Fighters react fast, statesmen and priests deliberate
    pub fn profile(&self) -> RoleProfile {
        let (threshold, decay, refractory) = match self {
            Role::Senator => (25.0, 0.06, 4.0),
            Role::Patrician => (22.0, 0.07, 3.5),
            Role::Priest => (27.0, 0.05, 4.5),
            Role::Gladiator => (12.0, 0.12, 2.0),
            Role::Guard => (14.0, 0.10, 2.5),
            Role::Legionary => (32.0, 0.05, 5.0),
            Role::Merchant => (18.0, 0.08, 3.0),
            Role::Craftsman => (20.0, 0.07, 3.5),
            Role::Plebeian => (18.0, 0.09, 3.0),
        };
        RoleProfile {
            threshold,
            decay,
            refractory,
        }
    }

    /// Roles that strike hostile neighbours on reflex
    pub fn is_combatant(&self) -> bool {
        matches!(self, Role::Gladiator | Role::Guard | Role::Legionary)
    }

    /// Roles that keep formation with their own kind
    pub fn is_grouped(&self) -> bool {
        matches!(self, Role::Legionary)
    }

    /// Gate parameters for one agent. Each value is spread by up to
    /// `±jitter` using an rng seeded from the agent id, so agents of the same
    /// role do not spike in lockstep and a given id always gets the same gate.
    pub fn gate_params(&self, id: AgentId, jitter: f32) -> GateParams {
        let profile = self.profile();
        let jitter = jitter.clamp(0.0, 0.9);
        let mut rng = ChaCha8Rng::seed_from_u64(id.seed());
        let mut spread = |v: f32| {
            if jitter == 0.0 {
                v
            } else {
                v * rng.gen_range((1.0 - jitter)..=(1.0 + jitter))
            }
        };
        GateParams {
            decay_rate: spread(profile.decay),
            threshold: spread(profile.threshold),
            resting_potential: 0.0,
            refractory_period: spread(profile.refractory),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Senator => "Senator",
            Role::Patrician => "Patrician",
            Role::Priest => "Priest",
            Role::Gladiator => "Gladiator",
            Role::Guard => "Guard",
            Role::Legionary => "Legionary",
            Role::Merchant => "Merchant",
            Role::Craftsman => "Craftsman",
            Role::Plebeian => "Plebeian",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
