//! Leaky integrate-and-fire gate deciding when an agent needs the backend
//!
//! Urgency is integrated every tick as an input current. The potential leaks
//! proportionally to its own size and the gate spikes when it crosses the
//! threshold, after which it is held at rest for a refractory period.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateParams {
    pub decay_rate: f32,
    pub threshold: f32,
    pub resting_potential: f32,
    pub refractory_period: f32,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            decay_rate: 0.1,
            threshold: 100.0,
            resting_potential: 0.0,
            refractory_period: 5.0,
        }
    }
}

/// Serializable gate state, including the refractory timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub params: GateParams,
    pub potential: f32,
    pub last_spike: Option<f32>,
    pub refractory: bool,
    pub ceiling: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeuronGate {
    params: GateParams,
    potential: f32,
    last_spike: Option<f32>,
    refractory: bool,
    ceiling: f32,
}

impl NeuronGate {
    /// `ceiling` caps the potential. It is raised to the threshold when lower
    /// so a positive threshold always stays reachable.
    pub fn new(params: GateParams, ceiling: f32) -> Self {
        let ceiling = if ceiling.is_finite() {
            ceiling.max(params.threshold).max(0.0)
        } else {
            f32::MAX
        };
        Self {
            params,
            potential: params.resting_potential.clamp(0.0, ceiling),
            last_spike: None,
            refractory: false,
            ceiling,
        }
    }

    pub fn params(&self) -> &GateParams {
        &self.params
    }

    pub fn potential(&self) -> f32 {
        self.potential
    }

    pub fn is_refractory(&self) -> bool {
        self.refractory
    }

    pub fn last_spike(&self) -> Option<f32> {
        self.last_spike
    }

    fn resting(&self) -> f32 {
        self.params.resting_potential.clamp(0.0, self.ceiling)
    }

    /// Integrate one step. Returns `true` when the gate spikes.
    pub fn update(&mut self, dt: f32, input_current: f32, now: f32) -> bool {
        if let Some(last) = self.last_spike {
            if now - last < self.params.refractory_period {
                self.potential = self.resting();
                self.refractory = true;
                return false;
            }
        }
        self.refractory = false;

        let input = if input_current.is_finite() {
            input_current
        } else {
            0.0
        };
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        let leak = self.params.decay_rate * self.potential;
        let next = self.potential + (input - leak) * dt;
        self.potential = if next.is_finite() {
            next.clamp(0.0, self.ceiling)
        } else {
            self.ceiling
        };

        if self.potential >= self.params.threshold {
            self.fire(now);
            return true;
        }
        false
    }

    fn fire(&mut self, now: f32) {
        self.potential = self.resting();
        self.last_spike = Some(now);
    }

    /// Add potential from an outside stimulus (being addressed, attacked)
    pub fn nudge(&mut self, amount: f32) {
        if amount.is_finite() {
            self.potential = (self.potential + amount).clamp(0.0, self.ceiling);
        }
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            params: self.params,
            potential: self.potential,
            last_spike: self.last_spike,
            refractory: self.refractory,
            ceiling: self.ceiling,
        }
    }

    pub fn restore(&mut self, snapshot: GateSnapshot) {
        self.params = snapshot.params;
        self.ceiling = snapshot.ceiling.max(0.0);
        self.potential = snapshot.potential.clamp(0.0, self.ceiling);
        self.last_spike = snapshot.last_spike;
        self.refractory = snapshot.refractory;
    }
}

impl Default for NeuronGate {
    fn default() -> Self {
        Self::new(GateParams::default(), 1000.0)
    }
}
