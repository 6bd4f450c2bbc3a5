pub mod agent;
pub mod drives;
pub mod inventory;
pub mod memory;
pub mod neuron;
pub mod role;
pub mod status;

pub use agent::{Activity, Agent, AgentMindSnapshot, Neighbor};
pub use drives::{DriveKind, Drives};
pub use memory::{Memory, MemoryEntry, MemoryKind};
pub use neuron::{GateParams, NeuronGate};
pub use role::Role;
pub use status::{StatusEffects, StatusKind};
