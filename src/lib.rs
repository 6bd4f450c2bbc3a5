//! Civitas - town simulation with a hybrid agent decision pipeline
//!
//! Every agent integrates urgency in a leaky neuron gate. Routine situations
//! are handled by a rule-based autopilot within the tick; everything else is
//! queued for a slow reasoning backend served by a background worker.

pub mod core;
pub mod entity;
pub mod llm;
pub mod simulation;
pub mod spatial;
pub mod world;
