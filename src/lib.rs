//! Persona assignment and transition tracking for financial signal data.

pub mod assigner;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod logging;
pub mod models;
pub mod report;
pub mod rules;
pub mod store;
pub mod strength;
pub mod transition;

pub use assigner::PersonaAssigner;
pub use error::{Error, Result};
pub use models::{
    AssignmentResult, MatchStrength, Persona, PersonaLabel, SignalSnapshot, TransitionResult,
    WindowType,
};
pub use store::{AssignmentStore, InMemoryStore, SignalStore};
pub use transition::TransitionTracker;
