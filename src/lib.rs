//! Mastery tracking and weekly lesson scheduling for individual learners.
//!
//! The [`Engine`] records practice evidence per learner/skill, keeps a
//! spaced-review queue, and lays out five-day lesson plans from a curriculum
//! scope. State lives in SQLite via [`db::Database`].

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod mastery;
pub mod models;
pub mod pacing;
pub mod planner;
pub mod review;
pub mod scope;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use db::Database;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use pacing::{distribute, pacing_for};
pub use scope::{CachedScope, CatalogScope, ScopeProvider, ScopeSkill, StaticScope};
