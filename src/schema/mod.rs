//! Schema module - Entity, frame and configuration types for recordings.

mod config;
mod entity;
mod faction;

pub use config::*;
pub use entity::*;
pub use faction::*;
