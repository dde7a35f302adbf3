//! SCC Replay - playback engine for space combat recordings.
//!
//! This crate reads SCC recordings, append-only text logs of entity state
//! written by a running simulation, into a time-indexed frame sequence with
//! voxel meshes for each recorded grid. Recordings can be followed while they
//! are still being written.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Entity snapshots, frames, faction colours and configuration
//! - `recording`: Tailing, parsing, volume decoding, meshing and playback
//!
//! # Example
//!
//! ```rust,no_run
//! use scc_replay::{
//!     recording::{NoProgress, RecordingStore},
//!     schema::ReplayConfig,
//! };
//!
//! fn main() -> Result<(), scc_replay::recording::RecordingError> {
//!     let mut store = RecordingStore::load("fight.scc", ReplayConfig::default(), &mut NoProgress)?;
//!     println!("{} frames", store.frame_count());
//!
//!     // Halfway through the recording
//!     store.playback_mut().set_scrubber(0.5);
//!     if let Some(sample) = store.sample() {
//!         for pose in &sample.poses {
//!             println!("{} at {}", pose.entity_id, pose.pose.position);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod recording;
pub mod schema;

// Re-export commonly used types
pub use recording::{PlaybackSample, RecordingError, RecordingStore};
pub use schema::{EntitySnapshot, Frame, ReplayConfig};
