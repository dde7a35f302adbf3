//! Recording engine.
//!
//! Reads SCC recordings, a line-based log of entity snapshots written by a
//! running simulation, and turns them into frames and voxel meshes for
//! playback.
//!
//! # Overview
//!
//! - [`LogTailer`]: yields complete lines appended to the file since the last read
//! - [`SegmentParser`]: splits lines into frames at `start_block` markers
//! - [`VolumeCodec`]: base64 + run-length decoding of voxel occupancy grids
//! - [`MeshBuilder`]: face-culled triangle surface of an occupancy grid
//! - [`timeline`]: scrubber to frame mapping and pose interpolation
//! - [`RecordingStore`]: owns the frames and volumes and drives all of the above
//!
//! # Example
//!
//! ```ignore
//! use scc_replay::recording::{NoProgress, NullScene, RecordingStore};
//! use scc_replay::schema::ReplayConfig;
//!
//! let mut store = RecordingStore::load("fight.scc", ReplayConfig::default(), &mut NoProgress)?;
//! store.playback_mut().set_playing(true);
//! loop {
//!     store.tick(1.0 / 60.0, &mut NullScene, &mut NullScene)?;
//! }
//! ```

mod codec;
mod entity_list;
mod format;
mod mesh;
mod parser;
mod scene;
mod sink;
mod store;
mod tailer;
pub mod timeline;
mod volume;
mod writer;

pub use codec::{VOLUME_HEADER_SIZE, VolumeCodec, VolumeError, run_length_compress, run_length_decompress};
pub use entity_list::{EntityEntry, EntityList};
pub use format::{
    BLOCK_REMOVAL_TAG, ColumnHeaders, Diagnostic, FormatError, GRID_TAG,
    REQUIRED_COLUMNS, RowError, RowKind, START_BLOCK_TAG, VERSION_LINE, VOLUME_TAG,
};
pub use mesh::{MeshBuilder, MeshVertex, TriangleMesh, VoxelMesh};
pub use parser::SegmentParser;
pub use scene::{GridVolume, Scene};
pub use sink::{EntityListSink, NoProgress, NullScene, ProgressSink, SceneSink};
pub use store::{LoadHandle, RecordingStore};
pub use tailer::{LogTailer, TailRead};
pub use timeline::{EntityPose, Playback, PlaybackSample};
pub use volume::{DecodedVolume, OccupancyGrid, Volume};
pub use writer::SccWriter;

/// Failures of recording-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Recording load was cancelled")]
    Cancelled,
}
