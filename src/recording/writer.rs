//! Writer producing SCC recordings.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::schema::EntitySnapshot;

use super::codec::VolumeCodec;
use super::format::{
    BLOCK_REMOVAL_TAG, ColumnHeaders, GRID_TAG, START_BLOCK_TAG, VERSION_LINE, VOLUME_TAG,
};
use super::volume::OccupancyGrid;

/// Writes a recording in the standard column order.
///
/// Usage:
/// ```ignore
/// let mut writer = SccWriter::create("fight.scc")?;
/// writer.start_block()?;
/// writer.grid(&snapshot)?;
/// writer.volume("E1", &grid)?;
/// writer.flush()?;
/// ```
pub struct SccWriter<W: Write> {
    writer: W,
    frames_written: u64,
}

impl SccWriter<BufWriter<File>> {
    /// Create a recording file, truncating any existing one.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> SccWriter<W> {
    /// Write both header lines to `writer`.
    pub fn new(mut writer: W) -> io::Result<Self> {
        writeln!(writer, "{VERSION_LINE}")?;
        writeln!(writer, "{}", ColumnHeaders::standard())?;
        Ok(Self {
            writer,
            frames_written: 0,
        })
    }

    /// Number of `start_block` markers written.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Begin a new frame.
    pub fn start_block(&mut self) -> io::Result<()> {
        writeln!(self.writer, "{START_BLOCK_TAG}")?;
        self.frames_written += 1;
        Ok(())
    }

    /// Write one entity snapshot.
    ///
    /// Text columns must not contain commas or newlines.
    pub fn grid(&mut self, snapshot: &EntitySnapshot) -> io::Result<()> {
        for (column, value) in [
            ("name", &snapshot.name),
            ("owner", &snapshot.owner),
            ("faction", &snapshot.faction),
            ("entityId", &snapshot.entity_id),
            ("health", &snapshot.health),
        ] {
            if value.contains([',', '\n', '\r']) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Column '{column}' contains a delimiter: {value:?}"),
                ));
            }
        }

        let p = snapshot.position;
        let q = snapshot.orientation;
        let c = snapshot.faction_color_seed;
        writeln!(
            self.writer,
            "{GRID_TAG},{},{},{},{} {} {},{},{},{} {} {},{} {} {} {},{}",
            snapshot.name,
            snapshot.owner,
            snapshot.faction,
            c.x,
            c.y,
            c.z,
            snapshot.entity_id,
            snapshot.health,
            p.x,
            p.y,
            p.z,
            q.x,
            q.y,
            q.z,
            q.w,
            snapshot.grid_size.as_str(),
        )
    }

    /// Write the volume of an entity.
    pub fn volume(&mut self, entity_id: &str, grid: &OccupancyGrid) -> io::Result<()> {
        writeln!(
            self.writer,
            "{VOLUME_TAG},{entity_id},{}",
            VolumeCodec::encode(grid)
        )
    }

    /// Write a block-removal row.
    pub fn block_removal(&mut self, grid_id: &str, count: usize, positions: &str) -> io::Result<()> {
        writeln!(self.writer, "{BLOCK_REMOVAL_TAG},{grid_id},{count},{positions}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
