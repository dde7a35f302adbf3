//! Incremental parser turning recording lines into frames and volumes.
//!
//! The parser keeps its cursor between calls: the two header lines are
//! consumed by the first batch, later batches continue where the previous one
//! stopped. A frame stays private to the parser until the next
//! `start_block` (or [`SegmentParser::finish`]) publishes it. A frame
//! published by `finish` keeps taking rows until the next `start_block`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Quat, Vec3};

use crate::schema::{EntitySnapshot, Frame, GridSizeClass};

use super::RecordingError;
use super::codec::VolumeCodec;
use super::format::{
    BLOCK_REMOVAL_FIELDS, BLOCK_REMOVAL_TAG, ColumnHeaders, Diagnostic, FormatError, GRID_TAG,
    RowError, RowKind, VOLUME_FIELDS, VOLUME_TAG, check_version,
};
use super::scene::Scene;
use super::sink::ProgressSink;

/// Deviation of |q| from 1 above which a recorded rotation is reported.
const NON_UNIT_TOLERANCE: f32 = 1e-3;

/// Progress is reported at most this many times per full parse.
const PROGRESS_STEPS: usize = 200;

/// Stateful line parser for one recording.
#[derive(Debug, Default)]
pub struct SegmentParser {
    /// Number of lines consumed so far, header included.
    line_number: u64,
    version_checked: bool,
    headers: Option<ColumnHeaders>,
    /// Frame being filled; `None` before the first `start_block`.
    open: Option<Frame>,
    /// The last published frame was closed by end of input, not by a
    /// `start_block`, and still takes rows.
    trailing: bool,
    /// Last size class seen for each entity.
    size_classes: HashMap<String, GridSizeClass>,
    diagnostics: Vec<Diagnostic>,
}

impl SegmentParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines consumed so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Column layout, once the header has been read.
    pub fn headers(&self) -> Option<&ColumnHeaders> {
        self.headers.as_ref()
    }

    /// Whether both header lines have been consumed.
    pub fn has_header(&self) -> bool {
        self.headers.is_some()
    }

    /// Row errors recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Remove and return the recorded row errors.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Whether a frame is currently being filled.
    pub fn has_open_frame(&self) -> bool {
        self.open.is_some()
    }

    /// Parse a whole recording read from the start of the file.
    ///
    /// Progress goes to `progress` as `line / total`; `cancel` is checked at
    /// each segment boundary. On success the trailing segment is published as
    /// the last frame; later rows go into it until the next `start_block`. On any error the caller is expected to drop `scene`.
    pub fn parse_all(
        &mut self,
        lines: &[String],
        scene: &mut Scene,
        progress: &mut dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<usize, RecordingError> {
        let total = lines.len().max(1);
        let report_every = (total / PROGRESS_STEPS).max(1);
        let mut published = 0;

        for (i, line) in lines.iter().enumerate() {
            if RowKind::classify(line) == RowKind::StartBlock && cancel.load(Ordering::Relaxed) {
                log::info!("Parse cancelled at line {}", self.line_number + 1);
                return Err(RecordingError::Cancelled);
            }

            if self.feed_line(line, scene)? {
                published += 1;
            }

            if i % report_every == 0 {
                progress.set_progress(i as f32 / total as f32);
            }
        }

        if !self.has_header() {
            return Err(FormatError::MissingHeader.into());
        }
        if self.finish(scene) {
            published += 1;
            self.trailing = true;
        }
        progress.set_progress(1.0);
        Ok(published)
    }

    /// Parse a batch of newly appended lines.
    ///
    /// Returns the number of frames published by this batch.
    pub fn feed(&mut self, lines: &[String], scene: &mut Scene) -> Result<usize, FormatError> {
        let mut published = 0;
        for line in lines {
            if self.feed_line(line, scene)? {
                published += 1;
            }
        }
        Ok(published)
    }

    /// Parse one line. Returns true when it published a frame.
    pub fn feed_line(&mut self, line: &str, scene: &mut Scene) -> Result<bool, FormatError> {
        self.line_number += 1;

        if !self.version_checked {
            check_version(line)?;
            self.version_checked = true;
            return Ok(false);
        }
        if self.headers.is_none() {
            let headers = ColumnHeaders::parse(line)?;
            log::debug!("Column layout: {headers}");
            self.headers = Some(headers);
            return Ok(false);
        }

        match RowKind::classify(line) {
            RowKind::StartBlock => {
                let published = self.finish(scene);
                self.trailing = false;
                self.open = Some(Frame::new());
                return Ok(published);
            }
            RowKind::Grid => {
                if let Err(error) = self.parse_grid(line, scene) {
                    self.report(error);
                }
            }
            RowKind::Volume => {
                if let Err(error) = self.parse_volume(line, scene) {
                    self.report(error);
                }
            }
            RowKind::BlockRemoval => {
                let found = line.split(',').count();
                if found != BLOCK_REMOVAL_FIELDS {
                    self.report(RowError::FieldCount {
                        tag: BLOCK_REMOVAL_TAG,
                        expected: BLOCK_REMOVAL_FIELDS,
                        found,
                    });
                }
            }
            RowKind::Unknown => {}
        }
        Ok(false)
    }

    /// Publish the open frame, if any. Returns true when a frame was published.
    pub fn finish(&mut self, scene: &mut Scene) -> bool {
        match self.open.take() {
            Some(frame) => {
                scene.push_frame(frame);
                true
            }
            None => false,
        }
    }

    fn parse_grid(&mut self, line: &str, scene: &mut Scene) -> Result<(), RowError> {
        let Some(headers) = &self.headers else {
            return Ok(());
        };
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != headers.len() {
            return Err(RowError::FieldCount {
                tag: GRID_TAG,
                expected: headers.len(),
                found: fields.len(),
            });
        }
        let column = |name: &str| headers.field(&fields, name).unwrap_or_default();

        let entity_id = column("entityId").to_string();
        let [px, py, pz] = parse_components::<3>(column("position"), "position")?;
        let [rx, ry, rz, rw] = parse_components::<4>(column("rotation"), "rotation")?;
        let [cx, cy, cz] = parse_components::<3>(column("factionColor"), "factionColor")?;
        let size_value = column("gridSize");
        let grid_size: GridSizeClass = size_value.parse().map_err(|_| RowError::UnknownGridSize {
            value: size_value.to_string(),
        })?;

        let orientation = Quat::from_xyzw(rx, ry, rz, rw);
        let length = orientation.length();
        if !length.is_finite() || length <= f32::EPSILON {
            return Err(RowError::InvalidOrientation { entity_id });
        }
        if (length - 1.0).abs() > NON_UNIT_TOLERANCE {
            log::warn!(
                "line {}: rotation of entity {entity_id} has length {length}, normalising",
                self.line_number
            );
        }

        let snapshot = EntitySnapshot {
            entity_id,
            name: column("name").to_string(),
            owner: column("owner").to_string(),
            faction: column("faction").to_string(),
            faction_color_seed: Vec3::new(cx, cy, cz),
            health: column("health").to_string(),
            position: Vec3::new(px, py, pz),
            orientation,
            grid_size,
        };

        let frame = match self.open.as_mut() {
            Some(frame) => Some(frame),
            None if self.trailing => scene.last_frame_mut(),
            None => None,
        };
        let Some(frame) = frame else {
            return Err(RowError::NoOpenFrame { tag: GRID_TAG });
        };
        self.size_classes
            .insert(snapshot.entity_id.clone(), snapshot.grid_size);
        frame.insert(snapshot);
        Ok(())
    }

    fn parse_volume(&mut self, line: &str, scene: &mut Scene) -> Result<(), RowError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != VOLUME_FIELDS {
            return Err(RowError::FieldCount {
                tag: VOLUME_TAG,
                expected: VOLUME_FIELDS,
                found: fields.len(),
            });
        }
        let entity_id = fields[1];

        let decoded = VolumeCodec::decode(entity_id, fields[2]).map_err(|source| RowError::Volume {
            entity_id: entity_id.to_string(),
            source,
        })?;
        if scene.has_volume(entity_id) {
            return Err(RowError::DuplicateVolume {
                entity_id: entity_id.to_string(),
            });
        }
        let Some(&size_class) = self.size_classes.get(entity_id) else {
            return Err(RowError::UnresolvedGridSize {
                entity_id: entity_id.to_string(),
            });
        };

        let built = scene.insert_volume(decoded.resolve(size_class))?;
        log::debug!(
            "Volume for {entity_id}: {} blocks, {} faces",
            built.mesh.block_count,
            built.mesh.mesh.quad_count()
        );
        Ok(())
    }

    fn report(&mut self, error: RowError) {
        log::warn!("line {}: {error}", self.line_number);
        self.diagnostics.push(Diagnostic {
            line: self.line_number,
            error,
        });
    }
}

/// Parse `N` space-separated finite floats.
fn parse_components<const N: usize>(value: &str, column: &'static str) -> Result<[f32; N], RowError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != N {
        return Err(RowError::ComponentCount {
            column,
            expected: N,
            found: parts.len(),
        });
    }

    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| RowError::InvalidNumber {
                column,
                value: value.to_string(),
            })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::sink::NoProgress;
    use crate::recording::volume::OccupancyGrid;

    const HEADER: &str = "kind,name,owner,faction,factionColor,entityId,health,position,rotation,gridSize";

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn grid_row(id: &str, position: &str, size: &str) -> String {
        format!("grid,Ship {id},me,RED,0.3 0.5 0.5,{id},100,{position},0 0 0 1,{size}")
    }

    fn parse(text: &str) -> (SegmentParser, Scene, Result<usize, RecordingError>) {
        let mut parser = SegmentParser::new();
        let mut scene = Scene::new();
        let cancel = AtomicBool::new(false);
        let result = parser.parse_all(&lines(text), &mut scene, &mut NoProgress, &cancel);
        (parser, scene, result)
    }

    #[test]
    fn test_single_entity_identity_pose() {
        let text = format!("version 2\n{HEADER}\nstart_block\n{}\n", grid_row("E1", "0 0 0", "Small"));
        let (parser, scene, result) = parse(&text);
        assert_eq!(result.unwrap(), 1);
        assert!(parser.diagnostics().is_empty());
        assert_eq!(scene.frame_count(), 1);

        let frame = scene.frame(0).unwrap();
        assert_eq!(frame.len(), 1);
        let snapshot = frame.get("E1").unwrap();
        assert_eq!(snapshot.pose(), crate::schema::Pose::IDENTITY);
        assert_eq!(snapshot.name, "Ship E1");
        assert_eq!(snapshot.grid_size, GridSizeClass::Small);
        assert_eq!(snapshot.faction_color_seed, Vec3::new(0.3, 0.5, 0.5));
    }

    #[test]
    fn test_frame_count_matches_start_blocks() {
        let mut text = format!("version 2\n{HEADER}\n");
        for i in 0..5 {
            text.push_str("start_block\n");
            text.push_str(&grid_row("E1", &format!("{i} 0 0"), "Large"));
            text.push('\n');
        }
        let (_, scene, result) = parse(&text);
        assert_eq!(result.unwrap(), 5);
        assert_eq!(scene.frame_count(), 5);
        assert_eq!(scene.frame(4).unwrap().get("E1").unwrap().position.x, 4.0);
    }

    #[test]
    fn test_empty_segments_still_make_frames() {
        let text = format!("version 2\n{HEADER}\nstart_block\nstart_block\n");
        let (_, scene, _) = parse(&text);
        assert_eq!(scene.frame_count(), 2);
        assert!(scene.frame(0).unwrap().is_empty());
    }

    #[test]
    fn test_bad_version_aborts() {
        let text = format!("version 1\n{HEADER}\nstart_block\n");
        let (_, scene, result) = parse(&text);
        assert!(matches!(
            result,
            Err(RecordingError::Format(FormatError::UnsupportedVersion { .. }))
        ));
        assert_eq!(scene.frame_count(), 0);
    }

    #[test]
    fn test_missing_columns_abort() {
        let text = "version 2\nkind,name,owner\nstart_block\n";
        let (_, _, result) = parse(text);
        assert!(matches!(
            result,
            Err(RecordingError::Format(FormatError::MissingColumns { .. }))
        ));
    }

    #[test]
    fn test_missing_header_line() {
        let (_, _, result) = parse("version 2\n");
        assert!(matches!(
            result,
            Err(RecordingError::Format(FormatError::MissingHeader))
        ));
    }

    #[test]
    fn test_reordered_columns() {
        let header = "kind,entityId,gridSize,rotation,position,health,factionColor,faction,owner,name,extra";
        let row = "grid,E7,Large,0 0 0 1,1 2 3,50,0 0 0,BLUE,you,Tanker,ignored";
        let text = format!("version 2\n{header}\nstart_block\n{row}\n");
        let (parser, scene, _) = parse(&text);
        assert!(parser.diagnostics().is_empty());
        let snapshot = scene.frame(0).unwrap().get("E7").unwrap();
        assert_eq!(snapshot.name, "Tanker");
        assert_eq!(snapshot.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(snapshot.grid_size, GridSizeClass::Large);
    }

    #[test]
    fn test_bad_rows_skipped_and_reported() {
        let text = format!(
            "version 2\n{HEADER}\n{}\nstart_block\ngrid,too,few\n{}\n{}\n{}\n{}\n{}\nv-,1,2\nmystery,row\n",
            grid_row("E0", "0 0 0", "Small"),
            grid_row("E1", "1 x 0", "Small"),
            grid_row("E2", "1 0", "Small"),
            grid_row("E3", "0 0 0", "Medium"),
            grid_row("E4", "0 0 0", "Small").replace("0 0 0 1", "0 0 0 0"),
            grid_row("E5", "5 5 5", "Small"),
        );
        let (parser, scene, result) = parse(&text);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(scene.frame_count(), 1);

        let frame = scene.frame(0).unwrap();
        assert_eq!(frame.len(), 1);
        assert!(frame.contains("E5"));

        let diagnostics = parser.diagnostics();
        assert_eq!(diagnostics.len(), 7);
        assert!(matches!(diagnostics[0].error, RowError::NoOpenFrame { .. }));
        assert_eq!(diagnostics[0].line, 3);
        assert!(matches!(diagnostics[1].error, RowError::FieldCount { tag: "grid", .. }));
        assert!(matches!(diagnostics[2].error, RowError::InvalidNumber { column: "position", .. }));
        assert!(matches!(diagnostics[3].error, RowError::ComponentCount { expected: 3, found: 2, .. }));
        assert!(matches!(diagnostics[4].error, RowError::UnknownGridSize { .. }));
        assert!(matches!(diagnostics[5].error, RowError::InvalidOrientation { .. }));
        assert!(matches!(diagnostics[6].error, RowError::FieldCount { tag: "v-", expected: 4, found: 3 }));
    }

    #[test]
    fn test_volume_before_grid_is_rejected() {
        let payload = VolumeCodec::encode(&OccupancyGrid::from_fn(2, 1, 1, |_, _, _| true));
        let text = format!(
            "version 2\n{HEADER}\nstart_block\nvolume,E1,{payload}\n{}\n",
            grid_row("E1", "0 0 0", "Small")
        );
        let (parser, scene, _) = parse(&text);
        assert_eq!(scene.volume_count(), 0);
        assert!(matches!(
            parser.diagnostics()[0].error,
            RowError::UnresolvedGridSize { .. }
        ));
    }

    #[test]
    fn test_volume_resolves_size_and_first_wins() {
        let payload = VolumeCodec::encode(&OccupancyGrid::from_fn(2, 1, 1, |_, _, _| true));
        let other = VolumeCodec::encode(&OccupancyGrid::from_fn(1, 1, 1, |_, _, _| true));
        let text = format!(
            "version 2\n{HEADER}\nstart_block\n{}\nvolume,E1,{payload}\nstart_block\nvolume,E1,{other}\nvolume,E2,%%%\nvolume,E3\n",
            grid_row("E1", "0 0 0", "Large")
        );
        let (parser, scene, _) = parse(&text);
        assert_eq!(scene.volume_count(), 1);
        let volume = scene.volume("E1").unwrap();
        assert_eq!(volume.volume.grid_size(), 2.5);
        assert_eq!(volume.mesh.block_count, 2);

        let diagnostics = parser.diagnostics();
        assert_eq!(diagnostics.len(), 3);
        assert!(matches!(diagnostics[0].error, RowError::DuplicateVolume { .. }));
        assert!(matches!(diagnostics[1].error, RowError::Volume { .. }));
        assert!(matches!(diagnostics[2].error, RowError::FieldCount { tag: "volume", .. }));
    }

    #[test]
    fn test_incremental_feed_publishes_on_start_block() {
        let mut parser = SegmentParser::new();
        let mut scene = Scene::new();

        let first = lines(&format!("version 2\n{HEADER}\nstart_block\n{}", grid_row("E1", "0 0 0", "Small")));
        assert_eq!(parser.feed(&first, &mut scene).unwrap(), 0);
        assert!(parser.has_open_frame());
        assert_eq!(scene.frame_count(), 0);

        let second = lines(&format!("{}\nstart_block", grid_row("E2", "1 1 1", "Small")));
        assert_eq!(parser.feed(&second, &mut scene).unwrap(), 1);
        assert_eq!(scene.frame(0).unwrap().len(), 2);
        assert_eq!(parser.line_number(), 6);
    }

    #[test]
    fn test_rows_after_full_parse_extend_last_frame() {
        let text = format!("version 2\n{HEADER}\nstart_block\n{}\n", grid_row("E1", "0 0 0", "Small"));
        let (mut parser, mut scene, result) = parse(&text);
        assert_eq!(result.unwrap(), 1);
        assert!(!parser.has_open_frame());

        let appended = lines(&format!(
            "{}\nstart_block\n{}",
            grid_row("E2", "1 1 1", "Large"),
            grid_row("E3", "2 2 2", "Small")
        ));
        assert_eq!(parser.feed(&appended, &mut scene).unwrap(), 0);
        assert!(parser.diagnostics().is_empty());
        assert_eq!(scene.frame_count(), 1);

        let last = scene.frame(0).unwrap();
        assert_eq!(last.len(), 2);
        assert!(last.contains("E2"));
        assert!(!last.contains("E3"));

        // The next marker closes the frame for good.
        assert_eq!(parser.feed(&lines("start_block"), &mut scene).unwrap(), 1);
        assert_eq!(scene.frame(0).unwrap().len(), 2);
        assert!(scene.frame(1).unwrap().contains("E3"));
    }

    #[test]
    fn test_cancel_stops_at_segment_boundary() {
        let text = format!("version 2\n{HEADER}\nstart_block\nstart_block\n");
        let mut parser = SegmentParser::new();
        let mut scene = Scene::new();
        let cancel = AtomicBool::new(true);
        let result = parser.parse_all(&lines(&text), &mut scene, &mut NoProgress, &cancel);
        assert!(matches!(result, Err(RecordingError::Cancelled)));
        assert_eq!(scene.frame_count(), 0);
    }

    #[test]
    fn test_progress_reaches_completion() {
        struct Recorder(Vec<f32>);
        impl ProgressSink for Recorder {
            fn set_title(&mut self, _title: &str) {}
            fn set_progress(&mut self, fraction: f32) {
                self.0.push(fraction);
            }
        }

        let text = format!("version 2\n{HEADER}\nstart_block\nstart_block\n");
        let mut recorder = Recorder(Vec::new());
        let mut parser = SegmentParser::new();
        let mut scene = Scene::new();
        parser
            .parse_all(&lines(&text), &mut scene, &mut recorder, &AtomicBool::new(false))
            .unwrap();
        assert_eq!(recorder.0.first(), Some(&0.0));
        assert_eq!(recorder.0.last(), Some(&1.0));
        assert!(recorder.0.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_parse_components() {
        assert_eq!(parse_components::<3>("1 -2.5 3e2", "position").unwrap(), [1.0, -2.5, 300.0]);
        assert!(matches!(
            parse_components::<3>("1 NaN 3", "position"),
            Err(RowError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_components::<4>("1 2 3", "rotation"),
            Err(RowError::ComponentCount { expected: 4, found: 3, .. })
        ));
    }
}
