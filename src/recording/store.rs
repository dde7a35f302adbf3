//! Recording aggregate: frames, volumes, tailing and playback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::schema::{FactionPalette, Frame, ReplayConfig};

use super::RecordingError;
use super::format::Diagnostic;
use super::parser::SegmentParser;
use super::scene::{GridVolume, Scene};
use super::sink::{EntityListSink, ProgressSink, SceneSink};
use super::tailer::LogTailer;
use super::timeline::{self, Playback, PlaybackSample};

/// An opened recording.
///
/// Owns the frame sequence and volume cache, keeps following the file as it
/// grows and maps playback time onto frames.
///
/// Usage:
/// ```ignore
/// let mut store = RecordingStore::load("fight.scc", ReplayConfig::default(), &mut NoProgress)?;
/// println!("{} frames", store.frame_count());
/// store.playback_mut().set_playing(true);
/// store.tick(0.016, &mut renderer, &mut entity_list)?;
/// ```
#[derive(Debug)]
pub struct RecordingStore {
    config: ReplayConfig,
    tailer: LogTailer,
    parser: SegmentParser,
    scene: Scene,
    playback: Playback,
    palette: FactionPalette,
    /// Playback time accumulated since the last tail read.
    since_poll: f64,
    /// Frame index last handed to the entity list.
    listed_frame: Option<usize>,
}

impl RecordingStore {
    /// Open and fully parse a recording.
    pub fn load<P: AsRef<Path>>(
        path: P,
        config: ReplayConfig,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, RecordingError> {
        Self::load_with_cancel(path, config, progress, &AtomicBool::new(false))
    }

    /// Open and fully parse a recording, giving up when `cancel` is set.
    ///
    /// Nothing is published on failure or cancellation.
    pub fn load_with_cancel<P: AsRef<Path>>(
        path: P,
        config: ReplayConfig,
        progress: &mut dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<Self, RecordingError> {
        let path = path.as_ref();
        let title = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        progress.set_title(&format!("Loading {title}"));

        let mut tailer = LogTailer::new(path);
        let read = tailer.poll()?;

        let mut parser = SegmentParser::new();
        let mut scene = Scene::new();
        let result = parser.parse_all(&read.lines, &mut scene, progress, cancel);
        if let Err(error) = result {
            // Close the progress display before reporting.
            progress.set_progress(1.0);
            return Err(error);
        }

        log::info!(
            "Loaded {}: {} frames, {} volumes, {} row errors",
            path.display(),
            scene.frame_count(),
            scene.volume_count(),
            parser.diagnostics().len()
        );

        let playback = Playback::new(
            config.speed_presets.clone(),
            config.default_speed,
            config.looping,
        );
        let palette = FactionPalette::new(config.neutral_color);

        Ok(Self {
            config,
            tailer,
            parser,
            scene,
            playback,
            palette,
            since_poll: 0.0,
            listed_frame: None,
        })
    }

    /// Run [`RecordingStore::load`] on a worker thread.
    pub fn spawn_load<P, S>(path: P, config: ReplayConfig, mut progress: S) -> LoadHandle
    where
        P: Into<PathBuf>,
        S: ProgressSink + Send + 'static,
    {
        let path = path.into();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = thread::spawn(move || {
            RecordingStore::load_with_cancel(&path, config, &mut progress, &flag)
        });
        LoadHandle { cancel, handle }
    }

    pub fn path(&self) -> &Path {
        self.tailer.path()
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Completed frames in arrival order.
    pub fn frames(&self) -> &[Frame] {
        self.scene.frames()
    }

    pub fn frame_count(&self) -> usize {
        self.scene.frame_count()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn volume(&self, entity_id: &str) -> Option<&GridVolume> {
        self.scene.volume(entity_id)
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut Playback {
        &mut self.playback
    }

    pub fn palette(&self) -> &FactionPalette {
        &self.palette
    }

    /// Row errors seen so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.parser.diagnostics()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.parser.take_diagnostics()
    }

    /// Read and parse lines appended since the last read.
    ///
    /// Returns the number of frames published. When frames were added the
    /// scrubber steps back one frame of the old length.
    pub fn poll(&mut self) -> Result<usize, RecordingError> {
        let read = self.tailer.poll()?;
        if read.is_empty() {
            return Ok(0);
        }

        let before = self.scene.frame_count();
        let published = self.parser.feed(&read.lines, &mut self.scene)?;
        if published > 0 {
            self.playback.retreat(before);
            log::debug!(
                "Appended {published} frames ({} total), scrubber at {:.4}",
                self.scene.frame_count(),
                self.playback.scrubber()
            );
        }
        Ok(published)
    }

    /// Poll once `poll_interval_secs` of playback time has passed and the
    /// file has grown.
    pub fn maybe_poll(&mut self, delta_secs: f64) -> Result<usize, RecordingError> {
        self.since_poll += delta_secs;
        if self.since_poll <= self.config.poll_interval_secs as f64 {
            return Ok(0);
        }
        if !self.tailer.has_changed()? {
            return Ok(0);
        }
        self.since_poll = 0.0;
        self.poll()
    }

    /// Sample the timeline at the current scrubber position.
    pub fn sample(&mut self) -> Option<PlaybackSample> {
        timeline::sample(
            self.scene.frames(),
            self.playback.scrubber(),
            &mut self.palette,
        )
    }

    /// Advance one display tick.
    ///
    /// Tails the file when due, advances the clock, hands new volumes and the
    /// current poses to `scene` and refreshes `entities` when the frame
    /// changes.
    pub fn tick(
        &mut self,
        delta_secs: f64,
        scene: &mut dyn SceneSink,
        entities: &mut dyn EntityListSink,
    ) -> Result<Option<PlaybackSample>, RecordingError> {
        if !self.playback.is_sliding() {
            self.maybe_poll(delta_secs)?;
        }
        self.playback.advance(delta_secs, self.scene.frame_count());

        for entity_id in self.scene.take_fresh_volumes() {
            if let Some(volume) = self.scene.volume(&entity_id) {
                scene.volume_ready(&entity_id, volume);
            }
        }

        let Some(sample) = self.sample() else {
            return Ok(None);
        };
        scene.show_sample(&sample);

        if self.listed_frame != Some(sample.frame_index) {
            if let Some(frame) = self.scene.frame(sample.frame_index) {
                entities.refresh(sample.frame_index, frame);
            }
            self.listed_frame = Some(sample.frame_index);
        }
        Ok(Some(sample))
    }

    /// Release all frames and volumes.
    pub fn close(mut self) {
        self.scene.clear();
        self.palette.clear();
        log::info!("Closed {}", self.tailer.path().display());
    }
}

/// A recording being loaded on a worker thread.
#[derive(Debug)]
pub struct LoadHandle {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Result<RecordingStore, RecordingError>>,
}

impl LoadHandle {
    /// Ask the worker to stop at the next segment boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the load to finish. Panics of the worker are resumed here.
    pub fn join(self) -> Result<RecordingStore, RecordingError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
