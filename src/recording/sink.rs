//! Interfaces of the collaborators a recording reports to.

use crate::schema::Frame;

use super::scene::GridVolume;
use super::timeline::PlaybackSample;

/// Receives progress of a full recording load.
pub trait ProgressSink {
    fn set_title(&mut self, title: &str);

    /// Fraction in [0, 1]. A value of 1 or more signals completion.
    fn set_progress(&mut self, fraction: f32);
}

/// Progress sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_title(&mut self, _title: &str) {}

    fn set_progress(&mut self, _fraction: f32) {}
}

/// Renderer side of playback.
pub trait SceneSink {
    /// A volume and its mesh were built for `entity_id`.
    fn volume_ready(&mut self, entity_id: &str, volume: &GridVolume);

    /// Poses for the current playback position. Entities not listed are not
    /// part of the current frame.
    fn show_sample(&mut self, sample: &PlaybackSample);
}

/// Entity list panel.
pub trait EntityListSink {
    /// The current frame changed to `frame_index`.
    fn refresh(&mut self, frame_index: usize, frame: &Frame);
}

/// Scene sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScene;

impl SceneSink for NullScene {
    fn volume_ready(&mut self, _entity_id: &str, _volume: &GridVolume) {}

    fn show_sample(&mut self, _sample: &PlaybackSample) {}
}

impl EntityListSink for NullScene {
    fn refresh(&mut self, _frame_index: usize, _frame: &Frame) {}
}
