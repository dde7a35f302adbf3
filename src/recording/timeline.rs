//! Scrubber to frame mapping, pose interpolation and the playback clock.
//!
//! The scrubber is a normalized position in [0, 1] spread evenly over the
//! frame sequence. A position between two frames interpolates every entity of
//! the later frame from its pose in the earlier one.

use crate::schema::{EntitySnapshot, FactionPalette, Frame, Pose, SpeedPreset};

/// Map a scrubber position onto `(frame index, interpolation factor)`.
///
/// The factor is always 0 on the first frame.
pub fn frame_index_and_factor(scrubber: f64, frame_count: usize) -> (usize, f64) {
    if frame_count <= 1 {
        return (0, 0.0);
    }
    let scrubber = if scrubber.is_nan() {
        0.0
    } else {
        scrubber.clamp(0.0, 1.0)
    };

    let last = frame_count - 1;
    let remapped = scrubber * last as f64;
    let floor = remapped.floor();
    let index = (floor as usize).min(last);
    let factor = if index == 0 { 0.0 } else { remapped - floor };
    (index, factor)
}

/// Move the scrubber back by one frame's share of the timeline.
pub fn retreat(scrubber: f64, frame_count: usize) -> f64 {
    if frame_count <= 1 {
        return scrubber;
    }
    (scrubber - 1.0 / (frame_count - 1) as f64).max(0.0)
}

/// Pose of `current` at factor `t` between its previous and current sample.
///
/// Without a previous sample the entity snaps to its current pose.
pub fn interpolate_pose(previous: Option<&EntitySnapshot>, current: &EntitySnapshot, t: f64) -> Pose {
    let current = current.pose();
    let Some(previous) = previous else {
        return current;
    };
    let previous = previous.pose();
    let t = t.clamp(0.0, 1.0) as f32;

    Pose {
        position: previous.position.lerp(current.position, t),
        orientation: previous.orientation.slerp(current.orientation, t),
    }
}

/// Interpolated pose of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPose {
    pub entity_id: String,
    pub pose: Pose,
    /// Display colour of the entity's faction.
    pub color: [f32; 3],
}

/// Result of sampling the timeline at one scrubber position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSample {
    pub frame_index: usize,
    pub factor: f64,
    /// One pose per entity of the current frame, in frame order.
    pub poses: Vec<EntityPose>,
}

/// Sample every entity of the frame under `scrubber`.
///
/// Factions seen for the first time get their colour assigned in `palette`.
/// Returns `None` when there are no frames.
pub fn sample(frames: &[Frame], scrubber: f64, palette: &mut FactionPalette) -> Option<PlaybackSample> {
    let (frame_index, factor) = frame_index_and_factor(scrubber, frames.len());
    let current = frames.get(frame_index)?;
    let previous = if frame_index > 0 {
        frames.get(frame_index - 1)
    } else {
        None
    };

    let poses = current
        .iter()
        .map(|snapshot| EntityPose {
            entity_id: snapshot.entity_id.clone(),
            pose: interpolate_pose(
                previous.and_then(|f| f.get(&snapshot.entity_id)),
                snapshot,
                factor,
            ),
            color: palette.color_for(&snapshot.faction, snapshot.faction_color_seed),
        })
        .collect();

    Some(PlaybackSample {
        frame_index,
        factor,
        poses,
    })
}

/// Format whole seconds as `HH:MM:SS`.
pub fn format_seconds(total: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

/// Playback clock driving the scrubber.
///
/// One frame corresponds to one second of recording; the active speed preset
/// scales how fast the scrubber moves.
#[derive(Debug, Clone)]
pub struct Playback {
    scrubber: f64,
    playing: bool,
    /// The user is dragging the scrubber; the clock does not advance.
    sliding: bool,
    looping: bool,
    presets: Vec<SpeedPreset>,
    speed: usize,
}

impl Playback {
    /// Create a stopped clock at position 0.
    ///
    /// An empty preset list falls back to the default presets.
    pub fn new(presets: Vec<SpeedPreset>, speed: usize, looping: bool) -> Self {
        let presets = if presets.is_empty() {
            SpeedPreset::defaults()
        } else {
            presets
        };
        let speed = speed.min(presets.len() - 1);
        Self {
            scrubber: 0.0,
            playing: false,
            sliding: false,
            looping,
            presets,
            speed,
        }
    }

    pub fn scrubber(&self) -> f64 {
        self.scrubber
    }

    /// Jump to a position, as when the slider is dragged.
    pub fn set_scrubber(&mut self, value: f64) {
        self.scrubber = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Toggle play/pause. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    pub fn set_sliding(&mut self, sliding: bool) {
        self.sliding = sliding;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn presets(&self) -> &[SpeedPreset] {
        &self.presets
    }

    /// Index of the active speed preset.
    pub fn speed(&self) -> usize {
        self.speed
    }

    /// Select a speed preset. Out-of-range indices are ignored.
    pub fn set_speed(&mut self, index: usize) -> bool {
        if index < self.presets.len() {
            self.speed = index;
            true
        } else {
            false
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.presets
            .get(self.speed)
            .map_or(1.0, |p| p.multiplier as f64)
    }

    /// Advance by `delta_secs` of wall-clock time.
    pub fn advance(&mut self, delta_secs: f64, frame_count: usize) {
        if !self.playing || self.sliding || frame_count == 0 {
            return;
        }
        let duration = frame_count as f64 / self.multiplier();
        self.scrubber += delta_secs / duration;
        if self.scrubber > 1.0 {
            self.scrubber = if self.looping { 0.0 } else { 1.0 };
        }
    }

    /// Step back one frame after frames were appended.
    pub fn retreat(&mut self, frame_count: usize) {
        self.scrubber = retreat(self.scrubber, frame_count);
    }

    /// Current frame index and interpolation factor.
    pub fn position(&self, frame_count: usize) -> (usize, f64) {
        frame_index_and_factor(self.scrubber, frame_count)
    }

    /// `HH:MM:SS/HH:MM:SS` of the current position and the total length.
    pub fn time_label(&self, frame_count: usize) -> String {
        let elapsed = (self.scrubber * frame_count as f64).floor() as u64;
        format!(
            "{}/{}",
            format_seconds(elapsed),
            format_seconds(frame_count as u64)
        )
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(SpeedPreset::defaults(), 2, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GridSizeClass;
    use glam::{Quat, Vec3};
    use proptest::prelude::*;
    use std::f32::consts::FRAC_PI_2;

    fn snapshot(entity_id: &str, position: Vec3, orientation: Quat) -> EntitySnapshot {
        EntitySnapshot {
            entity_id: entity_id.to_string(),
            name: entity_id.to_string(),
            owner: String::new(),
            faction: "RED".to_string(),
            faction_color_seed: Vec3::ZERO,
            health: "1".to_string(),
            position,
            orientation,
            grid_size: GridSizeClass::Small,
        }
    }

    fn frame(snapshots: Vec<EntitySnapshot>) -> Frame {
        let mut frame = Frame::new();
        for s in snapshots {
            frame.insert(s);
        }
        frame
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(frame_index_and_factor(0.0, 5), (0, 0.0));
        assert_eq!(frame_index_and_factor(1.0, 5), (4, 0.0));
        assert_eq!(frame_index_and_factor(0.5, 0), (0, 0.0));
        assert_eq!(frame_index_and_factor(0.5, 1), (0, 0.0));
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(frame_index_and_factor(-3.0, 5), (0, 0.0));
        assert_eq!(frame_index_and_factor(7.0, 5), (4, 0.0));
        assert_eq!(frame_index_and_factor(f64::NAN, 5), (0, 0.0));
    }

    #[test]
    fn test_factor_between_frames() {
        let (index, t) = frame_index_and_factor(0.625, 5);
        assert_eq!(index, 2);
        assert!((t - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_factor_on_first_frame() {
        let (index, t) = frame_index_and_factor(0.1, 5);
        assert_eq!((index, t), (0, 0.0));
    }

    #[test]
    fn test_retreat() {
        assert!((retreat(0.5, 5) - 0.25).abs() < 1e-12);
        assert_eq!(retreat(0.1, 5), 0.0);
        assert_eq!(retreat(0.7, 1), 0.7);
        assert_eq!(retreat(0.7, 0), 0.7);
    }

    #[test]
    fn test_interpolate_position_and_rotation() {
        let prev = snapshot("A", Vec3::ZERO, Quat::IDENTITY);
        let cur = snapshot("A", Vec3::new(2.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2));
        let pose = interpolate_pose(Some(&prev), &cur, 0.5);
        assert!((pose.position - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
        let expected = Quat::from_rotation_y(FRAC_PI_2 / 2.0);
        assert!(pose.orientation.angle_between(expected) < 1e-4);
    }

    #[test]
    fn test_interpolate_normalizes_endpoints() {
        let prev = snapshot("A", Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 2.0));
        let cur = snapshot("A", Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 0.5));
        let pose = interpolate_pose(Some(&prev), &cur, 0.3);
        assert!((pose.orientation.length() - 1.0).abs() < 1e-6);
        assert!(pose.orientation.angle_between(Quat::IDENTITY) < 1e-4);
    }

    #[test]
    fn test_new_entity_snaps_to_current_pose() {
        let cur = snapshot("A", Vec3::new(3.0, 4.0, 5.0), Quat::IDENTITY);
        let pose = interpolate_pose(None, &cur, 0.75);
        assert_eq!(pose.position, Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_sample_interpolates_only_known_entities() {
        let frames = vec![
            frame(vec![snapshot("A", Vec3::ZERO, Quat::IDENTITY)]),
            frame(vec![
                snapshot("A", Vec3::new(4.0, 0.0, 0.0), Quat::IDENTITY),
                snapshot("B", Vec3::new(0.0, 9.0, 0.0), Quat::IDENTITY),
            ]),
            frame(vec![snapshot("A", Vec3::new(8.0, 0.0, 0.0), Quat::IDENTITY)]),
        ];

        // remapped = 0.75 * 2 = 1.5 -> frame 1, halfway from frame 0.
        let mut palette = FactionPalette::new([0.6; 3]);
        let sample = sample(&frames, 0.75, &mut palette).unwrap();
        assert_eq!(sample.frame_index, 1);
        assert!((sample.factor - 0.5).abs() < 1e-9);
        assert_eq!(sample.poses.len(), 2);
        assert_eq!(sample.poses[0].entity_id, "A");
        assert!((sample.poses[0].pose.position.x - 2.0).abs() < 1e-6);
        assert_eq!(sample.poses[1].pose.position, Vec3::new(0.0, 9.0, 0.0));
        assert_eq!(sample.poses[0].color, palette.get("RED").unwrap());
    }

    #[test]
    fn test_sample_empty() {
        let mut palette = FactionPalette::new([0.6; 3]);
        assert!(sample(&[], 0.5, &mut palette).is_none());
        assert!(palette.is_empty());
    }

    #[test]
    fn test_playback_advance_and_clamp() {
        let mut playback = Playback::new(vec![SpeedPreset::new("x2", 2.0)], 0, false);
        playback.advance(1.0, 10);
        assert_eq!(playback.scrubber(), 0.0);

        playback.set_playing(true);
        playback.advance(1.0, 10);
        assert!((playback.scrubber() - 0.2).abs() < 1e-12);

        playback.advance(100.0, 10);
        assert_eq!(playback.scrubber(), 1.0);
    }

    #[test]
    fn test_playback_loops() {
        let mut playback = Playback::new(SpeedPreset::defaults(), 0, true);
        playback.set_playing(true);
        playback.set_scrubber(0.99);
        playback.advance(10.0, 10);
        assert_eq!(playback.scrubber(), 0.0);
    }

    #[test]
    fn test_playback_paused_while_sliding() {
        let mut playback = Playback::default();
        playback.toggle();
        playback.set_sliding(true);
        playback.set_scrubber(0.3);
        playback.advance(1.0, 10);
        assert_eq!(playback.scrubber(), 0.3);
    }

    #[test]
    fn test_set_speed_rejects_out_of_range() {
        let mut playback = Playback::default();
        assert!(playback.set_speed(0));
        assert!(!playback.set_speed(99));
        assert_eq!(playback.speed(), 0);
        assert_eq!(playback.multiplier(), 10.0);
    }

    #[test]
    fn test_time_label() {
        let mut playback = Playback::default();
        playback.set_scrubber(0.5);
        assert_eq!(playback.time_label(7322), "01:01:01/02:02:02");
        assert_eq!(format_seconds(59), "00:00:59");
    }

    proptest! {
        #[test]
        fn prop_index_and_factor_in_bounds(scrubber in -1.0f64..2.0, n in 0usize..10_000) {
            let (index, t) = frame_index_and_factor(scrubber, n);
            prop_assert!(index < n.max(1));
            prop_assert!((0.0..1.0).contains(&t));
        }

        #[test]
        fn prop_scrubber_endpoints(n in 2usize..100_000) {
            prop_assert_eq!(frame_index_and_factor(0.0, n), (0, 0.0));
            prop_assert_eq!(frame_index_and_factor(1.0, n), (n - 1, 0.0));
        }

        #[test]
        fn prop_retreat_never_negative(scrubber in 0.0f64..=1.0, n in 0usize..1000) {
            let r = retreat(scrubber, n);
            prop_assert!(r >= 0.0);
            prop_assert!(r <= scrubber);
        }
    }
}
