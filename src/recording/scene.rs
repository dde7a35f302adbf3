//! Published recording data: closed frames and per-entity volumes.

use std::collections::HashMap;

use crate::schema::Frame;

use super::format::RowError;
use super::mesh::{MeshBuilder, VoxelMesh};
use super::volume::Volume;

/// A volume together with its derived surface mesh.
#[derive(Debug, Clone)]
pub struct GridVolume {
    pub volume: Volume,
    pub mesh: VoxelMesh,
}

impl GridVolume {
    /// Build the mesh for `volume`.
    pub fn new(volume: Volume) -> Self {
        let mesh = MeshBuilder::build(&volume);
        Self { volume, mesh }
    }

    /// Half extents of the volume's bounding box in world units.
    pub fn half_extents(&self) -> glam::Vec3 {
        let (w, h, d) = self.volume.grid.dimensions();
        glam::Vec3::new(w as f32, h as f32, d as f32) * self.volume.grid_size() * 0.5
    }
}

/// Frames in arrival order plus the volume cache.
///
/// Frames are appended in order; a frame's index is its identity. Only the
/// last frame can still change, while its segment is being written.
#[derive(Debug, Default)]
pub struct Scene {
    frames: Vec<Frame>,
    volumes: HashMap<String, GridVolume>,
    /// Entity ids of volumes not yet handed to a scene sink.
    fresh_volumes: Vec<String>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a completed frame.
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The most recent frame, for rows of a segment still being written.
    pub fn last_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn has_volume(&self, entity_id: &str) -> bool {
        self.volumes.contains_key(entity_id)
    }

    pub fn volume(&self, entity_id: &str) -> Option<&GridVolume> {
        self.volumes.get(entity_id)
    }

    pub fn volumes(&self) -> impl Iterator<Item = (&str, &GridVolume)> {
        self.volumes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    /// Mesh and cache a volume. The first volume for an entity wins.
    pub fn insert_volume(&mut self, volume: Volume) -> Result<&GridVolume, RowError> {
        if self.volumes.contains_key(&volume.entity_id) {
            return Err(RowError::DuplicateVolume {
                entity_id: volume.entity_id,
            });
        }
        let entity_id = volume.entity_id.clone();
        self.fresh_volumes.push(entity_id.clone());
        Ok(self
            .volumes
            .entry(entity_id)
            .or_insert_with(|| GridVolume::new(volume)))
    }

    /// Entity ids of volumes added since the last call.
    pub fn take_fresh_volumes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.fresh_volumes)
    }

    /// Release all frames and volumes.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.volumes.clear();
        self.fresh_volumes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::volume::OccupancyGrid;
    use crate::schema::GridSizeClass;

    fn volume(id: &str, size_class: GridSizeClass) -> Volume {
        Volume {
            entity_id: id.to_string(),
            grid: OccupancyGrid::from_fn(2, 1, 1, |_, _, _| true),
            size_class,
        }
    }

    #[test]
    fn test_first_volume_wins() {
        let mut scene = Scene::new();
        scene.insert_volume(volume("E1", GridSizeClass::Small)).unwrap();
        let err = scene
            .insert_volume(volume("E1", GridSizeClass::Large))
            .unwrap_err();
        assert!(matches!(err, RowError::DuplicateVolume { .. }));
        assert_eq!(scene.volume_count(), 1);
        assert_eq!(
            scene.volume("E1").unwrap().volume.size_class,
            GridSizeClass::Small
        );
    }

    #[test]
    fn test_insert_builds_mesh_and_tracks_fresh() {
        let mut scene = Scene::new();
        let inserted = scene.insert_volume(volume("E1", GridSizeClass::Large)).unwrap();
        assert_eq!(inserted.mesh.mesh.quad_count(), 10);
        assert_eq!(inserted.half_extents(), glam::Vec3::new(2.5, 1.25, 1.25));

        assert_eq!(scene.take_fresh_volumes(), vec!["E1".to_string()]);
        assert!(scene.take_fresh_volumes().is_empty());
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut scene = Scene::new();
        scene.push_frame(Frame::new());
        scene.insert_volume(volume("E1", GridSizeClass::Small)).unwrap();
        scene.clear();
        assert_eq!(scene.frame_count(), 0);
        assert_eq!(scene.volume_count(), 0);
        assert!(scene.take_fresh_volumes().is_empty());
    }
}
