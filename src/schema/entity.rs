//! Entity snapshots and frames.

use std::collections::HashMap;
use std::str::FromStr;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Block size class of a grid entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridSizeClass {
    Small,
    Large,
}

impl GridSizeClass {
    /// Edge length of one block in world units.
    #[inline]
    pub fn block_size(self) -> f32 {
        match self {
            GridSizeClass::Small => 0.5,
            GridSizeClass::Large => 2.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GridSizeClass::Small => "Small",
            GridSizeClass::Large => "Large",
        }
    }
}

impl FromStr for GridSizeClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Small" => Ok(GridSizeClass::Small),
            "Large" => Ok(GridSizeClass::Large),
            _ => Err(()),
        }
    }
}

/// State of one tracked entity at one sample time.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    /// Identifier, unique within a frame.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// Owning player, as written by the recorder.
    pub owner: String,
    /// Faction tag.
    pub faction: String,
    /// Seed vector for the faction display colour (x is used as hue).
    pub faction_color_seed: Vec3,
    /// Health column, kept verbatim.
    pub health: String,
    /// World position.
    pub position: Vec3,
    /// Orientation as stored in the file (may be slightly non-unit).
    pub orientation: Quat,
    /// Block size class.
    pub grid_size: GridSizeClass,
}

impl EntitySnapshot {
    /// Pose as recorded, orientation normalised.
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            orientation: self.orientation.normalize(),
        }
    }
}

/// Position and orientation of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };
}

/// All entity snapshots sampled at one `start_block`.
///
/// Entities keep arrival order. Inserting an id that is already present
/// replaces the earlier snapshot in place.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    entities: Vec<EntitySnapshot>,
    index: HashMap<String, usize>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot; last write wins for a repeated entity id.
    pub fn insert(&mut self, snapshot: EntitySnapshot) {
        match self.index.get(&snapshot.entity_id) {
            Some(&i) => self.entities[i] = snapshot,
            None => {
                self.index
                    .insert(snapshot.entity_id.clone(), self.entities.len());
                self.entities.push(snapshot);
            }
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntitySnapshot> {
        self.index.get(entity_id).map(|&i| &self.entities[i])
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.index.contains_key(entity_id)
    }

    pub fn entities(&self) -> &[EntitySnapshot] {
        &self.entities
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntitySnapshot> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a EntitySnapshot;
    type IntoIter = std::slice::Iter<'a, EntitySnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}
