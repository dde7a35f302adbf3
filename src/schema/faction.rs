//! Faction display colours.

use std::collections::HashMap;

use glam::Vec3;

/// Faction name that always gets the neutral colour.
pub const UNOWNED_FACTION: &str = "Unowned";

const FACTION_SATURATION: f32 = 0.95;
const FACTION_VALUE: f32 = 0.2;

/// Assigns one RGB colour per faction, fixed at first sight.
#[derive(Debug, Clone)]
pub struct FactionPalette {
    neutral: [f32; 3],
    colors: HashMap<String, [f32; 3]>,
}

impl FactionPalette {
    pub fn new(neutral: [f32; 3]) -> Self {
        Self {
            neutral,
            colors: HashMap::new(),
        }
    }

    /// Colour for `faction`, assigning it from `seed` if this is the first time.
    pub fn color_for(&mut self, faction: &str, seed: Vec3) -> [f32; 3] {
        if let Some(color) = self.colors.get(faction) {
            return *color;
        }
        let color = if faction == UNOWNED_FACTION {
            self.neutral
        } else {
            hsv_to_rgb(seed.x, FACTION_SATURATION, FACTION_VALUE)
        };
        self.colors.insert(faction.to_string(), color);
        color
    }

    pub fn get(&self, faction: &str) -> Option<[f32; 3]> {
        self.colors.get(faction).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn clear(&mut self) {
        self.colors.clear();
    }
}

/// HSV to RGB, all components in [0, 1]. Hue wraps.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u32 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}
