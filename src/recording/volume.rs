//! Bit-packed voxel occupancy and per-entity volumes.

use bitvec::prelude::*;

use crate::schema::GridSizeClass;

/// Dense 3D occupancy bitmap.
///
/// Bits are stored most-significant-bit first within each byte, in index
/// order `z * width * height + y * width + x`. The bit length always equals
/// `width * height * depth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    depth: usize,
    bits: BitVec<u8, Msb0>,
}

impl OccupancyGrid {
    /// Create an empty grid.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
            bits: BitVec::repeat(false, width * height * depth),
        }
    }

    /// Create a grid by evaluating `f(x, y, z)` for every cell.
    pub fn from_fn(
        width: usize,
        height: usize,
        depth: usize,
        mut f: impl FnMut(usize, usize, usize) -> bool,
    ) -> Self {
        let mut grid = Self::new(width, height, depth);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    if f(x, y, z) {
                        grid.set(x, y, z, true);
                    }
                }
            }
        }
        grid
    }

    /// Wrap packed bytes. `bytes` must hold at least `width * height * depth` bits;
    /// padding bits of the last byte are dropped.
    pub(crate) fn from_packed(width: usize, height: usize, depth: usize, bytes: Vec<u8>) -> Self {
        let mut bits = BitVec::<u8, Msb0>::from_vec(bytes);
        bits.truncate(width * height * depth);
        Self {
            width,
            height,
            depth,
            bits,
        }
    }

    /// Number of bytes needed to pack `cells` bits.
    #[inline]
    pub fn packed_len(cells: usize) -> usize {
        cells.div_ceil(8)
    }

    /// Packed bytes with zeroed padding bits.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut bits = self.bits.clone();
        bits.resize(Self::packed_len(self.cell_count()) * 8, false);
        bits.into_vec()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Get grid dimensions.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    /// Total number of cells (occupied or not).
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.bits.len()
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.bits.count_ones()
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.width * self.height + y * self.width + x
    }

    /// Occupancy at signed coordinates; anything out of bounds is empty.
    #[inline]
    pub fn is_occupied(&self, x: i64, y: i64, z: i64) -> bool {
        if x < 0 || y < 0 || z < 0 {
            return false;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        if x >= self.width || y >= self.height || z >= self.depth {
            return false;
        }
        self.bits[self.index(x, y, z)]
    }

    /// Set one cell. Panics if the coordinate is out of bounds.
    pub fn set(&mut self, x: usize, y: usize, z: usize, occupied: bool) {
        assert!(
            x < self.width && y < self.height && z < self.depth,
            "cell ({x}, {y}, {z}) outside {}x{}x{} grid",
            self.width,
            self.height,
            self.depth
        );
        let i = self.index(x, y, z);
        self.bits.set(i, occupied);
    }

    /// Iterate occupied cells in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let plane = self.width * self.height;
        self.bits.iter_ones().map(move |i| {
            let z = i / plane;
            let rem = i % plane;
            (rem % self.width, rem / self.width, z)
        })
    }
}

/// Volume straight out of the codec, before its block size is known.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVolume {
    pub entity_id: String,
    pub grid: OccupancyGrid,
}

impl DecodedVolume {
    /// Attach the block size of the owning entity.
    pub fn resolve(self, size_class: GridSizeClass) -> Volume {
        Volume {
            entity_id: self.entity_id,
            grid: self.grid,
            size_class,
        }
    }
}

/// Occupancy grid attached to one entity, with a known block size.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub entity_id: String,
    pub grid: OccupancyGrid,
    pub size_class: GridSizeClass,
}

impl Volume {
    /// Edge length of one voxel in world units.
    #[inline]
    pub fn grid_size(&self) -> f32 {
        self.size_class.block_size()
    }
}
