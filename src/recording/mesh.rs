//! Face-culled voxel meshing.
//!
//! Every occupied voxel contributes one quad per face that borders an empty
//! or out-of-bounds cell. Adjacent coplanar faces are not merged.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::volume::Volume;

/// One vertex of the generated surface, laid out for direct GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Indexed triangle list.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of quads (two triangles each).
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Raw vertex buffer bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw index buffer bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Iterate triangles as vertex triples.
    pub fn triangles(&self) -> impl Iterator<Item = [&MeshVertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                &self.vertices[t[0] as usize],
                &self.vertices[t[1] as usize],
                &self.vertices[t[2] as usize],
            ]
        })
    }

    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3) {
        let start = self.vertices.len() as u32;
        let normal = normal.to_array();
        self.vertices.extend(corners.iter().map(|c| MeshVertex {
            position: c.to_array(),
            normal,
        }));
        self.indices.extend_from_slice(&[
            start,
            start + 1,
            start + 2,
            start,
            start + 2,
            start + 3,
        ]);
    }
}

/// Surface mesh plus derived statistics of a volume.
#[derive(Debug, Clone)]
pub struct VoxelMesh {
    pub mesh: TriangleMesh,
    /// Mean voxel anchor divided by the block size. A voxel's anchor is its
    /// corner at minimum X and Y and maximum Z.
    pub center_of_mass: Vec3,
    /// Number of occupied voxels.
    pub block_count: usize,
}

/// Neighbour offset, outward normal and counter-clockwise unit-cube corners of
/// each face. Corners are ordered so `(c1 - c0) x (c2 - c0)` equals the normal.
const FACES: [([i64; 3], Vec3, [Vec3; 4]); 6] = [
    (
        [-1, 0, 0],
        Vec3::NEG_X,
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
    ),
    (
        [1, 0, 0],
        Vec3::X,
        [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
        ],
    ),
    (
        [0, -1, 0],
        Vec3::NEG_Y,
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ],
    ),
    (
        [0, 1, 0],
        Vec3::Y,
        [
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 0.0),
        ],
    ),
    (
        [0, 0, -1],
        Vec3::NEG_Z,
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        ],
    ),
    (
        [0, 0, 1],
        Vec3::Z,
        [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ],
    ),
];

/// Corner of the unit cell that locates a voxel for the centre of mass.
const ANCHOR: Vec3 = Vec3::Z;

/// Builds triangle surfaces from volumes.
pub struct MeshBuilder;

impl MeshBuilder {
    /// World-space position of voxel (0, 0, 0)'s minimum corner. Centres the
    /// grid on its local origin.
    pub fn origin_offset(volume: &Volume) -> Vec3 {
        let (w, h, d) = volume.grid.dimensions();
        Vec3::new(w as f32, h as f32, d as f32) * -0.5 * volume.grid_size()
    }

    /// Mesh every exposed voxel face of `volume`.
    pub fn build(volume: &Volume) -> VoxelMesh {
        let grid = &volume.grid;
        let size = volume.grid_size();
        let offset = Self::origin_offset(volume);

        let mut mesh = TriangleMesh::default();
        let mut total = Vec3::ZERO;
        let mut block_count = 0usize;

        for (x, y, z) in grid.occupied() {
            let base = Vec3::new(x as f32, y as f32, z as f32) * size + offset;
            total += base + ANCHOR * size;
            block_count += 1;

            let (xi, yi, zi) = (x as i64, y as i64, z as i64);
            for (step, normal, corners) in &FACES {
                if grid.is_occupied(xi + step[0], yi + step[1], zi + step[2]) {
                    continue;
                }
                mesh.push_quad(corners.map(|c| base + c * size), *normal);
            }
        }

        let center_of_mass = if block_count > 0 {
            total / (block_count as f32 * size)
        } else {
            Vec3::ZERO
        };

        VoxelMesh {
            mesh,
            center_of_mass,
            block_count,
        }
    }
}
