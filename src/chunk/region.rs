//! Staging copy of the four chunks of a region.
//!
//! Kernels read and write one `(2 * mesh_size + 1)^2` grid. Vertices on the
//! shared seams exist once in the grid and are written back to every chunk
//! that holds a copy, so neighbouring chunks always agree on their edges.

use super::surface;
use super::vertex::Vertex;
use super::TerrainChunk;

pub struct RegionGrid {
    mesh_size: usize,
    width: usize,
    pub vertices: Vec<Vertex>,
    pub ground: Vec<f32>,
}

impl RegionGrid {
    /// Copies the chunks given in region quadrant order.
    pub fn gather(chunks: [&TerrainChunk; 4]) -> Self {
        let prototype = chunks[0].prototype();
        let mesh_size = prototype.mesh_size() as usize;
        let chunk_width = mesh_size + 1;
        let width = 2 * mesh_size + 1;

        let mut vertices = Vec::with_capacity(width * width);
        let mut ground = Vec::with_capacity(width * width);
        for z in 0..width {
            let (qz, lz) = split(z, mesh_size);
            for x in 0..width {
                let (qx, lx) = split(x, mesh_size);
                let chunk = chunks[qz * 2 + qx];
                let index = lz * chunk_width + lx;
                vertices.push(chunk.vertices()[index]);
                ground.push(chunk.prototype().ground(index));
            }
        }

        Self {
            mesh_size,
            width,
            vertices,
            ground,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn mesh_size(&self) -> usize {
        self.mesh_size
    }

    /// Re-derives every height from its edit state and rebuilds the normals.
    pub fn resolve(&mut self, cell: f32) {
        for (vertex, ground) in self.vertices.iter_mut().zip(&self.ground) {
            vertex.resolve(*ground);
        }
        let heights: Vec<f32> = self.vertices.iter().map(Vertex::height).collect();
        let mut normals = vec![[0.0; 3]; heights.len()];
        surface::compute_normals(&heights, self.width, cell, &mut normals);
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal;
        }
    }

    /// Writes the quadrant's slice of the grid back into `chunk`. Chunk-local
    /// XZ positions are left untouched.
    pub fn scatter(&self, quadrant: usize, chunk: &mut TerrainChunk) {
        let (qx, qz) = (quadrant % 2, quadrant / 2);
        let m = self.mesh_size;
        let chunk_width = m + 1;
        let destination = chunk.vertices_mut();
        for lz in 0..chunk_width {
            for lx in 0..chunk_width {
                let source = &self.vertices[(qz * m + lz) * self.width + qx * m + lx];
                let target = &mut destination[lz * chunk_width + lx];
                target.position[1] = source.position[1];
                target.normal = source.normal;
                target.base = source.base;
                target.modify = source.modify;
            }
        }
    }
}

/// Quadrant and chunk-local index of region index `i`. The middle seam maps
/// to the upper quadrant's first row.
fn split(i: usize, mesh_size: usize) -> (usize, usize) {
    let q = (i / mesh_size).min(1);
    (q, i - q * mesh_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_maps_seams() {
        assert_eq!(split(0, 4), (0, 0));
        assert_eq!(split(3, 4), (0, 3));
        assert_eq!(split(4, 4), (1, 0));
        assert_eq!(split(8, 4), (1, 4));
    }
}
