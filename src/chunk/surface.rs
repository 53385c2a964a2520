//! Height-grid helpers shared by the kernels and CPU sampling.
//!
//! Every cell is split along the diagonal running from its `(0, 0)` corner to
//! its `(1, 1)` corner, matching the prototype index buffer.

use rayon::prelude::*;

/// Height inside one cell. `fx` and `fz` are the fractional offsets in `[0, 1]`.
pub fn sample_cell(h00: f32, h10: f32, h01: f32, h11: f32, fx: f32, fz: f32) -> f32 {
    if fx >= fz {
        h00 + fx * (h10 - h00) + fz * (h11 - h10)
    } else {
        h00 + fz * (h01 - h00) + fx * (h11 - h01)
    }
}

/// Central-difference normals over a square height grid. Edges fall back to
/// one-sided differences.
pub fn compute_normals(heights: &[f32], width: usize, cell: f32, normals: &mut [[f32; 3]]) {
    debug_assert_eq!(heights.len(), width * width);
    debug_assert_eq!(normals.len(), width * width);
    let last = width - 1;

    normals
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(z, row)| {
            let (z0, z1) = (z.saturating_sub(1), (z + 1).min(last));
            for (x, normal) in row.iter_mut().enumerate() {
                let (x0, x1) = (x.saturating_sub(1), (x + 1).min(last));
                let dx = (heights[z * width + x1] - heights[z * width + x0])
                    / ((x1 - x0).max(1) as f32 * cell);
                let dz = (heights[z1 * width + x] - heights[z0 * width + x])
                    / ((z1 - z0).max(1) as f32 * cell);
                let n = glam::Vec3::new(-dx, 1.0, -dz).normalize();
                *normal = n.to_array();
            }
        });
}
