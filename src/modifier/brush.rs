use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rayon::prelude::*;

use crate::chunk::mask;
use crate::chunk::region::RegionGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OperationType {
    Add = 0,
    Subtract = 1,
    Level = 2,
    Smooth = 3,
}

impl OperationType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Add),
            1 => Some(Self::Subtract),
            2 => Some(Self::Level),
            3 => Some(Self::Smooth),
            _ => None,
        }
    }
}

/// One queued brush stroke.
///
/// `position` and `radius` are measured in chunks from the region's
/// bottom-left corner, so a region spans `[0, 2]` on both axes.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Operation {
    pub position: [f32; 2],
    pub radius: f32,
    pub parameter: f32,
    pub kind: u32,
}

impl Operation {
    pub fn new(position: Vec2, radius: f32, parameter: f32, kind: OperationType) -> Self {
        Self {
            position: position.to_array(),
            radius,
            parameter,
            kind: kind as u32,
        }
    }

    pub fn kind(&self) -> Option<OperationType> {
        OperationType::from_raw(self.kind)
    }
}

/// Smoothstep falloff, 1 at the centre and 0 at the rim.
pub fn falloff(distance_sq: f32, radius_sq: f32) -> f32 {
    if distance_sq >= radius_sq {
        return 0.0;
    }
    let t = 1.0 - distance_sq / radius_sq;
    t * t * (3.0 - 2.0 * t)
}

/// Applies `operations` in order to the staged region and marks every touched
/// vertex as sculpted. Heights are not resolved here.
pub fn apply(grid: &mut RegionGrid, operations: &[Operation]) {
    let width = grid.width();
    let scale = grid.mesh_size() as f32;
    let mut heights: Vec<f32> = grid.vertices.iter().map(|v| v.base).collect();
    let mut touched = vec![false; heights.len()];

    for op in operations {
        let Some(kind) = op.kind() else {
            continue;
        };
        let center = Vec2::from_array(op.position) * scale;
        let radius = op.radius * scale;
        if !(radius > 0.0) {
            continue;
        }
        let radius_sq = radius * radius;
        let last = (width - 1) as f32;
        let x0 = (center.x - radius).floor().clamp(0.0, last) as usize;
        let x1 = (center.x + radius).ceil().clamp(0.0, last) as usize;
        let z0 = (center.y - radius).floor().clamp(0.0, last) as usize;
        let z1 = (center.y + radius).ceil().clamp(0.0, last) as usize;

        let snapshot = match kind {
            OperationType::Smooth => Some(heights.clone()),
            _ => None,
        };
        let parameter = op.parameter;

        heights
            .par_chunks_mut(width)
            .zip(touched.par_chunks_mut(width))
            .enumerate()
            .skip(z0)
            .take(z1 + 1 - z0)
            .for_each(|(z, (row, row_touched))| {
                for x in x0..=x1 {
                    let d = Vec2::new(x as f32, z as f32) - center;
                    let weight = falloff(d.length_squared(), radius_sq);
                    if weight <= 0.0 {
                        continue;
                    }
                    let h = row[x];
                    row[x] = match kind {
                        OperationType::Add => h + parameter * weight,
                        OperationType::Subtract => h - parameter * weight,
                        OperationType::Level => h + (parameter - h) * weight,
                        OperationType::Smooth => {
                            let avg = snapshot
                                .as_deref()
                                .map(|s| neighbour_average(s, width, x, z))
                                .unwrap_or(h);
                            h + (avg - h) * weight
                        }
                    };
                    row_touched[x] = true;
                }
            });
    }

    for ((vertex, height), touched) in grid.vertices.iter_mut().zip(heights).zip(touched) {
        if touched {
            vertex.modify.mandate = height;
            vertex.modify.mask |= mask::SCULPTED;
        }
    }
}

fn neighbour_average(heights: &[f32], width: usize, x: usize, z: usize) -> f32 {
    let last = width - 1;
    let at = |x: usize, z: usize| heights[z * width + x];
    (at(x.saturating_sub(1), z)
        + at((x + 1).min(last), z)
        + at(x, z.saturating_sub(1))
        + at(x, (z + 1).min(last)))
        * 0.25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falloff_shape() {
        assert_eq!(falloff(0.0, 1.0), 1.0);
        assert_eq!(falloff(1.0, 1.0), 0.0);
        assert_eq!(falloff(2.0, 1.0), 0.0);
        let mid = falloff(0.5, 1.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn operation_is_twenty_bytes() {
        assert_eq!(std::mem::size_of::<Operation>(), 20);
        let op = Operation::new(Vec2::new(1.0, 1.0), 0.2, 3.0, OperationType::Level);
        assert_eq!(op.kind(), Some(OperationType::Level));
    }

    #[test]
    fn average_clamps_at_border() {
        let heights = vec![0.0, 4.0, 0.0, 0.0];
        assert_eq!(neighbour_average(&heights, 2, 0, 0), 1.0);
    }
}
