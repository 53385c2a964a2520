use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::chunk::mask;
use crate::chunk::region::RegionGrid;
use crate::config::ProjectionInfo;
use crate::projector::{Projector, ProjectorMode};

const COVERAGE_EPSILON: f32 = 1e-4;

/// Scratch rasters for one region, one pixel per region vertex.
pub struct ProjectionRasters {
    width: usize,
    mandate: Vec<f32>,
    floor: Vec<f32>,
    ceiling: Vec<f32>,
}

impl ProjectionRasters {
    pub fn new(width: usize) -> Self {
        let len = width * width;
        Self {
            width,
            mandate: vec![f32::NEG_INFINITY; len],
            floor: vec![f32::NEG_INFINITY; len],
            ceiling: vec![f32::INFINITY; len],
        }
    }

    pub fn clear(&mut self) {
        self.mandate.par_iter_mut().for_each(|v| *v = f32::NEG_INFINITY);
        self.floor.par_iter_mut().for_each(|v| *v = f32::NEG_INFINITY);
        self.ceiling.par_iter_mut().for_each(|v| *v = f32::INFINITY);
    }

    pub fn mandate(&self) -> &[f32] {
        &self.mandate
    }

    pub fn floor(&self) -> &[f32] {
        &self.floor
    }

    pub fn ceiling(&self) -> &[f32] {
        &self.ceiling
    }

    /// Draws the contributor with an orthographic camera looking down on the
    /// region (up from below for ceilings). `anchor` is the world XZ of pixel
    /// `(0, 0)`.
    pub fn rasterize(
        &mut self,
        projector: &Projector,
        anchor: Vec2,
        cell: f32,
        window: &ProjectionInfo,
    ) {
        let (low, high) = match projector.mode {
            ProjectorMode::Maximum => (
                -window.start + window.ignore,
                -window.start + window.depth - window.ignore,
            ),
            ProjectorMode::Mandate | ProjectorMode::Minimum => (
                window.start - window.depth + window.ignore,
                window.start - window.ignore,
            ),
        };

        for triangle in projector.mesh.triangles() {
            let [a, b, c] = triangle.map(|p| {
                let world = projector.transform.transform_point3(p);
                Vec3::new((world.x - anchor.x) / cell, world.y, (world.z - anchor.y) / cell)
            });
            self.draw_triangle(a, b, c, projector.mode, low, high);
        }
    }

    /// Triangle in pixel space: `x` and `z` are pixel coordinates, `y` is height.
    fn draw_triangle(
        &mut self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        mode: ProjectorMode,
        low: f32,
        high: f32,
    ) {
        let edge = |p: Vec3, q: Vec3, x: f32, z: f32| {
            (q.x - p.x) * (z - p.z) - (q.z - p.z) * (x - p.x)
        };
        let area = edge(a, b, c.x, c.z);
        if area.abs() < 1e-12 {
            return;
        }

        let last = (self.width - 1) as f32;
        let min_x = a.x.min(b.x).min(c.x) - COVERAGE_EPSILON;
        let max_x = a.x.max(b.x).max(c.x) + COVERAGE_EPSILON;
        let min_z = a.z.min(b.z).min(c.z) - COVERAGE_EPSILON;
        let max_z = a.z.max(b.z).max(c.z) + COVERAGE_EPSILON;
        if max_x < 0.0 || max_z < 0.0 || min_x > last || min_z > last {
            return;
        }
        let x0 = min_x.ceil().max(0.0) as usize;
        let x1 = max_x.floor().min(last) as usize;
        let z0 = min_z.ceil().max(0.0) as usize;
        let z1 = max_z.floor().min(last) as usize;

        for z in z0..=z1 {
            for x in x0..=x1 {
                let (px, pz) = (x as f32, z as f32);
                let wa = edge(b, c, px, pz) / area;
                let wb = edge(c, a, px, pz) / area;
                let wc = 1.0 - wa - wb;
                if wa < -COVERAGE_EPSILON || wb < -COVERAGE_EPSILON || wc < -COVERAGE_EPSILON {
                    continue;
                }
                let height = wa * a.y + wb * b.y + wc * c.y;
                if height < low || height > high {
                    continue;
                }

                let index = z * self.width + x;
                match mode {
                    ProjectorMode::Mandate => {
                        self.mandate[index] = self.mandate[index].max(height)
                    }
                    ProjectorMode::Minimum => self.floor[index] = self.floor[index].max(height),
                    ProjectorMode::Maximum => {
                        self.ceiling[index] = self.ceiling[index].min(height)
                    }
                }
            }
        }
    }

    /// Replaces the projection bits of every staged vertex with the rasters.
    /// Sculpt state is left as is.
    pub fn apply(&self, grid: &mut RegionGrid) {
        grid.vertices
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, vertex)| {
                let state = &mut vertex.modify;
                state.mask &= !mask::PROJECTED;
                state.minimum = 0.0;
                state.maximum = 0.0;

                let mandate = self.mandate[index];
                if mandate.is_finite() {
                    state.minimum = mandate;
                    state.maximum = mandate;
                    state.mask |= mask::PROJECTED;
                    return;
                }
                if self.floor[index].is_finite() {
                    state.minimum = self.floor[index];
                    state.mask |= mask::FLOOR;
                }
                if self.ceiling[index].is_finite() {
                    state.maximum = self.ceiling[index];
                    state.mask |= mask::CEILING;
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::ProjectorMesh;
    use glam::Mat4;
    use std::sync::Arc;

    fn quad(y: f32, mode: ProjectorMode) -> Projector {
        Projector::new(
            Arc::new(ProjectorMesh::quad(1.0)),
            Mat4::from_translation(Vec3::new(2.0, y, 2.0)),
            mode,
        )
    }

    #[test]
    fn highest_mandate_wins() {
        let mut rasters = ProjectionRasters::new(5);
        let window = ProjectionInfo::default();
        rasters.rasterize(&quad(1.0, ProjectorMode::Mandate), Vec2::ZERO, 1.0, &window);
        rasters.rasterize(&quad(3.0, ProjectorMode::Mandate), Vec2::ZERO, 1.0, &window);
        assert_eq!(rasters.mandate()[12], 3.0);
        assert_eq!(rasters.mandate()[6], 3.0);
        assert_eq!(rasters.mandate()[0], f32::NEG_INFINITY);
    }

    #[test]
    fn lowest_ceiling_wins() {
        let mut rasters = ProjectionRasters::new(5);
        let window = ProjectionInfo::default();
        rasters.rasterize(&quad(4.0, ProjectorMode::Maximum), Vec2::ZERO, 1.0, &window);
        rasters.rasterize(&quad(-2.0, ProjectorMode::Maximum), Vec2::ZERO, 1.0, &window);
        assert_eq!(rasters.ceiling()[12], -2.0);
    }

    #[test]
    fn surfaces_outside_the_window_are_ignored() {
        let mut rasters = ProjectionRasters::new(5);
        let window = ProjectionInfo::default();
        rasters.rasterize(&quad(499.99, ProjectorMode::Minimum), Vec2::ZERO, 1.0, &window);
        rasters.rasterize(&quad(900.0, ProjectorMode::Minimum), Vec2::ZERO, 1.0, &window);
        assert!(rasters.floor().iter().all(|v| *v == f32::NEG_INFINITY));
    }
}
