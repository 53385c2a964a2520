use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Orthographic window used when rasterizing contributors into a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionInfo {
    /// Height of the top-down camera plane.
    pub start: f32,
    /// Distance covered below `start`.
    pub depth: f32,
    /// Surfaces closer than this to either clip plane are discarded.
    pub ignore: f32,
}

impl Default for ProjectionInfo {
    fn default() -> Self {
        Self {
            start: 500.0,
            depth: 1000.0,
            ignore: 0.05,
        }
    }
}

/// Asset constants of a terrain grid.
///
/// Every component of the crate is constructed from one shared `TerrainInfo`.
/// The defaults match the shipped terrain asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainInfo {
    /// World side length of one chunk.
    pub area: f32,
    /// Cells per chunk side. A chunk holds `(mesh_size + 1)^2` vertices.
    pub mesh_size: u32,
    /// Chebyshev radius, in chunks, of the visible box around the camera.
    pub render_range: i32,
    /// Distances separating LOD 0 from 1 and LOD 1 from 2.
    pub lod_distances: [f32; 2],
    /// Vertical extent of a chunk's culling bounds, centred on zero. Chunks
    /// sculpted beyond it grow their bounds to fit.
    pub bounds_height: f32,
    /// Operations uploaded per sculpt dispatch.
    pub modify_batch: usize,
    /// Regions projected per tick.
    pub project_batch: usize,
    /// Segment length for rays cast without an explicit range, and the cap on
    /// explicit ones.
    pub max_ray_range: f32,
    /// Frames between a readback request and its completion.
    pub readback_latency: u32,
    /// Frames a new chunk waits before provisioning its buffers.
    pub setup_delay: u32,
    pub projection: ProjectionInfo,
}

impl Default for TerrainInfo {
    fn default() -> Self {
        Self {
            area: 50.0,
            mesh_size: 126,
            render_range: 3,
            lod_distances: [100.0, 200.0],
            bounds_height: 200.0,
            modify_batch: 50,
            project_batch: 50,
            max_ray_range: 2000.0,
            readback_latency: 1,
            setup_delay: 1,
            projection: ProjectionInfo::default(),
        }
    }
}

impl TerrainInfo {
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let info: TerrainInfo = serde_json::from_str(&text)?;
        info.validate()?;
        Ok(info)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mesh_size == 0 {
            return Err(Error::InvalidConfig("mesh_size must be at least 1".into()));
        }
        if !(self.area > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "area must be positive, got {}",
                self.area
            )));
        }
        if self.modify_batch == 0 || self.project_batch == 0 {
            return Err(Error::InvalidConfig("batch sizes must be non-zero".into()));
        }
        if self.render_range < 0 {
            return Err(Error::InvalidConfig("render_range must not be negative".into()));
        }
        if self.lod_distances[0] > self.lod_distances[1] {
            return Err(Error::InvalidConfig(
                "lod_distances must be ascending".into(),
            ));
        }
        if !(self.max_ray_range > 0.0) {
            return Err(Error::InvalidConfig("max_ray_range must be positive".into()));
        }
        Ok(())
    }

    /// Vertices per chunk side.
    pub fn chunk_width(&self) -> usize {
        self.mesh_size as usize + 1
    }

    /// Vertices per region side. Seam vertices are shared between chunks.
    pub fn region_width(&self) -> usize {
        2 * self.mesh_size as usize + 1
    }

    /// World distance between neighbouring vertices.
    pub fn cell_size(&self) -> f32 {
        self.area / self.mesh_size as f32
    }

    pub fn vertex_count(&self) -> usize {
        self.chunk_width() * self.chunk_width()
    }

    /// LOD band for a horizontal distance between camera and chunk centre.
    pub fn lod_for_distance(&self, distance: f32) -> u8 {
        if distance < self.lod_distances[0] {
            0
        } else if distance < self.lod_distances[1] {
            1
        } else {
            2
        }
    }
}
