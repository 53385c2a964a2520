pub mod prototype;
pub mod region;
pub mod surface;
pub mod vertex;

pub use prototype::Prototype;
pub use vertex::{mask, ModifyState, Vertex};

use std::sync::Arc;

use glam::{Vec2, Vec3};
use tracing::debug;

use crate::events::{ChunkEventKind, EventQueue};
use crate::grid::{Bounds, GridCoord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPhase {
    /// Waiting `frames_left` ticks before provisioning buffers.
    Created { frames_left: u32 },
    BuffersAllocated,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible { lod: u8 },
}

/// One square tile of terrain and its vertex buffer.
pub struct TerrainChunk {
    coord: GridCoord,
    phase: ChunkPhase,
    visibility: Visibility,
    prototype: Arc<Prototype>,
    vertices: Vec<Vertex>,
    revision: u64,
    /// Lowest and highest surface height.
    height_range: (f32, f32),
}

impl TerrainChunk {
    pub(crate) fn new(coord: GridCoord, prototype: Arc<Prototype>, setup_delay: u32) -> Self {
        let height_range = height_range(prototype.vertices());
        Self {
            coord,
            phase: ChunkPhase::Created {
                frames_left: setup_delay,
            },
            visibility: Visibility::Hidden,
            prototype,
            vertices: Vec::new(),
            revision: 0,
            height_range,
        }
    }

    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    pub fn phase(&self) -> ChunkPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == ChunkPhase::Ready
    }

    pub fn has_buffers(&self) -> bool {
        !matches!(self.phase, ChunkPhase::Created { .. })
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn lod(&self) -> Option<u8> {
        match self.visibility {
            Visibility::Visible { lod } => Some(lod),
            Visibility::Hidden => None,
        }
    }

    /// Bumped every time the vertex data changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn prototype(&self) -> &Arc<Prototype> {
        &self.prototype
    }

    /// Vertex buffer, or the prototype's while buffers are not allocated yet.
    pub fn vertices(&self) -> &[Vertex] {
        if self.has_buffers() {
            &self.vertices
        } else {
            self.prototype.vertices()
        }
    }

    pub(crate) fn vertices_mut(&mut self) -> &mut [Vertex] {
        &mut self.vertices
    }

    /// Culling box: the prototype bounds, grown to enclose the surface.
    pub fn world_bounds(&self) -> Bounds {
        let local = self.prototype.local_bounds();
        let origin = self.coord.origin(self.prototype.area());
        let (low, high) = self.height_range;
        Bounds::new(
            Vec3::new(local.min.x, local.min.y.min(low), local.min.z) + origin,
            Vec3::new(local.max.x, local.max.y.max(high), local.max.z) + origin,
        )
    }

    /// True while no vertex carries edit state.
    pub fn is_pristine(&self) -> bool {
        self.vertices().iter().all(|v| v.modify.is_clear())
    }

    fn allocate(&mut self) {
        debug!("Allocating buffers for terrain chunk {}", self.coord);
        self.vertices = self.prototype.vertices().to_vec();
        self.phase = ChunkPhase::BuffersAllocated;
    }

    /// Advances the deferred setup by one frame.
    pub(crate) fn advance_setup(&mut self, events: &mut EventQueue) {
        match self.phase {
            ChunkPhase::Created { frames_left } if frames_left > 1 => {
                self.phase = ChunkPhase::Created {
                    frames_left: frames_left - 1,
                };
            }
            ChunkPhase::Created { .. } => self.allocate(),
            ChunkPhase::BuffersAllocated => {
                self.phase = ChunkPhase::Ready;
                events.emit(self.coord, ChunkEventKind::Ready);
            }
            ChunkPhase::Ready => {}
        }
    }

    /// Skips any remaining setup so kernels can bind the buffers now.
    pub(crate) fn ensure_ready(&mut self, events: &mut EventQueue) {
        if !self.has_buffers() {
            self.allocate();
        }
        if self.phase != ChunkPhase::Ready {
            self.phase = ChunkPhase::Ready;
            events.emit(self.coord, ChunkEventKind::Ready);
        }
    }

    pub(crate) fn mark_changed(&mut self, events: &mut EventQueue) {
        self.height_range = height_range(self.vertices());
        self.revision += 1;
        events.emit(self.coord, ChunkEventKind::Changed);
    }

    /// Restores the prototype surface and clears all edit state.
    pub(crate) fn reset(&mut self, events: &mut EventQueue) {
        self.ensure_ready(events);
        self.vertices.copy_from_slice(self.prototype.vertices());
        self.mark_changed(events);
    }

    pub fn export_into(&self, out: &mut [ModifyState]) {
        for (record, vertex) in out.iter_mut().zip(self.vertices()) {
            *record = vertex.modify;
        }
    }

    /// Replaces the edit state of every vertex and rebuilds the surface.
    pub(crate) fn restore(&mut self, records: &[ModifyState], events: &mut EventQueue) {
        self.ensure_ready(events);
        let prototype = self.prototype.clone();
        for (index, (vertex, record)) in self.vertices.iter_mut().zip(records).enumerate() {
            vertex.modify = *record;
            vertex.resolve(prototype.ground(index));
        }

        let width = prototype.width();
        let heights: Vec<f32> = self.vertices.iter().map(Vertex::height).collect();
        let mut normals = vec![[0.0; 3]; heights.len()];
        let cell = prototype.area() / prototype.mesh_size() as f32;
        surface::compute_normals(&heights, width, cell, &mut normals);
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal;
        }
        self.mark_changed(events);
    }

    pub(crate) fn set_visibility(&mut self, visibility: Visibility, events: &mut EventQueue) {
        let kind = match (self.visibility, visibility) {
            (old, new) if old == new => return,
            (_, Visibility::Hidden) => ChunkEventKind::Hidden,
            (Visibility::Hidden, Visibility::Visible { lod }) => ChunkEventKind::Visible { lod },
            (Visibility::Visible { .. }, Visibility::Visible { lod }) => {
                ChunkEventKind::LodChanged { lod }
            }
        };
        self.visibility = visibility;
        events.emit(self.coord, kind);
    }

    /// Surface height at a chunk-local XZ position, clamped to the chunk.
    pub fn height_at(&self, local: Vec2, use_base_only: bool) -> f32 {
        let width = self.prototype.width();
        let mesh = self.prototype.mesh_size() as f32;
        let cell = self.prototype.area() / mesh;
        let gx = (local.x / cell).clamp(0.0, mesh);
        let gz = (local.y / cell).clamp(0.0, mesh);
        let cx = (gx.floor() as usize).min(width - 2);
        let cz = (gz.floor() as usize).min(width - 2);

        let vertices = self.vertices();
        let h = |x: usize, z: usize| {
            let v = &vertices[z * width + x];
            if use_base_only {
                v.base
            } else {
                v.height()
            }
        };
        surface::sample_cell(
            h(cx, cz),
            h(cx + 1, cz),
            h(cx, cz + 1),
            h(cx + 1, cz + 1),
            gx - cx as f32,
            gz - cz as f32,
        )
    }

    /// World position of vertex `index`.
    pub fn world_position(&self, index: usize) -> Vec3 {
        Vec3::from_array(self.vertices()[index].position) + self.coord.origin(self.prototype.area())
    }
}

fn height_range(vertices: &[Vertex]) -> (f32, f32) {
    vertices
        .iter()
        .map(|v| v.position[1])
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| (lo.min(h), hi.max(h)))
}
