use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use glam::Vec3;
use tracing::info;

use super::vertex::Vertex;
use crate::config::TerrainInfo;
use crate::grid::Bounds;

/// Flat grid every chunk starts from. Shared by all chunks built from the same
/// asset constants.
#[derive(Debug)]
pub struct Prototype {
    mesh_size: u32,
    area: f32,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    local_bounds: Bounds,
}

type PrototypeKey = (u32, u32, u32);

static PROTOTYPES: OnceLock<Mutex<HashMap<PrototypeKey, Arc<Prototype>>>> = OnceLock::new();
static GENERATED: AtomicUsize = AtomicUsize::new(0);

impl Prototype {
    /// Returns the cached prototype for `info`, generating it on first use.
    pub fn shared(info: &TerrainInfo) -> Arc<Prototype> {
        let key = (
            info.mesh_size,
            info.area.to_bits(),
            info.bounds_height.to_bits(),
        );
        let cache = PROTOTYPES.get_or_init(|| Mutex::new(HashMap::new()));
        let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .entry(key)
            .or_insert_with(|| Arc::new(Prototype::generate(info)))
            .clone()
    }

    /// Number of prototypes generated by this process.
    pub fn generated_count() -> usize {
        GENERATED.load(Ordering::Relaxed)
    }

    fn generate(info: &TerrainInfo) -> Self {
        let width = info.chunk_width();
        let cell = info.cell_size();
        info!(
            "Generating terrain prototype: {} cells over {} units",
            info.mesh_size, info.area
        );
        GENERATED.fetch_add(1, Ordering::Relaxed);

        let mut vertices = Vec::with_capacity(width * width);
        for z in 0..width {
            for x in 0..width {
                vertices.push(Vertex {
                    position: [x as f32 * cell, 0.0, z as f32 * cell],
                    normal: [0.0, 1.0, 0.0],
                    ..Default::default()
                });
            }
        }

        let w = width as u32;
        let mut indices = Vec::with_capacity(info.mesh_size as usize * info.mesh_size as usize * 6);
        for z in 0..info.mesh_size {
            for x in 0..info.mesh_size {
                let i00 = z * w + x;
                let i10 = i00 + 1;
                let i01 = i00 + w;
                let i11 = i01 + 1;
                indices.extend_from_slice(&[i00, i11, i10, i00, i01, i11]);
            }
        }

        let half = info.bounds_height * 0.5;
        Self {
            mesh_size: info.mesh_size,
            area: info.area,
            vertices,
            indices,
            local_bounds: Bounds::new(
                Vec3::new(0.0, -half, 0.0),
                Vec3::new(info.area, half, info.area),
            ),
        }
    }

    pub fn mesh_size(&self) -> u32 {
        self.mesh_size
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    pub fn width(&self) -> usize {
        self.mesh_size as usize + 1
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Ground height of vertex `index` before any edits.
    pub fn ground(&self, index: usize) -> f32 {
        self.vertices[index].position[1]
    }

    pub fn local_bounds(&self) -> Bounds {
        self.local_bounds
    }
}
