use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use tracing::debug;

use crate::grid::{Bounds, GridCoord, GridRect, Region};

/// How a contributor constrains the surface beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectorMode {
    /// Pins the surface to the contributor's highest point.
    Mandate,
    /// Keeps the surface at or above the contributor.
    Minimum,
    /// Keeps the surface at or below the contributor.
    Maximum,
}

/// Triangle mesh of a contributor in its local space.
#[derive(Debug, Clone, Default)]
pub struct ProjectorMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl ProjectorMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    /// Horizontal quad of the given half extent centred on the origin.
    pub fn quad(half_extent: f32) -> Self {
        let h = half_extent;
        Self {
            positions: vec![
                Vec3::new(-h, 0.0, -h),
                Vec3::new(h, 0.0, -h),
                Vec3::new(h, 0.0, h),
                Vec3::new(-h, 0.0, h),
            ],
            indices: vec![0, 2, 1, 0, 3, 2],
        }
    }

    pub fn local_bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.positions.iter().copied())
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(move |tri| {
            Some([
                *self.positions.get(tri[0] as usize)?,
                *self.positions.get(tri[1] as usize)?,
                *self.positions.get(tri[2] as usize)?,
            ])
        })
    }
}

#[derive(Debug, Clone)]
pub struct Projector {
    pub mesh: Arc<ProjectorMesh>,
    pub transform: Mat4,
    pub mode: ProjectorMode,
}

impl Projector {
    pub fn new(mesh: Arc<ProjectorMesh>, transform: Mat4, mode: ProjectorMode) -> Self {
        Self {
            mesh,
            transform,
            mode,
        }
    }

    pub fn world_bounds(&self) -> Option<Bounds> {
        self.mesh
            .local_bounds()
            .map(|bounds| bounds.transformed(&self.transform))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectorId(u32);

impl fmt::Display for ProjectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projector#{}", self.0)
    }
}

struct Entry {
    projector: Projector,
    coverage: GridRect,
}

/// Relation between contributors and the chunks their bounds overlap.
///
/// The registry never owns chunks. Every mutation returns the chunk rectangle
/// whose projection is now stale.
pub struct ProjectorRegistry {
    area: f32,
    padding: f32,
    next_id: u32,
    entries: HashMap<ProjectorId, Entry>,
    by_chunk: HashMap<GridCoord, BTreeSet<ProjectorId>>,
}

impl ProjectorRegistry {
    /// `padding` widens every footprint so contributors touching a chunk edge
    /// register on both sides of it.
    pub fn new(area: f32, padding: f32) -> Self {
        Self {
            area,
            padding,
            next_id: 0,
            entries: HashMap::new(),
            by_chunk: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ProjectorId) -> Option<&Projector> {
        self.entries.get(&id).map(|entry| &entry.projector)
    }

    pub fn coverage(&self, id: ProjectorId) -> Option<GridRect> {
        self.entries.get(&id).map(|entry| entry.coverage)
    }

    fn link(&mut self, id: ProjectorId, rect: GridRect) {
        for coord in rect.iter() {
            self.by_chunk.entry(coord).or_default().insert(id);
        }
    }

    fn unlink(&mut self, id: ProjectorId, rect: GridRect) {
        for coord in rect.iter() {
            if let Some(ids) = self.by_chunk.get_mut(&coord) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_chunk.remove(&coord);
                }
            }
        }
    }

    /// Registers a contributor whose world bounds are `bounds`. Returns its id
    /// and the chunks it covers.
    pub fn add(&mut self, bounds: &Bounds, projector: Projector) -> (ProjectorId, GridRect) {
        let id = ProjectorId(self.next_id);
        self.next_id += 1;
        let coverage = GridRect::covering(bounds, self.area, self.padding);
        debug!("Registering {} over {:?}", id, coverage);
        self.link(id, coverage);
        self.entries.insert(id, Entry { projector, coverage });
        (id, coverage)
    }

    /// Replaces a contributor. Returns the union of its old and new coverage.
    pub fn update(
        &mut self,
        id: ProjectorId,
        bounds: &Bounds,
        projector: Projector,
    ) -> Option<GridRect> {
        let old = self.entries.get(&id)?.coverage;
        let new = GridRect::covering(bounds, self.area, self.padding);
        self.unlink(id, old);
        self.link(id, new);
        self.entries.insert(id, Entry {
            projector,
            coverage: new,
        });
        Some(old.union(&new))
    }

    /// Removes a contributor. Returns the coverage it used to have.
    pub fn remove(&mut self, id: ProjectorId) -> Option<GridRect> {
        let entry = self.entries.remove(&id)?;
        self.unlink(id, entry.coverage);
        debug!("Removed {}", id);
        Some(entry.coverage)
    }

    pub fn on_chunk(&self, coord: GridCoord) -> impl Iterator<Item = ProjectorId> + '_ {
        self.by_chunk.get(&coord).into_iter().flatten().copied()
    }

    pub fn has_contributors(&self, coord: GridCoord) -> bool {
        self.by_chunk.contains_key(&coord)
    }

    /// Contributors touching any chunk of the region, each once, in id order.
    pub fn for_region(&self, region: Region) -> Vec<&Projector> {
        let ids: BTreeSet<ProjectorId> = region
            .chunks()
            .iter()
            .flat_map(|coord| self.on_chunk(*coord))
            .collect();
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }
}
