use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use glam::{Vec2, Vec3};
use tracing::{debug, info, trace};

use crate::chunk::{ModifyState, TerrainChunk, Visibility};
use crate::config::TerrainInfo;
use crate::error::{Error, Result};
use crate::events::{ChunkListener, EventQueue};
use crate::filer;
use crate::gpu::{BufferPool, Device};
use crate::grid::{Bounds, Frustum, GridCoord, GridRect, Region};
use crate::intersector::{IntersectContext, Intersector, Ray, RequestId};
use crate::modifier::{Modifier, ModifierContext, OperationType};
use crate::projector::{Projector, ProjectorId, ProjectorRegistry};
use crate::store::{ChunkHandle, ChunkStore};
use crate::tick::Updatable;

/// Pollable result of [`TerrainCoordinator::cast_ray_query`].
#[derive(Debug, Clone, Default)]
pub struct RayQuery {
    slot: Rc<Cell<Option<Option<Vec3>>>>,
}

impl RayQuery {
    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    /// `None` while pending, then `Some(hit)`.
    pub fn result(&self) -> Option<Option<Vec3>> {
        self.slot.get()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub written: usize,
    pub removed: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub reset: usize,
}

/// Entry point of the terrain system. Owns the chunks, the contributor table
/// and the work queues, and advances them from [`Updatable::tick`].
pub struct TerrainCoordinator {
    info: TerrainInfo,
    device: Device,
    store: ChunkStore,
    projectors: ProjectorRegistry,
    modifier: Modifier,
    intersector: Intersector,
    events: EventQueue,
    visible: HashMap<GridCoord, u8>,
    export_buffers: BufferPool<ModifyState>,
}

impl TerrainCoordinator {
    pub fn new(info: TerrainInfo) -> Result<Self> {
        info.validate()?;
        info!(
            "Initializing terrain: {} units per chunk, {} cells per side",
            info.area, info.mesh_size
        );
        Ok(Self {
            device: Device::new(&info),
            store: ChunkStore::new(&info),
            projectors: ProjectorRegistry::new(info.area, info.cell_size() * 0.5),
            modifier: Modifier::new(&info),
            intersector: Intersector::new(&info),
            events: EventQueue::new(),
            visible: HashMap::new(),
            export_buffers: BufferPool::new("export"),
            info,
        })
    }

    pub fn info(&self) -> &TerrainInfo {
        &self.info
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn projectors(&self) -> &ProjectorRegistry {
        &self.projectors
    }

    pub fn modifier(&self) -> &Modifier {
        &self.modifier
    }

    pub fn intersector(&self) -> &Intersector {
        &self.intersector
    }

    pub fn chunk(&self, coord: GridCoord) -> Option<&TerrainChunk> {
        self.store.chunk(coord)
    }

    pub fn get_or_create_chunk(&mut self, coord: GridCoord) -> ChunkHandle {
        self.store.get_or_create(coord)
    }

    pub fn subscribe(&mut self, listener: ChunkListener) {
        self.events.subscribe(listener);
    }

    pub fn cast_ray(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        range: Option<f32>,
        use_base_only: bool,
        callback: impl FnOnce(Option<Vec3>) + 'static,
    ) -> RequestId {
        let ray = Ray {
            origin,
            direction,
            range,
            use_base_only,
        };
        self.intersector.queue_intersect(ray, Box::new(callback))
    }

    pub fn cast_ray_query(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        range: Option<f32>,
        use_base_only: bool,
    ) -> RayQuery {
        let query = RayQuery::default();
        let slot = query.slot.clone();
        self.cast_ray(origin, direction, range, use_base_only, move |hit| {
            slot.set(Some(hit))
        });
        query
    }

    pub fn cast_batch(
        &mut self,
        rays: Vec<Ray>,
        callback: impl FnOnce(Vec<Option<Vec3>>) + 'static,
    ) -> RequestId {
        self.intersector.queue_batch(rays, Box::new(callback))
    }

    pub fn modify_add(&mut self, position: Vec3, radius: f32, amount: f32) {
        self.modify(position, radius, amount, OperationType::Add);
    }

    pub fn modify_subtract(&mut self, position: Vec3, radius: f32, amount: f32) {
        self.modify(position, radius, amount, OperationType::Subtract);
    }

    /// Pulls the surface towards the absolute height `target`.
    pub fn modify_level(&mut self, position: Vec3, radius: f32, target: f32) {
        self.modify(position, radius, target, OperationType::Level);
    }

    pub fn modify_smooth(&mut self, position: Vec3, radius: f32, strength: f32) {
        self.modify(position, radius, strength, OperationType::Smooth);
    }

    fn modify(&mut self, position: Vec3, radius: f32, parameter: f32, kind: OperationType) {
        let area = self.info.area;
        // A brush must stay inside the region picked for it.
        let max_radius = area * 0.5;
        let radius = if radius > max_radius {
            debug!("Clamping brush radius {} to {}", radius, max_radius);
            max_radius
        } else {
            radius
        };

        let region = Region::around(position, area);
        for coord in region.chunks() {
            self.store.get_or_create(coord);
        }
        let local = (Vec2::new(position.x, position.z) - region.anchor(area)) / area;
        self.modifier
            .queue_modify(region, local, radius / area, parameter, kind);
    }

    /// Re-projects every region overlapping the world box.
    pub fn project(&mut self, min: Vec3, max: Vec3) {
        let area = self.info.area;
        let lo = min.min(max);
        let hi = min.max(max);
        let rect = GridRect::new(
            GridCoord::containing(lo, area),
            GridCoord::new(
                ((hi.x / area).ceil() as i32 - 1).max((lo.x / area).floor() as i32),
                ((hi.z / area).ceil() as i32 - 1).max((lo.z / area).floor() as i32),
            ),
        );
        self.queue_rect(rect);
    }

    fn queue_rect(&mut self, rect: GridRect) {
        for region in rect.regions() {
            for coord in region.chunks() {
                self.store.get_or_create(coord);
            }
            self.modifier.queue_project(region);
        }
    }

    pub fn add_projector(&mut self, bounds: &Bounds, projector: Projector) -> ProjectorId {
        let (id, coverage) = self.projectors.add(bounds, projector);
        self.queue_rect(coverage);
        id
    }

    /// Returns false for an unknown id.
    pub fn update_projector(
        &mut self,
        id: ProjectorId,
        bounds: &Bounds,
        projector: Projector,
    ) -> bool {
        match self.projectors.update(id, bounds, projector) {
            Some(stale) => {
                self.queue_rect(stale);
                true
            }
            None => false,
        }
    }

    pub fn remove_projector(&mut self, id: ProjectorId) -> bool {
        match self.projectors.remove(id) {
            Some(stale) => {
                self.queue_rect(stale);
                true
            }
            None => false,
        }
    }

    /// Recomputes the visible set around the camera and emits the transitions.
    pub fn update_visual(&mut self, camera: Vec3, frustum: &Frustum) {
        let area = self.info.area;
        let range = self.info.render_range;
        let center = GridCoord::containing(camera, area);
        let local = self.store.prototype().local_bounds();

        let mut next = HashMap::new();
        for dz in -range..=range {
            for dx in -range..=range {
                let coord = center.offset(dx, dz);
                let bounds = match self.store.chunk(coord) {
                    Some(chunk) => chunk.world_bounds(),
                    None => {
                        let origin = coord.origin(area);
                        Bounds::new(local.min + origin, local.max + origin)
                    }
                };
                if !frustum.intersects(&bounds) {
                    continue;
                }
                let middle = coord.center(area);
                let distance = Vec2::new(middle.x - camera.x, middle.z - camera.z).length();
                next.insert(coord, self.info.lod_for_distance(distance));
            }
        }

        let mut dropped: Vec<GridCoord> = self
            .visible
            .keys()
            .filter(|coord| !next.contains_key(coord))
            .copied()
            .collect();
        dropped.sort();
        for coord in dropped {
            if let Some(chunk) = self.store.chunk_mut(coord) {
                chunk.set_visibility(Visibility::Hidden, &mut self.events);
            }
        }

        let mut shown: Vec<(GridCoord, u8)> = next.iter().map(|(c, l)| (*c, *l)).collect();
        shown.sort();
        for (coord, lod) in shown {
            let handle = self.store.get_or_create(coord);
            if let Some(chunk) = self.store.get_mut(handle) {
                chunk.set_visibility(Visibility::Visible { lod }, &mut self.events);
            }
        }

        self.visible = next;
        self.events.flush();
    }

    /// Runs queued sculpt and projection work to completion.
    pub fn flush_modifications(&mut self) {
        let mut ctx = ModifierContext {
            store: &mut self.store,
            projectors: &self.projectors,
            device: &mut self.device,
            events: &mut self.events,
        };
        self.modifier.flush(&mut ctx);
    }

    pub fn save<P: AsRef<Path>>(&mut self, root: P) -> Result<SaveReport> {
        let root = root.as_ref();
        self.flush_modifications();
        fs::create_dir_all(filer::terrain_dir(root))?;

        let mut report = SaveReport::default();
        for (coord, path) in filer::list_chunks(root)? {
            if !self.store.contains(coord) {
                fs::remove_file(&path)?;
                report.removed += 1;
            }
        }

        let count = self.info.vertex_count();
        for coord in self.store.coords() {
            let handle = self.store.ensure_ready(coord, &mut self.events);
            let Some(chunk) = self.store.get(handle) else {
                continue;
            };
            let mut export = self.export_buffers.acquire(count);
            self.device.dispatch("export", || chunk.export_into(&mut export));
            let readback = self.device.request_readback(export.to_vec());
            let records = self
                .device
                .wait(readback)
                .ok_or(Error::ReadbackFailed(coord))?;
            filer::write_chunk(&filer::chunk_path(root, coord), &records)?;
            report.written += 1;
        }

        info!(
            "Saved {} terrain chunks to {} ({} stale files removed)",
            report.written,
            root.display(),
            report.removed
        );
        self.events.flush();
        Ok(report)
    }

    /// Replaces the terrain with a save. Every file is decoded before any chunk
    /// changes, so a failed load leaves the terrain untouched.
    pub fn load<P: AsRef<Path>>(&mut self, root: P) -> Result<LoadReport> {
        let root = root.as_ref();
        let count = self.info.vertex_count();
        let decoded = filer::list_chunks(root)?
            .into_iter()
            .map(|(coord, path)| filer::read_chunk(&path, coord, count).map(|r| (coord, r)))
            .collect::<Result<Vec<_>>>()?;

        self.flush_modifications();
        let present: HashSet<GridCoord> = decoded.iter().map(|(coord, _)| *coord).collect();
        let mut report = LoadReport::default();
        let mut covered = Vec::new();
        for coord in self.store.coords() {
            if present.contains(&coord) {
                continue;
            }
            if let Some(chunk) = self.store.chunk_mut(coord) {
                chunk.reset(&mut self.events);
                report.reset += 1;
                if self.projectors.has_contributors(coord) {
                    covered.push(coord);
                }
            }
        }

        for (coord, records) in &decoded {
            let handle = self.store.get_or_create(*coord);
            if let Some(chunk) = self.store.get_mut(handle) {
                chunk.restore(records, &mut self.events);
                report.loaded += 1;
            }
        }

        if let Some(rect) = decoded
            .iter()
            .map(|(coord, _)| GridRect::single(*coord))
            .reduce(|a, b| a.union(&b))
        {
            self.queue_rect(rect);
        }
        // Reset chunks lost their projected heights; contributors still apply.
        for coord in covered {
            self.queue_rect(Region(coord).rect());
        }

        info!(
            "Loaded {} terrain chunks from {} ({} reset)",
            report.loaded,
            root.display(),
            report.reset
        );
        self.events.flush();
        Ok(report)
    }

    /// Restores a chunk to the prototype surface. Contributors covering it are
    /// projected again on a later tick.
    pub fn reset_chunk(&mut self, coord: GridCoord) -> bool {
        let Some(chunk) = self.store.chunk_mut(coord) else {
            return false;
        };
        chunk.reset(&mut self.events);
        if self.projectors.has_contributors(coord) {
            self.queue_rect(Region(coord).rect());
        }
        self.events.flush();
        true
    }

    /// Height under a world XZ position, sampled on the CPU. `None` if no chunk
    /// exists there.
    pub fn sample_height(&self, x: f32, z: f32, use_base_only: bool) -> Option<f32> {
        let area = self.info.area;
        let coord = GridCoord::containing(Vec3::new(x, 0.0, z), area);
        let chunk = self.store.chunk(coord)?;
        let origin = coord.origin(area);
        Some(chunk.height_at(Vec2::new(x - origin.x, z - origin.z), use_base_only))
    }

    /// Evicts chunks farther than `keep_range` from `center` that are hidden,
    /// unedited, uncovered by contributors and not targeted by queued work.
    pub fn evict_distant(&mut self, center: GridCoord, keep_range: i32) -> usize {
        let doomed: Vec<GridCoord> = self
            .store
            .iter()
            .filter(|chunk| {
                let coord = chunk.coord();
                coord.chebyshev(center) > keep_range
                    && chunk.visibility() == Visibility::Hidden
                    && chunk.is_pristine()
                    && !self.projectors.has_contributors(coord)
                    && !self.modifier.touches(coord)
            })
            .map(TerrainChunk::coord)
            .collect();

        let mut evicted = 0;
        for coord in doomed {
            if self.store.evict(coord, &mut self.events) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!("Evicted {} distant terrain chunks", evicted);
        }
        self.events.flush();
        evicted
    }
}

impl Updatable for TerrainCoordinator {
    fn tick(&mut self, dt: f32) {
        self.device.advance_frame();
        trace!("Terrain tick {} ({:.4}s)", self.device.frame(), dt);
        self.store.tick(&mut self.events);

        let mut ctx = ModifierContext {
            store: &mut self.store,
            projectors: &self.projectors,
            device: &mut self.device,
            events: &mut self.events,
        };
        self.modifier.tick(&mut ctx);

        let mut ctx = IntersectContext {
            store: &self.store,
            device: &mut self.device,
        };
        self.intersector.tick(&mut ctx);

        self.events.flush();
    }
}
