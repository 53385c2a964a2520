//! GPU-side terrain editing: brush sculpting and contributor projection.
//!
//! Both kinds of work are queued and drained from [`Modifier::tick`], at most
//! one kind per tick. Each dispatch stages the four chunks of one region.

pub mod brush;
pub mod projection;

pub use brush::{Operation, OperationType};

use std::collections::{HashSet, VecDeque};

use glam::Vec2;
use tracing::debug;

use crate::chunk::region::RegionGrid;
use crate::config::TerrainInfo;
use crate::events::EventQueue;
use crate::gpu::{BufferPool, Device};
use crate::grid::{GridCoord, Region};
use crate::projector::ProjectorRegistry;
use crate::store::{ChunkHandle, ChunkStore};
use projection::ProjectionRasters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Modify,
    Project,
}

impl Pass {
    fn other(self) -> Self {
        match self {
            Pass::Modify => Pass::Project,
            Pass::Project => Pass::Modify,
        }
    }
}

/// Borrows the modifier needs from its owner for one tick.
pub struct ModifierContext<'a> {
    pub store: &'a mut ChunkStore,
    pub projectors: &'a ProjectorRegistry,
    pub device: &'a mut Device,
    pub events: &'a mut EventQueue,
}

/// Remembers which region a kernel was last bound to.
struct BindingCache {
    kernel: &'static str,
    bound: Option<(Region, [ChunkHandle; 4])>,
}

impl BindingCache {
    fn new(kernel: &'static str) -> Self {
        Self {
            kernel,
            bound: None,
        }
    }

    /// Creates and readies the region's chunks, rebinding only when the region
    /// or one of its handles changed.
    fn bind(&mut self, region: Region, ctx: &mut ModifierContext<'_>) -> [ChunkHandle; 4] {
        let handles = region
            .chunks()
            .map(|coord| ctx.store.ensure_ready(coord, ctx.events));
        if self.bound != Some((region, handles)) {
            ctx.device.bind(self.kernel);
            self.bound = Some((region, handles));
        }
        handles
    }
}

fn stage(store: &ChunkStore, handles: [ChunkHandle; 4]) -> Option<RegionGrid> {
    let [a, b, c, d] = handles.map(|handle| store.get(handle));
    Some(RegionGrid::gather([a?, b?, c?, d?]))
}

fn unstage(grid: &RegionGrid, handles: [ChunkHandle; 4], ctx: &mut ModifierContext<'_>) {
    for (quadrant, handle) in handles.into_iter().enumerate() {
        if let Some(chunk) = ctx.store.get_mut(handle) {
            grid.scatter(quadrant, chunk);
            chunk.mark_changed(ctx.events);
        }
    }
}

pub struct Modifier {
    info: TerrainInfo,
    operations: VecDeque<(Region, Operation)>,
    projections: VecDeque<Region>,
    queued_projections: HashSet<Region>,
    operation_buffer: BufferPool<Operation>,
    modify_binding: BindingCache,
    project_binding: BindingCache,
    rasters: ProjectionRasters,
    next: Pass,
}

impl Modifier {
    pub fn new(info: &TerrainInfo) -> Self {
        Self {
            info: info.clone(),
            operations: VecDeque::new(),
            projections: VecDeque::new(),
            queued_projections: HashSet::new(),
            operation_buffer: BufferPool::new("operation"),
            modify_binding: BindingCache::new("modify"),
            project_binding: BindingCache::new("project"),
            rasters: ProjectionRasters::new(info.region_width()),
            next: Pass::Modify,
        }
    }

    /// Queues a brush stroke. `position` and `radius` are in chunk units
    /// relative to the region's bottom-left corner.
    pub fn queue_modify(
        &mut self,
        region: Region,
        position: Vec2,
        radius: f32,
        parameter: f32,
        kind: OperationType,
    ) {
        self.operations
            .push_back((region, Operation::new(position, radius, parameter, kind)));
    }

    /// Queues a region for projection. Returns false if it was already queued.
    pub fn queue_project(&mut self, region: Region) -> bool {
        if !self.queued_projections.insert(region) {
            return false;
        }
        self.projections.push_back(region);
        true
    }

    pub fn pending_modifications(&self) -> usize {
        self.operations.len()
    }

    pub fn pending_projections(&self) -> usize {
        self.projections.len()
    }

    pub fn is_idle(&self) -> bool {
        self.operations.is_empty() && self.projections.is_empty()
    }

    /// True if queued work targets a region containing `coord`.
    pub fn touches(&self, coord: GridCoord) -> bool {
        self.operations.iter().any(|(region, _)| region.contains(coord))
            || self.projections.iter().any(|region| region.contains(coord))
    }

    pub fn operation_buffers(&self) -> &BufferPool<Operation> {
        &self.operation_buffer
    }

    /// Runs one pass, alternating between sculpting and projection. Falls back
    /// to the other queue when the scheduled one is empty.
    pub fn tick(&mut self, ctx: &mut ModifierContext<'_>) -> Option<Pass> {
        let pass = match self.next {
            Pass::Modify if !self.operations.is_empty() => Pass::Modify,
            Pass::Project if !self.projections.is_empty() => Pass::Project,
            _ if !self.operations.is_empty() => Pass::Modify,
            _ if !self.projections.is_empty() => Pass::Project,
            _ => return None,
        };

        match pass {
            Pass::Modify => self.execute_modify(ctx),
            Pass::Project => self.execute_project(ctx),
        }
        self.next = pass.other();
        Some(pass)
    }

    /// Drains both queues.
    pub fn flush(&mut self, ctx: &mut ModifierContext<'_>) {
        while self.tick(ctx).is_some() {}
    }

    fn execute_modify(&mut self, ctx: &mut ModifierContext<'_>) {
        let Some(&(region, _)) = self.operations.front() else {
            return;
        };
        let run = self
            .operations
            .iter()
            .take_while(|(queued, _)| *queued == region)
            .count();
        let count = run.min(self.info.modify_batch);
        if run > count {
            debug!(
                "Region {} has {} queued operations, deferring {} to later ticks",
                region,
                run,
                run - count
            );
        }

        let mut buffer = self.operation_buffer.acquire(count);
        for (slot, (_, operation)) in buffer.iter_mut().zip(self.operations.drain(..count)) {
            *slot = operation;
        }

        let handles = self.modify_binding.bind(region, ctx);
        let Some(mut grid) = stage(ctx.store, handles) else {
            return;
        };
        let cell = self.info.cell_size();
        ctx.device.dispatch("modify", || {
            brush::apply(&mut grid, &buffer);
            grid.resolve(cell);
        });
        unstage(&grid, handles, ctx);
        debug!("Applied {} operations to region {}", count, region);
    }

    fn execute_project(&mut self, ctx: &mut ModifierContext<'_>) {
        let count = self.projections.len().min(self.info.project_batch);
        for _ in 0..count {
            let Some(region) = self.projections.pop_front() else {
                break;
            };
            self.queued_projections.remove(&region);
            self.project_region(region, ctx);
        }
    }

    fn project_region(&mut self, region: Region, ctx: &mut ModifierContext<'_>) {
        let handles = self.project_binding.bind(region, ctx);
        let Some(mut grid) = stage(ctx.store, handles) else {
            return;
        };

        let projectors = ctx.projectors;
        let contributors = projectors.for_region(region);
        let anchor = region.anchor(self.info.area);
        let cell = self.info.cell_size();
        let window = self.info.projection;
        let rasters = &mut self.rasters;
        ctx.device.dispatch("project", || {
            rasters.clear();
            for projector in &contributors {
                rasters.rasterize(projector, anchor, cell, &window);
            }
            rasters.apply(&mut grid);
            grid.resolve(cell);
        });
        debug!(
            "Projected {} contributors onto region {}",
            contributors.len(),
            region
        );
        unstage(&grid, handles, ctx);
    }
}
