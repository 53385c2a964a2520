//! Ray casts against the sculpted surface.
//!
//! Requests are queued, dispatched once per tick region by region, and resolved
//! when every readback of the request has completed. Each request gets exactly
//! one callback.

pub mod kernel;

pub use kernel::{RayRequest, RayResult};

use std::collections::{BTreeSet, VecDeque};

use glam::Vec3;
use tracing::{debug, warn};

use crate::chunk::TerrainChunk;
use crate::config::TerrainInfo;
use crate::gpu::{BufferPool, Device, PooledBuffer, Readback};
use crate::grid::{GridCoord, GridRect, Region};
use crate::store::ChunkStore;
use kernel::RegionParams;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Segment length, capped at the configured maximum. Falls back to the
    /// maximum when unset or not finite.
    pub range: Option<f32>,
    /// Test the sculpted surface and ignore contributor bounds.
    pub use_base_only: bool,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            range: None,
            use_base_only: false,
        }
    }

    pub fn with_range(mut self, range: f32) -> Self {
        self.range = Some(range);
        self
    }

    pub fn base_only(mut self) -> Self {
        self.use_base_only = true;
        self
    }

    fn to_request(self, max_range: f32) -> RayRequest {
        RayRequest {
            origin: self.origin.to_array(),
            direction: self.direction.normalize_or_zero().to_array(),
            range: self
                .range
                .filter(|range| range.is_finite())
                .unwrap_or(max_range)
                .clamp(0.0, max_range),
            use_base_only: self.use_base_only as u32,
        }
    }
}

pub type HitCallback = Box<dyn FnOnce(Option<Vec3>)>;
pub type BatchCallback = Box<dyn FnOnce(Vec<Option<Vec3>>)>;

enum Sink {
    Single(HitCallback),
    Batch(BatchCallback),
}

/// Correlation id of a queued cast. Ids are reused after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u32);

struct QueuedCast {
    id: RequestId,
    requests: Vec<RayRequest>,
    sink: Sink,
}

struct PendingReadback {
    region: Region,
    readback: Readback<Vec<RayResult>>,
    _requests: PooledBuffer<RayRequest>,
    _results: PooledBuffer<RayResult>,
}

struct ResultGroup {
    id: RequestId,
    ray_count: usize,
    sink: Sink,
    entries: Vec<PendingReadback>,
}

pub struct IntersectContext<'a> {
    pub store: &'a ChunkStore,
    pub device: &'a mut Device,
}

pub struct Intersector {
    info: TerrainInfo,
    queue: VecDeque<QueuedCast>,
    groups: Vec<ResultGroup>,
    free_ids: Vec<u32>,
    next_id: u32,
    request_buffers: BufferPool<RayRequest>,
    result_buffers: BufferPool<RayResult>,
}

impl Intersector {
    pub fn new(info: &TerrainInfo) -> Self {
        Self {
            info: info.clone(),
            queue: VecDeque::new(),
            groups: Vec::new(),
            free_ids: Vec::new(),
            next_id: 0,
            request_buffers: BufferPool::new("ray request"),
            result_buffers: BufferPool::new("ray result"),
        }
    }

    fn allocate_id(&mut self) -> RequestId {
        match self.free_ids.pop() {
            Some(id) => RequestId(id),
            None => {
                self.next_id += 1;
                RequestId(self.next_id - 1)
            }
        }
    }

    pub fn queue_intersect(&mut self, ray: Ray, callback: HitCallback) -> RequestId {
        let id = self.allocate_id();
        self.queue.push_back(QueuedCast {
            id,
            requests: vec![ray.to_request(self.info.max_ray_range)],
            sink: Sink::Single(callback),
        });
        id
    }

    /// Casts every ray in one dispatch per region. The callback receives one
    /// entry per ray, in input order.
    pub fn queue_batch(&mut self, rays: Vec<Ray>, callback: BatchCallback) -> RequestId {
        let id = self.allocate_id();
        let max_range = self.info.max_ray_range;
        self.queue.push_back(QueuedCast {
            id,
            requests: rays.into_iter().map(|ray| ray.to_request(max_range)).collect(),
            sink: Sink::Batch(callback),
        });
        id
    }

    /// Casts queued or waiting on readbacks.
    pub fn pending(&self) -> usize {
        self.queue.len() + self.groups.len()
    }

    pub fn in_flight(&self) -> usize {
        self.groups.len()
    }

    pub fn request_buffers(&self) -> &BufferPool<RayRequest> {
        &self.request_buffers
    }

    pub fn result_buffers(&self) -> &BufferPool<RayResult> {
        &self.result_buffers
    }

    /// Resolves finished groups, then dispatches everything queued.
    pub fn tick(&mut self, ctx: &mut IntersectContext<'_>) {
        self.evaluate(ctx.device.frame());
        while let Some(cast) = self.queue.pop_front() {
            self.dispatch(cast, ctx);
        }
    }

    fn dispatch(&mut self, cast: QueuedCast, ctx: &mut IntersectContext<'_>) {
        let area = self.info.area;
        let params = |region: Region| RegionParams {
            anchor: region.anchor(area),
            cell: self.info.cell_size(),
            mesh_size: self.info.mesh_size as usize,
        };

        let store = ctx.store;
        // Only regions holding a chunk are dispatched, so the work is bounded
        // by the store rather than by the segment length.
        let regions: BTreeSet<Region> = match segment_span(&cast.requests, area) {
            Some(span) => store
                .iter()
                .map(TerrainChunk::coord)
                .filter(|coord| span.contains(*coord))
                .map(|coord| span.region_of(coord))
                .collect(),
            None => BTreeSet::new(),
        };

        let mut entries = Vec::with_capacity(regions.len());
        for region in regions {
            let chunks = region.chunks().map(|coord| store.chunk(coord));
            let entry = self.dispatch_region(
                region,
                &cast.requests,
                &chunks,
                &params(region),
                ctx.device,
            );
            entries.push(entry);
        }

        debug!(
            "Ray cast {:?} dispatched over {} regions",
            cast.id,
            entries.len()
        );
        self.groups.push(ResultGroup {
            id: cast.id,
            ray_count: cast.requests.len(),
            sink: cast.sink,
            entries,
        });
    }

    fn dispatch_region(
        &self,
        region: Region,
        rays: &[RayRequest],
        chunks: &[Option<&TerrainChunk>; 4],
        params: &RegionParams,
        device: &mut Device,
    ) -> PendingReadback {
        let mut requests = self.request_buffers.acquire(rays.len());
        requests.copy_from_slice(rays);
        let mut results = self.result_buffers.acquire(rays.len());

        device.bind("intersect");
        device.dispatch("intersect", || {
            kernel::trace_all(&requests, &mut results, chunks, params)
        });
        let readback = device.request_readback(results.to_vec());
        PendingReadback {
            region,
            readback,
            _requests: requests,
            _results: results,
        }
    }

    fn evaluate(&mut self, frame: u64) {
        let mut index = 0;
        while index < self.groups.len() {
            let complete = self.groups[index]
                .entries
                .iter()
                .all(|entry| entry.readback.is_complete(frame));
            if complete {
                let group = self.groups.remove(index);
                self.resolve(group, frame);
            } else {
                index += 1;
            }
        }
    }

    fn resolve(&mut self, group: ResultGroup, frame: u64) {
        let ResultGroup {
            id,
            ray_count,
            sink,
            entries,
        } = group;

        let mut nearest: Vec<Option<RayResult>> = vec![None; ray_count];
        for entry in &entries {
            let Some(results) = entry.readback.data(frame) else {
                warn!(
                    "Ray readback for region {} failed, counting it as a miss",
                    entry.region
                );
                continue;
            };
            for (best, result) in nearest.iter_mut().zip(results) {
                if result.hit != 0 && best.map_or(true, |b| result.distance < b.distance) {
                    *best = Some(*result);
                }
            }
        }
        drop(entries);
        self.free_ids.push(id.0);

        let hits: Vec<Option<Vec3>> = nearest
            .into_iter()
            .map(|best| best.and_then(|r| r.point()))
            .collect();
        match sink {
            Sink::Single(callback) => callback(hits.into_iter().next().flatten()),
            Sink::Batch(callback) => callback(hits),
        }
    }
}

/// Chunks under the XZ footprint of every segment in the batch.
fn segment_span(requests: &[RayRequest], area: f32) -> Option<GridRect> {
    requests
        .iter()
        .filter(|request| request.direction != [0.0; 3])
        .map(|request| {
            let origin = Vec3::from_array(request.origin);
            let end = origin + Vec3::from_array(request.direction) * request.range;
            GridRect::new(
                GridCoord::containing(origin, area),
                GridCoord::containing(end, area),
            )
        })
        .reduce(|a, b| a.union(&b))
}
