use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::chunk::TerrainChunk;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RayRequest {
    pub origin: [f32; 3],
    /// Unit direction, or zero for a ray that can never hit.
    pub direction: [f32; 3],
    pub range: f32,
    pub use_base_only: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RayResult {
    pub hit_point: [f32; 3],
    pub distance: f32,
    pub hit: u32,
}

impl RayResult {
    pub fn point(&self) -> Option<Vec3> {
        (self.hit != 0).then(|| Vec3::from_array(self.hit_point))
    }
}

/// Uniforms of one region dispatch.
pub struct RegionParams {
    /// World XZ of the region's bottom-left corner.
    pub anchor: Vec2,
    pub cell: f32,
    pub mesh_size: usize,
}

impl RegionParams {
    /// Region cells `(x0, x1, z0, z1)` under the request's segment, padded by
    /// one cell. `None` when the segment misses the region footprint.
    pub fn cell_span(&self, request: &RayRequest) -> Option<(usize, usize, usize, usize)> {
        let origin = Vec3::from_array(request.origin);
        let end = origin + Vec3::from_array(request.direction) * request.range;
        let (min, max) = (origin.min(end), origin.max(end));
        let lo = (Vec2::new(min.x, min.z) - self.anchor) / self.cell;
        let hi = (Vec2::new(max.x, max.z) - self.anchor) / self.cell;
        let last = (2 * self.mesh_size - 1) as f32;
        if hi.x < -1.0 || hi.y < -1.0 || lo.x > last + 1.0 || lo.y > last + 1.0 {
            return None;
        }
        let clamp = |v: f32| v.clamp(0.0, last) as usize;
        Some((
            clamp(lo.x.floor() - 1.0),
            clamp(hi.x.floor() + 1.0),
            clamp(lo.y.floor() - 1.0),
            clamp(hi.y.floor() + 1.0),
        ))
    }
}

/// Two-sided Möller-Trumbore. Returns the distance along `direction`.
fn intersect_triangle(origin: Vec3, direction: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let p = direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-9 {
        return None;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = direction.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t >= 0.0).then_some(t)
}

/// Nearest hit of one ray against the region's existing chunks.
pub fn trace(
    request: &RayRequest,
    chunks: &[Option<&TerrainChunk>; 4],
    params: &RegionParams,
) -> RayResult {
    let direction = Vec3::from_array(request.direction);
    if direction == Vec3::ZERO {
        return RayResult::default();
    }
    let Some((x0, x1, z0, z1)) = params.cell_span(request) else {
        return RayResult::default();
    };
    let origin = Vec3::from_array(request.origin);
    let m = params.mesh_size;
    let width = m + 1;
    let use_base = request.use_base_only != 0;

    let nearest = (z0..=z1)
        .into_par_iter()
        .filter_map(|cz| {
            let (qz, lz) = (cz / m, cz % m);
            let mut best: Option<f32> = None;
            for cx in x0..=x1 {
                let (qx, lx) = (cx / m, cx % m);
                let Some(chunk) = chunks[qz * 2 + qx] else {
                    continue;
                };
                let vertices = chunk.vertices();
                let corner = |dx: usize, dz: usize| {
                    let v = &vertices[(lz + dz) * width + lx + dx];
                    let h = if use_base { v.base } else { v.height() };
                    Vec3::new(
                        params.anchor.x + (cx + dx) as f32 * params.cell,
                        h,
                        params.anchor.y + (cz + dz) as f32 * params.cell,
                    )
                };
                let (p00, p10) = (corner(0, 0), corner(1, 0));
                let (p01, p11) = (corner(0, 1), corner(1, 1));
                for t in [
                    intersect_triangle(origin, direction, p00, p11, p10),
                    intersect_triangle(origin, direction, p00, p01, p11),
                ]
                .into_iter()
                .flatten()
                {
                    if t <= request.range && best.map_or(true, |b| t < b) {
                        best = Some(t);
                    }
                }
            }
            best
        })
        .reduce_with(f32::min);

    match nearest {
        Some(distance) => RayResult {
            hit_point: (origin + direction * distance).to_array(),
            distance,
            hit: 1,
        },
        None => RayResult::default(),
    }
}

/// Runs [`trace`] for every request, writing results in request order.
pub fn trace_all(
    requests: &[RayRequest],
    results: &mut [RayResult],
    chunks: &[Option<&TerrainChunk>; 4],
    params: &RegionParams,
) {
    for (request, result) in requests.iter().zip(results.iter_mut()) {
        *result = trace(request, chunks, params);
    }
}
