//! Sculpts a hill, drops a platform on it, casts a few rays and saves the
//! result to a temporary directory.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use meshi_terrain::{
    FrameLoop, Frustum, Projector, ProjectorMesh, ProjectorMode, Ray, TerrainCoordinator,
    TerrainInfo,
};
use tracing::{info, Level};

fn main() -> meshi_terrain::Result<()> {
    meshi_terrain::init_logging(Level::INFO);

    let mut terrain = TerrainCoordinator::new(TerrainInfo {
        mesh_size: 32,
        ..Default::default()
    })?;
    let mut frame_loop = FrameLoop::new();

    terrain.update_visual(Vec3::new(25.0, 30.0, 25.0), &Frustum::unbounded());
    for step in 0..20 {
        let offset = step as f32 * 0.5;
        terrain.modify_add(Vec3::new(25.0 + offset, 0.0, 25.0), 15.0, 0.4);
    }
    terrain.modify_smooth(Vec3::new(30.0, 0.0, 25.0), 20.0, 1.0);

    let platform = Projector::new(
        Arc::new(ProjectorMesh::quad(4.0)),
        Mat4::from_translation(Vec3::new(60.0, 6.0, 60.0)),
        ProjectorMode::Mandate,
    );
    if let Some(bounds) = platform.world_bounds() {
        terrain.add_projector(&bounds, platform);
    }

    let rays = (0..8)
        .map(|i| Ray::new(Vec3::new(10.0 + i as f32 * 8.0, 50.0, 25.0), Vec3::NEG_Y))
        .collect();
    terrain.cast_batch(rays, |hits| {
        for hit in hits.into_iter().flatten() {
            info!("Surface at {:.2}, {:.2}: {:.3}", hit.x, hit.z, hit.y);
        }
    });

    for _ in 0..10 {
        frame_loop.step(&mut [&mut terrain]);
    }

    let dir = std::env::temp_dir().join("meshi-terrain-demo");
    let report = terrain.save(&dir)?;
    info!(
        "Wrote {} chunks to {} after {} frames",
        report.written,
        dir.display(),
        frame_loop.frames()
    );
    Ok(())
}
