mod common;

use common::*;
use glam::{Mat4, Vec3};
use meshi_terrain::{
    ChunkEventKind, Frustum, GridCoord, ProjectorMode, TerrainCoordinator, TerrainInfo, Visibility,
};

fn terrain(render_range: i32) -> TerrainCoordinator {
    TerrainCoordinator::new(TerrainInfo {
        render_range,
        lod_distances: [40.0, 90.0],
        ..small_info()
    })
    .unwrap()
}

#[test]
fn camera_box_becomes_visible_with_lod_bands() {
    let mut terrain = terrain(1);
    let events = record_events(&mut terrain);
    terrain.update_visual(Vec3::new(25.0, 10.0, 25.0), &Frustum::unbounded());

    assert_eq!(terrain.store().len(), 9);
    let center = terrain.chunk(GridCoord::new(0, 0)).unwrap();
    assert_eq!(center.visibility(), Visibility::Visible { lod: 0 });
    let side = terrain.chunk(GridCoord::new(1, 0)).unwrap();
    assert_eq!(side.visibility(), Visibility::Visible { lod: 1 });
    let corner = terrain.chunk(GridCoord::new(1, 1)).unwrap();
    assert_eq!(corner.visibility(), Visibility::Visible { lod: 1 });

    let visible = events
        .borrow()
        .iter()
        .filter(|e| matches!(e.kind, ChunkEventKind::Visible { .. }))
        .count();
    assert_eq!(visible, 9);
}

#[test]
fn moving_the_camera_diffs_the_visible_set() {
    let mut terrain = terrain(1);
    terrain.update_visual(Vec3::new(25.0, 10.0, 25.0), &Frustum::unbounded());
    let events = record_events(&mut terrain);
    terrain.update_visual(Vec3::new(75.0, 10.0, 25.0), &Frustum::unbounded());

    let events = events.borrow();
    for z in -1..=1 {
        let dropped = GridCoord::new(-1, z);
        assert_eq!(count_kind(&events, dropped, ChunkEventKind::Hidden), 1);
        let entered = GridCoord::new(2, z);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.coord == entered && matches!(e.kind, ChunkEventKind::Visible { .. }))
                .count(),
            1
        );
    }
    assert_eq!(
        count_kind(&events, GridCoord::new(1, 0), ChunkEventKind::LodChanged { lod: 0 }),
        1
    );
    assert_eq!(
        count_kind(&events, GridCoord::new(0, 0), ChunkEventKind::LodChanged { lod: 1 }),
        1
    );
    // Unchanged chunks stay silent.
    assert!(events.iter().all(|e| e.coord != GridCoord::new(1, 1) || e.kind == ChunkEventKind::Ready));
}

#[test]
fn frustum_culls_chunks_behind_the_camera() {
    let mut terrain = terrain(2);
    let camera = Vec3::new(25.0, 20.0, 25.0);
    let view = Mat4::look_at_rh(camera, camera + Vec3::new(1.0, -0.2, 0.0), Vec3::Y);
    let projection = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 500.0);
    let frustum = Frustum::from_view_projection(projection * view);
    terrain.update_visual(camera, &frustum);

    let ahead = terrain.chunk(GridCoord::new(2, 0)).unwrap();
    assert!(matches!(ahead.visibility(), Visibility::Visible { .. }));
    assert!(terrain.chunk(GridCoord::new(-2, 0)).is_none());
}

#[test]
fn eviction_keeps_edited_visible_and_covered_chunks() {
    let mut terrain = terrain(1);
    terrain.update_visual(Vec3::new(25.0, 10.0, 25.0), &Frustum::unbounded());

    let far = GridCoord::new(10, 10);
    terrain.get_or_create_chunk(far);
    terrain.modify_add(Vec3::new(-275.0, 0.0, 25.0), 10.0, 1.0);
    settle(&mut terrain);
    let (bounds, projector) =
        quad_projector(Vec3::new(525.0, 0.0, -475.0), 5.0, ProjectorMode::Minimum);
    terrain.add_projector(&bounds, projector);
    terrain.modify_add(Vec3::new(-475.0, 0.0, -475.0), 10.0, 1.0);

    let events = record_events(&mut terrain);
    let evicted = terrain.evict_distant(GridCoord::new(0, 0), 3);

    assert!(terrain.chunk(far).is_none());
    assert_eq!(count_kind(&events.borrow(), far, ChunkEventKind::Evicted), 1);
    // Sculpted chunk stays.
    assert!(terrain.chunk(GridCoord::new(-6, 0)).is_some());
    // Chunk under a contributor stays.
    assert!(terrain.chunk(GridCoord::new(10, -10)).is_some());
    // Chunk with queued work stays.
    assert!(terrain.chunk(GridCoord::new(-10, -10)).is_some());
    // Visible chunks stay.
    assert!(terrain.chunk(GridCoord::new(1, 1)).is_some());
    assert!(evicted >= 1);

    settle(&mut terrain);
    assert!(terrain.evict_distant(GridCoord::new(0, 0), 3) > 0);
}

#[test]
fn sculpted_peaks_stay_inside_the_culling_bounds() {
    let mut terrain = terrain(3);
    terrain.modify_add(Vec3::new(25.0, 0.0, 25.0), 20.0, 150.0);
    settle(&mut terrain);

    // A thin orthographic slab that only sees heights between 140 and 160.
    let eye = Vec3::new(25.0, 150.0, -100.0);
    let view = Mat4::look_at_rh(eye, Vec3::new(25.0, 150.0, 25.0), Vec3::Y);
    let projection = Mat4::orthographic_rh(-30.0, 30.0, -10.0, 10.0, 0.1, 500.0);
    terrain.update_visual(eye, &Frustum::from_view_projection(projection * view));

    let peak = terrain.chunk(GridCoord::new(0, 0)).unwrap();
    assert!(peak.world_bounds().max.y >= 150.0);
    assert!(matches!(peak.visibility(), Visibility::Visible { .. }));
    let flat = terrain.chunk(GridCoord::new(1, 0)).unwrap();
    assert_eq!(flat.visibility(), Visibility::Hidden);
}
