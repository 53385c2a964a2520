mod common;

use common::*;
use glam::Vec3;
use meshi_terrain::chunk::mask;
use meshi_terrain::{ChunkEventKind, GridCoord, ProjectorMode, Region};

#[test]
fn projecting_without_contributors_changes_nothing_but_notifies() {
    let mut terrain = coordinator();
    let events = record_events(&mut terrain);
    terrain.project(Vec3::ZERO, Vec3::new(100.0, 0.0, 100.0));
    settle(&mut terrain);

    for coord in Region::new(0, 0).chunks() {
        assert!(heights(&terrain, coord).iter().all(|h| *h == 0.0));
        assert_eq!(count_kind(&events.borrow(), coord, ChunkEventKind::Changed), 1);
        assert_eq!(count_kind(&events.borrow(), coord, ChunkEventKind::Ready), 1);
    }

    let events = events.borrow();
    let first_changed = events
        .iter()
        .position(|e| e.kind == ChunkEventKind::Changed)
        .unwrap();
    let last_ready = events
        .iter()
        .rposition(|e| e.kind == ChunkEventKind::Ready)
        .unwrap();
    assert!(last_ready < first_changed, "Ready precedes Changed");
}

#[test]
fn mandate_pins_the_surface() {
    let mut terrain = coordinator();
    let (bounds, projector) =
        quad_projector(Vec3::new(25.0, 3.0, 25.0), 10.0, ProjectorMode::Mandate);
    terrain.add_projector(&bounds, projector);
    settle(&mut terrain);

    assert!((terrain.sample_height(25.0, 25.0, false).unwrap() - 3.0).abs() < 1e-4);
    assert_eq!(terrain.sample_height(45.0, 45.0, false), Some(0.0));

    // Sculpting under a mandate keeps the pinned height.
    terrain.modify_add(Vec3::new(25.0, 0.0, 25.0), 10.0, 5.0);
    settle(&mut terrain);
    assert!((terrain.sample_height(25.0, 25.0, false).unwrap() - 3.0).abs() < 1e-4);
    assert!((terrain.sample_height(25.0, 25.0, true).unwrap() - 5.0).abs() < 1e-4);

    let state = terrain.chunk(GridCoord::new(0, 0)).unwrap().vertices()[4 * 9 + 4].modify;
    assert!(state.has(mask::MANDATED | mask::FLOOR | mask::CEILING));
    assert!(state.has(mask::SCULPTED));
}

#[test]
fn floor_and_ceiling_bound_the_surface() {
    let mut terrain = coordinator();
    let (bounds, floor) =
        quad_projector(Vec3::new(25.0, 2.0, 25.0), 10.0, ProjectorMode::Minimum);
    terrain.add_projector(&bounds, floor);
    let (bounds, ceiling) =
        quad_projector(Vec3::new(75.0, -1.0, 25.0), 10.0, ProjectorMode::Maximum);
    terrain.add_projector(&bounds, ceiling);
    settle(&mut terrain);

    assert!((terrain.sample_height(25.0, 25.0, false).unwrap() - 2.0).abs() < 1e-4);
    assert!((terrain.sample_height(75.0, 25.0, false).unwrap() + 1.0).abs() < 1e-4);

    // A floor above the sculpt wins, a sculpt above the floor is kept.
    terrain.modify_level(Vec3::new(25.0, 0.0, 25.0), 10.0, 6.0);
    settle(&mut terrain);
    assert!((terrain.sample_height(25.0, 25.0, false).unwrap() - 6.0).abs() < 1e-4);
}

#[test]
fn reprojection_is_a_fixed_point() {
    let mut terrain = coordinator();
    let (bounds, projector) =
        quad_projector(Vec3::new(50.0, 4.0, 50.0), 12.0, ProjectorMode::Mandate);
    terrain.add_projector(&bounds, projector);
    terrain.modify_add(Vec3::new(40.0, 0.0, 40.0), 20.0, 2.0);
    settle(&mut terrain);

    let coords = terrain.store().coords();
    let snapshot = |terrain: &meshi_terrain::TerrainCoordinator| -> Vec<_> {
        coords
            .iter()
            .map(|c| (heights(terrain, *c), modify_states(terrain, *c)))
            .collect()
    };
    let before = snapshot(&terrain);

    terrain.project(Vec3::new(-50.0, 0.0, -50.0), Vec3::new(150.0, 0.0, 150.0));
    settle(&mut terrain);
    assert_eq!(before, snapshot(&terrain));
}

#[test]
fn moving_a_contributor_clears_its_old_footprint() {
    let mut terrain = coordinator();
    let (bounds, projector) =
        quad_projector(Vec3::new(25.0, 3.0, 25.0), 10.0, ProjectorMode::Mandate);
    let id = terrain.add_projector(&bounds, projector);
    settle(&mut terrain);
    assert!((terrain.sample_height(25.0, 25.0, false).unwrap() - 3.0).abs() < 1e-4);

    let (bounds, moved) =
        quad_projector(Vec3::new(175.0, 3.0, 25.0), 10.0, ProjectorMode::Mandate);
    assert!(terrain.update_projector(id, &bounds, moved));
    settle(&mut terrain);
    assert_eq!(terrain.sample_height(25.0, 25.0, false), Some(0.0));
    assert!((terrain.sample_height(175.0, 25.0, false).unwrap() - 3.0).abs() < 1e-4);
    assert!(!terrain.projectors().has_contributors(GridCoord::new(0, 0)));

    assert!(terrain.remove_projector(id));
    settle(&mut terrain);
    assert_eq!(terrain.sample_height(175.0, 25.0, false), Some(0.0));
    assert!(!terrain.remove_projector(id));
}

#[test]
fn contributor_on_a_seam_projects_into_both_chunks() {
    let mut terrain = coordinator();
    let (bounds, projector) =
        quad_projector(Vec3::new(50.0, 2.0, 25.0), 8.0, ProjectorMode::Mandate);
    terrain.add_projector(&bounds, projector);
    settle(&mut terrain);

    let width = terrain.info().chunk_width();
    let left = modify_states(&terrain, GridCoord::new(0, 0));
    let right = modify_states(&terrain, GridCoord::new(1, 0));
    for z in 0..width {
        assert_eq!(left[z * width + width - 1], right[z * width], "row {}", z);
    }
    assert!((terrain.sample_height(50.0, 25.0, false).unwrap() - 2.0).abs() < 1e-4);
}
