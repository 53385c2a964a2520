mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::*;
use glam::Vec3;
use meshi_terrain::{GridCoord, Ray};

fn terrain_with_region() -> meshi_terrain::TerrainCoordinator {
    let mut terrain = coordinator();
    for (x, z) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        terrain.get_or_create_chunk(GridCoord::new(x, z));
    }
    terrain
}

#[test]
fn every_request_gets_exactly_one_callback() {
    let mut terrain = terrain_with_region();
    terrain.get_or_create_chunk(GridCoord::new(4, 0));
    terrain.device_mut().inject_readback_errors(2);

    let rays = [
        (Vec3::new(25.0, 50.0, 25.0), Vec3::NEG_Y),
        (Vec3::new(-20.0, 5.0, 30.0), Vec3::new(1.0, -0.02, 0.0)),
        (Vec3::new(10.0, 2.0, 10.0), Vec3::new(1.0, -0.01, 0.3)),
        (Vec3::new(25.0, 50.0, 25.0), Vec3::ZERO),
        (Vec3::new(-500.0, 10.0, -500.0), Vec3::NEG_Y),
        (Vec3::new(0.0, 5.0, 25.0), Vec3::X),
    ];
    let counters: Vec<Rc<Cell<u32>>> = rays.iter().map(|_| Rc::new(Cell::new(0))).collect();
    for ((origin, direction), counter) in rays.iter().zip(&counters) {
        let counter = counter.clone();
        terrain.cast_ray(*origin, *direction, Some(400.0), false, move |_| {
            counter.set(counter.get() + 1)
        });
    }

    run(&mut terrain, 6);
    for (index, counter) in counters.iter().enumerate() {
        assert_eq!(counter.get(), 1, "ray {}", index);
    }
    assert_eq!(terrain.intersector().pending(), 0);
    assert_eq!(terrain.intersector().request_buffers().in_use(), 0);
    assert_eq!(terrain.intersector().result_buffers().in_use(), 0);
}

#[test]
fn failed_readback_counts_as_miss() {
    let mut terrain = terrain_with_region();
    terrain.device_mut().inject_readback_errors(1);

    let failed = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y, None, false);
    run(&mut terrain, 2);
    assert_eq!(failed.result(), Some(None));

    let retry = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y, None, false);
    run(&mut terrain, 2);
    let hit = retry.result().flatten().expect("second cast hits");
    assert!(hit.y.abs() < 1e-4);
}

#[test]
fn queries_resolve_after_readback_latency() {
    let mut terrain = terrain_with_region();
    let query = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y, None, false);
    assert!(!query.is_resolved());
    run(&mut terrain, 1);
    assert!(!query.is_resolved());
    assert_eq!(terrain.intersector().in_flight(), 1);
    run(&mut terrain, 1);
    assert!(query.is_resolved());
}

#[test]
fn zero_direction_and_empty_space_miss() {
    let mut terrain = terrain_with_region();
    let still = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::ZERO, None, false);
    let empty = terrain.cast_ray_query(Vec3::new(900.0, 10.0, 900.0), Vec3::NEG_Y, None, false);
    run(&mut terrain, 2);
    assert_eq!(still.result(), Some(None));
    assert_eq!(empty.result(), Some(None));
    assert_eq!(terrain.store().len(), 4, "queries never create chunks");
}

#[test]
fn range_limits_the_segment() {
    let mut terrain = terrain_with_region();
    let short = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y, Some(5.0), false);
    let long = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y, Some(15.0), false);
    run(&mut terrain, 2);
    assert_eq!(short.result(), Some(None));
    assert!(long.result().flatten().is_some());
}

#[test]
fn nearest_hit_wins_across_regions() {
    let mut terrain = coordinator();
    terrain.modify_add(Vec3::new(25.0, 0.0, 26.0), 10.0, 2.0);
    terrain.modify_add(Vec3::new(125.0, 0.0, 26.0), 10.0, 2.0);
    settle(&mut terrain);

    let forward = terrain.cast_ray_query(Vec3::new(1.0, 0.5, 26.0), Vec3::X, Some(190.0), false);
    let backward =
        terrain.cast_ray_query(Vec3::new(195.0, 0.5, 26.0), Vec3::NEG_X, Some(190.0), false);
    run(&mut terrain, 2);

    let forward = forward.result().flatten().expect("forward hit");
    let backward = backward.result().flatten().expect("backward hit");
    assert!(forward.x > 10.0 && forward.x < 25.0, "forward hit {:?}", forward);
    assert!(backward.x > 125.0 && backward.x < 140.0, "backward hit {:?}", backward);
}

#[test]
fn base_only_rays_ignore_contributors() {
    let mut terrain = terrain_with_region();
    let (bounds, floor) = quad_projector(
        Vec3::new(25.0, 3.0, 25.0),
        10.0,
        meshi_terrain::ProjectorMode::Minimum,
    );
    terrain.add_projector(&bounds, floor);
    settle(&mut terrain);

    let full = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y, None, false);
    let base = terrain.cast_ray_query(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y, None, true);
    run(&mut terrain, 2);
    assert!((full.result().flatten().unwrap().y - 3.0).abs() < 1e-4);
    assert!(base.result().flatten().unwrap().y.abs() < 1e-4);
}

#[test]
fn batch_reports_one_entry_per_ray() {
    let mut terrain = terrain_with_region();
    let received = Rc::new(RefCell::new(None));
    let sink = received.clone();
    terrain.cast_batch(
        vec![
            Ray::new(Vec3::new(25.0, 10.0, 25.0), Vec3::NEG_Y),
            Ray::new(Vec3::new(25.0, 10.0, 25.0), Vec3::ZERO),
            Ray::new(Vec3::new(70.0, 10.0, 70.0), Vec3::NEG_Y).with_range(3.0),
            Ray::new(Vec3::new(70.0, 10.0, 70.0), Vec3::NEG_Y).base_only(),
        ],
        move |hits| *sink.borrow_mut() = Some(hits),
    );
    run(&mut terrain, 2);

    let hits = received.borrow_mut().take().expect("batch resolved");
    assert_eq!(hits.len(), 4);
    assert!(hits[0].is_some());
    assert!(hits[1].is_none());
    assert!(hits[2].is_none());
    assert!((hits[3].unwrap() - Vec3::new(70.0, 0.0, 70.0)).length() < 1e-3);
    assert_eq!(terrain.intersector().request_buffers().allocated(), 1);
    assert_eq!(terrain.intersector().request_buffers().available(), 1);
}

#[test]
fn unbounded_range_resolves_once() {
    let mut terrain = terrain_with_region();
    let calls = Rc::new(Cell::new(0));
    let hit = Rc::new(Cell::new(None));
    for range in [f32::INFINITY, f32::MAX] {
        let (calls, hit) = (calls.clone(), hit.clone());
        terrain.cast_ray(
            Vec3::new(25.0, 10.0, 25.0),
            Vec3::new(1.0, -1.0, 1.0),
            Some(range),
            false,
            move |result| {
                calls.set(calls.get() + 1);
                hit.set(result);
            },
        );
    }
    let far = terrain.cast_ray_query(
        Vec3::new(1.0e30, 10.0, 0.0),
        Vec3::new(-1.0, -0.1, 0.0),
        Some(f32::MAX),
        false,
    );

    run(&mut terrain, 2);
    assert_eq!(calls.get(), 2);
    let hit = hit.get().expect("capped segment still reaches the ground");
    assert!((hit - Vec3::new(35.0, 0.0, 35.0)).length() < 1e-3, "hit {:?}", hit);
    assert_eq!(far.result(), Some(None));
    assert_eq!(terrain.intersector().pending(), 0);
}

#[test]
fn failed_region_keeps_hits_from_other_regions() {
    let mut terrain = coordinator();
    terrain.modify_add(Vec3::new(25.0, 0.0, 26.0), 10.0, 2.0);
    terrain.modify_add(Vec3::new(125.0, 0.0, 26.0), 10.0, 2.0);
    settle(&mut terrain);

    // Regions are dispatched in coordinate order, so the near one fails.
    terrain.device_mut().inject_readback_errors(1);
    let query = terrain.cast_ray_query(Vec3::new(1.0, 0.5, 26.0), Vec3::X, Some(190.0), false);
    run(&mut terrain, 2);

    assert_eq!(terrain.device().stats().failed_readbacks, 1);
    let hit = query.result().flatten().expect("far region still hits");
    assert!(hit.x > 110.0 && hit.x < 125.0, "hit {:?}", hit);
}
