#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use meshi_terrain::{
    Bounds, ChunkEvent, ChunkEventKind, GridCoord, ModifyState, Projector, ProjectorMesh,
    ProjectorMode, TerrainCoordinator, TerrainInfo, Updatable,
};

/// Small grid so kernels stay cheap: 8 cells of 6.25 units per chunk.
pub fn small_info() -> TerrainInfo {
    TerrainInfo {
        mesh_size: 8,
        ..Default::default()
    }
}

pub fn coordinator() -> TerrainCoordinator {
    TerrainCoordinator::new(small_info()).expect("valid terrain info")
}

pub fn run(terrain: &mut TerrainCoordinator, ticks: usize) {
    for _ in 0..ticks {
        terrain.tick(1.0 / 60.0);
    }
}

/// Ticks until no sculpt or projection work is queued.
pub fn settle(terrain: &mut TerrainCoordinator) {
    let mut guard = 0;
    while !terrain.modifier().is_idle() {
        terrain.tick(1.0 / 60.0);
        guard += 1;
        assert!(guard < 1000, "modifier never drained");
    }
}

pub fn record_events(terrain: &mut TerrainCoordinator) -> Rc<RefCell<Vec<ChunkEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    terrain.subscribe(Box::new(move |event| sink.borrow_mut().push(*event)));
    events
}

pub fn count_kind(events: &[ChunkEvent], coord: GridCoord, kind: ChunkEventKind) -> usize {
    events
        .iter()
        .filter(|event| event.coord == coord && event.kind == kind)
        .count()
}

pub fn heights(terrain: &TerrainCoordinator, coord: GridCoord) -> Vec<f32> {
    terrain
        .chunk(coord)
        .expect("chunk exists")
        .vertices()
        .iter()
        .map(|v| v.position[1])
        .collect()
}

pub fn modify_states(terrain: &TerrainCoordinator, coord: GridCoord) -> Vec<ModifyState> {
    terrain
        .chunk(coord)
        .expect("chunk exists")
        .vertices()
        .iter()
        .map(|v| v.modify)
        .collect()
}

/// Flat square contributor of half extent `half` centred on `center`.
pub fn quad_projector(center: Vec3, half: f32, mode: ProjectorMode) -> (Bounds, Projector) {
    let projector = Projector::new(
        Arc::new(ProjectorMesh::quad(half)),
        Mat4::from_translation(center),
        mode,
    );
    let bounds = projector.world_bounds().expect("quad has vertices");
    (bounds, projector)
}
