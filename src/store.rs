use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::chunk::{Prototype, TerrainChunk};
use crate::config::TerrainInfo;
use crate::events::{ChunkEventKind, EventQueue};
use crate::grid::GridCoord;

/// Generational handle into a [`ChunkStore`]. Stale after the chunk is evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    slot: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    chunk: Option<TerrainChunk>,
}

/// Owns every chunk, indexed by grid coordinate.
pub struct ChunkStore {
    prototype: Arc<Prototype>,
    setup_delay: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    index: HashMap<GridCoord, ChunkHandle>,
}

impl ChunkStore {
    pub fn new(info: &TerrainInfo) -> Self {
        Self {
            prototype: Prototype::shared(info),
            setup_delay: info.setup_delay,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn prototype(&self) -> &Arc<Prototype> {
        &self.prototype
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        self.index.contains_key(&coord)
    }

    pub fn handle(&self, coord: GridCoord) -> Option<ChunkHandle> {
        self.index.get(&coord).copied()
    }

    /// Returns the chunk at `coord`, creating it if needed. Idempotent.
    pub fn get_or_create(&mut self, coord: GridCoord) -> ChunkHandle {
        if let Some(handle) = self.index.get(&coord) {
            return *handle;
        }

        info!("Creating terrain chunk {}", coord);
        let chunk = TerrainChunk::new(coord, self.prototype.clone(), self.setup_delay);
        let handle = match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.chunk = Some(chunk);
                ChunkHandle {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    chunk: Some(chunk),
                });
                ChunkHandle {
                    slot: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.index.insert(coord, handle);
        handle
    }

    pub fn get(&self, handle: ChunkHandle) -> Option<&TerrainChunk> {
        self.slots
            .get(handle.slot as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.chunk.as_ref())
    }

    pub fn get_mut(&mut self, handle: ChunkHandle) -> Option<&mut TerrainChunk> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.chunk.as_mut())
    }

    pub fn chunk(&self, coord: GridCoord) -> Option<&TerrainChunk> {
        self.handle(coord).and_then(|handle| self.get(handle))
    }

    pub fn chunk_mut(&mut self, coord: GridCoord) -> Option<&mut TerrainChunk> {
        let handle = self.handle(coord)?;
        self.get_mut(handle)
    }

    /// Coordinates of every chunk, sorted.
    pub fn coords(&self) -> Vec<GridCoord> {
        let mut coords: Vec<GridCoord> = self.index.keys().copied().collect();
        coords.sort();
        coords
    }

    pub fn iter(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.slots.iter().filter_map(|slot| slot.chunk.as_ref())
    }

    /// Advances deferred setup of every chunk by one frame.
    pub fn tick(&mut self, events: &mut EventQueue) {
        for slot in self.slots.iter_mut() {
            if let Some(chunk) = slot.chunk.as_mut() {
                chunk.advance_setup(events);
            }
        }
    }

    pub fn ensure_ready(&mut self, coord: GridCoord, events: &mut EventQueue) -> ChunkHandle {
        let handle = self.get_or_create(coord);
        if let Some(chunk) = self.get_mut(handle) {
            chunk.ensure_ready(events);
        }
        handle
    }

    /// Drops the chunk at `coord`. Outstanding handles to it become stale.
    pub fn evict(&mut self, coord: GridCoord, events: &mut EventQueue) -> bool {
        let Some(handle) = self.index.remove(&coord) else {
            return false;
        };
        let slot = &mut self.slots[handle.slot as usize];
        slot.chunk = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.slot);
        info!("Evicted terrain chunk {}", coord);
        events.emit(coord, ChunkEventKind::Evicted);
        true
    }
}
