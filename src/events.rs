use tracing::trace;

use crate::grid::GridCoord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEventKind {
    /// Buffers exist and the chunk may be drawn. Emitted once per chunk.
    Ready,
    /// Vertex data was rewritten.
    Changed,
    Visible { lod: u8 },
    Hidden,
    LodChanged { lod: u8 },
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEvent {
    pub coord: GridCoord,
    pub kind: ChunkEventKind,
}

pub type ChunkListener = Box<dyn FnMut(&ChunkEvent)>;

/// Buffers chunk events until the owner flushes them to listeners.
#[derive(Default)]
pub struct EventQueue {
    pending: Vec<ChunkEvent>,
    listeners: Vec<ChunkListener>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, coord: GridCoord, kind: ChunkEventKind) {
        trace!("Chunk {} event {:?}", coord, kind);
        self.pending.push(ChunkEvent { coord, kind });
    }

    pub fn subscribe(&mut self, listener: ChunkListener) {
        self.listeners.push(listener);
    }

    pub fn pending(&self) -> &[ChunkEvent] {
        &self.pending
    }

    /// Delivers queued events to every listener in emission order and clears
    /// the queue. Returns the number of events delivered.
    pub fn flush(&mut self) -> usize {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for listener in self.listeners.iter_mut() {
                listener(event);
            }
        }
        events.len()
    }
}
