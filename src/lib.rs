//! Chunked, editable terrain.
//!
//! A [`TerrainCoordinator`] owns a grid of square chunks that are created on
//! demand, sculpted with brushes, constrained by projected contributor meshes,
//! ray cast against, culled per camera and persisted to disk. All work is
//! queued and advanced from [`Updatable::tick`].

pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod filer;
pub mod gpu;
pub mod grid;
pub mod intersector;
pub mod modifier;
pub mod projector;
pub mod store;
pub mod tick;
mod utils;

pub use chunk::{ChunkPhase, ModifyState, TerrainChunk, Vertex, Visibility};
pub use config::{ProjectionInfo, TerrainInfo};
pub use coordinator::{LoadReport, RayQuery, SaveReport, TerrainCoordinator};
pub use error::{Error, Result};
pub use events::{ChunkEvent, ChunkEventKind};
pub use grid::{Bounds, Frustum, GridCoord, GridRect, Region};
pub use intersector::{Ray, RequestId};
pub use modifier::OperationType;
pub use projector::{Projector, ProjectorId, ProjectorMesh, ProjectorMode};
pub use store::ChunkHandle;
pub use tick::{FrameLoop, Updatable};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Installs a stdout subscriber at `level`. Returns false if a global
/// subscriber was already set.
pub fn init_logging(level: Level) -> bool {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
