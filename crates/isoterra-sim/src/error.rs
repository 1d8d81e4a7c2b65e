use isoterra_core::types::{ChunkCoord, PageIndex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("No free run of {requested} pages ({free} pages free)")]
    Exhausted { requested: u32, free: u32 },
    #[error("Page {0} released while already free")]
    DoubleFree(PageIndex),
    #[error("{count} pages from page {first} fall outside the {capacity}-page store")]
    OutOfRange {
        first: PageIndex,
        count: u32,
        capacity: u32,
    },
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to build device thread pool: {0}")]
    PoolCreation(#[from] rayon::ThreadPoolBuildError),
    #[error("Dispatch '{label}' did not complete within {timeout_ms} ms ({completed}/{invocations} invocations)")]
    WaitTimeout {
        label: String,
        timeout_ms: u64,
        completed: usize,
        invocations: usize,
    },
    #[error("Dispatch '{label}' lost {missing} invocations (worker panicked)")]
    Disconnected { label: String, missing: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("Chunk {chunk} could not allocate geometry: {source}")]
    Allocation {
        chunk: ChunkCoord,
        #[source]
        source: AllocError,
    },
    #[error("Chunk {chunk} could not release its previous geometry: {source}")]
    Release {
        chunk: ChunkCoord,
        #[source]
        source: AllocError,
    },
}
