use core::alloc::Layout;

use alloc::alloc::handle_alloc_error;
use thiserror::Error;

/// Errors reported by [`ChunkList`](crate::ChunkList) and its cursors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkListError {
    /// A bounds-checked access or position was beyond the end of the list.
    #[error("index out of range (index={index}, len={len})")]
    OutOfRange {
        /// The offending index.
        index: usize,
        /// Length of the list (or occupancy of the chunk) at the time of the call.
        len: usize,
    },
    /// `front`, `back` or a pop was called on an empty list.
    #[error("operation requires a non-empty list")]
    EmptyContainer,
    /// The allocator could not satisfy a request.
    #[error("memory allocation of {} bytes failed", .layout.size())]
    AllocationFailure {
        /// The layout that was requested.
        layout: Layout,
    },
    /// A cursor at the end sentinel was dereferenced or moved.
    #[error("cursor does not point at an element")]
    IteratorMisuse,
}

impl ChunkListError {
    /// Turns the error into the abort or panic the infallible API surface promises.
    #[cold]
    #[track_caller]
    pub(crate) fn raise(self) -> ! {
        match self {
            ChunkListError::AllocationFailure { layout } => handle_alloc_error(layout),
            ChunkListError::OutOfRange { index, len } => {
                panic!("index out of bounds (index={}, len={})", index, len)
            }
            other => panic!("{}", other),
        }
    }
}
