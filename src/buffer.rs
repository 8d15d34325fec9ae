//! Raw, uninitialized storage for a fixed number of elements.
//!
//! This is the only place the crate talks to an [`Allocator`]. Nothing here constructs or drops
//! elements; a [`Buffer`] is pure storage and its owner decides which slots are initialized.

use core::alloc::Layout;
use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;

use crate::ChunkListError;

pub(crate) struct Buffer<T> {
    ptr: NonNull<T>,
    capacity: usize,
}

impl<T> Buffer<T> {
    /// Reserves room for `capacity` elements of `T`.
    ///
    /// Zero-sized requests never reach the allocator.
    pub(crate) fn allocate_in<A: Allocator>(
        capacity: usize,
        alloc: &A,
    ) -> Result<Self, ChunkListError> {
        let layout = Self::layout(capacity);

        if layout.size() == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                capacity,
            });
        }

        match alloc.allocate(layout) {
            Ok(allocation) => Ok(Self {
                ptr: allocation.cast(),
                capacity,
            }),
            Err(_) => Err(ChunkListError::AllocationFailure { layout }),
        }
    }

    /// Rebuilds a buffer from a pointer previously handed out by [`as_ptr`](Buffer::as_ptr).
    ///
    /// # Safety
    ///
    /// `ptr` and `capacity` must come from a buffer that has not been deallocated yet.
    pub(crate) unsafe fn from_raw_parts(ptr: NonNull<T>, capacity: usize) -> Self {
        Self { ptr, capacity }
    }

    /// Returns the storage to the allocator. Releasing an empty buffer is a no-op.
    ///
    /// # Safety
    ///
    /// The buffer must have been obtained from `alloc` (or an allocator it was cloned from).
    pub(crate) unsafe fn deallocate_in<A: Allocator>(self, alloc: &A) {
        let layout = Self::layout(self.capacity);

        if layout.size() != 0 {
            alloc.deallocate(self.ptr.cast(), layout);
        }
    }

    pub(crate) fn as_ptr(&self) -> NonNull<T> {
        self.ptr
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// # Panics
    ///
    /// If `capacity` elements would exceed `isize::MAX` bytes. Lists check this for their chunk
    /// capacity when they are created.
    fn layout(capacity: usize) -> Layout {
        match Layout::array::<T>(capacity) {
            Ok(layout) => layout,
            Err(_) => panic!("cannot allocate storage for {} elements", capacity),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::buffer::Buffer;
    use crate::testing::TrackingAllocator;
    use crate::ChunkListError;

    #[test]
    fn allocate_and_release() {
        let alloc = TrackingAllocator::new();
        let buffer = Buffer::<u64>::allocate_in(8, &alloc).unwrap();

        assert_eq!(buffer.capacity(), 8);
        assert_eq!(alloc.live_allocations(), 1);

        unsafe { buffer.deallocate_in(&alloc) };
        assert_eq!(alloc.live_allocations(), 0);
    }

    #[test]
    fn zero_sized_requests_skip_the_allocator() {
        let alloc = TrackingAllocator::new();

        let empty = Buffer::<u64>::allocate_in(0, &alloc).unwrap();
        let zst = Buffer::<()>::allocate_in(32, &alloc).unwrap();
        assert_eq!(alloc.total_allocations(), 0);

        unsafe {
            empty.deallocate_in(&alloc);
            zst.deallocate_in(&alloc);
        }
        assert_eq!(alloc.total_allocations(), 0);
    }

    #[test]
    fn failure_reports_layout() {
        let alloc = TrackingAllocator::failing_after(0);
        let result = Buffer::<u32>::allocate_in(4, &alloc);

        match result {
            Err(ChunkListError::AllocationFailure { layout }) => {
                assert_eq!(layout.size(), 16);
                assert_eq!(layout.align(), 4);
            }
            _ => panic!("expected an allocation failure"),
        }
    }
}
