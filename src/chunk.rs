use core::ptr::{self, NonNull};
use core::slice;

use allocator_api2::alloc::Allocator;

use crate::buffer::Buffer;
use crate::ChunkListError;

pub(crate) type Link<T, const N: usize> = Option<NonNull<Chunk<T, N>>>;

/// A node of the chain: `N` contiguous slots, the first `filled` of which are initialized.
///
/// Chunks live behind raw pointers obtained from the list's allocator. A chunk owns its element
/// buffer but not its neighbours; tearing down the chain is the list's job, so that long chains
/// are released iteratively.
pub(crate) struct Chunk<T, const N: usize> {
    buf: Buffer<T>,
    filled: usize,
    pub(crate) prev: Link<T, N>,
    pub(crate) next: Link<T, N>,
}

impl<T, const N: usize> Chunk<T, N> {
    /// Allocates an empty, unlinked chunk.
    ///
    /// The element buffer is reserved before the header, and released again if the header cannot
    /// be allocated, so a failure leaves nothing behind.
    pub(crate) fn new_in<A: Allocator>(alloc: &A) -> Result<NonNull<Self>, ChunkListError> {
        let buf = Buffer::allocate_in(N, alloc)?;

        let node = match Buffer::<Self>::allocate_in(1, alloc) {
            Ok(node) => node,
            Err(err) => {
                unsafe { buf.deallocate_in(alloc) };
                return Err(err);
            }
        };

        let node = node.as_ptr();

        unsafe {
            ptr::write(
                node.as_ptr(),
                Self {
                    buf,
                    filled: 0,
                    prev: None,
                    next: None,
                },
            );
        }

        Ok(node)
    }

    /// Drops the occupied elements and gives both allocations back. Neighbours are not touched.
    ///
    /// # Safety
    ///
    /// `this` must come from [`new_in`](Chunk::new_in) with the same allocator and must not be
    /// used afterwards.
    pub(crate) unsafe fn release_in<A: Allocator>(this: NonNull<Self>, alloc: &A) {
        /// Gives the storage back even if an element's drop panics.
        struct DeallocGuard<'r, T, const N: usize, A: Allocator> {
            node: NonNull<Chunk<T, N>>,
            alloc: &'r A,
        }

        impl<'r, T, const N: usize, A: Allocator> Drop for DeallocGuard<'r, T, N, A> {
            fn drop(&mut self) {
                unsafe {
                    let chunk = ptr::read(self.node.as_ptr());
                    chunk.buf.deallocate_in(self.alloc);
                    Buffer::from_raw_parts(self.node, 1).deallocate_in(self.alloc);
                }
            }
        }

        let _guard = DeallocGuard { node: this, alloc };
        let chunk = this.as_ref();

        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
            chunk.buf.as_ptr().as_ptr(),
            chunk.filled,
        ));
    }

    /// Deep-copies the occupied elements into a freshly allocated chunk of the same capacity.
    ///
    /// The copy starts unlinked. If `T::clone` panics the partial copy is leaked.
    pub(crate) fn try_clone_in<A: Allocator>(
        &self,
        alloc: &A,
    ) -> Result<NonNull<Self>, ChunkListError>
    where
        T: Clone,
    {
        let mut copy = Self::new_in(alloc)?;

        unsafe {
            let copy = copy.as_mut();
            for value in self.as_slice() {
                copy.push(value.clone());
            }
        }

        Ok(copy)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub(crate) fn len(&self) -> usize {
        self.filled
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.filled == self.capacity()
    }

    /// Bounds-checked against the occupied slots, not the capacity.
    pub(crate) fn at(&self, index: usize) -> Result<&T, ChunkListError> {
        self.as_slice().get(index).ok_or(ChunkListError::OutOfRange {
            index,
            len: self.filled,
        })
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> Result<&mut T, ChunkListError> {
        let len = self.filled;

        self.as_mut_slice()
            .get_mut(index)
            .ok_or(ChunkListError::OutOfRange { index, len })
    }

    /// Pointer to slot `index`, which may be uninitialized.
    ///
    /// # Safety
    ///
    /// `index` must be less than `N`.
    pub(crate) unsafe fn slot(&self, index: usize) -> NonNull<T> {
        debug_assert!(index < N);
        NonNull::new_unchecked(self.buf.as_ptr().as_ptr().add(index))
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.buf.as_ptr().as_ptr(), self.filled) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.buf.as_ptr().as_ptr(), self.filled) }
    }

    pub(crate) fn push(&mut self, value: T) {
        assert!(!self.is_full(), "chunk is full (capacity={})", N);

        unsafe {
            ptr::write(self.slot(self.filled).as_ptr(), value);
        }

        self.filled += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        if self.filled == 0 {
            return None;
        }

        self.filled -= 1;
        unsafe { Some(ptr::read(self.slot(self.filled).as_ptr())) }
    }

    /// Marks the last occupied slot as vacant without dropping its contents.
    ///
    /// # Safety
    ///
    /// The chunk must not be empty, and the value in the last slot must have been moved out.
    pub(crate) unsafe fn forget_last(&mut self) {
        debug_assert!(self.filled > 0);
        self.filled -= 1;
    }

    /// Marks every slot as vacant without dropping anything.
    ///
    /// # Safety
    ///
    /// Every occupied value must have been moved out or dropped already.
    pub(crate) unsafe fn forget_all(&mut self) {
        self.filled = 0;
    }
}

#[cfg(test)]
mod test {
    use alloc::sync::Arc;
    use allocator_api2::alloc::Global;
    use core::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use crate::chunk::Chunk;
    use crate::testing::TrackingAllocator;
    use crate::ChunkListError;

    #[test]
    fn capacity_is_fixed() {
        let chunk = Chunk::<u8, 5>::new_in(&Global).unwrap();

        unsafe {
            assert_eq!(chunk.as_ref().capacity(), 5);
            assert!(chunk.as_ref().is_empty());
            Chunk::release_in(chunk, &Global);
        }
    }

    #[test]
    fn at_checks_occupancy() {
        let mut chunk = Chunk::<u32, 4>::new_in(&Global).unwrap();

        unsafe {
            let c = chunk.as_mut();
            c.push(10);
            c.push(20);

            assert_eq!(c.at(1), Ok(&20));
            assert_eq!(c.at(2), Err(ChunkListError::OutOfRange { index: 2, len: 2 }));
            assert_eq!(c.at(4), Err(ChunkListError::OutOfRange { index: 4, len: 2 }));

            *c.at_mut(0).unwrap() = 11;
            assert_eq!(c.as_slice(), &[11, 20]);

            Chunk::release_in(chunk, &Global);
        }
    }

    #[test]
    fn push_until_full_then_pop() {
        let mut chunk = Chunk::<u32, 3>::new_in(&Global).unwrap();

        unsafe {
            let c = chunk.as_mut();
            (0..3).for_each(|i| c.push(i));
            assert!(c.is_full());

            assert_eq!(c.pop(), Some(2));
            assert_eq!(c.pop(), Some(1));
            assert_eq!(c.pop(), Some(0));
            assert_eq!(c.pop(), None);

            Chunk::release_in(chunk, &Global);
        }
    }

    #[test]
    #[should_panic]
    fn push_into_full_chunk_panics() {
        let mut chunk = Chunk::<u32, 1>::new_in(&Global).unwrap();

        unsafe {
            chunk.as_mut().push(1);
            chunk.as_mut().push(2);
        }
    }

    #[test]
    fn clone_is_deep_and_unlinked() {
        let mut original = Chunk::<Arc<u32>, 4>::new_in(&Global).unwrap();
        let neighbour = Chunk::<Arc<u32>, 4>::new_in(&Global).unwrap();

        unsafe {
            original.as_mut().push(Arc::new(1));
            original.as_mut().push(Arc::new(2));
            original.as_mut().next = Some(neighbour);

            let mut copy = original.as_ref().try_clone_in(&Global).unwrap();

            assert_eq!(copy.as_ref().len(), 2);
            assert!(copy.as_ref().next.is_none());
            assert!(copy.as_ref().prev.is_none());
            assert_eq!(Arc::strong_count(&original.as_ref().as_slice()[0]), 2);

            copy.as_mut().as_mut_slice()[0] = Arc::new(7);
            assert_eq!(*original.as_ref().as_slice()[0], 1);

            Chunk::release_in(copy, &Global);
            Chunk::release_in(original, &Global);
            Chunk::release_in(neighbour, &Global);
        }
    }

    #[test]
    fn release_drops_occupied_only() {
        let strong = Arc::new(());
        let mut chunk = Chunk::<Arc<()>, 8>::new_in(&Global).unwrap();

        unsafe {
            (0..3).for_each(|_| chunk.as_mut().push(strong.clone()));
            assert_eq!(Arc::strong_count(&strong), 4);

            Chunk::release_in(chunk, &Global);
        }

        assert_eq!(Arc::strong_count(&strong), 1);
    }

    #[test]
    fn release_returns_both_allocations() {
        let alloc = TrackingAllocator::new();
        let chunk = Chunk::<u64, 8>::new_in(&alloc).unwrap();
        assert_eq!(alloc.live_allocations(), 2);

        unsafe { Chunk::release_in(chunk, &alloc) };
        assert_eq!(alloc.live_allocations(), 0);
    }

    #[test]
    fn release_survives_panicking_drop() {
        struct Bomb<'a>(&'a Cell<usize>, bool);

        impl Drop for Bomb<'_> {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
                if self.1 {
                    panic!("bomb");
                }
            }
        }

        let drops = Cell::new(0);
        let alloc = TrackingAllocator::new();
        let mut chunk = Chunk::<Bomb, 4>::new_in(&alloc).unwrap();

        unsafe {
            chunk.as_mut().push(Bomb(&drops, false));
            chunk.as_mut().push(Bomb(&drops, true));
            chunk.as_mut().push(Bomb(&drops, false));
        }

        let result = catch_unwind(AssertUnwindSafe(|| unsafe {
            Chunk::release_in(chunk, &alloc);
        }));

        assert!(result.is_err());
        assert_eq!(drops.get(), 3);
        assert_eq!(alloc.live_allocations(), 0);
    }

    #[test]
    fn header_failure_releases_buffer() {
        let alloc = TrackingAllocator::failing_after(1);
        let result = Chunk::<u64, 8>::new_in(&alloc);

        assert!(matches!(result, Err(ChunkListError::AllocationFailure { .. })));
        assert_eq!(alloc.live_allocations(), 0);
    }
}
