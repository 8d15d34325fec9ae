use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use allocator_api2::alloc::{Allocator, Global};

use crate::chunk::{Chunk, Link};
use crate::cursor::RawCursor;
use crate::util::{assume_assert, impl_iter};
use crate::{ChunkList, DEFAULT_CHUNK_CAPACITY};

pub(super) struct RawChunksIter<T, const N: usize> {
    front: Link<T, N>,
    back: Link<T, N>,
    len: usize,
}

impl<T, const N: usize> RawChunksIter<T, N> {
    pub(super) fn new<A: Allocator>(list: &ChunkList<T, N, A>) -> Self {
        Self {
            front: list.head,
            back: list.back,
            len: list.len().div_ceil(N),
        }
    }
}

impl<T, const N: usize> Iterator for RawChunksIter<T, N> {
    type Item = NonNull<Chunk<T, N>>;

    #[allow(clippy::iter_nth_zero)]
    fn next(&mut self) -> Option<Self::Item> {
        self.nth(0)
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.len {
            self.len = 0;
            return None;
        }

        self.len -= n + 1;

        unsafe {
            let mut chunk = self.front;
            for _ in 0..n {
                chunk = chunk.and_then(|c| c.as_ref().next);
            }

            assume_assert!(chunk.is_some());
            self.front = chunk.and_then(|c| c.as_ref().next);
            chunk
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T, const N: usize> DoubleEndedIterator for RawChunksIter<T, N> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.nth_back(0)
    }

    fn nth_back(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.len {
            self.len = 0;
            return None;
        }

        self.len -= n + 1;

        unsafe {
            let mut chunk = self.back;
            for _ in 0..n {
                chunk = chunk.and_then(|c| c.as_ref().prev);
            }

            assume_assert!(chunk.is_some());
            self.back = chunk.and_then(|c| c.as_ref().prev);
            chunk
        }
    }
}

impl<T, const N: usize> Clone for RawChunksIter<T, N> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
            len: self.len,
        }
    }
}

unsafe impl<T, const N: usize> Sync for RawChunksIter<T, N> {}

unsafe impl<T, const N: usize> Send for RawChunksIter<T, N> {}

/// Returned by [`ChunkList::chunks`].
pub struct ChunksIter<'a, T: 'a, const N: usize = DEFAULT_CHUNK_CAPACITY> {
    raw: RawChunksIter<T, N>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: 'a, const N: usize> ChunksIter<'a, T, N> {
    pub(super) fn new<A: Allocator>(list: &'a ChunkList<T, N, A>) -> Self {
        Self {
            raw: RawChunksIter::new(list),
            _marker: PhantomData,
        }
    }
}

impl_iter! {
    on = ChunksIter<'a, T, N> for { 'a, T, const N: usize } where { T: 'a };
    inner = raw;
    item = { &'a [T] };
    map = { |_this: &mut Self, ptr: NonNull<Chunk<T, N>>|
        unsafe {
            Some((*ptr.as_ptr()).as_slice())
        }
    };
    double_ended = true;
    exact_size = true;
}

impl<'a, T, const N: usize> Clone for ChunksIter<'a, T, N> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<'a, T, const N: usize> Debug for ChunksIter<'a, T, N> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("ChunksIter").field("len", &self.raw.len).finish()
    }
}

/// Returned by [`ChunkList::chunks_mut`].
pub struct ChunksIterMut<'a, T: 'a, const N: usize = DEFAULT_CHUNK_CAPACITY> {
    raw: RawChunksIter<T, N>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T: 'a, const N: usize> ChunksIterMut<'a, T, N> {
    pub(super) fn new<A: Allocator>(list: &'a mut ChunkList<T, N, A>) -> Self {
        Self {
            raw: RawChunksIter::new(list),
            _marker: PhantomData,
        }
    }
}

impl_iter! {
    on = ChunksIterMut<'a, T, N> for { 'a, T, const N: usize } where { T: 'a };
    inner = raw;
    item = { &'a mut [T] };
    map = { |_this: &mut Self, ptr: NonNull<Chunk<T, N>>|
        unsafe {
            Some((*ptr.as_ptr()).as_mut_slice())
        }
    };
    double_ended = true;
    exact_size = true;
}

impl<'a, T, const N: usize> Debug for ChunksIterMut<'a, T, N> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("ChunksIterMut").field("len", &self.raw.len).finish()
    }
}

/// Walks the elements between two cursors. `len` decides when to stop, so the cursors never
/// have to meet or cross.
pub(super) struct RawIter<T, const N: usize> {
    front: RawCursor<T, N>,
    back: RawCursor<T, N>,
    len: usize,
}

impl<T, const N: usize> RawIter<T, N> {
    pub(super) fn new<A: Allocator>(list: &ChunkList<T, N, A>) -> Self {
        Self {
            front: list.raw_first(),
            back: list.raw_last(),
            len: list.len(),
        }
    }
}

impl<T, const N: usize> Iterator for RawIter<T, N> {
    type Item = NonNull<T>;

    #[allow(clippy::iter_nth_zero)]
    fn next(&mut self) -> Option<NonNull<T>> {
        self.nth(0)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }

    fn nth(&mut self, n: usize) -> Option<NonNull<T>> {
        if n >= self.len {
            self.len = 0;
            return None;
        }

        self.len -= n + 1;

        unsafe {
            assume_assert!(self.front.advance(n).is_ok());
            let item = self.front.ptr();
            assume_assert!(item.is_some());

            if self.len > 0 {
                assume_assert!(self.front.step_forward().is_ok());
            }

            item
        }
    }
}

impl<T, const N: usize> DoubleEndedIterator for RawIter<T, N> {
    fn next_back(&mut self) -> Option<NonNull<T>> {
        self.nth_back(0)
    }

    fn nth_back(&mut self, n: usize) -> Option<NonNull<T>> {
        if n >= self.len {
            self.len = 0;
            return None;
        }

        self.len -= n + 1;

        unsafe {
            assume_assert!(self.back.retreat(n).is_ok());
            let item = self.back.ptr();
            assume_assert!(item.is_some());

            if self.len > 0 {
                assume_assert!(self.back.step_back().is_ok());
            }

            item
        }
    }
}

impl<T, const N: usize> Clone for RawIter<T, N> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
            len: self.len,
        }
    }
}

unsafe impl<T, const N: usize> Sync for RawIter<T, N> {}

unsafe impl<T, const N: usize> Send for RawIter<T, N> {}

/// Returned by [`ChunkList::iter`].
pub struct Iter<'a, T: 'a, const N: usize = DEFAULT_CHUNK_CAPACITY> {
    raw: RawIter<T, N>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T, const N: usize> Iter<'a, T, N> {
    pub(super) fn new<A: Allocator>(list: &'a ChunkList<T, N, A>) -> Self {
        Self {
            raw: RawIter::new(list),
            _marker: PhantomData,
        }
    }
}

impl_iter! {
    on = Iter<'a, T, N> for { 'a, T, const N: usize } where { T: 'a };
    inner = raw;
    item = { &'a T };
    map = { |_this: &mut Self, ptr: NonNull<T>|
        unsafe {
            Some(&*ptr.as_ptr())
        }
    };
    double_ended = true;
    exact_size = true;
}

impl<'a, T, const N: usize> Clone for Iter<'a, T, N> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<'a, T: Debug, const N: usize> Debug for Iter<'a, T, N> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// Returned by [`ChunkList::iter_mut`].
pub struct IterMut<'a, T: 'a, const N: usize = DEFAULT_CHUNK_CAPACITY> {
    raw: RawIter<T, N>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T, const N: usize> IterMut<'a, T, N> {
    pub(super) fn new<A: Allocator>(list: &'a mut ChunkList<T, N, A>) -> Self {
        Self {
            raw: RawIter::new(list),
            _marker: PhantomData,
        }
    }
}

impl_iter! {
    on = IterMut<'a, T, N> for { 'a, T, const N: usize } where { T: 'a };
    inner = raw;
    item = { &'a mut T };
    map = { |_this: &mut Self, ptr: NonNull<T>|
        unsafe {
            Some(&mut *ptr.as_ptr())
        }
    };
    double_ended = true;
    exact_size = true;
}

impl<'a, T, const N: usize> Debug for IterMut<'a, T, N> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("IterMut").field("len", &self.raw.len).finish()
    }
}

/// Returned by [`ChunkList::into_iter`].
pub struct IntoIter<T, const N: usize = DEFAULT_CHUNK_CAPACITY, A: Allocator = Global> {
    list: ChunkList<T, N, A>,
    raw: RawIter<T, N>,
}

impl<T, const N: usize, A: Allocator> IntoIter<T, N, A> {
    pub(super) fn new(list: ChunkList<T, N, A>) -> Self {
        let raw = RawIter::new(&list);
        Self { list, raw }
    }
}

impl<T, const N: usize, A: Allocator> Drop for IntoIter<T, N, A> {
    fn drop(&mut self) {
        /// Empties the chunks once the remaining elements are dropped, or when a drop panics, so
        /// the list only hands back storage. Elements after a panicking one are leaked.
        struct ForgetGuard<'r, T, const N: usize, A: Allocator>(&'r mut ChunkList<T, N, A>);

        impl<'r, T, const N: usize, A: Allocator> Drop for ForgetGuard<'r, T, N, A> {
            fn drop(&mut self) {
                unsafe { self.0.forget_contents() };
            }
        }

        let guard = ForgetGuard(&mut self.list);

        unsafe {
            for ptr in self.raw.by_ref() {
                ptr::drop_in_place(ptr.as_ptr());
            }
        }

        drop(guard);
    }
}

impl_iter! {
    on = IntoIter<T, N, A> for { T, const N: usize, A } where { A: Allocator };
    inner = raw;
    item = { T };
    map = { |_this: &mut Self, ptr: NonNull<T>|
        unsafe {
            Some(ptr::read(ptr.as_ptr()))
        }
    };
    double_ended = true;
    exact_size = true;
}

impl<T, const N: usize, A: Allocator> Debug for IntoIter<T, N, A> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("IntoIter").field("len", &self.raw.len).finish()
    }
}
