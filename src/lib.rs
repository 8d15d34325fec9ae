#![doc = include_str!("doc.md")]
#![cfg_attr(not(any(test, doc)), no_std)]
#![cfg_attr(feature = "nightly", feature(allocator_api))]
#![warn(missing_debug_implementations, missing_docs)]

extern crate alloc;

use core::alloc::Layout;
use core::cmp::Ordering;
use core::fmt::{Debug, Formatter};
use core::hash::{Hash, Hasher};
use core::iter::{repeat, repeat_with};
use core::marker::PhantomData;
use core::ops::{Bound, Index, IndexMut, RangeBounds};
use core::ptr::{self, NonNull};
use core::{fmt, mem};

use allocator_api2::alloc::{Allocator, Global};

pub use cursor::{Cursor, CursorMut};
pub use error::ChunkListError;
pub use iter::{ChunksIter, ChunksIterMut, IntoIter, Iter, IterMut};

use crate::chunk::{Chunk, Link};
use crate::cursor::RawCursor;
use crate::iter::RawChunksIter;
use crate::util::{assume_assert, UnwrapExt};

mod buffer;
mod chunk;
mod cursor;
mod error;
mod iter;
#[cfg(test)]
mod testing;
mod util;

/// The chunk capacity used when none is given.
pub const DEFAULT_CHUNK_CAPACITY: usize = 16;

#[doc = include_str!("doc.md")]
pub struct ChunkList<T, const N: usize = DEFAULT_CHUNK_CAPACITY, A: Allocator = Global> {
    alloc: A,
    len: usize,
    chunk_count: usize,
    head: Link<T, N>,
    tail: Link<T, N>,
    /// The chunk holding the last element. Chunks after it are empty spares.
    back: Link<T, N>,
    _marker: PhantomData<T>,
}

impl<T, const N: usize> Default for ChunkList<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> ChunkList<T, N> {
    /// Creates an empty list backed by the global allocator.
    ///
    /// No chunk is allocated until the first element is added.
    ///
    /// # Panics
    ///
    /// If `N` is zero, or if a chunk of `N` elements would exceed `isize::MAX` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let list = ChunkList::<u32, 8>::new();
    /// assert!(list.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a list holding `count` clones of `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let list = ChunkList::<u32, 4>::from_value(6, 7);
    /// assert_eq!(list.len(), 6);
    /// assert!(list.iter().all(|x| *x == 7));
    /// ```
    pub fn from_value(count: usize, value: T) -> Self
    where
        T: Clone,
    {
        Self::from_value_in(count, value, Global)
    }

    /// Creates a list holding `count` default values.
    pub fn with_default(count: usize) -> Self
    where
        T: Default,
    {
        Self::with_default_in(count, Global)
    }
}

impl<T, const N: usize, A: Allocator> ChunkList<T, N, A> {
    /// Number of elements each chunk holds.
    pub const CHUNK_CAPACITY: usize = N;

    /// Creates an empty list that obtains its chunks from `alloc`.
    ///
    /// # Panics
    ///
    /// If `N` is zero, or if a chunk of `N` elements would exceed `isize::MAX` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use allocator_api2::alloc::Global;
    /// # use chunk_list::ChunkList;
    /// let list = ChunkList::<u32, 8, _>::new_in(Global);
    /// assert_eq!(list.capacity(), 0);
    /// ```
    pub fn new_in(alloc: A) -> Self {
        assert!(N > 0, "chunk capacity must be non-zero");
        assert!(
            Layout::array::<T>(N).is_ok(),
            "chunk capacity overflows the maximum allocation size (capacity={})",
            N
        );

        Self {
            alloc,
            len: 0,
            chunk_count: 0,
            head: None,
            tail: None,
            back: None,
            _marker: PhantomData,
        }
    }

    /// Like [`from_value`](ChunkList::from_value), with a custom allocator.
    pub fn from_value_in(count: usize, value: T, alloc: A) -> Self
    where
        T: Clone,
    {
        let mut list = Self::new_in(alloc);
        list.extend(repeat(value).take(count));
        list
    }

    /// Like [`with_default`](ChunkList::with_default), with a custom allocator.
    pub fn with_default_in(count: usize, alloc: A) -> Self
    where
        T: Default,
    {
        let mut list = Self::new_in(alloc);
        list.extend(repeat_with(T::default).take(count));
        list
    }

    /// Creates a list from the elements of an iterator, with a custom allocator.
    pub fn from_iter_in<I: IntoIterator<Item = T>>(iter: I, alloc: A) -> Self {
        let mut list = Self::new_in(alloc);
        list.extend(iter);
        list
    }

    /// Access the allocator used by the list.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns the number of elements in the list.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 2>::new();
    /// assert_eq!(list.len(), 0);
    ///
    /// list.push_back(1);
    /// assert_eq!(list.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of element slots in the allocated chunks, occupied or not.
    pub fn capacity(&self) -> usize {
        self.chunk_count * N
    }

    /// The largest number of elements a list of this type could ever describe.
    pub fn max_size(&self) -> usize {
        isize::MAX as usize / mem::size_of::<T>().max(1)
    }

    /// Returns a reference to the element at `index`, or `None` if it is out of bounds.
    ///
    /// Finding the element walks the chain from whichever end is closer, so the cost is
    /// proportional to the number of chunks rather than constant.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let list = ChunkList::<u32, 3>::from_iter(0..5);
    /// assert_eq!(list.get(4), Some(&4));
    /// assert_eq!(list.get(5), None);
    /// ```
    pub fn get(&self, index: usize) -> Option<&T> {
        self.raw_at(index)
            .ptr()
            .map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Returns a mutable reference to the element at `index`, or `None` if it is out of bounds.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.raw_at(index)
            .ptr()
            .map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    /// Bounds-checked access to the element at `index`.
    ///
    /// # Errors
    ///
    /// [`ChunkListError::OutOfRange`] if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::{ChunkList, ChunkListError};
    /// let list = ChunkList::<u32, 3>::from_iter(0..5);
    /// assert_eq!(list.at(2), Ok(&2));
    /// assert_eq!(list.at(5), Err(ChunkListError::OutOfRange { index: 5, len: 5 }));
    /// ```
    pub fn at(&self, index: usize) -> Result<&T, ChunkListError> {
        if index >= self.len {
            return Err(ChunkListError::OutOfRange {
                index,
                len: self.len,
            });
        }

        unsafe { (*self.locate(index / N).as_ptr()).at(index % N) }
    }

    /// Mutable version of [`at`](ChunkList::at).
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, ChunkListError> {
        if index >= self.len {
            return Err(ChunkListError::OutOfRange {
                index,
                len: self.len,
            });
        }

        unsafe { (*self.locate(index / N).as_ptr()).at_mut(index % N) }
    }

    /// Returns the first element.
    ///
    /// # Errors
    ///
    /// [`ChunkListError::EmptyContainer`] if the list is empty.
    pub fn front(&self) -> Result<&T, ChunkListError> {
        self.get(0).ok_or(ChunkListError::EmptyContainer)
    }

    /// Mutable version of [`front`](ChunkList::front).
    pub fn front_mut(&mut self) -> Result<&mut T, ChunkListError> {
        self.get_mut(0).ok_or(ChunkListError::EmptyContainer)
    }

    /// Returns the last element.
    ///
    /// # Errors
    ///
    /// [`ChunkListError::EmptyContainer`] if the list is empty.
    pub fn back(&self) -> Result<&T, ChunkListError> {
        let last = match self.back {
            Some(chunk) => unsafe { (*chunk.as_ptr()).as_slice().last() },
            None => None,
        };

        last.ok_or(ChunkListError::EmptyContainer)
    }

    /// Mutable version of [`back`](ChunkList::back).
    pub fn back_mut(&mut self) -> Result<&mut T, ChunkListError> {
        let last = match self.back {
            Some(chunk) => unsafe { (*chunk.as_ptr()).as_mut_slice().last_mut() },
            None => None,
        };

        last.ok_or(ChunkListError::EmptyContainer)
    }

    /// A cursor at the first element, or the end sentinel if the list is empty.
    pub fn begin(&self) -> Cursor<'_, T, N> {
        Cursor::from_raw(self.raw_first())
    }

    /// The end sentinel.
    pub fn end(&self) -> Cursor<'_, T, N> {
        Cursor::from_raw(RawCursor::SENTINEL)
    }

    /// A cursor at `index`, or the end sentinel if `index >= len()`.
    pub fn cursor_at(&self, index: usize) -> Cursor<'_, T, N> {
        Cursor::from_raw(self.raw_at(index))
    }

    /// Mutable version of [`begin`](ChunkList::begin).
    pub fn begin_mut(&mut self) -> CursorMut<'_, T, N> {
        CursorMut::from_raw(self.raw_first())
    }

    /// Mutable version of [`end`](ChunkList::end).
    pub fn end_mut(&mut self) -> CursorMut<'_, T, N> {
        CursorMut::from_raw(RawCursor::SENTINEL)
    }

    /// Mutable version of [`cursor_at`](ChunkList::cursor_at).
    pub fn cursor_at_mut(&mut self, index: usize) -> CursorMut<'_, T, N> {
        CursorMut::from_raw(self.raw_at(index))
    }

    /// Adds an element to the end of the list.
    ///
    /// A chunk is only allocated when the last one is full (and no spare chunk is left over from
    /// earlier pops).
    ///
    /// # Panics
    ///
    /// If the allocator fails to allocate a new chunk.
    /// If you want to recover from that, use [`try_push_back`](ChunkList::try_push_back).
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 3>::new();
    /// (0..5).for_each(|i| list.push_back(i));
    ///
    /// assert_eq!(list.len(), 5);
    /// assert_eq!(list.front(), Ok(&0));
    /// assert_eq!(list.back(), Ok(&4));
    /// ```
    pub fn push_back(&mut self, value: T) {
        self.try_push_back(value).unwrap_or_else(|err| err.raise())
    }

    /// Adds an element to the end of the list, handling memory allocation failure gracefully.
    ///
    /// On failure the list is left untouched and `value` is dropped.
    ///
    /// # Examples
    ///
    /// We generally don't expect allocation to fail:
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 4>::new();
    /// assert!(list.try_push_back(1).is_ok());
    /// ```
    ///
    /// But it might:
    ///
    /// ```
    /// # use std::alloc::Layout;
    /// # use std::ptr::NonNull;
    /// # use allocator_api2::alloc::{Allocator, AllocError};
    /// # use chunk_list::{ChunkList, ChunkListError};
    /// struct DummyAllocator;
    ///
    /// unsafe impl Allocator for DummyAllocator {
    ///     fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
    ///         Err(AllocError)
    ///     }
    ///
    ///     unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {}
    /// }
    ///
    /// let mut list = ChunkList::<u32, 4, _>::new_in(DummyAllocator);
    /// assert!(matches!(
    ///     list.try_push_back(1),
    ///     Err(ChunkListError::AllocationFailure { .. })
    /// ));
    /// assert!(list.is_empty());
    /// ```
    pub fn try_push_back(&mut self, value: T) -> Result<(), ChunkListError> {
        self.push_back_internal(value).map(|_| ())
    }

    /// Appends an element and returns a reference to it.
    pub fn emplace_back(&mut self, value: T) -> &mut T {
        match self.push_back_internal(value) {
            Ok(slot) => unsafe { &mut *slot.as_ptr() },
            Err(err) => err.raise(),
        }
    }

    fn push_back_internal(&mut self, value: T) -> Result<NonNull<T>, ChunkListError> {
        let mut target = self.back_slot()?;
        self.back = Some(target);

        unsafe {
            let chunk = target.as_mut();
            chunk.push(value);
            self.len += 1;
            Ok(chunk.slot(chunk.len() - 1))
        }
    }

    /// Like [`extend`](ChunkList::extend), but with graceful handling of allocation failure.
    ///
    /// If the method fails, the elements taken from the iterator so far stay in the list.
    pub fn try_extend<I: IntoIterator<Item = T>>(
        &mut self,
        iter: I,
    ) -> Result<(), ChunkListError> {
        let mut iter = iter.into_iter();

        let Some(mut next) = iter.next() else { return Ok(()) };

        loop {
            let mut target = self.back_slot()?;
            self.back = Some(target);

            unsafe {
                let chunk = target.as_mut();

                while !chunk.is_full() {
                    chunk.push(next);
                    self.len += 1;

                    next = match iter.next() {
                        Some(next) => next,
                        None => return Ok(()),
                    };
                }
            }
        }
    }

    /// Removes and returns the last element.
    ///
    /// The chunk it came from stays allocated even if it is now empty; see
    /// [`shrink_to_fit`](ChunkList::shrink_to_fit).
    ///
    /// # Errors
    ///
    /// [`ChunkListError::EmptyContainer`] if the list is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::{ChunkList, ChunkListError};
    /// let mut list = ChunkList::<u32, 2>::from_iter([1, 2]);
    ///
    /// assert_eq!(list.pop_back(), Ok(2));
    /// assert_eq!(list.pop_back(), Ok(1));
    /// assert_eq!(list.pop_back(), Err(ChunkListError::EmptyContainer));
    /// ```
    pub fn pop_back(&mut self) -> Result<T, ChunkListError> {
        let mut back = self.back.ok_or(ChunkListError::EmptyContainer)?;

        unsafe {
            let chunk = back.as_mut();
            let value = chunk.pop().unwrap_assume();
            self.len -= 1;

            if chunk.is_empty() {
                self.back = chunk.prev;
            }

            Ok(value)
        }
    }

    unsafe fn pop_without_read(&mut self) {
        let mut back = self.back.unwrap_assume();
        let chunk = back.as_mut();

        chunk.forget_last();
        self.len -= 1;

        if chunk.is_empty() {
            self.back = chunk.prev;
        }
    }

    /// Adds an element to the front of the list.
    ///
    /// This is an insertion at index 0, so every element moves one slot to the right: O(len).
    ///
    /// # Panics
    ///
    /// If the allocator fails to allocate a new chunk.
    pub fn push_front(&mut self, value: T) {
        self.insert(0, value);
    }

    /// Like [`push_front`](ChunkList::push_front), but with graceful handling of allocation
    /// failure.
    pub fn try_push_front(&mut self, value: T) -> Result<(), ChunkListError> {
        self.try_insert(0, value).map(|_| ())
    }

    /// Prepends an element and returns a reference to it.
    pub fn emplace_front(&mut self, value: T) -> &mut T {
        match self.insert(0, value).into_mut() {
            Ok(value) => value,
            Err(err) => err.raise(),
        }
    }

    /// Removes and returns the first element, moving every other element one slot to the left.
    ///
    /// # Errors
    ///
    /// [`ChunkListError::EmptyContainer`] if the list is empty.
    pub fn pop_front(&mut self) -> Result<T, ChunkListError> {
        if self.len == 0 {
            return Err(ChunkListError::EmptyContainer);
        }

        Ok(self.remove(0))
    }

    /// Inserts an element at `index`, shifting every element after it one slot to the right.
    ///
    /// Returns a cursor at the inserted element.
    ///
    /// # Panics
    ///
    /// If `index > len()`, or if the allocator fails.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 2>::from_iter([10, 30]);
    ///
    /// let cursor = list.insert(1, 20);
    /// assert_eq!(cursor.index(), Some(1));
    ///
    /// assert_eq!(list, ChunkList::from_iter([10, 20, 30]));
    /// ```
    pub fn insert(&mut self, index: usize, value: T) -> CursorMut<'_, T, N> {
        self.try_insert(index, value)
            .unwrap_or_else(|err| err.raise())
    }

    /// Like [`insert`](ChunkList::insert), but reporting a bad index or allocation failure as an
    /// error. On failure the list is left untouched.
    pub fn try_insert(
        &mut self,
        index: usize,
        value: T,
    ) -> Result<CursorMut<'_, T, N>, ChunkListError> {
        if index > self.len {
            return Err(ChunkListError::OutOfRange {
                index,
                len: self.len,
            });
        }

        self.push_back_internal(value)?;

        unsafe {
            self.shift_last_to(index);
        }

        Ok(self.cursor_at_mut(index))
    }

    /// Same as [`insert`](ChunkList::insert). Values are always moved into place.
    pub fn emplace(&mut self, index: usize, value: T) -> CursorMut<'_, T, N> {
        self.insert(index, value)
    }

    /// Inserts `count` clones of `value` at `index`.
    ///
    /// Returns a cursor at the first inserted element (or at `index` if `count` is zero).
    ///
    /// # Panics
    ///
    /// If `index > len()`, or if the allocator fails.
    pub fn insert_n(&mut self, index: usize, count: usize, value: T) -> CursorMut<'_, T, N>
    where
        T: Clone,
    {
        self.insert_iter(index, repeat(value).take(count))
    }

    /// Inserts every element of `iter` at `index`, preserving their order.
    ///
    /// Returns a cursor at the first inserted element (or at `index` if nothing was inserted).
    ///
    /// # Panics
    ///
    /// If `index > len()`, or if the allocator fails.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 2>::from_iter([1, 5]);
    /// list.insert_iter(1, [2, 3, 4]);
    /// assert_eq!(list, ChunkList::from_iter(1..=5));
    /// ```
    pub fn insert_iter<I: IntoIterator<Item = T>>(
        &mut self,
        index: usize,
        iter: I,
    ) -> CursorMut<'_, T, N> {
        self.try_insert_iter(index, iter)
            .unwrap_or_else(|err| err.raise())
    }

    /// Like [`insert_iter`](ChunkList::insert_iter), but reporting a bad index or allocation
    /// failure as an error. On failure the list is left as it was and the elements already taken
    /// from the iterator are dropped.
    pub fn try_insert_iter<I: IntoIterator<Item = T>>(
        &mut self,
        index: usize,
        iter: I,
    ) -> Result<CursorMut<'_, T, N>, ChunkListError> {
        if index > self.len {
            return Err(ChunkListError::OutOfRange {
                index,
                len: self.len,
            });
        }

        let old_len = self.len;

        if let Err(err) = self.try_extend(iter) {
            self.truncate(old_len);
            return Err(err);
        }

        let count = self.len - old_len;

        if count > 0 {
            unsafe {
                self.rotate_right(index, count);
            }
        }

        Ok(self.cursor_at_mut(index))
    }

    /// Removes and returns the element at `index`, shifting every element after it one slot to
    /// the left.
    ///
    /// # Panics
    ///
    /// An element must exist at the index.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 2>::from_iter([1, 2, 3]);
    ///
    /// assert_eq!(list.remove(0), 1);
    /// assert_eq!(list.remove(1), 3);
    /// assert_eq!(list.remove(0), 2);
    /// ```
    pub fn remove(&mut self, index: usize) -> T {
        self.try_remove(index).unwrap_or_else(|err| err.raise())
    }

    /// Like [`remove`](ChunkList::remove), but reporting a bad index as an error.
    pub fn try_remove(&mut self, index: usize) -> Result<T, ChunkListError> {
        if index >= self.len {
            return Err(ChunkListError::OutOfRange {
                index,
                len: self.len,
            });
        }

        unsafe {
            let mut dest = self.raw_at(index);
            let result = ptr::read(dest.ptr().unwrap_assume().as_ptr());

            for _ in index + 1..self.len {
                let mut src = dest;
                assume_assert!(src.step_forward().is_ok());

                ptr::copy_nonoverlapping(
                    src.ptr().unwrap_assume().as_ptr(),
                    dest.ptr().unwrap_assume().as_ptr(),
                    1,
                );

                dest = src;
            }

            self.pop_without_read();
            Ok(result)
        }
    }

    /// Removes the element at `index` and returns a cursor at the element that followed it
    /// (the end sentinel if it was the last one).
    ///
    /// # Panics
    ///
    /// An element must exist at the index.
    pub fn erase(&mut self, index: usize) -> CursorMut<'_, T, N> {
        self.try_erase(index).unwrap_or_else(|err| err.raise())
    }

    /// Like [`erase`](ChunkList::erase), but reporting a bad index as an error.
    pub fn try_erase(&mut self, index: usize) -> Result<CursorMut<'_, T, N>, ChunkListError> {
        self.try_remove(index)?;
        Ok(self.cursor_at_mut(index))
    }

    /// Removes the elements in `range` and returns a cursor at the element that followed them
    /// (the end sentinel if the range reached the end).
    ///
    /// # Panics
    ///
    /// If the range is decreasing or extends past the end of the list.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 3>::from_iter(0..10);
    ///
    /// let next = list.erase_range(2..8);
    /// assert_eq!(next.get(), Ok(&8));
    ///
    /// assert_eq!(list, ChunkList::from_iter([0, 1, 8, 9]));
    /// ```
    pub fn erase_range<R: RangeBounds<usize>>(&mut self, range: R) -> CursorMut<'_, T, N> {
        self.try_erase_range(range)
            .unwrap_or_else(|err| err.raise())
    }

    /// Like [`erase_range`](ChunkList::erase_range), but reporting a bad range as an error.
    pub fn try_erase_range<R: RangeBounds<usize>>(
        &mut self,
        range: R,
    ) -> Result<CursorMut<'_, T, N>, ChunkListError> {
        let (start, end) = self.resolve_range(range)?;
        let count = end - start;

        if count > 0 {
            unsafe {
                self.rotate_left(start, count);
            }

            self.truncate(self.len - count);
        }

        Ok(self.cursor_at_mut(start))
    }

    /// Shortens the list to `len` elements, dropping the rest. Does nothing if the list is
    /// already short enough.
    pub fn truncate(&mut self, len: usize) {
        while self.len > len {
            drop(self.pop_back());
        }
    }

    /// Resizes the list to `count` elements, appending clones of `value` when growing.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 2>::from_iter([1, 2, 3]);
    ///
    /// list.resize(5, 0);
    /// assert_eq!(list, ChunkList::from_iter([1, 2, 3, 0, 0]));
    ///
    /// list.resize(2, 0);
    /// assert_eq!(list, ChunkList::from_iter([1, 2]));
    /// ```
    pub fn resize(&mut self, count: usize, value: T)
    where
        T: Clone,
    {
        if count <= self.len {
            self.truncate(count);
        } else {
            let missing = count - self.len;
            self.extend(repeat(value).take(missing));
        }
    }

    /// Resizes the list to `count` elements, appending default values when growing.
    pub fn resize_default(&mut self, count: usize)
    where
        T: Default,
    {
        self.resize_with(count, T::default);
    }

    /// Resizes the list to `count` elements, appending the results of `f` when growing.
    pub fn resize_with<F: FnMut() -> T>(&mut self, count: usize, f: F) {
        if count <= self.len {
            self.truncate(count);
        } else {
            let missing = count - self.len;
            self.extend(repeat_with(f).take(missing));
        }
    }

    /// Replaces the contents with `count` clones of `value`.
    pub fn assign(&mut self, count: usize, value: T)
    where
        T: Clone,
    {
        self.truncate(0);
        self.extend(repeat(value).take(count));
    }

    /// Replaces the contents with the elements of `iter`.
    pub fn assign_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.truncate(0);
        self.extend(iter);
    }

    /// Keeps only the elements for which `f` returns `true`, preserving their order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 3>::from_iter(0..10);
    /// list.retain(|x| x % 3 == 0);
    /// assert_eq!(list, ChunkList::from_iter([0, 3, 6, 9]));
    /// ```
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut f: F) {
        let mut kept = 0;

        unsafe {
            let mut read = self.raw_first();
            let mut write = read;

            for _ in 0..self.len {
                let item = read.ptr().unwrap_assume();

                if f(&*item.as_ptr()) {
                    ptr::swap(write.ptr().unwrap_assume().as_ptr(), item.as_ptr());
                    assume_assert!(write.step_forward().is_ok());
                    kept += 1;
                }

                assume_assert!(read.step_forward().is_ok());
            }
        }

        self.truncate(kept);
    }

    /// Drops every element and releases every chunk.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 8>::from_iter(6..74);
    /// list.clear();
    ///
    /// assert!(list.is_empty());
    /// assert_eq!(list.capacity(), 0);
    /// ```
    pub fn clear(&mut self) {
        let head = self.head.take();

        self.tail = None;
        self.back = None;
        self.len = 0;
        self.chunk_count = 0;

        unsafe {
            Self::release_chain(head, &self.alloc);
        }
    }

    /// Releases the spare chunks left behind the last element by earlier removals.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 4>::from_iter(0..12);
    /// list.truncate(3);
    /// assert_eq!(list.capacity(), 12);
    ///
    /// list.shrink_to_fit();
    /// assert_eq!(list.capacity(), 4);
    /// ```
    pub fn shrink_to_fit(&mut self) {
        let spare = match self.back {
            Some(mut back) => unsafe { back.as_mut().next.take() },
            None => self.head.take(),
        };

        self.tail = self.back;
        self.chunk_count = self.len.div_ceil(N);

        unsafe {
            Self::release_chain(spare, &self.alloc);
        }
    }

    /// Exchanges the contents (and allocators) of two lists without touching any element.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Deep-copies the list into chunks obtained from `alloc`.
    ///
    /// # Panics
    ///
    /// If the allocator fails.
    pub fn clone_in<B: Allocator>(&self, alloc: B) -> ChunkList<T, N, B>
    where
        T: Clone,
    {
        self.try_clone_in(alloc).unwrap_or_else(|err| err.raise())
    }

    /// Like [`clone_in`](ChunkList::clone_in), but with graceful handling of allocation failure.
    ///
    /// The copy is made chunk by chunk, so it has the same chunk layout as the original.
    pub fn try_clone_in<B: Allocator>(
        &self,
        alloc: B,
    ) -> Result<ChunkList<T, N, B>, ChunkListError>
    where
        T: Clone,
    {
        let mut copy = ChunkList::new_in(alloc);

        for chunk in RawChunksIter::new(self) {
            unsafe {
                let cloned = chunk.as_ref().try_clone_in(&copy.alloc)?;
                copy.link_tail(cloned);
                copy.back = Some(cloned);
                copy.len += cloned.as_ref().len();
            }
        }

        Ok(copy)
    }

    /// Moves every element into chunks obtained from `alloc`, releasing the old chunks.
    ///
    /// # Panics
    ///
    /// If the allocator fails.
    pub fn move_in<B: Allocator>(self, alloc: B) -> ChunkList<T, N, B> {
        ChunkList::from_iter_in(self, alloc)
    }

    /// Returns an iterator over the occupied part of each chunk.
    ///
    /// Every slice but the last holds exactly `N` elements, and none is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let list = ChunkList::<u32, 4>::from_iter(0..10);
    ///
    /// let expected: [&[u32]; 3] = [&[0, 1, 2, 3], &[4, 5, 6, 7], &[8, 9]];
    /// assert!(Iterator::eq(list.chunks(), expected));
    /// ```
    pub fn chunks(&self) -> ChunksIter<'_, T, N> {
        ChunksIter::new(self)
    }

    /// Like [`chunks`](ChunkList::chunks), but returning mutable slices.
    pub fn chunks_mut(&mut self) -> ChunksIterMut<'_, T, N> {
        ChunksIterMut::new(self)
    }

    /// Returns an iterator over each element in the list.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let list = ChunkList::<u32, 2>::from_iter([1, 2, 3]);
    /// let mut iter = list.iter();
    ///
    /// assert_eq!(iter.next(), Some(&1));
    /// assert_eq!(iter.next_back(), Some(&3));
    /// assert_eq!(iter.next(), Some(&2));
    /// assert_eq!(iter.next(), None);
    /// ```
    pub fn iter(&self) -> Iter<'_, T, N> {
        Iter::new(self)
    }

    /// Like [`iter`](ChunkList::iter), but returning mutable references.
    pub fn iter_mut(&mut self) -> IterMut<'_, T, N> {
        IterMut::new(self)
    }

    /// Returns the chunk the next pushed element goes into, allocating one if there is no room.
    fn back_slot(&mut self) -> Result<NonNull<Chunk<T, N>>, ChunkListError> {
        let spare = match self.back {
            Some(back) if unsafe { !back.as_ref().is_full() } => return Ok(back),
            Some(back) => unsafe { back.as_ref().next },
            None => self.head,
        };

        match spare {
            Some(chunk) => Ok(chunk),
            None => {
                let chunk = Chunk::new_in(&self.alloc)?;
                unsafe { self.link_tail(chunk) };
                Ok(chunk)
            }
        }
    }

    unsafe fn link_tail(&mut self, mut chunk: NonNull<Chunk<T, N>>) {
        chunk.as_mut().prev = self.tail;

        match self.tail {
            Some(mut tail) => tail.as_mut().next = Some(chunk),
            None => self.head = Some(chunk),
        }

        self.tail = Some(chunk);
        self.chunk_count += 1;
    }

    unsafe fn release_chain(link: Link<T, N>, alloc: &A) {
        /// Keeps releasing the rest of the chain if an element's drop panics.
        struct ReleaseGuard<'r, T, const N: usize, A: Allocator> {
            link: Link<T, N>,
            alloc: &'r A,
        }

        impl<'r, T, const N: usize, A: Allocator> ReleaseGuard<'r, T, N, A> {
            unsafe fn release_all(&mut self) {
                while let Some(chunk) = self.link {
                    self.link = chunk.as_ref().next;
                    Chunk::release_in(chunk, self.alloc);
                }
            }
        }

        impl<'r, T, const N: usize, A: Allocator> Drop for ReleaseGuard<'r, T, N, A> {
            fn drop(&mut self) {
                unsafe { self.release_all() };
            }
        }

        let mut guard = ReleaseGuard { link, alloc };
        guard.release_all();
        mem::forget(guard);
    }

    /// Marks every element as moved out, leaving the chunks allocated.
    ///
    /// # Safety
    ///
    /// Every element must have been read out or dropped already.
    pub(crate) unsafe fn forget_contents(&mut self) {
        let mut link = self.head;

        while let Some(mut chunk) = link {
            chunk.as_mut().forget_all();
            link = chunk.as_ref().next;
        }

        self.len = 0;
        self.back = None;
    }

    /// Finds the chunk at `chunk_index`, walking from whichever end of the chain is closer.
    ///
    /// # Safety
    ///
    /// `chunk_index` must be less than `chunk_count`.
    unsafe fn locate(&self, chunk_index: usize) -> NonNull<Chunk<T, N>> {
        assume_assert!(chunk_index < self.chunk_count);

        if chunk_index < self.chunk_count / 2 {
            let mut chunk = self.head.unwrap_assume();
            for _ in 0..chunk_index {
                chunk = chunk.as_ref().next.unwrap_assume();
            }
            chunk
        } else {
            let mut chunk = self.tail.unwrap_assume();
            for _ in chunk_index + 1..self.chunk_count {
                chunk = chunk.as_ref().prev.unwrap_assume();
            }
            chunk
        }
    }

    pub(crate) fn raw_at(&self, index: usize) -> RawCursor<T, N> {
        if index >= self.len {
            return RawCursor::SENTINEL;
        }

        unsafe { RawCursor::new(self.locate(index / N), index / N, index % N) }
    }

    pub(crate) fn raw_first(&self) -> RawCursor<T, N> {
        match self.head {
            Some(head) if self.len > 0 => unsafe { RawCursor::new(head, 0, 0) },
            _ => RawCursor::SENTINEL,
        }
    }

    pub(crate) fn raw_last(&self) -> RawCursor<T, N> {
        match self.back {
            Some(back) => unsafe {
                RawCursor::new(back, (self.len - 1) / N, back.as_ref().len() - 1)
            },
            None => RawCursor::SENTINEL,
        }
    }

    /// Moves the last element to `index`, shifting `index..len - 1` one slot to the right.
    unsafe fn shift_last_to(&mut self, index: usize) {
        let mut dest = self.raw_last();
        let value = ptr::read(dest.ptr().unwrap_assume().as_ptr());

        for _ in index..self.len - 1 {
            let mut src = dest;
            assume_assert!(src.step_back().is_ok());

            ptr::copy_nonoverlapping(
                src.ptr().unwrap_assume().as_ptr(),
                dest.ptr().unwrap_assume().as_ptr(),
                1,
            );

            dest = src;
        }

        ptr::write(dest.ptr().unwrap_assume().as_ptr(), value);
    }

    /// Rotates `start..len` so that the last `count` elements end up at `start`.
    unsafe fn rotate_right(&mut self, start: usize, count: usize) {
        self.reverse(start, self.len);
        self.reverse(start, start + count);
        self.reverse(start + count, self.len);
    }

    /// Rotates `start..len` so that the `count` elements at `start` end up at the back.
    unsafe fn rotate_left(&mut self, start: usize, count: usize) {
        self.reverse(start, start + count);
        self.reverse(start + count, self.len);
        self.reverse(start, self.len);
    }

    unsafe fn reverse(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }

        let mut front = self.raw_at(start);
        let mut back = self.raw_at(end - 1);

        for _ in 0..(end - start) / 2 {
            ptr::swap(
                front.ptr().unwrap_assume().as_ptr(),
                back.ptr().unwrap_assume().as_ptr(),
            );

            assume_assert!(front.step_forward().is_ok());
            assume_assert!(back.step_back().is_ok());
        }
    }

    fn resolve_range<R: RangeBounds<usize>>(
        &self,
        range: R,
    ) -> Result<(usize, usize), ChunkListError> {
        let out_of_range = |index| ChunkListError::OutOfRange {
            index,
            len: self.len,
        };

        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.checked_add(1).ok_or(out_of_range(start))?,
            Bound::Unbounded => 0,
        };

        let end = match range.end_bound() {
            Bound::Included(&end) => end.checked_add(1).ok_or(out_of_range(end))?,
            Bound::Excluded(&end) => end,
            Bound::Unbounded => self.len,
        };

        if end > self.len {
            return Err(out_of_range(end));
        }

        if start > end {
            return Err(out_of_range(start));
        }

        Ok((start, end))
    }
}

impl<T, const N: usize, A: Allocator> Drop for ChunkList<T, N, A> {
    fn drop(&mut self) {
        unsafe {
            Self::release_chain(self.head, &self.alloc);
        }
    }
}

impl<T, const N: usize, A: Allocator> Extend<T> for ChunkList<T, N, A> {
    /// Extends the list with zero or more elements.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunk_list::ChunkList;
    /// let mut list = ChunkList::<u32, 2>::new();
    /// list.extend(0..5);
    /// assert_eq!(list, ChunkList::from_iter([0, 1, 2, 3, 4]));
    /// ```
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.try_extend(iter).unwrap_or_else(|err| err.raise())
    }
}

impl<'a, T: Copy + 'a, const N: usize, A: Allocator> Extend<&'a T> for ChunkList<T, N, A> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.try_extend(iter.into_iter().copied())
            .unwrap_or_else(|err| err.raise())
    }
}

impl<T, const N: usize> FromIterator<T> for ChunkList<T, N> {
    /// Creates a new list with the elements from an iterator.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<T, const N: usize, const M: usize> From<[T; M]> for ChunkList<T, N> {
    fn from(values: [T; M]) -> Self {
        Self::from_iter(values)
    }
}

impl<T, const N: usize, A: Allocator> IntoIterator for ChunkList<T, N, A> {
    type Item = T;
    type IntoIter = IntoIter<T, N, A>;

    /// Converts the list into an iterator.
    ///
    /// The iterator returns each element by value.
    /// When dropped, the returned iterator drops the rest of the elements.
    fn into_iter(self) -> IntoIter<T, N, A> {
        IntoIter::new(self)
    }
}

impl<'a, T, const N: usize, A: Allocator> IntoIterator for &'a ChunkList<T, N, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, N>;

    fn into_iter(self) -> Iter<'a, T, N> {
        self.iter()
    }
}

impl<'a, T, const N: usize, A: Allocator> IntoIterator for &'a mut ChunkList<T, N, A> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, N>;

    fn into_iter(self) -> IterMut<'a, T, N> {
        self.iter_mut()
    }
}

impl<T, const N: usize, A: Allocator> Index<usize> for ChunkList<T, N, A> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(result) => result,
            None => {
                panic!("index out of bounds (index={}, len={})", index, self.len);
            }
        }
    }
}

impl<T, const N: usize, A: Allocator> IndexMut<usize> for ChunkList<T, N, A> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;

        match self.get_mut(index) {
            Some(result) => result,
            None => {
                panic!("index out of bounds (index={}, len={})", index, len);
            }
        }
    }
}

impl<T: Debug, const N: usize, A: Allocator> Debug for ChunkList<T, N, A> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self).finish()
    }
}

impl<T: Clone, const N: usize, A: Allocator + Clone> Clone for ChunkList<T, N, A> {
    fn clone(&self) -> Self {
        self.clone_in(self.alloc.clone())
    }

    /// Releases the current chunks, then deep-copies `source` into new ones.
    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.extend(source.iter().cloned());
    }
}

impl<T: PartialEq, const N: usize, A: Allocator> PartialEq for ChunkList<T, N, A> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && Iterator::eq(self.iter(), other.iter())
    }
}

impl<T: Eq, const N: usize, A: Allocator> Eq for ChunkList<T, N, A> {}

impl<T: Hash, const N: usize, A: Allocator> Hash for ChunkList<T, N, A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len);

        for value in self.iter() {
            Hash::hash(value, state);
        }
    }
}

impl<T: PartialOrd, const N: usize, A: Allocator> PartialOrd for ChunkList<T, N, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Iterator::partial_cmp(self.iter(), other.iter())
    }
}

impl<T: Ord, const N: usize, A: Allocator> Ord for ChunkList<T, N, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        Iterator::cmp(self.iter(), other.iter())
    }
}

unsafe impl<T: Send, const N: usize, A: Allocator + Send> Send for ChunkList<T, N, A> {}

unsafe impl<T: Sync, const N: usize, A: Allocator + Sync> Sync for ChunkList<T, N, A> {}

/// Exchanges the contents of two lists. See [`ChunkList::swap`].
pub fn swap<T, const N: usize, A: Allocator>(
    a: &mut ChunkList<T, N, A>,
    b: &mut ChunkList<T, N, A>,
) {
    a.swap(b);
}

/// Removes every element equal to `value`, returning how many were removed.
///
/// # Examples
///
/// ```
/// # use chunk_list::ChunkList;
/// let mut list = ChunkList::<u32, 2>::from_iter([1, 2, 1, 3, 1]);
/// assert_eq!(chunk_list::erase(&mut list, &1), 3);
/// assert_eq!(list, ChunkList::from_iter([2, 3]));
/// ```
pub fn erase<T: PartialEq, const N: usize, A: Allocator>(
    list: &mut ChunkList<T, N, A>,
    value: &T,
) -> usize {
    erase_if(list, |x| x == value)
}

/// Removes every element matching `pred`, returning how many were removed.
pub fn erase_if<T, const N: usize, A: Allocator, F: FnMut(&T) -> bool>(
    list: &mut ChunkList<T, N, A>,
    mut pred: F,
) -> usize {
    let before = list.len();
    list.retain(|x| !pred(x));
    before - list.len()
}
