use core::cmp::Ordering;
use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::ops::{Add, AddAssign, Sub, SubAssign};
use core::ptr::NonNull;

use crate::chunk::{Chunk, Link};
use crate::ChunkListError;

/// A `(chunk, offset)` position, or the sentinel when `chunk` is `None`.
///
/// `chunk_index` is the chunk's distance from the head of the chain, so the logical index of the
/// referenced element is `chunk_index * N + offset`. That only holds because every chunk before
/// the last occupied one is full.
pub(crate) struct RawCursor<T, const N: usize> {
    chunk: Link<T, N>,
    chunk_index: usize,
    offset: usize,
}

impl<T, const N: usize> Clone for RawCursor<T, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const N: usize> Copy for RawCursor<T, N> {}

unsafe impl<T, const N: usize> Sync for RawCursor<T, N> {}

unsafe impl<T, const N: usize> Send for RawCursor<T, N> {}

impl<T, const N: usize> RawCursor<T, N> {
    pub(crate) const SENTINEL: Self = Self {
        chunk: None,
        chunk_index: 0,
        offset: 0,
    };

    /// # Safety
    ///
    /// `offset` must be an occupied slot of `chunk`, which must be the chunk at `chunk_index`.
    pub(crate) unsafe fn new(
        chunk: NonNull<Chunk<T, N>>,
        chunk_index: usize,
        offset: usize,
    ) -> Self {
        debug_assert!(offset < chunk.as_ref().len());

        Self {
            chunk: Some(chunk),
            chunk_index,
            offset,
        }
    }

    pub(crate) fn is_sentinel(&self) -> bool {
        self.chunk.is_none()
    }

    pub(crate) fn position(&self) -> Option<usize> {
        self.chunk.map(|_| self.chunk_index * N + self.offset)
    }

    pub(crate) fn ptr(&self) -> Option<NonNull<T>> {
        self.chunk.map(|chunk| unsafe { chunk.as_ref().slot(self.offset) })
    }

    /// Moves one element forward, crossing into the next chunk at the end of the current one.
    /// Running off the last element yields the sentinel.
    ///
    /// # Safety
    ///
    /// The chain the cursor points into must be alive and unmodified since the cursor was made.
    pub(crate) unsafe fn step_forward(&mut self) -> Result<(), ChunkListError> {
        self.advance(1)
    }

    /// Mirror of [`step_forward`](RawCursor::step_forward). Stepping back from the first element
    /// yields the sentinel.
    ///
    /// # Safety
    ///
    /// See [`step_forward`](RawCursor::step_forward).
    pub(crate) unsafe fn step_back(&mut self) -> Result<(), ChunkListError> {
        self.retreat(1)
    }

    /// Same result as `n` calls to [`step_forward`](RawCursor::step_forward), but hops whole
    /// chunks at a time.
    ///
    /// # Safety
    ///
    /// See [`step_forward`](RawCursor::step_forward).
    pub(crate) unsafe fn advance(&mut self, mut n: usize) -> Result<(), ChunkListError> {
        let mut chunk = self.chunk.ok_or(ChunkListError::IteratorMisuse)?;

        loop {
            let left_in_chunk = chunk.as_ref().len() - 1 - self.offset;

            if n <= left_in_chunk {
                self.offset += n;
                self.chunk = Some(chunk);
                return Ok(());
            }

            n -= left_in_chunk + 1;

            match chunk.as_ref().next {
                Some(next) if !next.as_ref().is_empty() => {
                    chunk = next;
                    self.chunk_index += 1;
                    self.offset = 0;
                }
                _ => {
                    *self = Self::SENTINEL;
                    return Ok(());
                }
            }
        }
    }

    /// Same result as `n` calls to [`step_back`](RawCursor::step_back).
    ///
    /// # Safety
    ///
    /// See [`step_forward`](RawCursor::step_forward).
    pub(crate) unsafe fn retreat(&mut self, mut n: usize) -> Result<(), ChunkListError> {
        let mut chunk = self.chunk.ok_or(ChunkListError::IteratorMisuse)?;

        loop {
            if n <= self.offset {
                self.offset -= n;
                self.chunk = Some(chunk);
                return Ok(());
            }

            n -= self.offset + 1;

            match chunk.as_ref().prev {
                Some(prev) if !prev.as_ref().is_empty() => {
                    chunk = prev;
                    self.chunk_index -= 1;
                    self.offset = prev.as_ref().len() - 1;
                }
                _ => {
                    *self = Self::SENTINEL;
                    return Ok(());
                }
            }
        }
    }

    fn same_element(&self, other: &Self) -> bool {
        self.chunk == other.chunk && self.offset == other.offset
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        if self.same_element(other) {
            return Some(Ordering::Equal);
        }

        let lhs = self.position().unwrap_or(usize::MAX);
        let rhs = other.position().unwrap_or(usize::MAX);

        match lhs.cmp(&rhs) {
            // Same logical index but different elements: the cursors belong to different lists.
            Ordering::Equal => None,
            ordering => Some(ordering),
        }
    }
}

macro_rules! impl_cursor_common {
    ($name:ident) => {
        impl<'a, T, const N: usize> $name<'a, T, N> {
            pub(crate) fn from_raw(raw: RawCursor<T, N>) -> Self {
                Self {
                    raw,
                    _marker: PhantomData,
                }
            }

            /// Logical index of the referenced element, or `None` at the end sentinel.
            pub fn index(&self) -> Option<usize> {
                self.raw.position()
            }

            /// Returns `true` if the cursor is the past-the-end sentinel.
            pub fn is_end(&self) -> bool {
                self.raw.is_sentinel()
            }

            /// Returns a reference to the element under the cursor.
            ///
            /// Fails with [`ChunkListError::IteratorMisuse`] at the end sentinel.
            pub fn get(&self) -> Result<&T, ChunkListError> {
                match self.raw.ptr() {
                    Some(ptr) => unsafe { Ok(&*ptr.as_ptr()) },
                    None => Err(ChunkListError::IteratorMisuse),
                }
            }

            /// Returns a reference to the element `n` positions after the cursor, without moving
            /// it. `peek(0)` is the same as [`get`](Self::get).
            ///
            /// Fails with [`ChunkListError::IteratorMisuse`] if the cursor is the end sentinel or
            /// the position lies past the last element.
            pub fn peek(&self, n: usize) -> Result<&T, ChunkListError> {
                let mut raw = self.raw;
                unsafe { raw.advance(n)? };

                match raw.ptr() {
                    Some(ptr) => unsafe { Ok(&*ptr.as_ptr()) },
                    None => Err(ChunkListError::IteratorMisuse),
                }
            }

            /// Moves to the next element, crossing chunk boundaries. Moving past the last element
            /// turns the cursor into the end sentinel.
            pub fn move_next(&mut self) -> Result<(), ChunkListError> {
                unsafe { self.raw.step_forward() }
            }

            /// Moves to the previous element. Moving before the first element turns the cursor
            /// into the end sentinel.
            pub fn move_prev(&mut self) -> Result<(), ChunkListError> {
                unsafe { self.raw.step_back() }
            }

            /// Moves `n` elements forward, as if by `n` calls to [`move_next`](Self::move_next).
            pub fn try_advance(&mut self, n: usize) -> Result<(), ChunkListError> {
                unsafe { self.raw.advance(n) }
            }

            /// Moves `n` elements back, as if by `n` calls to [`move_prev`](Self::move_prev).
            pub fn try_retreat(&mut self, n: usize) -> Result<(), ChunkListError> {
                unsafe { self.raw.retreat(n) }
            }
        }

        impl<'a, T, const N: usize> PartialEq for $name<'a, T, N> {
            /// Cursors are equal when they reference the same element, or are both the sentinel.
            fn eq(&self, other: &Self) -> bool {
                self.raw.same_element(&other.raw)
            }
        }

        impl<'a, T, const N: usize> Eq for $name<'a, T, N> {}

        impl<'a, T, const N: usize> PartialOrd for $name<'a, T, N> {
            /// Orders by logical index; the sentinel comes after every element.
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                self.raw.compare(&other.raw)
            }
        }

        impl<'a, T, const N: usize> AddAssign<usize> for $name<'a, T, N> {
            #[track_caller]
            fn add_assign(&mut self, n: usize) {
                self.try_advance(n).unwrap_or_else(|err| err.raise())
            }
        }

        impl<'a, T, const N: usize> SubAssign<usize> for $name<'a, T, N> {
            #[track_caller]
            fn sub_assign(&mut self, n: usize) {
                self.try_retreat(n).unwrap_or_else(|err| err.raise())
            }
        }

        impl<'a, T, const N: usize> Add<usize> for $name<'a, T, N> {
            type Output = Self;

            #[track_caller]
            fn add(mut self, n: usize) -> Self {
                self += n;
                self
            }
        }

        impl<'a, T, const N: usize> Sub<usize> for $name<'a, T, N> {
            type Output = Self;

            #[track_caller]
            fn sub(mut self, n: usize) -> Self {
                self -= n;
                self
            }
        }

        impl<'a, T: Debug, const N: usize> Debug for $name<'a, T, N> {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("index", &self.index())
                    .field("value", &self.get().ok())
                    .finish()
            }
        }
    };
}

/// A read-only cursor over a [`ChunkList`](crate::ChunkList).
///
/// Unlike an [`Iter`](crate::Iter), a cursor can move in both directions and jump by arbitrary
/// offsets, and it remembers where it is: two cursors compare equal only when they reference the
/// same element, and order by logical index. Once a cursor runs off either end of the list it
/// becomes the end sentinel, which can be compared but not dereferenced or moved.
///
/// # Examples
///
/// ```
/// # use chunk_list::ChunkList;
/// let list = ChunkList::<u32, 4>::from_iter(0..10);
///
/// let mut cursor = list.begin();
/// cursor += 5; // crosses into the second chunk
/// assert_eq!(cursor.get(), Ok(&5));
/// assert!(cursor > list.begin());
///
/// cursor += 5;
/// assert_eq!(cursor, list.end());
/// ```
pub struct Cursor<'a, T, const N: usize> {
    raw: RawCursor<T, N>,
    _marker: PhantomData<&'a T>,
}

impl_cursor_common!(Cursor);

impl<'a, T, const N: usize> Cursor<'a, T, N> {
    /// Like [`get`](Cursor::get), but the reference lives as long as the list borrow.
    pub fn into_ref(self) -> Result<&'a T, ChunkListError> {
        match self.raw.ptr() {
            Some(ptr) => unsafe { Ok(&*ptr.as_ptr()) },
            None => Err(ChunkListError::IteratorMisuse),
        }
    }
}

impl<'a, T, const N: usize> Clone for Cursor<'a, T, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T, const N: usize> Copy for Cursor<'a, T, N> {}

/// A cursor with write access to the element it points at.
///
/// It has the same movement, comparison and sentinel rules as [`Cursor`], but holds the list
/// borrowed mutably, so there is only ever one.
///
/// # Examples
///
/// ```
/// # use chunk_list::ChunkList;
/// let mut list = ChunkList::<u32, 2>::from_iter([1, 2, 3]);
///
/// let mut cursor = list.begin_mut();
/// while let Ok(value) = cursor.get_mut() {
///     *value *= 10;
///     cursor.move_next().unwrap();
/// }
///
/// assert_eq!(list, ChunkList::from_iter([10, 20, 30]));
/// ```
pub struct CursorMut<'a, T, const N: usize> {
    raw: RawCursor<T, N>,
    _marker: PhantomData<&'a mut T>,
}

impl_cursor_common!(CursorMut);

impl<'a, T, const N: usize> CursorMut<'a, T, N> {
    /// Returns a mutable reference to the element under the cursor.
    ///
    /// Fails with [`ChunkListError::IteratorMisuse`] at the end sentinel.
    pub fn get_mut(&mut self) -> Result<&mut T, ChunkListError> {
        match self.raw.ptr() {
            Some(ptr) => unsafe { Ok(&mut *ptr.as_ptr()) },
            None => Err(ChunkListError::IteratorMisuse),
        }
    }

    /// Like [`get_mut`](CursorMut::get_mut), but consumes the cursor so the reference lives as
    /// long as the list borrow.
    pub fn into_mut(self) -> Result<&'a mut T, ChunkListError> {
        match self.raw.ptr() {
            Some(ptr) => unsafe { Ok(&mut *ptr.as_ptr()) },
            None => Err(ChunkListError::IteratorMisuse),
        }
    }

    /// A read-only cursor at the same position, borrowing from this one.
    pub fn as_cursor(&self) -> Cursor<'_, T, N> {
        Cursor::from_raw(self.raw)
    }
}

#[cfg(test)]
mod test {
    use crate::{ChunkList, ChunkListError};

    fn list<const N: usize>(len: u32) -> ChunkList<u32, N> {
        ChunkList::from_iter(0..len)
    }

    #[test]
    fn begin_equals_end_iff_empty() {
        let empty = list::<4>(0);
        assert_eq!(empty.begin(), empty.end());

        let one = list::<4>(1);
        assert_ne!(one.begin(), one.end());
    }

    #[test]
    fn forward_walk_crosses_chunks() {
        for len in [0, 1, 2, 3, 4, 7, 8, 9, 24] {
            let list = list::<3>(len);
            let mut cursor = list.begin();
            let mut seen = alloc::vec::Vec::new();

            while let Ok(value) = cursor.get() {
                seen.push(*value);
                cursor.move_next().unwrap();
            }

            assert!(Iterator::eq(seen.into_iter(), 0..len));
            assert!(cursor.is_end());
        }
    }

    #[test]
    fn backward_walk_crosses_chunks() {
        let list = list::<3>(10);
        let mut cursor = list.cursor_at(9);
        let mut seen = alloc::vec::Vec::new();

        while let Ok(value) = cursor.get() {
            seen.push(*value);
            cursor.move_prev().unwrap();
        }

        assert!(Iterator::eq(seen.into_iter(), (0..10).rev()));
        assert!(cursor.is_end());
    }

    #[test]
    fn jumps_match_repeated_steps() {
        let list = list::<4>(23);

        for start in 0..23 {
            for n in 0..30 {
                let mut stepped = list.cursor_at(start);
                for _ in 0..n {
                    if stepped.is_end() {
                        break;
                    }
                    stepped.move_next().unwrap();
                }

                assert_eq!(list.cursor_at(start) + n, stepped);

                let mut stepped = list.cursor_at(start);
                for _ in 0..n {
                    if stepped.is_end() {
                        break;
                    }
                    stepped.move_prev().unwrap();
                }

                assert_eq!(list.cursor_at(start) - n, stepped);
            }
        }
    }

    #[test]
    fn index_tracks_global_position() {
        let list = list::<3>(11);
        let mut cursor = list.begin();

        for i in 0..11 {
            assert_eq!(cursor.index(), Some(i));
            assert_eq!(cursor.get(), Ok(&(i as u32)));
            cursor += 1;
        }

        assert_eq!(cursor.index(), None);
    }

    #[test]
    fn identity_equality_across_chunks() {
        let list = list::<4>(12);

        // Same in-chunk offset, different chunks.
        let a = list.cursor_at(1);
        let b = list.cursor_at(5);
        assert_ne!(a, b);
        assert_eq!(a + 4, b);
    }

    #[test]
    fn ordering_uses_global_position() {
        let list = list::<4>(12);

        let early = list.cursor_at(3);
        let late = list.cursor_at(4);
        assert!(early < late);
        assert!(late > early);
        assert!(late >= list.cursor_at(4));
        assert!(list.end() > late);
    }

    #[test]
    fn cursors_from_different_lists_are_unordered() {
        let a = list::<4>(4);
        let b = list::<4>(4);

        assert_ne!(a.begin(), b.begin());
        assert_eq!(a.begin().partial_cmp(&b.begin()), None);
        assert!(a.begin() < b.cursor_at(1));
    }

    #[test]
    fn advance_scenario() {
        let list = list::<8>(10);

        let mut first = list.begin();
        let mut second = list.begin();
        assert!(first == second);
        assert!(first >= second);

        second += 1;
        assert!(second > first);

        first += 2;
        second -= 1;
        assert!(first > second);
    }

    #[test]
    fn sentinel_misuse() {
        let list = list::<4>(3);
        let mut end = list.end();

        assert_eq!(end.get(), Err(ChunkListError::IteratorMisuse));
        assert_eq!(end.move_next(), Err(ChunkListError::IteratorMisuse));
        assert_eq!(end.move_prev(), Err(ChunkListError::IteratorMisuse));
        assert_eq!(end.try_advance(2), Err(ChunkListError::IteratorMisuse));
        assert_eq!(end.try_retreat(2), Err(ChunkListError::IteratorMisuse));
    }

    #[test]
    #[should_panic]
    fn advancing_sentinel_panics() {
        let list = list::<4>(3);
        let _ = list.end() + 1;
    }

    #[test]
    fn stepping_back_from_begin_is_sentinel() {
        let list = list::<4>(3);
        assert!((list.begin() - 1).is_end());
    }

    #[test]
    fn cursor_mut_writes_through() {
        let mut list = list::<3>(7);

        {
            let mut cursor = list.cursor_at_mut(2);
            *cursor.get_mut().unwrap() = 100;
            cursor += 3;
            *cursor.get_mut().unwrap() = 500;
            assert_eq!(cursor.as_cursor().index(), Some(5));
        }

        assert_eq!(list, ChunkList::from_iter([0, 1, 100, 3, 4, 500, 6]));
    }

    #[test]
    fn peek_looks_ahead_across_chunks() {
        let mut list = list::<3>(8);

        let cursor = list.cursor_at(1);
        assert_eq!(cursor.peek(0), Ok(&1));
        assert_eq!(cursor.peek(2), Ok(&3));
        assert_eq!(cursor.peek(6), Ok(&7));
        assert_eq!(cursor.peek(7), Err(ChunkListError::IteratorMisuse));
        assert_eq!(cursor.index(), Some(1));

        assert_eq!(list.end().peek(0), Err(ChunkListError::IteratorMisuse));

        let cursor = list.cursor_at_mut(4);
        assert_eq!(cursor.peek(3), Ok(&7));
    }

    #[test]
    fn into_ref_outlives_cursor() {
        let list = list::<2>(5);
        let value = (list.begin() + 3).into_ref().unwrap();
        assert_eq!(*value, 3);
    }
}
