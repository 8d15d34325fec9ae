//! Allocators used by the unit tests.

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;
use std::rc::Rc;

use allocator_api2::alloc::{AllocError, Allocator, Global};

#[derive(Default)]
struct Counters {
    live: Cell<usize>,
    total: Cell<usize>,
    budget: Cell<Option<usize>>,
}

/// Forwards to [`Global`] while counting allocations, optionally refusing requests once a budget
/// of successful allocations is spent.
///
/// Clones share their counters, so a list and its clones can be checked together.
#[derive(Clone, Default)]
pub(crate) struct TrackingAllocator {
    counters: Rc<Counters>,
}

impl TrackingAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_after(successes: usize) -> Self {
        let alloc = Self::new();
        alloc.counters.budget.set(Some(successes));
        alloc
    }

    pub(crate) fn set_budget(&self, successes: Option<usize>) {
        self.counters.budget.set(successes);
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.counters.live.get()
    }

    pub(crate) fn total_allocations(&self) -> usize {
        self.counters.total.get()
    }
}

unsafe impl Allocator for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        match self.counters.budget.get() {
            Some(0) => return Err(AllocError),
            Some(n) => self.counters.budget.set(Some(n - 1)),
            None => {}
        }

        let allocation = Global.allocate(layout)?;
        self.counters.live.set(self.counters.live.get() + 1);
        self.counters.total.set(self.counters.total.get() + 1);
        Ok(allocation)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.counters.live.set(self.counters.live.get() - 1);
        Global.deallocate(ptr, layout);
    }
}
