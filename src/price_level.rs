//! Price level - a FIFO queue of orders at a single tick.
//!
//! Implements a doubly-linked list over arena handles for O(1) append,
//! O(1) detach from any position and O(1) in-place quantity reduction.
//! `total_qty` is kept equal to the sum of the queued nodes' open
//! quantities at every observable moment.

use crate::arena::{NodeArena, NodeHandle, NULL_HANDLE};
use crate::types::Quantity;

/// A queue of orders at a specific price level.
///
/// Orders are matched head first (price-time priority); the doubly-linked
/// structure makes cancel from any position O(1).
#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    /// Oldest order (first to match).
    pub head: NodeHandle,
    /// Newest order (last to match).
    pub tail: NodeHandle,
    /// Sum of open quantities across the queue.
    pub total_qty: Quantity,
    /// Number of resting orders.
    pub count: u32,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceLevel {
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: NULL_HANDLE,
            tail: NULL_HANDLE,
            total_qty: 0,
            count: 0,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.head == NULL_HANDLE
    }

    /// Append an order at the tail (lowest priority).
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn enqueue(&mut self, arena: &mut NodeArena, handle: NodeHandle) {
        let qty = arena.get(handle).qty;

        if self.tail == NULL_HANDLE {
            debug_assert!(self.head == NULL_HANDLE);
            let node = arena.get_mut(handle);
            node.prev = NULL_HANDLE;
            node.next = NULL_HANDLE;
            self.head = handle;
            self.tail = handle;
        } else {
            let tail = self.tail;
            arena.get_mut(tail).next = handle;
            let node = arena.get_mut(handle);
            node.prev = tail;
            node.next = NULL_HANDLE;
            self.tail = handle;
        }

        self.count += 1;
        self.total_qty += qty;
    }

    /// Detach an order from anywhere in the queue.
    ///
    /// Handles head, tail, middle and only-node cases. The node is NOT
    /// released back to the arena; the caller owns that.
    ///
    /// # Returns
    /// `true` if the level is now empty.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn erase(&mut self, arena: &mut NodeArena, handle: NodeHandle) -> bool {
        let node = arena.get(handle);
        let prev = node.prev;
        let next = node.next;
        let qty = node.qty;

        if prev == NULL_HANDLE {
            debug_assert!(self.head == handle);
            self.head = next;
        } else {
            arena.get_mut(prev).next = next;
        }

        if next == NULL_HANDLE {
            debug_assert!(self.tail == handle);
            self.tail = prev;
        } else {
            arena.get_mut(next).prev = prev;
        }

        let node = arena.get_mut(handle);
        node.prev = NULL_HANDLE;
        node.next = NULL_HANDLE;

        self.count -= 1;
        self.total_qty -= qty;
        self.count == 0
    }

    /// Shrink a queued order in place. FIFO position is untouched.
    ///
    /// `reduction` must not exceed the node's open quantity.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn reduce_qty(&mut self, arena: &mut NodeArena, handle: NodeHandle, reduction: Quantity) {
        let node = arena.get_mut(handle);
        debug_assert!(reduction <= node.qty, "reduction exceeds open quantity");
        node.qty -= reduction;
        self.total_qty -= reduction;
    }

    /// Handle of the head order, or `NULL_HANDLE` when empty.
    #[inline]
    pub const fn peek_head(&self) -> NodeHandle {
        self.head
    }
}
