//! Node arena - O(1) slab allocator for order nodes.
//!
//! Nodes are drawn from fixed-size slabs that grow on demand and never
//! shrink or move, so a handle stays valid for the resting lifetime of its
//! order. A freed node is pushed onto an intrusive free list threaded
//! through the `next` link; the next allocation pops it.

use crate::types::{flags, OrderId, Quantity, Tick, Timestamp, UserId};

/// Sentinel value representing a null/invalid handle (like nullptr)
pub const NULL_HANDLE: u32 = u32::MAX;

/// Stable index of a node inside the arena - our "compressed pointer".
/// 32 bits halves link metadata versus raw pointers.
pub type NodeHandle = u32;

/// Nodes per slab. Handle layout is `slab << SLAB_SHIFT | slot`.
const SLAB_SHIFT: u32 = 16;
const SLAB_CAP: usize = 1 << SLAB_SHIFT;
const SLOT_MASK: u32 = (SLAB_CAP - 1) as u32;

/// A resting order: open quantity plus the intrusive FIFO links.
///
/// `display_qty` / `hidden_qty` carry the iceberg split, `expiry_ts` the
/// good-till-date deadline and `stop_price` the stop trigger. The matching
/// loop itself only reads `id`, `user` and `qty`; the rest is owned by the
/// surrounding loop.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct OrderNode {
    pub id: OrderId,
    /// Remaining open quantity.
    pub qty: Quantity,
    /// Receive timestamp; non-decreasing along any FIFO.
    pub ts: Timestamp,
    /// Iceberg visible slice.
    pub display_qty: Quantity,
    /// Iceberg hidden reserve.
    pub hidden_qty: Quantity,
    /// Good-till-date expiry (0 = none).
    pub expiry_ts: Timestamp,
    /// Stop trigger tick (0 = none).
    pub stop_price: Tick,
    pub user: UserId,
    pub flags: u32,
    /// Handle of the previous order at the same price level.
    pub prev: NodeHandle,
    /// Handle of the next order at the same price level.
    pub next: NodeHandle,
}

const _: () = assert!(
    std::mem::size_of::<OrderNode>() == 72,
    "OrderNode layout changed"
);

impl OrderNode {
    /// Create an empty/unlinked node (free-list state).
    #[inline]
    pub const fn empty() -> Self {
        Self {
            id: 0,
            qty: 0,
            ts: 0,
            display_qty: 0,
            hidden_qty: 0,
            expiry_ts: 0,
            stop_price: 0,
            user: 0,
            flags: 0,
            prev: NULL_HANDLE,
            next: NULL_HANDLE,
        }
    }

    /// Reset the node for reuse (when returning to the free list).
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    #[inline]
    pub fn is_iceberg(&self) -> bool {
        self.flags & flags::ICEBERG != 0
    }

    /// Refill the visible quantity from the hidden reserve.
    ///
    /// Returns the replenished amount (zero when the reserve or the display
    /// size is exhausted). Scheduling the refill is the host loop's job.
    pub fn replenish(&mut self) -> Quantity {
        if self.hidden_qty > 0 && self.display_qty > 0 {
            let r = self.hidden_qty.min(self.display_qty);
            self.qty = r;
            self.hidden_qty -= r;
            r
        } else {
            0
        }
    }
}

impl std::fmt::Debug for OrderNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderNode")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("qty", &self.qty)
            .field("ts", &self.ts)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Grow-only slab pool with O(1) allocation and release.
///
/// Slab memory is never returned to the OS while the arena lives, so node
/// addresses are stable. The allocator fails only when the process itself
/// is out of memory.
pub struct NodeArena {
    slabs: Vec<Box<[OrderNode]>>,
    /// Head of the free list (NULL_HANDLE when a new slab is needed).
    free_head: NodeHandle,
    in_use: u32,
    capacity: u32,
}

impl NodeArena {
    /// Create an arena pre-sized with `initial_slabs` slabs.
    pub fn new(initial_slabs: usize) -> Self {
        let mut arena = Self {
            slabs: Vec::new(),
            free_head: NULL_HANDLE,
            in_use: 0,
            capacity: 0,
        };
        for _ in 0..initial_slabs.max(1) {
            arena.add_slab();
        }
        arena
    }

    fn add_slab(&mut self) {
        let slab_idx = self.slabs.len() as u32;
        assert!(
            slab_idx < (NULL_HANDLE >> SLAB_SHIFT),
            "node arena handle space exhausted"
        );

        let mut slab = vec![OrderNode::empty(); SLAB_CAP].into_boxed_slice();

        // Thread the new slab onto the free list back to front so the
        // first allocation takes the lowest handle.
        let base = slab_idx << SLAB_SHIFT;
        let mut next = self.free_head;
        for slot in (0..SLAB_CAP).rev() {
            slab[slot].next = next;
            next = base | slot as u32;
        }
        self.free_head = next;

        self.slabs.push(slab);
        self.capacity += SLAB_CAP as u32;
    }

    /// Allocate a node, growing by one slab when the free list is empty.
    ///
    /// # Complexity
    /// O(1) amortized - pops from head of free list.
    #[inline]
    pub fn alloc(&mut self) -> NodeHandle {
        if self.free_head == NULL_HANDLE {
            self.add_slab();
        }
        let handle = self.free_head;
        let node = self.node_mut(handle);
        let next_free = node.next;
        node.next = NULL_HANDLE;
        node.prev = NULL_HANDLE;
        self.free_head = next_free;
        self.in_use += 1;
        handle
    }

    /// Return a node to the free list.
    ///
    /// The caller must ensure the handle was allocated and not yet freed.
    ///
    /// # Complexity
    /// O(1) - pushes to head of free list.
    #[inline]
    pub fn free(&mut self, handle: NodeHandle) {
        debug_assert!(self.in_use > 0, "free on empty arena");
        let free_head = self.free_head;
        let node = self.node_mut(handle);
        node.reset();
        node.next = free_head;
        self.free_head = handle;
        self.in_use -= 1;
    }

    /// # Complexity
    /// O(1) - two-level index.
    #[inline]
    pub fn get(&self, handle: NodeHandle) -> &OrderNode {
        debug_assert!(handle != NULL_HANDLE, "deref of null handle");
        &self.slabs[(handle >> SLAB_SHIFT) as usize][(handle & SLOT_MASK) as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, handle: NodeHandle) -> &mut OrderNode {
        debug_assert!(handle != NULL_HANDLE, "deref of null handle");
        self.node_mut(handle)
    }

    #[inline]
    fn node_mut(&mut self, handle: NodeHandle) -> &mut OrderNode {
        &mut self.slabs[(handle >> SLAB_SHIFT) as usize][(handle & SLOT_MASK) as usize]
    }

    /// Number of currently allocated nodes.
    #[inline]
    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    /// Total node capacity across all slabs.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Pre-fault every slab page so the hot path never takes a page fault.
    pub fn warm_up(&mut self) {
        for slab in &mut self.slabs {
            for node in slab.iter_mut() {
                unsafe {
                    std::ptr::write_volatile(&mut node.stop_price, 0);
                }
            }
        }
    }
}

impl std::fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeArena")
            .field("capacity", &self.capacity)
            .field("in_use", &self.in_use)
            .field("slabs", &self.slabs.len())
            .finish()
    }
}
