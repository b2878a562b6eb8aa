//! Per-symbol engine loop.
//!
//! One engine owns one book and runs on one thread: it pops commands from
//! its input ring, commits every state change for command N before reading
//! command N+1, and pushes the resulting events into its output ring in
//! emission order. Good-till-date expiry lives here, not in the book: the
//! loop synthesizes cancels for expired resting orders before each command
//! is processed.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, trace, warn};

use crate::book::{EventSink, OrderBook};
use crate::command::{AnyEvent, BookUpdate, CommandType, OrderCommand, TradeEvent};
use crate::ladder::Ladder;
use crate::spsc::SpscRing;
use crate::types::{OrderId, TimeInForce, Timestamp};

/// Sink that forwards events into the output ring, spinning while the
/// publisher lags. Ordering is preserved: a command's trades are pushed
/// before its book update, and nothing of command N+1 precedes them.
pub struct RingSink {
    ring: Arc<SpscRing<AnyEvent>>,
}

impl RingSink {
    pub fn new(ring: Arc<SpscRing<AnyEvent>>) -> Self {
        Self { ring }
    }
}

impl EventSink for RingSink {
    #[inline]
    fn on_trade(&mut self, trade: TradeEvent) {
        while !self.ring.push(AnyEvent::Trade(trade)) {
            SpscRing::<AnyEvent>::pause();
        }
    }

    #[inline]
    fn on_book_update(&mut self, update: BookUpdate) {
        while !self.ring.push(AnyEvent::Book(update)) {
            SpscRing::<AnyEvent>::pause();
        }
    }
}

pub struct SymbolEngine<L: Ladder> {
    book: OrderBook<L, RingSink>,
    input: Arc<SpscRing<OrderCommand>>,
    stop: Arc<AtomicBool>,
    /// Pending good-till-date deadlines, earliest first. Entries may be
    /// stale (order already gone); the synthesized cancel is then a no-op.
    expiries: BinaryHeap<Reverse<(Timestamp, OrderId)>>,
}

impl<L: Ladder> SymbolEngine<L> {
    pub fn new(
        book: OrderBook<L, RingSink>,
        input: Arc<SpscRing<OrderCommand>>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            book,
            input,
            stop,
            expiries: BinaryHeap::new(),
        }
    }

    /// Process commands until the stop flag is raised and the input ring
    /// has drained. Returns the number of commands processed.
    pub fn run(&mut self) -> u64 {
        let symbol = self.book.symbol();
        info!(symbol, "engine started");
        self.book.warm_up();

        let mut processed = 0u64;
        loop {
            match self.input.pop() {
                Some(cmd) => {
                    self.sweep_expired(cmd.recv_ts);
                    self.dispatch(&cmd);
                    processed += 1;
                }
                None => {
                    if self.stop.load(Ordering::Acquire) && self.input.is_empty() {
                        break;
                    }
                    SpscRing::<OrderCommand>::pause();
                }
            }
        }

        info!(symbol, processed, resting = self.book.order_count(), "engine finished");
        processed
    }

    /// Apply one command. Malformed records are dropped (the feed reader
    /// filters them too; this guards direct callers).
    pub fn dispatch(&mut self, cmd: &OrderCommand) {
        let Some(kind) = cmd.command_type() else {
            warn!(order_id = cmd.order_id, "dropping malformed command");
            return;
        };

        match kind {
            CommandType::NewOrder => {
                let result = self.book.submit(cmd);
                if result.accepted
                    && result.remaining > 0
                    && cmd.tif_typed() == Some(TimeInForce::Gtd)
                    && cmd.expiry_ts > 0
                {
                    self.expiries.push(Reverse((cmd.expiry_ts, cmd.order_id)));
                }
                trace!(
                    order_id = cmd.order_id,
                    filled = result.filled,
                    remaining = result.remaining,
                    "new order"
                );
            }
            CommandType::CancelOrder => {
                let found = self.book.cancel(cmd.order_id);
                trace!(order_id = cmd.order_id, found, "cancel");
            }
            CommandType::ModifyOrder => {
                let result = self.book.modify(cmd.order_id, cmd.price_ticks, cmd.qty);
                trace!(
                    order_id = cmd.order_id,
                    filled = result.filled,
                    remaining = result.remaining,
                    "modify"
                );
            }
        }
    }

    /// Synthesize cancels for every resting order whose expiry is at or
    /// before `now`.
    fn sweep_expired(&mut self, now: Timestamp) {
        while let Some(&Reverse((expiry, order_id))) = self.expiries.peek() {
            if expiry > now {
                break;
            }
            self.expiries.pop();
            if self.book.cancel(order_id) {
                trace!(order_id, expiry, "expired good-till-date order");
            }
        }
    }

    pub fn book(&self) -> &OrderBook<L, RingSink> {
        &self.book
    }
}

/// Pin the calling thread to a CPU core. Returns false when the core does
/// not exist or affinity cannot be set.
pub fn pin_to_core(core_id: usize) -> bool {
    match core_affinity::get_core_ids() {
        Some(cores) => cores
            .into_iter()
            .find(|c| c.id == core_id)
            .map(core_affinity::set_for_current)
            .unwrap_or(false),
        None => false,
    }
}
