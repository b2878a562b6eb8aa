//! Order book and matching core.
//!
//! Implements the cross/rest algorithm over a pair of price ladders:
//! 1. CROSSING: match the arriving order against the opposite side,
//!    best price first, FIFO within a level
//! 2. RESTING: enqueue any GTC residual on the same side
//!
//! The book is strictly single-threaded: one owner, no locks, no
//! allocation on the steady-state path (nodes come from the arena).
//! Events leave through a monomorphized [`EventSink`], so a concrete sink
//! type compiles straight into the matching loop.

use crate::arena::{NodeArena, NULL_HANDLE};
use crate::command::{BookUpdate, ExecResult, OrderCommand, TradeEvent};
use crate::index::{OrderEntry, OrderIndex};
use crate::ladder::Ladder;
use crate::price_level::PriceLevel;
use crate::types::{
    flags, now_ns, sentinel, OrderId, OrderType, Quantity, Side, SymbolId, Tick, TimeInForce,
    Timestamp, UserId,
};

/// Cap on the fill-or-kill liquidity walk. A performance guard against
/// pathological sparsity; the walk also stops at the first non-crossing
/// tick or the ladder boundary.
const FOK_MAX_STEPS: usize = 10_000;

/// Receiver for the book's two output streams.
///
/// `on_trade` fires once per individual fill; `on_book_update` fires
/// exactly once at the end of every command that reached the book
/// (including rejected fill-or-kill submissions). Implementations must not
/// call back into the book.
pub trait EventSink {
    fn on_trade(&mut self, trade: TradeEvent);
    fn on_book_update(&mut self, update: BookUpdate);
}

/// Buffers events for the surrounding loop to drain after each command.
#[derive(Default, Debug)]
pub struct VecSink {
    pub trades: Vec<TradeEvent>,
    pub updates: Vec<BookUpdate>,
}

impl VecSink {
    pub fn clear(&mut self) {
        self.trades.clear();
        self.updates.clear();
    }
}

impl EventSink for VecSink {
    #[inline]
    fn on_trade(&mut self, trade: TradeEvent) {
        self.trades.push(trade);
    }

    #[inline]
    fn on_book_update(&mut self, update: BookUpdate) {
        self.updates.push(update);
    }
}

/// Discards everything. For benchmarks that measure the core alone.
pub struct NullSink;

impl EventSink for NullSink {
    #[inline]
    fn on_trade(&mut self, _trade: TradeEvent) {}

    #[inline]
    fn on_book_update(&mut self, _update: BookUpdate) {}
}

/// Single-symbol limit order book, generic over the ladder implementation
/// and the event sink.
pub struct OrderBook<L: Ladder, S: EventSink> {
    symbol_id: SymbolId,
    bids: L,
    asks: L,
    arena: NodeArena,
    index: OrderIndex,
    sink: S,
}

impl<L: Ladder, S: EventSink> OrderBook<L, S> {
    pub fn new(symbol_id: SymbolId, bids: L, asks: L, sink: S) -> Self {
        Self {
            symbol_id,
            bids,
            asks,
            arena: NodeArena::new(2),
            index: OrderIndex::with_capacity(8192),
            sink,
        }
    }

    // ========================================================================
    // Public queries
    // ========================================================================

    #[inline]
    pub fn symbol(&self) -> SymbolId {
        self.symbol_id
    }

    #[inline]
    pub fn best_bid(&self) -> Tick {
        self.bids.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Tick {
        self.asks.best_ask()
    }

    /// Number of resting orders.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Aggregate quantity and order count at one tick.
    pub fn depth_at(&self, side: Side, px: Tick) -> (Quantity, u32) {
        let ladder = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        ladder
            .level(px)
            .map(|l| (l.total_qty, l.count))
            .unwrap_or((0, 0))
    }

    /// True when an order with this id is resting.
    #[inline]
    pub fn contains_order(&self, id: OrderId) -> bool {
        self.index.contains(id)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn arena_in_use(&self) -> u32 {
        self.arena.in_use()
    }

    /// Pre-fault arena pages before entering the hot loop.
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    // ========================================================================
    // Command entry points
    // ========================================================================

    /// Dispatch a new-order command by its order type.
    pub fn submit(&mut self, cmd: &OrderCommand) -> ExecResult {
        match cmd.order_type_typed() {
            Some(OrderType::Limit) => self.submit_limit(cmd),
            Some(OrderType::Market) => self.submit_market(cmd),
            // Stop triggering is not run by the matching loop; parking a
            // stop order here would rest it forever, so refuse it.
            Some(OrderType::StopLimit) | Some(OrderType::StopMarket) | None => {
                self.emit_book_update();
                ExecResult::rejected(0)
            }
        }
    }

    /// Submit a limit order (all TIFs).
    pub fn submit_limit(&mut self, cmd: &OrderCommand) -> ExecResult {
        let (Some(side), Some(tif)) = (cmd.side_typed(), cmd.tif_typed()) else {
            self.emit_book_update();
            return ExecResult::rejected(0);
        };

        if cmd.qty <= 0 || cmd.order_id == sentinel::INVALID_ORDER {
            self.emit_book_update();
            return ExecResult::rejected(0);
        }

        // Iceberg replenishment and stop triggering are owned by the host
        // loop; resting them here would strand them.
        if cmd.flags & (flags::ICEBERG | flags::STOP) != 0 {
            self.emit_book_update();
            return ExecResult::rejected(0);
        }

        let stp = cmd.flags & flags::STP != 0;

        if cmd.flags & flags::POST_ONLY != 0 && self.would_cross(side, cmd.price_ticks) {
            self.emit_book_update();
            return ExecResult::rejected(0);
        }

        if tif == TimeInForce::Fok
            && !self.fok_liquidity(side, cmd.qty, cmd.price_ticks, cmd.user_id, stp)
        {
            // Cannot fill fully: kill without matching or resting.
            self.emit_book_update();
            return ExecResult::new(0, 0);
        }

        let filled = self.match_side(
            side.opposite(),
            cmd.qty,
            cmd.price_ticks,
            cmd.order_id,
            cmd.user_id,
            cmd.recv_ts,
            stp,
        );
        let remaining = cmd.qty - filled;

        if remaining > 0 {
            match tif {
                TimeInForce::Ioc | TimeInForce::Fok => {
                    // IOC discards the residual. A FOK residual can only
                    // arise when self-trade prevention blocked liquidity
                    // the precheck counted; the fills stand, the rest is
                    // killed.
                    self.emit_book_update();
                    return ExecResult::new(filled, 0);
                }
                TimeInForce::Gtc | TimeInForce::Gtd => {
                    let valid = match side {
                        Side::Bid => self.bids.is_valid(cmd.price_ticks),
                        Side::Ask => self.asks.is_valid(cmd.price_ticks),
                    };
                    if !valid {
                        // Rejected before any enqueue; executed fills stand.
                        self.emit_book_update();
                        return ExecResult::rejected(filled);
                    }
                    self.rest_order(cmd, side, remaining);
                }
            }
        }

        self.emit_book_update();
        ExecResult::new(filled, remaining)
    }

    /// Submit a market order: an IOC with the opposite sentinel as the
    /// limit, so every cross succeeds and the residual is discarded.
    pub fn submit_market(&mut self, cmd: &OrderCommand) -> ExecResult {
        let Some(side) = cmd.side_typed() else {
            self.emit_book_update();
            return ExecResult::rejected(0);
        };

        if cmd.qty <= 0 || cmd.order_id == sentinel::INVALID_ORDER {
            self.emit_book_update();
            return ExecResult::rejected(0);
        }

        let stp = cmd.flags & flags::STP != 0;
        let px_limit = match side {
            Side::Bid => sentinel::EMPTY_ASK,
            Side::Ask => sentinel::EMPTY_BID,
        };

        let filled = self.match_side(
            side.opposite(),
            cmd.qty,
            px_limit,
            cmd.order_id,
            cmd.user_id,
            cmd.recv_ts,
            stp,
        );

        self.emit_book_update();
        ExecResult::new(filled, 0)
    }

    /// Cancel a resting order by id. Returns `false` when unknown.
    pub fn cancel(&mut self, id: OrderId) -> bool {
        if !self.cancel_inner(id) {
            return false;
        }
        self.emit_book_update();
        true
    }

    /// Modify a resting order.
    ///
    /// Same price and strictly smaller quantity shrink the node in place
    /// and keep its FIFO position. Any other change cancels and resubmits
    /// as a fresh GTC limit order with the same id (priority lost; the new
    /// price may cross).
    pub fn modify(&mut self, id: OrderId, new_price: Tick, new_qty: Quantity) -> ExecResult {
        let Some(entry) = self.index.get(id) else {
            return ExecResult::new(0, 0);
        };

        let open_qty = self.arena.get(entry.node).qty;
        if new_price == entry.price && new_qty < open_qty && new_qty > 0 {
            let reduction = open_qty - new_qty;
            let ladder = match entry.side {
                Side::Bid => &mut self.bids,
                Side::Ask => &mut self.asks,
            };
            ladder
                .level_mut(entry.price)
                .reduce_qty(&mut self.arena, entry.node, reduction);
            self.emit_book_update();
            return ExecResult::new(0, new_qty);
        }

        // Cancel-and-replace: capture the order's identity first, then
        // treat it as a brand-new arrival.
        let node = self.arena.get(entry.node);
        let user = node.user;
        let node_flags = node.flags;
        let side = entry.side;

        if !self.cancel_inner(id) {
            return ExecResult::new(0, 0);
        }

        let cmd = OrderCommand::new_order(
            id,
            user,
            self.symbol_id,
            side,
            new_price,
            new_qty,
            OrderType::Limit,
            TimeInForce::Gtc,
            node_flags,
            now_ns(),
        );
        self.submit_limit(&cmd)
    }

    // ========================================================================
    // Matching internals
    // ========================================================================

    /// Detach, release and deindex without emitting a book update. Shared
    /// by `cancel` and the replace half of `modify` so each public command
    /// emits exactly one update.
    fn cancel_inner(&mut self, id: OrderId) -> bool {
        let Some(entry) = self.index.get(id) else {
            return false;
        };

        let ladder = match entry.side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        let depleted = ladder.level_mut(entry.price).erase(&mut self.arena, entry.node);
        self.arena.free(entry.node);
        self.index.erase(id);

        if depleted {
            self.refresh_best_after_depletion(entry.side, entry.price);
        }
        true
    }

    /// Match `qty` against the `maker_side` ladder, best price first.
    ///
    /// Walks each level head to tail; self-trade prevention skips (never
    /// removes) makers owned by the taker. A depleted level triggers a
    /// best-price refresh and the loop re-enters at the new best.
    ///
    /// # Returns
    /// Total quantity filled.
    #[allow(clippy::too_many_arguments)]
    fn match_side(
        &mut self,
        maker_side: Side,
        mut qty: Quantity,
        px_limit: Tick,
        taker_id: OrderId,
        taker_user: UserId,
        ts: Timestamp,
        stp: bool,
    ) -> Quantity {
        let mut total_filled = 0;
        let symbol_id = self.symbol_id;

        while qty > 0 {
            let book = match maker_side {
                Side::Bid => &mut self.bids,
                Side::Ask => &mut self.asks,
            };
            let best = match maker_side {
                Side::Bid => book.best_bid(),
                Side::Ask => book.best_ask(),
            };
            if best == sentinel::EMPTY_BID || best == sentinel::EMPTY_ASK {
                break; // No liquidity on the maker side
            }

            // Crossing check: makers at `best` only trade if the taker's
            // limit reaches them.
            let crosses = match maker_side {
                Side::Bid => best >= px_limit, // taker is selling
                Side::Ask => best <= px_limit, // taker is buying
            };
            if !crosses {
                break;
            }

            let Some(level) = book.best_level_mut(maker_side) else {
                break;
            };
            if level.is_empty() {
                break;
            }

            let mut cur = level.peek_head();
            while cur != NULL_HANDLE && qty > 0 {
                let maker = self.arena.get(cur);
                let next = maker.next;

                if stp && maker.user == taker_user {
                    cur = next;
                    continue;
                }

                let maker_id = maker.id;
                let maker_qty = maker.qty;
                let match_qty = qty.min(maker_qty);

                self.sink.on_trade(TradeEvent::new(
                    ts, taker_id, maker_id, symbol_id, best, match_qty,
                ));

                qty -= match_qty;
                total_filled += match_qty;

                if match_qty == maker_qty {
                    level.erase(&mut self.arena, cur);
                    self.index.erase(maker_id);
                    self.arena.free(cur);
                } else {
                    // Partial fill shrinks in place; priority preserved.
                    level.reduce_qty(&mut self.arena, cur, match_qty);
                }

                cur = next;
            }

            if level.is_empty() {
                let next_best = match maker_side {
                    Side::Bid => book.next_bid_below(best),
                    Side::Ask => book.next_ask_above(best),
                };
                match maker_side {
                    Side::Bid => book.set_best_bid(next_best),
                    Side::Ask => book.set_best_ask(next_best),
                }
                continue;
            }
            // Liquidity remains at this level: either the taker is done or
            // self-trade prevention skipped everything it could match.
            break;
        }

        total_filled
    }

    /// Rest the residual of a limit order on its own side.
    fn rest_order(&mut self, cmd: &OrderCommand, side: Side, remaining: Quantity) {
        let handle = self.arena.alloc();
        {
            let node = self.arena.get_mut(handle);
            node.id = cmd.order_id;
            node.user = cmd.user_id;
            node.qty = remaining;
            node.ts = cmd.recv_ts;
            node.flags = cmd.flags;
            node.display_qty = cmd.display_qty;
            node.expiry_ts = cmd.expiry_ts;
            node.stop_price = cmd.stop_price;
        }

        let px = cmd.price_ticks;
        let ladder = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        ladder.level_mut(px).enqueue(&mut self.arena, handle);

        match side {
            Side::Bid => {
                if px > ladder.best_bid() {
                    ladder.set_best_bid(px);
                }
            }
            Side::Ask => {
                if px < ladder.best_ask() {
                    ladder.set_best_ask(px);
                }
            }
        }

        self.index.insert(
            cmd.order_id,
            OrderEntry {
                side,
                price: px,
                node: handle,
            },
        );
    }

    /// True when a `side` order at `px` would trade immediately.
    fn would_cross(&self, side: Side, px: Tick) -> bool {
        match side {
            Side::Bid => {
                let best_ask = self.asks.best_ask();
                best_ask != sentinel::EMPTY_ASK && best_ask <= px
            }
            Side::Ask => {
                let best_bid = self.bids.best_bid();
                best_bid != sentinel::EMPTY_BID && best_bid >= px
            }
        }
    }

    /// Fill-or-kill precheck: walk the opposite ladder outward from its
    /// best price, summing quantity at every crossing level, stopping at
    /// the first non-crossing tick and capping the walk at
    /// [`FOK_MAX_STEPS`]. When the taker carries the STP flag its own
    /// resting quantity is excluded, so a passing precheck cannot be
    /// busted by self-trade skips alone.
    fn fok_liquidity(
        &self,
        taker_side: Side,
        qty: Quantity,
        px_limit: Tick,
        taker_user: UserId,
        stp: bool,
    ) -> bool {
        let book = match taker_side {
            Side::Bid => &self.asks,
            Side::Ask => &self.bids,
        };
        let best = match taker_side {
            Side::Bid => book.best_ask(),
            Side::Ask => book.best_bid(),
        };

        match taker_side {
            Side::Bid => {
                if best == sentinel::EMPTY_ASK || best > px_limit {
                    return false;
                }
            }
            Side::Ask => {
                if best == sentinel::EMPTY_BID || best < px_limit {
                    return false;
                }
            }
        }

        let mut available: Quantity = 0;
        let mut px = best;
        let mut steps = 0;

        while available < qty && steps < FOK_MAX_STEPS {
            match taker_side {
                Side::Bid => {
                    // Walking asks upward.
                    if px > px_limit || px == sentinel::EMPTY_ASK || !book.is_valid(px) {
                        break;
                    }
                    if let Some(level) = book.level(px) {
                        available += self.level_qty_for(level, taker_user, stp);
                    }
                    px += 1;
                }
                Side::Ask => {
                    // Walking bids downward.
                    if px < px_limit || px == sentinel::EMPTY_BID || !book.is_valid(px) {
                        break;
                    }
                    if let Some(level) = book.level(px) {
                        available += self.level_qty_for(level, taker_user, stp);
                    }
                    px -= 1;
                }
            }
            steps += 1;
        }

        available >= qty
    }

    /// Matchable quantity at a level from this taker's point of view.
    fn level_qty_for(&self, level: &PriceLevel, taker_user: UserId, stp: bool) -> Quantity {
        if !stp {
            return level.total_qty;
        }
        let mut sum = 0;
        let mut cur = level.peek_head();
        while cur != NULL_HANDLE {
            let node = self.arena.get(cur);
            if node.user != taker_user {
                sum += node.qty;
            }
            cur = node.next;
        }
        sum
    }

    /// Re-derive the cached best after `px` emptied. Only a depletion of
    /// the cached best can move it; emptying a worse level leaves the best
    /// untouched.
    fn refresh_best_after_depletion(&mut self, side: Side, px: Tick) {
        match side {
            Side::Bid => {
                if self.bids.best_bid() == px {
                    let next = self.bids.next_bid_below(px);
                    self.bids.set_best_bid(next);
                }
            }
            Side::Ask => {
                if self.asks.best_ask() == px {
                    let next = self.asks.next_ask_above(px);
                    self.asks.set_best_ask(next);
                }
            }
        }
    }

    /// Snapshot both tops of book and hand it to the sink.
    fn emit_book_update(&mut self) {
        let best_bid = self.bids.best_bid();
        let best_ask = self.asks.best_ask();

        let bid_qty = if best_bid != sentinel::EMPTY_BID {
            self.bids.level(best_bid).map_or(0, |l| l.total_qty)
        } else {
            0
        };
        let ask_qty = if best_ask != sentinel::EMPTY_ASK {
            self.asks.level(best_ask).map_or(0, |l| l.total_qty)
        } else {
            0
        };

        self.sink.on_book_update(BookUpdate::new(
            now_ns(),
            self.symbol_id,
            best_bid,
            best_ask,
            bid_qty,
            ask_qty,
        ));
    }

    // ========================================================================
    // Consistency audit (test and debugging support)
    // ========================================================================

    /// Walk the whole structure and panic on any broken invariant:
    /// index/ladder agreement, per-level quantity sums and cached-best
    /// correctness. Not for the hot path. Assumes the dense rescan cap was
    /// never hit.
    pub fn audit(&self) {
        let mut seen = 0usize;
        for &side in &[Side::Bid, Side::Ask] {
            let ladder = match side {
                Side::Bid => &self.bids,
                Side::Ask => &self.asks,
            };

            let mut best_seen = match side {
                Side::Bid => sentinel::EMPTY_BID,
                Side::Ask => sentinel::EMPTY_ASK,
            };

            ladder.for_each_nonempty(|px, level| {
                match side {
                    Side::Bid => best_seen = best_seen.max(px),
                    Side::Ask => best_seen = best_seen.min(px),
                }

                let mut sum = 0;
                let mut count = 0;
                let mut cur = level.peek_head();
                while cur != NULL_HANDLE {
                    let node = self.arena.get(cur);
                    assert!(node.qty > 0, "resting node with non-positive qty");

                    let entry = self
                        .index
                        .get(node.id)
                        .unwrap_or_else(|| panic!("node {} missing from index", node.id));
                    assert_eq!(entry.side, side, "index side mismatch for {}", node.id);
                    assert_eq!(entry.price, px, "index price mismatch for {}", node.id);
                    assert_eq!(entry.node, cur, "index handle mismatch for {}", node.id);

                    sum += node.qty;
                    count += 1;
                    seen += 1;
                    cur = node.next;
                }
                assert_eq!(level.total_qty, sum, "level qty sum drifted at {px}");
                assert_eq!(level.count, count, "level count drifted at {px}");
            });

            let cached = match side {
                Side::Bid => self.bids.best_bid(),
                Side::Ask => self.asks.best_ask(),
            };
            assert_eq!(cached, best_seen, "cached best out of date on {side:?}");
        }

        assert_eq!(
            seen,
            self.index.len(),
            "index holds entries with no resting node"
        );
        assert_eq!(
            seen as u32,
            self.arena.in_use(),
            "arena node count drifted from book contents"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::DenseLadder;
    use crate::types::PriceBand;

    type TestBook = OrderBook<DenseLadder, VecSink>;

    fn book() -> TestBook {
        let band = PriceBand::new(1, 100_000);
        OrderBook::new(
            1,
            DenseLadder::new(band),
            DenseLadder::new(band),
            VecSink::default(),
        )
    }

    fn limit(id: OrderId, user: UserId, side: Side, px: Tick, qty: Quantity) -> OrderCommand {
        OrderCommand::new_order(
            id,
            user,
            1,
            side,
            px,
            qty,
            OrderType::Limit,
            TimeInForce::Gtc,
            flags::NONE,
            id, // monotone receive timestamps for FIFO checks
        )
    }

    #[test]
    fn test_rest_no_match() {
        let mut book = book();
        let result = book.submit_limit(&limit(1, 100, Side::Bid, 10_000, 100));

        assert_eq!(result, ExecResult::new(0, 100));
        assert_eq!(book.best_bid(), 10_000);
        assert_eq!(book.best_ask(), sentinel::EMPTY_ASK);
        assert_eq!(book.order_count(), 1);
        assert!(book.sink().trades.is_empty());
        assert_eq!(book.sink().updates.len(), 1);
        book.audit();
    }

    #[test]
    fn test_full_match() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 100));
        let result = book.submit_limit(&limit(2, 200, Side::Bid, 10_000, 100));

        assert_eq!(result, ExecResult::new(100, 0));
        let trades = &book.sink().trades;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].maker_id, 1);
        assert_eq!(trades[0].taker_id, 2);
        assert_eq!(trades[0].price_ticks, 10_000);
        assert_eq!(trades[0].qty, 100);

        assert_eq!(book.order_count(), 0);
        assert_eq!(book.best_bid(), sentinel::EMPTY_BID);
        assert_eq!(book.best_ask(), sentinel::EMPTY_ASK);
        book.audit();
    }

    #[test]
    fn test_partial_match_taker_rests() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 50));
        let result = book.submit_limit(&limit(2, 200, Side::Bid, 10_000, 100));

        assert_eq!(result, ExecResult::new(50, 50));
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.best_bid(), 10_000);
        assert_eq!(book.best_ask(), sentinel::EMPTY_ASK);
        assert_eq!(book.depth_at(Side::Bid, 10_000), (50, 1));
        book.audit();
    }

    #[test]
    fn test_partial_match_maker_keeps_priority() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 100));
        book.submit_limit(&limit(2, 101, Side::Ask, 10_000, 100));
        book.submit_limit(&limit(3, 200, Side::Bid, 10_000, 30));

        // Maker 1 shrank in place and still matches first.
        assert_eq!(book.depth_at(Side::Ask, 10_000), (170, 2));
        book.submit_limit(&limit(4, 201, Side::Bid, 10_000, 80));

        let trades = &book.sink().trades;
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].maker_id, 1);
        assert_eq!(trades[1].maker_id, 1);
        assert_eq!(trades[1].qty, 70);
        assert_eq!(trades[2].maker_id, 2);
        assert_eq!(trades[2].qty, 10);
        book.audit();
    }

    #[test]
    fn test_match_walks_levels_best_first() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_020, 50));
        book.submit_limit(&limit(2, 100, Side::Ask, 10_000, 50));
        book.submit_limit(&limit(3, 100, Side::Ask, 10_010, 50));

        book.submit_limit(&limit(4, 200, Side::Bid, 10_020, 120));

        let trades = &book.sink().trades;
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].price_ticks, 10_000);
        assert_eq!(trades[1].price_ticks, 10_010);
        assert_eq!(trades[2].price_ticks, 10_020);
        assert_eq!(trades[2].qty, 20);

        assert_eq!(book.best_ask(), 10_020);
        assert_eq!(book.depth_at(Side::Ask, 10_020), (30, 1));
        book.audit();
    }

    #[test]
    fn test_ioc_discards_residual() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 50));

        let mut ioc = limit(2, 200, Side::Bid, 10_050, 100);
        ioc.tif = TimeInForce::Ioc as u8;
        let result = book.submit_limit(&ioc);

        assert_eq!(result, ExecResult::new(50, 0));
        assert_eq!(book.order_count(), 0);
        assert_eq!(book.best_bid(), sentinel::EMPTY_BID);
        book.audit();
    }

    #[test]
    fn test_market_order_sweeps() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 50));
        book.submit_limit(&limit(2, 100, Side::Ask, 10_500, 50));

        let mkt = OrderCommand::new_order(
            3,
            200,
            1,
            Side::Bid,
            0,
            80,
            OrderType::Market,
            TimeInForce::Ioc,
            flags::NONE,
            3,
        );
        let result = book.submit(&mkt);

        assert_eq!(result, ExecResult::new(80, 0));
        let trades = &book.sink().trades;
        assert_eq!(trades[0].price_ticks, 10_000);
        assert_eq!(trades[1].price_ticks, 10_500);
        assert_eq!(book.depth_at(Side::Ask, 10_500), (20, 1));
        book.audit();
    }

    #[test]
    fn test_cancel() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Bid, 10_000, 100));

        assert!(book.cancel(1));
        assert!(!book.cancel(1));
        assert!(!book.cancel(999));

        assert_eq!(book.order_count(), 0);
        assert_eq!(book.best_bid(), sentinel::EMPTY_BID);
        book.audit();
    }

    #[test]
    fn test_cancel_of_non_best_level_keeps_best() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Bid, 10_050, 100));
        book.submit_limit(&limit(2, 100, Side::Bid, 10_000, 100));

        assert!(book.cancel(2));
        assert_eq!(book.best_bid(), 10_050);

        assert!(book.cancel(1));
        assert_eq!(book.best_bid(), sentinel::EMPTY_BID);
        book.audit();
    }

    #[test]
    fn test_cancel_refreshes_best_downward() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Bid, 10_050, 100));
        book.submit_limit(&limit(2, 100, Side::Bid, 10_000, 100));
        book.submit_limit(&limit(3, 100, Side::Bid, 9_950, 100));

        assert!(book.cancel(1));
        assert_eq!(book.best_bid(), 10_000);
        assert!(book.cancel(2));
        assert_eq!(book.best_bid(), 9_950);
        book.audit();
    }

    #[test]
    fn test_fok_insufficient_leaves_book_untouched() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 10));

        let mut fok = limit(2, 200, Side::Bid, 10_000, 15);
        fok.tif = TimeInForce::Fok as u8;
        let result = book.submit_limit(&fok);

        assert_eq!(result, ExecResult::new(0, 0));
        assert!(book.sink().trades.is_empty());
        assert_eq!(book.depth_at(Side::Ask, 10_000), (10, 1));
        assert_eq!(book.order_count(), 1);
        // The kill still produced a book update.
        assert_eq!(book.sink().updates.len(), 2);
        book.audit();
    }

    #[test]
    fn test_fok_sufficient_fills_fully() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 20));

        let mut fok = limit(2, 200, Side::Bid, 10_000, 15);
        fok.tif = TimeInForce::Fok as u8;
        let result = book.submit_limit(&fok);

        assert_eq!(result, ExecResult::new(15, 0));
        assert_eq!(book.depth_at(Side::Ask, 10_000), (5, 1));
        book.audit();
    }

    #[test]
    fn test_fok_across_levels() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 10));
        book.submit_limit(&limit(2, 100, Side::Ask, 10_001, 10));
        book.submit_limit(&limit(3, 100, Side::Ask, 10_002, 10));

        let mut fok = limit(4, 200, Side::Bid, 10_001, 25);
        fok.tif = TimeInForce::Fok as u8;
        // Only 20 crosses at <= 10_001.
        assert_eq!(book.submit_limit(&fok), ExecResult::new(0, 0));

        let mut fok = limit(5, 200, Side::Bid, 10_002, 25);
        fok.tif = TimeInForce::Fok as u8;
        assert_eq!(book.submit_limit(&fok), ExecResult::new(25, 0));
        book.audit();
    }

    #[test]
    fn test_stp_skips_own_orders_and_may_cross_book() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 10));

        let mut bid = limit(2, 100, Side::Bid, 10_050, 5);
        bid.flags = flags::STP;
        let result = book.submit_limit(&bid);

        // No self-trade; the bid rests above the ask. Crossed-at-rest is a
        // legitimate outcome of prevention.
        assert_eq!(result, ExecResult::new(0, 5));
        assert!(book.sink().trades.is_empty());
        assert_eq!(book.best_bid(), 10_050);
        assert_eq!(book.best_ask(), 10_000);
        assert_eq!(book.order_count(), 2);
        book.audit();
    }

    #[test]
    fn test_stp_matches_other_users_behind_own_order() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 10));
        book.submit_limit(&limit(2, 101, Side::Ask, 10_000, 10));

        let mut bid = limit(3, 100, Side::Bid, 10_000, 10);
        bid.flags = flags::STP;
        let result = book.submit_limit(&bid);

        // Own order at the head is skipped but stays; user 101 fills.
        assert_eq!(result.filled, 10);
        let trades = &book.sink().trades;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].maker_id, 2);
        assert_eq!(book.depth_at(Side::Ask, 10_000), (10, 1));
        assert!(book.contains_order(1));
        book.audit();
    }

    #[test]
    fn test_fok_precheck_excludes_own_liquidity() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 10));

        let mut fok = limit(2, 100, Side::Bid, 10_000, 10);
        fok.tif = TimeInForce::Fok as u8;
        fok.flags = flags::STP;
        let result = book.submit_limit(&fok);

        // The only liquidity is the taker's own, so the precheck kills the
        // order outright instead of letting it bust.
        assert_eq!(result, ExecResult::new(0, 0));
        assert!(book.sink().trades.is_empty());
        assert_eq!(book.order_count(), 1);
        book.audit();
    }

    #[test]
    fn test_post_only_rejects_crossing_price() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 10));

        let mut po = limit(2, 200, Side::Bid, 10_000, 10);
        po.flags = flags::POST_ONLY;
        let result = book.submit_limit(&po);

        assert!(!result.accepted);
        assert!(book.sink().trades.is_empty());
        assert_eq!(book.order_count(), 1);

        let mut po = limit(3, 200, Side::Bid, 9_999, 10);
        po.flags = flags::POST_ONLY;
        assert_eq!(book.submit_limit(&po), ExecResult::new(0, 10));
        book.audit();
    }

    #[test]
    fn test_iceberg_and_stop_flags_rejected() {
        let mut book = book();

        let mut ice = limit(1, 100, Side::Bid, 10_000, 100);
        ice.flags = flags::ICEBERG;
        assert!(!book.submit_limit(&ice).accepted);

        let stop = OrderCommand::new_order(
            2,
            100,
            1,
            Side::Bid,
            10_000,
            100,
            OrderType::StopLimit,
            TimeInForce::Gtc,
            flags::STOP,
            2,
        );
        assert!(!book.submit(&stop).accepted);
        assert_eq!(book.order_count(), 0);
        book.audit();
    }

    #[test]
    fn test_invalid_tick_rejected_before_rest() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 50));

        // Crosses for 50, then the residual would rest outside the band.
        let result = book.submit_limit(&limit(2, 200, Side::Bid, 200_000, 80));
        assert!(!result.accepted);
        assert_eq!(result.filled, 50);
        assert_eq!(book.order_count(), 0);
        book.audit();
    }

    #[test]
    fn test_modify_shrink_keeps_priority() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Bid, 10_000, 10));
        book.submit_limit(&limit(2, 101, Side::Bid, 10_000, 10));

        let result = book.modify(1, 10_000, 5);
        assert_eq!(result, ExecResult::new(0, 5));

        book.submit_limit(&limit(1000, 200, Side::Ask, 9_900, 6));
        let trades = &book.sink().trades;
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].maker_id, 1);
        assert_eq!(trades[0].qty, 5);
        assert_eq!(trades[1].maker_id, 2);
        assert_eq!(trades[1].qty, 1);
        book.audit();
    }

    #[test]
    fn test_modify_grow_loses_priority() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Bid, 10_000, 10));
        book.submit_limit(&limit(2, 101, Side::Bid, 10_000, 10));

        let result = book.modify(1, 10_000, 15);
        assert_eq!(result, ExecResult::new(0, 15));

        book.submit_limit(&limit(1000, 200, Side::Ask, 9_900, 5));
        let trades = &book.sink().trades;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].maker_id, 2);
        book.audit();
    }

    #[test]
    fn test_modify_price_change_may_cross() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Bid, 9_000, 10));
        book.submit_limit(&limit(2, 200, Side::Ask, 10_000, 10));

        let result = book.modify(1, 10_000, 10);
        assert_eq!(result.filled, 10);
        assert_eq!(book.order_count(), 0);
        book.audit();
    }

    #[test]
    fn test_modify_unknown_order() {
        let mut book = book();
        assert_eq!(book.modify(404, 10_000, 10), ExecResult::new(0, 0));
    }

    #[test]
    fn test_one_book_update_per_command() {
        let mut book = book();
        book.submit_limit(&limit(1, 100, Side::Bid, 10_000, 10));
        book.submit_limit(&limit(2, 101, Side::Bid, 10_000, 10));
        book.modify(1, 10_001, 20); // cancel + replace internally
        book.cancel(2);
        book.submit_limit(&limit(3, 102, Side::Ask, 10_500, 10));

        assert_eq!(book.sink().updates.len(), 5);
    }

    #[test]
    fn test_quantity_conservation() {
        let mut book = book();
        let submitted: Quantity = 100 + 60 + 80;
        book.submit_limit(&limit(1, 100, Side::Ask, 10_000, 100));
        book.submit_limit(&limit(2, 101, Side::Bid, 10_000, 60));
        book.submit_limit(&limit(3, 102, Side::Bid, 10_010, 80));

        let traded: Quantity = book.sink().trades.iter().map(|t| t.qty).sum();
        let resting: Quantity = book.depth_at(Side::Ask, 10_000).0
            + book.depth_at(Side::Bid, 10_000).0
            + book.depth_at(Side::Bid, 10_010).0;

        // Every traded lot appears twice in the flow (maker and taker leg
        // consume the same qty), so submitted = resting + 2 * traded.
        assert_eq!(submitted, resting + 2 * traded);
        book.audit();
    }
}
