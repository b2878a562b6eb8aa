//! Command and event records for the matching engine.
//!
//! Commands are the input stream (feed file, JSON bridge); events are the
//! output stream (binary logs). Both are fixed-size `#[repr(C)]` records
//! with explicit padding so they can be cast to and from raw bytes without
//! copying — the feed reader maps a file and walks it at `size_of` stride.

use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::types::{
    sentinel, OrderId, OrderType, Quantity, Side, SymbolId, Tick, TimeInForce, Timestamp, UserId,
};

/// Discriminant of an [`OrderCommand`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    NewOrder = 0,
    CancelOrder = 1,
    ModifyOrder = 2,
}

impl CommandType {
    #[inline]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CommandType::NewOrder),
            1 => Some(CommandType::CancelOrder),
            2 => Some(CommandType::ModifyOrder),
            _ => None,
        }
    }
}

/// Fixed-size binary order command, native endianness.
///
/// Enum-valued fields are stored as raw bytes and decoded through the
/// typed accessors; a record with out-of-range bytes is treated as corrupt
/// and skipped by the feed reader.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes)]
pub struct OrderCommand {
    pub kind: u8,
    _pad0: [u8; 7],
    pub recv_ts: Timestamp,
    pub order_id: OrderId,
    pub symbol_id: SymbolId,
    pub user_id: UserId,
    pub price_ticks: Tick,
    pub qty: Quantity,
    pub side: u8,
    pub order_type: u8,
    pub tif: u8,
    _pad1: u8,
    pub flags: u32,
    pub stop_price: Tick,
    pub display_qty: Quantity,
    pub expiry_ts: Timestamp,
}

const _: () = assert!(
    std::mem::size_of::<OrderCommand>() == 80,
    "OrderCommand wire size changed"
);

impl OrderCommand {
    /// Build a new-order command. Optional fields default to zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new_order(
        order_id: OrderId,
        user_id: UserId,
        symbol_id: SymbolId,
        side: Side,
        price_ticks: Tick,
        qty: Quantity,
        order_type: OrderType,
        tif: TimeInForce,
        flags: u32,
        recv_ts: Timestamp,
    ) -> Self {
        Self {
            kind: CommandType::NewOrder as u8,
            _pad0: [0; 7],
            recv_ts,
            order_id,
            symbol_id,
            user_id,
            price_ticks,
            qty,
            side: side as u8,
            order_type: order_type as u8,
            tif: tif as u8,
            _pad1: 0,
            flags,
            stop_price: 0,
            display_qty: 0,
            expiry_ts: 0,
        }
    }

    /// Build a cancel command.
    pub fn cancel(order_id: OrderId, symbol_id: SymbolId, recv_ts: Timestamp) -> Self {
        let mut cmd = Self::new_zeroed();
        cmd.kind = CommandType::CancelOrder as u8;
        cmd.order_id = order_id;
        cmd.symbol_id = symbol_id;
        cmd.recv_ts = recv_ts;
        cmd
    }

    /// Build a modify command (new price and quantity).
    pub fn modify(
        order_id: OrderId,
        symbol_id: SymbolId,
        new_price: Tick,
        new_qty: Quantity,
        recv_ts: Timestamp,
    ) -> Self {
        let mut cmd = Self::new_zeroed();
        cmd.kind = CommandType::ModifyOrder as u8;
        cmd.order_id = order_id;
        cmd.symbol_id = symbol_id;
        cmd.price_ticks = new_price;
        cmd.qty = new_qty;
        cmd.recv_ts = recv_ts;
        cmd
    }

    #[inline]
    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::from_u8(self.kind)
    }

    #[inline]
    pub fn side_typed(&self) -> Option<Side> {
        Side::from_u8(self.side)
    }

    #[inline]
    pub fn order_type_typed(&self) -> Option<OrderType> {
        OrderType::from_u8(self.order_type)
    }

    #[inline]
    pub fn tif_typed(&self) -> Option<TimeInForce> {
        TimeInForce::from_u8(self.tif)
    }

    /// True when every enum-valued byte decodes. Corrupt records fail this
    /// and are skipped by the feed reader.
    pub fn is_well_formed(&self) -> bool {
        self.command_type().is_some()
            && self.side_typed().is_some()
            && self.order_type_typed().is_some()
            && self.tif_typed().is_some()
    }
}

// ============================================================================
// Output Events
// ============================================================================

/// A single fill. One record per maker touched by a taker.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct TradeEvent {
    /// Taker's receive timestamp (deterministic across replays).
    pub ts: Timestamp,
    pub taker_id: OrderId,
    pub maker_id: OrderId,
    pub symbol_id: SymbolId,
    _pad0: [u8; 4],
    pub price_ticks: Tick,
    pub qty: Quantity,
}

const _: () = assert!(std::mem::size_of::<TradeEvent>() == 48);

impl TradeEvent {
    pub fn new(
        ts: Timestamp,
        taker_id: OrderId,
        maker_id: OrderId,
        symbol_id: SymbolId,
        price_ticks: Tick,
        qty: Quantity,
    ) -> Self {
        Self {
            ts,
            taker_id,
            maker_id,
            symbol_id,
            _pad0: [0; 4],
            price_ticks,
            qty,
        }
    }
}

/// Top-of-book snapshot, emitted once per accepted command.
///
/// Empty sides carry the sentinel ticks and zero quantity.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct BookUpdate {
    /// Wall-clock emission timestamp.
    pub ts: Timestamp,
    pub symbol_id: SymbolId,
    _pad0: [u8; 4],
    pub best_bid: Tick,
    pub best_ask: Tick,
    pub bid_qty: Quantity,
    pub ask_qty: Quantity,
}

const _: () = assert!(std::mem::size_of::<BookUpdate>() == 48);

impl BookUpdate {
    pub fn new(
        ts: Timestamp,
        symbol_id: SymbolId,
        best_bid: Tick,
        best_ask: Tick,
        bid_qty: Quantity,
        ask_qty: Quantity,
    ) -> Self {
        Self {
            ts,
            symbol_id,
            _pad0: [0; 4],
            best_bid,
            best_ask,
            bid_qty,
            ask_qty,
        }
    }

    /// True when neither side is resting.
    pub fn is_empty_book(&self) -> bool {
        self.best_bid == sentinel::EMPTY_BID && self.best_ask == sentinel::EMPTY_ASK
    }
}

/// Either output event, for transport over a single ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnyEvent {
    Trade(TradeEvent),
    Book(BookUpdate),
}

/// Outcome of a new-order or modify command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecResult {
    /// Quantity filled by this command.
    pub filled: Quantity,
    /// Quantity now resting (zero for IOC/FOK/market).
    pub remaining: Quantity,
    /// False when the command was rejected outright.
    pub accepted: bool,
}

impl ExecResult {
    pub const fn new(filled: Quantity, remaining: Quantity) -> Self {
        Self {
            filled,
            remaining,
            accepted: true,
        }
    }

    /// Rejected before resting; any fills that already printed stand.
    pub const fn rejected(filled: Quantity) -> Self {
        Self {
            filled,
            remaining: 0,
            accepted: false,
        }
    }
}
