//! Core identifier and price types shared across the engine.
//!
//! Prices are signed integers in minimum-increment units ("ticks");
//! quantities are signed integers in lot units. Two sentinel ticks encode
//! the empty sides of the book.

/// External order identifier, unique for the lifetime of the engine.
/// Zero is reserved (see [`sentinel::INVALID_ORDER`]).
pub type OrderId = u64;

/// Owning user/trader identifier.
pub type UserId = u32;

/// Symbol identifier; doubles as the index of the symbol's command queue.
pub type SymbolId = u32;

/// Price in ticks.
pub type Tick = i64;

/// Quantity in lots.
pub type Quantity = i64;

/// Nanosecond timestamp.
pub type Timestamp = u64;

/// Sentinel values for empty book sides and reserved identifiers.
pub mod sentinel {
    use super::{OrderId, Tick};

    /// Best bid when the bid side is empty.
    pub const EMPTY_BID: Tick = Tick::MIN;
    /// Best ask when the ask side is empty.
    pub const EMPTY_ASK: Tick = Tick::MAX;
    /// Reserved order id; also the empty key of the order index.
    pub const INVALID_ORDER: OrderId = 0;
}

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Decode from the wire byte (0 = bid, 1 = ask).
    #[inline]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Side::Bid),
            1 => Some(Side::Ask),
            _ => None,
        }
    }
}

/// Order type determines how the limit price is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Limit order - rests in book if not fully matched (default)
    #[default]
    Limit = 0,
    /// Market order - matches at any price, residual discarded
    Market = 1,
    /// Stop-limit - becomes a limit order at the trigger price
    StopLimit = 2,
    /// Stop-market - becomes a market order at the trigger price
    StopMarket = 3,
}

impl OrderType {
    #[inline]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(OrderType::Limit),
            1 => Some(OrderType::Market),
            2 => Some(OrderType::StopLimit),
            3 => Some(OrderType::StopMarket),
            _ => None,
        }
    }
}

/// Time-in-force of a new order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TimeInForce {
    /// Good till cancelled (default)
    #[default]
    Gtc = 0,
    /// Immediate or cancel: match now, discard residual
    Ioc = 1,
    /// Fill or kill: match fully or not at all
    Fok = 2,
    /// Good till date: rest until the expiry timestamp
    Gtd = 3,
}

impl TimeInForce {
    #[inline]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(TimeInForce::Gtc),
            1 => Some(TimeInForce::Ioc),
            2 => Some(TimeInForce::Fok),
            3 => Some(TimeInForce::Gtd),
            _ => None,
        }
    }
}

/// Order flag bitmask values.
pub mod flags {
    pub const NONE: u32 = 0;
    /// Maker only: reject instead of crossing.
    pub const POST_ONLY: u32 = 1 << 0;
    /// Only reduce an existing position (not enforced by the core).
    pub const REDUCE_ONLY: u32 = 1 << 1;
    /// Self-trade prevention: skip makers owned by the taker's user.
    pub const STP: u32 = 1 << 2;
    /// Iceberg: displayed slice backed by a hidden reserve.
    pub const ICEBERG: u32 = 1 << 3;
    /// Stop: parked until the trigger price prints.
    pub const STOP: u32 = 1 << 4;
}

/// Valid tick range for a dense price ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceBand {
    pub min_tick: Tick,
    pub max_tick: Tick,
    pub tick_size: Tick,
}

impl PriceBand {
    pub const fn new(min_tick: Tick, max_tick: Tick) -> Self {
        Self {
            min_tick,
            max_tick,
            tick_size: 1,
        }
    }

    /// Number of addressable ticks in the band.
    #[inline]
    pub const fn width(&self) -> usize {
        (self.max_tick - self.min_tick + 1) as usize
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
#[inline]
pub fn now_ns() -> Timestamp {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as Timestamp)
        .unwrap_or(0)
}
