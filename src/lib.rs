//! # Tickmatch
//!
//! A deterministic single-symbol limit-order matching engine.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: each symbol's book is owned by one thread (no locks)
//! - **Price-Time Priority**: best price first, FIFO within a level
//! - **Arena Allocation**: order nodes come from grow-only slabs; the
//!   steady-state path never touches the heap
//! - **Replayable**: the same command stream always produces the same
//!   trade stream
//!
//! ## Architecture
//!
//! ```text
//! [Feed Reader (mmap)] --> [SPSC Ring] --> [Engine Thread (pinned)]
//!                                                 |
//!                                          [SPSC Ring] --> [Publisher]
//! ```

pub mod arena;
pub mod book;
pub mod bridge;
pub mod command;
pub mod engine;
pub mod error;
pub mod feed;
pub mod index;
pub mod ladder;
pub mod price_level;
pub mod publisher;
pub mod spsc;
pub mod types;

// Re-exports for convenience
pub use arena::{NodeArena, NodeHandle, OrderNode, NULL_HANDLE};
pub use book::{EventSink, NullSink, OrderBook, VecSink};
pub use command::{AnyEvent, BookUpdate, CommandType, ExecResult, OrderCommand, TradeEvent};
pub use engine::{RingSink, SymbolEngine};
pub use error::EngineError;
pub use feed::FeedReader;
pub use index::{OrderEntry, OrderIndex};
pub use ladder::{DenseLadder, Ladder, SparseLadder};
pub use price_level::PriceLevel;
pub use publisher::Publisher;
pub use spsc::SpscRing;
pub use types::{
    sentinel, OrderId, OrderType, PriceBand, Quantity, Side, SymbolId, Tick, TimeInForce,
    Timestamp, UserId,
};
