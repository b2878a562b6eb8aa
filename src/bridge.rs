//! Line-oriented JSON bridge for interactive front ends.
//!
//! One JSON object per line in, zero or more JSON objects per line out.
//! Commands: `{"cmd":"order"|"cancel"|"stats"|"reset", ...}`; responses:
//! `{"type":"ready"|"trade"|"book"|"stats"|"reset","data":{...}}`.
//!
//! Prices and sizes cross the boundary as decimals and are converted to
//! integer ticks/lots at a fixed scale of x100. The bridge book uses the
//! sparse ladder, so any positive decimal price is accepted.

use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::book::{OrderBook, VecSink};
use crate::command::OrderCommand;
use crate::ladder::SparseLadder;
use crate::types::{flags, now_ns, sentinel, OrderId, OrderType, Side, Tick, TimeInForce, UserId};

/// Decimal places carried across the JSON boundary.
pub const SCALE: u32 = 2;
const SCALE_FACTOR: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum BridgeCommand {
    Order {
        id: OrderId,
        #[serde(default)]
        user: UserId,
        side: String,
        price: Decimal,
        size: Decimal,
        #[serde(default)]
        tif: Option<String>,
        #[serde(default)]
        post_only: bool,
        #[serde(default)]
        stp: bool,
    },
    Cancel {
        id: OrderId,
    },
    Stats,
    Reset,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum BridgeResponse {
    Ready {
        scale: u32,
    },
    Trade {
        price: Decimal,
        qty: Decimal,
        maker_id: OrderId,
        taker_id: OrderId,
        ts: u64,
    },
    Book {
        best_bid: Decimal,
        best_ask: Decimal,
        bid_qty: Decimal,
        ask_qty: Decimal,
    },
    Stats {
        orders_processed: u64,
        trades_executed: u64,
        resting_orders: u64,
        avg_latency_ns: u64,
        min_latency_ns: u64,
        max_latency_ns: u64,
        best_bid: Decimal,
        best_ask: Decimal,
    },
    Reset {},
}

/// Single-threaded command latency tally.
#[derive(Debug, Default)]
struct BridgeStats {
    orders_processed: u64,
    trades_executed: u64,
    total_latency_ns: u64,
    min_latency_ns: u64,
    max_latency_ns: u64,
}

impl BridgeStats {
    fn record(&mut self, ns: u64) {
        self.orders_processed += 1;
        self.total_latency_ns += ns;
        if self.min_latency_ns == 0 || ns < self.min_latency_ns {
            self.min_latency_ns = ns;
        }
        if ns > self.max_latency_ns {
            self.max_latency_ns = ns;
        }
    }

    fn avg(&self) -> u64 {
        if self.orders_processed == 0 {
            0
        } else {
            self.total_latency_ns / self.orders_processed
        }
    }
}

pub struct Bridge {
    book: OrderBook<SparseLadder, VecSink>,
    stats: BridgeStats,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            book: fresh_book(),
            stats: BridgeStats::default(),
        }
    }

    /// The banner response a front end waits for on connect.
    pub fn ready() -> BridgeResponse {
        BridgeResponse::Ready { scale: SCALE }
    }

    /// Handle one input line. Returns the responses to write, in order.
    /// Unparseable lines produce no response and are logged.
    pub fn handle_line(&mut self, line: &str) -> Vec<BridgeResponse> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<BridgeCommand>(line) {
            Ok(cmd) => self.handle(cmd),
            Err(err) => {
                warn!(%err, "dropping unparseable bridge line");
                Vec::new()
            }
        }
    }

    pub fn handle(&mut self, cmd: BridgeCommand) -> Vec<BridgeResponse> {
        match cmd {
            BridgeCommand::Order {
                id,
                user,
                side,
                price,
                size,
                tif,
                post_only,
                stp,
            } => self.handle_order(id, user, &side, price, size, tif.as_deref(), post_only, stp),
            BridgeCommand::Cancel { id } => {
                let start = Instant::now();
                self.book.cancel(id);
                self.stats.record(start.elapsed().as_nanos() as u64);
                self.drain_responses()
            }
            BridgeCommand::Stats => vec![self.stats_response()],
            BridgeCommand::Reset => {
                self.book = fresh_book();
                self.stats = BridgeStats::default();
                vec![BridgeResponse::Reset {}]
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_order(
        &mut self,
        id: OrderId,
        user: UserId,
        side: &str,
        price: Decimal,
        size: Decimal,
        tif: Option<&str>,
        post_only: bool,
        stp: bool,
    ) -> Vec<BridgeResponse> {
        let Some(side) = parse_side(side) else {
            warn!(side, "dropping order with unknown side");
            return Vec::new();
        };
        let (Some(price_ticks), Some(qty)) = (to_units(price), to_units(size)) else {
            warn!(%price, %size, "dropping order with unrepresentable price/size");
            return Vec::new();
        };
        let tif = match tif {
            None | Some("gtc") => TimeInForce::Gtc,
            Some("ioc") => TimeInForce::Ioc,
            Some("fok") => TimeInForce::Fok,
            Some("gtd") => TimeInForce::Gtd,
            Some(other) => {
                warn!(tif = other, "dropping order with unknown tif");
                return Vec::new();
            }
        };

        let mut order_flags = flags::NONE;
        if post_only {
            order_flags |= flags::POST_ONLY;
        }
        if stp {
            order_flags |= flags::STP;
        }

        let cmd = OrderCommand::new_order(
            id,
            user,
            self.book.symbol(),
            side,
            price_ticks,
            qty,
            OrderType::Limit,
            tif,
            order_flags,
            now_ns(),
        );

        let start = Instant::now();
        self.book.submit_limit(&cmd);
        self.stats.record(start.elapsed().as_nanos() as u64);
        self.stats.trades_executed += self.book.sink().trades.len() as u64;

        self.drain_responses()
    }

    /// Convert buffered book events into wire responses.
    fn drain_responses(&mut self) -> Vec<BridgeResponse> {
        let sink = self.book.sink_mut();
        let mut responses: Vec<BridgeResponse> = sink
            .trades
            .iter()
            .map(|t| BridgeResponse::Trade {
                price: from_units(t.price_ticks),
                qty: from_units(t.qty),
                maker_id: t.maker_id,
                taker_id: t.taker_id,
                ts: t.ts,
            })
            .collect();

        if let Some(update) = sink.updates.last() {
            responses.push(BridgeResponse::Book {
                best_bid: from_units(clamp_sentinel(update.best_bid)),
                best_ask: from_units(clamp_sentinel(update.best_ask)),
                bid_qty: from_units(update.bid_qty),
                ask_qty: from_units(update.ask_qty),
            });
        }
        sink.clear();
        responses
    }

    fn stats_response(&self) -> BridgeResponse {
        BridgeResponse::Stats {
            orders_processed: self.stats.orders_processed,
            trades_executed: self.stats.trades_executed,
            resting_orders: self.book.order_count() as u64,
            avg_latency_ns: self.stats.avg(),
            min_latency_ns: self.stats.min_latency_ns,
            max_latency_ns: self.stats.max_latency_ns,
            best_bid: from_units(clamp_sentinel(self.book.best_bid())),
            best_ask: from_units(clamp_sentinel(self.book.best_ask())),
        }
    }
}

fn fresh_book() -> OrderBook<SparseLadder, VecSink> {
    OrderBook::new(0, SparseLadder::new(), SparseLadder::new(), VecSink::default())
}

fn parse_side(s: &str) -> Option<Side> {
    match s {
        "buy" | "bid" => Some(Side::Bid),
        "sell" | "ask" => Some(Side::Ask),
        _ => None,
    }
}

/// Decimal to integer ticks/lots at the fixed scale, truncating.
fn to_units(d: Decimal) -> Option<i64> {
    (d * Decimal::from(SCALE_FACTOR)).trunc().to_i64()
}

/// Integer ticks/lots back to a decimal.
fn from_units(v: i64) -> Decimal {
    Decimal::new(v, SCALE)
}

/// Empty sides cross the boundary as zero, not as the sentinels.
fn clamp_sentinel(px: Tick) -> Tick {
    if px == sentinel::EMPTY_BID || px == sentinel::EMPTY_ASK {
        0
    } else {
        px
    }
}
