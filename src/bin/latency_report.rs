//! Per-command latency percentiles over a synthetic workload.
//!
//! Drives the book directly (no rings, events discarded) so the numbers
//! isolate the matching core.

use hdrhistogram::Histogram;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

use tickmatch::types::flags;
use tickmatch::{
    DenseLadder, NullSink, OrderBook, OrderCommand, OrderType, PriceBand, Side, TimeInForce,
};

const WARMUP_OPS: usize = 50_000;
const ITERATIONS: usize = 1_000_000;

fn random_order(rng: &mut ChaCha8Rng, order_id: u64) -> OrderCommand {
    OrderCommand::new_order(
        order_id,
        rng.gen_range(1..1000),
        0,
        if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask },
        rng.gen_range(49_000..51_000),
        rng.gen_range(1..1000),
        OrderType::Limit,
        TimeInForce::Gtc,
        flags::NONE,
        order_id,
    )
}

fn main() {
    println!("Preparing latency benchmark...");

    let band = PriceBand::new(1, 100_000);
    let mut book = OrderBook::new(0, DenseLadder::new(band), DenseLadder::new(band), NullSink);
    book.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3).expect("histogram");
    let mut rng = ChaCha8Rng::seed_from_u64(0xD1CE);

    println!("Warming up ({WARMUP_OPS} ops)...");
    for i in 0..WARMUP_OPS {
        let cmd = random_order(&mut rng, i as u64 + 1);
        std::hint::black_box(book.submit_limit(&cmd));
    }

    println!("Running {ITERATIONS} iterations...");
    let run_start = Instant::now();
    for i in 0..ITERATIONS {
        let cmd = random_order(&mut rng, (WARMUP_OPS + i) as u64 + 1);
        let start = Instant::now();
        std::hint::black_box(book.submit_limit(&cmd));
        let elapsed = start.elapsed().as_nanos() as u64;
        histogram.saturating_record(elapsed.max(1));
    }
    let total = run_start.elapsed();

    let throughput = ITERATIONS as f64 / total.as_secs_f64();
    println!("\n=== Latency Report ===");
    println!("ops:        {ITERATIONS}");
    println!("elapsed:    {:.3}s ({throughput:.0} ops/s)", total.as_secs_f64());
    println!("resting:    {}", book.order_count());
    println!("p50:        {} ns", histogram.value_at_quantile(0.50));
    println!("p90:        {} ns", histogram.value_at_quantile(0.90));
    println!("p99:        {} ns", histogram.value_at_quantile(0.99));
    println!("p99.9:      {} ns", histogram.value_at_quantile(0.999));
    println!("max:        {} ns", histogram.max());
}
