//! Synthetic feed generator.
//!
//! Writes a binary command file the replay process can mmap: a seeded mix
//! of new orders, cancels and modifies against the set of orders that are
//! plausibly still resting. Deterministic for a given seed.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use zerocopy::AsBytes;

use tickmatch::types::flags;
use tickmatch::{OrderCommand, OrderType, Side, TimeInForce};

#[derive(Parser, Debug)]
#[command(name = "datagen", about = "Generate a synthetic binary order feed")]
struct Args {
    /// Number of commands to generate
    #[arg(long, default_value_t = 100_000)]
    orders: u64,

    /// Output file path
    #[arg(long, default_value = "orders.bin")]
    output: PathBuf,

    /// Number of symbols to spread commands across
    #[arg(long, default_value_t = 1)]
    symbols: u32,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if args.symbols == 0 {
        eprintln!("error: --symbols must be at least 1");
        std::process::exit(1);
    }

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut active: Vec<(u64, u32)> = Vec::new(); // (order_id, symbol_id)
    let mut next_order_id = 1u64;
    let mut ts = 1_000_000u64;

    for _ in 0..args.orders {
        ts += rng.gen_range(100..10_000);
        let roll = rng.gen_range(0..100);

        let cmd = if active.is_empty() || roll < 70 {
            // New order: mostly GTC limits around the mid, occasional IOC.
            let order_id = next_order_id;
            next_order_id += 1;
            let symbol_id = rng.gen_range(0..args.symbols);
            let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
            let tif = if rng.gen_bool(0.1) {
                TimeInForce::Ioc
            } else {
                TimeInForce::Gtc
            };

            active.push((order_id, symbol_id));
            OrderCommand::new_order(
                order_id,
                rng.gen_range(1..100),
                symbol_id,
                side,
                rng.gen_range(50_000..60_000),
                rng.gen_range(1..100),
                OrderType::Limit,
                tif,
                flags::NONE,
                ts,
            )
        } else if roll < 90 {
            // Cancel a random active order.
            let idx = rng.gen_range(0..active.len());
            let (order_id, symbol_id) = active.swap_remove(idx);
            OrderCommand::cancel(order_id, symbol_id, ts)
        } else {
            // Modify a random active order.
            let idx = rng.gen_range(0..active.len());
            let (order_id, symbol_id) = active[idx];
            OrderCommand::modify(
                order_id,
                symbol_id,
                rng.gen_range(50_000..60_000),
                rng.gen_range(1..100),
                ts,
            )
        };

        out.write_all(cmd.as_bytes())?;
    }

    out.flush()?;
    println!(
        "wrote {} commands ({} bytes) to {}",
        args.orders,
        args.orders * std::mem::size_of::<OrderCommand>() as u64,
        args.output.display()
    );
    Ok(())
}
