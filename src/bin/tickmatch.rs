//! Replay process: mmap a binary feed file and run one matching engine per
//! symbol, publishing trades and book updates to binary logs.
//!
//! Thread layout mirrors the data flow: the feed reader fans commands out
//! to per-symbol rings, each engine owns one symbol on its own (optionally
//! pinned) thread, and the publisher drains every output ring into the log
//! files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use tickmatch::engine::pin_to_core;
use tickmatch::{
    AnyEvent, DenseLadder, EngineError, FeedReader, OrderBook, OrderCommand, PriceBand, Publisher,
    RingSink, SpscRing, SymbolEngine,
};

const COMMAND_RING_CAPACITY: usize = 65_536;
const EVENT_RING_CAPACITY: usize = 65_536;

#[derive(Parser, Debug)]
#[command(name = "tickmatch", about = "Replay a binary order feed through the matching engine")]
struct Args {
    /// Input binary order file
    #[arg(long)]
    input: PathBuf,

    /// Comma-separated symbol names; position defines the symbol id
    #[arg(long, value_delimiter = ',', required = true)]
    symbols: Vec<String>,

    /// Output directory for trades.bin / book_updates.bin
    #[arg(long, default_value = "results")]
    output: PathBuf,

    /// Valid tick range as min:max
    #[arg(long, default_value = "1:100000", value_parser = parse_price_band)]
    price_band: PriceBand,

    /// Comma-separated CPU cores: feed, engines..., publisher
    #[arg(long, value_delimiter = ',')]
    cpu_cores: Vec<usize>,
}

fn parse_price_band(s: &str) -> Result<PriceBand, EngineError> {
    let bad = || EngineError::InvalidPriceBand(s.to_string());
    let (min, max) = s.split_once(':').ok_or_else(bad)?;
    let min = min.trim().parse().map_err(|_| bad())?;
    let max = max.trim().parse().map_err(|_| bad())?;
    if min >= max {
        return Err(bad());
    }
    Ok(PriceBand::new(min, max))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Usage problems exit 1, matching the process contract.
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if args.symbols.is_empty() {
        eprintln!("error: --symbols must name at least one symbol");
        std::process::exit(1);
    }

    let feed = FeedReader::open(&args.input)
        .with_context(|| format!("opening feed {}", args.input.display()))?;

    info!(
        symbols = ?args.symbols,
        records = feed.record_count(),
        output = %args.output.display(),
        "starting replay"
    );

    let num_symbols = args.symbols.len();
    let input_queues: Vec<Arc<SpscRing<OrderCommand>>> = (0..num_symbols)
        .map(|_| Arc::new(SpscRing::with_capacity(COMMAND_RING_CAPACITY)))
        .collect();
    let output_queues: Vec<Arc<SpscRing<AnyEvent>>> = (0..num_symbols)
        .map(|_| Arc::new(SpscRing::with_capacity(EVENT_RING_CAPACITY)))
        .collect();

    let feed_done = Arc::new(AtomicBool::new(false));
    let engines_done = Arc::new(AtomicBool::new(false));

    let mut publisher = Publisher::new(
        &args.output,
        output_queues.clone(),
        Arc::clone(&engines_done),
    )?;

    // Publisher takes the last configured core.
    let publisher_core = (args.cpu_cores.len() > num_symbols + 1)
        .then(|| *args.cpu_cores.last().expect("length checked"));
    let publisher_thread = std::thread::Builder::new()
        .name("publisher".into())
        .spawn(move || {
            if let Some(core) = publisher_core {
                pin_to_core(core);
            }
            publisher.run()
        })?;

    // One engine per symbol on cores[1..=N].
    let mut engine_threads = Vec::with_capacity(num_symbols);
    for (i, symbol) in args.symbols.iter().enumerate() {
        let book = OrderBook::new(
            i as u32,
            DenseLadder::new(args.price_band),
            DenseLadder::new(args.price_band),
            RingSink::new(Arc::clone(&output_queues[i])),
        );
        let mut engine = SymbolEngine::new(
            book,
            Arc::clone(&input_queues[i]),
            Arc::clone(&feed_done),
        );
        let core = args.cpu_cores.get(i + 1).copied();
        let name = format!("engine-{symbol}");
        engine_threads.push(
            std::thread::Builder::new().name(name).spawn(move || {
                if let Some(core) = core {
                    pin_to_core(core);
                }
                engine.run()
            })?,
        );
    }

    // Feed runs on the first configured core, in this thread.
    if let Some(&core) = args.cpu_cores.first() {
        pin_to_core(core);
    }
    let dispatched = feed.run(&input_queues);
    feed_done.store(true, Ordering::Release);

    let mut processed = 0u64;
    for handle in engine_threads {
        processed += handle.join().expect("engine thread panicked");
    }
    engines_done.store(true, Ordering::Release);

    let events = publisher_thread
        .join()
        .expect("publisher thread panicked")?;

    info!(dispatched, processed, events, "replay complete");
    Ok(())
}
