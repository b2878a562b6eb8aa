//! Binary event publisher.
//!
//! Drains the engines' output rings round-robin and appends the raw event
//! records to two streams: `trades.bin` (one [`TradeEvent`] per fill) and
//! `book_updates.bin` (one [`BookUpdate`] per command). The logs are
//! append-only: a written trade is a commit and is never revoked.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;
use zerocopy::AsBytes;

use crate::command::AnyEvent;
use crate::error::EngineError;
use crate::spsc::SpscRing;

pub const TRADES_FILE: &str = "trades.bin";
pub const BOOK_UPDATES_FILE: &str = "book_updates.bin";

pub struct Publisher {
    queues: Vec<Arc<SpscRing<AnyEvent>>>,
    trades_log: BufWriter<File>,
    book_log: BufWriter<File>,
    stop: Arc<AtomicBool>,
}

impl Publisher {
    /// Create the output directory and open both log streams.
    pub fn new<P: AsRef<Path>>(
        output_dir: P,
        queues: Vec<Arc<SpscRing<AnyEvent>>>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, EngineError> {
        let dir = output_dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let trades_log = BufWriter::new(File::create(dir.join(TRADES_FILE))?);
        let book_log = BufWriter::new(File::create(dir.join(BOOK_UPDATES_FILE))?);

        Ok(Self {
            queues,
            trades_log,
            book_log,
            stop,
        })
    }

    /// Drain rings until the stop flag is raised and every ring is empty.
    ///
    /// Returns the number of events written.
    pub fn run(&mut self) -> Result<u64, EngineError> {
        info!(queues = self.queues.len(), "publisher started");
        let mut total = 0u64;

        loop {
            // Sampled before the drain round: a true reading means every
            // event enqueued before shutdown is already visible, so an
            // empty round after it proves the rings are drained.
            let stopping = self.stop.load(Ordering::Acquire);
            let mut work_done = false;

            for queue in &self.queues {
                while let Some(event) = queue.pop() {
                    work_done = true;
                    total += 1;
                    match event {
                        AnyEvent::Trade(trade) => {
                            self.trades_log.write_all(trade.as_bytes())?;
                        }
                        AnyEvent::Book(update) => {
                            self.book_log.write_all(update.as_bytes())?;
                        }
                    }
                }
            }

            if !work_done {
                if stopping {
                    break;
                }
                SpscRing::<AnyEvent>::pause();
            }
        }

        self.trades_log.flush()?;
        self.book_log.flush()?;
        info!(total, "publisher finished");
        Ok(total)
    }
}
