//! Memory-mapped feed reader.
//!
//! A feed file is a flat array of [`OrderCommand`] records in native
//! endianness. The reader maps the file, casts it to a record slice
//! without copying and fans commands out to per-symbol SPSC rings,
//! busy-waiting when a ring is full. Records that fail validation
//! (unknown symbol, undecodable enum bytes) are counted and skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use tracing::{debug, info, warn};
use zerocopy::FromBytes;

use crate::command::OrderCommand;
use crate::error::EngineError;
use crate::spsc::SpscRing;

const RECORD_SIZE: usize = std::mem::size_of::<OrderCommand>();

pub struct FeedReader {
    path: PathBuf,
    mmap: Mmap,
}

impl FeedReader {
    /// Map a feed file. The mapping is advised for sequential access.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path)?;
        // The file is never written through this mapping.
        let mmap = unsafe { Mmap::map(&file)? };

        #[cfg(unix)]
        let _ = mmap.advise(memmap2::Advice::Sequential);

        if mmap.len() % RECORD_SIZE != 0 {
            warn!(
                path = %path.display(),
                trailing = mmap.len() % RECORD_SIZE,
                "feed file ends in a partial record; trailing bytes ignored"
            );
        }

        Ok(Self { path, mmap })
    }

    /// The mapped records, excluding any trailing partial record.
    pub fn commands(&self) -> &[OrderCommand] {
        let whole = self.mmap.len() / RECORD_SIZE * RECORD_SIZE;
        OrderCommand::slice_from(&self.mmap[..whole]).unwrap_or(&[])
    }

    pub fn record_count(&self) -> usize {
        self.mmap.len() / RECORD_SIZE
    }

    /// Pump every record into its symbol's ring, in file order.
    ///
    /// Blocks (spinning) while a destination ring is full, so the feed can
    /// never reorder or drop a valid command. Returns the number of
    /// commands dispatched.
    pub fn run(&self, queues: &[Arc<SpscRing<OrderCommand>>]) -> u64 {
        info!(
            path = %self.path.display(),
            records = self.record_count(),
            "feed reader started"
        );

        let mut dispatched = 0u64;
        let mut skipped = 0u64;

        for cmd in self.commands() {
            if !cmd.is_well_formed() {
                skipped += 1;
                continue;
            }
            let Some(queue) = queues.get(cmd.symbol_id as usize) else {
                skipped += 1;
                continue;
            };

            while !queue.push(*cmd) {
                SpscRing::<OrderCommand>::pause();
            }

            dispatched += 1;
            if dispatched % 1_000_000 == 0 {
                debug!(dispatched, "feed progress");
            }
        }

        info!(dispatched, skipped, "feed reader finished");
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{flags, OrderType, Side, TimeInForce};
    use std::io::Write;
    use zerocopy::AsBytes;

    fn write_feed(cmds: &[OrderCommand], extra_bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for cmd in cmds {
            file.write_all(cmd.as_bytes()).unwrap();
        }
        file.write_all(extra_bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn new_order(id: u64, symbol: u32) -> OrderCommand {
        OrderCommand::new_order(
            id,
            1,
            symbol,
            Side::Bid,
            100,
            10,
            OrderType::Limit,
            TimeInForce::Gtc,
            flags::NONE,
            id,
        )
    }

    #[test]
    fn test_maps_whole_records() {
        let cmds = vec![new_order(1, 0), new_order(2, 0), new_order(3, 0)];
        let file = write_feed(&cmds, &[]);

        let reader = FeedReader::open(file.path()).unwrap();
        assert_eq!(reader.record_count(), 3);
        let mapped = reader.commands();
        assert_eq!(mapped.len(), 3);
        assert_eq!(mapped[1].order_id, 2);
    }

    #[test]
    fn test_ignores_trailing_partial_record() {
        let cmds = vec![new_order(1, 0)];
        let file = write_feed(&cmds, &[0xAA; 17]);

        let reader = FeedReader::open(file.path()).unwrap();
        assert_eq!(reader.commands().len(), 1);
    }

    #[test]
    fn test_dispatch_routes_by_symbol_and_skips_invalid() {
        let mut bad = new_order(99, 0);
        bad.side = 7; // corrupt

        let cmds = vec![
            new_order(1, 0),
            new_order(2, 1),
            new_order(3, 5), // unknown symbol
            bad,
            new_order(4, 0),
        ];
        let file = write_feed(&cmds, &[]);
        let reader = FeedReader::open(file.path()).unwrap();

        let queues: Vec<Arc<SpscRing<OrderCommand>>> = (0..2)
            .map(|_| Arc::new(SpscRing::with_capacity(16)))
            .collect();

        assert_eq!(reader.run(&queues), 3);

        let q0: Vec<u64> = std::iter::from_fn(|| queues[0].pop().map(|c| c.order_id)).collect();
        let q1: Vec<u64> = std::iter::from_fn(|| queues[1].pop().map(|c| c.order_id)).collect();
        assert_eq!(q0, vec![1, 4]);
        assert_eq!(q1, vec![2]);
    }
}
