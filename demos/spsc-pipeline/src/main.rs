use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow, bail};
use argh::FromArgs;
use bytesize::ByteSize;
use spsc_queue::{BoundedSpscQueue, Consumer, Producer};

#[derive(Debug, FromArgs)]
/// Stream a sequence of integers from a producer thread to a consumer thread
#[argh(help_triggers("--help"))]
struct Args {
    /// number of slots in the queue
    #[argh(option, default = "1024", arg_name = "int")]
    capacity: usize,
    /// number of values to transfer
    #[argh(option, default = "1_000_000", arg_name = "int")]
    count: u64,
    /// largest number of values pushed before the producer yields
    #[argh(option, default = "64", arg_name = "int")]
    burst: usize,
}

#[derive(Debug, Default)]
struct Stats {
    /// Attempts that found the queue full (producer) or empty (consumer).
    rejected: u64,
    elapsed: Duration,
}

pub fn main() -> Result<()> {
    let args = argh::from_env::<Args>();
    tracing_subscriber::fmt()
        .with_thread_names(true)
        .without_time()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let capacity =
        NonZeroUsize::new(args.capacity).ok_or_else(|| anyhow!("capacity must not be zero"))?;
    if args.burst == 0 {
        bail!("burst must not be zero");
    }

    let mut queue = BoundedSpscQueue::<u64>::new(capacity.get());
    let (tx, rx) = queue.split();
    let (produced, consumed) = std::thread::scope(|cx| -> Result<_> {
        let producer = std::thread::Builder::new()
            .name("producer".to_owned())
            .spawn_scoped(cx, || run_producer(tx, args.count, args.burst))?;
        let consumer = std::thread::Builder::new()
            .name("consumer".to_owned())
            .spawn_scoped(cx, || run_consumer(rx, args.count))?;

        let produced = producer
            .join()
            .map_err(|_| anyhow!("producer panicked"))?;
        let consumed = consumer
            .join()
            .map_err(|_| anyhow!("consumer panicked"))??;
        Ok((produced, consumed))
    })?;

    if !queue.is_empty() {
        bail!("{} values left in the queue", queue.len());
    }

    let bytes = args.count * size_of::<u64>() as u64;
    let secs = consumed.elapsed.as_secs_f64();
    tracing::info!(
        "transferred {} values ({}) in {:?}, rate={:.0}/s",
        args.count,
        ByteSize::b(bytes).display().iec_short(),
        consumed.elapsed,
        args.count as f64 / secs.max(f64::EPSILON),
    );
    tracing::info!(
        "rejected pushes={}, rejected pops={}, producer elapsed={:?}",
        produced.rejected,
        consumed.rejected,
        produced.elapsed,
    );

    Ok(())
}

fn run_producer(mut tx: Producer<u64>, count: u64, burst: usize) -> Stats {
    tracing::info!("started producer, capacity={}", tx.capacity());
    let mut stats = Stats::default();
    let now = Instant::now();

    let mut next = 0;
    while next < count {
        // Randomized bursts vary how often the two sides meet at the boundary.
        for _ in 0..fastrand::usize(1..=burst) {
            if next == count {
                break;
            }
            match tx.push(next) {
                Ok(()) => next += 1,
                Err(_) => {
                    stats.rejected += 1;
                    break;
                },
            }
        }
        std::thread::yield_now();
    }

    stats.elapsed = now.elapsed();
    tracing::info!("exited producer, pushed={count}");
    stats
}

fn run_consumer(mut rx: Consumer<u64>, count: u64) -> Result<Stats> {
    tracing::info!("started consumer");
    let mut stats = Stats::default();
    let now = Instant::now();

    let mut expected = 0;
    while expected < count {
        match rx.pop() {
            Some(val) if val == expected => expected += 1,
            Some(val) => bail!("received {val} out of order, expected {expected}"),
            None => {
                stats.rejected += 1;
                std::hint::spin_loop();
            },
        }
    }
    if let Some(val) = rx.pop() {
        bail!("received {val} after the last value");
    }

    stats.elapsed = now.elapsed();
    tracing::info!("exited consumer, popped={count}");
    Ok(stats)
}
