//! Worker pool amortizing interpreter calls across threads.
//!
//! Workers are spawned once and live for the pool's lifetime, each with its
//! own job channel and a shared handle to the soup buffer. A dispatched batch
//! is split into at most one contiguous pair slice per worker; each worker
//! runs its slice strictly sequentially (extract, interpret, gated
//! write-back) and reports only scalar counter sums. With a single worker a
//! batch is therefore identical to running the pairs one by one in
//! submission order.

#![allow(dead_code)]

use crate::bff;
use crate::soup::SoupBuffer;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Aggregated opcode-category sums for a set of pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub pairs: u64,
    pub steps: u64,
    pub head0: u64,
    pub head1: u64,
    pub math: u64,
    pub copy: u64,
    pub loops: u64,
}

impl BatchCounters {
    pub fn absorb(&mut self, other: &BatchCounters) {
        self.pairs += other.pairs;
        self.steps += other.steps;
        self.head0 += other.head0;
        self.head1 += other.head1;
        self.math += other.math;
        self.copy += other.copy;
        self.loops += other.loops;
    }

    fn record(&mut self, stats: &bff::ExecStats) {
        self.pairs += 1;
        self.steps += stats.steps as u64;
        self.head0 += stats.head0_count as u64;
        self.head1 += stats.head1_count as u64;
        self.math += stats.math_count as u64;
        self.copy += stats.copy_count as u64;
        self.loops += stats.loop_count as u64;
    }
}

struct Job {
    batch: u64,
    pairs: Arc<Vec<(u32, u32)>>,
    start: usize,
    end: usize,
    region_size: usize,
    head1_offset: usize,
    max_steps: u32,
}

struct PendingBatch {
    remaining: usize,
    acc: BatchCounters,
}

/// Default worker count: leave one hardware thread for the driver.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1)
}

pub struct Pool {
    senders: Vec<Sender<Job>>,
    results: Receiver<(u64, BatchCounters)>,
    handles: Vec<JoinHandle<()>>,
    pending: HashMap<u64, PendingBatch>,
    finished: Vec<(u64, BatchCounters)>,
    next_batch: u64,
}

impl Pool {
    /// Spawn `workers` threads sharing `soup`. A spawn failure is returned to
    /// the caller so the driver can refuse to start.
    pub fn new(workers: usize, soup: Arc<SoupBuffer>) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let (result_tx, results) = channel();
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for idx in 0..workers {
            let (job_tx, job_rx) = channel::<Job>();
            let tx = result_tx.clone();
            let soup = Arc::clone(&soup);
            let handle = thread::Builder::new()
                .name(format!("soup-worker-{idx}"))
                .spawn(move || worker_loop(&soup, &job_rx, &tx))?;
            senders.push(job_tx);
            handles.push(handle);
        }

        Ok(Self {
            senders,
            results,
            handles,
            pending: HashMap::new(),
            finished: Vec::new(),
            next_batch: 0,
        })
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Batches dispatched but not yet fully reported.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Split `pairs` across the workers and return the batch id. An empty
    /// pair list completes immediately.
    pub fn dispatch(
        &mut self,
        pairs: Vec<(u32, u32)>,
        region_size: usize,
        head1_offset: usize,
        max_steps: u32,
    ) -> u64 {
        let batch = self.next_batch;
        self.next_batch += 1;

        if pairs.is_empty() {
            self.finished.push((batch, BatchCounters::default()));
            return batch;
        }

        let workers = self.senders.len();
        let total = pairs.len();
        let pairs = Arc::new(pairs);
        let mut sent = 0usize;
        let mut start = 0usize;

        for (t, sender) in self.senders.iter().enumerate() {
            let chunk = total / workers + usize::from(t < total % workers);
            if chunk == 0 {
                continue;
            }
            let job = Job {
                batch,
                pairs: Arc::clone(&pairs),
                start,
                end: start + chunk,
                region_size,
                head1_offset,
                max_steps,
            };
            // A closed channel means a worker died mid-run; nothing can
            // vouch for the soup after that, so give up loudly.
            sender.send(job).expect("pool worker exited unexpectedly");
            start += chunk;
            sent += 1;
        }

        self.pending.insert(
            batch,
            PendingBatch {
                remaining: sent,
                acc: BatchCounters::default(),
            },
        );
        batch
    }

    /// Non-blocking: collect every completion that has arrived so far.
    pub fn poll(&mut self) -> Vec<(u64, BatchCounters)> {
        while let Ok((batch, counters)) = self.results.try_recv() {
            self.settle(batch, counters);
        }
        std::mem::take(&mut self.finished)
    }

    /// Block until at least one batch has fully completed, then return all
    /// completed batches. Returns an empty vec when nothing is outstanding.
    pub fn wait_any(&mut self) -> Vec<(u64, BatchCounters)> {
        while self.finished.is_empty() && !self.pending.is_empty() {
            let (batch, counters) = self
                .results
                .recv()
                .expect("pool worker exited unexpectedly");
            self.settle(batch, counters);
        }
        std::mem::take(&mut self.finished)
    }

    /// Block until a specific batch completes and return its counters. Other
    /// batches that complete in the meantime stay queued for `poll`.
    pub fn wait(&mut self, batch: u64) -> BatchCounters {
        loop {
            if let Some(pos) = self.finished.iter().position(|&(id, _)| id == batch) {
                return self.finished.swap_remove(pos).1;
            }
            let (id, counters) = self
                .results
                .recv()
                .expect("pool worker exited unexpectedly");
            self.settle(id, counters);
        }
    }

    /// Drain every outstanding batch (teardown path).
    pub fn drain(&mut self) -> Vec<(u64, BatchCounters)> {
        while !self.pending.is_empty() {
            let (batch, counters) = self
                .results
                .recv()
                .expect("pool worker exited unexpectedly");
            self.settle(batch, counters);
        }
        std::mem::take(&mut self.finished)
    }

    fn settle(&mut self, batch: u64, counters: BatchCounters) {
        let entry = self
            .pending
            .get_mut(&batch)
            .expect("completion for unknown batch");
        entry.acc.absorb(&counters);
        entry.remaining -= 1;
        if entry.remaining == 0 {
            let done = self.pending.remove(&batch).unwrap();
            self.finished.push((batch, done.acc));
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // Closing the job channels ends the worker loops; outstanding slices
        // still run to completion before the join.
        self.senders.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(soup: &SoupBuffer, jobs: &Receiver<Job>, results: &Sender<(u64, BatchCounters)>) {
    let mut tape: Vec<u8> = Vec::new();
    while let Ok(job) = jobs.recv() {
        let r = job.region_size;
        tape.resize(2 * r, 0);

        let mut counters = BatchCounters::default();
        for &(a, b) in &job.pairs[job.start..job.end] {
            let (a, b) = (a as usize, b as usize);
            soup.read_into(a, &mut tape[..r]);
            soup.read_into(b, &mut tape[r..]);

            let stats = bff::execute_with_params(&mut tape, job.head1_offset, job.max_steps);

            if stats.wrote() {
                soup.write_from(a, &tape[..r]);
                soup.write_from(b, &tape[r..]);
            }
            counters.record(&stats);
        }

        if results.send((job.batch, counters)).is_err() {
            return; // pool dropped mid-flight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soup::Soup;

    fn plant(soup: &Soup, start: usize, bytes: &[u8]) {
        soup.buffer().write_from(start, bytes);
    }

    #[test]
    fn test_dispatch_reports_pair_count() {
        let soup = Soup::zeroed(64, 8, 64, 1);
        let mut pool = Pool::new(2, soup.buffer()).unwrap();
        let batch = pool.dispatch(vec![(0, 64), (128, 192), (256, 320)], 64, 64, 1024);
        let counters = pool.wait(batch);
        assert_eq!(counters.pairs, 3);
        // All-zero tapes short-circuit: no steps at all.
        assert_eq!(counters.steps, 0);
    }

    #[test]
    fn test_write_back_gate_keeps_soup_untouched() {
        // Only head movements: the interpreter runs but never writes, so the
        // soup must stay bitwise identical.
        let soup = Soup::zeroed(64, 8, 64, 1);
        plant(&soup, 0, &[b'>', b'<', b'>', b'<']);
        let before = soup.snapshot_all();
        let mut pool = Pool::new(1, soup.buffer()).unwrap();
        let batch = pool.dispatch(vec![(0, 64)], 64, 64, 1024);
        let counters = pool.wait(batch);
        assert!(counters.head0 > 0);
        assert_eq!(counters.math + counters.copy, 0);
        assert_eq!(soup.snapshot_all(), before);
    }

    #[test]
    fn test_write_back_commits_mutated_tape() {
        let soup = Soup::zeroed(64, 8, 64, 1);
        plant(&soup, 0, &[b'+']);
        let mut pool = Pool::new(1, soup.buffer()).unwrap();
        let batch = pool.dispatch(vec![(0, 64)], 64, 64, 1024);
        let counters = pool.wait(batch);
        assert_eq!(counters.math, 1);
        // '+' at IP 0 incremented its own byte: 0x2B -> 0x2C, committed.
        assert_eq!(soup.snapshot(0, 1)[0], 0x2C);
    }

    #[test]
    fn test_single_worker_matches_sequential_execution() {
        // Overlapping pair list: the second pair reads what the first wrote.
        let seed_bytes: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();
        let pairs = vec![(0u32, 64u32), (64u32, 128u32), (0u32, 128u32)];

        let pooled = Soup::zeroed(64, 8, 64, 1);
        plant(&pooled, 0, &seed_bytes);
        plant(&pooled, 64, &seed_bytes);
        let mut pool = Pool::new(1, pooled.buffer()).unwrap();
        let batch = pool.dispatch(pairs.clone(), 64, 64, 2048);
        pool.wait(batch);

        let manual = Soup::zeroed(64, 8, 64, 1);
        plant(&manual, 0, &seed_bytes);
        plant(&manual, 64, &seed_bytes);
        let buf = manual.buffer();
        let mut tape = vec![0u8; 128];
        for &(a, b) in &pairs {
            buf.read_into(a as usize, &mut tape[..64]);
            buf.read_into(b as usize, &mut tape[64..]);
            let stats = bff::execute_with_params(&mut tape, 64, 2048);
            if stats.wrote() {
                buf.write_from(a as usize, &tape[..64]);
                buf.write_from(b as usize, &tape[64..]);
            }
        }

        assert_eq!(pooled.snapshot_all(), manual.snapshot_all());
    }

    #[test]
    fn test_multi_batch_aggregation() {
        let soup = Soup::zeroed(64, 8, 64, 1);
        plant(&soup, 0, &[b'+']);
        plant(&soup, 128, &[b'+']);
        let mut pool = Pool::new(2, soup.buffer()).unwrap();
        let first = pool.dispatch(vec![(0, 64)], 64, 64, 1024);
        let second = pool.dispatch(vec![(128, 192)], 64, 64, 1024);
        let c2 = pool.wait(second);
        let c1 = pool.wait(first);
        assert_eq!(c1.pairs, 1);
        assert_eq!(c2.pairs, 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_empty_dispatch_completes_immediately() {
        let soup = Soup::zeroed(64, 8, 64, 1);
        let mut pool = Pool::new(2, soup.buffer()).unwrap();
        let batch = pool.dispatch(Vec::new(), 64, 64, 1024);
        let counters = pool.wait(batch);
        assert_eq!(counters, BatchCounters::default());
    }

    #[test]
    fn test_drain_clears_outstanding() {
        let soup = Soup::zeroed(64, 32, 64, 1);
        let mut pool = Pool::new(3, soup.buffer()).unwrap();
        for i in 0..5u32 {
            pool.dispatch(vec![(i * 128, i * 128 + 64)], 64, 64, 1024);
        }
        let done = pool.drain();
        assert_eq!(done.len(), 5);
        assert_eq!(pool.outstanding(), 0);
    }
}
