//! Driver: ties the soup, the pool and the runtime parameters together.
//!
//! Each tick drains finished batches, applies mutation to the regions those
//! batches touched, advances the epoch, and submits the next batch unless
//! too many are already in flight. Mutation never happens inside the
//! interpreter or the workers; it is a driver-side pass over the selected
//! regions after their batch completes.
//!
//! Note: some methods are kept for API completeness even if the engine
//! binary does not currently call them.

#![allow(dead_code)]

use crate::complexity;
use crate::pool::{default_workers, BatchCounters, Pool};
use crate::soup::Soup;
use std::collections::HashMap;

/// Runtime-tunable engine parameters.
#[derive(Clone, Debug)]
pub struct EngineParams {
    /// Pairs submitted per tick.
    pub pairs_per_step: usize,
    /// Byte granularity of region starts (power of two, at most the region
    /// size).
    pub alignment: usize,
    /// Max pair distance as a percentage of the soup; None = unconstrained.
    pub locality_limit: Option<f64>,
    /// Initial head1 position on the combined tape; None = region size
    /// (start of region B).
    pub head1_offset: Option<usize>,
    /// Interpreter step cap.
    pub max_steps: u32,
    /// Per-byte mutation probability for selected regions.
    pub mutation_rate: f64,
    /// Tick skips start once this many batches are in flight.
    pub max_pending: usize,
    /// Observation callback cadence, in completed pairs.
    pub observe_every_pairs: u64,
    /// Smoothing factor for the per-category EMAs.
    pub ema_alpha: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            pairs_per_step: 1000,
            alignment: 64,
            locality_limit: None,
            head1_offset: None,
            max_steps: 8192,
            mutation_rate: 0.00024,
            max_pending: 50,
            observe_every_pairs: 1000,
            ema_alpha: 0.1,
        }
    }
}

/// Exponentially smoothed per-pair averages of the opcode categories.
#[derive(Clone, Copy, Debug, Default)]
pub struct CategoryEma {
    pub head0: f64,
    pub head1: f64,
    pub math: f64,
    pub copy: f64,
    pub loops: f64,
    primed: bool,
}

impl CategoryEma {
    fn update(&mut self, counters: &BatchCounters, alpha: f64) {
        if counters.pairs == 0 {
            return;
        }
        let n = counters.pairs as f64;
        let sample = [
            counters.head0 as f64 / n,
            counters.head1 as f64 / n,
            counters.math as f64 / n,
            counters.copy as f64 / n,
            counters.loops as f64 / n,
        ];
        if !self.primed {
            self.head0 = sample[0];
            self.head1 = sample[1];
            self.math = sample[2];
            self.copy = sample[3];
            self.loops = sample[4];
            self.primed = true;
        } else {
            self.head0 += alpha * (sample[0] - self.head0);
            self.head1 += alpha * (sample[1] - self.head1);
            self.math += alpha * (sample[2] - self.math);
            self.copy += alpha * (sample[3] - self.copy);
            self.loops += alpha * (sample[4] - self.loops);
        }
    }
}

/// Snapshot-derived complexity figures handed to the observability callback.
#[derive(Clone, Copy, Debug)]
pub struct SoupObservation {
    pub pair_count: u64,
    pub epoch: f64,
    /// Shannon entropy of the soup, bits per byte.
    pub shannon: f64,
    /// DEFLATE-based complexity estimate, bits per byte.
    pub kolmogorov: f64,
    /// Fraction of soup bytes that are BFF opcodes.
    pub opcode_fraction: f64,
    pub unique_bytes: usize,
    /// Regions containing at least one opcode byte.
    pub instruction_regions: usize,
    pub ema: CategoryEma,
}

type Observer = Box<dyn FnMut(&SoupObservation)>;

pub struct Driver {
    soup: Soup,
    pool: Pool,
    params: EngineParams,
    running: bool,
    pair_count: u64,
    totals: BatchCounters,
    ema: CategoryEma,
    skipped_ticks: u64,
    in_flight: HashMap<u64, Vec<(u32, u32)>>,
    observer: Option<Observer>,
    next_observation: u64,
}

impl Driver {
    /// Build a driver with its worker pool. Pool spawn failures are surfaced
    /// here; the driver refuses to start without its workers.
    pub fn new(soup: Soup, params: EngineParams, workers: usize) -> std::io::Result<Self> {
        let workers = if workers == 0 { default_workers() } else { workers };
        let observe = params.observe_every_pairs.max(1);
        let pool = Pool::new(workers, soup.buffer())?;
        Ok(Self {
            soup,
            pool,
            params,
            running: true,
            pair_count: 0,
            totals: BatchCounters::default(),
            ema: CategoryEma::default(),
            skipped_ticks: 0,
            in_flight: HashMap::new(),
            observer: None,
            next_observation: observe,
        })
    }

    /// One cooperative scheduling step.
    ///
    /// Completions are drained first; when the in-flight count has reached
    /// `max_pending` the tick blocks for one completion instead of queuing
    /// more work. While running, one batch of `pairs_per_step` pairs is then
    /// selected and dispatched.
    pub fn tick(&mut self) {
        for (id, counters) in self.pool.poll() {
            self.finish_batch(id, &counters);
        }

        if self.pool.outstanding() >= self.params.max_pending {
            self.skipped_ticks += 1;
            for (id, counters) in self.pool.wait_any() {
                self.finish_batch(id, &counters);
            }
        }

        if !self.running {
            return;
        }

        let pairs = self.select_batch();
        let id = self.dispatch(pairs.clone());
        self.in_flight.insert(id, pairs);
    }

    /// Select, run and account one batch synchronously.
    pub fn run_step(&mut self) -> BatchCounters {
        let pairs = self.select_batch();
        let id = self.dispatch(pairs.clone());
        self.in_flight.insert(id, pairs);
        let counters = self.pool.wait(id);
        self.finish_batch(id, &counters);
        counters
    }

    fn select_batch(&mut self) -> Vec<(u32, u32)> {
        let alignment = self.params.alignment;
        let locality = self.params.locality_limit;
        (0..self.params.pairs_per_step)
            .map(|_| self.soup.select_pair(alignment, locality))
            .collect()
    }

    fn dispatch(&mut self, pairs: Vec<(u32, u32)>) -> u64 {
        let r = self.soup.region_size();
        let head1 = self.params.head1_offset.unwrap_or(r);
        self.pool.dispatch(pairs, r, head1, self.params.max_steps)
    }

    fn finish_batch(&mut self, id: u64, counters: &BatchCounters) {
        if let Some(pairs) = self.in_flight.remove(&id) {
            let rate = self.params.mutation_rate;
            for &(a, b) in &pairs {
                self.soup.mutate_region(a as usize, rate);
                self.soup.mutate_region(b as usize, rate);
            }
        }

        self.pair_count += counters.pairs;
        self.totals.absorb(counters);
        self.ema.update(counters, self.params.ema_alpha);

        if self.observer.is_some() && self.pair_count >= self.next_observation {
            let obs = self.observe();
            if let Some(observer) = self.observer.as_mut() {
                observer(&obs);
            }
            let every = self.params.observe_every_pairs.max(1);
            self.next_observation = (self.pair_count / every + 1) * every;
        }
    }

    /// Compute the current complexity figures from a soup snapshot.
    pub fn observe(&self) -> SoupObservation {
        let bytes = self.soup.snapshot_all();
        SoupObservation {
            pair_count: self.pair_count,
            epoch: self.epoch(),
            shannon: complexity::shannon_entropy(&bytes),
            kolmogorov: complexity::kolmogorov_estimate(&bytes),
            opcode_fraction: complexity::opcode_fraction(&bytes),
            unique_bytes: complexity::unique_bytes(&bytes),
            instruction_regions: complexity::instruction_regions(&bytes, self.soup.region_size()),
            ema: self.ema,
        }
    }

    pub fn set_observer(&mut self, observer: Observer) {
        self.observer = Some(observer);
    }

    /// Stop submitting new batches; outstanding ones still complete.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Wait for every outstanding batch and fold it in.
    pub fn drain(&mut self) {
        for (id, counters) in self.pool.drain() {
            self.finish_batch(id, &counters);
        }
    }

    /// Drain, re-randomize the soup, zero all counters.
    pub fn reset(&mut self) {
        self.drain();
        self.soup.refill();
        self.pair_count = 0;
        self.totals = BatchCounters::default();
        self.ema = CategoryEma::default();
        self.skipped_ticks = 0;
        self.next_observation = self.params.observe_every_pairs.max(1);
    }

    /// Restore soup contents and pair count (checkpoint resume).
    pub fn restore(&mut self, soup_bytes: &[u8], pair_count: u64) {
        self.drain();
        self.soup.overwrite(soup_bytes);
        self.pair_count = pair_count;
    }

    // Parameter setters; all take effect on the next dispatched batch.

    pub fn set_pairs_per_step(&mut self, value: usize) {
        self.params.pairs_per_step = value.max(1);
    }

    pub fn set_alignment(&mut self, value: usize) {
        self.params.alignment = value.max(1);
    }

    pub fn set_locality_limit(&mut self, value: Option<f64>) {
        self.params.locality_limit = value;
    }

    pub fn set_head1_offset(&mut self, value: Option<usize>) {
        self.params.head1_offset = value;
    }

    pub fn set_max_steps(&mut self, value: u32) {
        self.params.max_steps = value;
    }

    pub fn set_mutation_rate(&mut self, value: f64) {
        self.params.mutation_rate = value.clamp(0.0, 1.0);
    }

    pub fn set_max_pending(&mut self, value: usize) {
        self.params.max_pending = value.max(1);
    }

    // Read-only state.

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn soup(&self) -> &Soup {
        &self.soup
    }

    pub fn pair_count(&self) -> u64 {
        self.pair_count
    }

    /// Normalized progress: completed pairs divided by the number of regions.
    pub fn epoch(&self) -> f64 {
        self.pair_count as f64 / self.soup.num_tapes() as f64
    }

    pub fn totals(&self) -> &BatchCounters {
        &self.totals
    }

    pub fn ema(&self) -> &CategoryEma {
        &self.ema
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding()
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.running = false;
        self.drain();
    }
}
