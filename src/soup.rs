//! The soup: a flat shared byte buffer partitioned into equally sized
//! regions, plus the selection and mutation policies that drive it.
//!
//! The buffer is shared between the driver thread and the pool workers.
//! Cells are `AtomicU8` with relaxed ordering: the engine guarantees nothing
//! across concurrent pair executions beyond byte-granular writes, and a
//! barrier at the batch join makes results visible to the driver. Overlapping
//! writes under small alignments are part of the model, not an error.
//!
//! Note: some accessors are kept for API completeness even if not currently
//! used.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Flat byte store shared between the driver and the pool workers.
pub struct SoupBuffer {
    cells: Box<[AtomicU8]>,
}

impl SoupBuffer {
    pub fn new(len: usize) -> Self {
        let cells: Box<[AtomicU8]> = (0..len).map(|_| AtomicU8::new(0)).collect();
        Self { cells }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> u8 {
        self.cells[idx].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, idx: usize, value: u8) {
        self.cells[idx].store(value, Ordering::Relaxed);
    }

    /// Copy `dst.len()` bytes starting at `start` out of the buffer.
    pub fn read_into(&self, start: usize, dst: &mut [u8]) {
        for (i, slot) in dst.iter_mut().enumerate() {
            *slot = self.cells[start + i].load(Ordering::Relaxed);
        }
    }

    /// Copy `src` into the buffer starting at `start`.
    pub fn write_from(&self, start: usize, src: &[u8]) {
        for (i, &byte) in src.iter().enumerate() {
            self.cells[start + i].store(byte, Ordering::Relaxed);
        }
    }

    /// Owned copy of a byte range.
    pub fn snapshot(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.read_into(offset, &mut out);
        out
    }
}

/// The population: soup geometry, the shared buffer, and the RNG that feeds
/// initialization, pair selection and mutation.
pub struct Soup {
    buf: Arc<SoupBuffer>,
    width: usize,
    height: usize,
    region_size: usize,
    seed: u64,
    rng: StdRng,
}

impl Soup {
    /// Allocate and fill with uniform random bytes.
    pub fn new(width: usize, height: usize, region_size: usize, seed: u64) -> Self {
        let mut soup = Self::zeroed(width, height, region_size, seed);
        soup.refill();
        soup
    }

    /// Allocate with every byte zero. Useful for deterministic tests and as
    /// the landing area for a checkpoint restore.
    pub fn zeroed(width: usize, height: usize, region_size: usize, seed: u64) -> Self {
        let size = width * height;
        assert!(region_size > 0 && size >= 2 * region_size);
        Self {
            buf: Arc::new(SoupBuffer::new(size)),
            width,
            height,
            region_size,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Re-randomize every byte and reseed selection/mutation. Used by
    /// `Driver::reset`.
    pub fn refill(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        for i in 0..self.buf.len() {
            self.buf.set(i, self.rng.random());
        }
    }

    pub fn buffer(&self) -> Arc<SoupBuffer> {
        Arc::clone(&self.buf)
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    /// Number of regions at the natural (region-aligned) partition.
    pub fn num_tapes(&self) -> usize {
        self.buf.len() / self.region_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Pick two region starts for one pair execution.
    ///
    /// Starts are drawn uniformly over `alignment`-aligned positions; when
    /// `locality_limit` (percent of the soup) is given, the partner is drawn
    /// from a window around the first pick. Partners closer than one region
    /// are rejected and redrawn, so the two regions never overlap.
    pub fn select_pair(&mut self, alignment: usize, locality_limit: Option<f64>) -> (u32, u32) {
        let r = self.region_size;
        let max_start = self.buf.len() - r;
        let positions = max_start / alignment + 1;

        let pa = self.rng.random_range(0..positions);
        let a = pa * alignment;

        // Minimum aligned distance that clears a whole region. The locality
        // window is never allowed to shrink below it, otherwise no valid
        // partner would exist.
        let min_gap = r.div_ceil(alignment);

        let (lo, hi) = match locality_limit {
            Some(limit) => {
                let delta = (limit * self.buf.len() as f64 / (alignment as f64 * 100.0)) as usize;
                let delta = delta.max(min_gap);
                (pa.saturating_sub(delta), (pa + delta).min(positions - 1))
            }
            None => (0, positions - 1),
        };

        loop {
            let pb = self.rng.random_range(lo..=hi);
            let b = pb * alignment;
            if a.abs_diff(b) >= r {
                return (a as u32, b as u32);
            }
        }
    }

    /// Replace each byte of the region at `start` with a fresh random byte,
    /// independently with probability `rate`. Returns how many bytes were
    /// replaced.
    pub fn mutate_region(&mut self, start: usize, rate: f64) -> u32 {
        if rate <= 0.0 {
            return 0;
        }
        let mut mutated = 0;
        for i in start..start + self.region_size {
            if self.rng.random_bool(rate.min(1.0)) {
                self.buf.set(i, self.rng.random());
                mutated += 1;
            }
        }
        mutated
    }

    /// Read-only slice of the soup for observability and rendering.
    pub fn snapshot(&self, offset: usize, len: usize) -> Vec<u8> {
        self.buf.snapshot(offset, len)
    }

    pub fn snapshot_all(&self) -> Vec<u8> {
        self.buf.snapshot(0, self.buf.len())
    }

    /// Overwrite the whole soup, e.g. from a checkpoint.
    pub fn overwrite(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len(), self.buf.len());
        self.buf.write_from(0, bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_round_trip() {
        let buf = SoupBuffer::new(16);
        buf.write_from(4, &[1, 2, 3, 4]);
        let mut out = [0u8; 4];
        buf.read_into(4, &mut out);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(buf.snapshot(0, 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_new_soup_is_not_uniform() {
        let soup = Soup::new(64, 32, 64, 7);
        let bytes = soup.snapshot_all();
        let first = bytes[0];
        assert!(bytes.iter().any(|&b| b != first));
    }

    #[test]
    fn test_refill_is_reproducible() {
        let mut a = Soup::new(64, 8, 64, 99);
        let b = Soup::new(64, 8, 64, 99);
        let snap = a.snapshot_all();
        assert_eq!(snap, b.snapshot_all());
        a.overwrite(&vec![0u8; a.size()]);
        a.refill();
        assert_eq!(a.snapshot_all(), snap);
    }

    #[test]
    fn test_select_pair_never_overlaps() {
        // alignment = 1 is the worst case: any byte offset is a candidate.
        let mut soup = Soup::new(64, 16, 64, 3);
        for _ in 0..2000 {
            let (a, b) = soup.select_pair(1, None);
            assert!(a.abs_diff(b) >= 64, "overlap: a={a} b={b}");
            assert!(a as usize + 64 <= soup.size());
            assert!(b as usize + 64 <= soup.size());
        }
    }

    #[test]
    fn test_select_pair_respects_alignment() {
        let mut soup = Soup::new(64, 16, 64, 3);
        for _ in 0..500 {
            let (a, b) = soup.select_pair(64, None);
            assert_eq!(a % 64, 0);
            assert_eq!(b % 64, 0);
        }
    }

    #[test]
    fn test_select_pair_locality_window() {
        // 1% of a 4096-byte soup is ~40 bytes; the window is clamped up to
        // one region, so partners stay within one region of the first pick.
        let mut soup = Soup::new(64, 64, 64, 11);
        let size = soup.size();
        for _ in 0..500 {
            let (a, b) = soup.select_pair(64, Some(1.0));
            let dist = a.abs_diff(b) as usize;
            assert!(dist >= 64);
            assert!(dist <= size / 100 + 64, "pair too far apart: {dist}");
        }
    }

    #[test]
    fn test_mutate_region_stays_in_region() {
        let mut soup = Soup::zeroed(64, 8, 64, 5);
        // rate 1.0: every byte of the region is redrawn, neighbors untouched.
        soup.mutate_region(64, 1.0);
        let bytes = soup.snapshot_all();
        assert!(bytes[..64].iter().all(|&b| b == 0));
        assert!(bytes[128..].iter().all(|&b| b == 0));
        assert!(bytes[64..128].iter().any(|&b| b != 0));
    }

    #[test]
    fn test_mutate_region_zero_rate_is_noop() {
        let mut soup = Soup::new(64, 8, 64, 5);
        let before = soup.snapshot_all();
        assert_eq!(soup.mutate_region(0, 0.0), 0);
        assert_eq!(soup.snapshot_all(), before);
    }
}
