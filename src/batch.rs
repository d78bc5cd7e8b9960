//! Single-pair and batched execution entry points with packed result
//! records.
//!
//! These run against a plain byte slice of the soup and never write back;
//! the caller inspects the returned stats and commits via [`commit_pair`]
//! when any math or copy operation was observed. Each packed record is a
//! 28-byte little-endian stats block followed by the post-execution tape.
//!
//! The engine's own pair path lives in the pool; these entry points exist
//! for embedding and offline analysis of soup dumps.

#![allow(dead_code)]

use crate::bff::{self, ExecStats, HaltReason};

/// Bytes occupied by the packed stats block: seven little-endian u32s.
pub const STATS_BYTES: usize = 28;

/// Result of one pair execution: the stats and the post-execution tape.
#[derive(Clone, Debug)]
pub struct PairOutcome {
    pub stats: ExecStats,
    pub tape: Vec<u8>,
}

impl PairOutcome {
    /// Append this outcome as one packed record.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.stats.steps.to_le_bytes());
        out.extend_from_slice(&self.stats.head0_count.to_le_bytes());
        out.extend_from_slice(&self.stats.head1_count.to_le_bytes());
        out.extend_from_slice(&self.stats.math_count.to_le_bytes());
        out.extend_from_slice(&self.stats.copy_count.to_le_bytes());
        out.extend_from_slice(&self.stats.loop_count.to_le_bytes());
        out.extend_from_slice(&(self.stats.halt_reason as u32).to_le_bytes());
        out.extend_from_slice(&self.tape);
    }

    /// Parse one record of `STATS_BYTES + 2 * region_size` bytes.
    pub fn decode(record: &[u8], region_size: usize) -> Option<Self> {
        let tape_len = 2 * region_size;
        if record.len() != STATS_BYTES + tape_len {
            return None;
        }
        let word = |i: usize| {
            u32::from_le_bytes([
                record[4 * i],
                record[4 * i + 1],
                record[4 * i + 2],
                record[4 * i + 3],
            ])
        };
        let halt_reason = HaltReason::from_u8(word(6) as u8)?;
        Some(Self {
            stats: ExecStats {
                steps: word(0),
                head0_count: word(1),
                head1_count: word(2),
                math_count: word(3),
                copy_count: word(4),
                loop_count: word(5),
                halt_reason,
            },
            tape: record[STATS_BYTES..].to_vec(),
        })
    }
}

/// Extract the regions at `slot_a` and `slot_b`, run the interpreter on the
/// combined `[A | B]` tape, and return stats plus the post-execution tape.
///
/// Extraction wraps modulo the soup length, so a slot near the end of the
/// buffer still yields a full region. The soup itself is untouched.
pub fn execute_pair(
    soup: &[u8],
    slot_a: usize,
    slot_b: usize,
    region_size: usize,
    head1_offset: usize,
    max_steps: u32,
) -> PairOutcome {
    let mut tape = Vec::with_capacity(2 * region_size);
    for i in 0..region_size {
        tape.push(soup[(slot_a + i) % soup.len()]);
    }
    for i in 0..region_size {
        tape.push(soup[(slot_b + i) % soup.len()]);
    }

    let stats = bff::execute_with_params(&mut tape, head1_offset, max_steps);
    PairOutcome { stats, tape }
}

/// Write an outcome's tape halves back to the soup, but only when the run
/// actually wrote (any math or copy operation).
///
/// Returns true when a commit happened.
pub fn commit_pair(soup: &mut [u8], slot_a: usize, slot_b: usize, outcome: &PairOutcome) -> bool {
    if !outcome.stats.wrote() {
        return false;
    }
    let region_size = outcome.tape.len() / 2;
    for i in 0..region_size {
        let len = soup.len();
        soup[(slot_a + i) % len] = outcome.tape[i];
        soup[(slot_b + i) % len] = outcome.tape[region_size + i];
    }
    true
}

/// Run every pair in order and return their packed records, concatenated.
pub fn execute_batch(
    soup: &[u8],
    pairs: &[(u32, u32)],
    region_size: usize,
    head1_offset: usize,
    max_steps: u32,
) -> Vec<u8> {
    let record_size = STATS_BYTES + 2 * region_size;
    let mut out = Vec::with_capacity(pairs.len() * record_size);
    for &(a, b) in pairs {
        let outcome = execute_pair(
            soup,
            a as usize,
            b as usize,
            region_size,
            head1_offset,
            max_steps,
        );
        outcome.encode_into(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_execution_is_idempotent() {
        // Same soup, same slots, no RNG anywhere: two calls must agree bit
        // for bit.
        let soup: Vec<u8> = (0..512u32).map(|i| (i * 31 + 7) as u8).collect();
        let first = execute_pair(&soup, 0, 64, 64, 64, 2048);
        let second = execute_pair(&soup, 0, 64, 64, 64, 2048);
        assert_eq!(first.stats, second.stats);
        assert_eq!(first.tape, second.tape);
    }

    #[test]
    fn test_extraction_wraps_at_soup_end() {
        let mut soup = vec![0u8; 256];
        soup[255] = b'+';
        // Region A starts 8 bytes before the end: its tail comes from the
        // front of the soup.
        let outcome = execute_pair(&soup, 248, 64, 16, 16, 1024);
        assert_eq!(outcome.tape[7], b'+');
    }

    #[test]
    fn test_record_round_trip() {
        let soup: Vec<u8> = (0..512u32).map(|i| (i * 131 + 3) as u8).collect();
        let outcome = execute_pair(&soup, 64, 192, 64, 64, 2048);
        let mut packed = Vec::new();
        outcome.encode_into(&mut packed);
        assert_eq!(packed.len(), STATS_BYTES + 128);
        let decoded = PairOutcome::decode(&packed, 64).unwrap();
        assert_eq!(decoded.stats, outcome.stats);
        assert_eq!(decoded.tape, outcome.tape);
    }

    #[test]
    fn test_record_rejects_wrong_length() {
        assert!(PairOutcome::decode(&[0u8; 27], 0).is_none());
        assert!(PairOutcome::decode(&[0u8; STATS_BYTES + 10], 64).is_none());
    }

    #[test]
    fn test_batch_concatenates_in_order() {
        let soup: Vec<u8> = (0..1024u32).map(|i| (i * 17 + 5) as u8).collect();
        let pairs = [(0u32, 128u32), (256u32, 512u32)];
        let packed = execute_batch(&soup, &pairs, 64, 64, 2048);
        let record_size = STATS_BYTES + 128;
        assert_eq!(packed.len(), 2 * record_size);

        for (i, &(a, b)) in pairs.iter().enumerate() {
            let record = &packed[i * record_size..(i + 1) * record_size];
            let decoded = PairOutcome::decode(record, 64).unwrap();
            let direct = execute_pair(&soup, a as usize, b as usize, 64, 64, 2048);
            assert_eq!(decoded.stats, direct.stats);
            assert_eq!(decoded.tape, direct.tape);
        }
    }

    #[test]
    fn test_matches_single_worker_pool_path() {
        use crate::pool::Pool;
        use crate::soup::Soup;

        // The offline entry points and the live engine path must agree: run
        // the same pair list through a one-worker pool and through
        // execute_pair + commit_pair.
        let seed_bytes: Vec<u8> = (0..255u8).map(|i| i.wrapping_mul(73).wrapping_add(29)).collect();
        let pairs = vec![(0u32, 64u32), (128u32, 320u32), (64u32, 256u32)];

        let live = Soup::zeroed(64, 8, 64, 1);
        live.buffer().write_from(0, &seed_bytes);
        let mut pool = Pool::new(1, live.buffer()).unwrap();
        let id = pool.dispatch(pairs.clone(), 64, 64, 2048);
        pool.wait(id);

        let mut offline = vec![0u8; 512];
        offline[..255].copy_from_slice(&seed_bytes);
        for &(a, b) in &pairs {
            let outcome = execute_pair(&offline, a as usize, b as usize, 64, 64, 2048);
            commit_pair(&mut offline, a as usize, b as usize, &outcome);
        }

        assert_eq!(live.snapshot_all(), offline);
    }

    #[test]
    fn test_commit_gate_blocks_writeless_runs() {
        let mut soup = vec![0u8; 256];
        soup[0] = b'>';
        let before = soup.clone();
        let outcome = execute_pair(&soup, 0, 64, 64, 64, 1024);
        assert!(!commit_pair(&mut soup, 0, 64, &outcome));
        assert_eq!(soup, before);
    }

    #[test]
    fn test_commit_applies_both_halves() {
        let mut soup = vec![0u8; 256];
        soup[0] = b'+';
        let outcome = execute_pair(&soup, 0, 64, 64, 64, 1024);
        assert!(outcome.stats.wrote());
        assert!(commit_pair(&mut soup, 0, 64, &outcome));
        assert_eq!(soup[0], 0x2C);
    }
}
