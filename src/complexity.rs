//! Entropy and compression-based complexity estimates over soup bytes.
//!
//! Both estimates are in bits per byte: Shannon entropy from the byte
//! histogram, and a Kolmogorov-style upper bound from the DEFLATE-compressed
//! size. When self-replicators take over, the soup fills with near-identical
//! copies and the DEFLATE estimate drops well below the entropy of random
//! bytes.

use crate::bff;
use rayon::prelude::*;

/// Zero-order Shannon entropy of `data`, bits per byte.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }

    let n = data.len() as f64;
    let mut entropy = 0.0;
    for &count in &counts {
        if count > 0 {
            let p = count as f64 / n;
            entropy -= p * p.log2();
        }
    }
    entropy
}

/// Kolmogorov-complexity estimate: `8 * deflate(data).len() / data.len()`,
/// bits per byte.
pub fn kolmogorov_estimate(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let compressed = miniz_oxide::deflate::compress_to_vec(data, 6);
    compressed.len() as f64 * 8.0 / data.len() as f64
}

/// Fraction of bytes that are BFF opcodes.
pub fn opcode_fraction(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let opcodes = data.iter().filter(|&&b| bff::is_instruction(b)).count();
    opcodes as f64 / data.len() as f64
}

/// Count the regions that contain at least one opcode. Regions of pure
/// no-ops are inert until mutation seeds them.
pub fn instruction_regions(soup: &[u8], region_size: usize) -> usize {
    soup.chunks_exact(region_size)
        .filter(|region| bff::has_instructions(region))
        .count()
}

/// Number of distinct byte values present.
pub fn unique_bytes(data: &[u8]) -> usize {
    let mut seen = [false; 256];
    for &byte in data {
        seen[byte as usize] = true;
    }
    seen.iter().filter(|&&s| s).count()
}

/// Complexity figures for one window of the soup.
#[derive(Clone, Copy, Debug)]
pub struct WindowStats {
    /// Byte offset of the window in the soup.
    pub offset: usize,
    pub shannon: f64,
    pub kolmogorov: f64,
    pub opcode_fraction: f64,
}

/// Per-window complexity profile across the whole soup, computed in
/// parallel. Windows where the Kolmogorov estimate dips are replicator
/// hotspots. A trailing partial window is skipped.
pub fn window_profile(soup: &[u8], window: usize) -> Vec<WindowStats> {
    assert!(window > 0);
    soup.par_chunks_exact(window)
        .enumerate()
        .map(|(i, chunk)| WindowStats {
            offset: i * window,
            shannon: shannon_entropy(chunk),
            kolmogorov: kolmogorov_estimate(chunk),
            opcode_fraction: opcode_fraction(chunk),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_uniform_zero() {
        let data = vec![0u8; 256];
        assert_eq!(shannon_entropy(&data), 0.0);
    }

    #[test]
    fn test_shannon_entropy_max() {
        // Each byte value exactly once: 8 bits per byte.
        let data: Vec<u8> = (0..=255).collect();
        let entropy = shannon_entropy(&data);
        assert!((entropy - 8.0).abs() < 0.001);
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert_eq!(shannon_entropy(&[]), 0.0);
    }

    #[test]
    fn test_kolmogorov_orders_by_structure() {
        // A constant run compresses far better than a pseudo-random one.
        let flat = vec![b'x'; 4096];
        let noisy: Vec<u8> = (0..4096u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let k_flat = kolmogorov_estimate(&flat);
        let k_noisy = kolmogorov_estimate(&noisy);
        assert!(k_flat < 0.5, "flat data should compress hard: {k_flat}");
        assert!(k_noisy > 4.0, "noise should stay near-incompressible: {k_noisy}");
    }

    #[test]
    fn test_kolmogorov_empty() {
        assert_eq!(kolmogorov_estimate(&[]), 0.0);
    }

    #[test]
    fn test_opcode_fraction() {
        assert_eq!(opcode_fraction(b"++..xxxx"), 0.5);
        assert_eq!(opcode_fraction(b"abc"), 0.0);
        assert_eq!(opcode_fraction(&[]), 0.0);
    }

    #[test]
    fn test_unique_bytes() {
        assert_eq!(unique_bytes(&[]), 0);
        assert_eq!(unique_bytes(&[7, 7, 7]), 1);
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(unique_bytes(&all), 256);
    }

    #[test]
    fn test_instruction_regions() {
        let mut soup = vec![0u8; 256];
        assert_eq!(instruction_regions(&soup, 64), 0);
        soup[0] = b'+';
        soup[200] = b'[';
        assert_eq!(instruction_regions(&soup, 64), 2);
    }

    #[test]
    fn test_window_profile_covers_full_windows() {
        let soup = vec![0u8; 1000];
        let profile = window_profile(&soup, 256);
        assert_eq!(profile.len(), 3); // trailing 232 bytes skipped
        assert_eq!(profile[2].offset, 512);
        for w in &profile {
            assert_eq!(w.shannon, 0.0);
            assert_eq!(w.opcode_fraction, 0.0);
        }
    }
}
