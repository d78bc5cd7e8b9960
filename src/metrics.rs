//! Metrics for tracking the emergence of self-replicators.
//!
//! Consumes the driver's observability samples and logs them to CSV. The
//! key signal is the DEFLATE complexity estimate: random soup sits near 8
//! bits/byte, while a soup overrun by copies of the same program compresses
//! far below its early baseline. A sustained drop marks emergence.

#![allow(dead_code)] // metrics are conditionally used based on config

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use crate::driver::SoupObservation;

/// How far below the baseline the complexity estimate must fall.
const EMERGENCE_BASELINE_FRACTION: f64 = 0.5;
/// Consecutive depressed samples required before declaring emergence.
const EMERGENCE_SAMPLES: usize = 5;

/// Configuration for metrics collection.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Pairs between samples (mirrors the driver's observation cadence).
    pub interval_pairs: u64,
    /// Path to CSV output file (None = stdout summary only).
    pub output_path: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_pairs: 1000,
            output_path: None,
        }
    }
}

/// One collected sample.
#[derive(Clone, Debug)]
pub struct SampleRow {
    pub pair_count: u64,
    pub epoch: f64,
    pub shannon: f64,
    pub kolmogorov: f64,
    pub opcode_fraction: f64,
    pub unique_bytes: usize,
    pub instruction_regions: usize,
    pub copy_ema: f64,
    pub loop_ema: f64,
}

impl SampleRow {
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{:.3},{:.4},{:.4},{:.4},{},{},{:.2},{:.2}",
            self.pair_count,
            self.epoch,
            self.shannon,
            self.kolmogorov,
            self.opcode_fraction,
            self.unique_bytes,
            self.instruction_regions,
            self.copy_ema,
            self.loop_ema,
        )
    }

    pub fn csv_header() -> &'static str {
        "pair_count,epoch,shannon_bits,kolmogorov_bits,opcode_fraction,unique_bytes,instruction_regions,copy_ema,loop_ema"
    }
}

/// Collects observation samples, writes CSV, and watches for the complexity
/// drop that signals replicator takeover.
pub struct MetricsTracker {
    config: MetricsConfig,
    csv_writer: Option<BufWriter<File>>,
    history: Vec<SampleRow>,
    baseline: Option<f64>,
    depressed_count: usize,
    emergence_pair_count: Option<u64>,
}

impl MetricsTracker {
    pub fn new(config: MetricsConfig) -> std::io::Result<Self> {
        let csv_writer = if let Some(ref path) = config.output_path {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{}", SampleRow::csv_header())?;
            Some(writer)
        } else {
            None
        };

        Ok(Self {
            config,
            csv_writer,
            history: Vec::new(),
            baseline: None,
            depressed_count: 0,
            emergence_pair_count: None,
        })
    }

    /// Fold in one driver observation.
    pub fn record(&mut self, obs: &SoupObservation) {
        let row = SampleRow {
            pair_count: obs.pair_count,
            epoch: obs.epoch,
            shannon: obs.shannon,
            kolmogorov: obs.kolmogorov,
            opcode_fraction: obs.opcode_fraction,
            unique_bytes: obs.unique_bytes,
            instruction_regions: obs.instruction_regions,
            copy_ema: obs.ema.copy,
            loop_ema: obs.ema.loops,
        };

        // The first samples come from near-random soup; their complexity is
        // the baseline the drop is measured against.
        if self.baseline.is_none() {
            self.baseline = Some(obs.kolmogorov);
        }

        if self.emergence_pair_count.is_none() {
            let baseline = self.baseline.unwrap_or(8.0);
            if obs.kolmogorov < baseline * EMERGENCE_BASELINE_FRACTION {
                self.depressed_count += 1;
                if self.depressed_count >= EMERGENCE_SAMPLES {
                    self.emergence_pair_count = Some(obs.pair_count);
                    eprintln!(
                        "Replicator emergence at epoch {:.1}: complexity {:.2} bits/byte (baseline {:.2})",
                        obs.epoch, obs.kolmogorov, baseline
                    );
                }
            } else {
                self.depressed_count = 0;
            }
        }

        if let Some(ref mut writer) = self.csv_writer {
            let _ = writeln!(writer, "{}", row.to_csv_row());
            let _ = writer.flush();
        }

        self.history.push(row);
    }

    /// Pair count at which emergence was declared, if it was.
    pub fn emergence_pair_count(&self) -> Option<u64> {
        self.emergence_pair_count
    }

    pub fn history(&self) -> &[SampleRow] {
        &self.history
    }

    pub fn print_summary(&self) {
        let (Some(first), Some(last)) = (self.history.first(), self.history.last()) else {
            return;
        };

        println!("\nMetrics summary ({} samples):", self.history.len());
        println!(
            "  Epoch:            {:>10.1} -> {:>10.1}",
            first.epoch, last.epoch
        );
        println!(
            "  Shannon entropy:  {:>10.4} -> {:>10.4} bits/byte",
            first.shannon, last.shannon
        );
        println!(
            "  Complexity est.:  {:>10.4} -> {:>10.4} bits/byte",
            first.kolmogorov, last.kolmogorov
        );
        println!(
            "  Opcode fraction:  {:>9.1}% -> {:>9.1}%",
            first.opcode_fraction * 100.0,
            last.opcode_fraction * 100.0
        );
        println!(
            "  Unique bytes:     {:>10} -> {:>10}",
            first.unique_bytes, last.unique_bytes
        );
        println!(
            "  Regions w/ code:  {:>10} -> {:>10}",
            first.instruction_regions, last.instruction_regions
        );
        if let Some(pairs) = self.emergence_pair_count {
            println!("  Replicator emergence detected after {pairs} pairs");
        }
        if let Some(ref path) = self.config.output_path {
            println!("  Metrics saved to: {path}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CategoryEma;

    fn obs(pair_count: u64, kolmogorov: f64) -> SoupObservation {
        SoupObservation {
            pair_count,
            epoch: pair_count as f64 / 100.0,
            shannon: 7.9,
            kolmogorov,
            opcode_fraction: 0.04,
            unique_bytes: 256,
            instruction_regions: 1000,
            ema: CategoryEma::default(),
        }
    }

    #[test]
    fn test_emergence_needs_sustained_drop() {
        let mut tracker = MetricsTracker::new(MetricsConfig::default()).unwrap();
        tracker.record(&obs(1000, 8.0)); // baseline
        for i in 0..4 {
            tracker.record(&obs(2000 + i * 1000, 3.0));
        }
        // One recovery resets the streak.
        tracker.record(&obs(6000, 7.5));
        for i in 0..4 {
            tracker.record(&obs(7000 + i * 1000, 3.0));
        }
        assert!(tracker.emergence_pair_count().is_none());
        tracker.record(&obs(11000, 3.0));
        assert_eq!(tracker.emergence_pair_count(), Some(11000));
    }

    #[test]
    fn test_no_emergence_on_flat_complexity() {
        let mut tracker = MetricsTracker::new(MetricsConfig::default()).unwrap();
        for i in 0..20 {
            tracker.record(&obs(1000 * (i + 1), 7.8));
        }
        assert!(tracker.emergence_pair_count().is_none());
        assert_eq!(tracker.history().len(), 20);
    }

    #[test]
    fn test_csv_row_shape() {
        let row = SampleRow {
            pair_count: 5000,
            epoch: 1.25,
            shannon: 7.5,
            kolmogorov: 6.25,
            opcode_fraction: 0.039,
            unique_bytes: 255,
            instruction_regions: 900,
            copy_ema: 12.5,
            loop_ema: 3.25,
        };
        let line = row.to_csv_row();
        assert_eq!(line.split(',').count(), SampleRow::csv_header().split(',').count());
        assert!(line.starts_with("5000,1.250,"));
    }
}
