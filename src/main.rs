mod batch;
mod bff;
mod checkpoint;
mod complexity;
mod driver;
mod metrics;
mod pool;
mod soup;

use driver::{Driver, EngineParams};
use metrics::{MetricsConfig, MetricsTracker};
use serde::{Deserialize, Serialize};
use soup::Soup;
use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::time::Instant;

/// Simulation configuration (can be loaded from YAML).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub soup: SoupConfig,
    pub engine: EngineConfig,
    pub run: RunConfig,
    pub metrics: MetricsSettings,
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoupConfig {
    pub width: usize,
    pub height: usize,
    /// Bytes per region (power of two).
    pub region_size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Byte granularity of region starts (power of two, <= region_size).
    pub alignment: usize,
    /// Max pair distance as a percentage of the soup (null = unconstrained).
    pub locality_limit: Option<f64>,
    /// Initial head1 position on the combined tape (null = region_size).
    pub head1_offset: Option<usize>,
    /// Interpreter step cap per pair.
    pub max_steps: u32,
    /// Per-byte mutation probability in selected regions.
    pub mutation_rate: f64,
    /// Pairs submitted per tick.
    pub pairs_per_step: usize,
    /// Worker threads (0 = hardware threads minus one).
    pub workers: usize,
    /// Tick skips start once this many batches are in flight.
    pub max_pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop once the epoch counter reaches this value.
    pub max_epochs: u64,
    /// Epochs between status lines.
    pub status_interval: u64,
    /// Regions printed with each periodic soup sample (0 = disabled).
    pub sample_regions: usize,
    /// Window size for the final complexity profile (0 = disabled).
    pub profile_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    /// Pairs between complexity samples.
    pub interval_pairs: u64,
    /// CSV output path (empty = no file, summary only).
    pub output_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub enabled: bool,
    /// Save every N epochs (0 = only at end).
    pub interval_epochs: u64,
    pub path: String,
    /// Resume from this checkpoint file (empty = start fresh).
    pub resume_from: String,
}

impl Default for SoupConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 32768,
            region_size: 64,
            seed: 42,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alignment: 64,
            locality_limit: None,
            head1_offset: None,
            max_steps: 8192,
            mutation_rate: 0.00024,
            pairs_per_step: 1000,
            workers: 0,
            max_pending: 50,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_epochs: 10000,
            status_interval: 16,
            sample_regions: 5,
            profile_window: 4096,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_pairs: 1000,
            output_file: String::new(),
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_epochs: 1000,
            path: "checkpoints".to_string(),
            resume_from: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            soup: SoupConfig::default(),
            engine: EngineConfig::default(),
            run: RunConfig::default(),
            metrics: MetricsSettings::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn to_yaml(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn write_template(path: &str) -> Result<(), Box<dyn std::error::Error>> {
        Config::default().to_yaml(path)
    }

    /// Validate the configuration. Returns warnings, or a fatal error.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.soup.width == 0 || self.soup.height == 0 {
            return Err("soup dimensions must be non-zero".to_string());
        }
        let soup_size = self.soup.width * self.soup.height;

        let r = self.soup.region_size;
        if r == 0 || !r.is_power_of_two() {
            return Err(format!("region_size {r} must be a non-zero power of two"));
        }
        if soup_size < 2 * r {
            return Err(format!(
                "soup of {soup_size} bytes cannot hold two {r}-byte regions"
            ));
        }

        let alignment = self.engine.alignment;
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(format!("alignment {alignment} must be a non-zero power of two"));
        }
        if alignment > r {
            return Err(format!(
                "alignment {alignment} exceeds region_size {r}"
            ));
        }

        if let Some(offset) = self.engine.head1_offset {
            if offset >= 2 * r {
                return Err(format!(
                    "head1_offset {offset} is outside the combined tape of {} bytes",
                    2 * r
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.engine.mutation_rate) {
            return Err(format!(
                "mutation_rate {} must be within [0, 1]",
                self.engine.mutation_rate
            ));
        }

        if self.engine.pairs_per_step == 0 {
            return Err("pairs_per_step must be greater than 0".to_string());
        }
        if self.engine.max_steps == 0 {
            return Err("max_steps must be greater than 0".to_string());
        }

        if !self.engine.max_steps.is_power_of_two() {
            warnings.push(format!(
                "max_steps {} is not a power of two",
                self.engine.max_steps
            ));
        }

        if let Some(limit) = self.engine.locality_limit {
            if !(0.0..=100.0).contains(&limit) {
                return Err(format!("locality_limit {limit}% must be within [0, 100]"));
            }
            let window_bytes = limit * soup_size as f64 / 100.0;
            if window_bytes < r as f64 {
                warnings.push(format!(
                    "locality_limit {limit}% spans less than one region; \
                    the selection window is widened to one region"
                ));
            }
        }

        if self.metrics.enabled && self.metrics.interval_pairs < self.engine.pairs_per_step as u64 {
            warnings.push(format!(
                "metrics.interval_pairs {} is below pairs_per_step {}; \
                every batch will pay a full-soup compression pass",
                self.metrics.interval_pairs, self.engine.pairs_per_step
            ));
        }

        Ok(warnings)
    }

    fn engine_params(&self) -> EngineParams {
        EngineParams {
            pairs_per_step: self.engine.pairs_per_step,
            alignment: self.engine.alignment,
            locality_limit: self.engine.locality_limit,
            head1_offset: self.engine.head1_offset,
            max_steps: self.engine.max_steps,
            mutation_rate: self.engine.mutation_rate,
            max_pending: self.engine.max_pending,
            observe_every_pairs: self.metrics.interval_pairs,
            ..EngineParams::default()
        }
    }
}

fn parse_args() -> Config {
    let mut config = Config::default();
    let argv: Vec<String> = env::args().collect();

    // First pass: config file and template generation.
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                let config_path = &argv[i];
                match Config::from_yaml(config_path) {
                    Ok(loaded) => {
                        println!("Loaded config from: {config_path}");
                        config = loaded;
                    }
                    Err(e) => {
                        eprintln!("Error loading config file '{config_path}': {e}");
                        std::process::exit(1);
                    }
                }
            }
            "--generate-config" => {
                i += 1;
                let output_path = if i < argv.len() && !argv[i].starts_with('-') {
                    argv[i].clone()
                } else {
                    "config.yaml".to_string()
                };
                match Config::write_template(&output_path) {
                    Ok(_) => {
                        println!("Generated config template: {output_path}");
                        std::process::exit(0);
                    }
                    Err(e) => {
                        eprintln!("Error writing config template: {e}");
                        std::process::exit(1);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    // Second pass: CLI args override config file values.
    i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--config" | "-c" => {
                i += 1; // already processed
            }
            "--soup-width" | "-w" => {
                i += 1;
                config.soup.width = argv[i].parse().expect("Invalid soup-width");
            }
            "--soup-height" | "-h" => {
                i += 1;
                config.soup.height = argv[i].parse().expect("Invalid soup-height");
            }
            "--region-size" | "-r" => {
                i += 1;
                config.soup.region_size = argv[i].parse().expect("Invalid region-size");
            }
            "--seed" | "-s" => {
                i += 1;
                config.soup.seed = argv[i].parse().expect("Invalid seed");
            }
            "--alignment" | "-a" => {
                i += 1;
                config.engine.alignment = argv[i].parse().expect("Invalid alignment");
            }
            "--locality" => {
                i += 1;
                config.engine.locality_limit = match argv[i].as_str() {
                    "none" | "inf" => None,
                    s => Some(s.parse().expect("Invalid locality")),
                };
            }
            "--head1-offset" => {
                i += 1;
                config.engine.head1_offset =
                    Some(argv[i].parse().expect("Invalid head1-offset"));
            }
            "--max-steps" => {
                i += 1;
                config.engine.max_steps = argv[i].parse().expect("Invalid max-steps");
            }
            "--mutation-rate" | "-m" => {
                i += 1;
                config.engine.mutation_rate = argv[i].parse().expect("Invalid mutation-rate");
            }
            "--pairs-per-step" | "-p" => {
                i += 1;
                config.engine.pairs_per_step =
                    argv[i].parse().expect("Invalid pairs-per-step");
            }
            "--workers" => {
                i += 1;
                config.engine.workers = argv[i].parse().expect("Invalid workers");
            }
            "--max-pending" => {
                i += 1;
                config.engine.max_pending = argv[i].parse().expect("Invalid max-pending");
            }
            "--max-epochs" | "-e" => {
                i += 1;
                config.run.max_epochs = argv[i].parse().expect("Invalid max-epochs");
            }
            "--status-interval" => {
                i += 1;
                config.run.status_interval = argv[i].parse().expect("Invalid status-interval");
            }
            "--metrics" => {
                config.metrics.enabled = true;
            }
            "--metrics-csv" => {
                i += 1;
                config.metrics.enabled = true;
                config.metrics.output_file = argv[i].clone();
            }
            "--metrics-interval" => {
                i += 1;
                config.metrics.interval_pairs =
                    argv[i].parse().expect("Invalid metrics-interval");
            }
            "--checkpoint-dir" => {
                i += 1;
                config.checkpoint.enabled = true;
                config.checkpoint.path = argv[i].clone();
            }
            "--checkpoint-interval" => {
                i += 1;
                config.checkpoint.interval_epochs =
                    argv[i].parse().expect("Invalid checkpoint-interval");
            }
            "--resume" => {
                i += 1;
                config.checkpoint.resume_from = argv[i].clone();
            }
            "--resume-latest" => {
                match checkpoint::find_latest_checkpoint(&config.checkpoint.path) {
                    Some(path) => config.checkpoint.resume_from = path,
                    None => {
                        eprintln!(
                            "No checkpoint found under '{}'",
                            config.checkpoint.path
                        );
                        std::process::exit(1);
                    }
                }
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!("BFF Primordial Soup Engine");
    println!();
    println!("USAGE:");
    println!("    turing-soup [OPTIONS]");
    println!("    turing-soup --config config.yaml");
    println!("    turing-soup --generate-config [output.yaml]");
    println!();
    println!("CONFIG FILE:");
    println!("    -c, --config <FILE>       Load settings from YAML config file");
    println!("    --generate-config [FILE]  Generate template config (default: config.yaml)");
    println!();
    println!("SOUP (override config file values):");
    println!("    -w, --soup-width <N>      Soup width in bytes (default: 64)");
    println!("    -h, --soup-height <N>     Soup height (default: 32768)");
    println!("    -r, --region-size <N>     Bytes per region, power of 2 (default: 64)");
    println!("    -s, --seed <N>            Random seed (default: 42)");
    println!();
    println!("ENGINE:");
    println!("    -a, --alignment <N>       Selection alignment, power of 2 (default: 64)");
    println!("    --locality <PCT|none>     Max pair distance as % of soup (default: none)");
    println!("    --head1-offset <N>        Initial head1 tape position (default: region size)");
    println!("    --max-steps <N>           Interpreter step cap (default: 8192)");
    println!("    -m, --mutation-rate <P>   Per-byte mutation probability (default: 0.00024)");
    println!("    -p, --pairs-per-step <N>  Pairs per batch (default: 1000)");
    println!("    --workers <N>             Worker threads, 0 = auto (default: 0)");
    println!("    --max-pending <N>         In-flight batch limit (default: 50)");
    println!();
    println!("RUN:");
    println!("    -e, --max-epochs <N>      Stop at this epoch (default: 10000)");
    println!("    --status-interval <N>     Epochs between status lines (default: 16)");
    println!();
    println!("METRICS:");
    println!("    --metrics                 Enable complexity sampling");
    println!("    --metrics-csv <FILE>      Enable sampling and write CSV rows");
    println!("    --metrics-interval <N>    Pairs between samples (default: 1000)");
    println!();
    println!("CHECKPOINTS:");
    println!("    --checkpoint-dir <PATH>   Enable periodic checkpoints into PATH");
    println!("    --checkpoint-interval <N> Epochs between saves (default: 1000)");
    println!("    --resume <FILE>           Resume from a checkpoint file");
    println!("    --resume-latest           Resume from the newest checkpoint in the dir");
    println!();
    println!("    --help                    Print this help message");
}

/// Print one region with opcodes highlighted (bright white on supported
/// terminals), unprintable bytes blanked.
fn print_region(soup: &Soup, index: usize) {
    let r = soup.region_size();
    let bytes = soup.snapshot(index * r, r);
    print!("{index:6}: ");
    for &b in &bytes {
        let c = if b.is_ascii_graphic() || b == b' ' {
            b as char
        } else if b == 0 {
            '.'
        } else {
            ' '
        };
        if bff::is_instruction(b) {
            print!("\x1b[37;1m{c}\x1b[0m");
        } else {
            print!("{c}");
        }
    }
    println!();
}

fn print_top_bytes(bytes: &[u8]) {
    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }
    let mut sorted: Vec<(usize, u8)> = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, i as u8))
        .collect();
    sorted.sort_by(|a, b| b.0.cmp(&a.0));

    print!("Top bytes: ");
    for (count, byte) in sorted.iter().take(10) {
        let c = if byte.is_ascii_graphic() || *byte == b' ' {
            *byte as char
        } else {
            '.'
        };
        print!(
            "'{}'{:02X}:{:.1}% ",
            c,
            byte,
            *count as f64 / bytes.len() as f64 * 100.0
        );
    }
    println!();
}

fn print_profile(soup_bytes: &[u8], window: usize) {
    let profile = complexity::window_profile(soup_bytes, window);
    if profile.is_empty() {
        return;
    }
    let mut by_complexity = profile.clone();
    by_complexity.sort_by(|a, b| a.kolmogorov.partial_cmp(&b.kolmogorov).unwrap());

    println!("\nComplexity profile ({window}-byte windows):");
    println!("  Most compressible windows (replicator hotspots):");
    for w in by_complexity.iter().take(5) {
        println!(
            "    offset {:>9}: {:.3} bits/byte compressed, H0 {:.3}, opcodes {:.1}%",
            w.offset,
            w.kolmogorov,
            w.shannon,
            w.opcode_fraction * 100.0
        );
    }
}

fn main() {
    let config = parse_args();

    match config.validate() {
        Ok(warnings) => {
            for warning in warnings {
                eprintln!("Config warning: {warning}");
            }
        }
        Err(e) => {
            eprintln!("Config validation error: {e}");
            std::process::exit(1);
        }
    }

    let soup_size = config.soup.width * config.soup.height;
    let num_tapes = soup_size / config.soup.region_size;

    println!("BFF Primordial Soup Engine");
    println!("==========================\n");
    println!("Configuration:");
    println!(
        "  Soup: {} bytes ({}x{}, {} regions of {})",
        soup_size, config.soup.width, config.soup.height, num_tapes, config.soup.region_size
    );
    println!("  Seed: {}", config.soup.seed);
    println!("  Alignment: {}", config.engine.alignment);
    match config.engine.locality_limit {
        Some(limit) => println!("  Locality limit: {limit}% of soup"),
        None => println!("  Locality limit: unconstrained"),
    }
    println!(
        "  Head1 offset: {}",
        config.engine.head1_offset.unwrap_or(config.soup.region_size)
    );
    println!("  Max steps: {}", config.engine.max_steps);
    println!("  Mutation rate: {}", config.engine.mutation_rate);
    println!("  Pairs per step: {}", config.engine.pairs_per_step);

    let soup = Soup::new(
        config.soup.width,
        config.soup.height,
        config.soup.region_size,
        config.soup.seed,
    );

    let mut driver = match Driver::new(soup, config.engine_params(), config.engine.workers) {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("Failed to start worker pool: {e}");
            std::process::exit(1);
        }
    };
    println!("  Workers: {}\n", driver.workers());

    // Resume before the first batch is in flight.
    if !config.checkpoint.resume_from.is_empty() {
        match checkpoint::Checkpoint::load(&config.checkpoint.resume_from) {
            Ok(ckpt) => {
                if let Err(e) = ckpt.validate(
                    config.soup.width,
                    config.soup.height,
                    config.soup.region_size,
                ) {
                    eprintln!("Checkpoint validation failed: {e}");
                    std::process::exit(1);
                }
                driver.restore(&ckpt.soup, ckpt.header.pair_count);
                println!(
                    "Resumed from {} at epoch {:.1}\n",
                    config.checkpoint.resume_from,
                    driver.epoch()
                );
            }
            Err(e) => {
                eprintln!(
                    "Error loading checkpoint '{}': {e}",
                    config.checkpoint.resume_from
                );
                std::process::exit(1);
            }
        }
    }

    // Metrics consume the driver's observability samples.
    let tracker = if config.metrics.enabled {
        let metrics_config = MetricsConfig {
            enabled: true,
            interval_pairs: config.metrics.interval_pairs,
            output_path: if config.metrics.output_file.is_empty() {
                None
            } else {
                Some(config.metrics.output_file.clone())
            },
        };
        match MetricsTracker::new(metrics_config) {
            Ok(tracker) => {
                let tracker = Rc::new(RefCell::new(tracker));
                let sink = Rc::clone(&tracker);
                driver.set_observer(Box::new(move |obs| {
                    sink.borrow_mut().record(obs);
                }));
                Some(tracker)
            }
            Err(e) => {
                eprintln!("Failed to open metrics output: {e}");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    println!("Initial regions:");
    for idx in 0..config.run.sample_regions.min(num_tapes) {
        print_region(driver.soup(), idx);
    }
    println!();

    let start = Instant::now();
    let mut interval_start = start;
    let mut interval_steps = 0u64;
    let mut next_status = (driver.epoch() as u64 / config.run.status_interval.max(1) + 1)
        * config.run.status_interval.max(1);
    let mut next_checkpoint = if config.checkpoint.enabled && config.checkpoint.interval_epochs > 0
    {
        Some(
            (driver.epoch() as u64 / config.checkpoint.interval_epochs + 1)
                * config.checkpoint.interval_epochs,
        )
    } else {
        None
    };
    let mut status_count = 0u64;

    while driver.epoch() < config.run.max_epochs as f64 {
        let steps_before = driver.totals().steps;
        driver.tick();
        interval_steps += driver.totals().steps - steps_before;

        let epoch = driver.epoch() as u64;

        if epoch >= next_status {
            let now = Instant::now();
            let secs = (now - interval_start).as_secs_f64();
            let mops = interval_steps as f64 / secs.max(1e-9) / 1_000_000.0;

            let snapshot = driver.soup().snapshot_all();
            let h0 = complexity::shannon_entropy(&snapshot);
            let opcodes = complexity::opcode_fraction(&snapshot);
            let ema = driver.ema();

            println!(
                "Epoch {:10.1} | Pairs: {:12} | {:8.2} MOps/s | H0: {:.4} bits | opcodes: {:4.1}% | copy EMA: {:.1}",
                driver.epoch(),
                driver.pair_count(),
                mops,
                h0,
                opcodes * 100.0,
                ema.copy,
            );
            print_top_bytes(&snapshot);

            status_count += 1;
            if config.run.sample_regions > 0 && status_count % 16 == 0 {
                println!("\nSample regions at epoch {:.1}:", driver.epoch());
                for idx in 0..config.run.sample_regions.min(num_tapes) {
                    print_region(driver.soup(), idx);
                }
                println!();
            }

            interval_start = now;
            interval_steps = 0;
            next_status = (epoch / config.run.status_interval.max(1) + 1)
                * config.run.status_interval.max(1);
        }

        if let Some(at) = next_checkpoint {
            if epoch >= at {
                save_checkpoint(&config, &driver);
                next_checkpoint = Some(
                    (epoch / config.checkpoint.interval_epochs + 1)
                        * config.checkpoint.interval_epochs,
                );
            }
        }
    }

    driver.stop();
    driver.drain();

    if config.checkpoint.enabled {
        save_checkpoint(&config, &driver);
    }

    let elapsed = start.elapsed().as_secs_f64();
    let totals = driver.totals();
    println!("\nSimulation complete!");
    println!("  Epochs: {:.1}", driver.epoch());
    println!("  Pairs: {}", totals.pairs);
    println!("  Instructions: {}", totals.steps);
    println!(
        "  Throughput: {:.2} MOps/s over {:.1}s",
        totals.steps as f64 / elapsed.max(1e-9) / 1_000_000.0,
        elapsed
    );
    if driver.skipped_ticks() > 0 {
        println!("  Back-pressure stalls: {}", driver.skipped_ticks());
    }

    let final_soup = driver.soup().snapshot_all();
    println!(
        "  Regions with code: {} / {}",
        complexity::instruction_regions(&final_soup, config.soup.region_size),
        num_tapes
    );
    if config.run.profile_window > 0 {
        print_profile(&final_soup, config.run.profile_window);
    }

    if let Some(tracker) = tracker {
        tracker.borrow().print_summary();
    }
}

fn save_checkpoint(config: &Config, driver: &Driver) {
    let epoch = driver.epoch() as u64;
    let path = checkpoint::checkpoint_filename(&config.checkpoint.path, epoch);
    let ckpt = checkpoint::Checkpoint::new(
        config.soup.width,
        config.soup.height,
        config.soup.region_size,
        driver.pair_count(),
        config.soup.seed,
        driver.soup().snapshot_all(),
    );
    match ckpt.save(&path) {
        Ok(_) => println!("Checkpoint saved: {path}"),
        Err(e) => eprintln!("Warning: could not save checkpoint {path}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let warnings = Config::default().validate().unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let mut config = Config::default();
        config.soup.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.soup.region_size = 48; // not a power of two
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.soup.width = 64;
        config.soup.height = 1; // single region
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_engine_params() {
        let mut config = Config::default();
        config.engine.alignment = 128; // > region_size
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.mutation_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.head1_offset = Some(128); // == 2R, out of tape
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.pairs_per_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_warns_on_tiny_locality() {
        let mut config = Config::default();
        config.soup.height = 64; // 4096-byte soup
        config.engine.locality_limit = Some(0.5);
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("locality_limit")));
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let mut config = Config::default();
        config.soup.seed = 1234;
        config.engine.locality_limit = Some(12.5);
        config.metrics.enabled = true;

        let path = "/tmp/test_turing_soup_config.yaml";
        config.to_yaml(path).unwrap();
        let loaded = Config::from_yaml(path).unwrap();
        assert_eq!(loaded.soup.seed, 1234);
        assert_eq!(loaded.engine.locality_limit, Some(12.5));
        assert!(loaded.metrics.enabled);
        let _ = std::fs::remove_file(path);
    }
}
