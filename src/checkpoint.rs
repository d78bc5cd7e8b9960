//! Checkpointing: save and restore the soup mid-run.
//!
//! A checkpoint is the soup bytes plus enough metadata to validate that a
//! resume matches the running configuration. The file format is magic bytes,
//! a YAML header (human-inspectable), then the raw soup.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 5] = b"SOUPC";

/// Checkpoint metadata, validated against the config on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointHeader {
    /// Format version for forward compatibility.
    pub version: u32,
    pub soup_width: usize,
    pub soup_height: usize,
    pub region_size: usize,
    /// Completed pairs at save time; the epoch is derived from it.
    pub pair_count: u64,
    pub seed: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub header: CheckpointHeader,
    pub soup: Vec<u8>,
}

impl Checkpoint {
    pub fn new(
        soup_width: usize,
        soup_height: usize,
        region_size: usize,
        pair_count: u64,
        seed: u64,
        soup: Vec<u8>,
    ) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            header: CheckpointHeader {
                version: 1,
                soup_width,
                soup_height,
                region_size,
                pair_count,
                seed,
                timestamp,
            },
            soup,
        }
    }

    /// Save to a binary file, creating parent directories as needed.
    pub fn save(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;

        let header_yaml = serde_yaml::to_string(&self.header)?;
        let header_len = header_yaml.len() as u32;
        writer.write_all(&header_len.to_le_bytes())?;
        writer.write_all(header_yaml.as_bytes())?;

        let soup_len = self.soup.len() as u64;
        writer.write_all(&soup_len.to_le_bytes())?;
        writer.write_all(&self.soup)?;

        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err("invalid checkpoint file: bad magic bytes".into());
        }

        let mut header_len_bytes = [0u8; 4];
        reader.read_exact(&mut header_len_bytes)?;
        let header_len = u32::from_le_bytes(header_len_bytes) as usize;

        let mut header_yaml = vec![0u8; header_len];
        reader.read_exact(&mut header_yaml)?;
        let header: CheckpointHeader = serde_yaml::from_slice(&header_yaml)?;

        let mut soup_len_bytes = [0u8; 8];
        reader.read_exact(&mut soup_len_bytes)?;
        let soup_len = u64::from_le_bytes(soup_len_bytes) as usize;

        let mut soup = vec![0u8; soup_len];
        reader.read_exact(&mut soup)?;

        Ok(Self { header, soup })
    }

    /// Check that this checkpoint fits the running configuration.
    pub fn validate(
        &self,
        soup_width: usize,
        soup_height: usize,
        region_size: usize,
    ) -> Result<(), String> {
        if self.header.soup_width != soup_width {
            return Err(format!(
                "soup width mismatch: checkpoint={}, config={}",
                self.header.soup_width, soup_width
            ));
        }
        if self.header.soup_height != soup_height {
            return Err(format!(
                "soup height mismatch: checkpoint={}, config={}",
                self.header.soup_height, soup_height
            ));
        }
        if self.header.region_size != region_size {
            return Err(format!(
                "region size mismatch: checkpoint={}, config={}",
                self.header.region_size, region_size
            ));
        }
        let expected = soup_width * soup_height;
        if self.soup.len() != expected {
            return Err(format!(
                "soup size mismatch: got={}, expected={}",
                self.soup.len(),
                expected
            ));
        }
        Ok(())
    }
}

/// Epoch-stamped checkpoint filename under `base_dir`.
pub fn checkpoint_filename(base_dir: &str, epoch: u64) -> String {
    format!("{base_dir}/checkpoint_epoch_{epoch}.soup")
}

/// Find the checkpoint with the highest epoch number in a directory.
pub fn find_latest_checkpoint(base_dir: &str) -> Option<String> {
    let path = Path::new(base_dir);
    if !path.exists() {
        return None;
    }

    let mut latest: Option<(u64, String)> = None;

    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(epoch_str) = name
                    .strip_prefix("checkpoint_epoch_")
                    .and_then(|s| s.strip_suffix(".soup"))
                {
                    if let Ok(epoch) = epoch_str.parse::<u64>() {
                        if latest.is_none() || epoch > latest.as_ref().unwrap().0 {
                            latest = Some((epoch, entry.path().to_string_lossy().to_string()));
                        }
                    }
                }
            }
        }
    }

    latest.map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_round_trip() {
        let soup = vec![42u8; 64 * 100];
        let checkpoint = Checkpoint::new(64, 100, 64, 123_456, 7, soup.clone());

        let path = "/tmp/test_soup_checkpoint.soup";
        checkpoint.save(path).unwrap();

        let loaded = Checkpoint::load(path).unwrap();
        assert_eq!(loaded.header.pair_count, 123_456);
        assert_eq!(loaded.header.region_size, 64);
        assert_eq!(loaded.soup, soup);
        assert!(loaded.validate(64, 100, 64).is_ok());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_validate_rejects_geometry_mismatch() {
        let checkpoint = Checkpoint::new(64, 100, 64, 0, 7, vec![0u8; 6400]);
        assert!(checkpoint.validate(64, 100, 64).is_ok());
        assert!(checkpoint.validate(64, 101, 64).is_err());
        assert!(checkpoint.validate(64, 100, 32).is_err());
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let path = "/tmp/test_soup_bad_magic.soup";
        fs::write(path, b"NOPE!xxxxxxxx").unwrap();
        assert!(Checkpoint::load(path).is_err());
        let _ = fs::remove_file(path);
    }
}
