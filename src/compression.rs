//! Compression module for the audit vault.
//!
//! Archive payloads are gzip-compressed before they are encrypted. Audit
//! records are highly repetitive JSON, so this usually shrinks the stored
//! ciphertext several-fold.

use crate::error::{Result, VaultError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compression configuration.
#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    /// gzip level (0 = store, 9 = best).
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl CompressionConfig {
    /// Fast compression (prioritize speed).
    pub fn fast() -> Self {
        Self { level: 1 }
    }

    /// Best compression (prioritize ratio).
    pub fn best() -> Self {
        Self { level: 9 }
    }
}

/// Compressed payload together with its size accounting.
#[derive(Debug, Clone)]
pub struct CompressedData {
    /// Original (uncompressed) size.
    pub original_size: u64,
    /// Compressed bytes.
    pub data: Vec<u8>,
}

impl CompressedData {
    /// Compressed size.
    pub fn compressed_size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// gzip compressor.
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    config: CompressionConfig,
}

impl Compressor {
    /// Create a new compressor.
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    /// Compress data.
    pub fn compress(&self, data: &[u8]) -> Result<CompressedData> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(data.len() / 2),
            Compression::new(self.config.level.min(9)),
        );
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        Ok(CompressedData {
            original_size: data.len() as u64,
            data: compressed,
        })
    }

    /// Decompress data, refusing to inflate past `expected_size` bytes.
    pub fn decompress(&self, data: &[u8], expected_size: u64) -> Result<Vec<u8>> {
        let decoder = GzDecoder::new(data);
        let mut out = Vec::with_capacity(expected_size.min(64 * 1024 * 1024) as usize);
        // One extra byte so an oversized stream is detectable.
        decoder.take(expected_size.saturating_add(1)).read_to_end(&mut out)?;

        if out.len() as u64 != expected_size {
            return Err(VaultError::InvalidState(format!(
                "decompressed size {} does not match recorded size {}",
                out.len(),
                expected_size
            )));
        }

        Ok(out)
    }
}
