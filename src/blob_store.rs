//! Encrypted blob store.
//!
//! Each archive payload is compressed, sealed under its own data key and
//! written once as `blob_dir/<archive_id>.enc`. Key material goes through the
//! [`KeyVault`] and never lands in `blob_dir`. The store knows nothing about
//! retention; callers keep the returned digest in the catalog.

use crate::compression::{CompressionConfig, Compressor};
use crate::encryption;
use crate::error::{Result, VaultError};
use crate::keys::KeyVault;
use crate::types::RecordCategory;
use ring::rand::SystemRandom;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const BLOB_EXT: &str = "enc";

/// Result of storing one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Key vault reference for the data key.
    pub key_id: String,
    /// Hex integrity digest over the sealed bytes.
    pub integrity_digest: String,
    /// Original payload size.
    pub payload_size: u64,
    /// Size after compression.
    pub compressed_size: u64,
    /// Size of the file on disk (nonce, ciphertext and tag).
    pub stored_size: u64,
}

/// Encrypted-at-rest payload storage.
pub struct EncryptedBlobStore {
    blob_dir: PathBuf,
    keys: Arc<dyn KeyVault>,
    compressor: Compressor,
    rng: SystemRandom,
}

impl EncryptedBlobStore {
    /// Create a new blob store rooted at `blob_dir`.
    pub fn new<P: AsRef<Path>>(
        blob_dir: P,
        keys: Arc<dyn KeyVault>,
        compression: CompressionConfig,
    ) -> Result<Self> {
        let blob_dir = blob_dir.as_ref().to_path_buf();
        fs::create_dir_all(&blob_dir)?;

        Ok(Self {
            blob_dir,
            keys,
            compressor: Compressor::new(compression),
            rng: SystemRandom::new(),
        })
    }

    /// Compress, encrypt and persist `payload` for `archive_id`.
    pub fn store_archive(
        &self,
        archive_id: &str,
        category: RecordCategory,
        payload: &[u8],
    ) -> Result<StoredBlob> {
        let path = self.blob_path(archive_id)?;
        if path.exists() {
            return Err(VaultError::Conflict(format!(
                "blob for archive {} already exists",
                archive_id
            )));
        }

        let compressed = self.compressor.compress(payload)?;
        let (key_id, key) = self.keys.create_key(archive_id)?;

        let stored = encryption::seal(&key, &compressed.data, archive_id.as_bytes(), &self.rng)
            .and_then(|sealed| {
                let digest = self
                    .keys
                    .integrity_secret()
                    .digest(archive_id, category, &sealed)?;
                write_atomic(&path, &sealed)?;
                Ok((sealed.len() as u64, digest))
            });

        let (stored_size, integrity_digest) = match stored {
            Ok(v) => v,
            Err(e) => {
                // Leave no orphaned key behind a failed write.
                if let Err(cleanup) = self.keys.destroy_key(&key_id) {
                    warn!(archive_id, error = %cleanup, "Failed to remove key after write failure");
                }
                return Err(e);
            }
        };

        debug!(
            archive_id,
            payload_size = payload.len(),
            compressed_size = compressed.compressed_size(),
            stored_size,
            "Stored archive blob"
        );

        Ok(StoredBlob {
            key_id,
            integrity_digest,
            payload_size: compressed.original_size,
            compressed_size: compressed.compressed_size(),
            stored_size,
        })
    }

    /// Read the sealed bytes exactly as stored.
    pub fn read_ciphertext(&self, archive_id: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(archive_id)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VaultError::NotFound(format!("ciphertext for archive {}", archive_id))
            } else {
                e.into()
            }
        })
    }

    /// Decrypt and decompress previously read sealed bytes.
    pub fn open_ciphertext(
        &self,
        archive_id: &str,
        key_id: &str,
        sealed: &[u8],
        payload_size: u64,
    ) -> Result<Vec<u8>> {
        let key = self.keys.load_key(key_id)?;
        let compressed = encryption::open(&key, sealed, archive_id.as_bytes())?;
        self.compressor.decompress(&compressed, payload_size)
    }

    /// Load, decrypt and decompress the payload of `archive_id`.
    ///
    /// Fails with `NotFound` if the ciphertext or the key is missing.
    pub fn retrieve_archive(&self, archive_id: &str, key_id: &str, payload_size: u64) -> Result<Vec<u8>> {
        let sealed = self.read_ciphertext(archive_id)?;
        self.open_ciphertext(archive_id, key_id, &sealed, payload_size)
    }

    /// Recompute the keyed digest over `sealed` and compare in constant time.
    pub fn verify_integrity(
        &self,
        archive_id: &str,
        category: RecordCategory,
        sealed: &[u8],
        expected_digest: &str,
    ) -> Result<bool> {
        self.keys
            .integrity_secret()
            .verify(archive_id, category, sealed, expected_digest)
    }

    /// Remove the ciphertext and destroy the data key.
    ///
    /// Returns true if anything was removed.
    pub fn shred(&self, archive_id: &str, key_id: &str) -> Result<bool> {
        let key_removed = self.keys.destroy_key(key_id)?;
        let path = self.blob_path(archive_id)?;
        let blob_removed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        debug!(archive_id, key_removed, blob_removed, "Shredded archive blob");
        Ok(key_removed || blob_removed)
    }

    /// Path of the sealed file for `archive_id`.
    pub fn blob_path(&self, archive_id: &str) -> Result<PathBuf> {
        let valid = !archive_id.is_empty()
            && archive_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(VaultError::InvalidArgument(format!(
                "invalid archive id: {:?}",
                archive_id
            )));
        }
        Ok(self.blob_dir.join(format!("{}.{}", archive_id, BLOB_EXT)))
    }
}

impl std::fmt::Debug for EncryptedBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlobStore")
            .field("blob_dir", &self.blob_dir)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
