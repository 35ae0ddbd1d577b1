//! Key management boundary.
//!
//! Per-archive data keys never sit next to the ciphertext they protect. The
//! [`KeyVault`] trait is the only way the blob store obtains key material;
//! [`FileKeyVault`] keeps it in a dedicated directory, with every data key
//! wrapped under a vault master key.
//!
//! Layout of the key directory:
//!
//! ```text
//! key_dir/
//!   master.kek          32-byte key-encryption key (0600)
//!   integrity.secret    32-byte HMAC secret for archive digests (0600)
//!   dek-<archive>.key   wrapped data key: nonce || AES-GCM(dek) || tag (0600)
//! ```

use crate::encryption::{self, IntegritySecret, SecretKey, KEY_LEN, SECRET_LEN};
use crate::error::{Result, VaultError};
use ring::rand::SystemRandom;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

const MASTER_KEY_FILE: &str = "master.kek";
const INTEGRITY_SECRET_FILE: &str = "integrity.secret";
const KEY_FILE_EXT: &str = "key";

/// Source of archive-scoped key material.
pub trait KeyVault: Send + Sync + fmt::Debug {
    /// Create and persist a fresh data key for `archive_id`.
    ///
    /// Returns the opaque key id recorded in the catalog.
    fn create_key(&self, archive_id: &str) -> Result<(String, SecretKey)>;

    /// Load a previously created data key.
    fn load_key(&self, key_id: &str) -> Result<SecretKey>;

    /// Destroy a data key. Returns false if it was already gone.
    fn destroy_key(&self, key_id: &str) -> Result<bool>;

    /// Vault-wide integrity secret.
    fn integrity_secret(&self) -> IntegritySecret;
}

/// Filesystem-backed [`KeyVault`].
pub struct FileKeyVault {
    dir: PathBuf,
    master: SecretKey,
    integrity: IntegritySecret,
    rng: SystemRandom,
}

impl FileKeyVault {
    /// Open the vault at `dir`, generating the master key and integrity
    /// secret on first use.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_private_dir(&dir)?;

        let rng = SystemRandom::new();
        let master_bytes = load_or_generate_secret(&dir.join(MASTER_KEY_FILE), KEY_LEN, &rng)?;
        let master = SecretKey::from_slice(&master_bytes)?;
        let secret_bytes =
            load_or_generate_secret(&dir.join(INTEGRITY_SECRET_FILE), SECRET_LEN, &rng)?;
        let integrity = IntegritySecret::from_slice(&secret_bytes)?;

        info!(key_dir = %dir.display(), "Key vault opened");

        Ok(Self {
            dir,
            master,
            integrity,
            rng,
        })
    }

    fn key_path(&self, key_id: &str) -> Result<PathBuf> {
        validate_key_id(key_id)?;
        Ok(self.dir.join(format!("{}.{}", key_id, KEY_FILE_EXT)))
    }
}

impl KeyVault for FileKeyVault {
    fn create_key(&self, archive_id: &str) -> Result<(String, SecretKey)> {
        let key_id = format!("dek-{}", archive_id);
        let path = self.key_path(&key_id)?;

        let key = SecretKey::generate(&self.rng)?;
        let wrapped = encryption::seal(&self.master, key.bytes(), key_id.as_bytes(), &self.rng)?;

        match write_new_private_file(&path, &wrapped) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VaultError::Conflict(format!(
                    "key {} already exists",
                    key_id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(key_id = %key_id, "Created archive key");
        Ok((key_id, key))
    }

    fn load_key(&self, key_id: &str) -> Result<SecretKey> {
        let path = self.key_path(key_id)?;
        let wrapped = match read_private_file(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound(format!("key {}", key_id)));
            }
            Err(e) => return Err(e.into()),
        };

        let raw = encryption::open(&self.master, &wrapped, key_id.as_bytes())?;
        SecretKey::from_slice(&raw)
    }

    fn destroy_key(&self, key_id: &str) -> Result<bool> {
        let path = self.key_path(key_id)?;
        let len = match fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                fs::remove_file(&path)?;
                return Ok(true);
            }
            Ok(meta) => meta.len() as usize,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        // Overwrite before unlinking so the wrapped key does not linger in
        // the freed blocks.
        {
            let mut file = fs::OpenOptions::new().write(true).open(&path)?;
            file.write_all(&vec![0u8; len])?;
            file.sync_all()?;
        }
        fs::remove_file(&path)?;

        info!(key_id = %key_id, "Destroyed archive key");
        Ok(true)
    }

    fn integrity_secret(&self) -> IntegritySecret {
        self.integrity.clone()
    }
}

impl fmt::Debug for FileKeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKeyVault")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

fn validate_key_id(key_id: &str) -> Result<()> {
    let valid = !key_id.is_empty()
        && key_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(VaultError::InvalidArgument(format!(
            "invalid key id: {:?}",
            key_id
        )));
    }
    Ok(())
}

fn create_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Create `path` with owner-only permissions; fails if it already exists.
fn write_new_private_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    let written = file.write_all(bytes).and_then(|_| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

/// Read a key file, refusing symlinks.
fn read_private_file(path: &Path) -> io::Result<Zeroizing<Vec<u8>>> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "refusing to read key file: path is a symlink",
        ));
    }
    Ok(Zeroizing::new(fs::read(path)?))
}

fn load_or_generate_secret(
    path: &Path,
    len: usize,
    rng: &SystemRandom,
) -> Result<Zeroizing<Vec<u8>>> {
    use ring::rand::SecureRandom;

    let mut fresh = Zeroizing::new(vec![0u8; len]);
    rng.fill(fresh.as_mut_slice())
        .map_err(|_| VaultError::Crypto("failed to generate key material".to_string()))?;

    match write_new_private_file(path, &fresh) {
        Ok(()) => {
            info!(path = %path.display(), "Generated vault secret");
            return Ok(fresh);
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e.into()),
    }

    let existing = read_private_file(path)?;
    if existing.len() != len {
        return Err(VaultError::Crypto(format!(
            "{} has unexpected length {}",
            path.display(),
            existing.len()
        )));
    }
    Ok(existing)
}
