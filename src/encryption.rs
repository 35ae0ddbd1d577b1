//! Encryption at rest and integrity digests for archive payloads.
//!
//! Payloads are sealed with AES-256-GCM under a per-archive data key. The
//! sealed form is `nonce || ciphertext || tag`, with the archive id bound as
//! associated data so a blob cannot be decrypted under another archive's
//! name.
//!
//! Integrity is tracked separately with HMAC-SHA256 keyed by a vault-wide
//! secret. The digest covers the sealed bytes together with the archive id
//! and category, so verification never needs the data key and a
//! ciphertext/digest pair cannot be moved onto another catalog row.

use crate::error::{Result, VaultError};
use crate::types::RecordCategory;
use hmac::{Hmac, Mac};
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;
/// GCM nonce length.
pub const NONCE_LEN: usize = 12;
/// GCM tag length.
pub const TAG_LEN: usize = 16;
/// Integrity secret length.
pub const SECRET_LEN: usize = 32;

const DIGEST_DOMAIN: &[u8] = b"auditvault/archive-digest/v1";

/// Symmetric key material, cleared on drop.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    /// Generate a new random key.
    pub fn generate(rng: &SystemRandom) -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rng.fill(&mut bytes[..])
            .map_err(|_| VaultError::Crypto("failed to generate random key".to_string()))?;
        Ok(Self(bytes))
    }

    /// Create from existing key bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(VaultError::Crypto(format!(
                "key length {} doesn't match required {}",
                bytes.len(),
                KEY_LEN
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Get the key bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Nonce sequence that yields exactly one nonce.
///
/// Every key in this crate seals exactly one message, so a counter is never
/// needed.
struct SingleNonce(Option<[u8; NONCE_LEN]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        let bytes = self.0.take().ok_or(ring::error::Unspecified)?;
        Ok(Nonce::assume_unique_for_key(bytes))
    }
}

/// Encrypt `plaintext` and return ciphertext with the nonce prepended.
pub fn seal(key: &SecretKey, plaintext: &[u8], aad: &[u8], rng: &SystemRandom) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)
        .map_err(|_| VaultError::Crypto("failed to generate nonce".to_string()))?;

    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, key.bytes())
        .map_err(|_| VaultError::Crypto("invalid encryption key".to_string()))?;
    let mut sealing_key = SealingKey::new(unbound_key, SingleNonce(Some(nonce)));

    let mut in_out = plaintext.to_vec();
    in_out.reserve(TAG_LEN);
    sealing_key
        .seal_in_place_append_tag(Aad::from(aad), &mut in_out)
        .map_err(|_| VaultError::Crypto("encryption failed".to_string()))?;

    let mut result = Vec::with_capacity(NONCE_LEN + in_out.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&in_out);
    Ok(result)
}

/// Decrypt data produced by [`seal`] (expects nonce prepended to ciphertext).
pub fn open(key: &SecretKey, sealed: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::Crypto("ciphertext too short".to_string()));
    }

    let (nonce_bytes, encrypted) = sealed.split_at(NONCE_LEN);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);

    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, key.bytes())
        .map_err(|_| VaultError::Crypto("invalid decryption key".to_string()))?;
    let mut opening_key = OpeningKey::new(unbound_key, SingleNonce(Some(nonce)));

    let mut in_out = Zeroizing::new(encrypted.to_vec());
    let plaintext_len = opening_key
        .open_in_place(Aad::from(aad), &mut in_out)
        .map_err(|_| VaultError::Crypto("decryption failed".to_string()))?
        .len();
    in_out.truncate(plaintext_len);

    Ok(in_out)
}

/// Vault-wide HMAC key used for archive digests.
#[derive(Clone)]
pub struct IntegritySecret(Zeroizing<Vec<u8>>);

impl IntegritySecret {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SECRET_LEN {
            return Err(VaultError::Crypto(format!(
                "integrity secret must be at least {} bytes",
                SECRET_LEN
            )));
        }
        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    pub fn generate(rng: &SystemRandom) -> Result<Self> {
        let mut bytes = Zeroizing::new(vec![0u8; SECRET_LEN]);
        rng.fill(bytes.as_mut_slice())
            .map_err(|_| VaultError::Crypto("failed to generate integrity secret".to_string()))?;
        Ok(Self(bytes))
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn mac(&self, archive_id: &str, category: RecordCategory, sealed: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.bytes())
            .map_err(|_| VaultError::Crypto("invalid integrity secret".to_string()))?;
        for part in [
            DIGEST_DOMAIN,
            archive_id.as_bytes(),
            category.as_str().as_bytes(),
            sealed,
        ] {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part);
        }
        Ok(mac)
    }

    /// Hex digest binding `sealed` to `archive_id` and `category`.
    pub fn digest(&self, archive_id: &str, category: RecordCategory, sealed: &[u8]) -> Result<String> {
        let mac = self.mac(archive_id, category, sealed)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of `sealed` against a hex digest.
    ///
    /// A malformed expected digest is a mismatch, not an error.
    pub fn verify(
        &self,
        archive_id: &str,
        category: RecordCategory,
        sealed: &[u8],
        expected_hex: &str,
    ) -> Result<bool> {
        let Ok(expected) = hex::decode(expected_hex) else {
            return Ok(false);
        };
        let mac = self.mac(archive_id, category, sealed)?;
        Ok(mac.verify_slice(&expected).is_ok())
    }
}

impl fmt::Debug for IntegritySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntegritySecret(..)")
    }
}
