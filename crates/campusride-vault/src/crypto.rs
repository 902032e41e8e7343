//! AES-256-GCM sealing and opening using the `ring` crate.
//!
//! The vault never writes plaintext credentials to disk. This module holds
//! the primitives it relies on:
//!
//! - **Seal/open**: AES-256-GCM authenticated encryption with a freshly
//!   generated 96-bit nonce per seal.
//! - **Key derivation**: PBKDF2-HMAC-SHA256 to turn a device passcode into
//!   a 256-bit key, with a random stored salt.
//! - **Random generation**: CSPRNG bytes via `ring`.
//!
//! Nonces are random per write; with 96 bits the collision probability is
//! negligible for the handful of session writes a device performs.

use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, SealingKey, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the PBKDF2 salt in bytes.
pub const SALT_LEN: usize = 32;

/// PBKDF2 iteration count for HMAC-SHA256 (OWASP 2023 figure).
const PBKDF2_ITERATIONS: u32 = 600_000;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A sealed blob: the ciphertext (GCM tag appended) plus the nonce it was
/// sealed under. Both halves must be stored to open the blob later.
#[derive(Debug, Clone)]
pub struct Sealed {
    /// The 96-bit nonce used for this seal.
    pub nonce: [u8; NONCE_LEN_BYTES],
    /// Ciphertext with the 128-bit authentication tag appended.
    pub bytes: Vec<u8>,
}

/// A nonce sequence that yields exactly one nonce and then errors.
///
/// `ring` demands a [`NonceSequence`] for bound keys; each of our keys is
/// used for a single seal or open, so one nonce is all we ever hand out.
struct OneShotNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl NonceSequence for OneShotNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Seal `plaintext` with AES-256-GCM under the given 256-bit `key`.
///
/// A fresh random nonce is generated per call and returned inside the
/// [`Sealed`] value together with the ciphertext.
///
/// # Errors
///
/// Returns [`VaultError::SealFailed`] if the key length is wrong or `ring`
/// reports a failure.
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Sealed> {
    if key.len() != KEY_LEN {
        return Err(VaultError::SealFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }

    let rng = SystemRandom::new();
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    rng.fill(&mut nonce).map_err(|_| VaultError::SealFailed {
        reason: "failed to generate random nonce".into(),
    })?;

    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::SealFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut sealing_key = SealingKey::new(unbound, OneShotNonce(Some(nonce)));

    // ring seals in place and appends the authentication tag.
    let mut bytes = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut bytes)
        .map_err(|_| VaultError::SealFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        sealed_len = bytes.len(),
        "sealed vault data"
    );

    Ok(Sealed { nonce, bytes })
}

/// Open a [`Sealed`] blob with the given 256-bit `key` and return the
/// plaintext.
///
/// # Errors
///
/// Returns [`VaultError::OpenFailed`] if the key is wrong, the ciphertext
/// has been tampered with, or the nonce does not match.
pub fn open(sealed: &Sealed, key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(VaultError::OpenFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }

    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::OpenFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut opening_key = aead::OpeningKey::new(unbound, OneShotNonce(Some(sealed.nonce)));

    let mut in_out = sealed.bytes.clone();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::OpenFailed {
            reason: "authentication failed: wrong key or corrupted data".into(),
        })?;

    Ok(plaintext.to_vec())
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive a 256-bit vault key from a device `passcode` via
/// PBKDF2-HMAC-SHA256.
///
/// A random salt is generated and returned alongside the key; the caller
/// must persist the salt to re-derive the same key on the next launch.
///
/// # Errors
///
/// Returns [`VaultError::KeyDerivationFailed`] if salt generation fails.
pub fn derive_key(passcode: &[u8]) -> Result<([u8; SALT_LEN], [u8; KEY_LEN])> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| VaultError::KeyDerivationFailed {
            reason: "failed to generate random salt".into(),
        })?;

    let mut key = [0u8; KEY_LEN];
    derive_key_with_salt(passcode, &salt, &mut key);

    tracing::debug!("derived vault key from passcode via PBKDF2");
    Ok((salt, key))
}

/// Deterministic counterpart of [`derive_key`] for a previously stored salt.
pub fn derive_key_with_salt(passcode: &[u8], salt: &[u8], out: &mut [u8; KEY_LEN]) {
    let iterations =
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");
    pbkdf2::derive(PBKDF2_ALG, iterations, salt, passcode, out);
}

// ---------------------------------------------------------------------------
// Random bytes
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::Internal`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)
        .map_err(|_| VaultError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
