//! Password hashing with per-record algorithm tags.
//!
//! Two schemes coexist behind one stored-string format:
//!
//! - `bcrypt-sha512$<bcrypt>` for interactive accounts. The password is
//!   prehashed with SHA-512 and Base64 encoded (88 characters), so every byte
//!   of an arbitrarily long password still influences the stored digest even
//!   though bcrypt itself only reads 72 bytes of input.
//! - `pbkdf2-sha512$<rounds>$<salt>$<digest>` for the bootstrap credential.
//!   PBKDF2-HMAC-SHA-512 over the password concatenated with the application
//!   pepper, a fresh 32-byte salt per record, 64-byte output.
//!
//! `verify` dispatches on the stored tag and treats malformed or unknown
//! records as a mismatch, never as an error.

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

const INTERACTIVE_TAG: &str = "bcrypt-sha512";
const MASTER_TAG: &str = "pbkdf2-sha512";

const BCRYPT_COST: u32 = 12;
const PBKDF2_ROUNDS: u32 = 100_000;
const PBKDF2_OUTPUT_LEN: usize = 64;
const SALT_LEN: usize = 32;
// Stored rounds outside this range are treated as malformed.
const MAX_VERIFY_ROUNDS: u32 = 10_000_000;

// Development fallback used when no pepper is configured.
const DEV_FALLBACK_PEPPER: &str = "default-pepper-change-in-production";

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to gather salt entropy")]
    Entropy,
    #[error("bcrypt failure")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Hashes and verifies stored credentials.
pub struct PasswordHasher {
    pepper: SecretString,
}

impl PasswordHasher {
    /// Build a hasher from the configured pepper. A missing pepper falls back
    /// to a fixed development value and warns once at startup.
    #[must_use]
    pub fn new(pepper: Option<&SecretString>) -> Self {
        let pepper = match pepper {
            Some(secret) => secret.clone(),
            None => {
                warn!("no pepper configured, using the built-in development value; do not use in production");
                SecretString::from(DEV_FALLBACK_PEPPER)
            }
        };
        Self { pepper }
    }

    /// Hash an interactive password.
    ///
    /// # Errors
    ///
    /// Returns an error if bcrypt rejects the input.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        let digest = bcrypt::hash(sha512_prehash(password), BCRYPT_COST)?;
        Ok(format!("{INTERACTIVE_TAG}${digest}"))
    }

    /// Hash the bootstrap credential with the pepper and a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if salt entropy is unavailable.
    pub fn hash_master(&self, password: &str) -> Result<String, HashError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| HashError::Entropy)?;
        Ok(self.master_digest(password, &salt, PBKDF2_ROUNDS))
    }

    /// Check `password` against a stored record. Malformed or unknown records
    /// never match and never panic.
    #[must_use]
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match stored.split_once('$') {
            Some((tag, digest)) if tag == INTERACTIVE_TAG => {
                bcrypt::verify(sha512_prehash(password), digest).unwrap_or(false)
            }
            Some((tag, rest)) if tag == MASTER_TAG => self.verify_master(password, rest),
            _ => false,
        }
    }

    fn master_digest(&self, password: &str, salt: &[u8], rounds: u32) -> String {
        let mut output = [0u8; PBKDF2_OUTPUT_LEN];
        pbkdf2::pbkdf2_hmac::<Sha512>(&self.peppered(password), salt, rounds, &mut output);
        format!(
            "{MASTER_TAG}${rounds}${}${}",
            Base64UrlUnpadded::encode_string(salt),
            Base64UrlUnpadded::encode_string(&output)
        )
    }

    fn verify_master(&self, password: &str, rest: &str) -> bool {
        let mut parts = rest.split('$');
        let rounds = parts.next().and_then(|value| value.parse::<u32>().ok());
        let salt = parts
            .next()
            .and_then(|value| Base64UrlUnpadded::decode_vec(value).ok());
        let stored_digest = parts
            .next()
            .and_then(|value| Base64UrlUnpadded::decode_vec(value).ok());
        if parts.next().is_some() {
            return false;
        }
        let (Some(rounds), Some(salt), Some(stored_digest)) = (rounds, salt, stored_digest) else {
            return false;
        };
        if rounds == 0 || rounds > MAX_VERIFY_ROUNDS || stored_digest.len() != PBKDF2_OUTPUT_LEN {
            return false;
        }

        let mut output = [0u8; PBKDF2_OUTPUT_LEN];
        pbkdf2::pbkdf2_hmac::<Sha512>(&self.peppered(password), &salt, rounds, &mut output);
        output.ct_eq(stored_digest.as_slice()).into()
    }

    fn peppered(&self, password: &str) -> Vec<u8> {
        let mut input = password.as_bytes().to_vec();
        input.extend_from_slice(self.pepper.expose_secret().as_bytes());
        input
    }
}

/// Base64 of the SHA-512 digest, always 88 characters.
fn sha512_prehash(password: &str) -> String {
    Base64::encode_string(&Sha512::digest(password.as_bytes()))
}
