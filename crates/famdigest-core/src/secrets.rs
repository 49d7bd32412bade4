//! Authenticated encryption for stored credentials.
//!
//! CalDAV app passwords are the only secrets famdigest keeps at rest. They
//! are sealed with ChaCha20-Poly1305 under a single process-wide key that
//! the caller supplies explicitly; nothing in this module reads the
//! environment. The wire form is base64 of `nonce || ciphertext`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::aead::{Aead, AeadCore, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use thiserror::Error;

/// Length of the ChaCha20-Poly1305 key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the nonce prefix in the sealed form.
const NONCE_LEN: usize = 12;

/// Errors from sealing or opening a secret.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret key must be {KEY_LEN} bytes, got {0}")]
    BadKeyLength(usize),

    #[error("sealed value is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("sealed value is too short to contain a nonce")]
    Truncated,

    /// Wrong key or tampered ciphertext; the two are indistinguishable.
    #[error("failed to open sealed value")]
    Opening,

    #[error("failed to seal value")]
    Sealing,
}

/// The secret-encryption boundary.
///
/// Constructed once at process start from an explicit key and passed to the
/// components that store or read credentials.
#[derive(Clone)]
pub struct SecretBox {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material through Debug.
        f.debug_struct("SecretBox").finish_non_exhaustive()
    }
}

impl SecretBox {
    /// Creates a secret box from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, SecretError> {
        if key.len() != KEY_LEN {
            return Err(SecretError::BadKeyLength(key.len()));
        }
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        })
    }

    /// Creates a secret box from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, SecretError> {
        let key = BASE64.decode(encoded)?;
        Self::new(&key)
    }

    /// Seals a plaintext secret, returning base64 of `nonce || ciphertext`.
    ///
    /// A fresh random nonce is drawn per call, so sealing the same value
    /// twice yields different outputs.
    pub fn seal(&self, plaintext: &str) -> Result<String, SecretError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SecretError::Sealing)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Opens a sealed value produced by [`SecretBox::seal`].
    pub fn open(&self, sealed: &str) -> Result<String, SecretError> {
        let bytes = BASE64.decode(sealed)?;
        if bytes.len() < NONCE_LEN {
            return Err(SecretError::Truncated);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretError::Opening)?;
        String::from_utf8(plaintext).map_err(|_| SecretError::Opening)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_box() -> SecretBox {
        SecretBox::new(&[7u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn seal_open_roundtrip() {
        let secrets = test_box();
        let sealed = secrets.seal("app-specific-password").unwrap();
        assert_eq!(secrets.open(&sealed).unwrap(), "app-specific-password");
    }

    #[test]
    fn sealing_is_nondeterministic() {
        let secrets = test_box();
        let a = secrets.seal("same input").unwrap();
        let b = secrets.seal("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_wrong_key() {
        let sealed = test_box().seal("secret").unwrap();
        let other = SecretBox::new(&[8u8; KEY_LEN]).unwrap();
        assert!(matches!(other.open(&sealed), Err(SecretError::Opening)));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let secrets = test_box();
        let sealed = secrets.seal("secret").unwrap();

        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = BASE64.encode(bytes);

        assert!(matches!(secrets.open(&tampered), Err(SecretError::Opening)));
    }

    #[test]
    fn rejects_short_input() {
        let secrets = test_box();
        let short = BASE64.encode([0u8; 4]);
        assert!(matches!(secrets.open(&short), Err(SecretError::Truncated)));
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(matches!(
            SecretBox::new(&[0u8; 16]),
            Err(SecretError::BadKeyLength(16))
        ));
    }
}
