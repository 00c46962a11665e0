//! Token vault
//!
//! Encrypts OAuth tokens before they are written to storage. The key is the SHA-256 digest of
//! a pre-shared key string; ciphertexts are XChaCha20-Poly1305 with a random 24-byte nonce.
//!
//! Text format: URL-safe base64 of `nonce (24 bytes) || ciphertext || tag (16 bytes)`.
//! Empty input maps to empty output in both directions without touching the cipher.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::Rng;
use ring::digest::{SHA256, digest};
use thiserror::Error;
use zeroize::Zeroize;

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
const NONCE_SIZE: usize = 24;
/// Authentication tag size.
const TAG_SIZE: usize = 16;

/// Vault error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VaultError {
	#[error("Encryption failed")]
	EncryptionFailed,
	#[error("Invalid ciphertext: data may be corrupted or encrypted with another key")]
	InvalidCiphertext,
}

/// Symmetric encrypt/decrypt capability over a pre-shared key.
#[derive(Clone)]
pub struct TokenVault {
	key: [u8; 32],
}

impl std::fmt::Debug for TokenVault {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenVault")
			.field("key", &"[REDACTED]")
			.finish()
	}
}

impl Drop for TokenVault {
	fn drop(&mut self) {
		self.key.zeroize();
	}
}

impl TokenVault {
	/// Derive the vault key from a pre-shared key string.
	pub fn new(token_key: &str) -> Self {
		let mut key = [0u8; 32];
		key.copy_from_slice(digest(&SHA256, token_key.as_bytes()).as_ref());
		Self { key }
	}

	fn cipher(&self) -> XChaCha20Poly1305 {
		XChaCha20Poly1305::new((&self.key).into())
	}

	/// Encrypt a token for storage.
	pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
		if plaintext.is_empty() {
			return Ok(String::new());
		}

		let mut nonce_bytes = [0u8; NONCE_SIZE];
		rand::rng().fill(&mut nonce_bytes);

		let ciphertext = self
			.cipher()
			.encrypt(XNonce::from_slice(&nonce_bytes), plaintext.as_bytes())
			.map_err(|_| VaultError::EncryptionFailed)?;

		let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
		output.extend_from_slice(&nonce_bytes);
		output.extend_from_slice(&ciphertext);

		Ok(URL_SAFE.encode(output))
	}

	/// Decrypt a stored token.
	pub fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
		if ciphertext.is_empty() {
			return Ok(String::new());
		}

		let data = URL_SAFE
			.decode(ciphertext)
			.map_err(|_| VaultError::InvalidCiphertext)?;
		if data.len() < NONCE_SIZE + TAG_SIZE {
			return Err(VaultError::InvalidCiphertext);
		}

		let (nonce, sealed) = data.split_at(NONCE_SIZE);
		let plaintext = self
			.cipher()
			.decrypt(XNonce::from_slice(nonce), sealed)
			.map_err(|_| VaultError::InvalidCiphertext)?;

		String::from_utf8(plaintext).map_err(|_| VaultError::InvalidCiphertext)
	}

	/// Encrypt an optional token; `None` stays `None`.
	pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, VaultError> {
		plaintext.map(|p| self.encrypt(p)).transpose()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_encrypt_decrypt() {
		let vault = TokenVault::new("dev-token-key-change-me");
		let sealed = vault.encrypt("at_secret").unwrap();

		assert_ne!(sealed, "at_secret");
		assert_eq!(vault.decrypt(&sealed).unwrap(), "at_secret");
	}

	#[test]
	fn test_ciphertexts_are_randomized() {
		let vault = TokenVault::new("k");
		assert_ne!(vault.encrypt("same").unwrap(), vault.encrypt("same").unwrap());
	}

	#[test]
	fn test_empty_short_circuit() {
		let vault = TokenVault::new("k");
		assert_eq!(vault.encrypt("").unwrap(), "");
		assert_eq!(vault.decrypt("").unwrap(), "");
	}

	#[test]
	fn test_wrong_key_rejected() {
		let sealed = TokenVault::new("key-a").encrypt("rt_secret").unwrap();
		assert_eq!(
			TokenVault::new("key-b").decrypt(&sealed),
			Err(VaultError::InvalidCiphertext)
		);
	}

	#[test]
	fn test_tampered_ciphertext_rejected() {
		let vault = TokenVault::new("k");
		let sealed = vault.encrypt("rt_secret").unwrap();
		let mut raw = URL_SAFE.decode(&sealed).unwrap();
		let last = raw.len() - 1;
		raw[last] ^= 0x01;

		assert_eq!(
			vault.decrypt(&URL_SAFE.encode(raw)),
			Err(VaultError::InvalidCiphertext)
		);
		assert_eq!(vault.decrypt("not base64!"), Err(VaultError::InvalidCiphertext));
		assert_eq!(vault.decrypt("AAAA"), Err(VaultError::InvalidCiphertext));
	}
}
