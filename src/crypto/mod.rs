//! Envelope encryption capability.
//!
//! [`Encryptor`] is the async trait the codec calls for `kms` values.
//! [`KmsEncryptor`] implements it with AWS KMS.

mod kms;

pub use kms::KmsEncryptor;

use anyhow::Result;

/// Encrypts plaintext under a named key and decrypts the resulting blobs.
///
/// Ciphertext blobs are self-contained: decryption needs no key id.
#[async_trait::async_trait]
pub trait Encryptor: Send + Sync {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}
