use anyhow::{Context, Result};
use aws_sdk_kms::primitives::Blob;

use super::Encryptor;

/// Encrypts and decrypts through AWS KMS.
///
/// The process needs `kms:Encrypt` on every key referenced by a `kms`
/// serialization and `kms:Decrypt` on the keys that produced stored blobs.
pub struct KmsEncryptor {
    client: aws_sdk_kms::Client,
}

impl KmsEncryptor {
    /// Creates an encryptor from an already loaded AWS configuration.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_kms::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl Encryptor for KmsEncryptor {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let resp = self
            .client
            .encrypt()
            .key_id(key_id)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .with_context(|| format!("KMS Encrypt failed for key '{key_id}'"))?;

        resp.ciphertext_blob
            .map(Blob::into_inner)
            .ok_or_else(|| anyhow::anyhow!("KMS Encrypt for key '{key_id}' returned no ciphertext"))
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let resp = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await
            .context("KMS Decrypt failed")?;

        resp.plaintext
            .map(Blob::into_inner)
            .ok_or_else(|| anyhow::anyhow!("KMS Decrypt returned no plaintext"))
    }
}
