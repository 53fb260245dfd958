//! Conversion between staged values and their stored representation.
//!
//! | type     | stored form                               |
//! |----------|-------------------------------------------|
//! | `plain`  | the value itself                          |
//! | `base64` | standard base64 of the UTF-8 bytes        |
//! | `kms`    | standard base64 of the KMS ciphertext blob |
//!
//! The type tag is stored next to the value, so [`deserialize`] needs
//! nothing but the row.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::crypto::Encryptor;
use crate::error::KvError;
use crate::models::{SerializationType, StagedItem, StagedValue, StoredItem};

/// Produces the stored representation of `staged`.
///
/// # Errors
///
/// Fails with [`KvError::MissingKeyOption`] for `kms` without a `key`
/// option, or with the encryptor's error if the remote call fails.
pub async fn serialize<E>(encryptor: &E, staged: &StagedValue) -> Result<String>
where
    E: Encryptor + ?Sized,
{
    let serialization = &staged.serialization;
    match serialization.kind {
        SerializationType::Plain => Ok(staged.value.clone()),
        SerializationType::Base64 => Ok(STANDARD.encode(staged.value.as_bytes())),
        SerializationType::Kms => {
            let key_id = serialization
                .option("key")
                .filter(|k| !k.is_empty())
                .ok_or(KvError::MissingKeyOption)?;
            let blob = encryptor.encrypt(key_id, staged.value.as_bytes()).await?;
            Ok(STANDARD.encode(blob))
        }
    }
}

/// Recovers the plaintext of `item`, or returns the stored representation
/// untouched when `apply` is false.
pub async fn deserialize<E>(encryptor: &E, item: &StoredItem, apply: bool) -> Result<String>
where
    E: Encryptor + ?Sized,
{
    if !apply {
        return Ok(item.value.clone());
    }

    match item.serialization.parse::<SerializationType>()? {
        SerializationType::Plain => Ok(item.value.clone()),
        SerializationType::Base64 => {
            let decode_error = |reason: String| KvError::Decode {
                key: item.key.clone(),
                reason,
            };
            let bytes = STANDARD
                .decode(&item.value)
                .map_err(|e| decode_error(e.to_string()))?;
            Ok(String::from_utf8(bytes).map_err(|e| decode_error(e.to_string()))?)
        }
        SerializationType::Kms => {
            let decrypt_error = |reason: String| KvError::Decrypt {
                key: item.key.clone(),
                reason,
            };
            let blob = STANDARD
                .decode(&item.value)
                .map_err(|e| decrypt_error(format!("malformed ciphertext: {e}")))?;
            let plaintext = encryptor
                .decrypt(&blob)
                .await
                .map_err(|e| decrypt_error(format!("{e:#}")))?;
            Ok(String::from_utf8(plaintext).map_err(|e| decrypt_error(e.to_string()))?)
        }
    }
}

/// Serializes every staged item, in order, stopping at the first failure.
pub async fn serialize_items<E>(encryptor: &E, items: &[StagedItem]) -> Result<Vec<StoredItem>>
where
    E: Encryptor + ?Sized,
{
    let mut stored = Vec::with_capacity(items.len());
    for item in items {
        let value = serialize(encryptor, &item.value).await?;
        stored.push(StoredItem::new(
            item.key.clone(),
            value,
            item.value.serialization.kind,
        ));
    }
    Ok(stored)
}

/// Replaces each item's value with its plaintext when `apply` is set.
pub async fn deserialize_items<E>(
    encryptor: &E,
    items: Vec<StoredItem>,
    apply: bool,
) -> Result<Vec<StoredItem>>
where
    E: Encryptor + ?Sized,
{
    if !apply {
        return Ok(items);
    }

    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        let value = deserialize(encryptor, &item, true).await?;
        decoded.push(StoredItem { value, ..item });
    }
    Ok(decoded)
}
