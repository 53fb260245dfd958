use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dynamokv::commands;
use dynamokv::crypto::Encryptor;
use dynamokv::models::{Serialization, SerializationType, StagedValue, StoredItem};
use dynamokv::output::OutputConfig;
use dynamokv::store::{MemoryStore, Table};
use dynamokv::template::OutputTarget;
use dynamokv::{KvError, codec, parser};

const TABLE: &str = "TEST_TABLE";

/// Deterministic stand-in for KMS: the blob is the reversed plaintext.
struct ReverseEncryptor;

#[async_trait::async_trait]
impl Encryptor for ReverseEncryptor {
    async fn encrypt(&self, _key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.iter().rev().copied().collect())
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.iter().rev().copied().collect())
    }
}

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(name)
}

fn write_file(name: &str, content: &str) -> PathBuf {
    let path = temp_path(name);
    fs::write(&path, content).unwrap();
    path
}

async fn store_test_config(store: &MemoryStore, name: &str) {
    let config = write_file(
        name,
        "KEY: VALUE\nSERIALIZED_KEY:\n  serialization: 'base64'\n  value: VALUE\n",
    );
    let count = commands::store(store, &ReverseEncryptor, TABLE, &config)
        .await
        .unwrap();
    assert_eq!(count, 2);
    fs::remove_file(config).unwrap();
}

fn export() -> OutputConfig {
    OutputConfig {
        export: true,
        ..OutputConfig::default()
    }
}

fn raw() -> OutputConfig {
    OutputConfig {
        deserialize: false,
        ..OutputConfig::default()
    }
}

#[tokio::test]
async fn test_document_scenario_produces_expected_rows() {
    let staged =
        parser::parse_str(r#"{"A": "hello", "B": {"serialization": "base64", "value": "hello"}}"#)
            .unwrap();
    let stored = codec::serialize_items(&ReverseEncryptor, &staged).await.unwrap();

    let store = MemoryStore::new();
    let table = Table::new(&store, TABLE);
    table.ensure_table().await.unwrap();
    table.write_all(&stored).await.unwrap();

    let rows: BTreeSet<_> = table.read_all().await.unwrap().into_iter().collect();
    let expected: BTreeSet<_> = [
        StoredItem::new("A", "hello", SerializationType::Plain),
        StoredItem::new("B", "aGVsbG8=", SerializationType::Base64),
    ]
    .into_iter()
    .collect();
    assert_eq!(rows, expected);
}

#[tokio::test]
async fn test_fetch() {
    let store = MemoryStore::new();
    store_test_config(&store, "dynamokv_it_fetch.yml").await;

    let mut out = Vec::new();
    commands::fetch(&store, &ReverseEncryptor, TABLE, &OutputConfig::default(), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out, "KEY='VALUE'\nSERIALIZED_KEY='VALUE'\n");
}

#[tokio::test]
async fn test_fetch_no_deserialize() {
    let store = MemoryStore::new();
    store_test_config(&store, "dynamokv_it_fetch_raw.yml").await;

    let mut out = Vec::new();
    commands::fetch(&store, &ReverseEncryptor, TABLE, &raw(), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out, "KEY='VALUE'\nSERIALIZED_KEY='VkFMVUU='\n");
}

#[tokio::test]
async fn test_fetch_export() {
    let store = MemoryStore::new();
    store_test_config(&store, "dynamokv_it_fetch_export.yml").await;

    let mut out = Vec::new();
    commands::fetch(&store, &ReverseEncryptor, TABLE, &export(), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out, "export KEY='VALUE'\nexport SERIALIZED_KEY='VALUE'\n");
}

#[tokio::test]
async fn test_get() {
    let store = MemoryStore::new();
    let value = StagedValue {
        value: "SINGLE_VALUE".into(),
        serialization: Serialization::new(SerializationType::Base64),
    };
    commands::set(&store, &ReverseEncryptor, TABLE, "SINGLE_KEY", value)
        .await
        .unwrap();

    let mut out = Vec::new();
    commands::get(&store, &ReverseEncryptor, TABLE, "SINGLE_KEY", &OutputConfig::default(), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out, "SINGLE_KEY='SINGLE_VALUE'\n");

    let mut out = Vec::new();
    commands::get(&store, &ReverseEncryptor, TABLE, "SINGLE_KEY", &raw(), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out, "SINGLE_KEY='U0lOR0xFX1ZBTFVF'\n");
}

#[tokio::test]
async fn test_get_missing_key_is_not_found() {
    let store = MemoryStore::new();
    store_test_config(&store, "dynamokv_it_get_missing.yml").await;

    let mut out = Vec::new();
    let err = commands::get(
        &store,
        &ReverseEncryptor,
        TABLE,
        "ABSENT",
        &OutputConfig::default(),
        &mut out,
    )
    .await
    .unwrap_err();

    assert!(matches!(err.downcast_ref::<KvError>(), Some(KvError::NotFound(k)) if k == "ABSENT"));
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_set_kms_round_trips_through_envelope() {
    let store = MemoryStore::new();
    let value = StagedValue {
        value: "s3cr3t".into(),
        serialization: Serialization::kms("alias/app"),
    };
    commands::set(&store, &ReverseEncryptor, TABLE, "PASSWORD", value)
        .await
        .unwrap();

    let table = Table::new(&store, TABLE);
    let item = table.get_by_key("PASSWORD").await.unwrap();
    assert_eq!(item.serialization, "kms");
    assert_eq!(item.value, STANDARD.encode("t3rc3s"));

    let plaintext = codec::deserialize(&ReverseEncryptor, &item, true).await.unwrap();
    assert_eq!(plaintext, "s3cr3t");
}

#[tokio::test]
async fn test_store_more_items_than_one_batch() {
    let store = MemoryStore::new().with_page_size(10);
    let doc: String = (0..40).map(|i| format!("KEY_{i}: value {i}\n")).collect();
    let config = write_file("dynamokv_it_large.yml", &doc);

    let count = commands::store(&store, &ReverseEncryptor, TABLE, &config)
        .await
        .unwrap();
    fs::remove_file(&config).unwrap();

    assert_eq!(count, 40);
    assert_eq!(store.batch_sizes(), vec![25, 15]);
    let read = Table::new(&store, TABLE).read_all().await.unwrap();
    assert_eq!(read.len(), 40);
}

async fn seed_template_table(store: &MemoryStore) {
    let table = Table::new(store, TABLE);
    table.ensure_table().await.unwrap();
    table
        .write_all(&[StoredItem::new("K", "aGVsbG8=", SerializationType::Base64)])
        .await
        .unwrap();
}

async fn render_to_stdout(store: &MemoryStore, template: &Path) -> Result<String> {
    let mut out = Vec::new();
    commands::template(
        store,
        &ReverseEncryptor,
        TABLE,
        template,
        &OutputTarget::Stdout,
        &mut out,
    )
    .await?;
    Ok(String::from_utf8(out)?)
}

#[tokio::test]
async fn test_template_deserialized_and_raw() {
    let store = MemoryStore::new();
    seed_template_table(&store).await;

    let template = write_file("dynamokv_it_template_plain.tpl", "{{K}}");
    assert_eq!(render_to_stdout(&store, &template).await.unwrap(), "hello");

    let template_raw = write_file("dynamokv_it_template_raw.tpl", "{{RAW:K}}");
    assert_eq!(render_to_stdout(&store, &template_raw).await.unwrap(), "aGVsbG8=");

    fs::remove_file(template).unwrap();
    fs::remove_file(template_raw).unwrap();
}

#[tokio::test]
async fn test_template_writes_output_file() {
    let store = MemoryStore::new();
    seed_template_table(&store).await;

    let template = write_file("dynamokv_it_template_in.tpl", "greeting={{K}}\n");
    let output = temp_path("dynamokv_it_template_out.txt");
    let _ = fs::remove_file(&output);

    let mut stdout = Vec::new();
    commands::template(
        &store,
        &ReverseEncryptor,
        TABLE,
        &template,
        &OutputTarget::File(output.clone()),
        &mut stdout,
    )
    .await
    .unwrap();

    assert!(stdout.is_empty());
    assert_eq!(fs::read_to_string(&output).unwrap(), "greeting=hello\n");

    fs::remove_file(template).unwrap();
    fs::remove_file(output).unwrap();
}

#[tokio::test]
async fn test_template_with_missing_key_writes_nothing() {
    let store = MemoryStore::new();
    seed_template_table(&store).await;

    let template = write_file("dynamokv_it_template_missing.tpl", "{{K}} and {{MISSING}}");
    let output = temp_path("dynamokv_it_template_missing.out");
    let _ = fs::remove_file(&output);

    let mut stdout = Vec::new();
    let err = commands::template(
        &store,
        &ReverseEncryptor,
        TABLE,
        &template,
        &OutputTarget::File(output.clone()),
        &mut stdout,
    )
    .await
    .unwrap_err();

    let Some(KvError::TemplateResolution(failures)) = err.downcast_ref::<KvError>() else {
        panic!("expected a template resolution error, got {err:#}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].key, "MISSING");
    assert!(!output.exists());
    assert!(stdout.is_empty());

    fs::remove_file(template).unwrap();
}
