use std::collections::HashMap;

use anyhow::{Context, Result};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    PutRequest, ScalarAttributeType, TableStatus as DynamoTableStatus, WriteRequest,
};

use super::{
    KEY_ATTRIBUTE, KeyValueStore, Row, SERIALIZATION_ATTRIBUTE, ScanPage, TableDescription,
    TableStatus, VALUE_ATTRIBUTE,
};

const READ_CAPACITY_UNITS: i64 = 2;
const WRITE_CAPACITY_UNITS: i64 = 1;

/// `Key`, `Value` and `Serialization` are DynamoDB reserved words, so
/// expressions refer to them through these placeholders.
const PROJECTION: &str = "#k, #v, #s";

/// [`KeyValueStore`] backed by AWS DynamoDB.
pub struct DynamoDbStore {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoDbStore {
    /// Creates a store from the shared AWS configuration. `endpoint_url`
    /// points the client at a local DynamoDB when set.
    pub fn new(config: &aws_config::SdkConfig, endpoint_url: Option<&str>) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }
        Self {
            client: aws_sdk_dynamodb::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for DynamoDbStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>> {
        let resp = match self.client.describe_table().table_name(table).send().await {
            Ok(resp) => resp,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("DescribeTable failed for '{table}'"));
            }
        };

        let Some(description) = resp.table else {
            return Ok(None);
        };

        let status = match description.table_status {
            Some(DynamoTableStatus::Active) => TableStatus::Active,
            Some(DynamoTableStatus::Creating) => TableStatus::Creating,
            _ => TableStatus::Other,
        };
        let hash_key = description
            .key_schema
            .unwrap_or_default()
            .into_iter()
            .find(|k| k.key_type == KeyType::Hash)
            .map(|k| k.attribute_name);

        Ok(Some(TableDescription { status, hash_key }))
    }

    async fn create_table(&self, table: &str) -> Result<()> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(KEY_ATTRIBUTE)
            .key_type(KeyType::Hash)
            .build()?;
        let attribute = AttributeDefinition::builder()
            .attribute_name(KEY_ATTRIBUTE)
            .attribute_type(ScalarAttributeType::S)
            .build()?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(READ_CAPACITY_UNITS)
            .write_capacity_units(WRITE_CAPACITY_UNITS)
            .build()?;

        self.client
            .create_table()
            .table_name(table)
            .key_schema(key_schema)
            .attribute_definitions(attribute)
            .provisioned_throughput(throughput)
            .send()
            .await
            .with_context(|| format!("CreateTable failed for '{table}'"))?;

        Ok(())
    }

    async fn batch_write(&self, table: &str, rows: Vec<Row>) -> Result<usize> {
        let requests = rows
            .into_iter()
            .map(|row| -> Result<WriteRequest> {
                let put = PutRequest::builder().set_item(Some(to_attributes(row))).build()?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>>>()?;

        let resp = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .with_context(|| format!("BatchWriteItem failed for '{table}'"))?;

        let unprocessed = resp
            .unprocessed_items
            .unwrap_or_default()
            .values()
            .map(Vec::len)
            .sum();
        Ok(unprocessed)
    }

    async fn scan(&self, table: &str, start_key: Option<Row>, consistent: bool) -> Result<ScanPage> {
        let resp = self
            .client
            .scan()
            .table_name(table)
            .consistent_read(consistent)
            .projection_expression(PROJECTION)
            .set_expression_attribute_names(Some(attribute_names()))
            .set_exclusive_start_key(start_key.map(to_attributes))
            .send()
            .await
            .with_context(|| format!("Scan failed for '{table}'"))?;

        Ok(ScanPage {
            rows: resp.items.unwrap_or_default().into_iter().map(from_attributes).collect(),
            last_key: resp.last_evaluated_key.map(from_attributes),
        })
    }

    async fn query(&self, table: &str, key: &str) -> Result<Vec<Row>> {
        let resp = self
            .client
            .query()
            .table_name(table)
            .consistent_read(true)
            .key_condition_expression("#k = :key")
            .projection_expression(PROJECTION)
            .set_expression_attribute_names(Some(attribute_names()))
            .expression_attribute_values(":key", AttributeValue::S(key.to_string()))
            .send()
            .await
            .with_context(|| format!("Query failed for '{table}'"))?;

        Ok(resp.items.unwrap_or_default().into_iter().map(from_attributes).collect())
    }
}

fn attribute_names() -> HashMap<String, String> {
    HashMap::from([
        ("#k".to_string(), KEY_ATTRIBUTE.to_string()),
        ("#v".to_string(), VALUE_ATTRIBUTE.to_string()),
        ("#s".to_string(), SERIALIZATION_ATTRIBUTE.to_string()),
    ])
}

fn to_attributes(row: Row) -> HashMap<String, AttributeValue> {
    row.into_iter()
        .map(|(name, value)| (name, AttributeValue::S(value)))
        .collect()
}

/// Non-string attributes are dropped.
fn from_attributes(attributes: HashMap<String, AttributeValue>) -> Row {
    attributes
        .into_iter()
        .filter_map(|(name, value)| match value {
            AttributeValue::S(s) => Some((name, s)),
            _ => None,
        })
        .collect()
}
