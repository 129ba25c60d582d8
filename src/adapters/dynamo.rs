//! DynamoDB record store.
//!
//! Items are flat string maps using the camelCase attribute names the HR
//! frontend reads (`username`, `firstName`, `homeFolder`, ...).

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::RecordStore;
use super::aws::{CodeMap, adapter_error};
use crate::employee::{EmployeeRecord, EmployeeStatus};
use crate::error::{AdapterError, ErrorKind};

const CONDITION_FAILED: &[&str] = &["ConditionalCheckFailedException"];
const MISSING_TABLE: &[&str] = &["ResourceNotFoundException"];

type Item = HashMap<String, AttributeValue>;

pub struct DynamoRecordStore {
    client: Client,
    table: String,
}

impl DynamoRecordStore {
    pub fn new(config: &aws_config::SdkConfig, table: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            table: table.into(),
        }
    }

    /// Confirm the table is reachable with the current credentials.
    pub async fn probe(&self) -> Result<(), AdapterError> {
        self.client
            .describe_table()
            .table_name(&self.table)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                adapter_error(
                    e,
                    &format!("DB: Table '{}' is not reachable", self.table),
                    CodeMap {
                        not_found: MISSING_TABLE,
                        ..Default::default()
                    },
                )
            })
    }

    fn key(username: &str) -> (String, AttributeValue) {
        ("username".to_string(), AttributeValue::S(username.to_string()))
    }
}

fn to_item(record: &EmployeeRecord) -> Item {
    let mut item = Item::new();
    let mut put = |name: &str, value: &str| {
        item.insert(name.to_string(), AttributeValue::S(value.to_string()));
    };
    put("username", &record.username);
    put("firstName", &record.first_name);
    put("lastName", &record.last_name);
    put("department", &record.department);
    put("role", &record.role);
    put("status", record.status.as_str());
    if let Some(bucket) = &record.home_folder {
        put("homeFolder", bucket);
    }
    if let Some(at) = &record.onboarded_at {
        put("onboardedAt", &at.to_rfc3339());
    }
    item
}

fn from_item(item: &Item) -> Result<EmployeeRecord, AdapterError> {
    let text = |name: &str| item.get(name).and_then(|v| v.as_s().ok()).cloned();

    let username = text("username")
        .ok_or_else(|| AdapterError::unknown("DB: Item without a username attribute"))?;
    let status = match text("status") {
        Some(raw) => EmployeeStatus::parse(&raw).ok_or_else(|| {
            AdapterError::unknown(format!("DB: Record '{username}' has unknown status '{raw}'"))
        })?,
        None => EmployeeStatus::Active,
    };
    let onboarded_at = text("onboardedAt")
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|at| at.with_timezone(&Utc));

    Ok(EmployeeRecord {
        first_name: text("firstName").unwrap_or_default(),
        last_name: text("lastName").unwrap_or_default(),
        department: text("department").unwrap_or_default(),
        role: text("role").unwrap_or_default(),
        status,
        home_folder: text("homeFolder"),
        onboarded_at,
        username,
    })
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn list_employees(&self) -> Result<Vec<EmployeeRecord>, AdapterError> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let page = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| adapter_error(e, "DB: Failed to scan employee records", CodeMap::default()))?;

            for item in page.items() {
                match from_item(item) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(error = %e, "Skipping malformed employee item"),
                }
            }

            match page.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(count = records.len(), "Scanned employee records");
        Ok(records)
    }

    async fn put_employee(&self, record: &EmployeeRecord) -> Result<String, AdapterError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(|e| {
                adapter_error(
                    e,
                    &format!("DB: Failed to register employee record for {}", record.username),
                    CodeMap::default(),
                )
            })?;

        info!(username = %record.username, "Employee record stored");
        Ok(format!("DB: Registered employee record for {}", record.username))
    }

    async fn get_employee(&self, username: &str) -> Result<Option<EmployeeRecord>, AdapterError> {
        let (name, value) = Self::key(username);
        let out = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(name, value)
            .send()
            .await
            .map_err(|e| {
                adapter_error(e, &format!("DB: Failed to read record {username}"), CodeMap::default())
            })?;

        out.item().map(from_item).transpose()
    }

    async fn delete_employee(&self, username: &str) -> Result<String, AdapterError> {
        let (name, value) = Self::key(username);
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(name, value)
            .send()
            .await
            .map_err(|e| {
                adapter_error(e, &format!("DB: Failed to remove record {username}"), CodeMap::default())
            })?;

        info!(username, "Employee record removed");
        Ok(format!("DB: Removed record {username}"))
    }

    async fn update_status(
        &self,
        username: &str,
        status: EmployeeStatus,
    ) -> Result<String, AdapterError> {
        let (name, value) = Self::key(username);
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(name, value)
            .update_expression("SET #status = :status")
            .condition_expression("attribute_exists(username)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":status", AttributeValue::S(status.as_str().to_string()))
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(username, status = %status, "Employee status updated");
                Ok(format!("DB: Marked {username} as {status}"))
            }
            Err(e) => {
                let err = adapter_error(
                    e,
                    &format!("DB: Failed to set status of {username}"),
                    CodeMap {
                        not_found: CONDITION_FAILED,
                        ..Default::default()
                    },
                );
                if err.is(ErrorKind::NotFound) {
                    return Err(AdapterError::not_found(format!(
                        "DB: No employee record for {username}"
                    )));
                }
                Err(err)
            }
        }
    }
}
