//! Mock-mode adapters: canned answers, no I/O.
//!
//! Selected at startup when the backends are unreachable (or `MOCK_MODE=on`).
//! Every message carries [`MOCK_MARKER`].

use async_trait::async_trait;

use super::{
    HomeFolder, IdentityDirectory, MOCK_MARKER, ObjectStorage, RecordStore, home_folder_name,
    random_suffix,
};
use crate::employee::{EmployeeRecord, EmployeeStatus, FullName};
use crate::error::AdapterError;

pub struct MockDirectory;

#[async_trait]
impl IdentityDirectory for MockDirectory {
    fn name(&self) -> &'static str {
        "MOCK"
    }

    async fn create_identity(
        &self,
        username: &str,
        _name: FullName<'_>,
    ) -> Result<String, AdapterError> {
        Ok(format!("{MOCK_MARKER} Created IAM User {username}"))
    }

    async fn delete_identity(
        &self,
        username: &str,
        _name: Option<FullName<'_>>,
    ) -> Result<String, AdapterError> {
        Ok(format!("{MOCK_MARKER} Deleted IAM User {username}"))
    }
}

pub struct MockStorage {
    prefix: String,
}

impl MockStorage {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn create_home_folder(&self, username: &str) -> Result<HomeFolder, AdapterError> {
        let bucket = home_folder_name(&self.prefix, username, random_suffix());
        Ok(HomeFolder {
            message: format!("{MOCK_MARKER} Created S3 Bucket {bucket}"),
            bucket,
        })
    }

    async fn delete_home_folder(&self, bucket: &str) -> Result<String, AdapterError> {
        Ok(format!("{MOCK_MARKER} Deleted S3 Bucket {bucket}"))
    }

    async fn find_home_folder(&self, username: &str) -> Result<String, AdapterError> {
        Ok(super::home_folder_base(&self.prefix, username))
    }
}

pub struct MockRecords;

/// The two employees mock mode lists.
pub fn sample_employees() -> Vec<EmployeeRecord> {
    [("alice", "wonder", "Engineering"), ("bob", "builder", "Construction")]
        .into_iter()
        .map(|(first, last, department)| EmployeeRecord {
            username: format!("{first}.{last}"),
            first_name: capitalize(first),
            last_name: capitalize(last),
            department: department.to_string(),
            role: String::new(),
            status: EmployeeStatus::Active,
            home_folder: None,
            onboarded_at: None,
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl RecordStore for MockRecords {
    fn log_prefix(&self) -> &'static str {
        MOCK_MARKER
    }

    async fn list_employees(&self) -> Result<Vec<EmployeeRecord>, AdapterError> {
        Ok(sample_employees())
    }

    async fn put_employee(&self, record: &EmployeeRecord) -> Result<String, AdapterError> {
        Ok(format!(
            "{MOCK_MARKER} Registered employee record for {}",
            record.username
        ))
    }

    /// Synthesizes an `Active` record whose names come from the username.
    async fn get_employee(&self, username: &str) -> Result<Option<EmployeeRecord>, AdapterError> {
        let (first, last) = username.split_once('.').unwrap_or((username, ""));
        Ok(Some(EmployeeRecord {
            username: username.to_string(),
            first_name: capitalize(first),
            last_name: capitalize(last),
            department: String::new(),
            role: String::new(),
            status: EmployeeStatus::Active,
            home_folder: None,
            onboarded_at: None,
        }))
    }

    async fn delete_employee(&self, username: &str) -> Result<String, AdapterError> {
        Ok(format!("{MOCK_MARKER} Removed record {username}"))
    }

    async fn update_status(
        &self,
        username: &str,
        status: EmployeeStatus,
    ) -> Result<String, AdapterError> {
        Ok(format!("{MOCK_MARKER} Marked {username} as {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADA: FullName<'static> = FullName {
        first: "Ada",
        last: "Lovelace",
    };

    #[tokio::test]
    async fn every_message_carries_the_marker() {
        let directory = MockDirectory;
        let storage = MockStorage::new("innovatech-home");
        let records = MockRecords;

        let folder = storage.create_home_folder("ada.lovelace").await.unwrap();
        let record = records.get_employee("ada.lovelace").await.unwrap().unwrap();

        let messages = vec![
            directory.create_identity("ada.lovelace", ADA).await.unwrap(),
            directory.delete_identity("ada.lovelace", None).await.unwrap(),
            folder.message.clone(),
            storage.delete_home_folder(&folder.bucket).await.unwrap(),
            records.put_employee(&record).await.unwrap(),
            records.delete_employee("ada.lovelace").await.unwrap(),
            records
                .update_status("ada.lovelace", EmployeeStatus::Inactive)
                .await
                .unwrap(),
        ];
        for message in messages {
            assert!(message.starts_with(MOCK_MARKER), "missing marker: {message}");
        }
    }

    #[tokio::test]
    async fn lists_sample_employees() {
        let employees = MockRecords.list_employees().await.unwrap();
        let names: Vec<_> = employees.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["alice.wonder", "bob.builder"]);
        assert_eq!(employees[1].department, "Construction");
    }

    #[tokio::test]
    async fn synthesized_record_splits_username() {
        let record = MockRecords.get_employee("ada.lovelace").await.unwrap().unwrap();
        assert_eq!(record.first_name, "Ada");
        assert_eq!(record.last_name, "Lovelace");
    }

    #[tokio::test]
    async fn mock_bucket_uses_prefix() {
        let folder = MockStorage::new("innovatech-home")
            .create_home_folder("ada.lovelace")
            .await
            .unwrap();
        assert!(folder.bucket.starts_with("innovatech-home-ada.lovelace-"));
    }
}
