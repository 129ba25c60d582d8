//! In-process backends holding state in memory.
//!
//! They follow the same error contract as the AWS and LDAP adapters
//! (`AlreadyExists` on duplicate identities, `NotFound` on missing deletes), so
//! workflows can be exercised end to end without network access. Each can be
//! switched offline to simulate an unreachable backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    HomeFolder, IdentityDirectory, ObjectStorage, RecordStore, home_folder_name, random_suffix,
    select_home_folder,
};
use crate::employee::{EmployeeRecord, EmployeeStatus, FullName};
use crate::error::AdapterError;

fn offline_error(flag: &AtomicBool, backend: &str) -> Result<(), AdapterError> {
    if flag.load(Ordering::SeqCst) {
        return Err(AdapterError::unavailable(format!("{backend}: backend offline")));
    }
    Ok(())
}

// ── Identity ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryDirectory {
    users: RwLock<BTreeSet<String>>,
    offline: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn insert(&self, username: &str) {
        self.users.write().await.insert(username.to_string());
    }

    pub async fn contains(&self, username: &str) -> bool {
        self.users.read().await.contains(username)
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    fn name(&self) -> &'static str {
        "MEMORY"
    }

    async fn create_identity(
        &self,
        username: &str,
        _name: FullName<'_>,
    ) -> Result<String, AdapterError> {
        offline_error(&self.offline, "IDENTITY")?;
        if !self.users.write().await.insert(username.to_string()) {
            return Err(AdapterError::already_exists(format!(
                "IDENTITY: User '{username}' already exists."
            )));
        }
        Ok(format!("IDENTITY: Created user '{username}'"))
    }

    async fn delete_identity(
        &self,
        username: &str,
        _name: Option<FullName<'_>>,
    ) -> Result<String, AdapterError> {
        offline_error(&self.offline, "IDENTITY")?;
        if !self.users.write().await.remove(username) {
            return Err(AdapterError::not_found(format!(
                "IDENTITY: User '{username}' not found; nothing to delete"
            )));
        }
        Ok(format!("IDENTITY: Deleted user '{username}'"))
    }
}

// ── Storage ────────────────────────────────────────────────────────────

/// Buckets mapped to their object keys.
pub struct MemoryStorage {
    prefix: String,
    buckets: RwLock<BTreeMap<String, Vec<String>>>,
    offline: AtomicBool,
}

impl MemoryStorage {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            buckets: RwLock::new(BTreeMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Add a bucket directly, e.g. one created before bucket names were stored.
    pub async fn insert_bucket(&self, bucket: &str, objects: &[&str]) {
        self.buckets.write().await.insert(
            bucket.to_string(),
            objects.iter().map(|o| o.to_string()).collect(),
        );
    }

    pub async fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn create_home_folder(&self, username: &str) -> Result<HomeFolder, AdapterError> {
        offline_error(&self.offline, "STORAGE")?;
        let bucket = home_folder_name(&self.prefix, username, random_suffix());
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(&bucket) {
            return Ok(HomeFolder {
                message: format!("STORAGE: Home folder '{bucket}' already exists; reusing it"),
                bucket,
            });
        }
        buckets.insert(bucket.clone(), Vec::new());
        Ok(HomeFolder {
            message: format!("STORAGE: Provisioned home folder '{bucket}'"),
            bucket,
        })
    }

    async fn delete_home_folder(&self, bucket: &str) -> Result<String, AdapterError> {
        offline_error(&self.offline, "STORAGE")?;
        match self.buckets.write().await.remove(bucket) {
            Some(objects) => Ok(format!(
                "STORAGE: Emptied ({} objects) and deleted home folder '{bucket}'",
                objects.len()
            )),
            None => Err(AdapterError::not_found(format!(
                "STORAGE: Bucket '{bucket}' already removed"
            ))),
        }
    }

    async fn find_home_folder(&self, username: &str) -> Result<String, AdapterError> {
        offline_error(&self.offline, "STORAGE")?;
        let buckets = self.buckets.read().await;
        select_home_folder(&self.prefix, username, buckets.keys().map(String::as_str))
    }
}

// ── Records ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRecords {
    records: RwLock<BTreeMap<String, EmployeeRecord>>,
    offline: AtomicBool,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn insert(&self, record: EmployeeRecord) {
        self.records
            .write()
            .await
            .insert(record.username.clone(), record);
    }

    pub async fn get(&self, username: &str) -> Option<EmployeeRecord> {
        self.records.read().await.get(username).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn list_employees(&self) -> Result<Vec<EmployeeRecord>, AdapterError> {
        offline_error(&self.offline, "DB")?;
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn put_employee(&self, record: &EmployeeRecord) -> Result<String, AdapterError> {
        offline_error(&self.offline, "DB")?;
        self.insert(record.clone()).await;
        Ok(format!("DB: Registered employee record for {}", record.username))
    }

    async fn get_employee(&self, username: &str) -> Result<Option<EmployeeRecord>, AdapterError> {
        offline_error(&self.offline, "DB")?;
        Ok(self.get(username).await)
    }

    async fn delete_employee(&self, username: &str) -> Result<String, AdapterError> {
        offline_error(&self.offline, "DB")?;
        self.records.write().await.remove(username);
        Ok(format!("DB: Removed record {username}"))
    }

    async fn update_status(
        &self,
        username: &str,
        status: EmployeeStatus,
    ) -> Result<String, AdapterError> {
        offline_error(&self.offline, "DB")?;
        match self.records.write().await.get_mut(username) {
            Some(record) => {
                record.status = status;
                Ok(format!("DB: Marked {username} as {status}"))
            }
            None => Err(AdapterError::not_found(format!(
                "DB: No employee record for {username}"
            ))),
        }
    }
}
