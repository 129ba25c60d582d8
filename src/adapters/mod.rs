//! External service adapters — identity directory, object storage, record store.
//!
//! Each backend sits behind a narrow async trait. Implementations translate
//! backend-specific failures into [`AdapterError`] values whose message is
//! ready to be appended to a workflow log; nothing below this boundary panics
//! or leaks SDK error types.

pub mod aws;
pub mod dynamo;
pub mod iam;
pub mod ldap;
pub mod memory;
pub mod mock;
pub mod s3;

use std::sync::LazyLock;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;

use crate::employee::{EmployeeRecord, EmployeeStatus, FullName};
use crate::error::AdapterError;

/// Prefix carried by every message produced in mock mode.
pub const MOCK_MARKER: &str = "MOCK:";

/// S3 bucket names are limited to 63 characters.
const MAX_BUCKET_NAME_LEN: usize = 63;

static INVALID_BUCKET_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9.-]+").expect("valid bucket-char regex"));

/// S3 rejects adjacent periods.
static PERIOD_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{2,}").expect("valid period-run regex"));

/// Identity directory (IAM users or Active Directory accounts).
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Short label used in log lines, e.g. `IAM` or `LDAP`.
    fn name(&self) -> &'static str;

    /// Create a principal for the employee.
    async fn create_identity(&self, username: &str, name: FullName<'_>)
    -> Result<String, AdapterError>;

    /// Delete the employee's principal. Directories that address entries by
    /// display name need `name`; the others ignore it.
    async fn delete_identity(
        &self,
        username: &str,
        name: Option<FullName<'_>>,
    ) -> Result<String, AdapterError>;
}

/// A freshly provisioned home folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeFolder {
    pub bucket: String,
    pub message: String,
}

/// Per-employee bucket storage.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create a uniquely named bucket for the employee.
    async fn create_home_folder(&self, username: &str) -> Result<HomeFolder, AdapterError>;

    /// Empty and delete a bucket.
    async fn delete_home_folder(&self, bucket: &str) -> Result<String, AdapterError>;

    /// Locate the bucket of a record that predates stored bucket names.
    async fn find_home_folder(&self, username: &str) -> Result<String, AdapterError>;
}

/// Key-value store of employee records, keyed by username.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Prefix for log lines the workflow writes about this store.
    fn log_prefix(&self) -> &'static str {
        "DB:"
    }

    async fn list_employees(&self) -> Result<Vec<EmployeeRecord>, AdapterError>;

    async fn put_employee(&self, record: &EmployeeRecord) -> Result<String, AdapterError>;

    async fn get_employee(&self, username: &str) -> Result<Option<EmployeeRecord>, AdapterError>;

    async fn delete_employee(&self, username: &str) -> Result<String, AdapterError>;

    /// Set the status of an existing record. A missing record is `NotFound`.
    async fn update_status(
        &self,
        username: &str,
        status: EmployeeStatus,
    ) -> Result<String, AdapterError>;
}

// ── Home folder naming ─────────────────────────────────────────────────

/// `prefix-username`, lowercased, with characters S3 rejects replaced by `-`
/// and runs of periods collapsed to one.
pub fn home_folder_base(prefix: &str, username: &str) -> String {
    let raw = format!("{prefix}-{username}").to_lowercase();
    let replaced = INVALID_BUCKET_CHARS.replace_all(&raw, "-");
    let mut base = PERIOD_RUNS.replace_all(&replaced, ".").into_owned();
    // Leave room for the `-NNNN` suffix.
    base.truncate(MAX_BUCKET_NAME_LEN - 5);
    base.trim_end_matches(['-', '.']).to_string()
}

/// Full bucket name: `prefix-username-NNNN`.
pub fn home_folder_name(prefix: &str, username: &str, suffix: u16) -> String {
    format!("{}-{suffix:04}", home_folder_base(prefix, username))
}

/// Random 4-digit suffix.
pub fn random_suffix() -> u16 {
    rand::thread_rng().gen_range(1000..=9999)
}

/// Whether `bucket` is a home folder of `username`, either a suffixed name or
/// the unsuffixed legacy form.
pub fn is_home_folder_of(prefix: &str, username: &str, bucket: &str) -> bool {
    let base = home_folder_base(prefix, username);
    match bucket.strip_prefix(base.as_str()) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

/// Pick the one bucket belonging to `username`.
///
/// Zero matches is `NotFound`; more than one is `Ambiguous` and nothing is
/// chosen.
pub fn select_home_folder<'a, I>(
    prefix: &str,
    username: &str,
    buckets: I,
) -> Result<String, AdapterError>
where
    I: IntoIterator<Item = &'a str>,
{
    let matches: Vec<&str> = buckets
        .into_iter()
        .filter(|bucket| is_home_folder_of(prefix, username, bucket))
        .collect();

    match matches.as_slice() {
        [] => Err(AdapterError::not_found(format!(
            "S3: No home folder found for '{username}'"
        ))),
        [only] => Ok((*only).to_string()),
        many => Err(AdapterError::ambiguous(format!(
            "S3: Multiple home folders match '{username}' ({}); refusing to pick one",
            many.join(", ")
        ))),
    }
}
