//! S3 home folders: one bucket per employee.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use tracing::{debug, info, warn};

use super::aws::{CodeMap, adapter_error};
use super::{HomeFolder, ObjectStorage, home_folder_name, random_suffix, select_home_folder};
use crate::error::{AdapterError, ErrorKind};

/// The one region where `CreateBucket` must not carry a location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

/// The name is ours already; the bucket can be reused.
const BUCKET_OWNED: &[&str] = &["BucketAlreadyOwnedByYou"];
/// The name belongs to another AWS account.
const BUCKET_TAKEN: &[&str] = &["BucketAlreadyExists"];
const NO_SUCH_BUCKET: &[&str] = &["NoSuchBucket"];

/// `DeleteObjects` accepts at most this many keys per call.
const DELETE_BATCH: usize = 1000;

pub struct S3HomeFolders {
    client: Client,
    region: String,
    prefix: String,
}

impl S3HomeFolders {
    pub fn new(config: &aws_config::SdkConfig, region: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            region: region.into(),
            prefix: prefix.into(),
        }
    }

    /// Delete every object in `bucket`, one listing page at a time.
    async fn empty_bucket(&self, bucket: &str) -> Result<usize, AdapterError> {
        let codes = CodeMap {
            not_found: NO_SUCH_BUCKET,
            ..Default::default()
        };
        let mut removed = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| adapter_error(e, &format!("S3: Could not list objects in '{bucket}'"), codes))?;

            let ids = page
                .contents()
                .iter()
                .filter_map(|object| object.key())
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AdapterError::unknown(format!("S3: Invalid object key in '{bucket}' ({e})")))?;

            for chunk in ids.chunks(DELETE_BATCH) {
                let delete = Delete::builder()
                    .set_objects(Some(chunk.to_vec()))
                    .quiet(true)
                    .build()
                    .map_err(|e| AdapterError::unknown(format!("S3: Invalid delete request for '{bucket}' ({e})")))?;
                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| {
                        adapter_error(e, &format!("S3: Could not delete objects in '{bucket}'"), codes)
                    })?;
                removed += chunk.len();
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!(bucket, removed, "Bucket emptied");
        Ok(removed)
    }
}

const CREATE_CODES: CodeMap<'static> = CodeMap {
    already_exists: BUCKET_OWNED,
    not_found: &[],
    conflict: BUCKET_TAKEN,
};

/// A bucket we already own is reused; any other failure stands.
fn create_failure(bucket: String, err: AdapterError) -> Result<HomeFolder, AdapterError> {
    match err.kind {
        ErrorKind::AlreadyExists => {
            info!(bucket = %bucket, "Home folder bucket already owned; reusing it");
            Ok(HomeFolder {
                message: format!("AWS: S3 home folder '{bucket}' already exists; reusing it"),
                bucket,
            })
        }
        ErrorKind::Conflict => {
            let err = AdapterError::conflict(format!(
                "AWS: S3 bucket name '{bucket}' is owned by another account"
            ));
            warn!(bucket = %bucket, error = %err, "Home folder creation failed");
            Err(err)
        }
        _ => {
            warn!(bucket = %bucket, error = %err, "Home folder creation failed");
            Err(err)
        }
    }
}

#[async_trait]
impl ObjectStorage for S3HomeFolders {
    async fn create_home_folder(&self, username: &str) -> Result<HomeFolder, AdapterError> {
        let bucket = home_folder_name(&self.prefix, username, random_suffix());

        let mut request = self.client.create_bucket().bucket(&bucket);
        if self.region != DEFAULT_S3_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!(username, bucket = %bucket, region = %self.region, "Home folder bucket created");
                Ok(HomeFolder {
                    message: format!("AWS: Provisioned S3 home folder '{bucket}'"),
                    bucket,
                })
            }
            Err(e) => {
                let err = adapter_error(
                    e,
                    &format!("AWS: Failed to create S3 bucket '{bucket}'"),
                    CREATE_CODES,
                );
                create_failure(bucket, err)
            }
        }
    }

    async fn delete_home_folder(&self, bucket: &str) -> Result<String, AdapterError> {
        let gone = || {
            AdapterError::not_found(format!("AWS: S3 bucket '{bucket}' already removed"))
        };

        let removed = match self.empty_bucket(bucket).await {
            Ok(n) => n,
            Err(e) if e.is(ErrorKind::NotFound) => return Err(gone()),
            Err(e) => return Err(e),
        };

        match self.client.delete_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, removed, "Home folder bucket deleted");
                Ok(format!(
                    "AWS: Emptied ({removed} objects) and deleted S3 home folder '{bucket}'"
                ))
            }
            Err(e) => {
                let err = adapter_error(
                    e,
                    &format!("AWS: Failed to delete S3 bucket '{bucket}'"),
                    CodeMap {
                        not_found: NO_SUCH_BUCKET,
                        ..Default::default()
                    },
                );
                if err.is(ErrorKind::NotFound) {
                    return Err(gone());
                }
                warn!(bucket, error = %err, "Home folder deletion failed");
                Err(err)
            }
        }
    }

    async fn find_home_folder(&self, username: &str) -> Result<String, AdapterError> {
        let listing = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| adapter_error(e, "AWS: Could not list S3 buckets", CodeMap::default()))?;

        let names = listing.buckets().iter().filter_map(|b| b.name());
        let bucket = select_home_folder(&self.prefix, username, names)?;
        debug!(username, bucket = %bucket, "Recovered home folder by prefix");
        Ok(bucket)
    }
}
