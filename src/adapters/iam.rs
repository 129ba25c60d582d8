//! AWS IAM identity directory.

use async_trait::async_trait;
use aws_sdk_iam::Client;
use tracing::{debug, info, warn};

use super::IdentityDirectory;
use super::aws::{CodeMap, adapter_error};
use crate::employee::FullName;
use crate::error::{AdapterError, ErrorKind};

const ENTITY_EXISTS: &[&str] = &["EntityAlreadyExists"];
const NO_SUCH_ENTITY: &[&str] = &["NoSuchEntity"];

/// Creates and deletes IAM users named after the employee's username.
pub struct IamDirectory {
    client: Client,
}

impl IamDirectory {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Remove what IAM refuses to delete a user with: the console login
    /// profile and any access keys. Missing pieces are fine.
    async fn detach_credentials(&self, username: &str) -> Result<(), AdapterError> {
        let codes = CodeMap {
            not_found: NO_SUCH_ENTITY,
            ..Default::default()
        };

        if let Err(e) = self
            .client
            .delete_login_profile()
            .user_name(username)
            .send()
            .await
        {
            let err = adapter_error(e, &format!("AWS: Could not remove login profile of '{username}'"), codes);
            if !err.is(ErrorKind::NotFound) {
                return Err(err);
            }
        }

        let keys = match self.client.list_access_keys().user_name(username).send().await {
            Ok(out) => out,
            Err(e) => {
                let err = adapter_error(e, &format!("AWS: Could not list access keys of '{username}'"), codes);
                return if err.is(ErrorKind::NotFound) { Ok(()) } else { Err(err) };
            }
        };

        for key in keys.access_key_metadata() {
            let Some(key_id) = key.access_key_id() else {
                continue;
            };
            debug!(username, key_id, "Deleting IAM access key");
            self.client
                .delete_access_key()
                .user_name(username)
                .access_key_id(key_id)
                .send()
                .await
                .map_err(|e| {
                    adapter_error(e, &format!("AWS: Could not delete access key of '{username}'"), codes)
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for IamDirectory {
    fn name(&self) -> &'static str {
        "IAM"
    }

    async fn create_identity(
        &self,
        username: &str,
        _name: FullName<'_>,
    ) -> Result<String, AdapterError> {
        match self.client.create_user().user_name(username).send().await {
            Ok(_) => {
                info!(username, "IAM user created");
                Ok(format!("AWS: Created IAM User '{username}'"))
            }
            Err(e) => {
                let err = adapter_error(
                    e,
                    &format!("AWS: Failed to create IAM User '{username}'"),
                    CodeMap {
                        already_exists: ENTITY_EXISTS,
                        ..Default::default()
                    },
                );
                if err.is(ErrorKind::AlreadyExists) {
                    return Err(AdapterError::already_exists(format!(
                        "AWS: IAM User '{username}' already exists."
                    )));
                }
                warn!(username, error = %err, "IAM user creation failed");
                Err(err)
            }
        }
    }

    async fn delete_identity(
        &self,
        username: &str,
        _name: Option<FullName<'_>>,
    ) -> Result<String, AdapterError> {
        self.detach_credentials(username).await?;

        match self.client.delete_user().user_name(username).send().await {
            Ok(_) => {
                info!(username, "IAM user deleted");
                Ok(format!("AWS: Deleted IAM User '{username}'"))
            }
            Err(e) => {
                let err = adapter_error(
                    e,
                    &format!("AWS: User '{username}' could not be deleted"),
                    CodeMap {
                        not_found: NO_SUCH_ENTITY,
                        ..Default::default()
                    },
                );
                if err.is(ErrorKind::NotFound) {
                    return Err(AdapterError::not_found(format!(
                        "AWS: IAM User '{username}' not found; nothing to delete"
                    )));
                }
                warn!(username, error = %err, "IAM user deletion failed");
                Err(err)
            }
        }
    }
}
