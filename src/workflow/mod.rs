//! Onboarding and offboarding workflows.
//!
//! Each workflow is a fixed sequence of adapter calls. Steps are best-effort:
//! a failed step is logged and the sequence continues. The record-store write
//! at the end is the exception; if it fails the run aborts and the caller
//! gets an error together with everything logged so far. Nothing is rolled
//! back.

pub mod steps;

use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};

pub use steps::{Step, StepOutcome, StepStatus, WorkflowReport, WorkflowRun};

use crate::adapters::{IdentityDirectory, ObjectStorage, RecordStore};
use crate::config::OffboardPolicy;
use crate::employee::{EmployeeRecord, EmployeeStatus, OffboardRequest, OnboardRequest};
use crate::error::{AdapterError, WorkflowError};

/// Composes the three backends into workflows.
pub struct Orchestrator {
    /// `None` when identity provisioning is disabled for this deployment.
    identity: Option<Arc<dyn IdentityDirectory>>,
    storage: Arc<dyn ObjectStorage>,
    records: Arc<dyn RecordStore>,
    offboard_policy: OffboardPolicy,
}

impl Orchestrator {
    pub fn new(
        identity: Option<Arc<dyn IdentityDirectory>>,
        storage: Arc<dyn ObjectStorage>,
        records: Arc<dyn RecordStore>,
        offboard_policy: OffboardPolicy,
    ) -> Self {
        Self {
            identity,
            storage,
            records,
            offboard_policy,
        }
    }

    pub async fn list_employees(&self) -> Result<Vec<EmployeeRecord>, AdapterError> {
        self.records.list_employees().await
    }

    /// Provision identity and home folder, then register the HR record.
    pub async fn onboard(&self, request: OnboardRequest) -> Result<WorkflowReport, WorkflowError> {
        let username = request.username();
        let mut run = WorkflowRun::new(&username);
        let span = info_span!("onboard", run_id = %run.run_id(), username = %username);

        async move {
            info!("Onboarding started");

            if let Some(identity) = &self.identity {
                let result = identity
                    .create_identity(&username, request.full_name())
                    .await;
                if let Err(e) = run.record_message(Step::CreateIdentity, result) {
                    warn!(error = %e, "Identity provisioning failed; continuing");
                }
            }

            let result = self.storage.create_home_folder(&username).await;
            let home_folder = match run.record(Step::CreateHomeFolder, result, |f| f.message.clone()) {
                Ok(folder) => folder.map(|f| f.bucket),
                Err(e) => {
                    warn!(error = %e, "Home folder provisioning failed; continuing");
                    None
                }
            };

            let record = EmployeeRecord::from_request(&request, home_folder);
            let result = self.records.put_employee(&record).await;
            if let Err(source) = run.record_message(Step::RegisterRecord, result) {
                warn!(error = %source, "Record registration failed; aborting");
                return Err(run.abort(source));
            }

            let report = run.finish();
            info!(steps = report.outcomes.len(), failures = report.failures().count(), "Onboarding finished");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Retire an employee according to the configured policy.
    pub async fn offboard(&self, request: OffboardRequest) -> Result<WorkflowReport, WorkflowError> {
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(WorkflowError::InvalidRequest("username must not be empty".into()));
        }

        let run = WorkflowRun::new(&username);
        let span = info_span!(
            "offboard",
            run_id = %run.run_id(),
            username = %username,
            policy = ?self.offboard_policy
        );

        async move {
            info!("Offboarding started");
            let report = match self.offboard_policy {
                OffboardPolicy::Hard => self.hard_offboard(run, &username).await,
                OffboardPolicy::Soft => self.soft_offboard(run, &username).await,
            }?;
            info!(steps = report.outcomes.len(), failures = report.failures().count(), "Offboarding finished");
            Ok::<_, WorkflowError>(report)
        }
        .instrument(span)
        .await
    }

    /// Load the record; a missing record is a failed lookup.
    async fn lookup(&self, run: &mut WorkflowRun, username: &str) -> Option<EmployeeRecord> {
        let prefix = self.records.log_prefix();
        let result = self.records.get_employee(username).await.and_then(|found| {
            found.ok_or_else(|| {
                AdapterError::not_found(format!("{prefix} No employee record for {username}"))
            })
        });
        run.record(Step::LookupRecord, result, |r| {
            format!("{prefix} Found record for {} ({} {})", r.username, r.first_name, r.last_name)
        })
        .ok()
        .flatten()
    }

    /// Delete identity, home folder and record, each best-effort.
    async fn hard_offboard(
        &self,
        mut run: WorkflowRun,
        username: &str,
    ) -> Result<WorkflowReport, WorkflowError> {
        let record = self.lookup(&mut run, username).await;

        if let Some(identity) = &self.identity {
            let name = record.as_ref().and_then(EmployeeRecord::full_name);
            let result = identity.delete_identity(username, name).await;
            if let Err(e) = run.record_message(Step::DeleteIdentity, result) {
                warn!(error = %e, "Identity removal failed; continuing");
            }
        }

        let stored = record.as_ref().and_then(|r| r.home_folder.clone());
        let result = match stored {
            Some(bucket) => self.storage.delete_home_folder(&bucket).await,
            None => match self.storage.find_home_folder(username).await {
                Ok(bucket) => {
                    info!(bucket = %bucket, "Home folder recovered by prefix match");
                    self.storage.delete_home_folder(&bucket).await
                }
                Err(e) => Err(e),
            },
        };
        if let Err(e) = run.record_message(Step::DeleteHomeFolder, result) {
            warn!(error = %e, "Home folder removal failed; continuing");
        }

        let result = self.records.delete_employee(username).await;
        if let Err(source) = run.record_message(Step::RemoveRecord, result) {
            return Err(run.abort(source));
        }
        Ok(run.finish())
    }

    /// Delete the identity and mark the record `Inactive`. The home folder
    /// is left in place.
    async fn soft_offboard(
        &self,
        mut run: WorkflowRun,
        username: &str,
    ) -> Result<WorkflowReport, WorkflowError> {
        let record = self.lookup(&mut run, username).await;

        if let Some(identity) = &self.identity {
            match record.as_ref() {
                Some(record) => {
                    let result = identity.delete_identity(username, record.full_name()).await;
                    if let Err(e) = run.record_message(Step::DeleteIdentity, result) {
                        warn!(error = %e, "Identity removal failed; continuing");
                    }
                }
                None => run.skip(
                    Step::DeleteIdentity,
                    format!("{}: Skipped deleting identity of {username}; record lookup failed", identity.name()),
                ),
            }
        }

        let result = self
            .records
            .update_status(username, EmployeeStatus::Inactive)
            .await;
        if let Err(source) = run.record_message(Step::DeactivateRecord, result) {
            return Err(run.abort(source));
        }
        Ok(run.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDirectory, MemoryRecords, MemoryStorage};
    use crate::error::ErrorKind;

    const PREFIX: &str = "innovatech-home";

    struct Fixture {
        identity: Arc<MemoryDirectory>,
        storage: Arc<MemoryStorage>,
        records: Arc<MemoryRecords>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                identity: Arc::new(MemoryDirectory::new()),
                storage: Arc::new(MemoryStorage::new(PREFIX)),
                records: Arc::new(MemoryRecords::new()),
            }
        }

        fn orchestrator(&self, with_identity: bool, policy: OffboardPolicy) -> Orchestrator {
            let identity = with_identity
                .then(|| self.identity.clone() as Arc<dyn IdentityDirectory>);
            Orchestrator::new(identity, self.storage.clone(), self.records.clone(), policy)
        }
    }

    fn ada() -> OnboardRequest {
        OnboardRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            department: "Engineering".into(),
            role: "Developer".into(),
        }
    }

    fn offboard(username: &str) -> OffboardRequest {
        OffboardRequest {
            username: username.into(),
        }
    }

    #[tokio::test]
    async fn onboard_runs_three_steps_in_order() {
        let fx = Fixture::new();
        let report = fx
            .orchestrator(true, OffboardPolicy::Soft)
            .onboard(ada())
            .await
            .unwrap();

        let steps: Vec<Step> = report.outcomes.iter().map(|o| o.step).collect();
        assert_eq!(
            steps,
            vec![Step::CreateIdentity, Step::CreateHomeFolder, Step::RegisterRecord]
        );
        assert_eq!(report.log().len(), 3);
        assert_eq!(report.username, "ada.lovelace");
        assert!(fx.identity.contains("ada.lovelace").await);

        let record = fx.records.get("ada.lovelace").await.unwrap();
        let bucket = record.home_folder.expect("bucket stored on record");
        assert_eq!(fx.storage.bucket_names().await, vec![bucket]);
    }

    #[tokio::test]
    async fn onboard_without_identity_runs_two_steps() {
        let fx = Fixture::new();
        let report = fx
            .orchestrator(false, OffboardPolicy::Soft)
            .onboard(ada())
            .await
            .unwrap();
        assert_eq!(report.log().len(), 2);
        assert!(report.outcome(Step::CreateIdentity).is_none());
    }

    #[tokio::test]
    async fn existing_identity_is_a_notice() {
        let fx = Fixture::new();
        fx.identity.insert("ada.lovelace").await;
        let report = fx
            .orchestrator(true, OffboardPolicy::Soft)
            .onboard(ada())
            .await
            .unwrap();
        let outcome = report.outcome(Step::CreateIdentity).unwrap();
        assert_eq!(outcome.status, StepStatus::Notice);
        assert!(outcome.detail.contains("already exists"));
    }

    #[tokio::test]
    async fn storage_failure_does_not_block_record() {
        let fx = Fixture::new();
        fx.storage.set_offline(true);
        let report = fx
            .orchestrator(true, OffboardPolicy::Soft)
            .onboard(ada())
            .await
            .unwrap();

        assert_eq!(
            report.outcome(Step::CreateHomeFolder).unwrap().status,
            StepStatus::Failed
        );
        let record = fx.records.get("ada.lovelace").await.unwrap();
        assert!(record.home_folder.is_none());
    }

    /// Storage that rejects every call with the same error.
    struct RejectingStorage(AdapterError);

    #[async_trait::async_trait]
    impl ObjectStorage for RejectingStorage {
        async fn create_home_folder(
            &self,
            _username: &str,
        ) -> Result<crate::adapters::HomeFolder, AdapterError> {
            Err(self.0.clone())
        }

        async fn delete_home_folder(&self, _bucket: &str) -> Result<String, AdapterError> {
            Err(self.0.clone())
        }

        async fn find_home_folder(&self, _username: &str) -> Result<String, AdapterError> {
            Err(self.0.clone())
        }
    }

    async fn onboard_with_storage_error(err: AdapterError) -> (WorkflowReport, Arc<MemoryRecords>) {
        let records = Arc::new(MemoryRecords::new());
        let orchestrator = Orchestrator::new(
            None,
            Arc::new(RejectingStorage(err)),
            records.clone(),
            OffboardPolicy::Soft,
        );
        (orchestrator.onboard(ada()).await.unwrap(), records)
    }

    #[tokio::test]
    async fn bucket_owned_elsewhere_fails_storage_step() {
        let (report, records) = onboard_with_storage_error(AdapterError::conflict(
            "AWS: S3 bucket name 'innovatech-home-ada.lovelace-4821' is owned by another account",
        ))
        .await;

        let outcome = report.outcome(Step::CreateHomeFolder).unwrap();
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Conflict));
        assert_eq!(report.failures().count(), 1);
        assert!(records.get("ada.lovelace").await.unwrap().home_folder.is_none());
    }

    #[tokio::test]
    async fn storage_already_exists_is_not_treated_as_met() {
        let (report, _) =
            onboard_with_storage_error(AdapterError::already_exists("STORAGE: exists")).await;
        assert_eq!(
            report.outcome(Step::CreateHomeFolder).unwrap().status,
            StepStatus::Failed
        );
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn record_failure_aborts_with_partial_log() {
        let fx = Fixture::new();
        fx.records.set_offline(true);
        let err = fx
            .orchestrator(true, OffboardPolicy::Soft)
            .onboard(ada())
            .await
            .unwrap_err();

        let WorkflowError::Aborted { report, source } = err else {
            panic!("expected abort");
        };
        assert_eq!(source.kind, ErrorKind::BackendUnavailable);
        assert_eq!(report.outcomes.len(), 3);
        // No rollback: identity and bucket stay provisioned.
        assert!(fx.identity.contains("ada.lovelace").await);
        assert_eq!(fx.storage.bucket_names().await.len(), 1);
    }

    #[tokio::test]
    async fn soft_offboard_keeps_inactive_record() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator(true, OffboardPolicy::Soft);
        orchestrator.onboard(ada()).await.unwrap();

        let report = orchestrator.offboard(offboard("ada.lovelace")).await.unwrap();
        let steps: Vec<Step> = report.outcomes.iter().map(|o| o.step).collect();
        assert_eq!(
            steps,
            vec![Step::LookupRecord, Step::DeleteIdentity, Step::DeactivateRecord]
        );

        let record = fx.records.get("ada.lovelace").await.expect("record kept");
        assert_eq!(record.status, EmployeeStatus::Inactive);
        assert!(!fx.identity.contains("ada.lovelace").await);
        // Storage is not decommissioned by the soft policy.
        assert_eq!(fx.storage.bucket_names().await.len(), 1);
    }

    #[tokio::test]
    async fn soft_offboard_of_unknown_user_skips_identity_and_aborts() {
        let fx = Fixture::new();
        let err = fx
            .orchestrator(true, OffboardPolicy::Soft)
            .offboard(offboard("ghost.user"))
            .await
            .unwrap_err();

        let WorkflowError::Aborted { report, source } = err else {
            panic!("expected abort");
        };
        assert_eq!(source.kind, ErrorKind::NotFound);
        assert_eq!(
            report.outcome(Step::LookupRecord).unwrap().status,
            StepStatus::Failed
        );
        assert_eq!(
            report.outcome(Step::DeleteIdentity).unwrap().status,
            StepStatus::Skipped
        );
    }

    #[tokio::test]
    async fn hard_offboard_removes_everything() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator(true, OffboardPolicy::Hard);
        orchestrator.onboard(ada()).await.unwrap();

        let report = orchestrator.offboard(offboard("ada.lovelace")).await.unwrap();
        assert_eq!(report.failures().count(), 0);
        assert!(fx.records.get("ada.lovelace").await.is_none());
        assert!(fx.storage.bucket_names().await.is_empty());
        assert!(!fx.identity.contains("ada.lovelace").await);
    }

    #[tokio::test]
    async fn hard_offboard_recovers_legacy_bucket_by_prefix() {
        let fx = Fixture::new();
        fx.storage
            .insert_bucket("innovatech-home-ada.lovelace-4821", &["notes.txt"])
            .await;
        fx.storage.insert_bucket("innovatech-home-bob.builder-1111", &[]).await;
        let mut record = EmployeeRecord::from_request(&ada(), None);
        record.onboarded_at = None;
        fx.records.insert(record).await;

        let report = fx
            .orchestrator(false, OffboardPolicy::Hard)
            .offboard(offboard("ada.lovelace"))
            .await
            .unwrap();

        let outcome = report.outcome(Step::DeleteHomeFolder).unwrap();
        assert_eq!(outcome.status, StepStatus::Succeeded);
        assert!(outcome.detail.contains("innovatech-home-ada.lovelace-4821"));
        assert_eq!(
            fx.storage.bucket_names().await,
            vec!["innovatech-home-bob.builder-1111".to_string()]
        );
    }

    #[tokio::test]
    async fn hard_offboard_refuses_ambiguous_buckets() {
        let fx = Fixture::new();
        fx.storage.insert_bucket("innovatech-home-ada.lovelace-4821", &[]).await;
        fx.storage.insert_bucket("innovatech-home-ada.lovelace-1302", &[]).await;
        fx.records.insert(EmployeeRecord::from_request(&ada(), None)).await;

        let report = fx
            .orchestrator(false, OffboardPolicy::Hard)
            .offboard(offboard("ada.lovelace"))
            .await
            .unwrap();

        let outcome = report.outcome(Step::DeleteHomeFolder).unwrap();
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Ambiguous));
        assert_eq!(fx.storage.bucket_names().await.len(), 2);
        // The record is still removed; steps are independent.
        assert!(fx.records.get("ada.lovelace").await.is_none());
    }

    #[tokio::test]
    async fn hard_offboard_is_idempotent() {
        let fx = Fixture::new();
        let report = fx
            .orchestrator(true, OffboardPolicy::Hard)
            .offboard(offboard("nobody.here"))
            .await
            .unwrap();

        assert_eq!(
            report.outcome(Step::DeleteIdentity).unwrap().status,
            StepStatus::Notice
        );
        assert_eq!(
            report.outcome(Step::DeleteHomeFolder).unwrap().status,
            StepStatus::Notice
        );
        assert_eq!(
            report.outcome(Step::RemoveRecord).unwrap().status,
            StepStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn blank_username_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .orchestrator(true, OffboardPolicy::Hard)
            .offboard(offboard("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidRequest(_)));
    }
}
