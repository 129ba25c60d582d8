//! Step-list executor: records one outcome per attempted workflow step.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AdapterError, ErrorKind, WorkflowError};

/// The steps onboarding and offboarding are made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CreateIdentity,
    CreateHomeFolder,
    RegisterRecord,
    LookupRecord,
    DeleteIdentity,
    DeleteHomeFolder,
    RemoveRecord,
    DeactivateRecord,
}

impl Step {
    /// Failures of this kind still leave the step's goal met: creating an
    /// identity that exists, or removing something already gone. Storage
    /// reuses a bucket it already owns, so any error from it is a failure.
    pub fn tolerates(self, kind: ErrorKind) -> bool {
        use Step::*;
        matches!(
            (self, kind),
            (CreateIdentity, ErrorKind::AlreadyExists)
                | (DeleteIdentity | DeleteHomeFolder | RemoveRecord, ErrorKind::NotFound)
        )
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateIdentity => "create_identity",
            Self::CreateHomeFolder => "create_home_folder",
            Self::RegisterRecord => "register_record",
            Self::LookupRecord => "lookup_record",
            Self::DeleteIdentity => "delete_identity",
            Self::DeleteHomeFolder => "delete_home_folder",
            Self::RemoveRecord => "remove_record",
            Self::DeactivateRecord => "deactivate_record",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    /// Goal already met (see [`Step::tolerates`]).
    Notice,
    Skipped,
    Failed,
}

/// What happened at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step: Step,
    pub status: StepStatus,
    /// Human-readable log line.
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// Everything a finished (or aborted) workflow run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub username: String,
    pub outcomes: Vec<StepOutcome>,
}

impl WorkflowReport {
    /// The workflow log: one line per attempted step, in order.
    pub fn log(&self) -> Vec<String> {
        self.outcomes.iter().map(|o| o.detail.clone()).collect()
    }

    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step == step)
    }

    /// Steps that failed outright.
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Failed)
    }
}

/// A run in progress.
pub struct WorkflowRun {
    report: WorkflowReport,
}

impl WorkflowRun {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            report: WorkflowReport {
                run_id: Uuid::new_v4(),
                username: username.into(),
                outcomes: Vec::new(),
            },
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.report.run_id
    }

    /// Record the result of `step`.
    ///
    /// Returns `Ok(Some(value))` on success, `Ok(None)` when the step failed
    /// in a way it tolerates, and `Err` for real failures. The outcome is
    /// recorded in every case.
    pub fn record<T>(
        &mut self,
        step: Step,
        result: Result<T, AdapterError>,
        detail: impl FnOnce(&T) -> String,
    ) -> Result<Option<T>, AdapterError> {
        match result {
            Ok(value) => {
                self.push(step, StepStatus::Succeeded, detail(&value), None);
                Ok(Some(value))
            }
            Err(err) if step.tolerates(err.kind) => {
                self.push(step, StepStatus::Notice, err.message, Some(err.kind));
                Ok(None)
            }
            Err(err) => {
                self.push(step, StepStatus::Failed, err.message.clone(), Some(err.kind));
                Err(err)
            }
        }
    }

    /// [`record`](Self::record) for adapters that answer with a log line.
    pub fn record_message(
        &mut self,
        step: Step,
        result: Result<String, AdapterError>,
    ) -> Result<Option<String>, AdapterError> {
        self.record(step, result, String::clone)
    }

    pub fn skip(&mut self, step: Step, reason: impl Into<String>) {
        self.push(step, StepStatus::Skipped, reason.into(), None);
    }

    pub fn finish(self) -> WorkflowReport {
        self.report
    }

    /// End the run because a required step failed.
    pub fn abort(self, source: AdapterError) -> WorkflowError {
        WorkflowError::Aborted {
            report: Box::new(self.report),
            source,
        }
    }

    fn push(&mut self, step: Step, status: StepStatus, detail: String, error_kind: Option<ErrorKind>) {
        self.report.outcomes.push(StepOutcome {
            step,
            status,
            detail,
            error_kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_records_detail() {
        let mut run = WorkflowRun::new("ada.lovelace");
        let value = run
            .record_message(Step::CreateIdentity, Ok("AWS: Created IAM User 'ada.lovelace'".into()))
            .unwrap();
        assert_eq!(value.as_deref(), Some("AWS: Created IAM User 'ada.lovelace'"));

        let report = run.finish();
        assert_eq!(report.outcomes[0].status, StepStatus::Succeeded);
        assert_eq!(report.log(), vec!["AWS: Created IAM User 'ada.lovelace'"]);
    }

    #[test]
    fn tolerated_failure_is_a_notice() {
        let mut run = WorkflowRun::new("ada.lovelace");
        let result = run.record_message(
            Step::DeleteHomeFolder,
            Err(AdapterError::not_found("AWS: S3 bucket 'b' already removed")),
        );
        assert_eq!(result, Ok(None));

        let report = run.finish();
        let outcome = report.outcome(Step::DeleteHomeFolder).unwrap();
        assert_eq!(outcome.status, StepStatus::Notice);
        assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn untolerated_failure_is_returned_and_recorded() {
        let mut run = WorkflowRun::new("ada.lovelace");
        let err = run
            .record_message(
                Step::CreateIdentity,
                Err(AdapterError::not_found("AWS: odd")),
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(run.finish().failures().count(), 1);
    }

    #[test]
    fn tolerance_matches_step_direction() {
        assert!(Step::CreateIdentity.tolerates(ErrorKind::AlreadyExists));
        assert!(!Step::CreateIdentity.tolerates(ErrorKind::NotFound));
        assert!(!Step::CreateHomeFolder.tolerates(ErrorKind::AlreadyExists));
        assert!(!Step::CreateHomeFolder.tolerates(ErrorKind::Conflict));
        assert!(Step::DeleteIdentity.tolerates(ErrorKind::NotFound));
        assert!(!Step::DeactivateRecord.tolerates(ErrorKind::NotFound));
        assert!(!Step::DeleteHomeFolder.tolerates(ErrorKind::Ambiguous));
    }

    #[test]
    fn abort_keeps_outcomes() {
        let mut run = WorkflowRun::new("ada.lovelace");
        run.skip(Step::DeleteIdentity, "skipped");
        let source = AdapterError::unavailable("DB: down");
        let err = run.abort(source);
        let WorkflowError::Aborted { report, source } = err else {
            panic!("expected abort");
        };
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(source.kind, ErrorKind::BackendUnavailable);
    }

    #[test]
    fn report_serializes_camel_case() {
        let mut run = WorkflowRun::new("ada.lovelace");
        run.skip(Step::DeleteIdentity, "skipped");
        let json = serde_json::to_value(run.finish()).unwrap();
        assert!(json["runId"].is_string());
        assert_eq!(json["outcomes"][0]["step"], "delete_identity");
        assert_eq!(json["outcomes"][0]["status"], "skipped");
        assert!(json["outcomes"][0].get("errorKind").is_none());
    }
}
