//! Shared AWS SDK plumbing: client configuration and error classification.

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::error::{AdapterError, ErrorKind};

/// Load shared SDK configuration for `region` from the default credential chain.
pub async fn load_sdk_config(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Service error codes that indicate an expired, missing, or rejected credential.
const CREDENTIAL_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidAccessKeyId",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

/// Map the error codes of one operation onto an [`ErrorKind`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeMap<'a> {
    pub already_exists: &'a [&'a str],
    pub not_found: &'a [&'a str],
    pub conflict: &'a [&'a str],
}

impl CodeMap<'_> {
    fn kind_for(&self, code: &str) -> ErrorKind {
        if self.already_exists.contains(&code) {
            ErrorKind::AlreadyExists
        } else if self.not_found.contains(&code) {
            ErrorKind::NotFound
        } else if self.conflict.contains(&code) {
            ErrorKind::Conflict
        } else if CREDENTIAL_CODES.contains(&code) {
            ErrorKind::BackendUnavailable
        } else {
            ErrorKind::Unknown
        }
    }
}

/// Classify an SDK error. Transport failures (no route, timeout, missing
/// credentials) are `BackendUnavailable`; service errors go through `codes`.
pub fn classify<E, R>(err: &SdkError<E, R>, codes: CodeMap<'_>) -> ErrorKind
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => ErrorKind::BackendUnavailable,
        SdkError::ServiceError(_) => err.code().map_or(ErrorKind::Unknown, |c| codes.kind_for(c)),
        _ => ErrorKind::Unknown,
    }
}

/// Build an [`AdapterError`] whose message is `context` followed by the most
/// specific detail the SDK offers.
pub fn adapter_error<E, R>(err: SdkError<E, R>, context: &str, codes: CodeMap<'_>) -> AdapterError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let kind = classify(&err, codes);
    let detail = match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        _ => DisplayErrorContext(&err).to_string(),
    };
    AdapterError::new(kind, format!("{context} ({detail})"))
}
