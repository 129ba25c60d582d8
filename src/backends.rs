//! Backend selection: live adapters or mock mode, decided once at startup.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::dynamo::DynamoRecordStore;
use crate::adapters::iam::IamDirectory;
use crate::adapters::ldap::LdapDirectory;
use crate::adapters::mock::{MockDirectory, MockRecords, MockStorage};
use crate::adapters::s3::S3HomeFolders;
use crate::adapters::{IdentityDirectory, ObjectStorage, RecordStore, aws};
use crate::config::{AppConfig, IdentityBackend, MockMode};
use crate::error::AdapterError;
use crate::workflow::Orchestrator;

/// How long the startup probe may take before the backend counts as unreachable.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    Live,
    Mock,
}

/// The adapters one process runs with.
pub struct Backends {
    pub mode: BackendMode,
    pub identity: Option<Arc<dyn IdentityDirectory>>,
    pub storage: Arc<dyn ObjectStorage>,
    pub records: Arc<dyn RecordStore>,
}

impl Backends {
    /// Canned adapters; no I/O.
    pub fn mock(config: &AppConfig) -> Self {
        let identity: Option<Arc<dyn IdentityDirectory>> = match config.identity {
            IdentityBackend::Disabled => None,
            _ => Some(Arc::new(MockDirectory)),
        };
        Self {
            mode: BackendMode::Mock,
            identity,
            storage: Arc::new(MockStorage::new(&config.home_folder_prefix)),
            records: Arc::new(MockRecords),
        }
    }

    /// Build live adapters, or mock ones if `MOCK_MODE` says so or the record
    /// store does not answer the startup probe.
    pub async fn connect(config: &AppConfig) -> Self {
        if config.mock_mode == MockMode::On {
            info!("Mock mode forced by configuration");
            return Self::mock(config);
        }

        let sdk = aws::load_sdk_config(&config.region).await;
        let records = DynamoRecordStore::new(&sdk, &config.table_name);

        let mode = resolve_mode(config.mock_mode, records.probe()).await;
        if mode == BackendMode::Mock {
            return Self::mock(config);
        }

        let identity: Option<Arc<dyn IdentityDirectory>> = match &config.identity {
            IdentityBackend::Iam => Some(Arc::new(IamDirectory::new(&sdk))),
            IdentityBackend::Ldap(ldap) => Some(Arc::new(LdapDirectory::new(ldap.clone()))),
            IdentityBackend::Disabled => None,
        };

        info!(
            table = %config.table_name,
            region = %config.region,
            identity = identity.as_ref().map_or("disabled", |i| i.name()),
            "Live backends ready"
        );

        Self {
            mode,
            identity,
            storage: Arc::new(S3HomeFolders::new(
                &sdk,
                &config.region,
                &config.home_folder_prefix,
            )),
            records: Arc::new(records),
        }
    }

    pub fn into_orchestrator(self, config: &AppConfig) -> (BackendMode, Orchestrator) {
        let orchestrator = Orchestrator::new(
            self.identity,
            self.storage,
            self.records,
            config.offboard_policy,
        );
        (self.mode, orchestrator)
    }
}

/// Decide the mode from the configured switch and a reachability probe.
///
/// `Auto` trusts the probe. `Off` keeps live adapters even when the probe
/// fails, so the failure shows up per request instead.
pub async fn resolve_mode<F>(setting: MockMode, probe: F) -> BackendMode
where
    F: Future<Output = Result<(), AdapterError>>,
{
    if setting == MockMode::On {
        return BackendMode::Mock;
    }

    let outcome = match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::unavailable(format!(
            "probe timed out after {}s",
            PROBE_TIMEOUT.as_secs()
        ))),
    };

    match (setting, outcome) {
        (_, Ok(())) => BackendMode::Live,
        (MockMode::Off, Err(e)) => {
            warn!(error = %e, "Backend probe failed; staying live because MOCK_MODE=off");
            BackendMode::Live
        }
        (_, Err(e)) => {
            warn!(error = %e, "WARNING: Backends unreachable. Running in MOCK mode.");
            BackendMode::Mock
        }
    }
}
