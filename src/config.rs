//! Configuration types, loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_TABLE: &str = "Innovatech_Employees";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_HOME_FOLDER_PREFIX: &str = "innovatech-home";
pub const DEFAULT_USERS_OU: &str = "CN=Users";

/// Which identity directory onboarding/offboarding talks to.
#[derive(Debug, Clone)]
pub enum IdentityBackend {
    /// AWS IAM users.
    Iam,
    /// Active Directory over LDAP.
    Ldap(LdapConfig),
    /// Identity steps are left out of the workflow.
    Disabled,
}

/// Active Directory connection settings.
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// Server URL, e.g. `ldap://dc1.corp.local:389`.
    pub url: String,
    /// DNS domain, e.g. `corp.local`.
    pub domain: String,
    pub bind_dn: String,
    pub bind_password: SecretString,
    /// Container new users are created in, relative to the domain root.
    pub users_ou: String,
    pub connect_timeout: Duration,
}

/// What offboarding does with the employee's footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffboardPolicy {
    /// Delete identity, home folder and record.
    Hard,
    /// Delete identity, keep the record with status `Inactive`.
    Soft,
}

/// Whether adapters perform real I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// Probe the record store at startup and fall back to mocks if unreachable.
    Auto,
    On,
    Off,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub table_name: String,
    pub region: String,
    pub home_folder_prefix: String,
    pub identity: IdentityBackend,
    pub offboard_policy: OffboardPolicy,
    pub mock_mode: MockMode,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("HR_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "HR_BIND_ADDR".into(),
                message: e.to_string(),
            })?;

        let table_name = get("DYNAMO_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        let region = get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let home_folder_prefix = get("HOME_FOLDER_PREFIX")
            .unwrap_or_else(|| DEFAULT_HOME_FOLDER_PREFIX.to_string())
            .to_lowercase();

        let identity = match get("IDENTITY_BACKEND")
            .unwrap_or_else(|| "iam".to_string())
            .to_lowercase()
            .as_str()
        {
            "iam" => IdentityBackend::Iam,
            "ldap" | "ad" => IdentityBackend::Ldap(LdapConfig::from_lookup(&get)?),
            "none" | "disabled" => IdentityBackend::Disabled,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "IDENTITY_BACKEND".into(),
                    message: format!("expected iam, ldap or none, got '{other}'"),
                });
            }
        };

        let offboard_policy = match get("OFFBOARD_POLICY")
            .unwrap_or_else(|| "soft".to_string())
            .to_lowercase()
            .as_str()
        {
            "soft" => OffboardPolicy::Soft,
            "hard" => OffboardPolicy::Hard,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "OFFBOARD_POLICY".into(),
                    message: format!("expected soft or hard, got '{other}'"),
                });
            }
        };

        let mock_mode = match get("MOCK_MODE")
            .unwrap_or_else(|| "auto".to_string())
            .to_lowercase()
            .as_str()
        {
            "auto" => MockMode::Auto,
            "on" | "true" | "1" => MockMode::On,
            "off" | "false" | "0" => MockMode::Off,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "MOCK_MODE".into(),
                    message: format!("expected auto, on or off, got '{other}'"),
                });
            }
        };

        let cors_allowed_origins: Vec<String> = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bind_addr,
            table_name,
            region,
            home_folder_prefix,
            identity,
            offboard_policy,
            mock_mode,
            cors_allowed_origins,
        })
    }
}

impl LdapConfig {
    fn from_lookup<F>(get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let connect_timeout_secs: u64 = match get("LDAP_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LDAP_CONNECT_TIMEOUT_SECS".into(),
                message: format!("'{raw}' is not a number of seconds"),
            })?,
            None => 5,
        };

        Ok(Self {
            url: required("LDAP_URL")?,
            domain: required("LDAP_DOMAIN")?,
            bind_dn: required("LDAP_BIND_DN")?,
            bind_password: SecretString::from(required("LDAP_BIND_PASSWORD")?),
            users_ou: get("LDAP_USERS_OU").unwrap_or_else(|| DEFAULT_USERS_OU.to_string()),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.table_name, "Innovatech_Employees");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.home_folder_prefix, "innovatech-home");
        assert!(matches!(config.identity, IdentityBackend::Iam));
        assert_eq!(config.offboard_policy, OffboardPolicy::Soft);
        assert_eq!(config.mock_mode, MockMode::Auto);
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("DYNAMO_TABLE", "  "), ("AWS_REGION", "")]).unwrap();
        assert_eq!(config.table_name, "Innovatech_Employees");
        assert_eq!(config.region, "us-east-1");
    }

    #[test]
    fn ldap_backend_reads_directory_settings() {
        let config = load(&[
            ("IDENTITY_BACKEND", "ldap"),
            ("LDAP_URL", "ldap://dc1.corp.local:389"),
            ("LDAP_DOMAIN", "corp.local"),
            ("LDAP_BIND_DN", "CN=svc-hr,CN=Users,DC=corp,DC=local"),
            ("LDAP_BIND_PASSWORD", "hunter2"),
        ])
        .unwrap();

        let IdentityBackend::Ldap(ldap) = config.identity else {
            panic!("expected LDAP backend");
        };
        assert_eq!(ldap.domain, "corp.local");
        assert_eq!(ldap.users_ou, "CN=Users");
        assert_eq!(ldap.bind_password.expose_secret(), "hunter2");
        assert_eq!(ldap.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn ldap_backend_requires_credentials() {
        let err = load(&[
            ("IDENTITY_BACKEND", "ldap"),
            ("LDAP_URL", "ldap://dc1.corp.local"),
            ("LDAP_DOMAIN", "corp.local"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "LDAP_BIND_DN"));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = load(&[("OFFBOARD_POLICY", "archive")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "OFFBOARD_POLICY"));
    }

    #[test]
    fn parses_switches_and_origins() {
        let config = load(&[
            ("IDENTITY_BACKEND", "none"),
            ("OFFBOARD_POLICY", "HARD"),
            ("MOCK_MODE", "on"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:5173, https://hr.example.com,"),
        ])
        .unwrap();
        assert!(matches!(config.identity, IdentityBackend::Disabled));
        assert_eq!(config.offboard_policy, OffboardPolicy::Hard);
        assert_eq!(config.mock_mode, MockMode::On);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://localhost:5173", "https://hr.example.com"]
        );
    }

    #[test]
    fn rejects_bad_bind_addr() {
        let err = load(&[("HR_BIND_ADDR", "not-an-addr")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "HR_BIND_ADDR"));
    }
}
