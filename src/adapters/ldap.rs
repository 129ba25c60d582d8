//! Active Directory over LDAP.
//!
//! Accounts are addressed by distinguished name, built from the employee's
//! display name: `CN=<First> <Last>,<users OU>,DC=<domain>,...`. A new
//! connection is opened and bound per call.

use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use super::IdentityDirectory;
use crate::config::LdapConfig;
use crate::employee::FullName;
use crate::error::AdapterError;

/// LDAP result codes (RFC 4511) the adapter distinguishes.
const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_UNAVAILABLE: u32 = 52;
const RC_ALREADY_EXISTS: u32 = 68;

/// `NORMAL_ACCOUNT | ACCOUNTDISABLE`; accounts stay disabled until a password
/// is set out of band.
const DISABLED_NORMAL_ACCOUNT: &str = "514";

pub struct LdapDirectory {
    config: LdapConfig,
}

impl LdapDirectory {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    /// Distinguished name of the employee's account.
    pub fn user_dn(&self, name: FullName<'_>) -> String {
        user_dn(name, &self.config.users_ou, &self.config.domain)
    }

    async fn connect(&self) -> Result<Ldap, AdapterError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(|e| {
                AdapterError::unavailable(format!(
                    "LDAP: Directory {} unreachable ({e})",
                    self.config.url
                ))
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection closed with error");
            }
        });

        let bind = ldap
            .simple_bind(&self.config.bind_dn, self.config.bind_password.expose_secret())
            .await
            .map_err(|e| transport_error("bind", e))?;
        if bind.rc != RC_SUCCESS {
            return Err(AdapterError::unavailable(format!(
                "LDAP: Bind as {} rejected (rc={}: {})",
                self.config.bind_dn, bind.rc, bind.text
            )));
        }
        Ok(ldap)
    }
}

fn transport_error(operation: &str, err: LdapError) -> AdapterError {
    AdapterError::unavailable(format!("LDAP: {operation} failed ({err})"))
}

fn rc_error(rc: u32, text: &str, context: String) -> AdapterError {
    let message = format!("{context} (rc={rc}: {text})");
    match rc {
        RC_ALREADY_EXISTS => AdapterError::already_exists(message),
        RC_NO_SUCH_OBJECT => AdapterError::not_found(message),
        RC_INVALID_CREDENTIALS | RC_UNAVAILABLE => AdapterError::unavailable(message),
        _ => AdapterError::unknown(message),
    }
}

#[async_trait]
impl IdentityDirectory for LdapDirectory {
    fn name(&self) -> &'static str {
        "LDAP"
    }

    async fn create_identity(
        &self,
        username: &str,
        name: FullName<'_>,
    ) -> Result<String, AdapterError> {
        let dn = self.user_dn(name);
        let display = format!("{} {}", name.first, name.last);
        let upn = format!("{username}@{}", self.config.domain);

        let attrs: Vec<(&str, HashSet<&str>)> = vec![
            (
                "objectClass",
                HashSet::from(["top", "person", "organizationalPerson", "user"]),
            ),
            ("cn", HashSet::from([display.as_str()])),
            ("displayName", HashSet::from([display.as_str()])),
            ("givenName", HashSet::from([name.first])),
            ("sn", HashSet::from([name.last])),
            ("sAMAccountName", HashSet::from([username])),
            ("userPrincipalName", HashSet::from([upn.as_str()])),
            ("userAccountControl", HashSet::from([DISABLED_NORMAL_ACCOUNT])),
        ];

        let mut ldap = self.connect().await?;
        debug!(dn = %dn, "Adding directory entry");
        let result = ldap.add(&dn, attrs).await.map_err(|e| transport_error("add", e));
        let _ = ldap.unbind().await;
        let result = result?;

        match result.rc {
            RC_SUCCESS => {
                info!(username, dn = %dn, "Directory account created");
                Ok(format!("LDAP: Created account '{username}' at {dn}"))
            }
            RC_ALREADY_EXISTS => Err(AdapterError::already_exists(format!(
                "LDAP: Account {dn} already exists."
            ))),
            rc => {
                let err = rc_error(rc, &result.text, format!("LDAP: Failed to create {dn}"));
                warn!(username, error = %err, "Directory account creation failed");
                Err(err)
            }
        }
    }

    async fn delete_identity(
        &self,
        username: &str,
        name: Option<FullName<'_>>,
    ) -> Result<String, AdapterError> {
        let Some(name) = name else {
            return Err(AdapterError::unknown(format!(
                "LDAP: Cannot address account of '{username}' without first and last name"
            )));
        };
        let dn = self.user_dn(name);

        let mut ldap = self.connect().await?;
        let result = ldap.delete(&dn).await.map_err(|e| transport_error("delete", e));
        let _ = ldap.unbind().await;
        let result = result?;

        match result.rc {
            RC_SUCCESS => {
                info!(username, dn = %dn, "Directory account deleted");
                Ok(format!("LDAP: Deleted account {dn}"))
            }
            RC_NO_SUCH_OBJECT => Err(AdapterError::not_found(format!(
                "LDAP: Account {dn} not found; nothing to delete"
            ))),
            rc => {
                let err = rc_error(rc, &result.text, format!("LDAP: Failed to delete {dn}"));
                warn!(username, error = %err, "Directory account deletion failed");
                Err(err)
            }
        }
    }
}

// ── Distinguished names ────────────────────────────────────────────────

/// `corp.example.com` → `DC=corp,DC=example,DC=com`.
pub fn domain_components(domain: &str) -> String {
    domain
        .split('.')
        .filter(|label| !label.is_empty())
        .map(|label| format!("DC={}", escape_dn_value(label)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `CN=<First> <Last>,<ou>,<domain components>`.
pub fn user_dn(name: FullName<'_>, users_ou: &str, domain: &str) -> String {
    let cn = escape_dn_value(&format!("{} {}", name.first.trim(), name.last.trim()));
    let base = domain_components(domain);
    if users_ou.is_empty() {
        format!("CN={cn},{base}")
    } else {
        format!("CN={cn},{users_ou},{base}")
    }
}

/// Escape an attribute value for use inside a DN (RFC 4514 §2.4).
pub fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn name<'a>(first: &'a str, last: &'a str) -> FullName<'a> {
        FullName { first, last }
    }

    #[test]
    fn domain_becomes_components() {
        assert_eq!(domain_components("corp.example.com"), "DC=corp,DC=example,DC=com");
        assert_eq!(domain_components("local"), "DC=local");
    }

    #[test]
    fn user_dn_places_account_in_users_container() {
        let dn = user_dn(name("Ada", "Lovelace"), "CN=Users", "corp.local");
        assert_eq!(dn, "CN=Ada Lovelace,CN=Users,DC=corp,DC=local");
    }

    #[test]
    fn user_dn_without_container() {
        let dn = user_dn(name("Ada", "Lovelace"), "", "corp.local");
        assert_eq!(dn, "CN=Ada Lovelace,DC=corp,DC=local");
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_dn_value("Smith, Jr."), "Smith\\, Jr.");
        assert_eq!(escape_dn_value("a+b=c"), "a\\+b\\=c");
        assert_eq!(escape_dn_value("#hash"), "\\#hash");
        assert_eq!(escape_dn_value(" padded "), "\\ padded\\ ");
        assert_eq!(escape_dn_value("mid#dle"), "mid#dle");
    }

    #[test]
    fn result_codes_map_to_kinds() {
        use crate::error::ErrorKind;
        assert_eq!(rc_error(68, "", "x".into()).kind, ErrorKind::AlreadyExists);
        assert_eq!(rc_error(32, "", "x".into()).kind, ErrorKind::NotFound);
        assert_eq!(rc_error(49, "", "x".into()).kind, ErrorKind::BackendUnavailable);
        assert_eq!(rc_error(50, "", "x".into()).kind, ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn delete_without_name_fails_before_connecting() {
        let directory = LdapDirectory::new(LdapConfig {
            url: "ldap://127.0.0.1:1".into(),
            domain: "corp.local".into(),
            bind_dn: "CN=svc".into(),
            bind_password: secrecy::SecretString::from("pw".to_string()),
            users_ou: "CN=Users".into(),
            connect_timeout: Duration::from_millis(50),
        });
        let err = directory.delete_identity("ada.lovelace", None).await.unwrap_err();
        assert!(err.message.contains("without first and last name"));
    }

    #[tokio::test]
    async fn unreachable_server_is_backend_unavailable() {
        let directory = LdapDirectory::new(LdapConfig {
            url: "ldap://127.0.0.1:1".into(),
            domain: "corp.local".into(),
            bind_dn: "CN=svc".into(),
            bind_password: secrecy::SecretString::from("pw".to_string()),
            users_ou: "CN=Users".into(),
            connect_timeout: Duration::from_millis(200),
        });
        let err = directory
            .create_identity("ada.lovelace", name("Ada", "Lovelace"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::BackendUnavailable);
    }
}
