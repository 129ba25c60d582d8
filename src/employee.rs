//! Employee HR record and the request bodies that create or retire one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Employment status stored on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(Self::Active),
            "Inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One employee, keyed by `username` in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub role: String,
    pub status: EmployeeStatus,
    /// Bucket backing the employee's home folder. Absent on records written
    /// before bucket names were stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarded_at: Option<DateTime<Utc>>,
}

impl EmployeeRecord {
    /// A fresh `Active` record for an onboarding request.
    pub fn from_request(request: &OnboardRequest, home_folder: Option<String>) -> Self {
        Self {
            username: request.username(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            department: request.department.clone(),
            role: request.role.clone(),
            status: EmployeeStatus::Active,
            home_folder,
            onboarded_at: Some(Utc::now()),
        }
    }

    pub fn full_name(&self) -> Option<FullName<'_>> {
        if self.first_name.is_empty() || self.last_name.is_empty() {
            return None;
        }
        Some(FullName {
            first: &self.first_name,
            last: &self.last_name,
        })
    }
}

/// Borrowed first/last name pair, as needed to address a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullName<'a> {
    pub first: &'a str,
    pub last: &'a str,
}

/// Derive the account name: `firstname.lastname`, lowercased.
pub fn derive_username(first_name: &str, last_name: &str) -> String {
    format!(
        "{}.{}",
        first_name.trim().to_lowercase(),
        last_name.trim().to_lowercase()
    )
}

/// Body of `POST /onboard`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardRequest {
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub role: String,
}

impl OnboardRequest {
    pub fn username(&self) -> String {
        derive_username(&self.first_name, &self.last_name)
    }

    pub fn full_name(&self) -> FullName<'_> {
        FullName {
            first: &self.first_name,
            last: &self.last_name,
        }
    }
}

/// Body of `POST /offboard`.
#[derive(Debug, Clone, Deserialize)]
pub struct OffboardRequest {
    pub username: String,
}
