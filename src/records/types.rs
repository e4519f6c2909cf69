//! Employee record types.
//!
//! [`Employee`] mirrors the `employee_info` table. [`NewEmployee`] and
//! [`EmployeeUpdate`] are the create and partial-update payloads, validated before
//! they reach SQL.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Date format accepted for `date_of_birth`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An employee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    /// ISO date (`YYYY-MM-DD`).
    pub date_of_birth: String,
    pub address: String,
    pub contact_number: String,
    pub pan_number: String,
    pub aadhar_number: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl Employee {
    /// Text fed to the embedder for this record.
    ///
    /// Name, address, PAN, Aadhaar and contact number, in that order, joined by
    /// single spaces. Blank fields are skipped. The id and date of birth never
    /// appear, so two records with equal field values project identically.
    pub fn projection(&self) -> String {
        [
            &self.name,
            &self.address,
            &self.pan_number,
            &self.aadhar_number,
            &self.contact_number,
        ]
        .into_iter()
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub date_of_birth: String,
    pub address: String,
    pub contact_number: String,
    pub pan_number: String,
    pub aadhar_number: String,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub contact_number: Option<String>,
    pub pan_number: Option<String>,
    pub aadhar_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid employee: {0}")]
pub struct InvalidEmployee(pub String);

impl NewEmployee {
    pub fn validate(&self) -> Result<(), InvalidEmployee> {
        require_non_empty("name", &self.name)?;
        require_non_empty("contact_number", &self.contact_number)?;
        require_non_empty("pan_number", &self.pan_number)?;
        require_non_empty("aadhar_number", &self.aadhar_number)?;
        parse_date(&self.date_of_birth)?;
        Ok(())
    }
}

impl EmployeeUpdate {
    pub fn validate(&self) -> Result<(), InvalidEmployee> {
        let required = [
            ("name", &self.name),
            ("contact_number", &self.contact_number),
            ("pan_number", &self.pan_number),
            ("aadhar_number", &self.aadhar_number),
        ];
        for (field, value) in required {
            if let Some(value) = value {
                require_non_empty(field, value)?;
            }
        }
        if let Some(dob) = &self.date_of_birth {
            parse_date(dob)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.date_of_birth.is_none()
            && self.address.is_none()
            && self.contact_number.is_none()
            && self.pan_number.is_none()
            && self.aadhar_number.is_none()
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), InvalidEmployee> {
    if value.trim().is_empty() {
        return Err(InvalidEmployee(format!("{field} must not be empty")));
    }
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate, InvalidEmployee> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        InvalidEmployee(format!("date_of_birth must be YYYY-MM-DD, got {value:?}"))
    })
}

/// Audit log action, matching the `audit_log.action` CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err(format!("unknown audit action: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
}
