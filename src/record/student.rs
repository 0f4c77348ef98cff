use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::CertificateForm;

/// Placeholder stored for optional spreadsheet columns left blank.
pub const MISSING: &str = "NONE";

/// A student row imported from a spreadsheet, waiting for its certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingStudent {
    pub id: i64,
    pub full_name: String,
    pub course: String,
    pub roll_number: String,
    pub college_name: String,
    pub affiliated_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub email: String,
    pub contact: String,
    pub gender: String,
    pub created_at: DateTime<Utc>,
}

/// Imported row before it has been given a database id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRow {
    pub full_name: String,
    pub course: String,
    pub roll_number: String,
    pub college_name: String,
    pub affiliated_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub email: String,
    pub contact: String,
    pub gender: String,
}

impl PendingStudent {
    /// Form used to issue this student's certificate with `template`.
    pub fn to_form(&self, template: &str) -> CertificateForm {
        CertificateForm {
            full_name: self.full_name.clone(),
            course: self.course.clone(),
            college_name: self.college_name.clone(),
            affiliated_name: self.affiliated_name.clone(),
            roll_number: self.roll_number.clone(),
            email: self.email.clone(),
            start_date: self.start_date.format("%Y-%m-%d").to_string(),
            end_date: self.end_date.format("%Y-%m-%d").to_string(),
            template: Some(template.to_string()),
        }
    }
}

impl std::fmt::Display for PendingStudent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_name)
    }
}
