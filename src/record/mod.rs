//! Certificate records, imported students and form validation.

pub mod certificate;
pub mod form;
pub mod student;

pub use certificate::{
    generate_certificate_id, verification_url, Certificate, NewCertificate, MAX_ID_LEN,
};
pub use form::{title_case, CertificateForm};
pub use student::{PendingStudent, StudentRow, MISSING};

use chrono::NaiveDate;
use serde::Serialize;

/// A problem with one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Accepted spellings for dates coming from forms and spreadsheets.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Parses a calendar date; a trailing time part (`2024-01-01 00:00:00`)
/// is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    let date_part = value.split([' ', 'T']).next().unwrap_or(value);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

#[cfg(test)]
pub(crate) fn sample_certificate() -> Certificate {
    use chrono::{TimeZone, Utc};

    let created = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
    Certificate {
        certificate_id: "CERT-ab12cd34".to_string(),
        full_name: "JOHN DOE".to_string(),
        roll_number: "CS 2024 001".to_string(),
        college_name: "Tech University".to_string(),
        affiliated_name: "State University".to_string(),
        course: "Data Science".to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        email: "john@example.com".to_string(),
        template: "DataValley".to_string(),
        certificate_image: None,
        qr_code_image: None,
        verification_url: verification_url("https://verify.example.org", "CERT-ab12cd34"),
        is_verified: true,
        created_at: created,
        updated_at: created,
        email_sent: false,
        email_sent_at: None,
        drive_uploaded: false,
        drive_file_id: String::new(),
        drive_uploaded_at: None,
        notes: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 31);
        assert_eq!(parse_date("2024-03-31"), expected);
        assert_eq!(parse_date("31-03-2024"), expected);
        assert_eq!(parse_date("31/03/2024"), expected);
        assert_eq!(parse_date("2024-03-31 00:00:00"), expected);
        assert_eq!(parse_date("March 31"), None);
    }
}
