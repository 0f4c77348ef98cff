use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{parse_date, FieldError, NewCertificate};
use crate::error::{CertissueError, Result};
use crate::template::{TemplateVariant, DEFAULT_FORM_TEMPLATE};

/// Raw certificate request as submitted by an administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub college_name: String,
    #[serde(default)]
    pub affiliated_name: String,
    #[serde(default)]
    pub roll_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

impl CertificateForm {
    /// Cleans every field and reports all problems at once.
    ///
    /// The stored name is upper-cased, roll numbers are upper-cased and
    /// emails lower-cased.
    pub fn validate(&self) -> Result<NewCertificate> {
        let mut errors = Vec::new();

        let full_name = clean_full_name(&self.full_name).map_err(|e| errors.push(e)).ok();
        let course = clean_text("course", "Course name", &self.course)
            .map_err(|e| errors.push(e))
            .ok();
        let college_name = clean_text("college_name", "College name", &self.college_name)
            .map_err(|e| errors.push(e))
            .ok();
        let affiliated_name =
            clean_text("affiliated_name", "Affiliated name", &self.affiliated_name)
                .map_err(|e| errors.push(e))
                .ok();
        let roll_number = clean_roll_number(&self.roll_number).map_err(|e| errors.push(e)).ok();
        let email = clean_email(&self.email).map_err(|e| errors.push(e)).ok();
        let start_date = clean_date("start_date", &self.start_date)
            .map_err(|e| errors.push(e))
            .ok();
        let end_date = clean_date("end_date", &self.end_date)
            .map_err(|e| errors.push(e))
            .ok();

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                errors.push(FieldError::new(
                    "end_date",
                    "End date cannot be before the start date",
                ));
            }
        }

        let template = match self.template.as_deref().map(str::trim) {
            None | Some("") => Some(DEFAULT_FORM_TEMPLATE.name().to_string()),
            Some(name) => match name.parse::<TemplateVariant>() {
                Ok(variant) => Some(variant.name().to_string()),
                Err(_) => {
                    errors.push(FieldError::new(
                        "template",
                        format!("Unknown certificate template '{}'", name),
                    ));
                    None
                }
            },
        };

        match (
            full_name,
            course,
            college_name,
            affiliated_name,
            roll_number,
            email,
            start_date,
            end_date,
            template,
        ) {
            (
                Some(full_name),
                Some(course),
                Some(college_name),
                Some(affiliated_name),
                Some(roll_number),
                Some(email),
                Some(start_date),
                Some(end_date),
                Some(template),
            ) if errors.is_empty() => Ok(NewCertificate {
                full_name: full_name.to_uppercase(),
                roll_number,
                college_name,
                affiliated_name,
                course,
                start_date,
                end_date,
                email,
                template,
            }),
            _ => Err(CertissueError::Validation(errors)),
        }
    }
}

fn clean_full_name(raw: &str) -> std::result::Result<String, FieldError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(FieldError::new("full_name", "Full name is required"));
    }
    if name.chars().count() < 2 {
        return Err(FieldError::new(
            "full_name",
            "Full name must be at least 2 characters long",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_alphabetic() || c.is_whitespace() || "'-.".contains(c))
    {
        return Err(FieldError::new(
            "full_name",
            "Full name can only contain letters, spaces, hyphens, apostrophes, and periods",
        ));
    }
    Ok(title_case(name))
}

fn clean_text(field: &'static str, label: &str, raw: &str) -> std::result::Result<String, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, format!("{} is required", label)));
    }
    if value.chars().count() < 2 {
        return Err(FieldError::new(
            field,
            format!("{} must be at least 2 characters long", label),
        ));
    }
    Ok(value.to_string())
}

fn clean_roll_number(raw: &str) -> std::result::Result<String, FieldError> {
    let roll = raw.trim().to_uppercase();
    if roll.is_empty() {
        return Err(FieldError::new("roll_number", "Roll number is required"));
    }
    if roll.chars().count() < 3 {
        return Err(FieldError::new(
            "roll_number",
            "Roll number must be at least 3 characters long",
        ));
    }
    Ok(roll)
}

fn clean_email(raw: &str) -> std::result::Result<String, FieldError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(FieldError::new("email", "Email address is required"));
    }
    if !email_pattern().is_match(&email) {
        return Err(FieldError::new("email", "Enter a valid email address"));
    }
    Ok(email)
}

fn clean_date(field: &'static str, raw: &str) -> std::result::Result<chrono::NaiveDate, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, "Date is required"));
    }
    parse_date(value).ok_or_else(|| FieldError::new(field, format!("Invalid date '{}'", value)))
}

/// Capitalises the first letter of every word, lower-cases the rest.
/// A word starts after any non-alphabetic character, so `o'neil-smith`
/// becomes `O'Neil-Smith`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn form() -> CertificateForm {
        CertificateForm {
            full_name: "  john o'neil ".to_string(),
            course: " Data Science ".to_string(),
            college_name: "Tech University".to_string(),
            affiliated_name: "State University".to_string(),
            roll_number: " cs2024001 ".to_string(),
            email: " John.Doe@Example.COM ".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "31-03-2024".to_string(),
            template: None,
        }
    }

    #[test]
    fn test_valid_form_is_normalised() {
        let cert = form().validate().unwrap();
        assert_eq!(cert.full_name, "JOHN O'NEIL");
        assert_eq!(cert.course, "Data Science");
        assert_eq!(cert.roll_number, "CS2024001");
        assert_eq!(cert.email, "john.doe@example.com");
        assert_eq!(cert.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(cert.end_date, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(cert.template, "DataValley");
    }

    #[test]
    fn test_collects_all_errors() {
        let bad = CertificateForm {
            full_name: "J0hn".to_string(),
            roll_number: "ab".to_string(),
            email: "nope".to_string(),
            ..form()
        };
        match bad.validate() {
            Err(CertissueError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["full_name", "roll_number", "email"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_end_before_start_rejected() {
        let bad = CertificateForm {
            start_date: "2024-04-01".to_string(),
            end_date: "2024-03-01".to_string(),
            ..form()
        };
        assert!(matches!(bad.validate(), Err(CertissueError::Validation(_))));
    }

    #[test]
    fn test_template_is_canonicalised() {
        let f = CertificateForm {
            template: Some("csc india".to_string()),
            ..form()
        };
        assert_eq!(f.validate().unwrap().template, "CSCIndia");

        let unknown = CertificateForm {
            template: Some("Nope".to_string()),
            ..form()
        };
        assert!(unknown.validate().is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("mary-jane watson"), "Mary-Jane Watson");
        assert_eq!(title_case("DATA SCIENCE"), "Data Science");
    }
}
