use thiserror::Error;

use crate::record::FieldError;

#[derive(Error, Debug)]
pub enum CertissueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("QR code error: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Invalid input: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("A certificate has already been generated for roll number: {0}")]
    DuplicateRollNumber(String),

    #[error("Certificate not found: {0}")]
    NotFound(String),

    #[error("Unknown certificate template: {0}")]
    UnknownTemplate(String),

    #[error("Template file not found: {0}")]
    TemplateNotFound(String),

    #[error("No usable font found (set CERTISSUE_FONT_PATH)")]
    FontUnavailable,

    #[error("Certificate image must be generated first: {0}")]
    MissingImage(String),

    #[error("No pending student records to generate")]
    NoPendingStudents,

    #[error("No certificate data found for the selected filters")]
    NothingToExport,

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store is unavailable")]
    StoreUnavailable,
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<lettre::transport::smtp::Error> for CertissueError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        CertissueError::Mail(e.to_string())
    }
}

impl From<reqwest::Error> for CertissueError {
    fn from(e: reqwest::Error) -> Self {
        CertissueError::Upload(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CertissueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = CertissueError::Validation(vec![
            FieldError::new("full_name", "Full name is required"),
            FieldError::new("email", "Enter a valid email address"),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid input: full_name: Full name is required; email: Enter a valid email address"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CertissueError>();
    }
}
