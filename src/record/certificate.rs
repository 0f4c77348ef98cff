use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used for the random part of a certificate ID.
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_SUFFIX_LEN: usize = 8;

/// Longest certificate ID the store accepts.
pub const MAX_ID_LEN: usize = 18;

/// An issued certificate as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub certificate_id: String,
    pub full_name: String,
    pub roll_number: String,
    pub college_name: String,
    pub affiliated_name: String,
    pub course: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub email: String,

    /// Template variant the image was rendered with
    pub template: String,

    /// Paths relative to the media root
    pub certificate_image: Option<String>,
    pub qr_code_image: Option<String>,

    pub verification_url: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,

    pub drive_uploaded: bool,
    pub drive_file_id: String,
    pub drive_uploaded_at: Option<DateTime<Utc>>,

    pub notes: String,
}

/// Validated identity fields for a certificate that is about to be issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCertificate {
    pub full_name: String,
    pub roll_number: String,
    pub college_name: String,
    pub affiliated_name: String,
    pub course: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub email: String,
    pub template: String,
}

impl Certificate {
    /// File name offered to whoever downloads the certificate image.
    pub fn image_filename(&self) -> String {
        format!("{}.png", sanitize_filename(&self.roll_number))
    }

    /// Stem shared by the files stored under the media root. The ID keeps
    /// roll numbers that sanitise alike apart.
    fn file_stem(&self) -> String {
        format!(
            "{}_{}",
            sanitize_filename(&self.roll_number),
            sanitize_filename(&self.certificate_id)
        )
    }

    /// File name of the rendered image inside the media root.
    pub fn stored_image_filename(&self) -> String {
        format!("{}.png", self.file_stem())
    }

    pub fn qr_filename(&self) -> String {
        format!("qr_{}.png", self.file_stem())
    }

    /// Name used when the image is pushed to cloud storage.
    pub fn drive_filename(&self) -> String {
        format!("{}.png", sanitize_filename(&self.full_name))
    }

    /// Issue date as written in mails and API responses, e.g. `05 March 2024`.
    pub fn issue_date(&self) -> String {
        self.created_at.format("%d %B %Y").to_string()
    }

    /// Issue date as printed on the certificate image.
    pub fn issue_date_short(&self) -> String {
        self.created_at.format("%d-%m-%Y").to_string()
    }
}

impl std::fmt::Display for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Certificate for {} - {}", self.full_name, self.course)
    }
}

/// Builds a fresh random certificate ID: `prefix` followed by eight
/// lowercase alphanumerics.
pub fn generate_certificate_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// Public verification link for a certificate.
pub fn verification_url(base: &str, certificate_id: &str) -> String {
    format!("{}/verify/{}/", base.trim_end_matches('/'), certificate_id)
}

/// Keeps `[A-Za-z0-9_-]` and turns everything else into `_`.
pub fn sanitize_filename(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_certificate as sample;

    #[test]
    fn test_generated_id_shape() {
        let id = generate_certificate_id("CSCIndia-");
        assert!(id.starts_with("CSCIndia-"));
        assert_eq!(id.len(), MAX_ID_LEN - 1);
        assert!(id["CSCIndia-".len()..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_verification_url_trims_slash() {
        assert_eq!(
            verification_url("https://verify.example.org/", "X1"),
            "https://verify.example.org/verify/X1/"
        );
    }

    #[test]
    fn test_filenames() {
        let cert = sample();
        assert_eq!(cert.image_filename(), "CS_2024_001.png");
        assert_eq!(cert.stored_image_filename(), "CS_2024_001_CERT-ab12cd34.png");
        assert_eq!(cert.qr_filename(), "qr_CS_2024_001_CERT-ab12cd34.png");
        assert_eq!(cert.drive_filename(), "JOHN_DOE.png");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../ESCAPED"), "______ESCAPED");
        assert_eq!(sanitize_filename("AB/1 x"), "AB_1_x");
        assert_eq!(sanitize_filename("Zoë-7"), "Zo_-7");
    }

    #[test]
    fn test_stored_names_stay_inside_their_directory() {
        let mut cert = sample();
        cert.roll_number = "../../etc/passwd".to_string();
        let name = cert.stored_image_filename();
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn test_issue_dates() {
        let cert = sample();
        assert_eq!(cert.issue_date(), "05 March 2024");
        assert_eq!(cert.issue_date_short(), "05-03-2024");
        assert_eq!(cert.to_string(), "Certificate for JOHN DOE - Data Science");
    }
}
