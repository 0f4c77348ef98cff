//! Public certificate verification.

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Result;
use crate::record::Certificate;
use crate::store::Store;

pub const INVALID_METHOD: &str = "Invalid verification method.";
pub const NO_MATCH: &str = "No certificate found for the provided information.";
pub const LOOKUP_FAILED: &str = "An error occurred during verification.";

/// Which identifier a visitor submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    #[default]
    CertificateId,
    Email,
    RollNumber,
}

impl VerificationMethod {
    /// Database column the identifier is matched against.
    pub fn column(&self) -> &'static str {
        match self {
            VerificationMethod::CertificateId => "certificate_id",
            VerificationMethod::Email => "email",
            VerificationMethod::RollNumber => "roll_number",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.column()
    }
}

impl FromStr for VerificationMethod {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim() {
            "" | "certificate_id" => Ok(VerificationMethod::CertificateId),
            "email" => Ok(VerificationMethod::Email),
            "roll_number" => Ok(VerificationMethod::RollNumber),
            _ => Err(()),
        }
    }
}

/// Result of a public lookup.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub method: String,
    pub value: String,
    /// False when no value was submitted
    pub verification_attempted: bool,
    pub is_verified: bool,
    pub certificate: Option<PublicCertificate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

/// The part of a certificate shown to the public.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicCertificate {
    pub certificate_id: String,
    pub full_name: String,
    pub course: String,
    pub college_name: String,
    pub affiliated_name: String,
    pub roll_number: String,
    pub start_date: String,
    pub end_date: String,
    pub issue_date: String,
    pub verification_url: String,
    pub is_verified: bool,
}

impl From<&Certificate> for PublicCertificate {
    fn from(cert: &Certificate) -> Self {
        Self {
            certificate_id: cert.certificate_id.clone(),
            full_name: cert.full_name.clone(),
            course: cert.course.clone(),
            college_name: cert.college_name.clone(),
            affiliated_name: cert.affiliated_name.clone(),
            roll_number: cert.roll_number.clone(),
            start_date: cert.start_date.format("%d-%m-%Y").to_string(),
            end_date: cert.end_date.format("%d-%m-%Y").to_string(),
            issue_date: cert.issue_date(),
            verification_url: cert.verification_url.clone(),
            is_verified: cert.is_verified,
        }
    }
}

/// Looks up a verified certificate by the submitted identifier.
///
/// Matching is exact but ignores case. An empty `value` is not an attempt
/// and yields an empty outcome.
pub fn verify(store: &Store, method: &str, value: &str) -> VerificationOutcome {
    let value = value.trim();
    let mut outcome = VerificationOutcome {
        method: if method.trim().is_empty() {
            VerificationMethod::default().as_str().to_string()
        } else {
            method.trim().to_string()
        },
        value: value.to_string(),
        verification_attempted: false,
        is_verified: false,
        certificate: None,
        error_message: String::new(),
    };

    if value.is_empty() {
        return outcome;
    }
    outcome.verification_attempted = true;

    let Ok(parsed) = method.parse::<VerificationMethod>() else {
        outcome.error_message = INVALID_METHOD.to_string();
        return outcome;
    };

    match store.find_verified(parsed, value) {
        Ok(Some(cert)) => {
            info!("Verified {} via {}", cert.certificate_id, parsed.as_str());
            outcome.is_verified = true;
            outcome.certificate = Some(PublicCertificate::from(&cert));
        }
        Ok(None) => outcome.error_message = NO_MATCH.to_string(),
        Err(e) => {
            error!("Verification lookup failed: {}", e);
            outcome.error_message = LOOKUP_FAILED.to_string();
        }
    }

    outcome
}

/// Machine-readable verification by exact certificate ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiVerification {
    pub verified: bool,
    pub certificate_id: String,
    pub full_name: String,
    pub course: String,
    pub college_name: String,
    pub roll_number: String,
    pub issue_date: String,
    pub verification_url: String,
}

impl From<&Certificate> for ApiVerification {
    fn from(cert: &Certificate) -> Self {
        Self {
            verified: cert.is_verified,
            certificate_id: cert.certificate_id.clone(),
            full_name: cert.full_name.clone(),
            course: cert.course.clone(),
            college_name: cert.college_name.clone(),
            roll_number: cert.roll_number.clone(),
            issue_date: cert.issue_date(),
            verification_url: cert.verification_url.clone(),
        }
    }
}

/// `None` when no certificate carries this exact ID. Revoked certificates
/// are returned with `verified: false`.
pub fn api_verify(store: &Store, certificate_id: &str) -> Result<Option<ApiVerification>> {
    Ok(store
        .get_certificate(certificate_id)?
        .as_ref()
        .map(ApiVerification::from))
}
