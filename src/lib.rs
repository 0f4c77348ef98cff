//! # certissue
//!
//! A library and service for issuing internship certificates: validated
//! records in SQLite, certificate images rendered from template
//! backgrounds, delivery by mail and cloud upload, and public
//! verification over HTTP.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod mail;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod store;
pub mod template;
pub mod upload;
pub mod verify;
pub mod web;

// Re-exports
pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{CertissueError, Result};
pub use import::{ImportReport, SheetFormat};
pub use mail::{MailMessage, MailSettings, Mailer, SpoolMailer};
pub use pipeline::{BatchOutcome, BulkReport, Issuer, IssuerSettings};
pub use record::{Certificate, CertificateForm, NewCertificate, PendingStudent};
pub use render::{CertificateRenderer, RenderedCertificate};
pub use store::{CertificateQuery, Store};
pub use template::{TemplateVariant, DEFAULT_BULK_TEMPLATE, DEFAULT_FORM_TEMPLATE};
pub use upload::{FolderStore, ObjectStore};
pub use verify::{VerificationMethod, VerificationOutcome};
