//! Shared fixtures: an issuer with a font-free renderer, spooled mail and
//! folder uploads inside a temporary directory.

#![allow(dead_code)]

use certissue::mail::MailSettings;
use certissue::{
    CertificateForm, CertificateRenderer, CertissueError, FolderStore, Issuer, IssuerSettings,
    ObjectStore, RenderedCertificate, Result, SpoolMailer, Store, TemplateVariant,
};
use certissue::record::Certificate;
use std::path::Path;

pub const VERIFY_BASE: &str = "https://verify.example.org";

/// Produces recognisable bytes instead of drawing.
pub struct StubRenderer {
    pub fail: bool,
}

impl CertificateRenderer for StubRenderer {
    fn render(&self, cert: &Certificate, variant: TemplateVariant) -> Result<RenderedCertificate> {
        if self.fail {
            return Err(CertissueError::TemplateNotFound(variant.image_filename()));
        }
        Ok(RenderedCertificate {
            image_png: stub_image(cert),
            qr_png: b"qr".to_vec(),
        })
    }
}

pub fn stub_image(cert: &Certificate) -> Vec<u8> {
    format!("png:{}:{}", cert.certificate_id, cert.template).into_bytes()
}

pub struct Options {
    pub fail_render: bool,
    pub uploads: bool,
    pub auto_upload: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fail_render: false,
            uploads: true,
            auto_upload: false,
        }
    }
}

pub fn issuer(dir: &Path, options: Options) -> Issuer {
    let renderer = StubRenderer {
        fail: options.fail_render,
    };
    issuer_with(dir, Store::in_memory().unwrap(), Box::new(renderer), options)
}

/// Like [`issuer`] with the store and renderer supplied by the caller.
pub fn issuer_with(
    dir: &Path,
    store: Store,
    renderer: Box<dyn CertificateRenderer>,
    options: Options,
) -> Issuer {
    let uploader: Option<Box<dyn ObjectStore>> = if options.uploads {
        Some(Box::new(FolderStore::new(dir.join("drive"))))
    } else {
        None
    };
    Issuer::new(
        store,
        renderer,
        Box::new(SpoolMailer::new(dir.join("outbox"))),
        uploader,
        dir.join("media"),
        IssuerSettings {
            id_prefix: "CERT-".to_string(),
            verify_base: VERIFY_BASE.to_string(),
            auto_upload: options.auto_upload,
            mail: MailSettings::new("certs@example.org", "Test Org", VERIFY_BASE),
        },
    )
}

pub fn form(name: &str, roll: &str) -> CertificateForm {
    CertificateForm {
        full_name: name.to_string(),
        course: "Data Science".to_string(),
        college_name: "Tech College".to_string(),
        affiliated_name: "State University".to_string(),
        roll_number: roll.to_string(),
        email: "jane@example.com".to_string(),
        start_date: "2024-01-01".to_string(),
        end_date: "2024-03-31".to_string(),
        template: Some("DataValley".to_string()),
    }
}

pub fn outbox_count(dir: &Path) -> usize {
    std::fs::read_dir(dir.join("outbox"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}
