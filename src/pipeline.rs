//! Issuing certificates: record, render, store files, mail and upload.

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{CertissueError, Result};
use crate::mail::{compose_certificate_email, MailSettings, Mailer, SmtpMailer, SpoolMailer};
use crate::record::{Certificate, CertificateForm};
use crate::render::{load_font, CertificateRenderer, Compositor, RenderedCertificate};
use crate::store::Store;
use crate::template::{LayoutSet, TemplateVariant};
use crate::upload::{FolderStore, HttpStore, ObjectStore};

/// Media subdirectory holding rendered certificates.
pub const CERTIFICATES_DIR: &str = "certificates";
/// Media subdirectory holding QR code images.
pub const QR_CODES_DIR: &str = "qr_codes";

#[derive(Debug, Clone)]
pub struct IssuerSettings {
    pub id_prefix: String,
    pub verify_base: String,
    /// Push every new certificate to the object store
    pub auto_upload: bool,
    pub mail: MailSettings,
}

impl IssuerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            id_prefix: config.id_prefix.clone(),
            verify_base: config.verify_base.clone(),
            auto_upload: config.auto_upload,
            mail: MailSettings::new(&config.mail_from, &config.organization, &config.verify_base),
        }
    }
}

/// Counts from a bulk generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub generated: usize,
    pub failed: usize,
    /// Rows skipped because their roll number was already issued
    pub duplicates: usize,
}

/// Result of acting on a list of certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    /// Records already handled or not yet rendered
    pub skipped: usize,
    pub failures: Vec<(String, String)>,
}

impl BatchOutcome {
    fn record(&mut self, certificate_id: &str, result: Result<Certificate>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(e) => {
                error!("{}: {}", certificate_id, e);
                self.failures.push((certificate_id.to_string(), e.to_string()));
            }
        }
    }
}

/// Used when no font could be loaded; every render fails with a clear
/// error while the rest of the application keeps working.
struct NoFontRenderer;

impl CertificateRenderer for NoFontRenderer {
    fn render(&self, _cert: &Certificate, _variant: TemplateVariant) -> Result<RenderedCertificate> {
        Err(CertissueError::FontUnavailable)
    }
}

pub struct Issuer {
    store: Store,
    renderer: Box<dyn CertificateRenderer>,
    mailer: Box<dyn Mailer>,
    uploader: Option<Box<dyn ObjectStore>>,
    media_root: PathBuf,
    settings: IssuerSettings,
}

impl Issuer {
    pub fn new(
        store: Store,
        renderer: Box<dyn CertificateRenderer>,
        mailer: Box<dyn Mailer>,
        uploader: Option<Box<dyn ObjectStore>>,
        media_root: impl Into<PathBuf>,
        settings: IssuerSettings,
    ) -> Self {
        Self {
            store,
            renderer,
            mailer,
            uploader,
            media_root: media_root.into(),
            settings,
        }
    }

    /// Wires store, renderer, mailer and uploader as configured.
    pub fn from_config(config: &Config, store: Store) -> Result<Self> {
        let layouts = match &config.layouts {
            Some(path) => LayoutSet::load(path)?,
            None => LayoutSet::default(),
        };

        let renderer: Box<dyn CertificateRenderer> = match load_font(config.font_path.as_deref()) {
            Ok(font) => Box::new(Compositor::new(
                &config.templates_dir,
                layouts,
                font,
                config.font_size,
                config.verify_base.as_str(),
            )),
            Err(CertissueError::FontUnavailable) => {
                warn!("No usable font found, certificates cannot be rendered");
                Box::new(NoFontRenderer)
            }
            Err(e) => return Err(e),
        };

        let mailer: Box<dyn Mailer> = match &config.smtp {
            Some(smtp) => {
                let credentials = smtp.user.clone().zip(smtp.password.clone());
                Box::new(SmtpMailer::new(&smtp.host, smtp.port, credentials)?)
            }
            None => Box::new(SpoolMailer::new(&config.outbox_dir)),
        };

        let uploader: Option<Box<dyn ObjectStore>> = match (&config.upload_url, &config.upload_dir) {
            (Some(url), _) => Some(Box::new(HttpStore::new(url, config.upload_token.clone()))),
            (None, Some(dir)) => Some(Box::new(FolderStore::new(dir))),
            (None, None) => None,
        };

        Ok(Self::new(
            store,
            renderer,
            mailer,
            uploader,
            &config.media_dir,
            IssuerSettings::from_config(config),
        ))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Validates the form, stores a new certificate and renders it.
    ///
    /// If rendering fails the record is removed again. Mail and upload
    /// failures are logged and leave the certificate issued.
    pub fn issue(&self, form: &CertificateForm) -> Result<Certificate> {
        let new = form.validate()?;
        let variant: TemplateVariant = new.template.parse()?;
        let cert = self
            .store
            .insert_certificate(&new, &self.settings.id_prefix, &self.settings.verify_base)?;

        if let Err(e) = self.render_and_save(&cert, variant) {
            error!("Rendering {} failed: {}", cert.certificate_id, e);
            if let Err(cleanup) = self.store.delete_certificate(&cert.certificate_id) {
                error!("Could not remove {}: {}", cert.certificate_id, cleanup);
            }
            return Err(e);
        }

        if let Err(e) = self.send_email(&cert.certificate_id) {
            warn!("Email for {} not sent: {}", cert.certificate_id, e);
        }
        if self.settings.auto_upload && self.uploader.is_some() {
            if let Err(e) = self.upload_one(&cert.certificate_id) {
                warn!("Upload of {} failed: {}", cert.certificate_id, e);
            }
        }

        info!("Issued {} ({})", cert.certificate_id, cert);
        self.store.require_certificate(&cert.certificate_id)
    }

    /// Renders `cert` and writes its images under the media root.
    fn render_and_save(&self, cert: &Certificate, variant: TemplateVariant) -> Result<Certificate> {
        let rendered = self.renderer.render(cert, variant)?;

        let image = format!("{}/{}", CERTIFICATES_DIR, cert.stored_image_filename());
        let qr = format!("{}/{}", QR_CODES_DIR, cert.qr_filename());
        for (relative, bytes) in [(&image, &rendered.image_png), (&qr, &rendered.qr_png)] {
            let path = self.media_root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
        }

        self.store.set_files(&cert.certificate_id, &image, &qr)?;
        self.store.require_certificate(&cert.certificate_id)
    }

    fn image_bytes(&self, cert: &Certificate) -> Result<Vec<u8>> {
        let relative = cert
            .certificate_image
            .as_deref()
            .ok_or_else(|| CertissueError::MissingImage(cert.certificate_id.clone()))?;
        Ok(fs::read(self.media_root.join(relative))?)
    }

    /// Issues every pending student with `template`. Issued rows leave the
    /// queue; failed and duplicate rows stay for another attempt.
    pub fn generate_pending(&self, template: TemplateVariant) -> Result<BulkReport> {
        let pending = self.store.pending_students()?;
        if pending.is_empty() {
            return Err(CertissueError::NoPendingStudents);
        }

        let mut report = BulkReport::default();
        for student in &pending {
            match self.issue(&student.to_form(template.name())) {
                Ok(cert) => match self.store.delete_student(student.id) {
                    Ok(()) => {
                        report.generated += 1;
                        info!("Generated {} for {}", cert.certificate_id, student);
                    }
                    Err(e) => {
                        report.failed += 1;
                        error!(
                            "Issued {} but could not dequeue {}: {}",
                            cert.certificate_id, student, e
                        );
                    }
                },
                Err(CertissueError::DuplicateRollNumber(roll)) => {
                    report.duplicates += 1;
                    info!("Roll number {} already issued, skipped", roll);
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Could not generate certificate for {}: {}", student, e);
                }
            }
        }

        info!(
            "Bulk generation: {} generated, {} failed, {} duplicates",
            report.generated, report.failed, report.duplicates
        );
        Ok(report)
    }

    /// Mails one certificate to its student.
    pub fn send_email(&self, certificate_id: &str) -> Result<Certificate> {
        let cert = self.store.require_certificate(certificate_id)?;
        let image = self.image_bytes(&cert)?;
        let message = compose_certificate_email(&cert, image, &self.settings.mail);
        self.mailer.deliver(&message)?;
        self.store.mark_email_sent(certificate_id, Utc::now())?;
        self.store.require_certificate(certificate_id)
    }

    /// Mails every listed certificate that is rendered and not yet sent.
    pub fn send_emails(&self, ids: &[String]) -> BatchOutcome {
        self.for_each(ids, |cert| !cert.email_sent, |id| self.send_email(id))
    }

    /// Pushes one certificate image to the object store.
    pub fn upload_one(&self, certificate_id: &str) -> Result<Certificate> {
        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| CertissueError::Upload("no upload destination configured".to_string()))?;
        let cert = self.store.require_certificate(certificate_id)?;
        let image = self.image_bytes(&cert)?;
        let file_id = uploader.put(&cert.drive_filename(), &image, "image/png")?;
        self.store.mark_uploaded(certificate_id, &file_id, Utc::now())?;
        self.store.require_certificate(certificate_id)
    }

    /// Uploads every listed certificate that is rendered and not yet
    /// uploaded.
    pub fn upload(&self, ids: &[String]) -> BatchOutcome {
        self.for_each(ids, |cert| !cert.drive_uploaded, |id| self.upload_one(id))
    }

    /// Re-renders one certificate with its stored template.
    pub fn regenerate_one(&self, certificate_id: &str) -> Result<Certificate> {
        let cert = self.store.require_certificate(certificate_id)?;
        let variant: TemplateVariant = cert.template.parse()?;
        self.render_and_save(&cert, variant)
    }

    pub fn regenerate(&self, ids: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in ids {
            outcome.record(id, self.regenerate_one(id));
        }
        outcome
    }

    fn for_each<P, F>(&self, ids: &[String], wanted: P, action: F) -> BatchOutcome
    where
        P: Fn(&Certificate) -> bool,
        F: Fn(&str) -> Result<Certificate>,
    {
        let mut outcome = BatchOutcome::default();
        for id in ids {
            match self.store.get_certificate(id) {
                Ok(Some(cert)) if cert.certificate_image.is_some() && wanted(&cert) => {
                    outcome.record(id, action(id));
                }
                Ok(Some(_)) => outcome.skipped += 1,
                Ok(None) => outcome.record(id, Err(CertissueError::NotFound(id.clone()))),
                Err(e) => outcome.record(id, Err(e)),
            }
        }
        outcome
    }
}
