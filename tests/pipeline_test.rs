//! Issuing workflows from form or spreadsheet to mailed certificate.

mod common;

use certissue::import::{import_students, SheetFormat};
use certissue::record::Certificate;
use certissue::{
    CertificateRenderer, CertissueError, RenderedCertificate, Result, Store, TemplateVariant,
    VerificationMethod,
};
use common::{form, issuer, issuer_with, outbox_count, stub_image, Options, StubRenderer};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_issue_renders_stores_and_mails() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(dir.path(), Options::default());

    let cert = issuer.issue(&form("jane doe", "cs001"))?;

    assert!(cert.certificate_id.starts_with("CERT-"));
    assert_eq!(cert.full_name, "JANE DOE");
    assert_eq!(cert.roll_number, "CS001");
    assert_eq!(cert.template, "DataValley");
    let image_path = format!("certificates/CS001_{}.png", cert.certificate_id);
    let qr_path = format!("qr_codes/qr_CS001_{}.png", cert.certificate_id);
    assert_eq!(cert.certificate_image.as_deref(), Some(image_path.as_str()));
    assert_eq!(cert.qr_code_image.as_deref(), Some(qr_path.as_str()));
    assert_eq!(
        cert.verification_url,
        format!("https://verify.example.org/verify/{}/", cert.certificate_id)
    );

    let image = fs::read(dir.path().join("media").join(&image_path))?;
    assert_eq!(image, stub_image(&cert));
    assert!(dir.path().join("media").join(&qr_path).exists());

    assert!(cert.email_sent);
    assert!(cert.email_sent_at.is_some());
    assert_eq!(outbox_count(dir.path()), 1);
    // uploads only happen on request unless auto-upload is on
    assert!(!cert.drive_uploaded);

    Ok(())
}

#[test]
fn test_roll_numbers_cannot_escape_or_share_files() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(dir.path(), Options::default());
    let certificates = dir.path().join("media/certificates");

    let escaping = issuer.issue(&form("Eve Doe", "../../ESCAPED"))?;
    let spaced = issuer.issue(&form("Ann Doe", "AB 1"))?;
    let underscored = issuer.issue(&form("Bob Doe", "AB_1"))?;

    assert!(!dir.path().join("ESCAPED.png").exists());
    assert_ne!(spaced.certificate_image, underscored.certificate_image);

    for cert in [&escaping, &spaced, &underscored] {
        let relative = cert.certificate_image.as_deref().unwrap();
        let path = dir.path().join("media").join(relative);
        assert_eq!(path.parent(), Some(certificates.as_path()));
        assert_eq!(fs::read(&path)?, stub_image(cert));
    }
    assert_eq!(fs::read_dir(&certificates)?.count(), 3);

    Ok(())
}

#[test]
fn test_duplicate_roll_number_is_rejected() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(dir.path(), Options::default());

    issuer.issue(&form("Jane Doe", "CS001"))?;
    let second = issuer.issue(&form("John Doe", "cs001"));
    assert!(matches!(second, Err(CertissueError::DuplicateRollNumber(r)) if r == "CS001"));
    assert_eq!(issuer.store().stats()?.total_certificates, 1);

    Ok(())
}

#[test]
fn test_invalid_form_stores_nothing() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(dir.path(), Options::default());

    let mut bad = form("J", "CS001");
    bad.email = "not-an-email".to_string();
    match issuer.issue(&bad) {
        Err(CertissueError::Validation(fields)) => {
            let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
            assert!(names.contains(&"full_name"));
            assert!(names.contains(&"email"));
        }
        other => panic!("expected validation error, got {:?}", other.map(|c| c.certificate_id)),
    }
    assert!(!issuer.store().roll_number_exists("CS001")?);

    Ok(())
}

#[test]
fn test_render_failure_rolls_back_record() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(
        dir.path(),
        Options {
            fail_render: true,
            ..Options::default()
        },
    );

    let result = issuer.issue(&form("Jane Doe", "CS001"));
    assert!(matches!(result, Err(CertissueError::TemplateNotFound(_))));
    assert!(!issuer.store().roll_number_exists("CS001")?);
    assert_eq!(outbox_count(dir.path()), 0);

    Ok(())
}

#[test]
fn test_auto_upload_copies_to_drive() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(
        dir.path(),
        Options {
            auto_upload: true,
            ..Options::default()
        },
    );

    let cert = issuer.issue(&form("Jane Doe", "CS001"))?;
    assert!(cert.drive_uploaded);
    assert_eq!(cert.drive_file_id.len(), 16);
    assert!(dir.path().join("drive/JANE_DOE.png").exists());

    Ok(())
}

#[test]
fn test_upload_without_destination_fails() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(
        dir.path(),
        Options {
            uploads: false,
            ..Options::default()
        },
    );

    let cert = issuer.issue(&form("Jane Doe", "CS001"))?;
    assert!(matches!(
        issuer.upload_one(&cert.certificate_id),
        Err(CertissueError::Upload(_))
    ));

    let outcome = issuer.upload(&[cert.certificate_id.clone()]);
    assert_eq!(outcome.succeeded, 0);
    assert_eq!(outcome.failures.len(), 1);

    Ok(())
}

#[test]
fn test_batch_actions_skip_and_report() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(dir.path(), Options::default());
    let cert = issuer.issue(&form("Jane Doe", "CS001"))?;
    let ids = vec![cert.certificate_id.clone(), "CERT-missing0".to_string()];

    // already mailed on issue
    let emails = issuer.send_emails(&ids);
    assert_eq!(emails.succeeded, 0);
    assert_eq!(emails.skipped, 1);
    assert_eq!(emails.failures.len(), 1);
    assert_eq!(emails.failures[0].0, "CERT-missing0");

    let uploads = issuer.upload(&ids);
    assert_eq!(uploads.succeeded, 1);
    assert!(issuer.store().require_certificate(&cert.certificate_id)?.drive_uploaded);
    assert_eq!(issuer.upload(&ids).skipped, 1);

    let regenerated = issuer.regenerate(&ids[..1]);
    assert_eq!(regenerated.succeeded, 1);
    assert!(regenerated.failures.is_empty());

    // explicit resend is always allowed
    issuer.send_email(&cert.certificate_id)?;
    assert_eq!(outbox_count(dir.path()), 2);

    Ok(())
}

const SHEET: &str = "\
Name,Course,Roll No,College Name,Affiliated Name,Start Date,End Date,Email,Contact,Gender
Asha Rao,Data Science,R100,Tech College,State University,2024-01-01,2024-03-31,asha@example.com,9876543210,F
Ravi Kumar,Data Science,R101,Tech College,State University,01-01-2024,31-03-2024,ravi@example.com,,M
Jane Doe,Data Science,CS001,Tech College,State University,2024-01-01,2024-03-31,jane@example.com,,
";

#[test]
fn test_generate_pending_students() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(dir.path(), Options::default());
    issuer.issue(&form("Jane Doe", "CS001"))?;

    let imported = import_students(issuer.store(), SHEET.as_bytes(), SheetFormat::Csv)?;
    assert_eq!(imported.imported, 3);

    let report = issuer.generate_pending(TemplateVariant::Pragna)?;
    assert_eq!(report.generated, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.failed, 0);

    let asha = issuer
        .store()
        .find_verified(VerificationMethod::RollNumber, "R100")?
        .expect("generated certificate");
    assert_eq!(asha.full_name, "ASHA RAO");
    assert_eq!(asha.template, "Pragna");

    // the duplicate stays queued
    let pending = issuer.store().pending_students()?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].roll_number, "CS001");

    issuer.store().delete_student(pending[0].id)?;
    assert!(matches!(
        issuer.generate_pending(TemplateVariant::Pragna),
        Err(CertissueError::NoPendingStudents)
    ));

    Ok(())
}

#[test]
fn test_failed_renders_stay_queued() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(
        dir.path(),
        Options {
            fail_render: true,
            ..Options::default()
        },
    );
    import_students(issuer.store(), SHEET.as_bytes(), SheetFormat::Csv)?;

    let report = issuer.generate_pending(TemplateVariant::Pragna)?;
    assert_eq!(report.generated, 0);
    assert_eq!(report.failed, 3);
    assert_eq!(report.duplicates, 0);

    assert_eq!(issuer.store().count_pending()?, 3);
    assert_eq!(issuer.store().stats()?.total_certificates, 0);

    Ok(())
}

/// Empties the pending queue through a second handle while rendering.
struct QueueClearingRenderer {
    queue: Store,
}

impl CertificateRenderer for QueueClearingRenderer {
    fn render(&self, cert: &Certificate, variant: TemplateVariant) -> Result<RenderedCertificate> {
        for student in self.queue.pending_students()? {
            self.queue.delete_student(student.id)?;
        }
        StubRenderer { fail: false }.render(cert, variant)
    }
}

#[test]
fn test_dequeue_failure_does_not_stop_bulk_run() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("certissue.db");
    let issuer = issuer_with(
        dir.path(),
        Store::open(&db)?,
        Box::new(QueueClearingRenderer {
            queue: Store::open(&db)?,
        }),
        Options::default(),
    );
    import_students(issuer.store(), SHEET.as_bytes(), SheetFormat::Csv)?;

    // the first issue clears the queue, so no row can be dequeued afterwards
    let report = issuer.generate_pending(TemplateVariant::Pragna)?;
    assert_eq!(report.generated, 0);
    assert_eq!(report.failed, 3);
    assert_eq!(issuer.store().stats()?.total_certificates, 3);

    Ok(())
}

#[test]
fn test_import_survives_undecodable_row() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let issuer = issuer(dir.path(), Options::default());

    let mut sheet = SHEET.as_bytes().to_vec();
    sheet.extend_from_slice(
        b"M\xe9ra Iyer,Data Science,R102,Tech College,State University,2024-01-01,2024-03-31,mera@example.com,,F\n",
    );
    sheet.extend_from_slice(
        b"Kiran Das,Data Science,R103,Tech College,State University,2024-01-01,2024-03-31,kiran@example.com,,M\n",
    );

    let report = import_students(issuer.store(), &sheet, SheetFormat::Csv)?;
    assert_eq!(report.imported, 4);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 4);
    assert_eq!(issuer.store().count_pending()?, 4);

    Ok(())
}
