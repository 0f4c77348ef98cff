//! CSV and ZIP exports of issued certificates.

use log::{info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::OnceLock;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{CertissueError, Result};
use crate::record::Certificate;

pub const CSV_COLUMNS: [&str; 13] = [
    "Full Name",
    "Course",
    "College Name",
    "Roll Number",
    "Affiliated Name",
    "Start Date",
    "End Date",
    "Email",
    "Certificate ID",
    "Verified",
    "Email Sent",
    "Drive Uploaded",
    "Created At",
];

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn export_csv(certs: &[Certificate]) -> Result<Vec<u8>> {
    if certs.is_empty() {
        return Err(CertissueError::NothingToExport);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for cert in certs {
        let start_date = cert.start_date.format("%Y-%m-%d").to_string();
        let end_date = cert.end_date.format("%Y-%m-%d").to_string();
        let created_at = cert.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        writer.write_record([
            cert.full_name.as_str(),
            cert.course.as_str(),
            cert.college_name.as_str(),
            cert.roll_number.as_str(),
            cert.affiliated_name.as_str(),
            start_date.as_str(),
            end_date.as_str(),
            cert.email.as_str(),
            cert.certificate_id.as_str(),
            yes_no(cert.is_verified),
            yes_no(cert.email_sent),
            yes_no(cert.drive_uploaded),
            created_at.as_str(),
        ])?;
    }

    info!("Exported {} certificates as CSV", certs.len());
    writer
        .into_inner()
        .map_err(|e| CertissueError::Io(e.into_error()))
}

/// Archive name derived from a college, e.g. `St. Mary's College` becomes
/// `st_mary_s_college.zip`.
pub fn archive_name(college: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"\W+").expect("static regex"));
    let slug = re.replace_all(college.trim().to_lowercase().as_str(), "_").to_string();
    let slug = if slug.trim_matches('_').is_empty() {
        "certificates".to_string()
    } else {
        slug
    };
    format!("{}.zip", slug)
}

/// Packs the rendered images of `certs` into one archive. Records without
/// an image on disk are skipped.
///
/// Returns the archive's file name together with its bytes.
pub fn export_zip(certs: &[Certificate], media_root: &Path) -> Result<(String, Vec<u8>)> {
    let first = certs.first().ok_or(CertissueError::NothingToExport)?;
    let filename = archive_name(&first.college_name);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut seen = HashSet::new();
    let mut packed = 0;

    for cert in certs {
        let Some(relative) = cert.certificate_image.as_deref() else {
            warn!("{} has no image, skipping", cert.certificate_id);
            continue;
        };
        let bytes = match fs::read(media_root.join(relative)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read image of {}: {}", cert.certificate_id, e);
                continue;
            }
        };

        let mut name = cert.image_filename();
        if !seen.insert(name.clone()) {
            name = format!("{}_{}", cert.certificate_id, name);
            seen.insert(name.clone());
        }

        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
        packed += 1;
    }

    if packed == 0 {
        return Err(CertissueError::NothingToExport);
    }

    let cursor = zip.finish()?;
    info!("Packed {} certificate images into {}", packed, filename);
    Ok((filename, cursor.into_inner()))
}
