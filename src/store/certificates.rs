use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::query::{CertificateQuery, FilterMode, Page, Stats, PAGE_SIZE};
use super::{like_pattern, Store};
use crate::error::{CertissueError, Result};
use crate::record::{
    generate_certificate_id, title_case, verification_url, Certificate, NewCertificate,
};
use crate::verify::VerificationMethod;

const CERT_COLUMNS: &str = "certificate_id, full_name, roll_number, college_name, \
    affiliated_name, course, start_date, end_date, email, template, certificate_image, \
    qr_code_image, verification_url, is_verified, created_at, updated_at, email_sent, \
    email_sent_at, drive_uploaded, drive_file_id, drive_uploaded_at, notes";

/// Attempts at drawing an unused certificate ID before giving up.
const MAX_ID_ATTEMPTS: usize = 32;

fn certificate_from_row(row: &Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        certificate_id: row.get(0)?,
        full_name: row.get(1)?,
        roll_number: row.get(2)?,
        college_name: row.get(3)?,
        affiliated_name: row.get(4)?,
        course: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        email: row.get(8)?,
        template: row.get(9)?,
        certificate_image: row.get(10)?,
        qr_code_image: row.get(11)?,
        verification_url: row.get(12)?,
        is_verified: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        email_sent: row.get(16)?,
        email_sent_at: row.get(17)?,
        drive_uploaded: row.get(18)?,
        drive_file_id: row.get(19)?,
        drive_uploaded_at: row.get(20)?,
        notes: row.get(21)?,
    })
}

fn select_one(conn: &Connection, certificate_id: &str) -> Result<Option<Certificate>> {
    let sql = format!("SELECT {} FROM certificates WHERE certificate_id = ?1", CERT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![certificate_id], certificate_from_row)
        .optional()?)
}

/// WHERE clause and parameters for a search restricted to verified records.
fn search_clause(query: &CertificateQuery, mode: FilterMode) -> (String, Vec<String>) {
    let query = query.trimmed();
    let mut clauses = vec!["is_verified = 1".to_string()];
    let mut values = Vec::new();

    if !query.search_query.is_empty() {
        let n = values.len() + 1;
        clauses.push(format!(
            "(full_name LIKE ?{n} ESCAPE '\\' OR email LIKE ?{n} ESCAPE '\\' \
             OR roll_number LIKE ?{n} ESCAPE '\\' OR certificate_id LIKE ?{n} ESCAPE '\\')"
        ));
        values.push(like_pattern(&query.search_query));
    }

    for (column, value) in [
        ("course", &query.course_filter),
        ("college_name", &query.college_filter),
    ] {
        if value.is_empty() {
            continue;
        }
        let n = values.len() + 1;
        match mode {
            FilterMode::Contains => {
                clauses.push(format!("{column} LIKE ?{n} ESCAPE '\\'"));
                values.push(like_pattern(value));
            }
            FilterMode::Exact => {
                clauses.push(format!("lower({column}) = lower(?{n})"));
                values.push(value.clone());
            }
        }
    }

    (clauses.join(" AND "), values)
}

impl Store {
    /// Stores a new certificate under a freshly drawn unique ID.
    pub fn insert_certificate(
        &self,
        new: &NewCertificate,
        id_prefix: &str,
        verify_base: &str,
    ) -> Result<Certificate> {
        let conn = self.conn()?;

        let roll_taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM certificates WHERE roll_number = ?1)",
            params![new.roll_number],
            |row| row.get(0),
        )?;
        if roll_taken {
            return Err(CertissueError::DuplicateRollNumber(new.roll_number.clone()));
        }

        let mut certificate_id = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = generate_certificate_id(id_prefix);
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM certificates WHERE certificate_id = ?1)",
                params![candidate],
                |row| row.get(0),
            )?;
            if !taken {
                certificate_id = Some(candidate);
                break;
            }
            debug!("Certificate ID {} already taken, drawing again", candidate);
        }
        let certificate_id = certificate_id.ok_or_else(|| {
            CertissueError::Config(format!("could not draw a free ID with prefix '{}'", id_prefix))
        })?;

        let now = Utc::now();
        let url = verification_url(verify_base, &certificate_id);
        conn.execute(
            "INSERT INTO certificates (certificate_id, full_name, roll_number, college_name, \
             affiliated_name, course, start_date, end_date, email, template, verification_url, \
             is_verified, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?12)",
            params![
                certificate_id,
                new.full_name,
                new.roll_number,
                new.college_name,
                new.affiliated_name,
                new.course,
                new.start_date,
                new.end_date,
                new.email,
                new.template,
                url,
                now,
            ],
        )?;
        info!("Stored certificate {} for {}", certificate_id, new.full_name);

        select_one(&conn, &certificate_id)?
            .ok_or_else(|| CertissueError::NotFound(certificate_id.clone()))
    }

    pub fn get_certificate(&self, certificate_id: &str) -> Result<Option<Certificate>> {
        select_one(&*self.conn()?, certificate_id)
    }

    /// Like [`Store::get_certificate`] but a missing record is an error.
    pub fn require_certificate(&self, certificate_id: &str) -> Result<Certificate> {
        self.get_certificate(certificate_id)?
            .ok_or_else(|| CertissueError::NotFound(certificate_id.to_string()))
    }

    pub fn roll_number_exists(&self, roll_number: &str) -> Result<bool> {
        Ok(self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM certificates WHERE roll_number = ?1)",
            params![roll_number],
            |row| row.get(0),
        )?)
    }

    fn update(&self, certificate_id: &str, sql: &str, values: &[&dyn rusqlite::ToSql]) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(sql, values)?;
        if changed == 0 {
            return Err(CertissueError::NotFound(certificate_id.to_string()));
        }
        Ok(())
    }

    pub fn set_files(&self, certificate_id: &str, image: &str, qr: &str) -> Result<()> {
        self.update(
            certificate_id,
            "UPDATE certificates SET certificate_image = ?2, qr_code_image = ?3, updated_at = ?4 \
             WHERE certificate_id = ?1",
            &[&certificate_id, &image, &qr, &Utc::now()],
        )
    }

    pub fn mark_email_sent(&self, certificate_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.update(
            certificate_id,
            "UPDATE certificates SET email_sent = 1, email_sent_at = ?2, updated_at = ?2 \
             WHERE certificate_id = ?1",
            &[&certificate_id, &at],
        )
    }

    pub fn mark_uploaded(&self, certificate_id: &str, file_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.update(
            certificate_id,
            "UPDATE certificates SET drive_uploaded = 1, drive_file_id = ?2, \
             drive_uploaded_at = ?3, updated_at = ?3 WHERE certificate_id = ?1",
            &[&certificate_id, &file_id, &at],
        )
    }

    /// Revokes or reinstates a certificate; revoked ones fail verification.
    pub fn set_verified(&self, certificate_id: &str, verified: bool) -> Result<()> {
        self.update(
            certificate_id,
            "UPDATE certificates SET is_verified = ?2, updated_at = ?3 WHERE certificate_id = ?1",
            &[&certificate_id, &verified, &Utc::now()],
        )
    }

    pub fn set_notes(&self, certificate_id: &str, notes: &str) -> Result<()> {
        self.update(
            certificate_id,
            "UPDATE certificates SET notes = ?2, updated_at = ?3 WHERE certificate_id = ?1",
            &[&certificate_id, &notes, &Utc::now()],
        )
    }

    pub fn delete_certificate(&self, certificate_id: &str) -> Result<()> {
        self.update(
            certificate_id,
            "DELETE FROM certificates WHERE certificate_id = ?1",
            &[&certificate_id],
        )
    }

    /// Records with the given IDs, in the order given; unknown IDs are skipped.
    pub fn certificates_by_ids(&self, ids: &[String]) -> Result<Vec<Certificate>> {
        let conn = self.conn()?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match select_one(&conn, id)? {
                Some(cert) => found.push(cert),
                None => debug!("Unknown certificate {} skipped", id),
            }
        }
        Ok(found)
    }

    /// One page of verified certificates matching `query`, newest first.
    pub fn search(&self, query: &CertificateQuery, page: Option<&str>) -> Result<Page<Certificate>> {
        let conn = self.conn()?;
        let (clause, values) = search_clause(query, FilterMode::Contains);

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM certificates WHERE {}", clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let total = total as usize;
        let number = Page::<Certificate>::resolve_number(page, total);

        let sql = format!(
            "SELECT {} FROM certificates WHERE {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            CERT_COLUMNS,
            clause,
            PAGE_SIZE,
            (number - 1) * PAGE_SIZE
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), certificate_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page::new(items, number, total))
    }

    /// Every verified certificate matching `query` with exact filters.
    pub fn export_selection(&self, query: &CertificateQuery) -> Result<Vec<Certificate>> {
        let conn = self.conn()?;
        let (clause, values) = search_clause(query, FilterMode::Exact);
        let sql = format!(
            "SELECT {} FROM certificates WHERE {} ORDER BY created_at DESC, id DESC",
            CERT_COLUMNS, clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), certificate_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Newest verified certificate whose `method` field equals `value`,
    /// ignoring case.
    pub fn find_verified(&self, method: VerificationMethod, value: &str) -> Result<Option<Certificate>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM certificates WHERE lower({}) = lower(?1) AND is_verified = 1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            CERT_COLUMNS,
            method.column()
        );
        Ok(conn.query_row(&sql, params![value], certificate_from_row).optional()?)
    }

    fn distinct_titles(&self, column: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT lower({column}) FROM certificates ORDER BY 1"
        ))?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(values.iter().map(|v| title_case(v)).collect())
    }

    /// Course names for the filter dropdown, title-cased.
    pub fn distinct_courses(&self) -> Result<Vec<String>> {
        self.distinct_titles("course")
    }

    pub fn distinct_colleges(&self) -> Result<Vec<String>> {
        self.distinct_titles("college_name")
    }

    pub fn stats(&self) -> Result<Stats> {
        let (total, verified, emails_sent, drive_uploads, recent) = {
            let conn = self.conn()?;
            let count = |sql: &str| -> Result<usize> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as usize)
            };
            let total = count("SELECT COUNT(*) FROM certificates")?;
            let verified = count("SELECT COUNT(*) FROM certificates WHERE is_verified = 1")?;
            let emails_sent = count("SELECT COUNT(*) FROM certificates WHERE email_sent = 1")?;
            let drive_uploads = count("SELECT COUNT(*) FROM certificates WHERE drive_uploaded = 1")?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM certificates WHERE is_verified = 1 \
                 ORDER BY created_at DESC, id DESC LIMIT 10",
                CERT_COLUMNS
            ))?;
            let recent = stmt
                .query_map([], certificate_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            (total, verified, emails_sent, drive_uploads, recent)
        };

        Ok(Stats {
            total_certificates: total,
            verified_certificates: verified,
            emails_sent,
            drive_uploads,
            recent_certificates: recent,
            top_courses: self.distinct_courses()?,
            top_colleges: self.distinct_colleges()?,
        })
    }
}
