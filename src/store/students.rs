use chrono::Utc;
use log::debug;
use rusqlite::{params, Row};

use super::Store;
use crate::error::{CertissueError, Result};
use crate::record::{PendingStudent, StudentRow};

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<PendingStudent> {
    Ok(PendingStudent {
        id: row.get(0)?,
        full_name: row.get(1)?,
        course: row.get(2)?,
        roll_number: row.get(3)?,
        college_name: row.get(4)?,
        affiliated_name: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        email: row.get(8)?,
        contact: row.get(9)?,
        gender: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl Store {
    /// Queues an imported row. Returns `false` when a row with the same
    /// roll number, ignoring case and surrounding blanks, is already waiting.
    pub fn insert_student(&self, row: &StudentRow) -> Result<bool> {
        let conn = self.conn()?;
        let pending: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pending_students WHERE lower(trim(roll_number)) = lower(trim(?1)))",
            params![row.roll_number],
            |r| r.get(0),
        )?;
        if pending {
            debug!("Roll number {} already pending", row.roll_number);
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO pending_students (full_name, course, roll_number, college_name, \
             affiliated_name, start_date, end_date, email, contact, gender, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.full_name,
                row.course,
                row.roll_number,
                row.college_name,
                row.affiliated_name,
                row.start_date,
                row.end_date,
                row.email,
                row.contact,
                row.gender,
                Utc::now(),
            ],
        )?;
        Ok(true)
    }

    /// All queued students in import order.
    pub fn pending_students(&self) -> Result<Vec<PendingStudent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, full_name, course, roll_number, college_name, affiliated_name, \
             start_date, end_date, email, contact, gender, created_at \
             FROM pending_students ORDER BY id",
        )?;
        let students = stmt
            .query_map([], student_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(students)
    }

    pub fn count_pending(&self) -> Result<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM pending_students", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn delete_student(&self, id: i64) -> Result<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM pending_students WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CertissueError::NotFound(format!("pending student #{}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(roll: &str) -> StudentRow {
        StudentRow {
            full_name: "Jane Roe".to_string(),
            course: "Robotics".to_string(),
            roll_number: roll.to_string(),
            college_name: "Tech College".to_string(),
            affiliated_name: "State University".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            email: "jane@example.com".to_string(),
            contact: "NONE".to_string(),
            gender: "F".to_string(),
        }
    }

    #[test]
    fn test_queue_roundtrip() {
        let store = Store::in_memory().unwrap();
        assert!(store.insert_student(&row("R1")).unwrap());
        assert!(!store.insert_student(&row("R1")).unwrap());
        assert!(store.insert_student(&row("R2")).unwrap());

        let pending = store.pending_students().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].roll_number, "R1");
        assert_eq!(pending[0].gender, "F");

        store.delete_student(pending[0].id).unwrap();
        assert_eq!(store.count_pending().unwrap(), 1);
        assert!(store.delete_student(pending[0].id).is_err());
    }

    #[test]
    fn test_pending_roll_numbers_ignore_case() {
        let store = Store::in_memory().unwrap();
        assert!(store.insert_student(&row("cs001")).unwrap());
        assert!(!store.insert_student(&row("CS001")).unwrap());
        assert!(!store.insert_student(&row(" Cs001 ")).unwrap());
        assert_eq!(store.count_pending().unwrap(), 1);
    }
}
