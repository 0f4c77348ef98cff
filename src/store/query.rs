use serde::{Deserialize, Serialize};

use crate::record::Certificate;

/// Certificates shown per list page.
pub const PAGE_SIZE: usize = 12;

/// Search and filter criteria for the certificate list and exports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateQuery {
    /// Substring of name, email, roll number or certificate ID
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub course_filter: String,
    #[serde(default)]
    pub college_filter: String,
}

/// How course and college filters are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Case-insensitive substring, used by the list view
    Contains,
    /// Case-insensitive equality, used by exports
    Exact,
}

impl CertificateQuery {
    pub fn trimmed(&self) -> Self {
        Self {
            search_query: self.search_query.trim().to_string(),
            course_filter: self.course_filter.trim().to_string(),
            college_filter: self.college_filter.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Resolves a requested page number against `total` items. Anything
    /// that is not a number yields the first page; numbers out of range
    /// yield the last.
    pub fn resolve_number(requested: Option<&str>, total: usize) -> usize {
        let num_pages = Self::count_pages(total);
        match requested.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            None => 1,
            Some(n) if n >= 1 && (n as usize) <= num_pages => n as usize,
            Some(_) => num_pages,
        }
    }

    pub fn count_pages(total: usize) -> usize {
        total.div_ceil(PAGE_SIZE).max(1)
    }

    pub fn new(items: Vec<T>, number: usize, total: usize) -> Self {
        let num_pages = Self::count_pages(total);
        Self {
            items,
            number,
            num_pages,
            total,
            has_previous: number > 1,
            has_next: number < num_pages,
        }
    }
}

/// Dashboard numbers.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_certificates: usize,
    pub verified_certificates: usize,
    pub emails_sent: usize,
    pub drive_uploads: usize,
    pub recent_certificates: Vec<Certificate>,
    pub top_courses: Vec<String>,
    pub top_colleges: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_resolution() {
        assert_eq!(Page::<()>::resolve_number(None, 30), 1);
        assert_eq!(Page::<()>::resolve_number(Some("abc"), 30), 1);
        assert_eq!(Page::<()>::resolve_number(Some("2"), 30), 2);
        assert_eq!(Page::<()>::resolve_number(Some("9"), 30), 3);
        assert_eq!(Page::<()>::resolve_number(Some("0"), 30), 3);
        assert_eq!(Page::<()>::resolve_number(Some("1"), 0), 1);
    }

    #[test]
    fn test_page_flags() {
        let page = Page::new(vec![1, 2], 2, 26);
        assert_eq!(page.num_pages, 3);
        assert!(page.has_previous);
        assert!(page.has_next);
    }
}
