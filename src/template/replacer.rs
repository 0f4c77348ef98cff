use log::{debug, warn};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// How substituted values are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escaping {
    /// Values are inserted verbatim
    Plain,
    /// HTML special characters are escaped, newlines become `<br>`
    Html,
}

/// Fills `{{KEY}}` placeholders in mail templates.
pub struct PlaceholderReplacer {
    escaping: Escaping,
}

fn placeholder_pattern() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("static regex"))
}

impl PlaceholderReplacer {
    pub fn new(escaping: Escaping) -> Self {
        Self { escaping }
    }

    fn escape_html(text: &str) -> String {
        let escaped = text
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#x27;");

        escaped.replace('\n', "<br>")
    }

    fn escape(&self, value: &str) -> String {
        match self.escaping {
            Escaping::Plain => value.to_string(),
            Escaping::Html => Self::escape_html(value),
        }
    }

    /// Substitutes every placeholder in one pass over `content`, so values
    /// are never scanned for placeholders themselves.
    pub fn replace_all(&self, content: &str, replacements: &HashMap<String, String>) -> String {
        let mut replaced = 0;
        let result = placeholder_pattern().replace_all(content, |caps: &Captures| {
            match replacements.get(&caps[1]) {
                Some(value) => {
                    replaced += 1;
                    self.escape(value)
                }
                None => {
                    warn!("Placeholder '{}' has no value, left as is", &caps[1]);
                    caps[0].to_string()
                }
            }
        });
        debug!("Replaced {} placeholder(s)", replaced);
        result.into_owned()
    }
}

impl Default for PlaceholderReplacer {
    fn default() -> Self {
        Self::new(Escaping::Plain)
    }
}
