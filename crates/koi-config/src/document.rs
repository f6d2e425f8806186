use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("line {0}: expected 'key = value', found {1:?}")]
    BadLine(usize, String),
    #[error("line {0}: key=value outside any [section]")]
    OutsideSection(usize),
}

/// A parsed INFO-style config document: `[section]` headers followed by
/// `key = value` lines (spec §6 "Configuration file"). Comments start with
/// `#` or `;`; blank lines are ignored.
#[derive(Debug, Clone, Default)]
pub struct Document {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;
        for (idx, raw_line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(inner) = line.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                current = Some(inner.trim().to_string());
                sections.entry(inner.trim().to_string()).or_default();
                continue;
            }
            let Some(section) = &current else { return Err(DocumentError::OutsideSection(lineno)) };
            let Some((key, value)) = line.split_once('=') else {
                return Err(DocumentError::BadLine(lineno, line.to_string()));
            };
            sections.entry(section.clone()).or_default().insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { sections })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_keys() {
        let doc = Document::parse("[node]\nport = 9   \nloglevel=debug\n\n[cluster]\nid = 1\n").unwrap();
        assert_eq!(doc.get("node", "port"), Some("9"));
        assert_eq!(doc.get("node", "loglevel"), Some("debug"));
        assert_eq!(doc.get("cluster", "id"), Some("1"));
        assert_eq!(doc.get("cluster", "missing"), None);
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let doc = Document::parse("# top comment\n[node]\n; also a comment\nport = 9\n").unwrap();
        assert_eq!(doc.get("node", "port"), Some("9"));
    }

    #[test]
    fn rejects_key_value_outside_section() {
        let err = Document::parse("port = 9\n").unwrap_err();
        assert_eq!(err, DocumentError::OutsideSection(1));
    }

    #[test]
    fn rejects_malformed_line() {
        let err = Document::parse("[node]\nnotakeyvalue\n").unwrap_err();
        assert_eq!(err, DocumentError::BadLine(2, "notakeyvalue".to_string()));
    }
}
