use std::path::Path;

use crate::error::ConfigError;

/// Values accepted as `true` by [`ConfigSource::get_bool`].
const TRUTHY: &[&str] = &[
    "true", "1", "t", "y", "yes", "on", "yeah", "yup", "certainly", "uh-huh",
];

/// Values accepted as `false` by [`ConfigSource::get_bool`].
const FALSY: &[&str] = &["false", "0", "f", "n", "no", "off"];

/// A key-value section of a profile.
///
/// # Examples
///
/// ```
/// use janitor::config::ini::KvSection;
///
/// let section = KvSection {
///     header: "volumes".to_string(),
///     entries: vec![("list_action".to_string(), "cinder list".to_string())],
/// };
/// assert_eq!(section.header, "volumes");
/// assert_eq!(section.entries[0].0, "list_action");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvSection {
    /// The section header, case preserved (e.g., `"volumes"`).
    pub header: String,
    /// Key-value entries within this section, in file order.
    pub entries: Vec<(String, String)>,
}

impl KvSection {
    /// Return the last value written for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Typed, read-only access to profile values.
///
/// The profile model is built against this trait rather than a concrete
/// parser, so tests (and alternative formats) can supply their own source.
/// Each typed getter takes an explicit default used when the key is absent;
/// a present-but-malformed value is a [`ConfigError::InvalidValue`].
pub trait ConfigSource {
    /// Section names in declaration order.
    fn sections(&self) -> Vec<&str>;

    /// Keys declared in `section`, in declaration order.
    fn keys(&self, section: &str) -> Vec<&str>;

    /// Raw string value of `key` in `section`.
    fn get_string(&self, section: &str, key: &str) -> Option<&str>;

    /// Whether `section` is declared.
    fn has_section(&self, section: &str) -> bool {
        self.sections().contains(&section)
    }

    /// Boolean value of `key`, or `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the value is not a recognised boolean word.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.get_string(section, key) else {
            return Ok(default);
        };
        let lowered = raw.trim().to_lowercase();
        if TRUTHY.contains(&lowered.as_str()) {
            Ok(true)
        } else if FALSY.contains(&lowered.as_str()) {
            Ok(false)
        } else {
            Err(invalid(section, key, raw, "a boolean"))
        }
    }

    /// Integer value of `key`, or `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the value is not an integer.
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, ConfigError> {
        self.get_string(section, key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|_| invalid(section, key, raw, "an integer"))
        })
    }

    /// Floating point value of `key`, or `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the value is not a number.
    fn get_float(&self, section: &str, key: &str, default: f64) -> Result<f64, ConfigError> {
        self.get_string(section, key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|_| invalid(section, key, raw, "a number"))
        })
    }
}

fn invalid(section: &str, key: &str, raw: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    }
}

/// A parsed profile document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<KvSection>,
}

impl IniDocument {
    fn section(&self, name: &str) -> Option<&KvSection> {
        self.sections.iter().find(|s| s.header == name)
    }
}

impl ConfigSource for IniDocument {
    fn sections(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.header.as_str()).collect()
    }

    fn keys(&self, section: &str) -> Vec<&str> {
        self.section(section)
            .map(|s| s.entries.iter().map(|(k, _)| k.as_str()).collect())
            .unwrap_or_default()
    }

    fn get_string(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key)
    }
}

/// Read and parse a profile file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains invalid syntax.
pub fn parse_document(path: &Path) -> Result<IniDocument, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_document_from_str(&content)
}

/// Parse profile content from a string.
///
/// Keys are lower-cased; headers preserve their case. A key is separated
/// from its value by the first `=` or `:` on the line. Lines starting with
/// `#` or `;` are comments, and a `;` preceded by whitespace ends the value.
/// A `#` inside a value is kept. An indented line continues the previous
/// value on a new line.
///
/// # Examples
///
/// ```
/// use janitor::config::ini::{ConfigSource, parse_document_from_str};
///
/// let doc = parse_document_from_str(
///     "[sweeper]\nretry = 2 ; twice\n\n[volumes]\nList_Action: cinder list\n  --all #tenants\n"
/// ).unwrap();
/// assert_eq!(doc.sections(), ["sweeper", "volumes"]);
/// assert_eq!(doc.get_int("sweeper", "retry", 0).unwrap(), 2);
/// assert_eq!(doc.get_string("volumes", "list_action"), Some("cinder list\n--all #tenants"));
/// ```
///
/// # Errors
///
/// Returns an error if:
/// - A key-value pair is malformed (missing `=`/`:` or empty key)
/// - An entry appears outside of a section header
/// - A section header is declared twice
pub fn parse_document_from_str(content: &str) -> Result<IniDocument, ConfigError> {
    let mut sections: Vec<KvSection> = Vec::new();
    let mut current: Option<KvSection> = None;

    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with(char::is_whitespace)
            && let Some((_, value)) = current.as_mut().and_then(|s| s.entries.last_mut())
        {
            value.push('\n');
            value.push_str(trimmed);
            continue;
        }

        if let Some(header) = parse_raw_header(trimmed) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            if sections.iter().any(|s| s.header == header) {
                return Err(ConfigError::DuplicateSection(header));
            }
            current = Some(KvSection {
                header,
                entries: Vec::new(),
            });
        } else if let Some(ref mut section) = current {
            let Some((key, value)) = parse_kv_line(trimmed) else {
                return Err(ConfigError::InvalidSyntax {
                    line: line_num + 1,
                    message: format!("invalid key-value pair: {trimmed}"),
                });
            };
            section.entries.push((key, value));
        } else {
            return Err(ConfigError::InvalidSyntax {
                line: line_num + 1,
                message: format!("entry outside of section: {trimmed}"),
            });
        }
    }

    if let Some(section) = current {
        sections.push(section);
    }

    Ok(IniDocument { sections })
}

/// Parse a `[header]` line preserving original case.
fn parse_raw_header(line: &str) -> Option<String> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Parse a `key = value` or `key: value` line.
///
/// # Examples
///
/// - `"retry = 3 ; comment"` → `("retry", "3")`
/// - `"List_Action: nova list --format=json"` → `("list_action", "nova list --format=json")`
fn parse_kv_line(line: &str) -> Option<(String, String)> {
    let split = line.find(['=', ':'])?;
    let (key, value) = (&line[..split], &line[split + 1..]);
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = strip_inline_comment(value).trim();
    let value = if value == "\"\"" { "" } else { value };
    Some((key.to_lowercase(), value.to_string()))
}

/// Cut the value at its first `;` when that `;` follows whitespace.
fn strip_inline_comment(value: &str) -> &str {
    match value.find(';') {
        Some(idx) if value[..idx].ends_with(char::is_whitespace) => &value[..idx],
        _ => value,
    }
}
