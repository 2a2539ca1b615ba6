//! Section specifications and their resolved action-map trees.
use std::fmt;

use super::Settings;
use super::ini::ConfigSource;
use crate::error::ConfigError;
use crate::exec::RetryPolicy;

/// Key holding the list command template.
pub const LIST_ACTION_KEY: &str = "list_action";
/// Key holding the sweep command template.
pub const SWEEP_ACTION_KEY: &str = "sweep_action";
/// Key naming the field that identifies an item.
pub const ITEM_KEY: &str = "key";

/// Format of a list command's standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One item per line.
    #[default]
    Raw,
    /// A JSON array of objects.
    Json,
}

impl OutputFormat {
    /// Parse a profile value (`raw` or `json`, case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "raw" => Some(Self::Raw),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// A dotted action-map path, e.g. `server.volume`.
///
/// # Examples
///
/// ```
/// use janitor::config::section::ActionMap;
///
/// let map = ActionMap::parse("servers", "server.volume").unwrap();
/// assert_eq!(map.segments(), ["server", "volume"]);
/// assert_eq!(map.to_string(), "server.volume");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMap {
    segments: Vec<String>,
}

impl ActionMap {
    /// Split a dotted path into segments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the path or any segment is empty.
    pub fn parse(section: &str, raw: &str) -> Result<Self, ConfigError> {
        let segments: Vec<String> = raw.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidValue {
                section: section.to_string(),
                key: "action_map".to_string(),
                value: raw.to_string(),
                expected: "a dotted path of non-empty segments",
            });
        }
        Ok(Self { segments })
    }

    /// Path segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for ActionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// One level of a section's action tree.
///
/// A flat section has exactly one node; a section with an action map owns a
/// chain of nodes, one per path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionNode {
    /// Display name, e.g. `volumes` or `servers (volume)`.
    pub name: String,
    /// Label used in cache keys: the segment, or the section name when flat.
    pub label: String,
    /// List command template.
    pub list_action: String,
    /// Sweep command template with one `{}` slot for the item key.
    pub sweep_action: String,
    /// Field identifying an item (ignored for raw output).
    pub key: String,
    /// Output format of `list_action`.
    pub output_format: OutputFormat,
    /// JSON field to match; `None` matches across all fields. Only the root
    /// is filtered, so below it this is set only when declared.
    pub filter_field: Option<String>,
    /// Substitution spec `"<template>:<cache key>,..."` appended to the list
    /// command when this node is listed under a parent item.
    pub child_options: Option<String>,
    /// Next level down, if any.
    pub child: Option<Box<Self>>,
}

impl SectionNode {
    /// Cache key under which this node publishes an item's key value.
    ///
    /// JSON nodes publish `item.<label>.<key>`; raw nodes publish
    /// `item.<label>.raw` since the whole line is the key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self.output_format {
            OutputFormat::Json => format!("item.{}.{}", self.label, self.key),
            OutputFormat::Raw => format!("item.{}.raw", self.label),
        }
    }
}

/// A named section of the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    /// Section name, unique within the profile.
    pub name: String,
    /// Skip this section once an earlier section in the run has failed.
    pub protected_run: bool,
    /// Action map the tree was built from, if any.
    pub action_map: Option<ActionMap>,
    /// Section-level filter overriding the profile's `common_filter`.
    pub common_filter: Option<String>,
    /// Retry policy for sweep commands.
    pub retry: RetryPolicy,
    /// Root of the action tree.
    pub root: SectionNode,
}

impl SectionSpec {
    /// Build a section from `source`, resolving its action map into a tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing, a value is malformed,
    /// or an action-map segment has no declared `<segment>_*` keys.
    pub fn load(
        source: &dyn ConfigSource,
        name: &str,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        let action_map = source
            .get_string(name, "action_map")
            .map(|raw| ActionMap::parse(name, raw))
            .transpose()?;

        let root = match &action_map {
            None => load_node(source, name, "", name, settings, None)?,
            Some(map) => build_tree(source, name, map.segments(), 0, settings)?,
        };

        let retry = RetryPolicy::from_millis(
            non_negative(source, name, "retry", i64::from(settings.retry.count))?,
            source.get_float(name, "timeout", settings.retry.delay_ms())?,
        );

        Ok(Self {
            name: name.to_string(),
            protected_run: source.get_bool(name, "protected_run", settings.default_protected_run)?,
            action_map,
            common_filter: source.get_string(name, "common_filter").map(String::from),
            retry,
            root,
        })
    }

    /// Nodes of the action tree, root first.
    #[must_use]
    pub fn nodes(&self) -> Vec<&SectionNode> {
        let mut nodes = vec![&self.root];
        let mut current = &self.root;
        while let Some(child) = current.child.as_deref() {
            nodes.push(child);
            current = child;
        }
        nodes
    }
}

/// Build the node for `segments[index]` and, recursively, everything below it.
fn build_tree(
    source: &dyn ConfigSource,
    section: &str,
    segments: &[String],
    index: usize,
    settings: &Settings,
) -> Result<SectionNode, ConfigError> {
    let Some(segment) = segments.get(index) else {
        return Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: "action_map".to_string(),
            value: segments.join("."),
            expected: "a dotted path of non-empty segments",
        });
    };

    let prefix = format!("{segment}_");
    if !source.keys(section).iter().any(|k| k.starts_with(&prefix)) {
        return Err(ConfigError::UnresolvedSegment {
            section: section.to_string(),
            segment: segment.clone(),
        });
    }

    let child = if index + 1 < segments.len() {
        Some(Box::new(build_tree(
            source,
            section,
            segments,
            index + 1,
            settings,
        )?))
    } else {
        None
    };

    let mut node = load_node(
        source,
        section,
        &prefix,
        &format!("{section} ({segment})"),
        settings,
        child,
    )?;
    node.label = segment.clone();
    if index > 0 {
        // Child levels are not filtered; only a declared field is kept.
        node.filter_field = source
            .get_string(section, &format!("{prefix}filter_field"))
            .and_then(normalize_field);
    }
    Ok(node)
}

/// Read one node's keys using `prefix` (empty for flat sections).
fn load_node(
    source: &dyn ConfigSource,
    section: &str,
    prefix: &str,
    display_name: &str,
    settings: &Settings,
    child: Option<Box<SectionNode>>,
) -> Result<SectionNode, ConfigError> {
    let required = |key: &str| -> Result<String, ConfigError> {
        let full = format!("{prefix}{key}");
        source
            .get_string(section, &full)
            .map(String::from)
            .ok_or_else(|| ConfigError::MissingKey {
                section: section.to_string(),
                key: full,
            })
    };

    let format_key = format!("{prefix}output_format");
    let output_format = match source.get_string(section, &format_key) {
        None => settings.default_output_format,
        Some(raw) => OutputFormat::parse(raw).ok_or_else(|| ConfigError::InvalidValue {
            section: section.to_string(),
            key: format_key.clone(),
            value: raw.to_string(),
            expected: "'raw' or 'json'",
        })?,
    };

    let filter_field = match source.get_string(section, &format!("{prefix}filter_field")) {
        Some(raw) => normalize_field(raw),
        None => settings.default_filter_field.clone(),
    };

    Ok(SectionNode {
        name: display_name.to_string(),
        label: section.to_string(),
        list_action: required(LIST_ACTION_KEY)?,
        sweep_action: required(SWEEP_ACTION_KEY)?,
        key: required(ITEM_KEY)?,
        output_format,
        filter_field,
        child_options: source
            .get_string(section, &format!("{prefix}as_child_options"))
            .filter(|v| !v.is_empty())
            .map(String::from),
        child,
    })
}

/// Treat empty and `None` field names as "match all fields".
pub(super) fn normalize_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Read a non-negative integer as `u32`.
pub(super) fn non_negative(
    source: &dyn ConfigSource,
    section: &str,
    key: &str,
    default: i64,
) -> Result<u32, ConfigError> {
    let value = source.get_int(section, key, default)?;
    u32::try_from(value).map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        expected: "a non-negative integer",
    })
}
